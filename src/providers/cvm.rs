use crate::core::snapshot::{FetchOutcome, Snapshot, SnapshotFetcher, SnapshotKey};
use crate::providers::util::with_retry;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

/// Downloads snapshot files from the regulator's open data portal.
pub struct CvmProvider {
    base_url: String,
    client: reqwest::Client,
}

impl CvmProvider {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("fundosbr/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(CvmProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl SnapshotFetcher for CvmProvider {
    async fn fetch(&self, key: &SnapshotKey) -> Result<FetchOutcome> {
        let url = format!("{}/{}", self.base_url, key.remote_path());
        debug!("Requesting snapshot from {}", url);

        let response = with_retry(|| async { self.client.get(&url).send().await }, 3, 500)
            .await
            .with_context(|| format!("Failed to send request for {key}"))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("Snapshot {} not published", key);
            return Ok(FetchOutcome::NotFound);
        }
        if !status.is_success() {
            return Err(anyhow!("Request for {} failed with status {}", key, status));
        }

        let body = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read response body for {key}"))?;
        debug!("Fetched {} ({} bytes)", key, body.len());
        Ok(FetchOutcome::Found(Snapshot::new(*key, body.to_vec())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::period::YearMonth;
    use chrono::NaiveDate;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_cvm_mock_server(
        remote_path: &str,
        body: &[u8],
        status_code: u16,
    ) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/dados/FI/{remote_path}")))
            .respond_with(ResponseTemplate::new(status_code).set_body_bytes(body.to_vec()))
            .mount(&mock_server)
            .await;
        mock_server
    }

    fn provider(server: &MockServer) -> CvmProvider {
        CvmProvider::new(&format!("{}/dados/FI/", server.uri())).unwrap()
    }

    #[tokio::test]
    async fn fetches_registry_snapshot() {
        let key = SnapshotKey::Registry(NaiveDate::from_ymd_opt(2020, 3, 2).unwrap());
        let body = b"CNPJ_FUNDO;DENOM_SOCIAL\n11.000.000/0000-00;FUNDO A\xc7\xd5ES\n";
        let server = create_cvm_mock_server(
            "CAD/DADOS/inf_cadastral_fi_20200302.csv",
            body,
            200,
        )
        .await;

        let outcome = provider(&server).fetch(&key).await.unwrap();
        let FetchOutcome::Found(snapshot) = outcome else {
            panic!("Expected a snapshot");
        };
        assert_eq!(snapshot.key, key);
        assert_eq!(snapshot.data, body.to_vec());
        assert!(snapshot.text().contains("FUNDO AÇÕES"));
    }

    #[tokio::test]
    async fn fetches_daily_report() {
        let key = SnapshotKey::DailyReport(YearMonth::new(2020, 2).unwrap());
        let server = create_cvm_mock_server(
            "DOC/INF_DIARIO/DADOS/inf_diario_fi_202002.csv",
            b"CNPJ_FUNDO;DT_COMPTC\n",
            200,
        )
        .await;

        let outcome = provider(&server).fetch(&key).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Found(_)));
    }

    #[tokio::test]
    async fn not_found_is_an_outcome() {
        let key = SnapshotKey::DailyReport(YearMonth::new(2020, 2).unwrap());
        let server = create_cvm_mock_server(
            "DOC/INF_DIARIO/DADOS/inf_diario_fi_202002.csv",
            b"",
            404,
        )
        .await;

        let outcome = provider(&server).fetch(&key).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::NotFound));
    }

    #[tokio::test]
    async fn server_error_is_an_error() {
        let key = SnapshotKey::DailyReport(YearMonth::new(2020, 2).unwrap());
        let server = create_cvm_mock_server(
            "DOC/INF_DIARIO/DADOS/inf_diario_fi_202002.csv",
            b"boom",
            500,
        )
        .await;

        let result = provider(&server).fetch(&key).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("500"));
    }
}
