//! Snapshot identities and the fetch abstraction the core delegates to.

use super::period::YearMonth;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt::Display;

/// Identifies one published regulator file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotKey {
    /// Fund registry published for a business day.
    Registry(NaiveDate),
    /// Daily reports of every fund for one month.
    DailyReport(YearMonth),
}

impl SnapshotKey {
    pub fn file_name(&self) -> String {
        match self {
            SnapshotKey::Registry(date) => {
                format!("inf_cadastral_fi_{}.csv", date.format("%Y%m%d"))
            }
            SnapshotKey::DailyReport(month) => format!("inf_diario_fi_{month}.csv"),
        }
    }

    /// Path relative to the provider base url.
    pub fn remote_path(&self) -> String {
        match self {
            SnapshotKey::Registry(_) => format!("CAD/DADOS/{}", self.file_name()),
            SnapshotKey::DailyReport(_) => format!("DOC/INF_DIARIO/DADOS/{}", self.file_name()),
        }
    }
}

impl Display for SnapshotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

/// Raw contents of a retrieved snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub key: SnapshotKey,
    pub data: Vec<u8>,
}

impl Snapshot {
    pub fn new(key: SnapshotKey, data: impl Into<Vec<u8>>) -> Self {
        Self {
            key,
            data: data.into(),
        }
    }

    /// Source files are ISO-8859-1, where every byte maps to the code point
    /// of the same value.
    pub fn text(&self) -> String {
        self.data.iter().map(|&b| char::from(b)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Found(Snapshot),
    NotFound,
}

#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    async fn fetch(&self, key: &SnapshotKey) -> Result<FetchOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_follow_regulator_convention() {
        let registry = SnapshotKey::Registry(NaiveDate::from_ymd_opt(2021, 3, 5).unwrap());
        assert_eq!(registry.file_name(), "inf_cadastral_fi_20210305.csv");
        assert_eq!(registry.remote_path(), "CAD/DADOS/inf_cadastral_fi_20210305.csv");

        let report = SnapshotKey::DailyReport(YearMonth::new(2020, 2).unwrap());
        assert_eq!(report.file_name(), "inf_diario_fi_202002.csv");
        assert_eq!(
            report.remote_path(),
            "DOC/INF_DIARIO/DADOS/inf_diario_fi_202002.csv"
        );
    }

    #[test]
    fn decodes_latin1_bytes() {
        let key = SnapshotKey::DailyReport(YearMonth::new(2020, 2).unwrap());
        // "Ações" in ISO-8859-1
        let snapshot = Snapshot::new(key, vec![0x41, 0xE7, 0xF5, 0x65, 0x73]);
        assert_eq!(snapshot.text(), "Ações");
    }
}
