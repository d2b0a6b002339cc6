//! Command implementations on top of the core engines.

pub mod compare;
pub mod rank;
pub mod report;
pub mod search;
pub mod setup;
pub mod ui;

use crate::core::config::AppConfig;
use crate::core::{FundRegistry, IngestReport, MonthRange, SnapshotResolver, TimeSeriesStore};
use crate::core::series::Column;
use crate::providers::{CachingFetcher, CvmProvider};
use crate::store::open_snapshot_cache;
use anyhow::Result;
use std::collections::BTreeSet;
use tracing::{debug, info_span};

/// Everything a command needs to reach the regulator's data.
pub struct Session {
    config: AppConfig,
    fetcher: CachingFetcher<CvmProvider>,
    json: bool,
}

impl Session {
    pub fn new(config: AppConfig, json: bool) -> Result<Self> {
        let provider = CvmProvider::new(&config.providers.cvm.base_url)?;
        let fetcher = CachingFetcher::new(provider, open_snapshot_cache(&config));
        Ok(Self {
            config,
            fetcher,
            json,
        })
    }

    pub fn json(&self) -> bool {
        self.json
    }

    /// Loads the most recent registry snapshot.
    pub async fn load_registry(&self) -> Result<FundRegistry> {
        let resolver = SnapshotResolver::new(&self.fetcher);
        let snapshot = resolver.resolve_latest(self.config.lookback_days).await?;

        let mut registry = FundRegistry::new().with_span(info_span!("registry", file = %snapshot.key));
        registry.load(&snapshot)?;
        debug!(records = registry.len(), "Registry ready");
        Ok(registry)
    }

    /// Downloads the daily reports of `range` and keeps the rows of `ids`.
    pub async fn load_daily(
        &self,
        range: &MonthRange,
        ids: &BTreeSet<String>,
        columns: Option<&BTreeSet<Column>>,
    ) -> Result<(TimeSeriesStore, IngestReport)> {
        let resolver = SnapshotResolver::new(&self.fetcher);
        let pb = ui::new_progress_bar(range.months().count() as u64, true);
        pb.set_message("Downloading daily reports");
        let snapshots = resolver
            .resolve_months_with_progress(range, &|| pb.inc(1))
            .await;
        pb.finish_and_clear();
        let snapshots = snapshots?;

        let mut store = TimeSeriesStore::new()
            .with_span(info_span!("series", start = %range.start(), end = %range.end()));
        let report = store.ingest(&snapshots, Some(ids), columns)?;
        debug!(rows = store.len(), status = ?report.status, "Daily reports ingested");
        Ok((store, report))
    }
}
