//! Locates retrievable snapshots on the regulator's publication schedule.

use super::error::{FundsError, Result};
use super::period::MonthRange;
use super::snapshot::{FetchOutcome, Snapshot, SnapshotFetcher, SnapshotKey};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use tracing::{Span, debug, info_span};

pub const DEFAULT_LOOKBACK_DAYS: u32 = 29;

pub struct SnapshotResolver<'a> {
    fetcher: &'a dyn SnapshotFetcher,
    today: NaiveDate,
    span: Span,
}

impl<'a> SnapshotResolver<'a> {
    pub fn new(fetcher: &'a dyn SnapshotFetcher) -> Self {
        Self {
            fetcher,
            today: chrono::Local::now().date_naive(),
            span: info_span!("resolver"),
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Walks back one day at a time from yesterday and returns the first
    /// registry snapshot the fetcher can provide. Weekends are never
    /// requested.
    pub async fn resolve_latest(&self, max_lookback_days: u32) -> Result<Snapshot> {
        for offset in 1..=i64::from(max_lookback_days) {
            let date = self.today - Duration::days(offset);
            if is_weekend(date) {
                self.span.in_scope(|| debug!(%date, "Skipping weekend date"));
                continue;
            }

            let key = SnapshotKey::Registry(date);
            self.span.in_scope(|| debug!(%key, "Trying registry snapshot"));
            match self.fetch(&key).await? {
                FetchOutcome::Found(snapshot) => {
                    let bytes = snapshot.data.len();
                    self.span
                        .in_scope(|| debug!(%key, bytes, "Registry snapshot found"));
                    return Ok(snapshot);
                }
                FetchOutcome::NotFound => {
                    self.span.in_scope(|| debug!(%key, "Registry snapshot not published"));
                }
            }
        }

        Err(FundsError::SnapshotNotFound(format!(
            "no registry published in the {max_lookback_days} days before {}",
            self.today
        )))
    }

    /// Fetches the daily report of every month in `range`, in order.
    /// Months the regulator has not published are skipped.
    pub async fn resolve_months(&self, range: &MonthRange) -> Result<Vec<Snapshot>> {
        self.resolve_months_with_progress(range, &|| ()).await
    }

    /// Same as [`Self::resolve_months`], calling `on_month` after each month
    /// has been tried.
    pub async fn resolve_months_with_progress(
        &self,
        range: &MonthRange,
        on_month: &(dyn Fn() + Sync),
    ) -> Result<Vec<Snapshot>> {
        let mut snapshots = Vec::new();
        for month in range.months() {
            let key = SnapshotKey::DailyReport(month);
            let outcome = self.fetch(&key).await?;
            on_month();
            match outcome {
                FetchOutcome::Found(snapshot) => snapshots.push(snapshot),
                FetchOutcome::NotFound => {
                    self.span.in_scope(|| debug!(%key, "Daily report not published"));
                }
            }
        }

        if snapshots.is_empty() {
            return Err(FundsError::SnapshotNotFound(format!(
                "no daily report published between {} and {}",
                range.start(),
                range.end()
            )));
        }
        Ok(snapshots)
    }

    async fn fetch(&self, key: &SnapshotKey) -> Result<FetchOutcome> {
        self.fetcher
            .fetch(key)
            .await
            .map_err(|e| FundsError::Fetch {
                file: key.file_name(),
                reason: format!("{e:#}"),
            })
    }
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}
