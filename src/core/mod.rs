//! Core ingestion and analytics of regulator fund data

pub mod cache;
pub mod comparison;
pub mod config;
pub mod error;
pub mod log;
pub mod metrics;
pub mod period;
pub mod registry;
pub mod resolver;
pub mod series;
pub mod snapshot;

// Re-export main types for cleaner imports
pub use comparison::{ComparisonEngine, MonthlyReturnTable, RankingEntry};
pub use error::{FundsError, Result};
pub use metrics::{DailyMetric, MetricsEngine, MonthlySummary, PeriodSummary};
pub use period::{MonthRange, YearMonth};
pub use registry::{FundClass, FundRegistry, FundStatus, RegistryRecord};
pub use resolver::SnapshotResolver;
pub use series::{Column, DailyRecord, FundSeries, IngestReport, IngestStatus, TimeSeriesStore};
pub use snapshot::{FetchOutcome, Snapshot, SnapshotFetcher, SnapshotKey};
