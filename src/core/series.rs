//! Merged daily reports of one or more funds.

use super::error::{FundsError, Result};
use super::snapshot::Snapshot;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{Span, debug, info_span, warn};

/// Value columns of a daily report. The fund id and the date are always kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Column {
    TotalValue,
    QuotaValue,
    NetWorth,
    Inflow,
    Outflow,
    Holders,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRecord {
    pub fund_id: String,
    pub date: NaiveDate,
    pub total_value: Option<f64>,
    pub quota_value: Option<f64>,
    pub net_worth: Option<f64>,
    pub inflow: Option<f64>,
    pub outflow: Option<f64>,
    pub holders: Option<u64>,
}

impl DailyRecord {
    /// Value of a column as a float, `None` when missing or projected out.
    pub fn value(&self, column: Column) -> Option<f64> {
        match column {
            Column::TotalValue => self.total_value,
            Column::QuotaValue => self.quota_value,
            Column::NetWorth => self.net_worth,
            Column::Inflow => self.inflow,
            Column::Outflow => self.outflow,
            Column::Holders => self.holders.map(|h| h as f64),
        }
    }

    fn project(mut self, columns: &BTreeSet<Column>) -> Self {
        let keep = |c: Column| columns.contains(&c);
        if !keep(Column::TotalValue) {
            self.total_value = None;
        }
        if !keep(Column::QuotaValue) {
            self.quota_value = None;
        }
        if !keep(Column::NetWorth) {
            self.net_worth = None;
        }
        if !keep(Column::Inflow) {
            self.inflow = None;
        }
        if !keep(Column::Outflow) {
            self.outflow = None;
        }
        if !keep(Column::Holders) {
            self.holders = None;
        }
        self
    }
}

#[derive(Debug, Deserialize)]
struct DailyRow {
    #[serde(rename = "CNPJ_FUNDO", alias = "CNPJ_FUNDO_CLASSE")]
    fund_id: String,
    #[serde(rename = "DT_COMPTC")]
    date: NaiveDate,
    #[serde(rename = "VL_TOTAL", default, deserialize_with = "csv::invalid_option")]
    total_value: Option<f64>,
    #[serde(rename = "VL_QUOTA", default, deserialize_with = "csv::invalid_option")]
    quota_value: Option<f64>,
    #[serde(rename = "VL_PATRIM_LIQ", default, deserialize_with = "csv::invalid_option")]
    net_worth: Option<f64>,
    #[serde(rename = "CAPTC_DIA", default, deserialize_with = "csv::invalid_option")]
    inflow: Option<f64>,
    #[serde(rename = "RESG_DIA", default, deserialize_with = "csv::invalid_option")]
    outflow: Option<f64>,
    #[serde(rename = "NR_COTST", default, deserialize_with = "csv::invalid_option")]
    holders: Option<u64>,
}

impl From<DailyRow> for DailyRecord {
    fn from(row: DailyRow) -> Self {
        DailyRecord {
            fund_id: row.fund_id.trim().to_string(),
            date: row.date,
            total_value: row.total_value,
            quota_value: row.quota_value,
            net_worth: row.net_worth,
            inflow: row.inflow,
            outflow: row.outflow,
            holders: row.holders,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IngestStatus {
    AllFound,
    Partial,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub status: IngestStatus,
    /// Requested ids present in each snapshot, in ingest order.
    pub matched: Vec<(String, usize)>,
    /// Requested ids absent from every snapshot of the call.
    pub missing: BTreeSet<String>,
}

/// One fund's rows sorted by date, id stripped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundPoint {
    pub date: NaiveDate,
    pub total_value: Option<f64>,
    pub quota_value: Option<f64>,
    pub net_worth: Option<f64>,
    pub inflow: Option<f64>,
    pub outflow: Option<f64>,
    pub holders: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundSeries {
    pub fund_id: String,
    pub points: Vec<FundPoint>,
}

/// Append-only store of daily records merged from monthly snapshots.
pub struct TimeSeriesStore {
    records: Vec<DailyRecord>,
    span: Span,
}

impl Default for TimeSeriesStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSeriesStore {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            span: info_span!("series"),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[DailyRecord] {
        &self.records
    }

    pub fn fund_ids(&self) -> BTreeSet<&str> {
        self.records.iter().map(|r| r.fund_id.as_str()).collect()
    }

    /// Parses each snapshot and appends its rows. With `allowed_ids` only
    /// those funds are kept and the report says whether every one of them
    /// appeared in at least one snapshot. With `allowed_columns` the other
    /// value columns are dropped.
    pub fn ingest(
        &mut self,
        snapshots: &[Snapshot],
        allowed_ids: Option<&BTreeSet<String>>,
        allowed_columns: Option<&BTreeSet<Column>>,
    ) -> Result<IngestReport> {
        let _enter = self.span.enter();
        let mut matched = Vec::with_capacity(snapshots.len());
        let mut missing: BTreeSet<String> = allowed_ids.cloned().unwrap_or_default();

        for snapshot in snapshots {
            let rows = parse_daily_rows(snapshot)?;
            let total = rows.len();

            let mut present = BTreeSet::new();
            let mut kept = 0;
            for row in rows {
                if let Some(ids) = allowed_ids {
                    if !ids.contains(&row.fund_id) {
                        continue;
                    }
                    present.insert(row.fund_id.clone());
                }
                let row = match allowed_columns {
                    Some(columns) => row.project(columns),
                    None => row,
                };
                self.records.push(row);
                kept += 1;
            }

            if allowed_ids.is_some() {
                missing.retain(|id| !present.contains(id));
                matched.push((snapshot.key.file_name(), present.len()));
            }
            debug!(file = %snapshot.key, total, kept, "Daily report merged");
        }

        let status = if missing.is_empty() {
            IngestStatus::AllFound
        } else {
            warn!(?missing, "Funds not found in any daily report");
            IngestStatus::Partial
        };

        Ok(IngestReport {
            status,
            matched,
            missing,
        })
    }

    /// The store's rows as a single fund series sorted by date.
    pub fn single_fund_view(&self) -> Result<FundSeries> {
        let ids = self.fund_ids();
        let fund_id = match ids.len() {
            0 => {
                return Err(FundsError::InsufficientData(
                    "no daily records were ingested".to_string(),
                ));
            }
            1 => ids.into_iter().next().unwrap_or_default().to_string(),
            n => return Err(FundsError::MultipleFunds(n)),
        };

        let mut points: Vec<FundPoint> = self
            .records
            .iter()
            .map(|r| FundPoint {
                date: r.date,
                total_value: r.total_value,
                quota_value: r.quota_value,
                net_worth: r.net_worth,
                inflow: r.inflow,
                outflow: r.outflow,
                holders: r.holders,
            })
            .collect();
        points.sort_by_key(|p| p.date);

        Ok(FundSeries { fund_id, points })
    }

    /// All rows grouped per fund, each group sorted by date. Rows sharing a
    /// date keep their ingest order.
    pub fn by_fund(&self) -> BTreeMap<String, Vec<DailyRecord>> {
        let mut grouped: BTreeMap<String, Vec<DailyRecord>> = BTreeMap::new();
        for record in &self.records {
            grouped
                .entry(record.fund_id.clone())
                .or_default()
                .push(record.clone());
        }
        for rows in grouped.values_mut() {
            rows.sort_by_key(|r| r.date);
        }
        grouped
    }
}

fn parse_daily_rows(snapshot: &Snapshot) -> Result<Vec<DailyRecord>> {
    let text = snapshot.text();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(text.as_bytes());

    reader
        .deserialize::<DailyRow>()
        .enumerate()
        .map(|(i, row)| {
            row.map(DailyRecord::from).map_err(|e| FundsError::Parse {
                file: snapshot.key.file_name(),
                reason: format!("row {}: {e}", i + 1),
            })
        })
        .collect()
}
