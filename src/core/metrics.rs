//! Derived metrics of a single fund.

use super::error::{FundsError, Result};
use super::series::{FundPoint, FundSeries};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{Span, debug, info_span};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyMetric {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSummary {
    pub holder_delta: Option<i64>,
    pub period_return: f64,
    pub net_flow: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySummary {
    pub year: i32,
    pub month: u32,
    pub monthly_return: f64,
    pub holder_delta: i64,
    pub net_flow: f64,
}

/// End-of-month figures for one (year, month) bucket.
struct MonthBucket {
    last_quota: Option<f64>,
    last_holders: Option<u64>,
    net_flow: f64,
}

pub struct MetricsEngine<'a> {
    series: &'a FundSeries,
    span: Span,
}

impl<'a> MetricsEngine<'a> {
    pub fn new(series: &'a FundSeries) -> Self {
        Self {
            series,
            span: info_span!("metrics", fund = %series.fund_id),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Percent change of the quota against the previous row. The first row,
    /// and any row next to a missing quota, has no value.
    pub fn daily_returns(&self) -> Vec<DailyMetric> {
        let points = &self.series.points;
        points
            .iter()
            .enumerate()
            .map(|(i, point)| {
                let value = i
                    .checked_sub(1)
                    .and_then(|prev| pct_change(points[prev].quota_value, point.quota_value));
                DailyMetric {
                    date: point.date,
                    value,
                }
            })
            .collect()
    }

    /// Compounded return since the first row, in percent. Rows without a
    /// daily return have no value but do not break the running product.
    pub fn cumulative_returns(&self) -> Vec<DailyMetric> {
        let mut growth = 1.0;
        self.daily_returns()
            .into_iter()
            .map(|daily| {
                let value = daily.value.map(|r| {
                    growth *= 1.0 + r / 100.0;
                    (growth - 1.0) * 100.0
                });
                DailyMetric {
                    date: daily.date,
                    value,
                }
            })
            .collect()
    }

    pub fn period_summary(&self) -> Result<PeriodSummary> {
        let points = &self.series.points;
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return Err(FundsError::InsufficientData(format!(
                "no daily records for {}",
                self.series.fund_id
            )));
        };

        let holder_delta = holders(last).zip(holders(first)).map(|(l, f)| l - f);
        let period_return = match (first.quota_value, last.quota_value) {
            (Some(start), Some(end)) => (end - start) / start * 100.0,
            _ => {
                return Err(FundsError::InsufficientData(format!(
                    "quota value missing at the edges of the period for {}",
                    self.series.fund_id
                )));
            }
        };
        let net_flow = net_flow(points.iter());

        let summary = PeriodSummary {
            holder_delta,
            period_return,
            net_flow,
        };
        self.span.in_scope(|| debug!(?summary, "Period summary"));
        Ok(summary)
    }

    /// One row per month: return of the month's last quota against the
    /// previous month's last quota, change in the last holder count, and the
    /// month's net flow. The first month has no reference and is dropped.
    pub fn monthly_summary(&self) -> Result<Vec<MonthlySummary>> {
        let mut buckets: BTreeMap<(i32, u32), Vec<&FundPoint>> = BTreeMap::new();
        for point in &self.series.points {
            buckets
                .entry((point.date.year(), point.date.month()))
                .or_default()
                .push(point);
        }

        let buckets: Vec<((i32, u32), MonthBucket)> = buckets
            .into_iter()
            .map(|(key, points)| {
                let bucket = MonthBucket {
                    last_quota: points.iter().rev().find_map(|p| p.quota_value),
                    last_holders: points.iter().rev().find_map(|p| p.holders),
                    net_flow: net_flow(points.iter().copied()),
                };
                (key, bucket)
            })
            .collect();

        let rows: Vec<MonthlySummary> = buckets
            .windows(2)
            .filter_map(|pair| {
                let (_, previous) = &pair[0];
                let ((year, month), current) = &pair[1];
                let monthly_return = pct_change(previous.last_quota, current.last_quota)?;
                let holder_delta = i64::try_from(current.last_holders?).ok()?
                    - i64::try_from(previous.last_holders?).ok()?;
                Some(MonthlySummary {
                    year: *year,
                    month: *month,
                    monthly_return,
                    holder_delta,
                    net_flow: current.net_flow,
                })
            })
            .collect();

        if rows.is_empty() {
            return Err(FundsError::InsufficientData(
                "monthly statistics need at least two months of data".to_string(),
            ));
        }
        self.span
            .in_scope(|| debug!(months = rows.len(), "Monthly summary"));
        Ok(rows)
    }
}

pub(crate) fn pct_change(previous: Option<f64>, current: Option<f64>) -> Option<f64> {
    let (previous, current) = (previous?, current?);
    Some((current / previous - 1.0) * 100.0)
}

fn holders(point: &FundPoint) -> Option<i64> {
    point.holders.and_then(|h| i64::try_from(h).ok())
}

fn net_flow<'p>(points: impl Iterator<Item = &'p FundPoint>) -> f64 {
    points
        .map(|p| p.inflow.unwrap_or(0.0) - p.outflow.unwrap_or(0.0))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::series::tests::{FUND_A_ROWS, FUND_B_ROWS, store_with};
    use approx::assert_abs_diff_eq;

    fn fund_a() -> FundSeries {
        store_with(&[FUND_A_ROWS]).single_fund_view().unwrap()
    }

    fn fund_b() -> FundSeries {
        store_with(&[FUND_B_ROWS]).single_fund_view().unwrap()
    }

    #[test]
    fn daily_returns_start_undefined() {
        let series = fund_a();
        let daily = MetricsEngine::new(&series).daily_returns();
        assert_eq!(daily.len(), 13);
        assert_eq!(daily[0].value, None);
        assert_abs_diff_eq!(daily[1].value.unwrap(), 20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(daily[3].value.unwrap(), -14.285714, epsilon = 1e-5);
        assert_abs_diff_eq!(daily[12].value.unwrap(), 27.272727, epsilon = 1e-5);
    }

    #[test]
    fn cumulative_returns_compound_daily_returns() {
        let series = fund_a();
        let cumulative = MetricsEngine::new(&series).cumulative_returns();
        assert_eq!(cumulative[0].value, None);
        assert_abs_diff_eq!(cumulative[2].value.unwrap(), 40.0, epsilon = 1e-9);
        assert_abs_diff_eq!(cumulative[5].value.unwrap(), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(cumulative[11].value.unwrap(), 120.0, epsilon = 1e-9);
        assert_abs_diff_eq!(cumulative[12].value.unwrap(), 180.0, epsilon = 1e-9);
    }

    #[test]
    fn cumulative_return_carries_over_missing_quota() {
        let mut series = fund_a();
        series.points[2].quota_value = None;
        let engine = MetricsEngine::new(&series);
        let cumulative = engine.cumulative_returns();

        assert_eq!(cumulative[2].value, None);
        assert_eq!(cumulative[3].value, None);
        // 10 -> 12 (+20%), then 12 -> 16 (+33.3%) resumes from 20%.
        assert_abs_diff_eq!(cumulative[4].value.unwrap(), 60.0, epsilon = 1e-9);
    }

    #[test]
    fn period_summary_of_rising_fund() {
        let series = fund_a();
        let summary = MetricsEngine::new(&series).period_summary().unwrap();
        assert_eq!(summary.holder_delta, Some(15));
        assert_abs_diff_eq!(summary.period_return, 180.0, epsilon = 1e-9);
        assert_abs_diff_eq!(summary.net_flow, 6.0, epsilon = 1e-9);
    }

    #[test]
    fn period_summary_of_falling_fund() {
        let series = fund_b();
        let summary = MetricsEngine::new(&series).period_summary().unwrap();
        assert_abs_diff_eq!(summary.period_return, -40.0, epsilon = 1e-9);
    }

    #[test]
    fn period_summary_of_empty_series() {
        let series = FundSeries {
            fund_id: "11.000.000/0000-00".into(),
            points: Vec::new(),
        };
        assert!(matches!(
            MetricsEngine::new(&series).period_summary(),
            Err(FundsError::InsufficientData(_))
        ));
    }

    #[test]
    fn monthly_summary_chains_month_ends() {
        let series = fund_a();
        let rows = MetricsEngine::new(&series).monthly_summary().unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!((rows[0].year, rows[0].month), (2020, 3));
        assert_abs_diff_eq!(rows[0].monthly_return, 12.5, epsilon = 1e-9);
        assert_eq!(rows[0].holder_delta, 4);
        assert_abs_diff_eq!(rows[0].net_flow, 3.0, epsilon = 1e-9);

        assert_eq!((rows[1].year, rows[1].month), (2020, 4));
        assert_abs_diff_eq!(rows[1].monthly_return, 55.555555, epsilon = 1e-5);
        assert_eq!(rows[1].holder_delta, 7);
        assert_abs_diff_eq!(rows[1].net_flow, -2.0, epsilon = 1e-9);
    }

    #[test]
    fn monthly_summary_needs_two_months() {
        let mut series = fund_a();
        series.points.retain(|p| p.date.month() == 2);
        assert!(matches!(
            MetricsEngine::new(&series).monthly_summary(),
            Err(FundsError::InsufficientData(_))
        ));
    }

    #[test]
    fn monthly_summary_drops_undefined_months() {
        let mut series = fund_a();
        for point in series.points.iter_mut().filter(|p| p.date.month() == 3) {
            point.quota_value = None;
        }
        // Without a March quota neither March nor April has a return.
        assert!(matches!(
            MetricsEngine::new(&series).monthly_summary(),
            Err(FundsError::InsufficientData(_))
        ));
    }
}
