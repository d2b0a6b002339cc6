//! Cross-fund returns and rankings.

use super::error::{FundsError, Result};
use super::metrics::pct_change;
use super::period::YearMonth;
use super::registry::FundRegistry;
use super::series::{Column, DailyRecord};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{Span, debug, info_span};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingEntry {
    pub position: usize,
    pub fund_id: String,
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyReturnRow {
    pub month_end: NaiveDate,
    pub returns: Vec<f64>,
}

/// Month-over-month returns pivoted by fund. `returns[i]` of every row
/// belongs to `funds[i]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyReturnTable {
    pub funds: Vec<String>,
    pub rows: Vec<MonthlyReturnRow>,
}

pub struct ComparisonEngine<'a> {
    registry: &'a FundRegistry,
    series: BTreeMap<String, Vec<DailyRecord>>,
    span: Span,
}

impl<'a> ComparisonEngine<'a> {
    /// `series` is the per-fund, date sorted view of a time-series store.
    pub fn new(
        registry: &'a FundRegistry,
        series: BTreeMap<String, Vec<DailyRecord>>,
    ) -> Result<Self> {
        if !registry.is_loaded() {
            return Err(FundsError::RegistryNotLoaded);
        }
        Ok(Self {
            registry,
            series,
            span: info_span!("comparison"),
        })
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Return over the whole period per fund, ignoring rows whose quota is
    /// zero or not finite. Funds without any usable quota are left out.
    pub fn period_return_by_fund(&self) -> BTreeMap<String, f64> {
        self.series
            .iter()
            .filter_map(|(id, rows)| {
                let mut quotas = rows
                    .iter()
                    .filter_map(|r| r.quota_value)
                    .filter(|q| *q != 0.0 && q.is_finite());
                let first = quotas.next()?;
                let last = quotas.last().unwrap_or(first);
                Some((id.clone(), (last / first - 1.0) * 100.0))
            })
            .collect()
    }

    /// Period returns annotated with each fund's registered name.
    pub fn named_period_returns(&self) -> Result<Vec<RankingEntry>> {
        self.period_return_by_fund()
            .into_iter()
            .enumerate()
            .map(|(i, (fund_id, value))| {
                Ok(RankingEntry {
                    position: i + 1,
                    name: self.registry.name_of(&fund_id)?.to_string(),
                    fund_id,
                    value,
                })
            })
            .collect()
    }

    /// Returns between consecutive calendar month-ends, keeping only the
    /// months in which every fund has a value.
    pub fn monthly_return_by_fund(&self) -> MonthlyReturnTable {
        let funds: Vec<String> = self.series.keys().cloned().collect();
        let per_fund: Vec<BTreeMap<YearMonth, f64>> =
            self.series.values().map(|rows| monthly_returns(rows)).collect();

        let months: BTreeSet<YearMonth> = per_fund
            .iter()
            .flat_map(|returns| returns.keys().copied())
            .collect();

        let rows: Vec<MonthlyReturnRow> = months
            .into_iter()
            .filter_map(|month| {
                let returns = per_fund
                    .iter()
                    .map(|r| r.get(&month).copied())
                    .collect::<Option<Vec<f64>>>()?;
                Some(MonthlyReturnRow {
                    month_end: month.last_day()?,
                    returns,
                })
            })
            .collect();

        self.span
            .in_scope(|| debug!(funds = funds.len(), months = rows.len(), "Monthly returns pivoted"));
        MonthlyReturnTable { funds, rows }
    }

    /// Ranks `ids` by the last known value of `field`, highest first.
    pub fn rank_by_field(
        &self,
        ids: &BTreeSet<String>,
        field: Column,
        top_n: usize,
    ) -> Result<Vec<RankingEntry>> {
        let values = self
            .series
            .iter()
            .filter(|(id, _)| ids.contains(*id))
            .filter_map(|(id, rows)| {
                let last = rows.iter().rev().find_map(|r| r.value(field))?;
                Some((id.clone(), last))
            })
            .collect();
        self.rank(values, top_n)
    }

    /// Ranks `ids` by their period return, highest first.
    pub fn rank_by_return(&self, ids: &BTreeSet<String>, top_n: usize) -> Result<Vec<RankingEntry>> {
        let values = self
            .period_return_by_fund()
            .into_iter()
            .filter(|(id, _)| ids.contains(id))
            .collect();
        self.rank(values, top_n)
    }

    /// Non-finite values have no place in the order and are dropped.
    fn rank(&self, mut values: Vec<(String, f64)>, top_n: usize) -> Result<Vec<RankingEntry>> {
        values.retain(|(_, value)| value.is_finite());
        values.sort_by(|a, b| b.1.total_cmp(&a.1));
        values.truncate(top_n);

        let _enter = self.span.enter();
        debug!(ranked = values.len(), top_n, "Ranking computed");
        values
            .into_iter()
            .enumerate()
            .map(|(i, (fund_id, value))| {
                Ok(RankingEntry {
                    position: i + 1,
                    name: self.registry.name_of(&fund_id)?.to_string(),
                    fund_id,
                    value,
                })
            })
            .collect()
    }
}

/// Last quota of every calendar month, then the change against the
/// immediately preceding calendar month.
fn monthly_returns(rows: &[DailyRecord]) -> BTreeMap<YearMonth, f64> {
    let mut month_end: BTreeMap<YearMonth, f64> = BTreeMap::new();
    for row in rows {
        if let Some(quota) = row.quota_value {
            month_end.insert(YearMonth::of(row.date), quota);
        }
    }

    month_end
        .iter()
        .filter_map(|(month, quota)| {
            let previous = month_end.get(&month.previous()).copied();
            pct_change(previous, Some(*quota)).map(|r| (*month, r))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::tests::loaded_registry;
    use crate::core::series::tests::{FUND_A, FUND_A_ROWS, FUND_B, FUND_B_ROWS, store_with};
    use approx::assert_abs_diff_eq;

    fn ids(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn record(id: &str, date: &str, quota: f64, holders: u64) -> DailyRecord {
        DailyRecord {
            fund_id: id.to_string(),
            date: date.parse().unwrap(),
            total_value: None,
            quota_value: Some(quota),
            net_worth: Some(quota * 1000.0),
            inflow: None,
            outflow: None,
            holders: Some(holders),
        }
    }

    #[test]
    fn requires_loaded_registry() {
        let registry = FundRegistry::new();
        let result = ComparisonEngine::new(&registry, BTreeMap::new());
        assert!(matches!(result, Err(FundsError::RegistryNotLoaded)));
    }

    #[test]
    fn period_return_per_fund() {
        let registry = loaded_registry();
        let store = store_with(&[FUND_A_ROWS, FUND_B_ROWS]);
        let engine = ComparisonEngine::new(&registry, store.by_fund()).unwrap();

        let returns = engine.period_return_by_fund();
        assert_eq!(returns.len(), 2);
        assert_abs_diff_eq!(returns[FUND_A], 180.0, epsilon = 1e-9);
        assert_abs_diff_eq!(returns[FUND_B], -40.0, epsilon = 1e-9);
    }

    #[test]
    fn period_return_skips_zero_quota_rows() {
        let registry = loaded_registry();
        let mut series = BTreeMap::new();
        series.insert(
            FUND_A.to_string(),
            vec![
                record(FUND_A, "2020-02-03", 0.0, 1),
                record(FUND_A, "2020-02-04", 10.0, 1),
                record(FUND_A, "2020-02-05", 15.0, 1),
                record(FUND_A, "2020-02-06", 0.0, 1),
            ],
        );
        series.insert(FUND_B.to_string(), vec![record(FUND_B, "2020-02-03", 0.0, 1)]);
        let engine = ComparisonEngine::new(&registry, series).unwrap();

        let returns = engine.period_return_by_fund();
        assert_abs_diff_eq!(returns[FUND_A], 50.0, epsilon = 1e-9);
        assert!(!returns.contains_key(FUND_B));
    }

    #[test]
    fn named_period_returns_use_registry_names() {
        let registry = loaded_registry();
        let store = store_with(&[FUND_A_ROWS, FUND_B_ROWS]);
        let engine = ComparisonEngine::new(&registry, store.by_fund()).unwrap();

        let named = engine.named_period_returns().unwrap();
        assert_eq!(named[0].name, "VERDE FUNDO DE INVESTIMENTO");
        assert_eq!(named[1].name, "IP PARTICIPACOES FIA");
    }

    #[test]
    fn monthly_returns_keep_common_months() {
        let registry = loaded_registry();
        let store = store_with(&[FUND_A_ROWS, FUND_B_ROWS]);
        let engine = ComparisonEngine::new(&registry, store.by_fund()).unwrap();

        let table = engine.monthly_return_by_fund();
        assert_eq!(table.funds, vec![FUND_A.to_string(), FUND_B.to_string()]);
        assert_eq!(table.rows.len(), 2);

        assert_eq!(table.rows[0].month_end, "2020-03-31".parse::<NaiveDate>().unwrap());
        assert_abs_diff_eq!(table.rows[0].returns[0], 12.5, epsilon = 1e-9);
        assert_abs_diff_eq!(table.rows[0].returns[1], 7.692307, epsilon = 1e-5);

        assert_eq!(table.rows[1].month_end, "2020-04-30".parse::<NaiveDate>().unwrap());
        assert_abs_diff_eq!(table.rows[1].returns[0], 55.555555, epsilon = 1e-5);
        assert_abs_diff_eq!(table.rows[1].returns[1], -57.142857, epsilon = 1e-5);
    }

    #[test]
    fn monthly_returns_drop_months_missing_for_any_fund() {
        let registry = loaded_registry();
        let b_without_april: Vec<&str> = FUND_B_ROWS
            .lines()
            .filter(|l| !l.contains("2020-04-"))
            .collect();
        let b_rows = b_without_april.join("\n");
        let store = store_with(&[FUND_A_ROWS, b_rows.as_str()]);
        let engine = ComparisonEngine::new(&registry, store.by_fund()).unwrap();

        let table = engine.monthly_return_by_fund();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].month_end, "2020-03-31".parse::<NaiveDate>().unwrap());
    }

    #[test]
    fn monthly_returns_need_the_previous_calendar_month() {
        let rows = vec![
            record(FUND_A, "2020-01-31", 10.0, 1),
            record(FUND_A, "2020-03-31", 12.0, 1),
            record(FUND_A, "2020-04-30", 15.0, 1),
        ];
        let returns = monthly_returns(&rows);
        assert_eq!(returns.len(), 1);
        assert_abs_diff_eq!(
            returns[&YearMonth::new(2020, 4).unwrap()],
            25.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn ranks_by_last_known_field_value() {
        let registry = loaded_registry();
        let mut series = BTreeMap::new();
        series.insert(
            FUND_A.to_string(),
            vec![record(FUND_A, "2020-02-03", 10.0, 50), record(FUND_A, "2020-02-04", 10.0, 40)],
        );
        series.insert(
            FUND_B.to_string(),
            vec![record(FUND_B, "2020-02-03", 10.0, 20), record(FUND_B, "2020-02-04", 10.0, 45)],
        );
        series.insert(
            "44.000.000/0000-00".to_string(),
            vec![record("44.000.000/0000-00", "2020-02-04", 10.0, 99)],
        );
        let engine = ComparisonEngine::new(&registry, series).unwrap();

        let ranking = engine
            .rank_by_field(&ids(&[FUND_A, FUND_B]), Column::Holders, 10)
            .unwrap();
        assert_eq!(ranking.len(), 2);
        assert_eq!(ranking[0].fund_id, FUND_B);
        assert_eq!(ranking[0].position, 1);
        assert_eq!(ranking[0].name, "IP PARTICIPACOES FIA");
        assert_abs_diff_eq!(ranking[0].value, 45.0);
        assert_eq!(ranking[1].fund_id, FUND_A);
        assert_eq!(ranking[1].position, 2);

        let top = engine
            .rank_by_field(&ids(&[FUND_A, FUND_B, "44.000.000/0000-00"]), Column::Holders, 1)
            .unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].name, "RENDA FIXA SIMPLES");
    }

    #[test]
    fn ranks_by_period_return() {
        let registry = loaded_registry();
        let store = store_with(&[FUND_A_ROWS, FUND_B_ROWS]);
        let engine = ComparisonEngine::new(&registry, store.by_fund()).unwrap();

        let ranking = engine.rank_by_return(&ids(&[FUND_A, FUND_B]), 5).unwrap();
        assert_eq!(ranking.len(), 2);
        assert_eq!(ranking[0].fund_id, FUND_A);
        assert_abs_diff_eq!(ranking[0].value, 180.0, epsilon = 1e-9);
        assert_eq!(ranking[1].fund_id, FUND_B);

        let only_b = engine.rank_by_return(&ids(&[FUND_B]), 5).unwrap();
        assert_eq!(only_b.len(), 1);
        assert_eq!(only_b[0].fund_id, FUND_B);
    }

    #[test]
    fn ranking_skips_non_finite_values() {
        let registry = loaded_registry();
        let store = store_with(&[
            "11.000.000/0000-00;2020-02-03;1.00;10.00000;NaN;0.00;0.00;10",
            "22.000.000/0000-00;2020-02-03;1.00;NaN;500.00;0.00;0.00;10\n\
             22.000.000/0000-00;2020-02-04;1.00;NaN;700.00;0.00;0.00;10",
            "44.000.000/0000-00;2020-02-03;1.00;10.00000;900.00;0.00;0.00;10\n\
             44.000.000/0000-00;2020-02-04;1.00;11.00000;inf;0.00;0.00;10",
        ]);
        let engine = ComparisonEngine::new(&registry, store.by_fund()).unwrap();
        let all = ids(&[FUND_A, FUND_B, "44.000.000/0000-00"]);

        let by_net_worth = engine.rank_by_field(&all, Column::NetWorth, 10).unwrap();
        assert_eq!(by_net_worth.len(), 1);
        assert_eq!(by_net_worth[0].fund_id, FUND_B);
        assert_abs_diff_eq!(by_net_worth[0].value, 700.0);

        let by_return = engine.rank_by_return(&all, 10).unwrap();
        assert_eq!(by_return.len(), 2);
        assert_eq!(by_return[0].fund_id, "44.000.000/0000-00");
        assert_abs_diff_eq!(by_return[0].value, 10.0, epsilon = 1e-9);
        assert_eq!(by_return[1].fund_id, FUND_A);
        assert_abs_diff_eq!(by_return[1].value, 0.0);
    }

    #[test]
    fn ranking_propagates_unknown_funds() {
        let registry = loaded_registry();
        let unknown = "77.000.000/0000-00";
        let mut series = BTreeMap::new();
        series.insert(unknown.to_string(), vec![record(unknown, "2020-02-03", 10.0, 5)]);
        let engine = ComparisonEngine::new(&registry, series).unwrap();

        let result = engine.rank_by_field(&ids(&[unknown]), Column::Holders, 3);
        assert!(matches!(result, Err(FundsError::FundNotFound(id)) if id == unknown));
    }
}
