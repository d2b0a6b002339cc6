use super::{Session, ui};
use crate::core::{
    DailyMetric, FundSeries, FundsError, IngestStatus, MetricsEngine, MonthRange, MonthlySummary,
    PeriodSummary, YearMonth,
};
use anyhow::Result;
use chrono::NaiveDate;
use comfy_table::Cell;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::info_span;

#[derive(Debug, Clone)]
pub struct ReportArgs {
    pub cnpj: String,
    pub start: Option<YearMonth>,
    pub end: Option<YearMonth>,
    pub monthly: bool,
}

#[derive(Serialize)]
struct ReportRow {
    date: NaiveDate,
    quota_value: Option<f64>,
    net_worth: Option<f64>,
    inflow: Option<f64>,
    outflow: Option<f64>,
    holders: Option<u64>,
    daily_return: Option<f64>,
    cumulative_return: Option<f64>,
}

#[derive(Serialize)]
struct FundReport<'a> {
    fund_id: &'a str,
    name: &'a str,
    manager: &'a str,
    daily: Vec<ReportRow>,
    summary: PeriodSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    monthly: Option<Vec<MonthlySummary>>,
}

pub async fn run(session: &Session, args: &ReportArgs) -> Result<()> {
    let range = MonthRange::validate(args.start, args.end, YearMonth::current())?;
    let registry = session.load_registry().await?;
    let record = registry.lookup(&args.cnpj)?;

    let ids = BTreeSet::from([record.id.clone()]);
    let (store, ingest) = session.load_daily(&range, &ids, None).await?;
    if ingest.status == IngestStatus::Partial {
        return Err(FundsError::FundNotFound(record.id.clone()).into());
    }
    let series = store.single_fund_view()?;

    let engine =
        MetricsEngine::new(&series).with_span(info_span!("report", fund = %record.id));
    let summary = engine.period_summary()?;
    let monthly = if args.monthly {
        Some(engine.monthly_summary()?)
    } else {
        None
    };
    let daily = report_rows(
        &series,
        &engine.daily_returns(),
        &engine.cumulative_returns(),
    );

    let report = FundReport {
        fund_id: &record.id,
        name: &record.name,
        manager: registry.manager_of(&record.id)?,
        daily,
        summary,
        monthly,
    };
    if session.json() {
        return ui::print_json(&report);
    }
    display_report(&report);
    Ok(())
}

fn report_rows(
    series: &FundSeries,
    daily: &[DailyMetric],
    cumulative: &[DailyMetric],
) -> Vec<ReportRow> {
    series
        .points
        .iter()
        .zip(daily.iter().zip(cumulative))
        .map(|(point, (d, c))| ReportRow {
            date: point.date,
            quota_value: point.quota_value,
            net_worth: point.net_worth,
            inflow: point.inflow,
            outflow: point.outflow,
            holders: point.holders,
            daily_return: d.value,
            cumulative_return: c.value,
        })
        .collect()
}

fn display_report(report: &FundReport) {
    println!(
        "\nFund: {} ({})",
        ui::style_text(report.name, ui::StyleType::Title),
        report.fund_id
    );
    println!("Manager: {}", report.manager);

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell("Quota"),
        ui::header_cell("Net Worth"),
        ui::header_cell("Inflow"),
        ui::header_cell("Outflow"),
        ui::header_cell("Holders"),
        ui::header_cell("Daily"),
        ui::header_cell("Cumulative"),
    ]);
    for row in &report.daily {
        table.add_row(vec![
            Cell::new(row.date),
            ui::format_optional_cell(row.quota_value, |v| format!("{v:.6}")),
            ui::format_optional_cell(row.net_worth, ui::format_currency),
            ui::format_optional_cell(row.inflow, ui::format_currency),
            ui::format_optional_cell(row.outflow, ui::format_currency),
            ui::format_optional_cell(row.holders, |v| v.to_string()),
            ui::optional_change_cell(row.daily_return),
            ui::optional_change_cell(row.cumulative_return),
        ]);
    }
    println!("{table}");

    let summary = &report.summary;
    println!(
        "\n{} {}",
        ui::style_text("Period return:", ui::StyleType::TotalLabel),
        ui::style_text(
            &format!("{:.2}%", summary.period_return),
            ui::StyleType::TotalValue
        )
    );
    println!(
        "{} {}",
        ui::style_text("Holders change:", ui::StyleType::TotalLabel),
        summary
            .holder_delta
            .map_or_else(|| "N/A".to_string(), |d| format!("{d:+}"))
    );
    println!(
        "{} {}",
        ui::style_text("Net flow:", ui::StyleType::TotalLabel),
        ui::format_currency(summary.net_flow)
    );

    if let Some(monthly) = &report.monthly {
        ui::print_separator();
        println!(
            "{}",
            ui::style_text("Monthly statistics", ui::StyleType::Title)
        );
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Month"),
            ui::header_cell("Return"),
            ui::header_cell("Holders"),
            ui::header_cell("Net Flow"),
        ]);
        for row in monthly {
            table.add_row(vec![
                Cell::new(format!("{:04}-{:02}", row.year, row.month)),
                ui::change_cell(row.monthly_return),
                Cell::new(format!("{:+}", row.holder_delta)),
                Cell::new(ui::format_currency(row.net_flow)),
            ]);
        }
        println!("{table}");
    }
}
