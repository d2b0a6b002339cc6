use super::{Session, ui};
use crate::core::{ComparisonEngine, FundsError, MonthRange, MonthlyReturnTable, RankingEntry, YearMonth};
use anyhow::Result;
use comfy_table::Cell;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::info_span;

#[derive(Debug, Clone)]
pub struct CompareArgs {
    pub cnpjs: Vec<String>,
    pub start: Option<YearMonth>,
    pub end: Option<YearMonth>,
}

#[derive(Serialize)]
struct Comparison {
    period_returns: Vec<RankingEntry>,
    monthly_returns: MonthlyReturnTable,
    missing: BTreeSet<String>,
}

pub async fn run(session: &Session, args: &CompareArgs) -> Result<()> {
    let range = MonthRange::validate(args.start, args.end, YearMonth::current())?;
    let registry = session.load_registry().await?;

    let mut ids = BTreeSet::new();
    for cnpj in &args.cnpjs {
        ids.insert(registry.lookup(cnpj)?.id.clone());
    }

    let (store, report) = session.load_daily(&range, &ids, None).await?;
    if store.is_empty() {
        return Err(FundsError::InsufficientData(format!(
            "no daily records for {} between {} and {}",
            args.cnpjs.join(", "),
            range.start(),
            range.end()
        ))
        .into());
    }

    let engine = ComparisonEngine::new(&registry, store.by_fund())?
        .with_span(info_span!("compare", funds = ids.len()));
    let comparison = Comparison {
        period_returns: engine.named_period_returns()?,
        monthly_returns: engine.monthly_return_by_fund(),
        missing: report.missing,
    };

    if session.json() {
        return ui::print_json(&comparison);
    }
    display_comparison(&comparison);
    Ok(())
}

fn display_comparison(comparison: &Comparison) {
    println!(
        "\n{}",
        ui::style_text("Period return", ui::StyleType::Title)
    );
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("CNPJ"),
        ui::header_cell("Name"),
        ui::header_cell("Return"),
    ]);
    for entry in &comparison.period_returns {
        table.add_row(vec![
            Cell::new(&entry.fund_id),
            Cell::new(&entry.name),
            ui::change_cell(entry.value),
        ]);
    }
    println!("{table}");

    for id in &comparison.missing {
        println!(
            "{}",
            ui::style_text(
                &format!("No daily records found for {id}"),
                ui::StyleType::Error
            )
        );
    }

    ui::print_separator();
    println!(
        "{}",
        ui::style_text("Monthly return", ui::StyleType::Title)
    );
    let monthly = &comparison.monthly_returns;
    if monthly.rows.is_empty() {
        println!(
            "{}",
            ui::style_text(
                "Not enough months in common to compare",
                ui::StyleType::Subtle
            )
        );
        return;
    }

    let mut table = ui::new_styled_table();
    let mut header = vec![ui::header_cell("Date")];
    header.extend(monthly.funds.iter().map(|id| ui::header_cell(id)));
    table.set_header(header);
    for row in &monthly.rows {
        let mut cells = vec![Cell::new(row.month_end)];
        cells.extend(row.returns.iter().map(|r| ui::change_cell(*r)));
        table.add_row(cells);
    }
    println!("{table}");
}
