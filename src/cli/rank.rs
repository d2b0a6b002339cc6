use super::{Session, ui};
use crate::core::series::Column;
use crate::core::{ComparisonEngine, FundClass, FundStatus, FundsError, MonthRange, YearMonth};
use anyhow::Result;
use comfy_table::{Cell, CellAlignment};
use std::collections::BTreeSet;
use tracing::{debug, info_span};

pub const DEFAULT_TOP: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankBy {
    Holders,
    NetWorth,
    Return,
}

impl RankBy {
    fn label(self) -> &'static str {
        match self {
            RankBy::Holders => "Holders",
            RankBy::NetWorth => "Net Worth",
            RankBy::Return => "Return",
        }
    }

    fn column(self) -> Column {
        match self {
            RankBy::Holders => Column::Holders,
            RankBy::NetWorth => Column::NetWorth,
            RankBy::Return => Column::QuotaValue,
        }
    }

    fn format(self, value: f64) -> Cell {
        match self {
            RankBy::Holders => {
                Cell::new(format!("{value:.0}")).set_alignment(CellAlignment::Right)
            }
            RankBy::NetWorth => {
                Cell::new(ui::format_currency(value)).set_alignment(CellAlignment::Right)
            }
            RankBy::Return => ui::change_cell(value),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RankArgs {
    pub class: FundClass,
    pub by: RankBy,
    pub top: usize,
    pub start: Option<YearMonth>,
    pub end: Option<YearMonth>,
}

pub async fn run(session: &Session, args: &RankArgs) -> Result<()> {
    let range = MonthRange::validate(args.start, args.end, YearMonth::current())?;
    let registry = session.load_registry().await?;

    let ids: BTreeSet<String> = registry
        .search(None, Some(&args.class), false)?
        .into_iter()
        .filter(|r| r.status == FundStatus::Active)
        .map(|r| r.id.clone())
        .collect();
    if ids.is_empty() {
        return Err(FundsError::FundNotFound(format!("active funds of class {}", args.class)).into());
    }
    debug!(candidates = ids.len(), class = %args.class, "Ranking candidates");

    let columns = BTreeSet::from([args.by.column()]);
    let (store, _) = session.load_daily(&range, &ids, Some(&columns)).await?;

    let engine = ComparisonEngine::new(&registry, store.by_fund())?
        .with_span(info_span!("rank", class = %args.class));
    let ranking = match args.by {
        RankBy::Return => engine.rank_by_return(&ids, args.top)?,
        by => engine.rank_by_field(&ids, by.column(), args.top)?,
    };

    if session.json() {
        return ui::print_json(&ranking);
    }

    println!(
        "\n{}",
        ui::style_text(
            &format!("Top {} {} by {}", args.top, args.class, args.by.label()),
            ui::StyleType::Title
        )
    );
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("#"),
        ui::header_cell("CNPJ"),
        ui::header_cell("Name"),
        ui::header_cell(args.by.label()),
    ]);
    for entry in &ranking {
        table.add_row(vec![
            Cell::new(entry.position),
            Cell::new(&entry.fund_id),
            Cell::new(&entry.name),
            args.by.format(entry.value),
        ]);
    }
    println!("{table}");
    Ok(())
}
