use super::{Session, ui};
use crate::core::{FundClass, FundsError, RegistryRecord};
use anyhow::Result;
use comfy_table::Cell;

#[derive(Debug, Clone, Default)]
pub struct SearchArgs {
    pub name: Option<String>,
    pub class: Option<FundClass>,
    pub cnpj: Option<String>,
    pub include_cancelled: bool,
}

pub async fn run(session: &Session, args: &SearchArgs) -> Result<()> {
    let registry = session.load_registry().await?;

    if let Some(cnpj) = &args.cnpj {
        let record = registry.lookup(cnpj)?;
        if session.json() {
            return ui::print_json(record);
        }
        display_detail(record);
        return Ok(());
    }

    let found = registry.search(
        args.name.as_deref(),
        args.class.as_ref(),
        args.include_cancelled,
    )?;
    if found.is_empty() {
        let query = args
            .name
            .as_deref()
            .map_or_else(|| "matching the given filters".to_string(), |n| format!("'{n}'"));
        return Err(FundsError::FundNotFound(query).into());
    }

    if session.json() {
        return ui::print_json(&found);
    }
    display_results(&found);
    Ok(())
}

fn display_detail(record: &RegistryRecord) {
    println!(
        "\nFund: {}",
        ui::style_text(&record.name, ui::StyleType::Title)
    );
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Field"), ui::header_cell("Value")]);
    for (label, value) in record.labelled_fields() {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    println!("{table}");
}

fn display_results(found: &[&RegistryRecord]) {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("CNPJ"),
        ui::header_cell("Name"),
        ui::header_cell("Status"),
        ui::header_cell("Class"),
    ]);
    for record in found {
        table.add_row(vec![
            Cell::new(&record.id),
            Cell::new(&record.name),
            Cell::new(record.status.to_string()),
            Cell::new(record.class.to_string()),
        ]);
    }
    println!("{table}");
    println!(
        "{}",
        ui::style_text(&format!("{} fund(s) found", found.len()), ui::StyleType::Subtle)
    );
}
