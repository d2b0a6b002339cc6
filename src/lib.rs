pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

pub use crate::core::config;

use anyhow::Result;
use cli::Session;
use cli::compare::CompareArgs;
use cli::rank::RankArgs;
use cli::report::ReportArgs;
use cli::search::SearchArgs;
use tracing::{debug, info};

/// Commands that read regulator data.
pub enum AppCommand {
    Search(SearchArgs),
    Report(ReportArgs),
    Compare(CompareArgs),
    Rank(RankArgs),
}

/// Output options shared by every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    pub json: bool,
}

pub async fn run_command(
    command: AppCommand,
    config_path: Option<&str>,
    output: OutputOptions,
) -> Result<()> {
    info!("fundosbr starting...");

    let config = match config_path {
        Some(path) => config::AppConfig::load_from_path(path)?,
        None => config::AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let session = Session::new(config, output.json)?;
    match command {
        AppCommand::Search(args) => cli::search::run(&session, &args).await,
        AppCommand::Report(args) => cli::report::run(&session, &args).await,
        AppCommand::Compare(args) => cli::compare::run(&session, &args).await,
        AppCommand::Rank(args) => cli::rank::run(&session, &args).await,
    }
}
