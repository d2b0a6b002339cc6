use anyhow::Result;
use clap::{ArgGroup, Args, CommandFactory, Parser, Subcommand, ValueEnum};
use fundosbr::cli::compare::CompareArgs;
use fundosbr::cli::rank::{DEFAULT_TOP, RankArgs, RankBy};
use fundosbr::cli::report::ReportArgs;
use fundosbr::cli::search::SearchArgs;
use fundosbr::core::log::init_logging;
use fundosbr::core::{FundClass, FundsError, YearMonth};
use std::process::ExitCode;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ClassArg {
    Acoes,
    Multimercado,
    Cambial,
    Rendafixa,
}

impl From<ClassArg> for FundClass {
    fn from(class: ClassArg) -> FundClass {
        match class {
            ClassArg::Acoes => FundClass::Equity,
            ClassArg::Multimercado => FundClass::MultiStrategy,
            ClassArg::Cambial => FundClass::Fx,
            ClassArg::Rendafixa => FundClass::FixedIncome,
        }
    }
}

#[derive(Args)]
struct PeriodArgs {
    /// First month, as YYYYMM (defaults to the current month)
    #[arg(long)]
    start: Option<YearMonth>,

    /// Last month, as YYYYMM (defaults to the current month)
    #[arg(long)]
    end: Option<YearMonth>,
}

#[derive(Args)]
#[command(group(ArgGroup::new("by").required(true).args(["holders", "net_worth", "return"])))]
struct RankCommand {
    /// Fund class to rank
    #[arg(value_enum)]
    class: ClassArg,

    /// Rank by number of holders
    #[arg(long)]
    holders: bool,

    /// Rank by net worth
    #[arg(long)]
    net_worth: bool,

    /// Rank by return over the period
    #[arg(long = "return")]
    r#return: bool,

    /// Number of funds to show
    #[arg(long, default_value_t = DEFAULT_TOP)]
    top: usize,

    #[command(flatten)]
    period: PeriodArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Search the fund registry
    Search {
        /// Part of the fund name
        #[arg(short, long)]
        name: Option<String>,

        /// Fund class
        #[arg(short = 't', long = "type", value_enum)]
        class: Option<ClassArg>,

        /// Show every registry field of one fund
        #[arg(short = 'C', long)]
        cnpj: Option<String>,

        /// Include cancelled funds
        #[arg(short, long)]
        all: bool,
    },
    /// Daily report and statistics of one fund
    Report {
        /// Fund CNPJ
        cnpj: String,

        #[command(flatten)]
        period: PeriodArgs,

        /// Include monthly statistics
        #[arg(short, long)]
        monthly: bool,
    },
    /// Compare returns of several funds
    Compare {
        /// Fund CNPJs separated by ','
        #[arg(value_delimiter = ',', required = true)]
        cnpjs: Vec<String>,

        #[command(flatten)]
        period: PeriodArgs,
    },
    /// Rank active funds of a class
    Rank(RankCommand),
}

impl From<Commands> for fundosbr::AppCommand {
    fn from(cmd: Commands) -> fundosbr::AppCommand {
        match cmd {
            Commands::Search {
                name,
                class,
                cnpj,
                all,
            } => fundosbr::AppCommand::Search(SearchArgs {
                name,
                class: class.map(FundClass::from),
                cnpj,
                include_cancelled: all,
            }),
            Commands::Report {
                cnpj,
                period,
                monthly,
            } => fundosbr::AppCommand::Report(ReportArgs {
                cnpj,
                start: period.start,
                end: period.end,
                monthly,
            }),
            Commands::Compare { cnpjs, period } => fundosbr::AppCommand::Compare(CompareArgs {
                cnpjs,
                start: period.start,
                end: period.end,
            }),
            Commands::Rank(rank) => {
                let by = if rank.holders {
                    RankBy::Holders
                } else if rank.net_worth {
                    RankBy::NetWorth
                } else {
                    RankBy::Return
                };
                fundosbr::AppCommand::Rank(RankArgs {
                    class: rank.class.into(),
                    by,
                    top: rank.top,
                    start: rank.period.start,
                    end: rank.period.end,
                })
            }
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => fundosbr::cli::setup::setup(),
        Some(cmd) => {
            let output = fundosbr::OutputOptions { json: cli.json };
            fundosbr::run_command(cmd.into(), cli.config_path.as_deref(), output).await
        }
        None => print_help(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Application failed");
            eprintln!("Error: {e:#}");
            e.downcast_ref::<FundsError>()
                .map_or(ExitCode::FAILURE, ExitCode::from)
        }
    }
}

fn print_help() -> Result<()> {
    Cli::command().print_help()?;
    Ok(())
}
