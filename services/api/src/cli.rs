use crate::demo::{run_demo, run_fiscal_export, run_fiscal_summary, DemoArgs, ExportArgs, SummaryArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use proprieto::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Proprieto",
    about = "Serve and query the Proprieto rental income and ANAF D212 tax engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Compute or export the D212 figures for a portfolio file
    Fiscal {
        #[command(subcommand)]
        command: FiscalCommand,
    },
    /// Walk through co-ownership edits and a fiscal summary on the bundled demo portfolio
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum FiscalCommand {
    /// Print income, tax and CASS for the selected scope
    Summary(SummaryArgs),
    /// Write the per-contract D212 income annex as CSV
    Export(ExportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// JSON portfolio dump used to seed the in-memory store
    #[arg(long)]
    pub(crate) portfolio: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Fiscal {
            command: FiscalCommand::Summary(args),
        } => run_fiscal_summary(args),
        Command::Fiscal {
            command: FiscalCommand::Export(args),
        } => run_fiscal_export(args),
        Command::Demo(args) => run_demo(args),
    }
}
