use crate::infra::{build_controller, parse_date, LeadController};
use crate::interactive::{describe, Session};
use crate::server;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use lead_agent::config::AppConfig;
use lead_agent::error::AppError;
use lead_agent::telemetry;
use lead_agent::workflows::leads::{
    import_leads_from_path, LeadFilter, LeadId, LeadReporter, LeadStatus,
};
use std::io;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "lead-agent",
    about = "Qualify, contact, and hand off sales leads from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the interactive menu (default command)
    Interactive,
    /// Print the lead report as JSON
    Report(ReportArgs),
    /// Create leads from a CSV export whose header row names the attributes
    Import(ImportArgs),
    /// Close a lead from any status; closing an already closed lead is a no-op
    Close(CloseArgs),
    /// Start the HTTP service
    Serve(ServeArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ReportArgs {
    /// Only count leads currently in this status (e.g. QUALIFIED)
    #[arg(long)]
    pub(crate) status: Option<LeadStatus>,
    /// Earliest creation date to include (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) from: Option<NaiveDate>,
    /// Latest creation date to include (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) to: Option<NaiveDate>,
}

impl ReportArgs {
    fn filter(&self) -> LeadFilter {
        LeadFilter {
            status: self.status,
            created_from: self.from,
            created_to: self.to,
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// CSV file to import
    #[arg(long)]
    pub(crate) csv: PathBuf,
}

#[derive(Args, Debug)]
pub(crate) struct CloseArgs {
    /// Lead to close
    pub(crate) lead_id: String,
    /// Why the lead is being closed
    #[arg(long, default_value = "")]
    pub(crate) reason: String,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let controller = build_controller(&config)?;

    match cli.command.unwrap_or(Command::Interactive) {
        Command::Interactive => run_interactive(&controller),
        Command::Report(args) => run_report(&controller, &args),
        Command::Import(args) => run_import(&controller, &args),
        Command::Close(args) => run_close(&controller, &args),
        Command::Serve(args) => server::run(config, controller, args).await,
    }
}

fn run_interactive(controller: &LeadController) -> Result<(), AppError> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    Session::new(controller, stdin.lock(), stdout.lock()).run()?;
    Ok(())
}

fn run_report(controller: &LeadController, args: &ReportArgs) -> Result<(), AppError> {
    let report = LeadReporter::new(controller.store().clone()).report(&args.filter())?;
    let rendered = serde_json::to_string_pretty(&report).map_err(io::Error::from)?;
    println!("{rendered}");
    Ok(())
}

fn run_import(controller: &LeadController, args: &ImportArgs) -> Result<(), AppError> {
    let summary = import_leads_from_path(controller, &args.csv)?;

    println!("Imported {} lead(s)", summary.created.len());
    for id in &summary.created {
        println!("  created {id}");
    }
    if !summary.rejected.is_empty() {
        println!("Rejected {} row(s)", summary.rejected.len());
        for row in &summary.rejected {
            println!("  line {}: {}", row.line, row.reason);
        }
    }
    Ok(())
}

fn run_close(controller: &LeadController, args: &CloseArgs) -> Result<(), AppError> {
    let lead = controller.close_lead(&LeadId(args.lead_id.clone()), &args.reason)?;
    println!("{}", describe(&lead));
    Ok(())
}
