// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use delivery_report::{
    build_report, default_output_name, Channel, ParseCache, ReportConfig, ReportInputs,
};

/// Build an HTML operations report from Uber Eats, DoorDash and Grubhub exports
#[derive(Parser)]
#[command(name = "delivery-report")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Report configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the HTML report to a file
    Render(RenderArgs),

    /// Show the metrics in a terminal preview
    Preview(InputArgs),
}

#[derive(Args)]
struct InputArgs {
    /// Uber Eats export (CSV)
    #[arg(long)]
    uber: Option<PathBuf>,

    /// DoorDash export (CSV)
    #[arg(long)]
    doordash: Option<PathBuf>,

    /// Grubhub export (CSV)
    #[arg(long)]
    grubhub: Option<PathBuf>,

    /// Export whose channel is detected from its filename (repeatable)
    #[arg(short, long = "input")]
    inputs: Vec<PathBuf>,
}

#[derive(Args)]
struct RenderArgs {
    #[command(flatten)]
    inputs: InputArgs,

    /// Output file (default: delivery_report_YYYYMMDD.html)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl InputArgs {
    fn to_inputs(&self) -> Result<ReportInputs> {
        let mut inputs = ReportInputs::new();

        for path in &self.inputs {
            inputs = inputs.with_detected(path.clone())?;
        }

        // Explicit flags win over detection
        for (channel, path) in [
            (Channel::UberEats, &self.uber),
            (Channel::DoorDash, &self.doordash),
            (Channel::Grubhub, &self.grubhub),
        ] {
            if let Some(p) = path {
                inputs = inputs.with(channel, p.clone());
            }
        }

        Ok(inputs)
    }
}

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<ReportConfig> {
    match path {
        Some(p) => ReportConfig::load(p).with_context(|| "Failed to load report configuration"),
        None => Ok(ReportConfig::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Render(args) => run_render(&args, &config),
        Commands::Preview(args) => run_preview(&args, &config),
    }
}

fn run_render(args: &RenderArgs, config: &ReportConfig) -> Result<()> {
    let inputs = args.inputs.to_inputs()?;
    if inputs.is_empty() {
        warn!("no exports given; writing an empty report");
    }

    let generated_at = Local::now().naive_local();
    let mut cache = ParseCache::new();
    let output = build_report(&inputs, config, &mut cache, generated_at)?;

    let path = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(default_output_name(generated_at)));
    std::fs::write(&path, &output.html)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;

    info!(file = %path.display(), bytes = output.html.len(), "report written");
    println!("{}", path.display());

    Ok(())
}

#[cfg(feature = "tui")]
fn run_preview(args: &InputArgs, config: &ReportConfig) -> Result<()> {
    let inputs = args.to_inputs()?;
    let mut cache = ParseCache::new();
    let output = build_report(&inputs, config, &mut cache, Local::now().naive_local())?;

    let mut app = ui::App::new(output.metrics, output.tables, config.clone());
    ui::run_ui(&mut app)
}

#[cfg(not(feature = "tui"))]
fn run_preview(_args: &InputArgs, _config: &ReportConfig) -> Result<()> {
    anyhow::bail!("terminal preview not available; rebuild with --features tui")
}
