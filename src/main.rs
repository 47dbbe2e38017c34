use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use healthcare_elt::config::{Config, DEFAULT_CONFIG_PATH};
use healthcare_elt::logging;
use healthcare_elt::pipeline::{PipelineExecutionResult, PipelineOrchestrator, Stage};
use healthcare_elt::PipelineError;

#[derive(Parser)]
#[command(name = "healthcare_elt")]
#[command(about = "CMS hospital ELT pipeline: extract, load, transform, test, document and visualize")]
#[command(version)]
struct Cli {
    /// Pipeline configuration file; missing file means defaults
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Run every stage (the default)
    Run,
    /// Acquire the hospital CSV and load it into the raw table
    Extract,
    /// Build the staging view and both marts
    Transform,
    /// Run the data tests against the built models
    Test,
    /// Generate the model documentation
    Docs,
    /// Render the dashboard and print insights
    Visualize,
}

impl Commands {
    fn stages(self) -> &'static [Stage] {
        match self {
            Commands::Run => &Stage::ALL,
            Commands::Extract => &[Stage::ExtractLoad],
            Commands::Transform => &Stage::TRANSFORM,
            Commands::Test => &[Stage::DataTests],
            Commands::Docs => &[Stage::Docs],
            Commands::Visualize => &[Stage::Visualize],
        }
    }
}

fn print_banner(title: &str) {
    println!("\n{}", "=".repeat(60));
    println!("{title}");
    println!("{}", "=".repeat(60));
}

fn print_results(result: &PipelineExecutionResult) {
    println!("\n📊 Pipeline results (run {}):", result.run_id);
    for step in &result.steps {
        println!(
            "   ✅ {:<13} {} ({} ms)",
            step.stage, step.message, step.elapsed_ms
        );
    }

    if let Some(duration) = result.duration() {
        println!("   ⏱️  Total {} ms", duration.num_milliseconds());
    }

    if let Some(insights) = &result.insights {
        print_banner("KEY INSIGHTS FROM THE PIPELINE");
        println!("{insights}");
    }

    if !result.fingerprints.relations.is_empty() {
        if result.changed_relations.is_empty() {
            println!("\n🔁 No relation changed since the previous run");
        } else {
            println!("\n🔁 Changed since previous run: {}", result.changed_relations.join(", "));
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<PipelineExecutionResult> {
    let config = Config::load(&cli.config).with_context(|| format!("loading {}", cli.config.display()))?;
    let command = cli.command.unwrap_or(Commands::Run);
    let db_path = config.warehouse.path.clone();
    let orchestrator =
        PipelineOrchestrator::new(config).with_context(|| format!("opening warehouse at {}", db_path.display()))?;

    let result = match command {
        Commands::Run => orchestrator.run()?,
        other => orchestrator.run_stages(other.stages())?,
    };
    Ok(result)
}

/// Stage failures carry their own exit code; anything else is treated as a config error.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<PipelineError>().map_or(1, PipelineError::exit_code)
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let _guard = logging::init_logging();

    let cli = Cli::parse();
    info!("Starting healthcare_elt with config {}", cli.config.display());

    match run(&cli) {
        Ok(result) => {
            print_results(&result);
            print_banner("✓ PIPELINE COMPLETE");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Pipeline failed: {:#}", e);
            eprintln!("\n❌ {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}
