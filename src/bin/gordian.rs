//! Command-line entry point.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use gordian::core::config::GordianConfig;
use gordian::engine::GordianEngine;
use gordian::io::reports::AnalysisReport;
use gordian::store::{create_store, StoreBackend, StoreConfig};

#[derive(Parser)]
#[command(
    name = "gordian",
    version,
    about = "Circular-dependency analysis for JavaScript/TypeScript projects"
)]
struct Cli {
    /// Optional YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose (debug-level) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a directory and print the cycle report
    Analyze {
        /// Root directory to analyze
        path: PathBuf,

        /// Report output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Analyze a directory and persist the graph through the JSON-file store
    Export {
        /// Root directory to analyze
        path: PathBuf,

        /// Destination graph file
        #[arg(short = 'g', long, default_value = "dependency-graph.json")]
        graph_file: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gordian={default_level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<GordianConfig> {
    match path {
        Some(path) => GordianConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(GordianConfig::default()),
    }
}

fn render_report(report: &AnalysisReport, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Yaml => serde_yaml::to_string(report)?,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Analyze {
            path,
            format,
            output,
        } => {
            let mut engine = GordianEngine::new(config)?;
            let report = engine.analyze_directory(&path).await?;
            let rendered = render_report(&report, format)?;
            match output {
                Some(file) => {
                    std::fs::write(&file, rendered)
                        .with_context(|| format!("failed to write report to {}", file.display()))?;
                    eprintln!(
                        "report written to {} (health {:.0}, {} cycle(s))",
                        file.display(),
                        report.health_score,
                        report.total_cycles
                    );
                }
                None => println!("{rendered}"),
            }
            if report.critical_cycles > 0 {
                std::process::exit(1);
            }
        }
        Command::Export { path, graph_file } => {
            let mut engine = GordianEngine::new(config)?;
            let report = engine.analyze_directory(&path).await?;
            let store_config = StoreConfig {
                backend: StoreBackend::JsonFile {
                    path: graph_file.clone(),
                },
            };
            let mut store = create_store(&store_config)?;
            engine.export_to_store(store.as_mut()).await?;
            eprintln!(
                "graph with {} node(s) exported to {} ({} cycle(s) detected)",
                report.files_scanned,
                graph_file.display(),
                report.total_cycles
            );
        }
    }

    Ok(())
}
