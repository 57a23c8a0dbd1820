//! routescope command-line client
//!
//! Compiles, explains and runs spatial queries over GeoJSON or SQLite
//! datasets.

mod commands;
mod formatter;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args as ClapArgs, Parser, Subcommand};
use commands::Inputs;
use formatter::OutputFormat;
use routescope_client::{QueryEngine, ServiceConfig};

/// routescope command-line client
#[derive(Parser, Debug)]
#[command(name = "routescope")]
#[command(version, about = "Spatial queries over transit routes and stops")]
pub struct Args {
    /// Output format
    #[arg(long, global = true, default_value = "table", value_enum)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate and compile a query
    Compile(InputArgs),
    /// Show the tier, predicate and statement a query would run with
    Explain(RunArgs),
    /// Execute a query against a dataset
    Run(RunArgs),
}

#[derive(ClapArgs, Debug)]
pub struct InputArgs {
    /// Query JSON file
    #[arg(short, long)]
    pub query: PathBuf,

    /// Execution context JSON file
    #[arg(short, long)]
    pub context: PathBuf,

    /// Selected point as LAT,LNG (overrides the context)
    #[arg(short, long, allow_hyphen_values = true)]
    pub point: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Routes GeoJSON FeatureCollection
    #[arg(long, conflicts_with = "sqlite")]
    pub routes: Option<PathBuf>,

    /// Stops GeoJSON FeatureCollection
    #[arg(long, conflicts_with = "sqlite")]
    pub stops: Option<PathBuf>,

    /// SQLite database file
    #[arg(long)]
    pub sqlite: Option<PathBuf>,

    /// Abort the engine call after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Routes table name
    #[arg(long, default_value = routescope_client::config::DEFAULT_ROUTES_TABLE)]
    pub routes_table: String,

    /// Stops table name
    #[arg(long, default_value = routescope_client::config::DEFAULT_STOPS_TABLE)]
    pub stops_table: String,
}

impl RunArgs {
    fn config(&self) -> ServiceConfig {
        let mut config = ServiceConfig::new()
            .with_routes_table(self.routes_table.as_str())
            .with_stops_table(self.stops_table.as_str());
        if let Some(ms) = self.timeout_ms {
            config = config.with_execution_timeout(Duration::from_millis(ms));
        }
        config
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("routescope_cli=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let formatter = formatter::create_formatter(args.format);

    match args.command {
        Command::Compile(input) => {
            let inputs = load(&input)?;
            match commands::compile(&inputs) {
                Ok(compiled) => println!("{}", formatter.format_compiled(&compiled)),
                Err(e) => {
                    eprintln!("{}", formatter.format_error(&e.to_string()));
                    std::process::exit(1);
                }
            }
        }
        Command::Explain(run_args) => {
            let inputs = load(&run_args.input)?;
            let explanation = commands::explain(&inputs, &run_args.config())?;
            println!("{}", formatter.format_explanation(&explanation));
        }
        Command::Run(run_args) => {
            let inputs = load(&run_args.input)?;
            let config = run_args.config();
            let engine = open_engine(&run_args, &inputs, &config)?;
            let result = commands::run(&inputs, engine, config).await;
            println!("{}", formatter.format_result(&result));
            if !result.success {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

fn load(input: &InputArgs) -> Result<Inputs, commands::CliError> {
    Inputs::load(&input.query, &input.context, input.point.as_deref())
}

fn open_engine(
    args: &RunArgs,
    inputs: &Inputs,
    config: &ServiceConfig,
) -> Result<Arc<dyn QueryEngine>, Box<dyn std::error::Error>> {
    if let Some(path) = &args.sqlite {
        tracing::info!(path = %path.display(), "opening sqlite database");
        let engine = routescope_client::SqliteEngine::open(path)?;
        return Ok(Arc::new(engine));
    }
    if args.routes.is_none() && args.stops.is_none() {
        return Err("run needs a dataset: pass --routes/--stops GeoJSON or --sqlite".into());
    }
    let engine = commands::memory_engine(
        args.routes.as_deref(),
        args.stops.as_deref(),
        &inputs.context,
        config,
    )?;
    Ok(Arc::new(engine))
}
