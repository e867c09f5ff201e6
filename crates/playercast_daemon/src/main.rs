use clap::{Parser, Subcommand};
use playercast_core::{compute_forecast, ForecastConfig};
use playercast_daemon::api::run_api_server;
use playercast_daemon::config::Config;
use playercast_daemon::input::parse_series;
use std::fs;
use std::io::{self, Read};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "playercast")]
#[command(about = "Player-count forecasting service", version)]
struct Cli {
    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Port override (defaults to the config file value)
        #[arg(long)]
        port: Option<u16>,
        /// Bind all interfaces instead of loopback
        #[arg(long)]
        public: bool,
    },
    /// Forecast a series read from a file ("-" for stdin) and print JSON
    Forecast {
        /// Input file: JSON array or one value per line
        #[arg(long, short)]
        input: String,

        #[command(flatten)]
        config: ForecastConfig,
    },
    /// Print the effective configuration as TOML
    ConfigShow,
}

fn read_input(path: &str) -> io::Result<String> {
    if path == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        fs::read_to_string(path)
    }
}

fn forecast_file(input: &str, config: &ForecastConfig) -> anyhow::Result<()> {
    let text = read_input(input)?;
    let series = parse_series(&text)?;
    info!(samples = series.len(), horizon = config.horizon, "Forecasting input series");

    let result = compute_forecast(&series, config)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn serve(port: Option<u16>, public: bool) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(port) = port {
        config.api.port = port;
    }
    config.api.public |= public;

    info!(
        port = config.api.port,
        cache_capacity = config.cache.capacity,
        "Starting playercast API"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_api_server(config))
        .map_err(|e| anyhow::anyhow!("API server failed: {}", e))
}

fn config_show() -> anyhow::Result<()> {
    let config = Config::load()?;
    println!("# {}", Config::get_config_path().display());
    print!("{}", config.to_toml()?);
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_max_level(level)
        .with_writer(io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install log subscriber: {}", e);
    }

    let result = match cli.command {
        Commands::Serve { port, public } => serve(port, public),
        Commands::Forecast { input, config } => forecast_file(&input, &config),
        Commands::ConfigShow => config_show(),
    };

    if let Err(e) = result {
        error!(error = %e, "Fatal Error");
        std::process::exit(1);
    }
}
