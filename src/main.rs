use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use portfolio_forecast::{
    api::{forecast_request_from_json, run_http_server},
    core::{ForecastLimits, forecast_with_limits},
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "portfolio-forecast",
    about = "Year-by-year portfolio forecasts with contributions, inflation and rebalancing"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(
        long,
        global = true,
        env = "FORECAST_MAX_HORIZON_YEARS",
        default_value_t = ForecastLimits::default().max_horizon_years,
        help = "Reject forecasts whose end year exceeds this many years"
    )]
    max_horizon_years: u32,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the forecast HTTP API
    Serve {
        #[arg(long, env = "FORECAST_PORT", default_value_t = 3000)]
        port: u16,
    },
    /// Run a single forecast from a JSON request and print the JSON response
    Forecast {
        /// Request file, or `-` for stdin
        #[arg(long, default_value = "-")]
        request: PathBuf,
        #[arg(long, help = "Print only the total value per year")]
        totals: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let limits = ForecastLimits {
        max_horizon_years: cli.max_horizon_years,
    };

    match cli.command {
        Commands::Serve { port } => run_http_server(port, limits)
            .await
            .context("forecast API server failed"),
        Commands::Forecast { request, totals } => run_forecast(&request, totals, limits),
    }
}

fn run_forecast(path: &Path, totals: bool, limits: ForecastLimits) -> anyhow::Result<()> {
    let raw = if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("failed to read request from stdin")?;
        buf
    } else {
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?
    };

    let request = forecast_request_from_json(&raw).map_err(anyhow::Error::msg)?;
    let response = forecast_with_limits(&request, limits)?;

    let rendered = if totals {
        serde_json::to_string_pretty(&response.total_values())?
    } else {
        serde_json::to_string_pretty(&response)?
    };
    println!("{rendered}");
    Ok(())
}
