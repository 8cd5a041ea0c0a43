use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tc_data::CsvSeriesLoader;
use tc_engine::{ForecastConfig, Forecaster};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "tc-forecast")]
#[command(about = "Forecast every series in a long-format CSV", long_about = None)]
struct Args {
    /// Input CSV (series_id,timestamp,value[,feature...])
    #[arg(short, long)]
    data: PathBuf,

    /// JSON forecast configuration; omitted fields take their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Periods to forecast past the end of each series
    #[arg(long, default_value_t = 7)]
    horizon: usize,

    /// Trailing observations held out for model selection
    #[arg(long, default_value_t = 14)]
    holdout: usize,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    if args.horizon == 0 {
        bail!("--horizon must be at least 1");
    }

    let config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str::<ForecastConfig>(&raw).with_context(|| format!("parsing config {}", path.display()))?
        }
        None => ForecastConfig::default(),
    };
    let forecaster = Arc::new(Forecaster::new(config).context("invalid configuration")?);

    let datasets = CsvSeriesLoader::new(args.holdout)
        .load_csv_file(&args.data)
        .with_context(|| format!("loading {}", args.data.display()))?;
    info!(series = datasets.len(), horizon = args.horizon, "loaded series");

    let results = forecaster.forecast_batch_async(datasets, args.horizon).await;
    let failed = results.iter().filter(|r| !r.is_success()).count();

    let json = serde_json::to_string_pretty(&results)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "results written");
        }
        None => println!("{json}"),
    }

    info!(series = results.len(), failed, "done");
    Ok(())
}
