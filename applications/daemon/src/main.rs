/// Breeze - weather-aware home media controller
use breeze_ambient::{
    ranker, AmbientContext, CatalogStore, Classification, FileCatalogStore, TimeOfDay, WeatherType,
};
use breeze_daemon::{config::DaemonConfig, runtime, OpenWeatherSource};
use chrono::Utc;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "breeze")]
#[command(about = "Weather-aware home media controller", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the player, watchdog and autoplay
    Run {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Track URL to queue on startup (repeatable)
        #[arg(short, long)]
        enqueue: Vec<String>,
    },
    /// Print the ranked shortlist for a weather and time of day
    Shortlist {
        /// Weather, e.g. "rain" or "clear"
        #[arg(short, long)]
        weather: String,
        /// Time of day: morning, day, evening or night
        #[arg(short, long)]
        time: String,
        /// Catalog file path
        #[arg(short, long, default_value = "catalog.json")]
        catalog: PathBuf,
        /// Shortlist size
        #[arg(short, long, default_value_t = ranker::SHORTLIST_SIZE)]
        size: usize,
    },
    /// Fetch one context sample and print its classification
    Classify {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "breeze=info,breeze_daemon=info,breeze_playback=info,breeze_ambient=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, enqueue } => {
            let config = DaemonConfig::load(config.as_deref())?;
            config.validate()?;
            runtime::run(config, enqueue).await?;
        }
        Commands::Shortlist {
            weather,
            time,
            catalog,
            size,
        } => {
            shortlist(&weather, &time, catalog, size).await?;
        }
        Commands::Classify { config } => {
            let config = DaemonConfig::load(config.as_deref())?;
            config.validate()?;
            classify(&config).await?;
        }
    }

    Ok(())
}

async fn shortlist(weather: &str, time: &str, catalog: PathBuf, size: usize) -> anyhow::Result<()> {
    let target = Classification::new(time.parse::<TimeOfDay>()?, weather.parse::<WeatherType>()?);
    let entries = FileCatalogStore::new(catalog).load().await?;
    let mut rng = StdRng::from_entropy();

    let list = ranker::shortlist(&entries, target, &[], size, &mut rng);
    if list.is_empty() {
        println!("No tracks in catalog");
        return Ok(());
    }

    println!("Shortlist for {target}:");
    for entry in list {
        println!("  {:>3}  {}  {}", entry.rank, entry.label, entry.url);
    }
    Ok(())
}

async fn classify(config: &DaemonConfig) -> anyhow::Result<()> {
    let context = if config.weather.api_key.is_some() {
        let mut source = OpenWeatherSource::new(&config.weather)?;
        if let (Some(city), Some(country)) = (&config.weather.city, &config.weather.country) {
            source.locate(city, country).await;
        }
        source.current().await?
    } else {
        tracing::warn!("No weather API key configured, using default context");
        AmbientContext::fallback()
    };

    let now = Utc::now();
    println!("Weather:     {} ({})", context.weather_main, context.description);
    println!("Temperature: {:.1} °C", context.temperature);
    println!("Summary:     {}", context.summary(now));
    println!("Buckets:     {}", Classification::of(&context, now)?);
    Ok(())
}
