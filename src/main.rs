use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Use the library instead of redeclaring modules
use emberlay::{
    cache::CacheIndex,
    config::Config,
    fetch::fetch_image_bytes,
    models::OutputFormat,
    pipeline::FfmpegPipeline,
    service::RenderCache,
};

#[derive(Parser)]
#[command(name = "emberlay")]
#[command(version = "0.1.0")]
#[command(about = "Overlay compositing service with a content-addressed render cache")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Composite the overlay onto an image, reusing the cache when possible
    Render {
        /// Source image: local path or http(s) URL
        source: String,

        /// Delivery format
        #[arg(short, long, default_value = "gif")]
        format: OutputFormat,

        /// Extra low quality output
        #[arg(long)]
        low_quality: bool,

        /// Where to write the result
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Copy out a random already-cached artifact
    Random {
        /// Where to write the result
        #[arg(short, long, default_value = "random.gif")]
        output: PathBuf,
    },

    /// Show cache statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging with specified level
    let log_filter = format!("emberlay={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from specified file
    std::env::set_var("CONFIG_FILE", &cli.config);
    let config = Config::load()?;

    let index = CacheIndex::new(&config.database, &config.storage.cache_root).await?;
    index.migrate().await?;

    let pipeline = FfmpegPipeline::new(&config.render);
    let service = RenderCache::new(index, pipeline, &config.storage.overlay_clip);

    match cli.command {
        Commands::Render {
            source,
            format,
            low_quality,
            output,
        } => {
            let image_bytes = fetch_image_bytes(&source).await?;
            let artifact = service.get_or_render(&image_bytes, format, low_quality).await?;

            let output = output.unwrap_or_else(|| PathBuf::from(format!("out.{format}")));
            tokio::fs::copy(artifact.path(), &output).await?;
            info!("wrote {}", output.display());
            println!("{}", output.display());
        }
        Commands::Random { output } => match service.random_cached().await? {
            Some(path) => {
                tokio::fs::copy(&path, &output).await?;
                println!("{}", output.display());
            }
            None => println!("cache is empty"),
        },
        Commands::Stats => {
            let entries = service.index().len().await?;
            println!("cached renders: {entries}");
            println!("cache root:     {}", config.storage.cache_root.display());
        }
    }

    Ok(())
}
