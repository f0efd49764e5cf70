use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tilegrid::{
    LatLng, TileLayer, TileLayerConfig, TileLayerProfile, TileProvider, UrlTemplateFetcher,
};

/// Resolve the tiles covering a view and fetch them, printing where each
/// drawable tile lands on screen.
#[derive(Parser)]
#[command(name = "tilegrid-app")]
#[command(version, about)]
struct Cli {
    /// Latitude of the view center
    #[arg(long, default_value_t = 37.7749, allow_hyphen_values = true)]
    lat: f64,

    /// Longitude of the view center
    #[arg(long, default_value_t = -122.4194, allow_hyphen_values = true)]
    lng: f64,

    /// View zoom, may be fractional
    #[arg(short, long, default_value_t = 12.0)]
    zoom: f64,

    /// View width in pixels
    #[arg(long, default_value_t = 1200.0)]
    width: f64,

    /// View height in pixels
    #[arg(long, default_value_t = 800.0)]
    height: f64,

    /// Scheduling preset
    #[arg(short, long, value_enum, default_value_t = Profile::Balanced)]
    profile: Profile,

    /// JSON scheduling config, overrides --profile
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tile URL template with {s}, {z}, {x} and {y} placeholders
    #[arg(long, default_value = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png")]
    url: String,

    /// Attribution shown for the tile source
    #[arg(long, default_value = "© OpenStreetMap contributors")]
    attribution: String,

    /// Give up waiting for tiles after this many seconds
    #[arg(long, default_value_t = 15)]
    wait: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum Profile {
    Balanced,
    LowBandwidth,
    Aggressive,
}

impl From<Profile> for TileLayerProfile {
    fn from(profile: Profile) -> Self {
        match profile {
            Profile::Balanced => TileLayerProfile::Balanced,
            Profile::LowBandwidth => TileLayerProfile::LowBandwidth,
            Profile::Aggressive => TileLayerProfile::Aggressive,
        }
    }
}

fn load_config(cli: &Cli) -> Result<TileLayerConfig> {
    match &cli.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            TileLayerConfig::from_json(&json)
                .with_context(|| format!("parsing {}", path.display()))
        }
        None => Ok(TileLayerProfile::from(cli.profile).resolve()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    let fetcher = UrlTemplateFetcher::new(cli.url.clone())
        .with_subdomains(["a", "b", "c"])
        .with_timeout(config.request_timeout());
    let provider = Arc::new(
        TileProvider::builder(Arc::new(fetcher))
            .with_attribution(cli.attribution.clone())
            .build()
            .context("building tile provider")?,
    );

    let mut layer = TileLayer::new("base", config)?;
    layer.setup(provider.clone(), cli.width, cli.height);
    layer.recenter(LatLng::new(cli.lat, cli.lng), cli.zoom)?;

    log::info!(
        "resolving {}x{} view at {:.4}, {:.4} zoom {:.2} ({})",
        cli.width,
        cli.height,
        cli.lat,
        cli.lng,
        layer.viewport().zoom(),
        provider.attribution()
    );

    let deadline = Instant::now() + Duration::from_secs(cli.wait);
    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                log::warn!("interrupted");
                break;
            }
        }

        let drawable = layer.drawable()?.len();
        let stats = layer.cache().stats();
        let complete = layer
            .last_resolution()
            .map(|resolution| resolution.requested.is_empty())
            .unwrap_or(false);
        log::debug!(
            "{} drawable, {} cached, {} in flight, {} queued, {} failed",
            drawable,
            stats.cached,
            stats.in_flight,
            stats.queued,
            stats.failed
        );

        if complete || (stats.in_flight == 0 && stats.queued == 0 && stats.failed > 0) {
            break;
        }
        if Instant::now() >= deadline {
            log::warn!("gave up waiting for tiles after {}s", cli.wait);
            break;
        }
    }

    let placements = layer.placements()?;
    println!("{} tiles to draw:", placements.len());
    for placement in &placements {
        println!(
            "  {:>12}  at ({:>8.1}, {:>8.1})  size {:>6.1} x {:<6.1}  {} bytes",
            placement.address.key(),
            placement.x,
            placement.y,
            placement.width,
            placement.height,
            placement.data.len()
        );
    }

    let stats = layer.cache().stats();
    println!(
        "fetched {} tiles, {} failures",
        stats.completed, stats.failed
    );

    tokio::task::block_in_place(|| layer.shutdown());
    Ok(())
}
