mod console;

use anyhow::{Context, Result};
use deckcoach_backend::catalog::{load_catalog, sample_catalog};
use deckcoach_backend::config::CoachConfig;
use deckcoach_backend::domain::CustomerProfile;
use deckcoach_backend::runtime::CoachRuntimeBuilder;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,deckcoach=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Deckcoach starting...");

    // No profile argument means "resume the saved session".
    let profile = match std::env::args().nth(1) {
        Some(path) => Some(CustomerProfile::load(&path)?),
        None => None,
    };

    let config = CoachConfig::load();
    let catalog = match config.catalog_path.as_deref() {
        Some(path) => load_catalog(path)?,
        None => sample_catalog(),
    };

    let (event_tx, event_rx) = flume::unbounded();
    let printer = std::thread::spawn(move || console::print_events(event_rx));

    let runtime = CoachRuntimeBuilder::new(config)
        .with_events(event_tx)
        .build()
        .context("failed to build coach runtime")?;

    let rt = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let result = rt.block_on(console::run(&runtime, profile, &catalog));

    drop(runtime);
    if printer.join().is_err() {
        tracing::error!("Event printer thread panicked");
    }
    result
}
