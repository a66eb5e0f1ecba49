use anyhow::{Context, Result};
use deckcoach_backend::catalog::{load_catalog, sample_catalog};
use deckcoach_backend::config::CoachConfig;
use deckcoach_backend::domain::CustomerProfile;
use deckcoach_backend::flow::reorder;
use deckcoach_backend::runtime::CoachRuntime;
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,deckcoach_backend=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let profile_path = std::env::args()
        .nth(1)
        .context("usage: deckcoach_backend <profile.toml>")?;
    let profile = CustomerProfile::load(&profile_path)?;

    let config = CoachConfig::load();
    let catalog = match config.catalog_path.as_deref() {
        Some(path) => load_catalog(path)?,
        None => sample_catalog(),
    };
    let runtime = CoachRuntime::bootstrap(config).context("failed to bootstrap coach runtime")?;

    tracing::info!("Preparing presentation plan for {}", profile_path);

    let rt = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let plan = rt.block_on(async {
        let contents = runtime.summarizer().summarize(&catalog).await;
        let flow = runtime.personalizer().plan(&profile, &catalog, &contents).await;
        let ordered = reorder(&catalog, &flow);
        let talking_points = runtime
            .personalizer()
            .talking_points(&profile, &ordered, &contents)
            .await;
        json!({
            "flow": flow,
            "slides": ordered
                .iter()
                .map(|s| json!({ "id": s.id, "title": s.title }))
                .collect::<Vec<_>>(),
            "talkingPoints": talking_points,
            "slideContents": contents,
        })
    });

    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}
