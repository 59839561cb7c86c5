//! Beacon Engine - command-line runner.
//!
//! Imports each content pack named on the command line into an in-memory
//! world and prints the import reports as JSON.

use std::path::PathBuf;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use beacon_engine::infrastructure::config::EngineConfig;
use beacon_engine::App;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from repo root (the binary is usually run from `crates/engine`).
    load_dotenv_from_repo_root();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beacon_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let packs: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if packs.is_empty() {
        anyhow::bail!("usage: beacon-engine <pack.json>...");
    }

    let config = EngineConfig::from_env();
    tracing::info!(?config, "Starting Beacon Engine");
    let app = App::in_memory(config).await?;

    let mut reports = Vec::with_capacity(packs.len());
    for path in &packs {
        let source = path.display().to_string();
        let mut on_progress = |done: usize, total: usize| {
            tracing::info!(pack = %source, done, total, "Import progress");
        };
        let report = app
            .import
            .import_file(path, Some(&mut on_progress))
            .await
            .with_context(|| format!("importing {}", source))?;
        reports.push(report);
    }

    println!("{}", serde_json::to_string_pretty(&reports)?);

    if reports.iter().any(|r| !r.is_success()) {
        anyhow::bail!("one or more imports failed");
    }
    Ok(())
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}
