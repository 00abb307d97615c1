use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use newscred_pipeline::bootstrap::start_worker;
use newscred_pipeline::{TranslationCapability, Worker};

#[derive(Parser)]
#[command(name = "translate-worker", about = "Translate fetched articles to English")]
struct Cli {
    /// Path to config TOML file
    #[arg(long, env = "NEWSCRED_CONFIG", default_value = "./config/newscred.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let ctx = start_worker("translate-worker", &cli.config).await?;

    let capability = TranslationCapability::new(
        ctx.backend.clone(),
        &ctx.config.inference,
        &ctx.config.translation,
    );
    let worker = Worker::new(capability, ctx.store.clone(), ctx.governor, ctx.cancel.clone());
    let stats = worker.run().await;

    info!("Translate worker complete. {stats}");
    Ok(())
}
