use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use newscred_common::CompanyIndex;
use newscred_pipeline::bootstrap::start_worker;
use newscred_pipeline::{ArticleStore, ExtractionCapability, Worker};

#[derive(Parser)]
#[command(
    name = "extract-worker",
    about = "Extract claims, entities and company sentiment from articles"
)]
struct Cli {
    /// Path to config TOML file
    #[arg(long, env = "NEWSCRED_CONFIG", default_value = "./config/newscred.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let ctx = start_worker("extract-worker", &cli.config).await?;

    // Catalog snapshot for the lifetime of the process.
    let rows = ctx
        .store
        .active_companies()
        .await
        .context("Failed to load company catalog")?;
    let companies = CompanyIndex::from_rows(rows);
    info!(companies = companies.len(), "Company catalog loaded");

    let capability = ExtractionCapability::new(
        ctx.backend.clone(),
        Arc::new(companies),
        &ctx.config.inference,
        &ctx.config.extraction,
    );
    let worker = Worker::new(capability, ctx.store.clone(), ctx.governor, ctx.cancel.clone());
    let stats = worker.run().await;

    info!("Extract worker complete. {stats}");
    Ok(())
}
