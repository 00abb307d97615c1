use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use newscred_common::config::LoggingConfig;
use newscred_common::{FileConfig, Secrets};
use newscred_pipeline::bootstrap::load_file_config;
use newscred_pipeline::telemetry::init_tracing;
use newscred_pipeline::{ArticleStore, PgStore};

#[derive(Parser)]
#[command(name = "newscred-admin", about = "Maintenance operations on the article store")]
struct Cli {
    /// Path to config TOML file; only read by `health`
    #[arg(long, env = "NEWSCRED_CONFIG", default_value = "./config/newscred.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Put an article back into the fetch queue
    Reset { article_id: i64 },
    /// Drop an article's translation so it is translated again
    ClearTranslation { article_id: i64 },
    /// Row counts and pending work per worker
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&LoggingConfig::default())?;

    let database_url = Secrets::database_from_env()?;
    let store = PgStore::connect(&database_url, 1).await?;

    match cli.command {
        Command::Reset { article_id } => {
            let rows = store.reset_article(article_id).await?;
            println!("reset article {article_id}: {rows} row(s) affected");
        }
        Command::ClearTranslation { article_id } => {
            let rows = store.clear_translation(article_id).await?;
            println!("cleared translation of article {article_id}: {rows} row(s) affected");
        }
        Command::Health => {
            // Fall back to defaults so health works without a config file.
            let config = load_file_config(&cli.config)
                .map(|(_, config)| config)
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Using default config for health");
                    FileConfig::default()
                });
            let health = store
                .health(
                    config.translation.min_text_chars,
                    config.extraction.min_text_chars,
                )
                .await?;
            println!("{health}");
        }
    }

    store.close().await;
    Ok(())
}
