mod catalog;
mod config;
mod convergence;
mod error;
mod extract;
mod identity;
mod page;
mod platforms;
mod store;
mod types;
mod walk;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Config, StoreLayout};
use crate::error::Result;
use crate::page::BrowserSession;
use crate::platforms::PlatformProfile;
use crate::store::{EmbeddedStore, MemoryStore, NormalizedStore, ProductStore};
use crate::types::{Platform, RunSummary, ShutdownFlag};
use crate::walk::CategoryWalker;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Storage setup ---
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .connect(&format!("sqlite:{}?mode=rwc", cfg.db_path))
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {}", cfg.db_path);

    let store: Box<dyn ProductStore> = match cfg.store_layout {
        StoreLayout::Embedded => Box::new(EmbeddedStore::new(pool.clone())),
        StoreLayout::Normalized => Box::new(NormalizedStore::new(pool.clone())),
        StoreLayout::Memory => Box::new(MemoryStore::new()),
    };

    // --- Graceful interrupt: finish the in-flight category, start no new one ---
    let shutdown = ShutdownFlag::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing the in-flight category before stopping");
                shutdown.trigger();
            }
        });
    }

    // --- Browser session: unavailable here means no walk is attempted ---
    let session = BrowserSession::launch(cfg.headless).await?;
    let page = session.new_page().await?;

    for &platform in &cfg.platforms {
        if shutdown.is_triggered() {
            break;
        }

        let categories = match catalog::load_categories(platform, &cfg.catalog_dir) {
            Ok(c) => c,
            Err(e) => {
                warn!(platform = %platform, "Skipping {platform}: {e}");
                continue;
            }
        };
        info!(
            platform = %platform,
            categories = categories.len(),
            "Starting {platform} walk over {} categories",
            categories.len(),
        );

        let profile = PlatformProfile::for_platform(platform);
        let walker = CategoryWalker::new(&profile, &page, store.as_ref(), shutdown.clone())?;
        let summary = walker.scrape_products(&categories).await?;
        log_summary(platform, &summary);

        let tracked = store.product_count(platform).await.unwrap_or(0);
        info!(platform = %platform, tracked, "{platform}: {tracked} products now tracked");
    }

    session.close().await;
    Ok(())
}

fn log_summary(platform: Platform, summary: &RunSummary) {
    info!(
        platform = %platform,
        processed = summary.categories_processed,
        empty = summary.categories_empty,
        failed = summary.failed_categories.len(),
        extracted = summary.records_extracted,
        upserted = summary.records_upserted,
        deduplicated = summary.records_deduplicated,
        records_failed = summary.records_failed,
        interrupted = summary.interrupted,
        "Walk finished: {} categories ({} empty, {} failed), {} records upserted",
        summary.categories_processed,
        summary.categories_empty,
        summary.failed_categories.len(),
        summary.records_upserted,
    );
    for failure in &summary.failed_categories {
        warn!(
            category = %failure.category,
            "Failed category {}: {}",
            failure.category,
            failure.reason,
        );
    }
    if !summary.fully_succeeded() {
        warn!(
            platform = %platform,
            "Walk for {platform} completed partially; processed categories are committed",
        );
    }
}
