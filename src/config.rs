use std::path::PathBuf;

use crate::error::{Result, ScrapeError};
use crate::types::Platform;

/// Safety upper bound on scroll/snapshot cycles per listing. A listing that
/// never stabilizes (rendering bug, infinite carousel) terminates here with
/// the best snapshot obtained so far and a warning.
pub const MAX_SCROLL_CYCLES: u32 = 50;

/// Page navigation timeout (seconds). Expiry marks the category failed,
/// never the whole run.
pub const PAGE_LOAD_TIMEOUT_SECS: u64 = 30;

/// Timeout for the listing container to appear after navigation (seconds).
pub const SELECTOR_WAIT_TIMEOUT_SECS: u64 = 10;

/// Poll interval while waiting for a selector (milliseconds).
pub const WAIT_POLL_INTERVAL_MS: u64 = 100;

/// Consecutive upsert failures after which the store is considered
/// unreachable and the run aborts. Resets on any successful upsert.
pub const SYSTEMIC_STORE_FAILURES: u32 = 5;

/// Which layout backs the product store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreLayout {
    /// Single `products` table, price history embedded as a JSON column.
    Embedded,
    /// Legacy two-table layout: `catalog_products` + `platform_prices`.
    Normalized,
    /// In-process only, for dry runs. Nothing persisted.
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    /// Directory holding the per-platform `<platform>-categories.json`
    /// cache files written by the category discovery step.
    pub catalog_dir: PathBuf,
    /// Platforms to walk this run (PLATFORMS, comma-separated).
    pub platforms: Vec<Platform>,
    pub store_layout: StoreLayout,
    pub headless: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let platforms = std::env::var("PLATFORMS")
            .unwrap_or_else(|_| "blinkit,zepto,dmart".to_string())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                Platform::parse(s)
                    .ok_or_else(|| ScrapeError::Config(format!("unknown platform `{s}`")))
            })
            .collect::<Result<Vec<_>>>()?;
        if platforms.is_empty() {
            return Err(ScrapeError::Config("PLATFORMS resolved to an empty list".to_string()));
        }

        let store_layout = match std::env::var("STORE_LAYOUT")
            .unwrap_or_else(|_| "embedded".to_string())
            .to_lowercase()
            .as_str()
        {
            "embedded" => StoreLayout::Embedded,
            "normalized" => StoreLayout::Normalized,
            "memory" => StoreLayout::Memory,
            other => {
                return Err(ScrapeError::Config(format!(
                    "STORE_LAYOUT must be `embedded`, `normalized` or `memory`, got `{other}`"
                )))
            }
        };

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "shelfwatch.db".to_string()),
            catalog_dir: std::env::var("CATALOG_DIR")
                .unwrap_or_else(|_| ".".to_string())
                .into(),
            platforms,
            store_layout,
            headless: std::env::var("HEADLESS")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
        })
    }
}
