use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// One storefront being scraped. Each platform has its own listing markup,
/// hence its own selector/extractor profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Blinkit,
    Zepto,
    Dmart,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Blinkit => "blinkit",
            Platform::Zepto => "zepto",
            Platform::Dmart => "dmart",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "blinkit" => Some(Platform::Blinkit),
            "zepto" => Some(Platform::Zepto),
            "dmart" | "d-mart" => Some(Platform::Dmart),
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Categories — resolved traversal units consumed verbatim from the catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    /// Platform identifier token (D-Mart seoToken, Zepto category id, …).
    pub source_token: String,
    /// Ready listing URL where the platform provides one; empty for
    /// platforms that build URLs per subcategory.
    pub url: String,
    #[serde(default)]
    pub subcategories: Vec<Subcategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subcategory {
    pub id: String,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Scraped records — transient, one per extraction pass
// ---------------------------------------------------------------------------

/// A product as it appeared in one listing snapshot. Never mutated;
/// a later snapshot supersedes it by identity key.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedRecord {
    pub identity_key: String,
    pub name: String,
    /// Pack size / quantity label ("500 ml"); empty when the card shows none.
    pub variant: String,
    pub image: String,
    pub current_price: f64,
    pub actual_price: Option<f64>,
    pub available: bool,
    pub platform: Platform,
    pub category: String,
}

// ---------------------------------------------------------------------------
// Canonical products — persisted, with append-only price history
// ---------------------------------------------------------------------------

/// One observation of a product's price. History records observations, not
/// changes: an unchanged price still appends an entry, preserving the
/// audit trail of scrape cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistoryEntry {
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_price: Option<f64>,
    pub observed_at: DateTime<Utc>,
}

/// The persisted product record. At most one exists per
/// (platform, name, variant) identity, independent of any platform-native
/// product id, which may be absent or generated on the fly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalProduct {
    pub id: i64,
    pub platform: Platform,
    pub identity_slug: String,
    pub name: String,
    pub variant: String,
    pub image: String,
    pub category: String,
    pub current_price: f64,
    pub actual_price: Option<f64>,
    pub available: bool,
    pub price_history: Vec<PriceHistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Run summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CategoryFailure {
    pub category: String,
    pub reason: String,
}

/// Outcome of one platform walk. A partially failed run still commits every
/// successfully processed category; failed units are named here.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub categories_processed: usize,
    pub categories_empty: usize,
    pub failed_categories: Vec<CategoryFailure>,
    pub records_extracted: usize,
    pub records_upserted: usize,
    /// Records skipped because their identity was already processed earlier
    /// in this run (same product listed under two categories).
    pub records_deduplicated: usize,
    pub records_failed: usize,
    /// True when a shutdown signal stopped the walk before all categories ran.
    pub interrupted: bool,
}

impl RunSummary {
    pub fn fully_succeeded(&self) -> bool {
        self.failed_categories.is_empty() && self.records_failed == 0 && !self.interrupted
    }
}

// ---------------------------------------------------------------------------
// Shutdown flag
// ---------------------------------------------------------------------------

/// Cooperative graceful-interrupt flag. Once triggered, no new category is
/// started; the in-flight category's upsert batch always finishes.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
