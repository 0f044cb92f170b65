//! Scroll-to-convergence driver.
//!
//! Drives a virtualized listing to its fully-loaded state without knowing
//! the total item count: scroll, let content settle, re-snapshot, and stop
//! once the distinct-record count has stopped growing for a configured
//! number of consecutive cycles.
//!
//! The stopping rule compares snapshot cardinality, not set difference. It
//! assumes client-side rendering is monotonic, i.e. new scrolls only reveal
//! additions. A platform that removes items mid-scroll (ads reshuffling)
//! could stabilize early; the threshold is per-platform tunable for that
//! reason. Kept as cardinality growth deliberately, see DESIGN.md.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::Result;
use crate::extract::SnapshotExtractor;
use crate::page::{PageDriver, ScrollPolicy};
use crate::types::{Platform, ScrapedRecord};

#[derive(Debug, Clone)]
pub struct ConvergenceConfig {
    pub scroll_policy: ScrollPolicy,
    pub settle_delay: Duration,
    /// Consecutive no-growth cycles before the listing counts as exhausted.
    pub stability_threshold: u32,
    /// Hard cycle cap guaranteeing termination on pages that never
    /// stabilize.
    pub max_cycles: u32,
}

#[derive(Debug)]
pub struct ConvergenceOutcome {
    /// Records of the winning snapshot, deduplicated by identity key
    /// (last seen wins), in first-seen order.
    pub records: Vec<ScrapedRecord>,
    pub cycles: u32,
    /// True when the cycle cap fired before natural convergence.
    pub hit_cycle_cap: bool,
}

/// Runs the scroll/snapshot loop until the listing stops growing.
///
/// Records are only final once this returns; no partial snapshot is ever
/// handed to persistence.
pub async fn exhaust_listing(
    driver: &dyn PageDriver,
    extractor: &SnapshotExtractor,
    platform: Platform,
    category: &str,
    cfg: &ConvergenceConfig,
) -> Result<ConvergenceOutcome> {
    let mut best: Vec<ScrapedRecord> = Vec::new();
    let mut best_size = 0usize;
    let mut stable_iterations = 0u32;
    let mut cycles = 0u32;
    let mut hit_cycle_cap = false;

    while stable_iterations < cfg.stability_threshold {
        if cycles >= cfg.max_cycles {
            debug!(
                platform = %platform,
                category,
                cycles,
                records = best_size,
                "Listing never stabilized, stopping at cycle cap with best snapshot",
            );
            hit_cycle_cap = true;
            break;
        }
        cycles += 1;

        driver.scroll(cfg.scroll_policy).await?;
        tokio::time::sleep(cfg.settle_delay).await;

        let snapshot = dedup_snapshot(extractor.extract(&driver.html().await?, platform, category));

        if snapshot.len() > best_size {
            best_size = snapshot.len();
            best = snapshot;
            stable_iterations = 0;
            debug!(
                platform = %platform,
                category,
                records = best_size,
                "Found {best_size} products so far",
            );
        } else {
            stable_iterations += 1;
        }
    }

    info!(
        platform = %platform,
        category,
        records = best.len(),
        cycles,
        "Listing converged with {} products",
        best.len(),
    );

    Ok(ConvergenceOutcome { records: best, cycles, hit_cycle_cap })
}

/// Collapses one snapshot to distinct identity keys. Later occurrences of a
/// key supersede earlier ones; first-seen order is preserved.
fn dedup_snapshot(records: Vec<ScrapedRecord>) -> Vec<ScrapedRecord> {
    let mut order: Vec<String> = Vec::with_capacity(records.len());
    let mut by_key: HashMap<String, ScrapedRecord> = HashMap::with_capacity(records.len());

    for record in records {
        if !by_key.contains_key(&record.identity_key) {
            order.push(record.identity_key.clone());
        }
        by_key.insert(record.identity_key.clone(), record);
    }

    order.into_iter().filter_map(|key| by_key.remove(&key)).collect()
}
