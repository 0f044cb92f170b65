//! Category walk coordination.
//!
//! Sequences one platform run: for each category (or subcategory, where the
//! platform nests them) build the listing URL, drive it to convergence,
//! fold the records through the store, and pace to the next listing.
//! Failures are caught at the smallest enclosing unit: a bad record never
//! kills its category, and a bad category never kills the run. Only a
//! structurally failing store aborts the walk.

use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::{MAX_SCROLL_CYCLES, SELECTOR_WAIT_TIMEOUT_SECS, SYSTEMIC_STORE_FAILURES};
use crate::convergence::{exhaust_listing, ConvergenceConfig};
use crate::error::{Result, ScrapeError};
use crate::extract::SnapshotExtractor;
use crate::page::PageDriver;
use crate::platforms::PlatformProfile;
use crate::store::ProductStore;
use crate::types::{Category, CategoryFailure, RunSummary, ScrapedRecord, ShutdownFlag};

pub struct CategoryWalker<'a> {
    profile: &'a PlatformProfile,
    driver: &'a dyn PageDriver,
    extractor: SnapshotExtractor,
    store: &'a dyn ProductStore,
    shutdown: ShutdownFlag,
}

impl<'a> CategoryWalker<'a> {
    pub fn new(
        profile: &'a PlatformProfile,
        driver: &'a dyn PageDriver,
        store: &'a dyn ProductStore,
        shutdown: ShutdownFlag,
    ) -> Result<Self> {
        Ok(Self {
            profile,
            driver,
            extractor: SnapshotExtractor::new(&profile.selectors)?,
            store,
            shutdown,
        })
    }

    /// Walks every category to completion and reports what happened.
    ///
    /// Returns Err only on structural failure (persistence unreachable);
    /// everything else is isolated into the summary.
    pub async fn scrape_products(&self, categories: &[Category]) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let mut consecutive_store_failures = 0u32;
        // Run-scoped dedup state, explicit so parallel runs can't
        // cross-contaminate: identities already folded into the store this
        // run are not upserted again from a later category.
        let mut seen_this_run: HashSet<String> = HashSet::new();

        'walk: for category in categories {
            for (label, url) in listing_targets(self.profile, category) {
                // Checked between units, never mid-batch: an in-flight
                // category's upserts always finish before we stop.
                if self.shutdown.is_triggered() {
                    info!("Shutdown observed, not starting further categories");
                    summary.interrupted = true;
                    break 'walk;
                }

                match self.collect_listing(&url, &label).await {
                    Ok(records) => {
                        if records.is_empty() {
                            info!(category = %label, "No products found in {label}");
                            summary.categories_empty += 1;
                        } else {
                            summary.records_extracted += records.len();
                            let fresh: Vec<&ScrapedRecord> = records
                                .iter()
                                .filter(|r| seen_this_run.insert(r.identity_key.clone()))
                                .collect();
                            let duplicates = records.len() - fresh.len();
                            if duplicates > 0 {
                                debug!(
                                    category = %label,
                                    duplicates,
                                    "{duplicates} records already processed this run",
                                );
                                summary.records_deduplicated += duplicates;
                            }
                            self.persist_batch(
                                &fresh,
                                &mut summary,
                                &mut consecutive_store_failures,
                            )
                            .await?;
                        }
                        summary.categories_processed += 1;
                    }
                    Err(e) => {
                        warn!(category = %label, "Skipping category {label}: {e}");
                        summary.failed_categories.push(CategoryFailure {
                            category: label.clone(),
                            reason: e.to_string(),
                        });
                    }
                }

                tokio::time::sleep(self.profile.request_pacing).await;
            }
        }

        Ok(summary)
    }

    /// Loads one listing and drives it to convergence.
    async fn collect_listing(&self, url: &str, label: &str) -> Result<Vec<ScrapedRecord>> {
        self.driver.navigate(url).await?;

        if let Some(marker) = self.profile.selectors.empty_listing {
            if self.driver.selector_exists(marker).await? {
                return Ok(Vec::new());
            }
        }

        self.driver
            .wait_for_selector(
                self.profile.selectors.listing_container,
                Duration::from_secs(SELECTOR_WAIT_TIMEOUT_SECS),
            )
            .await?;

        let cfg = ConvergenceConfig {
            scroll_policy: self.profile.scroll_policy,
            settle_delay: self.profile.settle_delay,
            stability_threshold: self.profile.stability_threshold,
            max_cycles: MAX_SCROLL_CYCLES,
        };
        let outcome =
            exhaust_listing(self.driver, &self.extractor, self.profile.platform, label, &cfg)
                .await?;
        if outcome.hit_cycle_cap {
            warn!(
                category = %label,
                cycles = outcome.cycles,
                "Listing for {label} never stabilized within {} cycles; keeping best snapshot",
                outcome.cycles,
            );
        }
        Ok(outcome.records)
    }

    async fn persist_batch(
        &self,
        records: &[&ScrapedRecord],
        summary: &mut RunSummary,
        consecutive_failures: &mut u32,
    ) -> Result<()> {
        for &record in records {
            match self.store.upsert(record).await {
                Ok(_) => {
                    summary.records_upserted += 1;
                    *consecutive_failures = 0;
                }
                Err(e) => {
                    summary.records_failed += 1;
                    *consecutive_failures += 1;
                    warn!(product = %record.name, "Upsert failed for {}: {e}", record.name);
                    if *consecutive_failures >= SYSTEMIC_STORE_FAILURES {
                        error!(
                            failures = *consecutive_failures,
                            "Store is failing systemically, aborting run",
                        );
                        return Err(ScrapeError::StoreUnavailable(*consecutive_failures));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Expands a category into its walkable listings: the category itself, or
/// one listing per subcategory on platforms with a two-level hierarchy.
fn listing_targets(profile: &PlatformProfile, category: &Category) -> Vec<(String, String)> {
    if category.subcategories.is_empty() {
        vec![(category.name.clone(), profile.listing_url(category, None))]
    } else {
        category
            .subcategories
            .iter()
            .map(|sub| (sub.name.clone(), profile.listing_url(category, Some(sub))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::page::ScrollPolicy;
    use crate::platforms::{ImageSource, SelectorMap};
    use crate::store::MemoryStore;
    use crate::types::{CanonicalProduct, Platform, Subcategory};

    /// Static listing per URL; unknown URLs fail navigation like a dead
    /// page would.
    struct FakeListingPage {
        pages: HashMap<String, String>,
        current: Mutex<String>,
        /// URLs whose page shows the document-level "no products" marker.
        empty_marker_urls: Vec<String>,
    }

    impl FakeListingPage {
        fn new(pages: &[(&str, String)]) -> Self {
            Self {
                pages: pages.iter().map(|(u, h)| (u.to_string(), h.clone())).collect(),
                current: Mutex::new(String::new()),
                empty_marker_urls: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl PageDriver for FakeListingPage {
        async fn navigate(&self, url: &str) -> Result<()> {
            if self.pages.contains_key(url) {
                *self.current.lock().unwrap() = url.to_string();
                Ok(())
            } else {
                Err(ScrapeError::Timeout { what: url.to_string(), timeout_ms: 30_000 })
            }
        }

        async fn wait_for_selector(&self, _css: &str, _timeout: Duration) -> Result<()> {
            Ok(())
        }

        async fn selector_exists(&self, _css: &str) -> Result<bool> {
            Ok(self.empty_marker_urls.contains(&*self.current.lock().unwrap()))
        }

        async fn scroll(&self, _policy: ScrollPolicy) -> Result<()> {
            Ok(())
        }

        async fn html(&self) -> Result<String> {
            Ok(self.pages[&*self.current.lock().unwrap()].clone())
        }
    }

    fn test_profile(platform: Platform) -> PlatformProfile {
        PlatformProfile {
            platform,
            base_url: "https://example.test",
            selectors: SelectorMap {
                listing_container: ".grid",
                item: ".grid .card",
                name: ".name",
                image: "img",
                variant: ".qty",
                current_price: ".price",
                actual_price: ".mrp",
                out_of_stock: ".oos",
                empty_listing: None,
                image_source: ImageSource::Src,
            },
            scroll_policy: ScrollPolicy::ViewportStep,
            stability_threshold: 1,
            settle_delay: Duration::from_millis(0),
            request_pacing: Duration::from_millis(0),
        }
    }

    fn category(name: &str, url: &str) -> Category {
        Category {
            name: name.to_string(),
            source_token: String::new(),
            url: url.to_string(),
            subcategories: Vec::new(),
        }
    }

    fn listing(names_prices: &[(&str, f64)]) -> String {
        let cards: String = names_prices
            .iter()
            .map(|(name, price)| {
                format!(
                    "<div class=\"card\">\
                       <div class=\"name\">{name}</div>\
                       <img src=\"https://img/{name}.jpg\">\
                       <div class=\"price\">₹{price}</div>\
                     </div>"
                )
            })
            .collect();
        format!("<html><body><div class=\"grid\">{cards}</div></body></html>")
    }

    #[tokio::test]
    async fn failed_category_is_isolated_and_named() {
        let page = FakeListingPage::new(&[
            ("https://example.test/a", listing(&[("Amul Milk", 33.0), ("Tata Salt", 28.0)])),
            // No entry for /b, so its navigation fails.
            ("https://example.test/c", listing(&[("Lays", 20.0)])),
        ]);
        let store = MemoryStore::new();
        let profile = test_profile(Platform::Blinkit);
        let walker =
            CategoryWalker::new(&profile, &page, &store, ShutdownFlag::new()).unwrap();

        let categories = vec![
            category("Alpha", "https://example.test/a"),
            category("Beta", "https://example.test/b"),
            category("Gamma", "https://example.test/c"),
        ];
        let summary = walker.scrape_products(&categories).await.unwrap();

        assert_eq!(summary.categories_processed, 2);
        assert_eq!(summary.failed_categories.len(), 1);
        assert_eq!(summary.failed_categories[0].category, "Beta");
        assert_eq!(summary.records_upserted, 3);
        // Categories before and after the failure both committed.
        assert_eq!(store.product_count(Platform::Blinkit).await.unwrap(), 3);
        assert!(!summary.fully_succeeded());
    }

    #[tokio::test]
    async fn empty_category_is_counted_not_failed() {
        let page = FakeListingPage::new(&[("https://example.test/empty", listing(&[]))]);
        let store = MemoryStore::new();
        let profile = test_profile(Platform::Blinkit);
        let walker =
            CategoryWalker::new(&profile, &page, &store, ShutdownFlag::new()).unwrap();

        let summary = walker
            .scrape_products(&[category("Empty", "https://example.test/empty")])
            .await
            .unwrap();

        assert_eq!(summary.categories_empty, 1);
        assert_eq!(summary.categories_processed, 1);
        assert!(summary.failed_categories.is_empty());
        assert!(summary.fully_succeeded());
    }

    #[tokio::test]
    async fn subcategories_are_walked_as_their_own_listings() {
        let page = FakeListingPage::new(&[
            (
                "https://example.test/cn/snacks/cid/c1/scid/s1",
                listing(&[("Lays", 20.0)]),
            ),
            (
                "https://example.test/cn/snacks/cid/c1/scid/s2",
                listing(&[("Kurkure", 20.0), ("Bingo", 10.0)]),
            ),
        ]);
        let store = MemoryStore::new();
        let profile = test_profile(Platform::Zepto);
        let walker =
            CategoryWalker::new(&profile, &page, &store, ShutdownFlag::new()).unwrap();

        let mut cat = category("Snacks", "");
        cat.source_token = "c1".to_string();
        cat.subcategories = vec![
            Subcategory { id: "s1".to_string(), name: "Chips".to_string() },
            Subcategory { id: "s2".to_string(), name: "Namkeen".to_string() },
        ];
        let summary = walker.scrape_products(&[cat]).await.unwrap();

        assert_eq!(summary.categories_processed, 2);
        assert_eq!(summary.records_upserted, 3);
        let kurkure = store
            .find_by_identity(Platform::Zepto, &crate::identity::identity_key("Kurkure", ""))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kurkure.category, "Namkeen", "records carry their subcategory label");
    }

    #[tokio::test]
    async fn empty_marker_short_circuits_the_listing() {
        let mut page = FakeListingPage::new(&[(
            "https://example.test/none",
            listing(&[("Never Extracted", 1.0)]),
        )]);
        page.empty_marker_urls.push("https://example.test/none".to_string());
        let store = MemoryStore::new();
        let mut profile = test_profile(Platform::Blinkit);
        profile.selectors.empty_listing = Some(".not-found");
        let walker =
            CategoryWalker::new(&profile, &page, &store, ShutdownFlag::new()).unwrap();

        let summary = walker
            .scrape_products(&[category("None", "https://example.test/none")])
            .await
            .unwrap();

        assert_eq!(summary.categories_empty, 1);
        assert_eq!(summary.records_extracted, 0);
        assert_eq!(store.product_count(Platform::Blinkit).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn identity_seen_in_one_category_is_not_reupserted_from_another() {
        let page = FakeListingPage::new(&[
            ("https://example.test/a", listing(&[("Amul Milk", 33.0)])),
            ("https://example.test/b", listing(&[("Amul Milk", 34.0), ("Lays", 20.0)])),
        ]);
        let store = MemoryStore::new();
        let profile = test_profile(Platform::Blinkit);
        let walker =
            CategoryWalker::new(&profile, &page, &store, ShutdownFlag::new()).unwrap();

        let summary = walker
            .scrape_products(&[
                category("Alpha", "https://example.test/a"),
                category("Beta", "https://example.test/b"),
            ])
            .await
            .unwrap();

        assert_eq!(summary.records_deduplicated, 1);
        assert_eq!(summary.records_upserted, 2);
        let milk = store
            .find_by_identity(Platform::Blinkit, &crate::identity::identity_key("Amul Milk", ""))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(milk.price_history.len(), 1, "one observation per run per identity");
        assert_eq!(milk.current_price, 33.0);
    }

    #[tokio::test]
    async fn shutdown_prevents_new_categories() {
        let page = FakeListingPage::new(&[(
            "https://example.test/a",
            listing(&[("Amul Milk", 33.0)]),
        )]);
        let store = MemoryStore::new();
        let profile = test_profile(Platform::Blinkit);
        let shutdown = ShutdownFlag::new();
        shutdown.trigger();
        let walker = CategoryWalker::new(&profile, &page, &store, shutdown).unwrap();

        let summary = walker
            .scrape_products(&[category("Alpha", "https://example.test/a")])
            .await
            .unwrap();

        assert!(summary.interrupted);
        assert_eq!(summary.categories_processed, 0);
        assert_eq!(store.product_count(Platform::Blinkit).await.unwrap(), 0);
    }

    /// Store that always fails, to exercise the systemic-failure abort.
    struct BrokenStore;

    #[async_trait]
    impl ProductStore for BrokenStore {
        async fn upsert(&self, _record: &ScrapedRecord) -> Result<CanonicalProduct> {
            Err(ScrapeError::Catalog("disk on fire".to_string()))
        }

        async fn find_by_identity(
            &self,
            _platform: Platform,
            _identity_slug: &str,
        ) -> Result<Option<CanonicalProduct>> {
            Ok(None)
        }

        async fn product_count(&self, _platform: Platform) -> Result<i64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn systemic_store_failure_aborts_the_run() {
        let products: Vec<(String, f64)> =
            (0..6).map(|i| (format!("product{i}"), 10.0 + i as f64)).collect();
        let refs: Vec<(&str, f64)> = products.iter().map(|(n, p)| (n.as_str(), *p)).collect();
        let page = FakeListingPage::new(&[("https://example.test/a", listing(&refs))]);
        let store = BrokenStore;
        let profile = test_profile(Platform::Blinkit);
        let walker =
            CategoryWalker::new(&profile, &page, &store, ShutdownFlag::new()).unwrap();

        let result = walker
            .scrape_products(&[category("Alpha", "https://example.test/a")])
            .await;

        assert!(matches!(result, Err(ScrapeError::StoreUnavailable(_))));
    }
}
