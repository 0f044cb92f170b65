//! In-process store strategy. Backs dry runs and the coordinator tests.
//!
//! The DashMap entry API is the atomic find-and-modify primitive here: the
//! shard lock is held for the whole mutation, so concurrent upserts for one
//! identity serialize instead of losing history entries.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::error::Result;
use crate::store::ProductStore;
use crate::types::{CanonicalProduct, Platform, PriceHistoryEntry, ScrapedRecord};

#[derive(Default)]
pub struct MemoryStore {
    products: DashMap<(Platform, String), CanonicalProduct>,
    next_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn upsert(&self, record: &ScrapedRecord) -> Result<CanonicalProduct> {
        let now = Utc::now();
        let key = (record.platform, record.identity_key.clone());

        let mut product = self.products.entry(key).or_insert_with(|| CanonicalProduct {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            platform: record.platform,
            identity_slug: record.identity_key.clone(),
            name: record.name.clone(),
            variant: record.variant.clone(),
            image: record.image.clone(),
            category: record.category.clone(),
            current_price: record.current_price,
            actual_price: record.actual_price,
            available: record.available,
            price_history: Vec::new(),
            created_at: now,
            updated_at: now,
        });

        product.price_history.push(PriceHistoryEntry {
            price: record.current_price,
            actual_price: record.actual_price,
            observed_at: now,
        });
        product.current_price = record.current_price;
        product.actual_price = record.actual_price;
        product.available = record.available;
        product.image = record.image.clone();
        product.category = record.category.clone();
        product.updated_at = now;

        Ok(product.clone())
    }

    async fn find_by_identity(
        &self,
        platform: Platform,
        identity_slug: &str,
    ) -> Result<Option<CanonicalProduct>> {
        Ok(self
            .products
            .get(&(platform, identity_slug.to_string()))
            .map(|p| p.clone()))
    }

    async fn product_count(&self, platform: Platform) -> Result<i64> {
        Ok(self.products.iter().filter(|e| e.key().0 == platform).count() as i64)
    }
}
