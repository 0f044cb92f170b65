//! Embedded layout: one `products` row per canonical product, price history
//! as an ordered JSON array column.
//!
//! The whole upsert is a single `INSERT … ON CONFLICT DO UPDATE` with a
//! `json_insert` append, so concurrent upserts for the same identity can
//! never drop each other's history entries.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::Result;
use crate::store::models::ProductRow;
use crate::store::ProductStore;
use crate::types::{CanonicalProduct, Platform, PriceHistoryEntry, ScrapedRecord};

pub struct EmbeddedStore {
    pool: SqlitePool,
}

impl EmbeddedStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const UPSERT_SQL: &str = r#"
INSERT INTO products (
    platform, identity_slug, name, variant, image, category,
    current_price, actual_price, available, price_history,
    created_at, updated_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, json_array(json(?)), ?, ?)
ON CONFLICT (platform, identity_slug) DO UPDATE SET
    current_price = excluded.current_price,
    actual_price = excluded.actual_price,
    available = excluded.available,
    image = excluded.image,
    category = excluded.category,
    updated_at = excluded.updated_at,
    price_history = json_insert(products.price_history, '$[#]', json(?))
RETURNING
    id, platform, identity_slug, name, variant, image, category,
    current_price, actual_price, available, price_history,
    created_at, updated_at
"#;

#[async_trait]
impl ProductStore for EmbeddedStore {
    async fn upsert(&self, record: &ScrapedRecord) -> Result<CanonicalProduct> {
        let now = Utc::now();
        let entry = PriceHistoryEntry {
            price: record.current_price,
            actual_price: record.actual_price,
            observed_at: now,
        };
        let entry_json = serde_json::to_string(&entry)?;
        let now_rfc3339 = now.to_rfc3339();

        let row: ProductRow = sqlx::query_as(UPSERT_SQL)
            .bind(record.platform.as_str())
            .bind(&record.identity_key)
            .bind(&record.name)
            .bind(&record.variant)
            .bind(&record.image)
            .bind(&record.category)
            .bind(record.current_price)
            .bind(record.actual_price)
            .bind(i64::from(record.available))
            .bind(&entry_json)
            .bind(&now_rfc3339)
            .bind(&now_rfc3339)
            .bind(&entry_json)
            .fetch_one(&self.pool)
            .await?;

        row.try_into()
    }

    async fn find_by_identity(
        &self,
        platform: Platform,
        identity_slug: &str,
    ) -> Result<Option<CanonicalProduct>> {
        let row: Option<ProductRow> = sqlx::query_as(
            "SELECT * FROM products WHERE platform = ? AND identity_slug = ?",
        )
        .bind(platform.as_str())
        .bind(identity_slug)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn product_count(&self, platform: Platform) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE platform = ?")
            .bind(platform.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;
    use crate::identity::identity_key;

    async fn test_store() -> EmbeddedStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        EmbeddedStore::new(pool)
    }

    fn record(name: &str, variant: &str, price: f64) -> ScrapedRecord {
        ScrapedRecord {
            identity_key: identity_key(name, variant),
            name: name.to_string(),
            variant: variant.to_string(),
            image: "https://img/x.jpg".to_string(),
            current_price: price,
            actual_price: Some(price + 5.0),
            available: true,
            platform: Platform::Blinkit,
            category: "Dairy".to_string(),
        }
    }

    #[tokio::test]
    async fn create_then_update_keeps_one_row() {
        let store = test_store().await;

        let created = store.upsert(&record("Amul Milk", "500 ml", 33.0)).await.unwrap();
        assert_eq!(created.price_history.len(), 1);

        let updated = store.upsert(&record("Amul Milk", "500 ml", 35.0)).await.unwrap();
        assert_eq!(updated.id, created.id, "second upsert must mutate the same row");
        assert_eq!(updated.price_history.len(), 2);
        assert_eq!(store.product_count(Platform::Blinkit).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn history_records_observations_not_changes() {
        let store = test_store().await;

        for price in [50.0, 55.0, 50.0] {
            store.upsert(&record("Tata Salt", "1 kg", price)).await.unwrap();
        }

        let product = store
            .find_by_identity(Platform::Blinkit, &identity_key("Tata Salt", "1 kg"))
            .await
            .unwrap()
            .unwrap();
        let prices: Vec<f64> = product.price_history.iter().map(|e| e.price).collect();
        assert_eq!(prices, vec![50.0, 55.0, 50.0]);
        assert_eq!(product.current_price, 50.0, "last write wins");
    }

    #[tokio::test]
    async fn display_fields_are_last_write_wins() {
        let store = test_store().await;

        store.upsert(&record("Amul Butter", "100 g", 60.0)).await.unwrap();
        let mut changed = record("Amul Butter", "100 g", 62.0);
        changed.image = "https://img/new.jpg".to_string();
        changed.category = "Breakfast".to_string();
        changed.available = false;
        store.upsert(&changed).await.unwrap();

        let product = store
            .find_by_identity(Platform::Blinkit, &changed.identity_key)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.image, "https://img/new.jpg");
        assert_eq!(product.category, "Breakfast");
        assert!(!product.available);
    }

    #[tokio::test]
    async fn variant_distinguishes_identity() {
        let store = test_store().await;

        store.upsert(&record("Amul Milk", "500 ml", 33.0)).await.unwrap();
        store.upsert(&record("Amul Milk", "1 L", 62.0)).await.unwrap();

        assert_eq!(store.product_count(Platform::Blinkit).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn concurrent_upserts_keep_both_history_entries() {
        let store = std::sync::Arc::new(test_store().await);

        let a = {
            let store = store.clone();
            tokio::spawn(async move { store.upsert(&record("Maggi", "70 g", 14.0)).await })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move { store.upsert(&record("Maggi", "70 g", 15.0)).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let product = store
            .find_by_identity(Platform::Blinkit, &identity_key("Maggi", "70 g"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.price_history.len(), 2, "no lost update");
        assert_eq!(store.product_count(Platform::Blinkit).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn find_missing_identity_returns_none() {
        let store = test_store().await;
        let found = store.find_by_identity(Platform::Blinkit, "nope").await.unwrap();
        assert!(found.is_none());
    }
}
