//! Legacy normalized layout: identity/display attributes in
//! `catalog_products`, one `platform_prices` row per (platform, product)
//! with its own history and a platform-native product id.
//!
//! The identity row is shared across platforms; the per-platform price row
//! owns the history. Both statements are atomic upserts, and the history
//! append happens inside the second statement, so the no-lost-update
//! guarantee holds here too.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::Result;
use crate::store::models::{from_normalized_rows, CatalogProductRow, PlatformPriceRow};
use crate::store::ProductStore;
use crate::types::{CanonicalProduct, Platform, PriceHistoryEntry, ScrapedRecord};

pub struct NormalizedStore {
    pool: SqlitePool,
}

impl NormalizedStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const UPSERT_PRODUCT_SQL: &str = r#"
INSERT INTO catalog_products (
    identity_slug, name, variant, image, category, created_at, updated_at
) VALUES (?, ?, ?, ?, ?, ?, ?)
ON CONFLICT (identity_slug) DO UPDATE SET
    image = excluded.image,
    category = excluded.category,
    updated_at = excluded.updated_at
RETURNING id, identity_slug, name, variant, image, category, created_at, updated_at
"#;

const UPSERT_PRICE_SQL: &str = r#"
INSERT INTO platform_prices (
    platform, product_id, platform_product_id,
    current_price, actual_price, available, price_history, last_updated
) VALUES (?, ?, ?, ?, ?, ?, json_array(json(?)), ?)
ON CONFLICT (platform, product_id) DO UPDATE SET
    current_price = excluded.current_price,
    actual_price = excluded.actual_price,
    available = excluded.available,
    last_updated = excluded.last_updated,
    price_history = json_insert(platform_prices.price_history, '$[#]', json(?))
RETURNING
    id, platform, product_id, platform_product_id,
    current_price, actual_price, available, price_history, last_updated
"#;

#[async_trait]
impl ProductStore for NormalizedStore {
    async fn upsert(&self, record: &ScrapedRecord) -> Result<CanonicalProduct> {
        let now = Utc::now();
        let now_rfc3339 = now.to_rfc3339();

        let product: CatalogProductRow = sqlx::query_as(UPSERT_PRODUCT_SQL)
            .bind(&record.identity_key)
            .bind(&record.name)
            .bind(&record.variant)
            .bind(&record.image)
            .bind(&record.category)
            .bind(&now_rfc3339)
            .bind(&now_rfc3339)
            .fetch_one(&self.pool)
            .await?;

        // The storefront exposes no stable native id, so one is derived the
        // same way the original data migration did.
        let platform_product_id = format!("{}-{}", record.platform.as_str(), product.id);

        let entry = PriceHistoryEntry {
            price: record.current_price,
            actual_price: record.actual_price,
            observed_at: now,
        };
        let entry_json = serde_json::to_string(&entry)?;

        let price: PlatformPriceRow = sqlx::query_as(UPSERT_PRICE_SQL)
            .bind(record.platform.as_str())
            .bind(product.id)
            .bind(&platform_product_id)
            .bind(record.current_price)
            .bind(record.actual_price)
            .bind(i64::from(record.available))
            .bind(&entry_json)
            .bind(&now_rfc3339)
            .bind(&entry_json)
            .fetch_one(&self.pool)
            .await?;

        from_normalized_rows(product, price)
    }

    async fn find_by_identity(
        &self,
        platform: Platform,
        identity_slug: &str,
    ) -> Result<Option<CanonicalProduct>> {
        let product: Option<CatalogProductRow> =
            sqlx::query_as("SELECT * FROM catalog_products WHERE identity_slug = ?")
                .bind(identity_slug)
                .fetch_optional(&self.pool)
                .await?;
        let Some(product) = product else { return Ok(None) };

        let price: Option<PlatformPriceRow> = sqlx::query_as(
            "SELECT * FROM platform_prices WHERE platform = ? AND product_id = ?",
        )
        .bind(platform.as_str())
        .bind(product.id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(price) = price else { return Ok(None) };

        from_normalized_rows(product, price).map(Some)
    }

    async fn product_count(&self, platform: Platform) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM platform_prices WHERE platform = ?")
                .bind(platform.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
