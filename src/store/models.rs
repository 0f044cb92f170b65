//! Database row types for the two persisted layouts. Used by sqlx for
//! typed queries; converted to domain types before leaving the store.

use chrono::{DateTime, Utc};

use crate::error::{Result, ScrapeError};
use crate::types::{CanonicalProduct, Platform, PriceHistoryEntry};

/// Row of the embedded-layout `products` table.
#[derive(Debug, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub platform: String,
    pub identity_slug: String,
    pub name: String,
    pub variant: String,
    pub image: String,
    pub category: String,
    pub current_price: f64,
    pub actual_price: Option<f64>,
    pub available: i64,
    pub price_history: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Row of the normalized-layout `catalog_products` table.
#[derive(Debug, sqlx::FromRow)]
pub struct CatalogProductRow {
    pub id: i64,
    pub identity_slug: String,
    pub name: String,
    pub variant: String,
    pub image: String,
    pub category: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Row of the normalized-layout `platform_prices` table.
#[derive(Debug, sqlx::FromRow)]
pub struct PlatformPriceRow {
    pub id: i64,
    pub platform: String,
    pub product_id: i64,
    pub platform_product_id: String,
    pub current_price: f64,
    pub actual_price: Option<f64>,
    pub available: i64,
    pub price_history: String,
    pub last_updated: String,
}

pub fn parse_platform(token: &str) -> Result<Platform> {
    Platform::parse(token)
        .ok_or_else(|| ScrapeError::CorruptRow(format!("unknown platform token `{token}`")))
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ScrapeError::CorruptRow(format!("bad timestamp `{raw}`: {e}")))
}

pub fn parse_history(raw: &str) -> Result<Vec<PriceHistoryEntry>> {
    Ok(serde_json::from_str(raw)?)
}

impl TryFrom<ProductRow> for CanonicalProduct {
    type Error = ScrapeError;

    fn try_from(row: ProductRow) -> Result<Self> {
        Ok(CanonicalProduct {
            id: row.id,
            platform: parse_platform(&row.platform)?,
            identity_slug: row.identity_slug,
            name: row.name,
            variant: row.variant,
            image: row.image,
            category: row.category,
            current_price: row.current_price,
            actual_price: row.actual_price,
            available: row.available != 0,
            price_history: parse_history(&row.price_history)?,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

/// Assembles a canonical product from the normalized layout's two rows.
pub fn from_normalized_rows(
    product: CatalogProductRow,
    price: PlatformPriceRow,
) -> Result<CanonicalProduct> {
    Ok(CanonicalProduct {
        id: product.id,
        platform: parse_platform(&price.platform)?,
        identity_slug: product.identity_slug,
        name: product.name,
        variant: product.variant,
        image: product.image,
        category: product.category,
        current_price: price.current_price,
        actual_price: price.actual_price,
        available: price.available != 0,
        price_history: parse_history(&price.price_history)?,
        created_at: parse_timestamp(&product.created_at)?,
        updated_at: parse_timestamp(&price.last_updated)?,
    })
}
