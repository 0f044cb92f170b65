//! Product persistence strategies.
//!
//! The upsert contract is the same for every layout: look up the canonical
//! product by normalized (platform, name, variant) identity, create it if
//! absent, append a price-history observation unconditionally, and
//! overwrite the display fields last-write-wins. The find-and-modify must
//! be atomic at the storage layer: a read followed by a separate write is
//! a race and loses concurrent history appends.

pub mod embedded;
pub mod memory;
pub mod models;
pub mod normalized;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{CanonicalProduct, Platform, ScrapedRecord};

pub use embedded::EmbeddedStore;
pub use memory::MemoryStore;
pub use normalized::NormalizedStore;

#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Create-if-absent, then append one history entry and refresh the
    /// current fields. Returns the product as persisted.
    async fn upsert(&self, record: &ScrapedRecord) -> Result<CanonicalProduct>;

    /// Looks up a canonical product by its identity slug within a platform.
    async fn find_by_identity(
        &self,
        platform: Platform,
        identity_slug: &str,
    ) -> Result<Option<CanonicalProduct>>;

    /// Number of canonical products tracked for a platform.
    async fn product_count(&self, platform: Platform) -> Result<i64>;
}
