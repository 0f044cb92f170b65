//! Read-only access to the per-platform category cache files.
//!
//! Category discovery is a separate collaborator that writes
//! `<platform>-categories.json` next to the database. The walk consumes
//! those descriptors verbatim; a missing or empty file means the platform
//! has not been discovered yet and its run is skipped with a warning.

use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::error::{Result, ScrapeError};
use crate::types::{Category, Platform, Subcategory};

/// Loads the category descriptors for a platform from `dir`.
pub fn load_categories(platform: Platform, dir: &Path) -> Result<Vec<Category>> {
    let path = dir.join(format!("{}-categories.json", platform.as_str()));
    let raw = std::fs::read_to_string(&path).map_err(|e| {
        ScrapeError::Catalog(format!("cannot read {}: {e}", path.display()))
    })?;
    if raw.trim().is_empty() {
        return Err(ScrapeError::Catalog(format!("{} is empty", path.display())));
    }
    parse_categories(platform, &raw)
}

/// Parses one platform's catalog document into resolved traversal units.
pub fn parse_categories(platform: Platform, json: &str) -> Result<Vec<Category>> {
    match platform {
        Platform::Dmart => {
            let file: DmartCatalogFile = serde_json::from_str(json)?;
            Ok(file
                .cat_array
                .into_iter()
                .map(|c| Category {
                    name: c.name,
                    source_token: c.seo_token,
                    url: String::new(),
                    subcategories: Vec::new(),
                })
                .collect())
        }
        Platform::Zepto => {
            let file: ZeptoCatalogFile = serde_json::from_str(json)?;
            let mut categories = Vec::new();
            for c in file.categories {
                if c.subcategories.is_empty() {
                    // Zepto listing URLs need a subcategory id; nothing to
                    // walk without one.
                    warn!(category = %c.name, "Zepto category has no subcategories, skipping");
                    continue;
                }
                categories.push(Category {
                    name: c.name,
                    source_token: c.id,
                    url: String::new(),
                    subcategories: c.subcategories,
                });
            }
            Ok(categories)
        }
        Platform::Blinkit => {
            let file: BlinkitCatalogFile = serde_json::from_str(json)?;
            Ok(file
                .categories
                .into_iter()
                .map(|c| Category {
                    name: c.name,
                    source_token: String::new(),
                    url: c.url,
                    subcategories: Vec::new(),
                })
                .collect())
        }
    }
}

#[derive(Debug, Deserialize)]
struct DmartCatalogFile {
    #[serde(rename = "catArray")]
    cat_array: Vec<DmartCategory>,
}

#[derive(Debug, Deserialize)]
struct DmartCategory {
    name: String,
    #[serde(rename = "seoToken")]
    seo_token: String,
}

#[derive(Debug, Deserialize)]
struct ZeptoCatalogFile {
    categories: Vec<ZeptoCategory>,
}

#[derive(Debug, Deserialize)]
struct ZeptoCategory {
    name: String,
    id: String,
    #[serde(default)]
    subcategories: Vec<Subcategory>,
}

#[derive(Debug, Deserialize)]
struct BlinkitCatalogFile {
    categories: Vec<BlinkitCategory>,
}

#[derive(Debug, Deserialize)]
struct BlinkitCategory {
    name: String,
    url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dmart_catalog_parses_seo_tokens() {
        let json = r#"{
            "totalRecords": 2,
            "catArray": [
                { "name": "Grocery", "seoToken": "grocery", "uniqueId": "c1" },
                { "name": "Dairy & Beverages", "seoToken": "dairy-beverages", "uniqueId": "c2" }
            ]
        }"#;

        let categories = parse_categories(Platform::Dmart, json).unwrap();
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].source_token, "grocery");
        assert_eq!(categories[1].name, "Dairy & Beverages");
    }

    #[test]
    fn zepto_catalog_keeps_nested_subcategories() {
        let json = r#"{
            "categories": [
                {
                    "name": "Fruits & Vegetables",
                    "id": "cid-1",
                    "subcategories": [
                        { "id": "scid-1", "name": "Fresh Fruits" },
                        { "id": "scid-2", "name": "Fresh Vegetables" }
                    ]
                },
                { "name": "Orphan", "id": "cid-2" }
            ]
        }"#;

        let categories = parse_categories(Platform::Zepto, json).unwrap();
        assert_eq!(categories.len(), 1, "category without subcategories is skipped");
        assert_eq!(categories[0].subcategories.len(), 2);
        assert_eq!(categories[0].subcategories[1].name, "Fresh Vegetables");
    }

    #[test]
    fn blinkit_catalog_carries_resolved_urls() {
        let json = r#"{
            "categories": [
                { "name": "Dairy", "url": "https://blinkit.com/cn/dairy/cid/14" }
            ]
        }"#;

        let categories = parse_categories(Platform::Blinkit, json).unwrap();
        assert_eq!(categories[0].url, "https://blinkit.com/cn/dairy/cid/14");
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(parse_categories(Platform::Dmart, "{\"nope\": []}").is_err());
    }
}
