//! Per-platform scraping profiles.
//!
//! A platform is a variant, not a subclass: everything that differs between
//! storefronts (where a name/price/image lives in the markup, how the
//! listing URL is built, how the viewport advances, how long content takes
//! to settle) is data on [`PlatformProfile`].
//!
//! Selectors track live storefront markup. When extraction starts dropping
//! every card for a platform, capture a listing HTML sample and update its
//! map here.

use std::time::Duration;

use crate::page::ScrollPolicy;
use crate::types::{Category, Platform, Subcategory};

/// Where a card's image URL is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// Plain `src` attribute.
    Src,
    /// First URL of a `srcset` attribute.
    Srcset,
}

/// CSS capability set for one platform's listing markup. All selectors are
/// resolved relative to `item` except `listing_container` and
/// `empty_listing`, which apply to the whole document.
#[derive(Debug, Clone, Copy)]
pub struct SelectorMap {
    /// Waited on after navigation; its absence within the timeout fails the
    /// category.
    pub listing_container: &'static str,
    /// One match per product card.
    pub item: &'static str,
    pub name: &'static str,
    pub image: &'static str,
    pub variant: &'static str,
    pub current_price: &'static str,
    pub actual_price: &'static str,
    /// Marker inside a card that flags it out of stock; availability is its
    /// absence.
    pub out_of_stock: &'static str,
    /// Document-level marker shown when a category has no products at all.
    pub empty_listing: Option<&'static str>,
    pub image_source: ImageSource,
}

#[derive(Debug, Clone)]
pub struct PlatformProfile {
    pub platform: Platform,
    pub base_url: &'static str,
    pub selectors: SelectorMap,
    pub scroll_policy: ScrollPolicy,
    /// Consecutive no-growth cycles required before a listing counts as
    /// exhausted. Slow-loading storefronts need more than one.
    pub stability_threshold: u32,
    /// Wait after each scroll for async content to land.
    pub settle_delay: Duration,
    /// Courtesy pause between category listings.
    pub request_pacing: Duration,
}

impl PlatformProfile {
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Blinkit => Self {
                platform,
                base_url: "https://blinkit.com",
                selectors: SelectorMap {
                    listing_container: ".ProductsContainer__ProductListContainer-sc-1k8vkvc-0",
                    item: ".ProductsContainer__ProductListContainer-sc-1k8vkvc-0 > a",
                    name: ".Product__UpdatedTitle-sc-11dk8zk-9",
                    image: ".Imagestyles__ImageContainer-sc-1u3ccmn-0 img",
                    variant: ".plp-product__quantity--box",
                    current_price: ".Product__UpdatedPriceAndAtcContainer-sc-11dk8zk-10 div div:first-child",
                    actual_price: ".Product__UpdatedPriceAndAtcContainer-sc-11dk8zk-10 div div:nth-child(2)",
                    out_of_stock: ".AddToCart__UpdatedOutOfStockTag-sc-17ig0e3-4",
                    empty_listing: Some(".plp__prouct--not-found-text"),
                    image_source: ImageSource::Src,
                },
                scroll_policy: ScrollPolicy::ViewportStep,
                stability_threshold: 1,
                settle_delay: Duration::from_millis(1000),
                request_pacing: Duration::from_millis(2000),
            },
            Platform::Zepto => Self {
                platform,
                base_url: "https://www.zeptonow.com",
                selectors: SelectorMap {
                    listing_container: ".grid.h-full.w-full.grid-cols-2.gap-y-4.content-start",
                    item: "a.relative.my-3.rounded-t-xl.rounded-b-md.group",
                    name: ".font-subtitle.text-lg.tracking-wider.line-clamp-2",
                    image: ".overflow-hidden.rounded-xl img",
                    variant: ".font-heading.text-lg.tracking-wide.line-clamp-1.mt-1",
                    current_price: ".flex.items-baseline.gap-1 h4",
                    actual_price: ".flex.items-baseline.gap-1 p",
                    out_of_stock: "[data-testid='oos-overlay']",
                    empty_listing: None,
                    image_source: ImageSource::Srcset,
                },
                scroll_policy: ScrollPolicy::ToBottom,
                stability_threshold: 1,
                settle_delay: Duration::from_millis(2000),
                request_pacing: Duration::from_millis(200),
            },
            Platform::Dmart => Self {
                platform,
                base_url: "https://www.dmart.in",
                selectors: SelectorMap {
                    listing_container: ".MuiGrid-root.MuiGrid-container",
                    item: ".MuiGrid-root.MuiGrid-container .MuiGrid-item",
                    name: ".vertical-card_title__pMGg9",
                    image: ".vertical-card_image__yNgf2",
                    variant: ".bootstrap-select_option__SB_Xy span:first-child",
                    current_price: ".vertical-card_amount__80Zwk",
                    actual_price: "section:nth-child(2) > p.vertical-card_value__2EBnX > span.vertical-card_amount__80Zwk",
                    out_of_stock: ".vertical-card_oos-tag__X2Tbs",
                    empty_listing: None,
                    image_source: ImageSource::Src,
                },
                scroll_policy: ScrollPolicy::ToBottom,
                stability_threshold: 2,
                settle_delay: Duration::from_millis(2000),
                request_pacing: Duration::from_millis(2000),
            },
        }
    }

    /// Builds the listing URL for a category, or for one of its
    /// subcategories on platforms with a two-level hierarchy.
    pub fn listing_url(&self, category: &Category, subcategory: Option<&Subcategory>) -> String {
        match (self.platform, subcategory) {
            (Platform::Zepto, Some(sub)) => format!(
                "{}/cn/{}/cid/{}/scid/{}",
                self.base_url,
                url_slug(&category.name),
                category.source_token,
                sub.id,
            ),
            (Platform::Dmart, _) => {
                format!("{}/category/{}", self.base_url, category.source_token)
            }
            // Blinkit categories (and anything else with a resolved URL)
            // carry it from discovery.
            _ => category.url.clone(),
        }
    }
}

/// URL slug for category names: lowercase, `&` dropped, whitespace runs
/// collapsed to single hyphens.
fn url_slug(name: &str) -> String {
    name.to_lowercase()
        .replace('&', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}
