//! Listing snapshot extraction.
//!
//! Parses the rendered HTML of a listing page into the set of product
//! records currently in the DOM. A card missing its name, image or current
//! price is dropped with a debug log; one malformed card never aborts the
//! sibling cards or the snapshot.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::error::{Result, ScrapeError};
use crate::identity::identity_key;
use crate::platforms::{ImageSource, SelectorMap};
use crate::types::{Platform, ScrapedRecord};

pub struct SnapshotExtractor {
    item: Selector,
    name: Selector,
    image: Selector,
    variant: Selector,
    current_price: Selector,
    actual_price: Selector,
    out_of_stock: Selector,
    image_source: ImageSource,
}

impl SnapshotExtractor {
    pub fn new(map: &SelectorMap) -> Result<Self> {
        Ok(Self {
            item: parse_selector(map.item)?,
            name: parse_selector(map.name)?,
            image: parse_selector(map.image)?,
            variant: parse_selector(map.variant)?,
            current_price: parse_selector(map.current_price)?,
            actual_price: parse_selector(map.actual_price)?,
            out_of_stock: parse_selector(map.out_of_stock)?,
            image_source: map.image_source,
        })
    }

    /// Extracts every complete product card from `html`. Identity keys are
    /// deterministic across repeated passes over the same underlying data,
    /// which is what lets the convergence driver detect "no new records".
    pub fn extract(&self, html: &str, platform: Platform, category: &str) -> Vec<ScrapedRecord> {
        let doc = Html::parse_document(html);
        let mut records = Vec::new();

        for card in doc.select(&self.item) {
            match self.extract_card(card, platform, category) {
                Some(record) => records.push(record),
                None => {
                    debug!(
                        platform = %platform,
                        category,
                        "Skipping partial product card",
                    );
                }
            }
        }

        records
    }

    fn extract_card(
        &self,
        card: ElementRef<'_>,
        platform: Platform,
        category: &str,
    ) -> Option<ScrapedRecord> {
        let name = text_of(card, &self.name)?;
        let image = self.image_url(card)?;
        let current_price = parse_price(&text_of(card, &self.current_price)?)?;

        let variant = text_of(card, &self.variant).unwrap_or_default();
        let actual_price = text_of(card, &self.actual_price).and_then(|t| parse_price(&t));
        let available = card.select(&self.out_of_stock).next().is_none();

        Some(ScrapedRecord {
            identity_key: identity_key(&name, &variant),
            name,
            variant,
            image,
            current_price,
            actual_price,
            available,
            platform,
            category: category.to_string(),
        })
    }

    fn image_url(&self, card: ElementRef<'_>) -> Option<String> {
        let img = card.select(&self.image).next()?;
        match self.image_source {
            ImageSource::Src => img
                .value()
                .attr("src")
                .map(str::to_string)
                .filter(|s| !s.is_empty()),
            ImageSource::Srcset => img.value().attr("srcset").and_then(first_srcset_url),
        }
    }
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|_| ScrapeError::Selector(css.to_string()))
}

fn text_of(card: ElementRef<'_>, selector: &Selector) -> Option<String> {
    let el = card.select(selector).next()?;
    let text = el.text().collect::<String>().trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// First URL of a srcset attribute (`"https://a.jpg 100w, https://b.jpg 200w"`).
fn first_srcset_url(srcset: &str) -> Option<String> {
    srcset
        .split_whitespace()
        .next()
        .map(|url| url.trim_end_matches(',').to_string())
        .filter(|url| url.starts_with("http"))
}

/// Parses a listing price label (`"₹45"`, `"MRP ₹1,299.50"`) to rupees.
/// Returns None when no positive amount is present, which drops the record.
pub fn parse_price(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let price: f64 = cleaned.parse().ok()?;
    (price > 0.0).then_some(price)
}
