//! Listing extraction from a rendered search page.
//!
//! Two strategies share one contract: the structured extractor reads the
//! markup a site is known to use, the heuristic one scans every link for
//! something that looks like a priced listing. The caller picks by asking
//! the structured extractor whether its item selector matched at all.
//!
//! Everything here is synchronous because `scraper::Html` is `!Send`; parse
//! and extract without holding the document across an await.

use crate::utils::error::{Result, ScoutError};
use crate::utils::text::{parse_price, split_price, text_lines};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Prices below this are quantities, ids, or point rewards, not prices.
pub const PRICE_FLOOR: u64 = 100;
/// Shorter hrefs are navigation (`/`, `/cart`), not product pages.
pub const MIN_HREF_LEN: usize = 12;

/// A listing as read off the page, before it is bound to an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageListing {
    pub name: String,
    pub price: u64,
    pub url: String,
}

pub trait ListingExtractor {
    /// Whether this strategy recognises anything on the page.
    fn applies(&self, document: &Html) -> bool;

    fn extract(&self, document: &Html, base: &Url) -> Vec<PageListing>;
}

fn parse_selector(field: &str, css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScoutError::InvalidConfigValueError {
        field: field.to_string(),
        value: css.to_string(),
        reason: format!("Invalid CSS selector: {}", e),
    })
}

fn resolve_href(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    base.join(href).ok().map(|u| u.to_string())
}

/// Reads listings from the site's current markup.
pub struct StructuredExtractor {
    item: Selector,
    name: Selector,
    price: Selector,
    link: Selector,
}

impl StructuredExtractor {
    pub fn new(item: &str, name: &str, price: &str, link: Option<&str>) -> Result<Self> {
        Ok(Self {
            item: parse_selector("item_selector", item)?,
            name: parse_selector("name_selector", name)?,
            price: parse_selector("price_selector", price)?,
            link: parse_selector("link_selector", link.unwrap_or("a[href]"))?,
        })
    }

    fn read_item(&self, item: ElementRef<'_>, base: &Url) -> Option<PageListing> {
        let name = item
            .select(&self.name)
            .next()
            .map(|el| text_lines(el.text()).join(" "))
            .filter(|n| !n.is_empty())?;
        let price = item
            .select(&self.price)
            .next()
            .and_then(|el| parse_price(&el.text().collect::<String>()))?;

        // Cards are often a single anchor; otherwise take the first link inside.
        let href = item
            .value()
            .attr("href")
            .or_else(|| item.select(&self.link).find_map(|a| a.value().attr("href")));
        let url = href
            .and_then(|h| resolve_href(base, h))
            .unwrap_or_else(|| base.to_string());

        Some(PageListing { name, price, url })
    }
}

impl ListingExtractor for StructuredExtractor {
    fn applies(&self, document: &Html) -> bool {
        document.select(&self.item).next().is_some()
    }

    fn extract(&self, document: &Html, base: &Url) -> Vec<PageListing> {
        document
            .select(&self.item)
            .filter_map(|item| {
                let listing = self.read_item(item, base);
                if listing.is_none() {
                    tracing::debug!("Dropping result card without a readable name or price");
                }
                listing
            })
            .collect()
    }
}

/// Treats any link whose text carries a currency marker as a listing.
pub struct HeuristicExtractor {
    anchors: Selector,
    min_href_len: usize,
    price_floor: u64,
}

impl HeuristicExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            anchors: parse_selector("heuristic anchors", "a[href]")?,
            min_href_len: MIN_HREF_LEN,
            price_floor: PRICE_FLOOR,
        })
    }

    fn classify(&self, anchor: ElementRef<'_>, base: &Url) -> Option<PageListing> {
        let href = anchor.value().attr("href")?;
        if href.trim().len() < self.min_href_len {
            return None;
        }
        let url = resolve_href(base, href)?;

        let lines = text_lines(anchor.text());
        let (price_index, price, rest) = lines.iter().enumerate().find_map(|(i, line)| {
            split_price(line)
                .filter(|(p, _)| *p >= self.price_floor)
                .map(|(p, rest)| (i, p, rest))
        })?;

        // Single-line anchors carry the name next to the price.
        let name = lines
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != price_index)
            .map(|(_, line)| line.clone())
            .max_by_key(|line| line.chars().count())
            .or_else(|| Some(rest).filter(|r| !r.is_empty()))?;

        Some(PageListing { name, price, url })
    }
}

impl ListingExtractor for HeuristicExtractor {
    fn applies(&self, document: &Html) -> bool {
        document.select(&self.anchors).next().is_some()
    }

    fn extract(&self, document: &Html, base: &Url) -> Vec<PageListing> {
        let mut seen = HashSet::new();
        document
            .select(&self.anchors)
            .filter_map(|a| self.classify(a, base))
            .filter(|listing| seen.insert(listing.url.clone()))
            .collect()
    }
}

/// What came out of a page and which strategy produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub listings: Vec<PageListing>,
    pub used_fallback: bool,
}

/// Parses the page once and runs the structured extractor, or the heuristic
/// one when the structured item selector matches nothing.
pub fn extract_listings(
    html: &str,
    base: &Url,
    structured: &StructuredExtractor,
    heuristic: &HeuristicExtractor,
) -> Extraction {
    let document = Html::parse_document(html);

    if structured.applies(&document) {
        Extraction {
            listings: structured.extract(&document, base),
            used_fallback: false,
        }
    } else {
        Extraction {
            listings: heuristic.extract(&document, base),
            used_fallback: true,
        }
    }
}
