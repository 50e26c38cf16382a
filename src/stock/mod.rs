//! Stock detection over rendered product pages.
//!
//! Everything in here is a pure function over an HTML string. `scraper::Html`
//! is not `Send`, so parses never cross an await point; async callers hand in
//! the page content and get plain data back.

use std::fmt;

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Phrases that indicate an item is out of stock, in match order.
pub const OUT_OF_STOCK_SIGNALS: [&str; 5] = [
    "currently unavailable",
    "out of stock",
    "sign up for restock",
    "we don't know when or if this item will be back in stock",
    "no featured offers available",
];

static ADD_TO_CART_SEL: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("#add-to-cart-button, #add-to-cart-button-ubb").expect("invalid selector")
});
static BUY_NOW_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#buy-now-button").expect("invalid selector"));
static UNQUALIFIED_BUYBOX_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#unqualifiedBuyBox").expect("invalid selector"));
static AVAILABILITY_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#availability").expect("invalid selector"));
static TITLE_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#productTitle").expect("invalid selector"));
static PRICE_WHOLE_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.a-price-whole").expect("invalid selector"));
static PRICE_FRACTION_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.a-price-fraction").expect("invalid selector"));
static MERCHANT_INFO_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#merchant-info").expect("invalid selector"));
static TABULAR_BUYBOX_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#tabular-buybox-container").expect("invalid selector"));

/// Tri-state stock status. `Unknown` is a real outcome, not a default-false:
/// an undetermined page must never look like a restock edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Availability {
    InStock,
    OutOfStock,
    #[default]
    Unknown,
}

impl Availability {
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Availability::InStock => Some(true),
            Availability::OutOfStock => Some(false),
            Availability::Unknown => None,
        }
    }

    pub fn from_bool(value: Option<bool>) -> Self {
        match value {
            Some(true) => Availability::InStock,
            Some(false) => Availability::OutOfStock,
            None => Availability::Unknown,
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Availability::InStock => "in stock",
            Availability::OutOfStock => "out of stock",
            Availability::Unknown => "unknown",
        };
        f.write_str(text)
    }
}

// Persisted as `true` / `false` / `null` so the durable records stay readable.
impl Serialize for Availability {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_bool().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Availability {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Availability::from_bool(Option::<bool>::deserialize(
            deserializer,
        )?))
    }
}

/// Everything the detector pulls out of one rendered product page.
#[derive(Debug, Clone, Default)]
pub struct StockInfo {
    pub availability: Availability,
    pub title: Option<String>,
    pub price: Option<String>,
    pub sold_by: Option<String>,
}

/// Parses the page once and runs detection plus metadata extraction.
pub fn inspect(html: &str) -> StockInfo {
    let doc = Html::parse_document(html);
    StockInfo {
        availability: detect(&doc),
        title: extract_title(&doc),
        price: extract_price(&doc),
        sold_by: extract_sold_by(&doc),
    }
}

/// Tri-state detection with fixed precedence: purchase controls win over
/// every negative signal, the unqualified buy box marker beats phrase scans,
/// the availability region is scanned before the whole page.
fn detect(doc: &Html) -> Availability {
    if doc.select(&ADD_TO_CART_SEL).next().is_some()
        || doc.select(&BUY_NOW_SEL).next().is_some()
    {
        return Availability::InStock;
    }

    // No seller won the buy box.
    if doc.select(&UNQUALIFIED_BUYBOX_SEL).next().is_some() {
        return Availability::OutOfStock;
    }

    if let Some(region) = doc.select(&AVAILABILITY_SEL).next() {
        let text = element_text(&region).to_lowercase();
        if matches_signal(&text) {
            return Availability::OutOfStock;
        }
    }

    let body = doc.root_element().text().collect::<String>().to_lowercase();
    if matches_signal(&body) {
        return Availability::OutOfStock;
    }

    Availability::Unknown
}

fn matches_signal(text: &str) -> bool {
    OUT_OF_STOCK_SIGNALS
        .iter()
        .any(|signal| text.contains(signal))
}

fn element_text(element: &scraper::ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

fn extract_title(doc: &Html) -> Option<String> {
    let el = doc.select(&TITLE_SEL).next()?;
    let title = element_text(&el).trim().to_string();
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

/// Composes the split price markup into a single display string, e.g. `$54.99`.
fn extract_price(doc: &Html) -> Option<String> {
    let whole = doc.select(&PRICE_WHOLE_SEL).next()?;
    let fraction = doc
        .select(&PRICE_FRACTION_SEL)
        .next()
        .map(|el| element_text(&el).trim().to_string())
        .unwrap_or_default();
    Some(format!("${}{}", element_text(&whole).trim(), fraction))
}

fn extract_sold_by(doc: &Html) -> Option<String> {
    for selector in [&*MERCHANT_INFO_SEL, &*TABULAR_BUYBOX_SEL] {
        if let Some(el) = doc.select(selector).next() {
            let text = element_text(&el).trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}
