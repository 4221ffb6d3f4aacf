//! Field extraction from listing detail pages
//!
//! Every field is read on its own: a missing or malformed field is simply
//! absent from the record. Only a page with neither a title nor a price block
//! is rejected, since that is what a removed listing or an error page looks like.

use crate::crawler::html::{digits_to_u64, element_text, first_text, select_first, selector};
use crate::crawler::phone::PhoneLookup;
use crate::storage::ListingRecord;
use scraper::Html;
use thiserror::Error;
use url::Url;

const TITLE: &str = "h1.head";
const PRICE_BLOCK: &str = "div.price_value";
const PRICE: &str = "div.price_value strong";
const ODOMETER: &str = "div.base-information span";
const USERNAME: &str = ".seller_info_name";
const MAIN_IMAGE: &str = "div.photo-620x465 picture img[src]";
const PHOTO_CONTAINER: &str = "div[photocontainer='photo']";
const PLATE: &str = "span.state-num";
const VIN: &str = "span.label-vin";
const VIN_FALLBACK: &str = "span.vin-code";
const PHONE_SCRIPT_CLASS: &str = "js-user-secure-";

/// Odometer readings are displayed in thousands of kilometres
const ODOMETER_UNIT_KM: u64 = 1000;

/// Why a page could not be turned into a record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("{url} is not a listing page (no title or price block)")]
    NotAListing { url: String },
}

/// A record plus what is needed to complete it
#[derive(Debug, Clone)]
pub struct ParsedListing {
    pub record: ListingRecord,

    /// Phone endpoint parameters, when the page exposes them
    pub phone_lookup: Option<PhoneLookup>,
}

/// Extracts a listing record from a detail page
///
/// `found_at` is set to the current time; `phone_number` is left absent and is
/// filled in by the phone lookup.
///
/// # Errors
///
/// `ExtractionError::NotAListing` when the page has neither `h1.head` nor
/// `div.price_value`.
pub fn parse_listing(html: &str, url: &Url) -> Result<ParsedListing, ExtractionError> {
    let document = Html::parse_document(html);

    if select_first(&document, TITLE).is_none() && select_first(&document, PRICE_BLOCK).is_none() {
        return Err(ExtractionError::NotAListing {
            url: url.to_string(),
        });
    }

    let mut record = ListingRecord::new(url);
    record.title = first_text(&document, TITLE);
    record.price_usd = extract_price(&document);
    record.odometer = extract_odometer(&document);
    record.username = first_text(&document, USERNAME);
    record.image_url = extract_image_url(&document, url);
    record.images_count = extract_images_count(&document);
    record.car_number = extract_car_number(&document);
    record.car_vin = first_text(&document, VIN).or_else(|| first_text(&document, VIN_FALLBACK));

    Ok(ParsedListing {
        record,
        phone_lookup: extract_phone_lookup(&document),
    })
}

fn extract_price(document: &Html) -> Option<u64> {
    first_text(document, PRICE).as_deref().and_then(digits_to_u64)
}

fn extract_odometer(document: &Html) -> Option<u64> {
    first_text(document, ODOMETER)
        .as_deref()
        .and_then(digits_to_u64)
        .and_then(|thousands| thousands.checked_mul(ODOMETER_UNIT_KM))
}

fn extract_image_url(document: &Html, page_url: &Url) -> Option<String> {
    let src = select_first(document, MAIN_IMAGE)?.value().attr("src")?.trim();
    if src.is_empty() {
        return None;
    }
    Some(
        page_url
            .join(src)
            .map(String::from)
            .unwrap_or_else(|_| src.to_string()),
    )
}

fn extract_images_count(document: &Html) -> Option<u32> {
    let container = select_first(document, PHOTO_CONTAINER)?;
    let links = selector("a")?;
    u32::try_from(container.select(&links).count()).ok()
}

/// Plate text keeps only Latin capitals and digits
fn extract_car_number(document: &Html) -> Option<String> {
    let text = element_text(select_first(document, PLATE)?);
    let plate: String = text
        .chars()
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        .collect();
    (!plate.is_empty()).then_some(plate)
}

fn extract_phone_lookup(document: &Html) -> Option<PhoneLookup> {
    let auto_id = select_first(document, "body[data-auto-id]")?
        .value()
        .attr("data-auto-id")?
        .trim()
        .to_string();
    if auto_id.is_empty() {
        return None;
    }

    let scripts = selector("script[class]")?;
    let secure = document.select(&scripts).find(|script| {
        script.value().classes().any(|class| {
            class
                .strip_prefix(PHONE_SCRIPT_CLASS)
                .is_some_and(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
        })
    });

    let attr = |name: &str| {
        secure
            .and_then(|script| script.value().attr(name))
            .unwrap_or_default()
            .to_string()
    };

    Some(PhoneLookup {
        auto_id,
        hash: attr("data-hash"),
        expires: attr("data-expires"),
    })
}
