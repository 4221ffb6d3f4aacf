//! Seller phone lookup
//!
//! Listing pages do not contain the phone number. They carry a listing id and
//! a short-lived signed token that the site's phone endpoint accepts; the
//! endpoint answers with JSON.

use serde::Deserialize;
use url::Url;

/// Country prefix prepended to the subscriber digits
const PHONE_PREFIX: &str = "+380";

/// Number of trailing digits kept from the formatted number
const SUBSCRIBER_DIGITS: usize = 9;

/// Parameters for one phone request, taken from a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneLookup {
    pub auto_id: String,
    pub hash: String,
    pub expires: String,
}

impl PhoneLookup {
    /// Endpoint URL, resolved against the listing URL
    pub fn url(&self, listing_url: &Url) -> Option<Url> {
        let mut url = listing_url
            .join(&format!("/users/phones/{}/", self.auto_id))
            .ok()?;
        url.query_pairs_mut()
            .append_pair("hash", &self.hash)
            .append_pair("expires", &self.expires);
        Some(url)
    }
}

#[derive(Debug, Deserialize)]
struct PhoneResponse {
    #[serde(rename = "formattedPhoneNumber")]
    formatted_phone_number: Option<String>,
}

/// Extracts the phone number from an endpoint response
///
/// The site formats numbers for display (`(050) 111 22 33`); only the last nine
/// digits are kept and prefixed with `+380`. A blocked request answers with an
/// HTML page, which is not JSON and yields `None`.
pub fn parse_phone_response(body: &str) -> Option<String> {
    let response: PhoneResponse = serde_json::from_str(body).ok()?;
    let digits: String = response
        .formatted_phone_number?
        .chars()
        .filter(char::is_ascii_digit)
        .collect();

    if digits.len() < SUBSCRIBER_DIGITS {
        return None;
    }

    Some(format!(
        "{}{}",
        PHONE_PREFIX,
        &digits[digits.len() - SUBSCRIBER_DIGITS..]
    ))
}
