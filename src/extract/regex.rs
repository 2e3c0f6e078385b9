//! Deterministic address extraction for Hebrew delivery messages.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use super::{AddressExtractor, ExtractedFields, clean_delivery_message};
use crate::error::ExtractionError;

/// Generic location words that precede the actual address in courier
/// messages ("next to", "store", "street", "branch"...). Stripped before
/// pattern matching so they don't bleed into the street name.
const GENERIC_LOCATION_WORDS: &[&str] = &["ליד", "רחוב", "חנות", "סניף", "מרכז", "כתובת"];

/// Street words, a house number, then city words, up to end of
/// line/sentence. Hebrew script only.
static ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([\u{05D0}-\u{05EA}][\u{05D0}-\u{05EA}\s]*?)\s(\d+),?\s([\u{05D0}-\u{05EA}][\u{05D0}-\u{05EA}\s]*?)(?:[\n.,]|$)")
        .expect("address pattern")
});

/// Pickup/locker code: "קוד איסוף: 1234" or "קוד 1234".
static INTERNAL_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"קוד(?:\s+איסוף)?\s*:?\s*(\d{3,10})").expect("internal code pattern")
});

/// Pickup point name: "נקודת איסוף: ..." up to end of line/sentence.
static PICKUP_POINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"נקודת\s+איסוף\s*:?\s*([^\n.,]+)").expect("pickup point pattern")
});

/// Regex-based extractor for Hebrew "street number city" addresses.
#[derive(Debug, Clone, Default)]
pub struct RegexExtractor;

impl RegexExtractor {
    pub fn new() -> Self {
        Self
    }

    fn strip_generic_words(message: &str) -> String {
        let kept: Vec<&str> = message
            .split_whitespace()
            .filter(|word| !GENERIC_LOCATION_WORDS.contains(word))
            .collect();
        kept.join(" ")
    }

    /// First "street number city" match wins; returns `None` when the
    /// message carries no address in Hebrew script.
    fn find_address(message: &str) -> Option<String> {
        let stripped = Self::strip_generic_words(message);

        for caps in ADDRESS.captures_iter(&stripped) {
            let street = caps[1].trim();
            let number = caps[2].trim();
            let city = caps[3].trim();
            if !street.is_empty() && !number.is_empty() && !city.is_empty() {
                return Some(format!("{street} {number}, {city}"));
            }
        }
        None
    }
}

#[async_trait]
impl AddressExtractor for RegexExtractor {
    async fn extract(&self, message: &str) -> Result<ExtractedFields, ExtractionError> {
        let message = clean_delivery_message(message);

        Ok(ExtractedFields {
            address: Self::find_address(&message),
            internal_code: INTERNAL_CODE
                .captures(&message)
                .map(|caps| caps[1].to_string()),
            pickup_point: PICKUP_POINT
                .captures(&message)
                .map(|caps| caps[1].trim().to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn extract(message: &str) -> ExtractedFields {
        RegexExtractor::new().extract(message).await.unwrap()
    }

    #[tokio::test]
    async fn extracts_street_number_city() {
        let fields = extract("הרצל 5 תל אביב").await;
        assert_eq!(fields.address.as_deref(), Some("הרצל 5, תל אביב"));
    }

    #[tokio::test]
    async fn strips_generic_location_words() {
        let fields = extract("ליד חנות רחוב הרצל 5 תל אביב").await;
        assert_eq!(fields.address.as_deref(), Some("הרצל 5, תל אביב"));
    }

    #[tokio::test]
    async fn no_address_yields_none_not_error() {
        let fields = extract("your package has shipped").await;
        assert_eq!(fields.address, None);

        // Hebrew text without a street-number-city shape
        let fields = extract("החבילה נשלחה ותגיע בקרוב").await;
        assert_eq!(fields.address, None);
    }

    #[tokio::test]
    async fn first_match_wins() {
        let fields = extract("הרצל 5 תל אביב. ביאליק 12 רמת גן").await;
        assert_eq!(fields.address.as_deref(), Some("הרצל 5, תל אביב"));
    }

    #[tokio::test]
    async fn address_terminated_by_comma_or_period() {
        let fields = extract("ויצמן 10 חיפה, תודה").await;
        assert_eq!(fields.address.as_deref(), Some("ויצמן 10, חיפה"));
    }

    #[tokio::test]
    async fn picks_up_internal_code() {
        let fields = extract("קוד איסוף: 4821 בסניף הדואר").await;
        assert_eq!(fields.internal_code.as_deref(), Some("4821"));
    }

    #[tokio::test]
    async fn picks_up_pickup_point_name() {
        let fields = extract("נקודת איסוף: סופר יוחננוף, פתוח עד 22:00").await;
        assert_eq!(fields.pickup_point.as_deref(), Some("סופר יוחננוף"));
    }
}
