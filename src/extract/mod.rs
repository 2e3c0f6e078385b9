//! Address/field extraction from free-text delivery messages.
//!
//! Two interchangeable strategies behind one trait:
//! - [`RegexExtractor`] — deterministic Hebrew street-number-city matching.
//! - [`LlmExtractor`] — delegates to an LLM with a fixed prompt.
//!
//! A message with no recognizable address is a normal outcome, not an
//! error: extractors return `address: None` and callers treat that as
//! "no update".

mod llm;
mod regex;

pub use llm::LlmExtractor;
pub use regex::RegexExtractor;

use std::sync::LazyLock;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ExtractionError;

/// Structured fields pulled out of one delivery message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedFields {
    /// Street address, normalized to "street number, city".
    pub address: Option<String>,
    /// Pickup/locker code printed in the message.
    pub internal_code: Option<String>,
    /// Name of the pickup point, when the message names one.
    pub pickup_point: Option<String>,
}

/// One extraction strategy.
#[async_trait]
pub trait AddressExtractor: Send + Sync {
    async fn extract(&self, message: &str) -> Result<ExtractedFields, ExtractionError>;
}

static MARKUP: LazyLock<::regex::Regex> =
    LazyLock::new(|| ::regex::Regex::new(r"[*_]").expect("markup pattern"));

static EMOJI: LazyLock<::regex::Regex> = LazyLock::new(|| {
    ::regex::Regex::new(r"[\x{1F300}-\x{1FAD6}\x{1F900}-\x{1F9FF}\x{1FA70}-\x{1FAFF}]")
        .expect("emoji pattern")
});

static MULTI_SPACE: LazyLock<::regex::Regex> =
    LazyLock::new(|| ::regex::Regex::new(r"\s{2,}").expect("whitespace pattern"));

/// Clean a raw delivery message: drop chat markup (asterisks, underscores)
/// and emoji, then collapse runs of whitespace.
pub fn clean_delivery_message(raw: &str) -> String {
    let no_markup = MARKUP.replace_all(raw, "");
    let no_emoji = EMOJI.replace_all(&no_markup, "");
    MULTI_SPACE.replace_all(&no_emoji, " ").trim().to_string()
}
