//! Delegated address extraction through an LLM.
//!
//! The model is asked for a bare JSON object; replies wrapped in markdown
//! code fences are unwrapped before parsing. Any empty or malformed reply
//! maps to a single well-defined `ExtractionError` so callers never see a
//! raw parse failure.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{AddressExtractor, ExtractedFields, clean_delivery_message};
use crate::error::ExtractionError;
use crate::llm::LlmProvider;

const SYSTEM_PROMPT: &str = "You extract delivery information from courier SMS/WhatsApp messages. \
Reply with exactly one JSON object: \
{\"address\": string|null, \"internalCode\": string|null, \"pickupPoint\": string|null}. \
\"address\" is the street address in the form \"street number, city\", or null when the \
message contains none. \"internalCode\" is a pickup or locker code. \"pickupPoint\" is the \
name of the pickup location. Reply with the JSON object only, no prose.";

/// Extractor that sends the message to an LLM with a fixed prompt.
pub struct LlmExtractor {
    llm: Arc<dyn LlmProvider>,
}

impl LlmExtractor {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl AddressExtractor for LlmExtractor {
    async fn extract(&self, message: &str) -> Result<ExtractedFields, ExtractionError> {
        let message = clean_delivery_message(message);
        let reply = self.llm.complete(SYSTEM_PROMPT, &message).await?;
        debug!(model = self.llm.model_name(), "Extraction reply received");
        parse_reply(&reply)
    }
}

/// Strip surrounding ``` fences (with an optional language tag) from a reply.
fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    // Drop a language tag like "json" on the opening fence line
    match inner.split_once('\n') {
        Some((first, rest)) if !first.trim_start().starts_with('{') => rest.trim(),
        _ => inner.trim(),
    }
}

fn parse_reply(reply: &str) -> Result<ExtractedFields, ExtractionError> {
    let body = strip_code_fences(reply);
    if body.is_empty() {
        return Err(ExtractionError::EmptyReply);
    }
    serde_json::from_str(body).map_err(|e| ExtractionError::BadReply(e.to_string()))
}
