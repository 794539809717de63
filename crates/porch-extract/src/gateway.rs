//! Extraction boundary: free-form driver speech in, `{company_name,
//! delivery_info}` out.
//!
//! This module defines the result type, the error type and the extractor
//! trait. The concrete upstream lives in `gemini.rs`.
//!
//! # Contract
//! The upstream must answer with a single JSON object carrying two string
//! fields, using `"unknown"` for anything it could not find. The payload is
//! parsed as-is: no markdown fence stripping, no partial recovery. Anything
//! else is [`ExtractionError::Malformed`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sentinel the upstream uses for a field it could not extract.
pub const UNKNOWN: &str = "unknown";

/// Structured result of one extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDelivery {
    pub company_name: String,
    pub delivery_info: String,
}

impl ExtractedDelivery {
    pub fn company_known(&self) -> bool {
        !self.company_name.eq_ignore_ascii_case(UNKNOWN)
    }

    pub fn delivery_info_known(&self) -> bool {
        !self.delivery_info.eq_ignore_ascii_case(UNKNOWN)
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Upstream failures. All of them surface to callers as one service-level
/// error, distinct from session-state errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// No API key resolved at boot.
    NotConfigured,
    /// Network or transport failure (unreachable, timeout, TLS).
    Transport(String),
    /// The upstream answered with a non-success status.
    Api { status: u16, message: String },
    /// The upstream answered, but not with the agreed JSON object.
    Malformed(String),
}

impl fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionError::NotConfigured => f.write_str("extraction service is not configured"),
            ExtractionError::Transport(msg) => write!(f, "transport error: {msg}"),
            ExtractionError::Api { status, message } => {
                write!(f, "extraction api error status={status}: {message}")
            }
            ExtractionError::Malformed(msg) => write!(f, "malformed extraction output: {msg}"),
        }
    }
}

impl std::error::Error for ExtractionError {}

// ---------------------------------------------------------------------------
// Extractor trait
// ---------------------------------------------------------------------------

/// Upstream extraction contract.
///
/// Object-safe and `Send + Sync` so the daemon can hold an
/// `Arc<dyn DeliveryExtractor>` in shared state.
#[async_trait::async_trait]
pub trait DeliveryExtractor: Send + Sync {
    /// Human-readable name identifying this upstream (e.g. `"gemini"`).
    fn name(&self) -> &'static str;

    async fn extract(&self, raw_text: &str) -> Result<ExtractedDelivery, ExtractionError>;
}

/// Stand-in used when no API key was resolved. Always fails with
/// [`ExtractionError::NotConfigured`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredExtractor;

#[async_trait::async_trait]
impl DeliveryExtractor for UnconfiguredExtractor {
    fn name(&self) -> &'static str {
        "unconfigured"
    }

    async fn extract(&self, _raw_text: &str) -> Result<ExtractedDelivery, ExtractionError> {
        Err(ExtractionError::NotConfigured)
    }
}

// ---------------------------------------------------------------------------
// Prompt / validation
// ---------------------------------------------------------------------------

/// Instruction sent upstream ahead of the driver's words.
pub fn build_prompt(raw_text: &str) -> String {
    format!(
        "You extract delivery details from a delivery driver's spoken words.\n\
         Return ONLY a JSON object with exactly two string fields:\n\
         \"company_name\": the delivery company or sender,\n\
         \"delivery_info\": what is being delivered (items, count, size).\n\
         Use \"{UNKNOWN}\" for any field that is not mentioned.\n\
         Do not wrap the JSON in markdown or add any other text.\n\n\
         Driver said: \"{}\"",
        raw_text.trim()
    )
}

/// Validate the upstream's text payload against the contract.
pub fn parse_extraction(payload: &str) -> Result<ExtractedDelivery, ExtractionError> {
    let mut out: ExtractedDelivery = serde_json::from_str(payload.trim())
        .map_err(|e| ExtractionError::Malformed(e.to_string()))?;

    if out.company_name.trim().is_empty() {
        out.company_name = UNKNOWN.to_string();
    }
    if out.delivery_info.trim().is_empty() {
        out.delivery_info = UNKNOWN.to_string();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_payload_parses() {
        let out =
            parse_extraction(r#"{"company_name":"Acme","delivery_info":"2 boxes"}"#).unwrap();
        assert_eq!(out.company_name, "Acme");
        assert_eq!(out.delivery_info, "2 boxes");
        assert!(out.company_known());
    }

    #[test]
    fn surrounding_whitespace_is_not_wrapping() {
        assert!(parse_extraction("\n {\"company_name\":\"A\",\"delivery_info\":\"B\"}\n").is_ok());
    }

    #[test]
    fn fenced_payload_is_malformed() {
        let fenced = "```json\n{\"company_name\":\"Acme\",\"delivery_info\":\"x\"}\n```";
        assert!(matches!(
            parse_extraction(fenced),
            Err(ExtractionError::Malformed(_))
        ));
    }

    #[test]
    fn missing_field_is_malformed() {
        assert!(matches!(
            parse_extraction(r#"{"company_name":"Acme"}"#),
            Err(ExtractionError::Malformed(_))
        ));
    }

    #[test]
    fn non_string_field_is_malformed() {
        assert!(matches!(
            parse_extraction(r#"{"company_name":"Acme","delivery_info":2}"#),
            Err(ExtractionError::Malformed(_))
        ));
    }

    #[test]
    fn blank_fields_become_unknown() {
        let out = parse_extraction(r#"{"company_name":" ","delivery_info":""}"#).unwrap();
        assert_eq!(out.company_name, UNKNOWN);
        assert!(!out.delivery_info_known());
    }

    #[test]
    fn prompt_carries_driver_text_and_sentinel() {
        let p = build_prompt("  Acme with two boxes ");
        assert!(p.contains("\"Acme with two boxes\""));
        assert!(p.contains("\"unknown\""));
    }

    #[test]
    fn error_display_api() {
        let err = ExtractionError::Api {
            status: 403,
            message: "denied".to_string(),
        };
        assert_eq!(err.to_string(), "extraction api error status=403: denied");
    }

    #[tokio::test]
    async fn unconfigured_extractor_always_fails() {
        let err = UnconfiguredExtractor.extract("hello").await.unwrap_err();
        assert_eq!(err, ExtractionError::NotConfigured);
    }
}
