//! porch-extract
//!
//! Extraction gateway: turns a driver's free-form speech into a structured
//! `{company_name, delivery_info}` pair by asking an external model.
//!
//! This crate never touches the delivery session; the daemon wires the two
//! side by side.

pub mod gateway;
pub mod gemini;

pub use gateway::{
    build_prompt, parse_extraction, DeliveryExtractor, ExtractedDelivery, ExtractionError,
    UnconfiguredExtractor, UNKNOWN,
};
pub use gemini::GeminiExtractor;
