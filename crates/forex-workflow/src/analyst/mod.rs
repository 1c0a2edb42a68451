//! Analysis providers
//!
//! [`LlmAnalyst`] answers every provider contract by prompting a language
//! model for strict JSON. [`RuleBasedAnalyst`] is a deterministic offline
//! stand-in used when no model is configured.

mod json;
pub mod llm;
pub mod rules;

pub use json::{decode, extract_json};
pub use llm::LlmAnalyst;
pub use rules::RuleBasedAnalyst;
