//! Intent Classification
//!
//! Turns a raw user message into an [`IntentAnalysis`]: keywords, detected
//! domains and a confidence score, optionally boosted by similar requests
//! found in historical memory.

mod classifier;
mod types;

pub use classifier::{IntentClassifier, DEFAULT_HISTORY_LIMIT};
pub use types::{IntentAnalysis, IntentContext};
