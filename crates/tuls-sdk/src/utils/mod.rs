//! SDK Utilities
//!
//! Common utilities for the SDK.

mod text;

pub use text::{detect_follow_ups, extract_keywords, split_steps, tokenize, FollowUp};
