//! LLM module - language model integration
//!
//! The agent loop talks to [`ModelClient`]; Gemini is the production backend.

pub mod gemini;
pub mod traits;

pub use gemini::GeminiClient;
pub use traits::{Decision, ModelClient};
