//! vLLM provider - OpenAI-compatible chat completion client
//!
//! `types` holds the wire structures, `client` the HTTP client with the
//! text / native-tool-call extractors.

pub mod client;
pub mod types;

pub use client::VllmClient;
pub use types::*;
