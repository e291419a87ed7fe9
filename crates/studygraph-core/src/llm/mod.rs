//! LLM integration
//!
//! This module provides:
//! - The [`GenerativeService`] trait every pipeline stage depends on
//! - An OpenAI-compatible HTTP client implementing it
//! - Helpers for pulling JSON out of model output

mod client;
pub mod json;
mod service;
mod types;

pub use client::LlmClient;
pub use json::{extract_json_from_response, first_str_field, parse_json_response};
pub use service::{GenerativeService, ResponseFormat};
pub use types::{ChatRequest, ChatResponse, Completion, Message, Role};
