//! Sibyl LLM - LLM Client Abstraction
//!
//! This crate provides the language-model integration for Sibyl:
//! - Client: the `LlmClient` trait every agent executor talks to
//! - Completion: request/response types including structured (JSON) output
//! - Http: OpenAI-compatible chat-completions client over reqwest
//!
//! The orchestration layer never sees raw transport errors; everything is
//! mapped into the [`Error`] taxonomy so retry and circuit-breaker logic can
//! classify failures uniformly.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod completion;
pub mod error;
pub mod http;

pub use client::LlmClient;
pub use completion::{CompletionRequest, CompletionResponse, TokenUsage};
pub use error::{Error, Result};
pub use http::{HttpLlmClient, HttpLlmConfig};
