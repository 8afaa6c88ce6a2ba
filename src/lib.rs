//! chat-relay: forwards chat messages to a hosted LLM completion API.
//!
//! A single `POST /chat` call becomes exactly one upstream request to the
//! configured vendor (DeepSeek, OpenAI, Anthropic or Gemini); the reply text
//! comes back as `{ "reply": ... }`. Failures map to one error taxonomy,
//! [`error::RelayError`], and every upstream call is bounded by a deadline.

pub mod config;
pub mod error;
pub mod metrics;
pub mod provider;
pub mod relay;
pub mod server;
