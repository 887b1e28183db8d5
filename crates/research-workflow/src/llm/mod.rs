//! LLM provider abstraction
//!
//! [`LLMProvider`] is the seam between the generators and a concrete model
//! API. [`OpenAIProvider`] bridges to rig-core's OpenAI client.

mod config;
mod message;
mod openai;
mod provider;

pub use config::LLMConfig;
pub use message::{extract_system_preamble, ChatMessage, Role};
pub use openai::OpenAIProvider;
pub use provider::{LLMProvider, LLMResponse};
