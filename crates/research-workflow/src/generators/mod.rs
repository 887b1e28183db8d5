//! Implementations of the generation ports
//!
//! - [`MockResearchGenerator`]: deterministic, offline
//! - [`LlmResearchGenerator`]: prompts an [`LLMProvider`](crate::llm::LLMProvider)
//!
//! [`fallback`] holds the texts substituted when a generation call fails.

pub mod fallback;
mod llm;
mod mock;
mod prompts;

pub use fallback::{fallback_question, fallback_section, placeholder_analysts, FALLBACK_ANSWER};
pub use llm::{parse_analysts, LlmResearchGenerator};
pub use mock::MockResearchGenerator;
pub use prompts::ResearchPrompts;
