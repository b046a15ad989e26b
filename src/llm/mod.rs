//! LLM client abstraction layer
//!
//! A trait-based seam over the completion service so the advisory path can
//! run against OpenAI-compatible endpoints, the `genai` providers, or a mock.

mod client;
mod error;
mod genai;
mod mock;
mod openai_compatible;
mod selector;
mod types;

pub use client::LLMClient;
pub use error::BackendError;
pub use self::genai::GenAIClient;
pub use mock::{MockLLMClient, MockResponse};
pub use openai_compatible::{OpenAICompatibleClient, OLLAMA_ENDPOINT, OPENAI_ENDPOINT};
pub use selector::{select_llm_client, SelectedClient};
pub use types::{ChatMessage, LLMRequest, LLMResponse, MessageRole};
