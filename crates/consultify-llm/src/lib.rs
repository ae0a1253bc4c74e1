//! `consultify-llm`: async clients for the chat and search providers
//! Consultify talks to.
//!
//! Every chat provider is driven through the same [`ChatRequest`] /
//! [`ChatResponse`] pair. When no provider can answer, callers use
//! [`fallback_response`], which returns deterministic canned guidance in
//! [`ResponseMode::Fallback`].
//!
//! ```rust,ignore
//! use consultify_llm::{ChatMessage, ChatRequest, LlmClient, Provider};
//!
//! let client = LlmClient::new(Provider::OpenAi, api_key);
//! let reply = client
//!     .complete(&ChatRequest::new("gpt-4o-mini", vec![ChatMessage::user("Hi")]))
//!     .await?;
//! println!("{}", reply.text);
//! ```

mod client;
mod error;
mod fallback;
mod search;
mod types;

pub use client::LlmClient;
pub use error::{LlmError, Result};
pub use fallback::{fallback_response, FALLBACK_MODEL, FALLBACK_PROVIDER};
pub use search::{SearchResponse, SearchResult, TavilyClient};
pub use types::{
    ChatMessage, ChatRequest, ChatResponse, MessageRole, Provider, ResponseMode, TokenUsage,
};
