//! Upstream services used by the search pipeline.

pub mod markdown;
pub mod openai_client;
pub mod search_client;

pub use markdown::MarkdownRenderer;
pub use openai_client::{LlmClient, OpenAiClient};
pub use search_client::{ExpertSearch, GoogleSearchClient};
