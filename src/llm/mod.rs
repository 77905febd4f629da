pub mod mock;
pub mod ollama;
pub mod openai;
pub mod provider;
pub mod types;

pub use provider::{provider_from_config, CompletionProvider};
pub use types::{ChatMessage, Completion};
