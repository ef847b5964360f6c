//! Generation backend capability for codeless.
//!
//! A [`LanguageModel`] turns an ordered sequence of role-tagged [`Message`]s
//! into one reply message. [`OpenAiLanguageModel`] implements it over any
//! OpenAI-compatible Chat Completions endpoint.

mod openai;
mod types;

use std::future::Future;

use codeless_shared::Result;

pub use openai::{OpenAiLanguageModel, OpenAiSettings};
pub use types::{Message, MessageRole};

/// Something that can answer a conversation with a single message.
///
/// Failures surface as [`codeless_shared::CodelessError::GenerationBackend`];
/// implementations never retry internally.
pub trait LanguageModel: Send + Sync {
    fn prompt(&self, messages: &[Message]) -> impl Future<Output = Result<Message>> + Send;
}
