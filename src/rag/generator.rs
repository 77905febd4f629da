use std::sync::Arc;

use serde::Serialize;

use super::retriever::{ContextRetriever, RetrievedChunk};
use crate::core::errors::ApiError;
use crate::llm::types::clamp_temperature;
use crate::llm::{ChatMessage, CompletionProvider};

// Wording deliberately avoids the mock provider's topic keywords so an
// empty retrieval cannot steer it toward a canned topic answer.
const FALLBACK_SYSTEM_PROMPT: &str = "You are a helpful customer support assistant. No \
    knowledge base context is available for this question, so answer helpfully from \
    general knowledge and do not fabricate specifics.";

/// Reference back to a source chunk, returned alongside the answer.
#[derive(Debug, Clone, Serialize)]
pub struct Citation {
    pub document_id: String,
    pub filename: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedAnswer {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub tokens_used: u32,
}

/// RAG orchestrator: retrieves context for a bot, assembles the prompt,
/// dispatches to the configured provider and shapes the citations.
pub struct AnswerGenerator {
    retriever: ContextRetriever,
    provider: Arc<dyn CompletionProvider>,
}

impl AnswerGenerator {
    pub fn new(retriever: ContextRetriever, provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            retriever,
            provider,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Retrieval failures degrade to an empty context; provider failures
    /// propagate to the caller.
    pub async fn generate_answer(
        &self,
        bot_id: &str,
        query: &str,
        history: &[ChatMessage],
        temperature: f64,
        top_k: usize,
    ) -> Result<GeneratedAnswer, ApiError> {
        let chunks = self.retriever.retrieve(bot_id, query, top_k).await;
        tracing::debug!(
            "Retrieved {} chunk(s) for bot {} query",
            chunks.len(),
            bot_id
        );

        let messages = assemble_messages(&chunks, history, query);
        let completion = self
            .provider
            .complete(&messages, clamp_temperature(temperature))
            .await?;

        Ok(GeneratedAnswer {
            answer: completion.text,
            citations: citations_from_chunks(&chunks),
            tokens_used: completion.tokens_used,
        })
    }
}

/// Full message sequence for one turn: system instruction, then the
/// conversation history in original order, then the current query.
pub fn assemble_messages(
    chunks: &[RetrievedChunk],
    history: &[ChatMessage],
    query: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(build_system_prompt(chunks)));
    messages.extend(history.iter().cloned());
    messages.push(ChatMessage::user(query));
    messages
}

pub fn build_system_prompt(chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return FALLBACK_SYSTEM_PROMPT.to_string();
    }

    let context = chunks
        .iter()
        .map(|chunk| format!("From {}: {}", chunk.filename, chunk.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are a customer support assistant. Answer strictly using the context below. \
         If the context does not contain the answer, say so explicitly instead of \
         guessing.\n\nContext:\n{}",
        context
    )
}

/// One citation per retrieved chunk, preserving retrieval order.
pub fn citations_from_chunks(chunks: &[RetrievedChunk]) -> Vec<Citation> {
    chunks
        .iter()
        .map(|chunk| Citation {
            document_id: format!("doc_{}", chunk.document_index),
            filename: chunk.filename.clone(),
            score: chunk.score,
        })
        .collect()
}
