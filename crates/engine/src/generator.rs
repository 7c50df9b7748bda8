//! Grounded answer generation: retrieve, rank, budget the context, prompt.

use std::sync::Arc;

use quarry_core::{GenerationResult, RetrievedPassage};
use quarry_ingest::chunker::TokenEstimator;
use quarry_llm::{LlmError, LlmProvider, Message};
use thiserror::Error;
use tracing::{debug, info};

use crate::retriever::{RetrieveError, Retriever};

/// Sampling temperature for grounded answers.
pub const TEMPERATURE: f32 = 0.3;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that provides accurate and concise \
responses based on the given context. If the context does not contain relevant information, \
please say so.";

const CLOSING_INSTRUCTION: &str = "Please provide a response based on the context information \
above. If the context doesn't contain relevant information, please say so.";

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Retrieve(#[from] RetrieveError),

    #[error("completion failed: {0}")]
    Completion(LlmError),

    #[error("completion provider returned an empty answer")]
    EmptyCompletion,
}

impl From<LlmError> for GenerateError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::EmptyResponse => GenerateError::EmptyCompletion,
            other => GenerateError::Completion(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub top_k: usize,
    /// Estimated-token budget for passage text rendered into the prompt.
    pub max_context_tokens: usize,
    /// Completion length cap passed to the provider.
    pub max_tokens: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_context_tokens: 6000,
            max_tokens: 1024,
        }
    }
}

pub struct Generator {
    retriever: Arc<Retriever>,
    llm: Arc<dyn LlmProvider>,
    estimator: Arc<dyn TokenEstimator>,
    config: GeneratorConfig,
}

impl Generator {
    pub fn new(
        retriever: Arc<Retriever>,
        llm: Arc<dyn LlmProvider>,
        estimator: Arc<dyn TokenEstimator>,
        config: GeneratorConfig,
    ) -> Self {
        Self {
            retriever,
            llm,
            estimator,
            config,
        }
    }

    /// Answer `query` from the indexed passages. The returned context is
    /// exactly what was rendered into the prompt.
    pub async fn generate(&self, query: &str) -> Result<GenerationResult, GenerateError> {
        let passages = self.retriever.retrieve(query, self.config.top_k).await?;
        let retrieved = passages.len();
        let context = select_context(
            passages,
            self.config.max_context_tokens,
            self.estimator.as_ref(),
        );
        debug!(retrieved, admitted = context.len(), "context assembled");

        let messages = build_messages(query, &context);
        let response = self
            .llm
            .complete(messages, TEMPERATURE, self.config.max_tokens)
            .await?;
        if response.trim().is_empty() {
            return Err(GenerateError::EmptyCompletion);
        }

        info!(passages = context.len(), chars = response.len(), "answer generated");
        Ok(GenerationResult { response, context })
    }
}

/// Rank by similarity (stable, best first) and admit passages while their
/// running estimated token total stays within `budget`. The first passage
/// that does not fit ends admission.
pub fn select_context(
    mut passages: Vec<RetrievedPassage>,
    budget: usize,
    estimator: &dyn TokenEstimator,
) -> Vec<RetrievedPassage> {
    passages.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

    let mut used = 0;
    let mut admitted = Vec::with_capacity(passages.len());
    for passage in passages {
        let tokens = estimator.estimate(&passage.content);
        if used + tokens > budget {
            break;
        }
        used += tokens;
        admitted.push(passage);
    }
    admitted
}

/// The user prompt: a context section (possibly empty), the query, and the
/// grounding reminder.
pub fn render_prompt(query: &str, context: &[RetrievedPassage]) -> String {
    let documents = context
        .iter()
        .enumerate()
        .map(|(i, p)| {
            format!(
                "Document {} (Relevance: {:.1}%):\n{}",
                i + 1,
                p.similarity * 100.0,
                p.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Context information:\n{documents}\n\nUser query: {query}\n\n{CLOSING_INSTRUCTION}"
    )
}

pub fn build_messages(query: &str, context: &[RetrievedPassage]) -> Vec<Message> {
    vec![
        Message::system(SYSTEM_PROMPT),
        Message::user(render_prompt(query, context)),
    ]
}
