//! The engine facade and its construction from [`Config`].

use std::sync::Arc;
use std::time::Duration;

use quarry_core::{Config, ConfigError, GenerationResult, Metadata, RetrievedPassage};
use quarry_index::{Collection, InMemoryIndex, IndexError, MismatchPolicy, QdrantIndex, VectorIndex};
use quarry_ingest::chunker::{ChunkingPolicy, HeuristicEstimator, TokenEstimator};
use quarry_ingest::embedding::{Embedder, EmbeddingError, OllamaEmbedder, OpenAiEmbedder};
use quarry_ingest::{IngestConfig, IngestError, IngestReport, Ingestor};
use quarry_llm::{create_provider, LlmError, LlmProvider};
use thiserror::Error;
use tracing::info;

use crate::generator::{GenerateError, Generator, GeneratorConfig};
use crate::retriever::{RetrieveError, Retriever};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build embedding client: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("failed to build completion client: {0}")]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Retrieve(#[from] RetrieveError),

    #[error(transparent)]
    Generate(#[from] GenerateError),
}

/// Tunables for the pipeline stages, usually derived from [`Config`].
#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    pub ingest: IngestConfig,
    pub generator: GeneratorConfig,
}

impl EngineSettings {
    /// `embedding_model` is the model actually used for embeddings; its known
    /// token ceiling overrides the configured chunk size.
    pub fn from_config(config: &Config, embedding_model: &str) -> Self {
        Self {
            ingest: IngestConfig {
                policy: ChunkingPolicy::new(
                    config.chunking.max_tokens,
                    config.chunking.overlap_tokens,
                )
                .with_model(embedding_model),
                token_ceiling: config.embedding.token_ceiling,
                concurrency: config.embedding.concurrency,
            },
            generator: GeneratorConfig {
                top_k: config.retrieval.top_k,
                max_context_tokens: config.retrieval.max_context_tokens,
                max_tokens: config.llm.max_tokens,
            },
        }
    }
}

/// Ingest, retrieve and generate against one collection.
///
/// `Send + Sync` with no per-request mutable state; share it behind an `Arc`.
pub struct Engine {
    collection: Arc<Collection>,
    ingestor: Ingestor,
    retriever: Arc<Retriever>,
    generator: Generator,
}

impl Engine {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        collection: Arc<Collection>,
        llm: Arc<dyn LlmProvider>,
        settings: EngineSettings,
    ) -> Self {
        // Packing and the ingestion size guard share one estimator.
        let estimator: Arc<dyn TokenEstimator> = Arc::new(HeuristicEstimator);
        let ingestor = Ingestor::new(
            embedder.clone(),
            collection.clone(),
            estimator.clone(),
            settings.ingest,
        );
        let retriever = Arc::new(Retriever::new(embedder, collection.clone()));
        let generator = Generator::new(retriever.clone(), llm, estimator, settings.generator);
        Self {
            collection,
            ingestor,
            retriever,
            generator,
        }
    }

    /// Build every client from configuration. No network call is made until
    /// the first operation.
    pub fn from_config(config: &Config) -> Result<Self, EngineError> {
        let (embedder, embedding_model) = build_embedder(config)?;
        let index = build_index(config)?;
        let policy: MismatchPolicy = config
            .vector
            .on_dimension_mismatch
            .parse()
            .map_err(|reason| ConfigError::Invalid {
                key: "VECTOR_ON_DIMENSION_MISMATCH".into(),
                reason,
            })?;
        let collection = Arc::new(
            Collection::new(index, config.vector.collection.clone(), config.embedding.dimensions)
                .with_mismatch_policy(policy),
        );
        let llm: Arc<dyn LlmProvider> = Arc::from(create_provider(&config.llm, &config.ollama)?);

        info!(
            collection = %config.vector.collection,
            dimensions = config.embedding.dimensions,
            embedding_model = %embedding_model,
            on_mismatch = %policy,
            "engine ready"
        );
        let settings = EngineSettings::from_config(config, &embedding_model);
        Ok(Self::new(embedder, collection, llm, settings))
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub async fn ingest(
        &self,
        document_id: &str,
        content: &str,
        metadata: Metadata,
    ) -> Result<IngestReport, EngineError> {
        Ok(self.ingestor.ingest(document_id, content, metadata).await?)
    }

    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedPassage>, EngineError> {
        Ok(self.retriever.retrieve(query, k).await?)
    }

    pub async fn generate(&self, query: &str) -> Result<GenerationResult, EngineError> {
        Ok(self.generator.generate(query).await?)
    }

    /// Remove every chunk indexed under `document_id`.
    pub async fn delete_document(&self, document_id: &str) -> Result<(), EngineError> {
        self.collection.delete_document(document_id).await?;
        info!(document_id, collection = self.collection.name(), "document deleted");
        Ok(())
    }
}

/// Build the embedding client and report the model it embeds with.
fn build_embedder(config: &Config) -> Result<(Arc<dyn Embedder>, String), EngineError> {
    let timeout = Duration::from_secs(config.embedding.timeout_secs);
    match config.embedding.provider.as_str() {
        "openai" => {
            let api_key = config
                .llm
                .openai_api_key
                .clone()
                .ok_or_else(|| ConfigError::Missing("OPENAI_API_KEY (embedding)".into()))?;
            let model = config.embedding.model.clone();
            let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::new(
                api_key,
                model.clone(),
                config.llm.openai_base_url.clone(),
                config.embedding.dimensions,
                timeout,
            )?);
            Ok((embedder, model))
        }
        "ollama" => {
            let model = config.ollama.embedding_model.clone();
            let embedder: Arc<dyn Embedder> = Arc::new(OllamaEmbedder::new(
                config.ollama.url.clone(),
                model.clone(),
                config.embedding.dimensions,
                timeout,
            )?);
            Ok((embedder, model))
        }
        other => Err(ConfigError::UnknownProvider {
            kind: "embedding",
            name: other.to_string(),
        }
        .into()),
    }
}

fn build_index(config: &Config) -> Result<Arc<dyn VectorIndex>, EngineError> {
    match config.vector.provider.as_str() {
        "qdrant" => Ok(Arc::new(QdrantIndex::new(
            config.vector.url.clone(),
            config.vector.api_key.clone(),
            Duration::from_secs(config.vector.timeout_secs),
        )?)),
        "memory" => Ok(Arc::new(InMemoryIndex::new())),
        other => Err(ConfigError::UnknownProvider {
            kind: "vector",
            name: other.to_string(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::config::{
        ChunkingConfig, EmbeddingConfig, LlmConfig, OllamaConfig, RetrievalConfig, VectorConfig,
    };

    fn config() -> Config {
        Config {
            profile: String::new(),
            embedding: EmbeddingConfig {
                provider: "ollama".into(),
                model: "text-embedding-ada-002".into(),
                dimensions: 768,
                token_ceiling: 8000,
                concurrency: 2,
                timeout_secs: 5,
            },
            llm: LlmConfig {
                provider: "ollama".into(),
                openai_api_key: None,
                openai_model: "gpt-4o".into(),
                openai_base_url: None,
                max_tokens: 512,
                timeout_secs: 5,
            },
            ollama: OllamaConfig {
                url: "http://localhost:11434".into(),
                model: "llama3.2".into(),
                embedding_model: "e5-base-v2".into(),
            },
            vector: VectorConfig {
                provider: "memory".into(),
                url: "http://localhost:6333".into(),
                api_key: None,
                collection: "documents".into(),
                on_dimension_mismatch: "fail".into(),
                timeout_secs: 5,
            },
            chunking: ChunkingConfig {
                max_tokens: 1000,
                overlap_tokens: 100,
            },
            retrieval: RetrievalConfig {
                top_k: 3,
                max_context_tokens: 2000,
            },
        }
    }

    #[test]
    fn builds_from_offline_config() {
        let engine = Engine::from_config(&config()).unwrap();
        assert_eq!(engine.collection().name(), "documents");
        assert_eq!(engine.collection().dimensions(), 768);
    }

    #[test]
    fn settings_follow_the_embedding_model() {
        let settings = EngineSettings::from_config(&config(), "e5-base-v2");
        assert_eq!(settings.ingest.policy.effective_max_tokens(), 512);
        assert_eq!(settings.ingest.concurrency, 2);
        assert_eq!(settings.generator.top_k, 3);
        assert_eq!(settings.generator.max_tokens, 512);
    }

    #[test]
    fn unknown_vector_provider_is_a_config_error() {
        let mut config = config();
        config.vector.provider = "pinecone".into();
        let err = Engine::from_config(&config).err().unwrap();
        assert!(matches!(
            err,
            EngineError::Config(ConfigError::UnknownProvider { kind: "vector", .. })
        ));
    }

    #[test]
    fn bad_mismatch_policy_is_a_config_error() {
        let mut config = config();
        config.vector.on_dimension_mismatch = "ignore".into();
        let err = Engine::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("VECTOR_ON_DIMENSION_MISMATCH"));
    }

    #[test]
    fn openai_embeddings_need_a_key() {
        let mut config = config();
        config.embedding.provider = "openai".into();
        let err = Engine::from_config(&config).err().unwrap();
        assert!(matches!(err, EngineError::Config(ConfigError::Missing(_))));
    }
}
