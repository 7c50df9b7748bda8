use std::env;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub ollama: OllamaConfig,
    pub vector: VectorConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
}

/// Well-known env keys that identify a profile when prefixed.
const PROFILE_MARKER_KEYS: &[&str] = &["OPENAI_API_KEY", "QDRANT_URL", "OLLAMA_URL"];

/// Collection names become a URL path segment, so reserved characters are refused.
fn collection_name_problem(name: &str) -> Option<String> {
    if name.is_empty() {
        return Some("must not be empty".into());
    }
    name.chars()
        .find(|c| matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_whitespace() || c.is_control())
        .map(|c| format!("{name:?} contains reserved character {c:?}"))
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `QUARRY_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("QUARRY_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            embedding: EmbeddingConfig::from_env_profiled(p),
            llm: LlmConfig::from_env_profiled(p),
            ollama: OllamaConfig::from_env_profiled(p),
            vector: VectorConfig::from_env_profiled(p),
            chunking: ChunkingConfig::from_env_profiled(p),
            retrieval: RetrievalConfig::from_env_profiled(p),
        }
    }

    /// Discover available profiles by scanning env vars for `{PREFIX}_{MARKER_KEY}` patterns.
    /// Always includes "default" (the unprefixed config).
    pub fn available_profiles() -> Vec<String> {
        let mut profiles = std::collections::BTreeSet::new();
        profiles.insert("default".to_string());

        for (key, _) in env::vars() {
            for marker in PROFILE_MARKER_KEYS {
                if let Some(prefix) = key.strip_suffix(&format!("_{}", marker)) {
                    if !prefix.is_empty()
                        && prefix.chars().all(|c| c.is_ascii_uppercase() || c == '_')
                    {
                        profiles.insert(prefix.to_string());
                    }
                }
            }
        }

        profiles.into_iter().collect()
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Check cross-field constraints that would otherwise surface as
    /// confusing provider errors on the first request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding.dimensions == 0 {
            return Err(ConfigError::Invalid {
                key: "EMBEDDING_DIMENSIONS".into(),
                reason: "must be positive".into(),
            });
        }
        if self.embedding.concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "EMBEDDING_CONCURRENCY".into(),
                reason: "must be positive".into(),
            });
        }
        if self.chunking.max_tokens == 0 {
            return Err(ConfigError::Invalid {
                key: "CHUNK_MAX_TOKENS".into(),
                reason: "must be positive".into(),
            });
        }
        if self.chunking.overlap_tokens > self.chunking.max_tokens {
            return Err(ConfigError::Invalid {
                key: "CHUNK_OVERLAP_TOKENS".into(),
                reason: format!(
                    "{} exceeds CHUNK_MAX_TOKENS ({})",
                    self.chunking.overlap_tokens, self.chunking.max_tokens
                ),
            });
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::Invalid {
                key: "RETRIEVAL_TOP_K".into(),
                reason: "must be positive".into(),
            });
        }
        if let Some(reason) = collection_name_problem(&self.vector.collection) {
            return Err(ConfigError::Invalid {
                key: "QDRANT_COLLECTION".into(),
                reason,
            });
        }

        match self.embedding.provider.as_str() {
            "openai" if self.llm.openai_api_key.is_none() => {
                return Err(ConfigError::Missing("OPENAI_API_KEY (embedding)".into()));
            }
            "openai" | "ollama" => {}
            other => {
                return Err(ConfigError::UnknownProvider {
                    kind: "embedding",
                    name: other.to_string(),
                })
            }
        }
        if !self.llm.is_configured() {
            return match self.llm.provider.as_str() {
                "openai" => Err(ConfigError::Missing("OPENAI_API_KEY (llm)".into())),
                other => Err(ConfigError::UnknownProvider {
                    kind: "llm",
                    name: other.to_string(),
                }),
            };
        }
        match self.vector.provider.as_str() {
            "qdrant" | "memory" => {}
            other => {
                return Err(ConfigError::UnknownProvider {
                    kind: "vector",
                    name: other.to_string(),
                })
            }
        }
        Ok(())
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  embedding:   provider={}, model={}, dims={}",
            self.embedding.provider,
            self.embedding.model,
            self.embedding.dimensions
        );
        tracing::info!("  llm:         provider={}", self.llm.provider);
        tracing::info!("  ollama:      url={}", self.ollama.url);
        tracing::info!(
            "  vector:      provider={}, url={}, collection={}",
            self.vector.provider,
            self.vector.url,
            self.vector.collection
        );
        tracing::info!(
            "  chunking:    max_tokens={}, overlap={}",
            self.chunking.max_tokens,
            self.chunking.overlap_tokens
        );
    }

    /// Return a redacted view safe for display (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "embedding": {
                "provider": self.embedding.provider,
                "model": self.embedding.model,
                "dimensions": self.embedding.dimensions,
                "token_ceiling": self.embedding.token_ceiling,
                "concurrency": self.embedding.concurrency,
            },
            "llm": {
                "provider": self.llm.provider,
                "model": self.llm.openai_model,
                "configured": self.llm.is_configured(),
            },
            "ollama": { "url": self.ollama.url, "model": self.ollama.model },
            "vector": {
                "provider": self.vector.provider,
                "url": self.vector.url,
                "collection": self.vector.collection,
                "on_dimension_mismatch": self.vector.on_dimension_mismatch,
                "api_key_set": self.vector.api_key.is_some(),
            },
            "chunking": {
                "max_tokens": self.chunking.max_tokens,
                "overlap_tokens": self.chunking.overlap_tokens,
            },
            "retrieval": {
                "top_k": self.retrieval.top_k,
                "max_context_tokens": self.retrieval.max_context_tokens,
            },
        })
    }
}

// ── Embedding ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "openai", "ollama"
    pub provider: String,
    /// Model name sent to the provider. Also selects the chunking ceiling.
    pub model: String,
    pub dimensions: usize,
    /// Hard ceiling (estimated tokens) above which a chunk is not sent for embedding.
    pub token_ceiling: usize,
    /// Chunks embedded and upserted in parallel per document.
    pub concurrency: usize,
    pub timeout_secs: u64,
}

impl EmbeddingConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            provider: profiled_env_or(p, "EMBEDDING_PROVIDER", "openai"),
            model: profiled_env_or(p, "EMBEDDING_MODEL", "text-embedding-ada-002"),
            dimensions: profiled_env_usize(p, "EMBEDDING_DIMENSIONS", 1536),
            token_ceiling: profiled_env_usize(p, "EMBEDDING_TOKEN_CEILING", 8000),
            concurrency: profiled_env_usize(p, "EMBEDDING_CONCURRENCY", 4),
            timeout_secs: profiled_env_u64(p, "EMBEDDING_TIMEOUT_SECS", 60),
        }
    }
}

// ── LLM (OpenAI) ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "openai", "ollama"
    pub provider: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: Option<String>,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl LlmConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            provider: profiled_env_or(p, "LLM_PROVIDER", "openai"),
            openai_api_key: profiled_env_opt(p, "OPENAI_API_KEY"),
            openai_model: profiled_env_or(p, "OPENAI_MODEL", "gpt-4o"),
            openai_base_url: profiled_env_opt(p, "OPENAI_BASE_URL"),
            max_tokens: profiled_env_u32(p, "LLM_MAX_TOKENS", 1024),
            timeout_secs: profiled_env_u64(p, "LLM_TIMEOUT_SECS", 120),
        }
    }

    pub fn is_configured(&self) -> bool {
        match self.provider.as_str() {
            "openai" => self.openai_api_key.is_some(),
            "ollama" => true,
            _ => false,
        }
    }
}

// ── Ollama (local models) ─────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub url: String,
    pub model: String,
    pub embedding_model: String,
}

impl OllamaConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            url: profiled_env_or(p, "OLLAMA_URL", "http://localhost:11434"),
            model: profiled_env_or(p, "OLLAMA_MODEL", "llama3.2"),
            embedding_model: profiled_env_or(p, "OLLAMA_EMBEDDING_MODEL", "nomic-embed-text"),
        }
    }
}

// ── Vector index (Qdrant) ─────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    /// "qdrant", "memory"
    pub provider: String,
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
    /// "recreate" drops and recreates a collection whose dimension is wrong,
    /// "fail" refuses to start.
    pub on_dimension_mismatch: String,
    pub timeout_secs: u64,
}

impl VectorConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            provider: profiled_env_or(p, "VECTOR_PROVIDER", "qdrant"),
            url: profiled_env_or(p, "QDRANT_URL", "http://localhost:6333"),
            api_key: profiled_env_opt(p, "QDRANT_API_KEY"),
            collection: profiled_env_or(p, "QDRANT_COLLECTION", "documents"),
            on_dimension_mismatch: profiled_env_or(p, "VECTOR_ON_DIMENSION_MISMATCH", "recreate")
                .to_lowercase(),
            timeout_secs: profiled_env_u64(p, "QDRANT_TIMEOUT_SECS", 30),
        }
    }
}

// ── Chunking ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
}

impl ChunkingConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            max_tokens: profiled_env_usize(p, "CHUNK_MAX_TOKENS", 1000),
            overlap_tokens: profiled_env_usize(p, "CHUNK_OVERLAP_TOKENS", 100),
        }
    }
}

// ── Retrieval / generation ────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// Estimated-token budget for passages rendered into the prompt.
    pub max_context_tokens: usize,
}

impl RetrievalConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            top_k: profiled_env_usize(p, "RETRIEVAL_TOP_K", 5),
            max_context_tokens: profiled_env_usize(p, "CONTEXT_MAX_TOKENS", 6000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own profile prefix so parallel tests never observe
    // each other's variables.

    #[test]
    fn profile_prefixed_keys_win() {
        env::set_var("QTESTA_QDRANT_COLLECTION", "handbook");
        env::set_var("QTESTA_CHUNK_MAX_TOKENS", "512");
        let config = Config::for_profile("qtesta");

        assert_eq!(config.profile, "QTESTA");
        assert_eq!(config.vector.collection, "handbook");
        assert_eq!(config.chunking.max_tokens, 512);
        assert_eq!(config.profile_label(), "QTESTA");
    }

    #[test]
    fn unparsable_numbers_fall_back_to_defaults() {
        env::set_var("QTESTB_RETRIEVAL_TOP_K", "many");
        let config = Config::for_profile("qtestb");
        assert_eq!(config.retrieval.top_k, 5);
    }

    #[test]
    fn validate_rejects_overlap_above_max() {
        env::set_var("QTESTC_CHUNK_MAX_TOKENS", "100");
        env::set_var("QTESTC_CHUNK_OVERLAP_TOKENS", "200");
        let config = Config::for_profile("qtestc");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("CHUNK_OVERLAP_TOKENS"));
    }

    #[test]
    fn validate_accepts_local_setup() {
        env::set_var("QTESTD_EMBEDDING_PROVIDER", "ollama");
        env::set_var("QTESTD_LLM_PROVIDER", "ollama");
        env::set_var("QTESTD_VECTOR_PROVIDER", "memory");
        let config = Config::for_profile("qtestd");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unknown_vector_provider() {
        env::set_var("QTESTE_EMBEDDING_PROVIDER", "ollama");
        env::set_var("QTESTE_LLM_PROVIDER", "ollama");
        env::set_var("QTESTE_VECTOR_PROVIDER", "pinecone");
        let config = Config::for_profile("qteste");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownProvider { kind: "vector", .. })
        ));
    }

    #[test]
    fn validate_rejects_collection_names_that_break_urls() {
        env::set_var("QTESTG_EMBEDDING_PROVIDER", "ollama");
        env::set_var("QTESTG_LLM_PROVIDER", "ollama");
        env::set_var("QTESTG_VECTOR_PROVIDER", "memory");
        for bad in ["docs/v2", "docs?x=1", "my docs", ""] {
            let mut config = Config::for_profile("qtestg");
            config.vector.collection = bad.into();
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("QDRANT_COLLECTION"), "{bad:?}");
        }
        let mut config = Config::for_profile("qtestg");
        config.vector.collection = "docs_v2-en.1".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn profiles_are_discovered_from_marker_keys() {
        env::set_var("QTESTH_QDRANT_URL", "http://qdrant.internal:6333");
        let profiles = Config::available_profiles();
        assert!(profiles.contains(&"default".to_string()));
        assert!(profiles.contains(&"QTESTH".to_string()));
    }

    #[test]
    fn redacted_summary_hides_keys() {
        env::set_var("QTESTF_QDRANT_API_KEY", "secret-key");
        let config = Config::for_profile("qtestf");
        let summary = config.redacted_summary().to_string();
        assert!(!summary.contains("secret-key"));
        assert!(summary.contains("\"api_key_set\":true"));
    }
}
