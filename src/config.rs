use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:8087".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Lifetime of issued access tokens, in hours.
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_hours: default_token_ttl_hours(),
        }
    }
}

fn default_token_ttl_hours() -> u64 {
    72
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root directory for uploaded files (avatars, knowledge documents).
    pub root: PathBuf,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    1000
}
fn default_overlap_chars() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Number of knowledge chunks injected into a prompt.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Cosine-similarity floor below which chunks are discarded.
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,
    /// Character budget for the retrieved-knowledge prompt block.
    #[serde(default = "default_max_knowledge_chars")]
    pub max_knowledge_chars: usize,
    /// How many stored messages of a chat are replayed to the vendor.
    #[serde(default = "default_max_history_messages")]
    pub max_history_messages: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_similarity: default_min_similarity(),
            max_knowledge_chars: default_max_knowledge_chars(),
            max_history_messages: default_max_history_messages(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_min_similarity() -> f32 {
    0.3
}
fn default_max_knowledge_chars() -> usize {
    8000
}
fn default_max_history_messages() -> usize {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"disabled"` or `"openai"`. The OpenAI key is read from
    /// the `OPENAI_API_KEY` environment variable.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            batch_size: 32,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_max_retries() -> u32 {
    5
}
fn default_embed_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    /// `"disabled"` or `"groq"`. The Groq key is read from
    /// the `GROQ_API_KEY` environment variable.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_completion_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Used when an agent does not set its own temperature.
    #[serde(default = "default_temperature")]
    pub default_temperature: f64,
    #[serde(default = "default_completion_retries")]
    pub max_retries: u32,
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            base_url: default_completion_base_url(),
            max_tokens: default_max_tokens(),
            default_temperature: default_temperature(),
            max_retries: default_completion_retries(),
            timeout_secs: default_completion_timeout_secs(),
        }
    }
}

impl CompletionConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_completion_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_temperature() -> f64 {
    0.7
}
fn default_completion_retries() -> u32 {
    2
}
fn default_completion_timeout_secs() -> u64 {
    60
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.max_chars {
        anyhow::bail!("chunking.overlap_chars must be < chunking.max_chars");
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if !(-1.0..=1.0).contains(&config.retrieval.min_similarity) {
        anyhow::bail!("retrieval.min_similarity must be in [-1.0, 1.0]");
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }
    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    // Validate completion
    if config.completion.is_enabled() && config.completion.model.is_none() {
        anyhow::bail!(
            "completion.model must be specified when provider is '{}'",
            config.completion.provider
        );
    }
    match config.completion.provider.as_str() {
        "disabled" | "groq" => {}
        other => anyhow::bail!(
            "Unknown completion provider: '{}'. Must be disabled or groq.",
            other
        ),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &std::path::Path, body: &str) -> PathBuf {
        let path = dir.join("copymode.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    fn minimal_body() -> String {
        r#"
[db]
path = "/tmp/copymode-test.sqlite"

[server]
bind = "127.0.0.1:0"

[storage]
root = "/tmp/copymode-test-uploads"
"#
        .to_string()
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_config(tmp.path(), &minimal_body());
        let cfg = load_config(&path).unwrap();

        assert_eq!(cfg.chunking.max_chars, 1000);
        assert_eq!(cfg.chunking.overlap_chars, 200);
        assert_eq!(cfg.retrieval.top_k, 5);
        assert!((cfg.retrieval.min_similarity - 0.3).abs() < 1e-6);
        assert_eq!(cfg.embedding.provider, "disabled");
        assert_eq!(cfg.completion.provider, "disabled");
        assert_eq!(cfg.completion.base_url, "https://api.groq.com/openai/v1");
        assert_eq!(cfg.auth.token_ttl_hours, 72);
    }

    #[test]
    fn overlap_must_stay_below_max_chars() {
        let tmp = tempfile::tempdir().unwrap();
        let body = format!("{}\n[chunking]\nmax_chars = 100\noverlap_chars = 100\n", minimal_body());
        let path = write_config(tmp.path(), &body);
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("overlap_chars"));
    }

    #[test]
    fn enabled_embedding_requires_model_and_dims() {
        let tmp = tempfile::tempdir().unwrap();
        let body = format!("{}\n[embedding]\nprovider = \"openai\"\n", minimal_body());
        let path = write_config(tmp.path(), &body);
        assert!(load_config(&path).is_err());

        let body = format!(
            "{}\n[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\ndims = 1536\n",
            minimal_body()
        );
        let path = write_config(tmp.path(), &body);
        assert!(load_config(&path).is_ok());
    }

    #[test]
    fn unknown_providers_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let body = format!(
            "{}\n[embedding]\nprovider = \"cohere\"\nmodel = \"m\"\ndims = 4\n",
            minimal_body()
        );
        let path = write_config(tmp.path(), &body);
        assert!(load_config(&path).is_err());

        let body = format!(
            "{}\n[completion]\nprovider = \"anthropic\"\nmodel = \"m\"\n",
            minimal_body()
        );
        let path = write_config(tmp.path(), &body);
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn enabled_completion_requires_model() {
        let tmp = tempfile::tempdir().unwrap();
        let body = format!("{}\n[completion]\nprovider = \"groq\"\n", minimal_body());
        let path = write_config(tmp.path(), &body);
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("completion.model"));
    }
}
