use serde::Deserialize;
use std::path::Path;

pub const CONFIG_FILE: &str = "eulix.toml";

/// Full configuration, read from `eulix.toml` at the project root. A missing
/// file yields the defaults; every section may be partially specified.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub project: ProjectConfig,
    pub parser: ParserConfig,
    pub embeddings: EmbeddingsConfig,
    pub llm: LlmConfig,
    pub cache: CacheConfig,
    pub checksum: ChecksumConfig,
    pub context: ContextSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub path: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self { path: ".".into() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub threads: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self { threads: 4 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    pub model: String,
    /// One of auto, cpu, cuda, rocm, tensorrt; consumed by the embedder
    /// binary, passed through untouched.
    pub backend: String,
    pub dimension: usize,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            model: "BAAI/bge-small-en-v1.5".into(),
            backend: "auto".into(),
            dimension: 384,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub local: bool,
    pub provider: String,
    pub model: String,
    pub api_key: String,
    pub max_tokens: usize,
    pub temperature: f64,
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            local: true,
            provider: "ollama".into(),
            model: "llama3.2:3b".into(),
            api_key: String::new(),
            max_tokens: 8192,
            temperature: 0.7,
            base_url: "http://localhost:11434".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub redis: RedisConfig,
    pub sql: SqlConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub enabled: bool,
    pub url: String,
    pub ttl_hours: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "redis://localhost:6379".into(),
            ttl_hours: 6,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SqlConfig {
    pub enabled: bool,
    pub driver: String,
    pub dsn: String,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            driver: "sqlite".into(),
            dsn: ".eulix/cache.db".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChecksumConfig {
    pub change_threshold: f64,
    pub force_reanalyze_threshold: f64,
}

impl Default for ChecksumConfig {
    fn default() -> Self {
        Self {
            change_threshold: 0.10,
            force_reanalyze_threshold: 0.30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContextSection {
    pub semantic_threshold: f32,
    pub hot_file_boost: f64,
}

impl Default for ContextSection {
    fn default() -> Self {
        Self {
            semantic_threshold: 0.5,
            hot_file_boost: 0.2,
        }
    }
}

impl Config {
    /// Load from `eulix.toml` in the working directory, falling back to
    /// defaults when absent. The API key falls back to `ANTHROPIC_API_KEY`.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str(&raw)?
        } else {
            Config::default()
        };

        if config.llm.api_key.is_empty() {
            if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
                config.llm.api_key = key;
            }
        }

        Ok(config)
    }
}
