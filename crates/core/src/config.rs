//! Configuration management for Sift.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config files (.sift/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric, with all state stored in `.sift/`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Embedding providers that `sift-knowledge` can construct.
pub const KNOWN_EMBEDDING_PROVIDERS: [&str; 2] = ["trigram", "ollama"];

/// Main application configuration.
///
/// This struct holds all global configuration options that affect
/// CLI behavior across commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .sift/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit logs as JSON lines
    pub log_json: bool,

    /// Retrieval defaults and limits
    pub retrieval: RetrievalSettings,

    /// Embedding provider settings
    pub embedding: EmbeddingSettings,
}

/// Retrieval defaults and hard limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Initial similarity threshold of a new session (0-1)
    pub default_similarity_threshold: f32,

    /// Initial number of results requested by a new session
    pub default_match_count: usize,

    /// Ceiling applied to every requested result count
    pub max_match_count: usize,

    /// Weight of lexical matching in hybrid search (0-1)
    pub text_weight: f32,

    /// Upper bound on one search's backend phase, in seconds
    pub search_timeout_secs: u64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            default_similarity_threshold: 0.5,
            default_match_count: 10,
            max_match_count: 50,
            text_weight: 0.3,
            search_timeout_secs: 30,
        }
    }
}

impl RetrievalSettings {
    /// Hybrid text weight clamped into [0, 1].
    pub fn clamped_text_weight(&self) -> f32 {
        if self.text_weight.is_nan() {
            return Self::default().text_weight;
        }
        self.text_weight.clamp(0.0, 1.0)
    }
}

/// Embedding provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Provider name: "trigram" or "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Provider endpoint (HTTP providers only)
    pub endpoint: Option<String>,

    /// Number of texts embedded per request while loading
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            endpoint: None,
            batch_size: 32,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    retrieval: Option<RetrievalSettings>,
    embedding: Option<EmbeddingSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
            log_json: false,
            retrieval: RetrievalSettings::default(),
            embedding: EmbeddingSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML config file and
    /// environment variables.
    ///
    /// Environment variables:
    /// - `SIFT_WORKSPACE`: Override workspace path
    /// - `SIFT_CONFIG`: Path to config file
    /// - `SIFT_EMBEDDING_PROVIDER`: Embedding provider
    /// - `SIFT_EMBEDDING_MODEL`: Embedding model identifier
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use sift_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`AppConfig::load`], with an explicit workspace and config file
    /// taking precedence over `SIFT_WORKSPACE` and `SIFT_CONFIG`.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        let workspace =
            workspace.or_else(|| std::env::var("SIFT_WORKSPACE").ok().map(PathBuf::from));
        if let Some(workspace) = workspace {
            config.workspace = workspace;
        }

        let config_file =
            config_file.or_else(|| std::env::var("SIFT_CONFIG").ok().map(PathBuf::from));
        if let Some(config_file) = config_file {
            config.config_file = Some(config_file);
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.sift_dir().join("config.yaml"));

        if config_path.exists() {
            config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("SIFT_EMBEDDING_PROVIDER") {
            config.embedding.provider = provider;
        }

        if let Ok(model) = std::env::var("SIFT_EMBEDDING_MODEL") {
            config.embedding.model = model;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&mut self, path: &Path) -> AppResult<()> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    fn merge_yaml_str(&mut self, contents: &str) -> AppResult<()> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            self.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                self.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                self.no_color = !color;
            }
            if let Some(json) = logging.json {
                self.log_json = json;
            }
        }

        if let Some(retrieval) = config_file.retrieval {
            self.retrieval = retrieval;
        }

        if let Some(embedding) = config_file.embedding {
            self.embedding = embedding;
        }

        Ok(())
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
        log_json: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        if log_json {
            self.log_json = true;
        }

        self
    }

    /// Get the path to the .sift directory.
    pub fn sift_dir(&self) -> PathBuf {
        self.workspace.join(".sift")
    }

    /// Ensure the .sift directory exists.
    pub fn ensure_sift_dir(&self) -> AppResult<()> {
        let sift_dir = self.sift_dir();
        if !sift_dir.exists() {
            std::fs::create_dir_all(&sift_dir).map_err(|e| {
                AppError::Config(format!("Failed to create .sift directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.embedding.provider.as_str();
        if !KNOWN_EMBEDDING_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                provider,
                KNOWN_EMBEDDING_PROVIDERS.join(", ")
            )));
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "embedding.dimensions must be greater than zero".to_string(),
            ));
        }

        if self.retrieval.max_match_count == 0 {
            return Err(AppError::Config(
                "retrieval.max_match_count must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.embedding.provider, "trigram");
        assert_eq!(config.retrieval.default_similarity_threshold, 0.5);
        assert_eq!(config.retrieval.default_match_count, 10);
        assert!(!config.verbose);
        assert!(!config.no_color);
    }

    #[test]
    fn test_sift_dir() {
        let config = AppConfig::default();
        assert!(config.sift_dir().ends_with(".sift"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden =
            config.with_overrides(Some(PathBuf::from("/tmp/ws")), None, true, false, true);

        assert_eq!(overridden.workspace, PathBuf::from("/tmp/ws"));
        assert!(overridden.verbose);
        assert!(overridden.log_json);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml_sections() {
        let mut config = AppConfig::default();
        let yaml = r#"
logging:
  level: warn
  color: false
retrieval:
  default_similarity_threshold: 0.7
  max_match_count: 20
embedding:
  provider: ollama
  model: nomic-embed-text
  dimensions: 768
"#;
        config.merge_yaml_str(yaml).unwrap();

        assert_eq!(config.log_level.as_deref(), Some("warn"));
        assert!(config.no_color);
        assert_eq!(config.retrieval.default_similarity_threshold, 0.7);
        assert_eq!(config.retrieval.max_match_count, 20);
        // Unspecified fields keep their defaults
        assert_eq!(config.retrieval.default_match_count, 10);
        assert_eq!(config.embedding.provider, "ollama");
        assert_eq!(config.embedding.dimensions, 768);
        assert_eq!(config.embedding.batch_size, 32);
    }

    #[test]
    fn test_merge_yaml_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "retrieval:\n  text_weight: 0.5\n").unwrap();

        let mut config = AppConfig::default();
        config.merge_yaml(&path).unwrap();
        assert_eq!(config.retrieval.text_weight, 0.5);
    }

    #[test]
    fn test_clamped_text_weight() {
        let mut settings = RetrievalSettings::default();
        settings.text_weight = 1.8;
        assert_eq!(settings.clamped_text_weight(), 1.0);
        settings.text_weight = -0.2;
        assert_eq!(settings.clamped_text_weight(), 0.0);
        settings.text_weight = f32::NAN;
        assert_eq!(settings.clamped_text_weight(), 0.3);
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.embedding.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_ceiling() {
        let mut config = AppConfig::default();
        config.retrieval.max_match_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_defaults() {
        assert!(AppConfig::default().validate().is_ok());
    }
}
