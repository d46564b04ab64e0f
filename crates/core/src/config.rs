//! Configuration management for the professor review assistant.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config files (.profrag/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! Later sources win. Local state (SQLite stores, prompt overrides) lives in
//! the workspace's `.profrag/` directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Chat model providers the factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 3] = ["groq", "openai", "ollama"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .profrag/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Active chat model provider ("groq", "openai", "ollama")
    pub provider: String,

    /// Chat model identifier
    pub model: String,

    /// Explicit API key for the chat provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Log output format ("text" or "json")
    pub log_format: String,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Chat provider configurations
    pub llm: Option<LlmConfig>,

    /// Embedding provider settings
    pub embedding: EmbeddingSettings,

    /// Vector index store settings
    pub vector_store: VectorStoreSettings,

    /// Retrieval settings
    pub retrieval: RetrievalSettings,

    /// HTTP server settings
    pub server: ServerSettings,

    /// Bearer token to user id map for the HTTP surface
    pub auth: AuthSettings,

    /// Conversation store settings
    pub storage: StorageSettings,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    /// Any OpenAI-compatible chat completions API (OpenAI, Groq)
    OpenAiCompatible {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    /// Model configured for this provider.
    pub fn model(&self) -> &str {
        match self {
            Self::OpenAiCompatible { model, .. } => model,
            Self::Ollama { model, .. } => model,
        }
    }

    /// Endpoint override, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::OpenAiCompatible { endpoint, .. } => endpoint.as_deref(),
            Self::Ollama { endpoint, .. } => Some(endpoint.as_str()),
        }
    }
}

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingSettings {
    /// "gemini", "ollama" or "mock"
    pub provider: String,

    /// Provider model identifier
    pub model: String,

    /// Vector dimension; must match the index
    pub dimensions: usize,

    /// Environment variable holding the provider API key
    #[serde(rename = "apiKeyEnv", default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Endpoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "text-embedding-004".to_string(),
            dimensions: 768,
            api_key_env: Some("GEMINI_API_KEY".to_string()),
            endpoint: None,
        }
    }
}

/// Vector index store settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorStoreSettings {
    /// "sqlite" (local) or "pinecone"
    pub backend: String,

    /// Collection holding the review vectors
    #[serde(rename = "indexName")]
    pub index_name: String,

    /// Similarity metric used when creating the collection
    pub metric: String,

    /// SQLite database path (relative paths resolve against .profrag/)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Environment variable holding the Pinecone API key
    #[serde(rename = "apiKeyEnv", default = "default_pinecone_key_env")]
    pub api_key_env: String,

    /// Pinecone control plane URL
    #[serde(rename = "controllerUrl", default = "default_controller_url")]
    pub controller_url: String,

    /// Serverless cloud for index creation
    #[serde(default = "default_cloud")]
    pub cloud: String,

    /// Serverless region for index creation
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_pinecone_key_env() -> String {
    "PINECONE_API_KEY".to_string()
}

fn default_controller_url() -> String {
    "https://api.pinecone.io".to_string()
}

fn default_cloud() -> String {
    "aws".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            index_name: "professors".to_string(),
            metric: "cosine".to_string(),
            path: None,
            api_key_env: default_pinecone_key_env(),
            controller_url: default_controller_url(),
            cloud: default_cloud(),
            region: default_region(),
        }
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalSettings {
    /// Number of nearest reviews fetched per query
    #[serde(rename = "topK")]
    pub top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 10 }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSettings {
    /// Socket address to bind
    pub bind: String,

    /// Allowed CORS origins; empty allows any origin
    #[serde(rename = "allowedOrigins", default)]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            allowed_origins: Vec::new(),
        }
    }
}

/// Static bearer tokens accepted by the HTTP surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuthSettings {
    /// token -> user id
    #[serde(default)]
    pub tokens: HashMap<String, String>,
}

/// Conversation store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StorageSettings {
    /// SQLite database path (relative paths resolve against .profrag/)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    embedding: Option<EmbeddingSettings>,
    #[serde(rename = "vectorStore")]
    vector_store: Option<VectorStoreSettings>,
    retrieval: Option<RetrievalSettings>,
    server: Option<ServerSettings>,
    auth: Option<AuthSettings>,
    storage: Option<StorageSettings>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    format: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "groq".to_string(),
            model: "llama3-8b-8192".to_string(),
            api_key: None,
            log_level: None,
            log_format: "text".to_string(),
            verbose: false,
            no_color: false,
            llm: None,
            embedding: EmbeddingSettings::default(),
            vector_store: VectorStoreSettings::default(),
            retrieval: RetrievalSettings::default(),
            server: ServerSettings::default(),
            auth: AuthSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML file and environment variables.
    ///
    /// Environment variables:
    /// - `PROFRAG_WORKSPACE`: Override workspace path
    /// - `PROFRAG_CONFIG`: Path to config file
    /// - `PROFRAG_PROVIDER`: Chat model provider
    /// - `PROFRAG_MODEL`: Chat model identifier
    /// - `PROFRAG_API_KEY`: Chat provider API key
    /// - `PROFRAG_VECTOR_STORE`: Vector store backend
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use profrag_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`AppConfig::load`], with the workspace and config file chosen up
    /// front (CLI flags) so the right YAML file is read.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace {
            config.workspace = workspace;
        } else if let Ok(workspace) = std::env::var("PROFRAG_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Some(config_file) = config_file {
            config.config_file = Some(config_file);
        } else if let Ok(config_file) = std::env::var("PROFRAG_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.workspace.join(".profrag/config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("PROFRAG_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("PROFRAG_MODEL") {
            config.model = model;
        }

        if let Ok(backend) = std::env::var("PROFRAG_VECTOR_STORE") {
            config.vector_store.backend = backend;
        }

        config.api_key = std::env::var("PROFRAG_API_KEY").ok();
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    fn merge_yaml_str(&self, contents: &str) -> AppResult<Self> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;
        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(format) = logging.format {
                result.log_format = format;
            }
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
            }

            result.llm = Some(llm);
        }

        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }
        if let Some(vector_store) = config_file.vector_store {
            result.vector_store = vector_store;
        }
        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }
        if let Some(server) = config_file.server {
            result.server = server;
        }
        if let Some(auth) = config_file.auth {
            result.auth = auth;
        }
        if let Some(storage) = config_file.storage {
            result.storage = storage;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the YAML file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .profrag directory.
    pub fn state_dir(&self) -> PathBuf {
        self.workspace.join(".profrag")
    }

    /// Ensure the .profrag directory exists.
    pub fn ensure_state_dir(&self) -> AppResult<()> {
        let state_dir = self.state_dir();
        if !state_dir.exists() {
            std::fs::create_dir_all(&state_dir).map_err(|e| {
                AppError::Config(format!("Failed to create .profrag directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// SQLite path of the local vector store.
    pub fn vector_db_path(&self) -> PathBuf {
        self.resolve_state_path(self.vector_store.path.as_deref(), "vectors.sqlite")
    }

    /// SQLite path of the conversation store.
    pub fn conversation_db_path(&self) -> PathBuf {
        self.resolve_state_path(self.storage.path.as_deref(), "chats.sqlite")
    }

    fn resolve_state_path(&self, configured: Option<&Path>, default_name: &str) -> PathBuf {
        match configured {
            Some(path) if path.is_absolute() => path.to_path_buf(),
            Some(path) => self.state_dir().join(path),
            None => self.state_dir().join(default_name),
        }
    }

    /// Get the configuration for a chat provider.
    pub fn get_provider_config(&self, provider: &str) -> Option<ProviderConfig> {
        self.llm
            .as_ref()
            .and_then(|llm| llm.providers.get(provider).cloned())
    }

    /// Resolve the endpoint override for a chat provider.
    pub fn provider_endpoint(&self, provider: &str) -> Option<String> {
        self.get_provider_config(provider)
            .and_then(|pc| pc.endpoint().map(str::to_string))
    }

    /// Resolve the API key for a chat provider.
    ///
    /// Order: `PROFRAG_API_KEY`, the provider's `apiKeyEnv`, then the
    /// provider's conventional variable (`GROQ_API_KEY`, `OPENAI_API_KEY`).
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        if let Some(ProviderConfig::OpenAiCompatible { api_key_env, .. }) =
            self.get_provider_config(provider)
        {
            if let Ok(key) = std::env::var(&api_key_env) {
                return Some(key);
            }
        }

        let conventional = match provider {
            "groq" => "GROQ_API_KEY",
            "openai" => "OPENAI_API_KEY",
            _ => return None,
        };
        std::env::var(conventional).ok()
    }

    /// Resolve the embedding provider API key.
    pub fn resolve_embedding_key(&self) -> Option<String> {
        self.embedding
            .api_key_env
            .as_ref()
            .and_then(|env| std::env::var(env).ok())
    }

    /// Resolve the Pinecone API key.
    pub fn resolve_vector_store_key(&self) -> Option<String> {
        std::env::var(&self.vector_store.api_key_env).ok()
    }

    /// Validate configuration for the active provider and backends.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_PROVIDERS.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if !["sqlite", "pinecone"].contains(&self.vector_store.backend.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown vector store backend: {}. Supported: sqlite, pinecone",
                self.vector_store.backend
            )));
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be positive".to_string(),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(AppError::Config("retrieval.topK must be positive".to_string()));
        }

        Ok(())
    }
}
