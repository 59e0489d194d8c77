use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub server: ServerConfig,
    pub webhook: WebhookConfig,
    pub debounce: DebounceConfig,
    pub ratelimit: RateLimitConfig,
    pub ingestion: IngestionConfig,
    pub scheduler: SchedulerConfig,
    pub retrieval: RetrievalConfig,
    pub orchestrator: OrchestratorConfig,
    pub admin: AdminConfig,
    pub providers: ProvidersConfig,
}

impl Config {
    /// Loads configuration from environment variables, layered over defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(
                config::Environment::with_prefix("AUTOWA")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;

        config.validate().map_err(|e| {
            config::ConfigError::Message(format!("configuration validation failed: {e}"))
        })?;

        Ok(config)
    }

    /// Rejects secrets that are too short or match a known-weak placeholder.
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        let secrets: [(&str, &SecretString); 6] = [
            ("AUTOWA__WEBHOOK__PROVIDER_AUTH_TOKEN", &self.webhook.provider_auth_token),
            ("AUTOWA__ADMIN__ADMIN_TOKEN", &self.admin.admin_token),
            ("AUTOWA__ADMIN__METRICS_KEY", &self.admin.metrics_key),
            ("AUTOWA__ADMIN__ENCRYPTION_KEY", &self.admin.encryption_key),
            ("AUTOWA__PROVIDERS__LLM_API_KEY", &self.providers.llm_api_key),
            ("AUTOWA__PROVIDERS__EMBEDDING_API_KEY", &self.providers.embedding_api_key),
        ];

        let weak_patterns = ["change-this", "secret", "password", "123456", "example"];

        for (name, secret) in secrets {
            let exposed = secret.expose_secret();
            if exposed.len() < 32 {
                return Err(format!(
                    "{name} must be at least 32 characters (got {} chars)",
                    exposed.len()
                )
                .into());
            }
            for pattern in weak_patterns {
                if exposed.to_lowercase().contains(pattern) {
                    return Err(format!(
                        "{name} contains weak pattern '{pattern}'; use a cryptographically random secret"
                    )
                    .into());
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub user: String,
    #[serde(skip_serializing)]
    pub password: SecretString,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub min_connections: u32,
    pub max_connections: u32,
    pub statement_timeout_seconds: u64,
}

impl DatabaseConfig {
    pub fn connection_string(&self) -> SecretString {
        SecretString::from(format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user,
            self.password.expose_secret(),
            self.host,
            self.port,
            self.database
        ))
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            user: "postgres".to_string(),
            password: "postgres".to_string().into(),
            host: "localhost".to_string(),
            port: 5432,
            database: "autowa".to_string(),
            min_connections: 2,
            max_connections: 20,
            statement_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allow_origins: String,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_allow_origins: "*".to_string(),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Clone, Deserialize, Serialize)]
pub struct WebhookConfig {
    /// Shared secret used to verify `X-Provider-Signature` (§4.8).
    #[serde(skip_serializing)]
    pub provider_auth_token: SecretString,
    /// Whether the unsigned JSON webhook variant is accepted at all (§4.8).
    pub allow_json_variant: bool,
    pub max_payload_bytes: usize,
}

impl fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("provider_auth_token", &"<REDACTED>")
            .field("allow_json_variant", &self.allow_json_variant)
            .field("max_payload_bytes", &self.max_payload_bytes)
            .finish()
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            provider_auth_token: SecretString::from(String::new()),
            allow_json_variant: false,
            max_payload_bytes: 256 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DebounceConfig {
    pub window_ms: u64,
    pub max_buffer: usize,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            window_ms: 700,
            max_buffer: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Per-contact messages/minute; per-workspace is `10 * per_contact_per_min`.
    pub per_contact_per_min: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_contact_per_min: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    pub max_upload_bytes: usize,
    pub max_concurrent: usize,
    pub process_timeout_seconds: u64,
    pub max_attempts: u32,
    pub purge_window_days: i64,
    pub ocr_enabled: bool,
    pub ocr_min_text_threshold: usize,
    pub ocr_timeout_seconds: u64,
    pub chunk_window_size: usize,
    pub chunk_overlap: usize,
    pub embedding_dimension: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
            max_concurrent: 5,
            process_timeout_seconds: 60,
            max_attempts: 5,
            purge_window_days: 30,
            ocr_enabled: true,
            ocr_min_text_threshold: 400,
            ocr_timeout_seconds: 120,
            chunk_window_size: 800,
            chunk_overlap: 150,
            embedding_dimension: 1536,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    pub poll_interval_seconds: u64,
    pub max_concurrency_extract: usize,
    pub max_concurrency_chunk: usize,
    pub max_concurrency_embed: usize,
    pub priority_extract: i32,
    pub priority_chunk: i32,
    pub priority_embed: i32,
    pub embedding_concurrency: usize,
    pub embedding_cb_fails: u32,
    pub embedding_cb_window_seconds: u64,
    pub embedding_cb_cooldown_seconds: u64,
    pub backoff_base_seconds: f64,
    pub backoff_factor: f64,
    pub backoff_jitter_seconds: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 5,
            max_concurrency_extract: 1,
            max_concurrency_chunk: 2,
            max_concurrency_embed: 2,
            priority_extract: 100,
            priority_chunk: 60,
            priority_embed: 20,
            embedding_concurrency: 4,
            embedding_cb_fails: 5,
            embedding_cb_window_seconds: 60,
            embedding_cb_cooldown_seconds: 45,
            backoff_base_seconds: 5.0,
            backoff_factor: 3.0,
            backoff_jitter_seconds: 10.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    pub rrf_k: u32,
    pub topn_bm25: usize,
    pub topn_vector: usize,
    pub max_query_len: usize,
    pub max_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            rrf_k: 60,
            topn_bm25: 20,
            topn_vector: 20,
            max_query_len: 1024,
            max_top_k: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrchestratorConfig {
    /// Minimum per-conversation inter-call spacing (§4.7).
    pub rate_guard_base_ms: u64,
    pub rate_guard_jitter_ms: u64,
    pub retrieve_top_k: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            rate_guard_base_ms: 400,
            rate_guard_jitter_ms: 30,
            retrieve_top_k: 8,
        }
    }
}

#[derive(Clone, Deserialize, Serialize)]
pub struct AdminConfig {
    #[serde(skip_serializing)]
    pub admin_token: SecretString,
    #[serde(skip_serializing)]
    pub metrics_key: SecretString,
    pub metrics_gated: bool,
    #[serde(skip_serializing)]
    pub encryption_key: SecretString,
}

impl fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminConfig")
            .field("admin_token", &"<REDACTED>")
            .field("metrics_key", &"<REDACTED>")
            .field("metrics_gated", &self.metrics_gated)
            .field("encryption_key", &"<REDACTED>")
            .finish()
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            admin_token: SecretString::from(String::new()),
            metrics_key: SecretString::from(String::new()),
            metrics_gated: false,
            encryption_key: SecretString::from(String::new()),
        }
    }
}

/// Endpoints and credentials for the external LLM, embedding, WhatsApp, OCR,
/// and calendar backends (all out-of-scope collaborators per the component
/// design; this only holds how to reach them).
#[derive(Clone, Deserialize, Serialize)]
pub struct ProvidersConfig {
    pub llm_base_url: String,
    #[serde(skip_serializing)]
    pub llm_api_key: SecretString,
    pub llm_model: String,
    pub embedding_base_url: String,
    #[serde(skip_serializing)]
    pub embedding_api_key: SecretString,
    pub embedding_model: String,
    /// Twilio account SID; the matching auth token is `webhook.provider_auth_token`,
    /// since Twilio signs inbound webhooks with the same credential it authenticates
    /// outbound sends with.
    pub whatsapp_account_sid: String,
    pub ocr_binary: String,
    pub http_timeout_seconds: u64,
}

impl fmt::Debug for ProvidersConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvidersConfig")
            .field("llm_base_url", &self.llm_base_url)
            .field("llm_api_key", &"<REDACTED>")
            .field("llm_model", &self.llm_model)
            .field("embedding_base_url", &self.embedding_base_url)
            .field("embedding_api_key", &"<REDACTED>")
            .field("embedding_model", &self.embedding_model)
            .field("whatsapp_account_sid", &self.whatsapp_account_sid)
            .field("ocr_binary", &self.ocr_binary)
            .field("http_timeout_seconds", &self.http_timeout_seconds)
            .finish()
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            llm_base_url: "https://api.openai.com/v1".to_string(),
            llm_api_key: SecretString::from(String::new()),
            llm_model: "gpt-4o-mini".to_string(),
            embedding_base_url: "https://api.openai.com/v1".to_string(),
            embedding_api_key: SecretString::from(String::new()),
            embedding_model: "text-embedding-3-small".to_string(),
            whatsapp_account_sid: String::new(),
            ocr_binary: "tesseract".to_string(),
            http_timeout_seconds: 30,
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string_pretty(&self) {
            Ok(json) => write!(f, "{json}"),
            Err(_) => write!(f, "error serializing config"),
        }
    }
}
