use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub services: ServicesConfig,
    pub signer: SignerConfig,
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Local storage locations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Directory holding per-case workspaces and archives
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: PathBuf,
    /// SQLite database with the case-file queue
    #[serde(default = "default_database")]
    pub database: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            downloads_dir: default_downloads_dir(),
            database: default_database(),
        }
    }
}

fn default_downloads_dir() -> PathBuf {
    PathBuf::from("data/downloads")
}

fn default_database() -> PathBuf {
    PathBuf::from("data/dossier.db")
}

/// Fetch pipeline tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Document fetch failures tolerated per run before the run aborts
    #[serde(default = "default_max_errors")]
    pub max_errors: usize,
    /// Simultaneous document fetches within one case file
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_errors: default_max_errors(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
        }
    }
}

fn default_max_errors() -> usize {
    10
}

fn default_max_concurrent_fetches() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Remote document services (token exchange, listing, content)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServicesConfig {
    /// Token endpoint, called with basic auth
    pub token_url: String,
    pub token_user: String,
    pub token_password: String,
    /// SOAP endpoint answering `consultarExpedienteDetallado`
    pub listing_url: String,
    /// SOAP endpoint answering `buscarPDFPorNumero`
    pub content_url: String,
    #[serde(default = "default_listing_namespace")]
    pub listing_namespace: String,
    #[serde(default = "default_content_namespace")]
    pub content_namespace: String,
    /// Request timeout in seconds (default: 120)
    #[serde(default = "default_services_timeout")]
    pub timeout_secs: u64,
}

fn default_listing_namespace() -> String {
    "http://ar.gob.gba.gdeba.ee.expediente.services/".to_string()
}

fn default_content_namespace() -> String {
    "http://ar.gob.gba.gdeba.gedo.services/".to_string()
}

fn default_services_timeout() -> u64 {
    120
}

/// Signer lookup database (Oracle)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignerConfig {
    pub host: String,
    #[serde(default = "default_oracle_port")]
    pub port: u16,
    pub service: String,
    pub user: String,
    pub password: String,
    /// Session pool size; 0 disables pooling and opens one connection per lookup
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl SignerConfig {
    /// Easy Connect string (`//host:port/service`).
    pub fn connect_string(&self) -> String {
        format!("//{}:{}/{}", self.host, self.port, self.service)
    }
}

fn default_oracle_port() -> u16 {
    1521
}

fn default_pool_size() -> u32 {
    10
}

/// Delivery endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeliveryConfig {
    pub backend: DeliveryBackend,
    /// SFTP configuration (required when backend = "sftp")
    #[serde(default)]
    pub sftp: Option<SftpConfig>,
    /// Local directory configuration (required when backend = "local")
    #[serde(default)]
    pub local: Option<LocalDeliveryConfig>,
}

/// Available delivery backends
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryBackend {
    Sftp,
    Local,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SftpConfig {
    pub host: String,
    #[serde(default = "default_sftp_port")]
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Remote directory archives are uploaded into
    pub remote_dir: String,
    /// Connect timeout in seconds (default: 30)
    #[serde(default = "default_sftp_timeout")]
    pub timeout_secs: u64,
}

fn default_sftp_port() -> u16 {
    22
}

fn default_sftp_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocalDeliveryConfig {
    pub dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log file appended to in addition to stderr
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default)]
    pub filter: Option<String>,
}

/// Metrics configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Prometheus text file written after each run
    #[serde(default)]
    pub textfile: Option<PathBuf>,
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub paths: PathsConfig,
    pub pipeline: PipelineConfig,
    pub services: SanitizedServicesConfig,
    pub signer: SanitizedSignerConfig,
    pub delivery: SanitizedDeliveryConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedServicesConfig {
    pub token_url: String,
    pub token_user: String,
    pub token_password_configured: bool,
    pub listing_url: String,
    pub content_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSignerConfig {
    pub connect_string: String,
    pub user: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDeliveryConfig {
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let target = match config.delivery.backend {
            DeliveryBackend::Sftp => config
                .delivery
                .sftp
                .as_ref()
                .map(|s| format!("sftp://{}@{}:{}{}", s.user, s.host, s.port, s.remote_dir)),
            DeliveryBackend::Local => config
                .delivery
                .local
                .as_ref()
                .map(|l| l.dir.display().to_string()),
        };

        Self {
            paths: config.paths.clone(),
            pipeline: config.pipeline.clone(),
            services: SanitizedServicesConfig {
                token_url: config.services.token_url.clone(),
                token_user: config.services.token_user.clone(),
                token_password_configured: !config.services.token_password.is_empty(),
                listing_url: config.services.listing_url.clone(),
                content_url: config.services.content_url.clone(),
                timeout_secs: config.services.timeout_secs,
            },
            signer: SanitizedSignerConfig {
                connect_string: config.signer.connect_string(),
                user: config.signer.user.clone(),
                pool_size: config.signer.pool_size,
            },
            delivery: SanitizedDeliveryConfig {
                backend: match config.delivery.backend {
                    DeliveryBackend::Sftp => "sftp".to_string(),
                    DeliveryBackend::Local => "local".to_string(),
                },
                target,
            },
        }
    }
}

#[cfg(test)]
pub(crate) const SAMPLE_CONFIG: &str = r#"
[services]
token_url = "https://iop.example.org/jwt"
token_user = "svc"
token_password = "hunter2"
listing_url = "https://iop.example.org/expedientes"
content_url = "https://iop.example.org/documentos"

[signer]
host = "oracle.example.org"
service = "GEDO"
user = "reader"
password = "secret"

[delivery]
backend = "sftp"

[delivery.sftp]
host = "sftp.example.org"
user = "uploader"
password = "pw"
remote_dir = "/incoming"
"#;
