use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    pub test_before_acquire: bool,
}

/// Endpoint and credentials for one third-party API
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl ProviderConfig {
    fn from_env(url_var: &str, key_var: &str) -> Self {
        Self {
            base_url: non_empty_var(url_var).map(|u| u.trim_end_matches('/').to_string()),
            api_key: non_empty_var(key_var),
        }
    }

    /// A provider without a base URL always answers with mock data
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }
}

/// Third-party integration configuration
#[derive(Debug, Clone)]
pub struct IntegrationsConfig {
    pub esign: ProviderConfig,
    pub geocoding: ProviderConfig,
    pub comps: ProviderConfig,
    pub notify_webhook_url: Option<String>,
    pub timeout_secs: u64,
}

impl IntegrationsConfig {
    pub fn from_env() -> Result<Self, String> {
        let timeout_secs = env::var("INTEGRATION_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(10);

        if timeout_secs == 0 {
            return Err("INTEGRATION_TIMEOUT_SECS must be greater than 0".to_string());
        }

        Ok(Self {
            esign: ProviderConfig::from_env("ESIGN_API_URL", "ESIGN_API_KEY"),
            geocoding: ProviderConfig::from_env("GEOCODING_API_URL", "GEOCODING_API_KEY"),
            comps: ProviderConfig::from_env("COMPS_API_URL", "COMPS_API_KEY"),
            notify_webhook_url: non_empty_var("NOTIFY_WEBHOOK_URL"),
            timeout_secs,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for IntegrationsConfig {
    fn default() -> Self {
        Self {
            esign: ProviderConfig::default(),
            geocoding: ProviderConfig::default(),
            comps: ProviderConfig::default(),
            notify_webhook_url: None,
            timeout_secs: 10,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub integrations: IntegrationsConfig,
    pub log_level: String,
    pub log_format: LogFormat,
    pub http_port: u16,
    pub ws_port: Option<u16>,
    pub environment: String,
    pub storage_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub audit_log_dir: Option<PathBuf>,
    pub bootstrap_admin_email: Option<String>,
}

impl DatabaseConfig {
    /// Create database config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL environment variable is required")?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(10);

        let acquire_timeout_secs = env::var("DATABASE_ACQUIRE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);

        let idle_timeout_secs = env::var("DATABASE_IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(600); // 10 minutes

        let max_lifetime_secs = env::var("DATABASE_MAX_LIFETIME_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(1800); // 30 minutes

        let test_before_acquire = env::var("DATABASE_TEST_BEFORE_ACQUIRE")
            .ok()
            .and_then(|s| s.parse::<bool>().ok())
            .unwrap_or(true);

        if max_connections == 0 {
            return Err("DATABASE_MAX_CONNECTIONS must be greater than 0".to_string());
        }

        if acquire_timeout_secs == 0 {
            return Err("DATABASE_ACQUIRE_TIMEOUT_SECS must be greater than 0".to_string());
        }

        Ok(Self {
            url,
            max_connections,
            acquire_timeout_secs,
            idle_timeout_secs,
            max_lifetime_secs,
            test_before_acquire,
        })
    }

    /// Get acquire timeout as Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Get idle timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Get max lifetime as Duration
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/dealflow".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
            test_before_acquire: true,
        }
    }
}

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let database = DatabaseConfig::from_env()?;
        let integrations = IntegrationsConfig::from_env()?;

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_format = match env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "pretty".to_string())
            .to_lowercase()
            .as_str()
        {
            "pretty" => LogFormat::Pretty,
            "json" => LogFormat::Json,
            other => {
                return Err(format!(
                    "Invalid LOG_FORMAT: {}. Must be one of: [\"pretty\", \"json\"]",
                    other
                ))
            }
        };

        let http_port = match env::var("HTTP_PORT") {
            Ok(s) => s
                .parse::<u16>()
                .map_err(|_| format!("Invalid HTTP_PORT: {}", s))?,
            Err(_) => 8080,
        };

        let ws_port = env::var("WS_PORT").ok().and_then(|s| s.parse::<u16>().ok());

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let storage_dir =
            PathBuf::from(env::var("STORAGE_DIR").unwrap_or_else(|_| "./storage".to_string()));

        let max_upload_bytes = env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(20 * 1024 * 1024);

        let audit_log_dir = non_empty_var("AUDIT_LOG_DIR").map(PathBuf::from);
        let bootstrap_admin_email = non_empty_var("BOOTSTRAP_ADMIN_EMAIL");

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                log_level, valid_log_levels
            ));
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&environment.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid ENVIRONMENT: {}. Must be one of: {:?}",
                environment, valid_environments
            ));
        }

        if max_upload_bytes == 0 {
            return Err("MAX_UPLOAD_BYTES must be greater than 0".to_string());
        }

        if ws_port.is_some() && ws_port == Some(http_port) {
            return Err("WS_PORT must differ from HTTP_PORT".to_string());
        }

        Ok(Self {
            database,
            integrations,
            log_level: log_level.to_lowercase(),
            log_format,
            http_port,
            ws_port,
            environment: environment.to_lowercase(),
            storage_dir,
            max_upload_bytes,
            audit_log_dir,
            bootstrap_admin_email,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Check if running in development
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Get database URL (convenience method)
    pub fn database_url(&self) -> &str {
        &self.database.url
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            integrations: IntegrationsConfig::default(),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            http_port: 8080,
            ws_port: None,
            environment: "development".to_string(),
            storage_dir: PathBuf::from("./storage"),
            max_upload_bytes: 20 * 1024 * 1024,
            audit_log_dir: None,
            bootstrap_admin_email: None,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
