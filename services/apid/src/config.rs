use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_METRICS_BIND: &str = "0.0.0.0:9090";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_PG_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_PG_ACQUIRE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_JWT_ISSUER: &str = "apid";
pub const DEFAULT_JWT_AUDIENCE: &str = "apid-api";
pub const DEFAULT_JWT_LEEWAY_SECS: u64 = 30;

// API service configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    pub storage: StorageBackend,
    pub postgres: Option<PostgresConfig>,
    pub request_timeout_ms: u64,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl StorageBackend {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" => Ok(Self::Postgres),
            other => bail!("unknown storage backend {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostgresConfig {
    pub url: String,
    #[serde(default = "default_pg_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_pg_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

fn default_pg_max_connections() -> u32 {
    DEFAULT_PG_MAX_CONNECTIONS
}

fn default_pg_acquire_timeout_ms() -> u64 {
    DEFAULT_PG_ACQUIRE_TIMEOUT_MS
}

/// Bearer token settings. The secret is never printed.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub audience: String,
    pub leeway_secs: u64,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("leeway_secs", &self.leeway_secs)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    storage: Option<StorageBackend>,
    postgres: Option<PostgresConfig>,
    request_timeout_ms: Option<u64>,
    jwt_secret: Option<String>,
    jwt_issuer: Option<String>,
    jwt_audience: Option<String>,
    jwt_leeway_secs: Option<u64>,
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(value) => value.parse().with_context(|| format!("parse {key}")),
        Err(_) => Ok(default),
    }
}

impl ApiConfig {
    /// Read the environment. The JWT secret may still be empty here; it is
    /// enforced once overrides have been applied.
    fn from_env_unchecked() -> Result<Self> {
        let bind_addr = std::env::var("APID_BIND")
            .unwrap_or_else(|_| DEFAULT_BIND.to_string())
            .parse()
            .with_context(|| "parse APID_BIND")?;
        let metrics_bind = std::env::var("APID_METRICS_BIND")
            .unwrap_or_else(|_| DEFAULT_METRICS_BIND.to_string())
            .parse()
            .with_context(|| "parse APID_METRICS_BIND")?;
        let storage = match std::env::var("APID_STORAGE") {
            Ok(value) => StorageBackend::parse(&value).with_context(|| "parse APID_STORAGE")?,
            Err(_) => StorageBackend::Memory,
        };
        let postgres = match std::env::var("APID_POSTGRES_URL") {
            Ok(url) => Some(PostgresConfig {
                url,
                max_connections: env_parse(
                    "APID_POSTGRES_MAX_CONNECTIONS",
                    DEFAULT_PG_MAX_CONNECTIONS,
                )?,
                acquire_timeout_ms: DEFAULT_PG_ACQUIRE_TIMEOUT_MS,
            }),
            Err(_) => None,
        };
        let request_timeout_ms = env_parse("APID_REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS)?;
        let auth = AuthConfig {
            jwt_secret: std::env::var("APID_JWT_SECRET").unwrap_or_default(),
            issuer: std::env::var("APID_JWT_ISSUER")
                .unwrap_or_else(|_| DEFAULT_JWT_ISSUER.to_string()),
            audience: std::env::var("APID_JWT_AUDIENCE")
                .unwrap_or_else(|_| DEFAULT_JWT_AUDIENCE.to_string()),
            leeway_secs: env_parse("APID_JWT_LEEWAY_SECS", DEFAULT_JWT_LEEWAY_SECS)?,
        };
        Ok(Self {
            bind_addr,
            metrics_bind,
            storage,
            postgres,
            request_timeout_ms,
            auth,
        })
    }

    pub fn from_env() -> Result<Self> {
        let config = Self::from_env_unchecked()?;
        config.ensure_valid()?;
        Ok(config)
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env_unchecked()?;
        if let Ok(path) = std::env::var("APID_CONFIG") {
            let contents =
                fs::read_to_string(&path).with_context(|| format!("read APID_CONFIG: {path}"))?;
            config.apply_overrides(&contents)?;
        }
        config.ensure_valid()?;
        Ok(config)
    }

    /// Apply a YAML override document on top of the current values.
    pub fn apply_overrides(&mut self, yaml: &str) -> Result<()> {
        let override_cfg: ApiConfigOverride =
            serde_yaml::from_str(yaml).with_context(|| "parse apid config yaml")?;
        if let Some(value) = override_cfg.bind_addr {
            self.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = override_cfg.metrics_bind {
            self.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
        }
        if let Some(value) = override_cfg.storage {
            self.storage = value;
        }
        if let Some(value) = override_cfg.postgres {
            self.postgres = Some(value);
        }
        if let Some(value) = override_cfg.request_timeout_ms {
            self.request_timeout_ms = value;
        }
        if let Some(value) = override_cfg.jwt_secret {
            self.auth.jwt_secret = value;
        }
        if let Some(value) = override_cfg.jwt_issuer {
            self.auth.issuer = value;
        }
        if let Some(value) = override_cfg.jwt_audience {
            self.auth.audience = value;
        }
        if let Some(value) = override_cfg.jwt_leeway_secs {
            self.auth.leeway_secs = value;
        }
        Ok(())
    }

    fn ensure_valid(&self) -> Result<()> {
        if self.auth.jwt_secret.is_empty() {
            bail!("APID_JWT_SECRET must be set");
        }
        if self.request_timeout_ms == 0 {
            bail!("request_timeout_ms must be greater than zero");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.request_timeout_ms)
    }
}
