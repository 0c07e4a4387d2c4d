//! # Application Configuration
//!
//! Loaded once at startup from environment variables and never mutated
//! afterwards. Any error here is fatal: the binary exits before binding
//! the listener.
//!
//! Custom `Debug` implementations redact credentials.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use waypoint_store::SqlConfig;
use waypoint_telemetry::{LogConfig, LogFormat, SpanGranularity, TracingConfig};

use crate::auth::{ApiKeyValidator, Authenticator, SimpleBearerValidator};
use crate::registrar::ApiVersion;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

fn invalid(var: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        var,
        reason: reason.into(),
    }
}

/// Which credential validator guards protected routes.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthSettings {
    /// Bearer presence and format; membership too when `tokens` is non-empty.
    Simple { tokens: Vec<String> },
    /// `X-API-Key` with named principals.
    ApiKey { keys: Vec<(String, String)> },
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simple { tokens } => f
                .debug_struct("Simple")
                .field("tokens", &format_args!("[{} REDACTED]", tokens.len()))
                .finish(),
            Self::ApiKey { keys } => {
                let principals: Vec<&str> = keys.iter().map(|(p, _)| p.as_str()).collect();
                f.debug_struct("ApiKey")
                    .field("principals", &principals)
                    .finish()
            }
        }
    }
}

impl AuthSettings {
    pub fn authenticator(&self) -> Authenticator {
        match self {
            Self::Simple { tokens } => {
                Authenticator::new(SimpleBearerValidator::with_tokens(tokens.iter().cloned()))
            }
            Self::ApiKey { keys } => Authenticator::new(ApiKeyValidator::new(keys.iter().cloned())),
        }
    }
}

/// Process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_name: String,
    pub version: ApiVersion,
    pub host: String,
    pub port: u16,
    /// `None` selects the in-memory backend.
    pub database: Option<SqlConfig>,
    pub tracing: TracingConfig,
    pub log: LogConfig,
    pub auth: AuthSettings,
    pub metrics_enabled: bool,
    pub request_timeout: Duration,
    pub shutdown_grace: Duration,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let app_name = env.string("APP_NAME", "waypoint");
        let version = env
            .string("APP_VERSION", "v1.0.0")
            .parse::<ApiVersion>()
            .map_err(|e| invalid("APP_VERSION", e.to_string()))?;
        let host = env.string("APP_HOST", "0.0.0.0");
        let port = env.parse("APP_PORT", 8080u16)?;

        let database = match env.get("POSTGRES_HOST") {
            None => None,
            Some(db_host) => {
                let max_open_conns = env.parse("POSTGRES_MAX_OPEN_CONNS", 10u32)?;
                if max_open_conns == 0 {
                    return Err(invalid("POSTGRES_MAX_OPEN_CONNS", "must be at least 1"));
                }
                Some(SqlConfig {
                    host: db_host,
                    port: env.parse("POSTGRES_PORT", 5432u16)?,
                    database: env.required("POSTGRES_DATABASE")?,
                    username: env.required("POSTGRES_USERNAME")?,
                    password: env.get("POSTGRES_PASSWORD").unwrap_or_default(),
                    max_open_conns,
                    max_idle_conns: env.parse("POSTGRES_MAX_IDLE_CONNS", 2u32)?,
                    acquire_timeout: env.millis("POSTGRES_ACQUIRE_TIMEOUT_MS", 5_000)?,
                })
            }
        };

        let tracing = TracingConfig {
            service_name: app_name.clone(),
            exporter_host: env.string("OTLP_HOST", "localhost"),
            exporter_port: env.parse("OTLP_PORT", 4318u16)?,
            protocol: env.choice("OTLP_PROTOCOL", Default::default())?,
            export_enabled: env.flag("TRACING_ENABLED", true)?,
            granularity: env.choice("SPAN_GRANULARITY", SpanGranularity::Service)?,
            ..TracingConfig::default()
        };

        let log = LogConfig {
            format: env.choice("LOG_FORMAT", LogFormat::Pretty)?,
            ..LogConfig::default()
        };

        let tokens = env.list("AUTH_TOKENS");
        let auth = match env.string("AUTH_SCHEME", "simple").to_ascii_lowercase().as_str() {
            "simple" | "bearer" => AuthSettings::Simple { tokens },
            "api-key" | "apikey" => {
                if tokens.is_empty() {
                    return Err(ConfigError::Missing("AUTH_TOKENS"));
                }
                let keys = tokens
                    .into_iter()
                    .map(|pair| match pair.split_once(':') {
                        Some((principal, key)) if !principal.is_empty() && !key.is_empty() => {
                            Ok((principal.to_string(), key.to_string()))
                        }
                        _ => Err(invalid("AUTH_TOKENS", "api-key entries must be principal:key")),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                AuthSettings::ApiKey { keys }
            }
            other => {
                return Err(invalid(
                    "AUTH_SCHEME",
                    format!("unknown scheme '{other}' (expected simple or api-key)"),
                ))
            }
        };

        Ok(Self {
            app_name,
            version,
            host,
            port,
            database,
            tracing,
            log,
            auth,
            metrics_enabled: env.flag("METRICS_ENABLED", true)?,
            request_timeout: env.millis("REQUEST_TIMEOUT_MS", 30_000)?,
            shutdown_grace: env.millis("SHUTDOWN_GRACE_MS", 10_000)?,
        })
    }

    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Server URL published in the API description.
    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, var: &str) -> Option<String> {
        (self.0)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, var: &str, default: &str) -> String {
        self.get(var).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, var: &'static str) -> Result<String, ConfigError> {
        self.get(var).ok_or(ConfigError::Missing(var))
    }

    fn parse<T>(&self, var: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(var) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|e: T::Err| invalid(var, e.to_string())),
        }
    }

    fn choice<T>(&self, var: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr<Err = String>,
    {
        match self.get(var) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|e| invalid(var, e)),
        }
    }

    fn millis(&self, var: &'static str, default: u64) -> Result<Duration, ConfigError> {
        let ms = self.parse(var, default)?;
        if ms == 0 {
            return Err(invalid(var, "must be greater than zero"));
        }
        Ok(Duration::from_millis(ms))
    }

    fn flag(&self, var: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.get(var).map(|v| v.to_ascii_lowercase()) {
            None => Ok(default),
            Some(v) => match v.as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(invalid(var, format!("'{v}' is not a boolean"))),
            },
        }
    }

    fn list(&self, var: &str) -> Vec<String> {
        self.get(var)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}
