//! Configuration intake
//!
//! Connection settings and probe knobs are read from a [`ConfigProvider`]
//! (the process environment in production). Recognized variables:
//!
//! * `DB_HOST`, `DB_USER`, `DB_PASSWORD`, `DB_NAME` - required in strict mode
//! * `DB_SSL_KEY`, `DB_SSL_CERT`, `DB_SSL_CA` - TLS bundle, all or none
//! * `DB_SSL_MODE` - `required`, `verify-ca` (default) or `verify-identity`;
//!   without a bundle the session is plaintext
//! * `DB_PORT`, `DB_CONNECT_TIMEOUT` (seconds, at least 1)
//! * `DB_PROBE_STRICT`, `DB_PROBE_MAX_ATTEMPTS`, `DB_PROBE_BACKOFF_SECS`, `DB_PROBE_LABEL`
//!
//! Empty values are treated as unset. Whitespace is kept as given.

mod provider;

pub use provider::{ConfigProvider, EnvProvider, MapProvider, Overlay};

use crate::connection::{ConnectionConfig, TlsBundle, TlsMode};
use crate::retry::{RetryPolicy, DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS};
use crate::{Error, Result};
use std::time::Duration;

pub const DB_HOST: &str = "DB_HOST";
pub const DB_USER: &str = "DB_USER";
pub const DB_PASSWORD: &str = "DB_PASSWORD";
pub const DB_NAME: &str = "DB_NAME";
pub const DB_PORT: &str = "DB_PORT";
pub const DB_CONNECT_TIMEOUT: &str = "DB_CONNECT_TIMEOUT";
pub const DB_SSL_KEY: &str = "DB_SSL_KEY";
pub const DB_SSL_CERT: &str = "DB_SSL_CERT";
pub const DB_SSL_CA: &str = "DB_SSL_CA";
pub const DB_SSL_MODE: &str = "DB_SSL_MODE";
pub const DB_PROBE_STRICT: &str = "DB_PROBE_STRICT";
pub const DB_PROBE_MAX_ATTEMPTS: &str = "DB_PROBE_MAX_ATTEMPTS";
pub const DB_PROBE_BACKOFF_SECS: &str = "DB_PROBE_BACKOFF_SECS";
pub const DB_PROBE_LABEL: &str = "DB_PROBE_LABEL";

/// Label used in the report heading when none is configured
pub const DEFAULT_LABEL: &str = "MySQL";

/// How missing required values are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strictness {
    /// Substitute fixed defaults
    #[default]
    Permissive,
    /// Fail fast with [`Error::MissingConfig`]
    Strict,
}

impl std::fmt::Display for Strictness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Permissive => write!(f, "permissive"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

/// Fallback values used in permissive mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissiveDefaults {
    pub host: String,
    pub user: String,
    pub password: String,
    /// Schema to select; None leaves the session without a default schema
    pub database: Option<String>,
}

impl Default for PermissiveDefaults {
    fn default() -> Self {
        Self {
            host: "synaptic_db_webPHP8".to_string(),
            user: "synaptic_db_webPHP8".to_string(),
            password: "synaptic_db_webPHP8".to_string(),
            database: None,
        }
    }
}

fn lookup<P: ConfigProvider>(provider: &P, key: &str) -> Option<String> {
    provider.get(key).filter(|value| !value.is_empty())
}

fn required<P: ConfigProvider>(
    provider: &P,
    key: &'static str,
    strictness: Strictness,
    fallback: &str,
) -> Result<String> {
    match (lookup(provider, key), strictness) {
        (Some(value), _) => Ok(value),
        (None, Strictness::Strict) => Err(Error::MissingConfig { key }),
        (None, Strictness::Permissive) => {
            tracing::debug!(key, "using default value");
            Ok(fallback.to_string())
        }
    }
}

fn parse_value<T: std::str::FromStr, P: ConfigProvider>(
    provider: &P,
    key: &str,
) -> Result<Option<T>> {
    match lookup(provider, key) {
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            Error::Config(format!("{} has an invalid value '{}'", key, raw))
        }),
        None => Ok(None),
    }
}

fn parse_flag<P: ConfigProvider>(provider: &P, key: &str) -> Result<Option<bool>> {
    match lookup(provider, key) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(Error::Config(format!(
                "{} has an invalid value '{}': expected true or false",
                key, raw
            ))),
        },
        None => Ok(None),
    }
}

fn load_tls<P: ConfigProvider>(provider: &P) -> Result<Option<TlsBundle>> {
    let key = lookup(provider, DB_SSL_KEY);
    let cert = lookup(provider, DB_SSL_CERT);
    let ca = lookup(provider, DB_SSL_CA);
    let mode: Option<TlsMode> = parse_value(provider, DB_SSL_MODE)?;

    let bundle = match (key, cert, ca) {
        (None, None, None) => None,
        (Some(key), Some(cert), Some(ca)) => Some(TlsBundle::new(key, cert, ca)?),
        (key, cert, ca) => {
            let missing: Vec<&str> = [(DB_SSL_KEY, key), (DB_SSL_CERT, cert), (DB_SSL_CA, ca)]
                .into_iter()
                .filter(|(_, value)| value.is_none())
                .map(|(name, _)| name)
                .collect();
            return Err(Error::Config(format!(
                "incomplete TLS bundle, missing {}",
                missing.join(", ")
            )));
        }
    };

    match (bundle, mode) {
        (Some(bundle), Some(mode)) => Ok(Some(bundle.with_mode(mode)?)),
        (Some(bundle), None) => Ok(Some(bundle)),
        (None, None) | (None, Some(TlsMode::Disabled)) => Ok(None),
        (None, Some(mode)) => Err(Error::Config(format!(
            "ssl mode '{}' requires {}, {} and {}",
            mode, DB_SSL_KEY, DB_SSL_CERT, DB_SSL_CA
        ))),
    }
}

/// Build the connection configuration from a provider.
///
/// # Errors
///
/// * [`Error::MissingConfig`] when strict and host, user, password or database is unset
/// * [`Error::Config`] for a partial TLS bundle, a malformed value or a zero timeout
pub fn load_config<P: ConfigProvider>(
    provider: &P,
    strictness: Strictness,
    defaults: &PermissiveDefaults,
) -> Result<ConnectionConfig> {
    let host = required(provider, DB_HOST, strictness, &defaults.host)?;
    let user = required(provider, DB_USER, strictness, &defaults.user)?;
    let password = required(provider, DB_PASSWORD, strictness, &defaults.password)?;
    let database = match strictness {
        Strictness::Strict => Some(required(provider, DB_NAME, strictness, "")?),
        Strictness::Permissive => lookup(provider, DB_NAME).or_else(|| defaults.database.clone()),
    };

    let mut builder = ConnectionConfig::builder(host, user, password);
    if let Some(database) = database {
        builder = builder.database(database);
    }
    if let Some(port) = parse_value::<u16, _>(provider, DB_PORT)? {
        builder = builder.port(port);
    }
    match parse_value::<u64, _>(provider, DB_CONNECT_TIMEOUT)? {
        Some(0) => {
            return Err(Error::Config(format!(
                "{} must be at least 1 second",
                DB_CONNECT_TIMEOUT
            )))
        }
        Some(secs) => builder = builder.connect_timeout(Duration::from_secs(secs)),
        None => {}
    }
    if let Some(bundle) = load_tls(provider)? {
        builder = builder.tls(bundle);
    }

    let config = builder.build();
    tracing::debug!(?config, %strictness, "configuration loaded");
    Ok(config)
}

/// Probe knobs: strictness, retry policy and report label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSettings {
    pub strictness: Strictness,
    pub retry: RetryPolicy,
    pub label: String,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            strictness: Strictness::Permissive,
            retry: RetryPolicy::none(),
            label: DEFAULT_LABEL.to_string(),
        }
    }
}

impl ProbeSettings {
    /// Strict, retrying settings (10 attempts, 2 seconds apart)
    pub fn strict() -> Self {
        Self {
            strictness: Strictness::Strict,
            retry: RetryPolicy::default(),
            label: DEFAULT_LABEL.to_string(),
        }
    }

    /// Read settings from a provider.
    ///
    /// Strict mode retries by default; permissive mode makes a single attempt
    /// unless `DB_PROBE_MAX_ATTEMPTS` says otherwise.
    pub fn from_provider<P: ConfigProvider>(provider: &P) -> Result<Self> {
        let strict = parse_flag(provider, DB_PROBE_STRICT)?.unwrap_or(false);
        let mut settings = if strict {
            Self::strict()
        } else {
            Self::default()
        };
        settings.apply_overrides(provider)?;
        Ok(settings)
    }

    fn apply_overrides<P: ConfigProvider>(&mut self, provider: &P) -> Result<()> {
        let max_attempts = parse_value::<u32, _>(provider, DB_PROBE_MAX_ATTEMPTS)?;
        let backoff = parse_value::<u64, _>(provider, DB_PROBE_BACKOFF_SECS)?;

        if max_attempts.is_some() || backoff.is_some() {
            let max_attempts = max_attempts.unwrap_or(match self.strictness {
                Strictness::Strict => DEFAULT_MAX_ATTEMPTS,
                Strictness::Permissive => self.retry.max_attempts(),
            });
            let backoff = backoff.map(Duration::from_secs).unwrap_or(DEFAULT_BACKOFF);
            self.retry = RetryPolicy::bounded(max_attempts, backoff)?;
        }

        if let Some(label) = lookup(provider, DB_PROBE_LABEL) {
            self.label = label;
        }
        Ok(())
    }
}
