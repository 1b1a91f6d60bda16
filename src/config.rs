//! Start-up configuration.
//!
//! Read once from positional arguments and the environment, then shared
//! read-only for the lifetime of the process.

use std::fmt;
use std::time::Duration;

use crate::api::client::DEFAULT_REQUEST_TIMEOUT;
use crate::backends::Backend;

pub const BACKEND_ENV: &str = "TOOLBRIDGE_BACKEND";
pub const BASE_URL_ENV: &str = "TOOLBRIDGE_BASE_URL";
pub const TIMEOUT_ENV: &str = "TOOLBRIDGE_TIMEOUT_SECS";

/// Opaque bearer token or API key. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no backend given: pass one of [{names}] as the first argument or set {var}", names = Backend::names().join(", "), var = BACKEND_ENV)]
    MissingBackend,
    #[error("unknown backend '{0}': expected one of [{names}]", names = Backend::names().join(", "))]
    UnknownBackend(String),
    #[error("{backend} credential missing: pass it as the second argument or set {joined}", joined = .vars.join(" or "))]
    MissingCredential {
        backend: &'static str,
        vars: &'static [&'static str],
    },
    #[error("invalid {var} value '{0}': expected a positive number of seconds", var = TIMEOUT_ENV)]
    InvalidTimeout(String),
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub backend: Backend,
    pub credential: Credential,
    /// Team / customer selector for multi-tenant backends.
    pub tenant: Option<String>,
    pub base_url: Option<String>,
    pub request_timeout: Duration,
}

impl ServerConfig {
    /// Reads configuration from `args` (program name excluded) and the
    /// process environment.
    pub fn from_env(args: &[String]) -> Result<Self, ConfigError> {
        Self::from_sources(args, |key| std::env::var(key).ok())
    }

    pub fn from_sources(
        args: &[String],
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let backend_name = args
            .first()
            .cloned()
            .or_else(|| env(BACKEND_ENV))
            .ok_or(ConfigError::MissingBackend)?;
        let backend: Backend = backend_name
            .parse()
            .map_err(|_| ConfigError::UnknownBackend(backend_name.clone()))?;

        let secret = args
            .get(1)
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .or_else(|| backend.credential_vars().iter().find_map(|&var| env(var)))
            .ok_or(ConfigError::MissingCredential {
                backend: backend.name(),
                vars: backend.credential_vars(),
            })?;

        let tenant = backend.tenant_var().and_then(|var| env(var));

        let request_timeout = match env(TIMEOUT_ENV) {
            Some(raw) => parse_timeout(&raw)?,
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        Ok(Self {
            backend,
            credential: Credential::new(secret),
            tenant,
            base_url: env(BASE_URL_ENV),
            request_timeout,
        })
    }
}

fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidTimeout(raw.to_string())),
    }
}
