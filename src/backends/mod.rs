//! Backend catalogues.
//!
//! Each backend contributes a [`BackendProfile`] (where and how to
//! authenticate) and a [`ToolRegistry`] built almost entirely from
//! `OperationSpec` tables.

use std::fmt;
use std::str::FromStr;

use crate::api::BackendProfile;
use crate::config::ServerConfig;
use crate::tools::{RegistryError, ToolRegistry};

pub mod github;
pub mod vercel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    GitHub,
    Vercel,
}

impl Backend {
    pub const ALL: [Backend; 2] = [Backend::GitHub, Backend::Vercel];

    pub fn name(self) -> &'static str {
        match self {
            Backend::GitHub => "github",
            Backend::Vercel => "vercel",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|b| b.name()).collect()
    }

    /// Environment variables checked, in order, for the credential.
    pub fn credential_vars(self) -> &'static [&'static str] {
        match self {
            Backend::GitHub => &["GITHUB_PERSONAL_ACCESS_TOKEN", "GITHUB_TOKEN"],
            Backend::Vercel => &["VERCEL_API_TOKEN", "VERCEL_TOKEN"],
        }
    }

    pub fn tenant_var(self) -> Option<&'static str> {
        match self {
            Backend::GitHub => None,
            Backend::Vercel => Some("VERCEL_TEAM_ID"),
        }
    }

    pub fn profile(self, config: &ServerConfig) -> BackendProfile {
        let mut profile = match self {
            Backend::GitHub => github::profile(),
            Backend::Vercel => vercel::profile(config.tenant.as_deref()),
        };
        if let Some(base_url) = &config.base_url {
            profile.base_url = base_url.clone();
        }
        profile
    }

    pub fn registry(self) -> Result<ToolRegistry, RegistryError> {
        match self {
            Backend::GitHub => github::registry(),
            Backend::Vercel => vercel::registry(),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|b| b.name() == wanted)
            .ok_or_else(|| format!("unknown backend '{s}'"))
    }
}

#[cfg(test)]
mod tests;
