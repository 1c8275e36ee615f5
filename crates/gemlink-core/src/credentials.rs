//! Credential authority seam.
//!
//! Key storage, rotation, quota admission and session acquisition belong to
//! an external backend. The host consults a `CredentialAuthority` before
//! building each request; the relay never selects or rotates keys.

use anyhow::{Context, Result};

use crate::envelope::Credential;

/// Source of the credential used for the next request to `target`.
pub trait CredentialAuthority: Send + Sync {
    /// Returns the credential to use for a request to `target`.
    ///
    /// # Errors
    /// Returns an error when no credential can be issued, which the host
    /// treats as a signal to fall back to manual authentication.
    fn credential(&self, target: &str) -> Result<Credential>;
}

/// Always hands out the same credential.
#[derive(Debug, Clone)]
pub struct StaticCredential {
    credential: Credential,
}

impl StaticCredential {
    pub fn new(credential: Credential) -> Self {
        Self { credential }
    }
}

impl CredentialAuthority for StaticCredential {
    fn credential(&self, _target: &str) -> Result<Credential> {
        Ok(self.credential.clone())
    }
}

/// Resolves an API key with precedence: config > env.
#[derive(Debug, Clone)]
pub struct EnvCredential {
    config_api_key: Option<String>,
    env_var: String,
}

impl EnvCredential {
    /// Environment variable consulted when the config has no key.
    pub const DEFAULT_ENV_VAR: &'static str = "GEMINI_API_KEY";

    pub fn new(config_api_key: Option<String>) -> Self {
        Self::with_env_var(config_api_key, Self::DEFAULT_ENV_VAR)
    }

    pub fn with_env_var(config_api_key: Option<String>, env_var: impl Into<String>) -> Self {
        Self {
            config_api_key,
            env_var: env_var.into(),
        }
    }
}

impl CredentialAuthority for EnvCredential {
    fn credential(&self, _target: &str) -> Result<Credential> {
        resolve_api_key(self.config_api_key.as_deref(), &self.env_var).map(Credential::new)
    }
}

/// Resolves an API key with precedence: config > env.
///
/// # Errors
/// Returns an error if neither source provides a non-empty key.
pub fn resolve_api_key(config_api_key: Option<&str>, env_var: &str) -> Result<String> {
    if let Some(key) = config_api_key {
        let trimmed = key.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }

    let key = std::env::var(env_var).context(format!(
        "No API key available. Set {env_var} or api_key in [relay]."
    ))?;
    let trimmed = key.trim();
    if trimmed.is_empty() {
        anyhow::bail!("{env_var} is set but empty.");
    }
    Ok(trimmed.to_string())
}
