//! Hub credential resolution
//!
//! The ingestion core never looks up credentials on its own. Binaries call
//! [`resolve_token`] once at startup and hand the resulting [`HubToken`] to
//! the hub client.
//!
//! Lookup order:
//!
//! 1. An explicitly supplied token (e.g. `--token`)
//! 2. `HUGGINGFACE_HUB_TOKEN`
//! 3. `HF_TOKEN`
//! 4. The token file at `HF_TOKEN_PATH`, `$HF_HOME/token`, or
//!    `~/.cache/huggingface/token`

use crate::error::{CommonError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variables checked for a token, in order.
pub const TOKEN_ENV_VARS: &[&str] = &["HUGGINGFACE_HUB_TOKEN", "HF_TOKEN"];

/// An opaque bearer token for the dataset hub.
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct HubToken(String);

impl HubToken {
    /// Wrap a raw token, rejecting blank values
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CommonError::MissingCredential("token is empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The raw secret, for building an `Authorization` header
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for HubToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HubToken(***)")
    }
}

/// Resolve a hub token from an explicit value, the environment, or the token file
pub fn resolve_token(explicit: Option<&str>) -> Result<HubToken> {
    if let Some(raw) = explicit {
        debug!("Using explicitly supplied hub token");
        return HubToken::new(raw);
    }

    for var in TOKEN_ENV_VARS {
        if let Ok(raw) = std::env::var(var) {
            if !raw.trim().is_empty() {
                debug!(source = %var, "Using hub token from environment");
                return HubToken::new(raw);
            }
        }
    }

    if let Some(path) = token_file_path() {
        if path.is_file() {
            debug!(path = %path.display(), "Using hub token from token file");
            return read_token_file(&path);
        }
    }

    Err(CommonError::MissingCredential(format!(
        "set {} or log in with `huggingface-cli login`",
        TOKEN_ENV_VARS.join(" or ")
    )))
}

/// Location of the token file written by `huggingface-cli login`
pub fn token_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("HF_TOKEN_PATH") {
        return Some(PathBuf::from(path));
    }
    if let Ok(home) = std::env::var("HF_HOME") {
        return Some(PathBuf::from(home).join("token"));
    }
    dirs::home_dir().map(|home| home.join(".cache").join("huggingface").join("token"))
}

fn read_token_file(path: &Path) -> Result<HubToken> {
    let raw = std::fs::read_to_string(path).map_err(|err| {
        CommonError::MissingCredential(format!("cannot read token file {}: {}", path.display(), err))
    })?;
    HubToken::new(raw).map_err(|_| {
        CommonError::MissingCredential(format!("token file {} is empty", path.display()))
    })
}
