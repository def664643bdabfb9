//! Provider credentials and where they come from.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// An opaque API secret. Never printed.
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

/// Supplies a credential for a lookup key at startup.
pub trait CredentialSource {
    fn credential(&self, key: &str) -> Option<Credential>;
}

/// Reads credentials from process environment variables.
///
/// Blank values are treated as unset.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCredentials;

impl CredentialSource for EnvCredentials {
    fn credential(&self, key: &str) -> Option<Credential> {
        std::env::var(key)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(Credential::new)
    }
}

/// Loads a `.env` file from the working directory, or one of its parents,
/// when any of `keys` is missing from the environment.
///
/// Variables already set are never overridden. Returns whether a file was
/// loaded.
pub fn load_dotenv<'a>(keys: impl IntoIterator<Item = &'a str>) -> bool {
    load_if_missing(keys, || dotenvy::dotenv().map(|_| ()))
}

/// Same as [`load_dotenv`], reading the file at `path`.
pub fn load_dotenv_from<'a>(path: &Path, keys: impl IntoIterator<Item = &'a str>) -> bool {
    load_if_missing(keys, || dotenvy::from_path(path))
}

fn load_if_missing<'a>(
    keys: impl IntoIterator<Item = &'a str>,
    load: impl FnOnce() -> dotenvy::Result<()>,
) -> bool {
    let missing: Vec<&str> = keys
        .into_iter()
        .filter(|key| EnvCredentials.credential(key).is_none())
        .collect();
    if missing.is_empty() {
        return false;
    }

    match load() {
        Ok(()) => {
            info!(?missing, "Loaded .env file for missing credentials");
            true
        }
        Err(e) if e.not_found() => {
            debug!(?missing, "No .env file found");
            false
        }
        Err(e) => {
            warn!(error = %e, "Failed to load .env file");
            false
        }
    }
}

/// Fixed key/secret pairs, for tests and embedding.
#[derive(Debug, Default, Clone)]
pub struct StaticCredentials(HashMap<String, String>);

impl StaticCredentials {
    pub fn new<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl CredentialSource for StaticCredentials {
    fn credential(&self, key: &str) -> Option<Credential> {
        self.0.get(key).cloned().map(Credential::new)
    }
}
