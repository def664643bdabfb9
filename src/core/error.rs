//! Error types shared across the quota core and its collaborators.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Outcomes of the quota tracker that callers are expected to handle.
#[derive(Debug, Error)]
pub enum QuotaError {
    /// The requested provider is not registered.
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    /// The provider's ceiling for the current window has been reached.
    #[error("API {provider} has exceeded its request limit ({used}/{ceiling})")]
    QuotaExceeded {
        provider: String,
        used: u32,
        ceiling: u32,
    },

    /// The state snapshot could not be written. The in-memory counter is
    /// already advanced when this is returned from a commit.
    #[error("Failed to write quota state to {}: {source}", path.display())]
    PersistenceWriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The state file exists but could not be read or parsed.
    #[error("Failed to read quota state from {}: {reason}", path.display())]
    PersistenceReadFailed { path: PathBuf, reason: String },

    /// No state file at the configured location.
    #[error("No quota state file at {}", .0.display())]
    PersistenceMissing(PathBuf),
}

impl QuotaError {
    /// Returns true for failures of the durable state file rather than of
    /// the admission protocol itself.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            QuotaError::PersistenceWriteFailed { .. }
                | QuotaError::PersistenceReadFailed { .. }
                | QuotaError::PersistenceMissing(_)
        )
    }
}

/// Failures reported by a downstream rate source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("No credential configured for API {0}")]
    MissingCredential(String),

    #[error("Failed to fetch exchange rates from {provider}: {source}")]
    Transport {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    /// The upstream refused the call because its own quota is spent.
    #[error("API {0} has exceeded its request limit")]
    QuotaRejected(String),

    #[error("API {provider} returned status {status}")]
    Status { provider: String, status: u16 },

    #[error("Failed to decode response from {provider}: {reason}")]
    Decode { provider: String, reason: String },
}

/// Invalid provider configuration detected while building the registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No providers configured")]
    NoProviders,

    #[error("Provider name must not be empty")]
    EmptyName,

    #[error("Duplicate provider name: {0}")]
    DuplicateProvider(String),

    #[error("Provider {0} must have a quota greater than zero")]
    ZeroQuota(String),

    #[error("Provider {0} has a rolling reset period of zero days")]
    InvalidResetPeriod(String),
}
