//! The fixed set of upstream exchange-rate providers.

use super::credentials::Credential;
use super::error::{ConfigError, QuotaError};
use super::window::ResetPeriod;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Wire format spoken by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// v6.exchangerate-api.com: `{base_url}{key}/latest/{base}`
    ExchangerateApi,
    /// openexchangerates.org: `{base_url}latest.json?app_id={key}&base={base}`
    OpenExchangeRates,
}

impl ProviderKind {
    /// Environment variable that conventionally holds this provider's key.
    pub fn default_credential_env(&self) -> &'static str {
        match self {
            ProviderKind::ExchangerateApi => "EXCHANGERATE_API_KEY",
            ProviderKind::OpenExchangeRates => "OPENEXCHANGERATES_APP_ID",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::ExchangerateApi => write!(f, "exchangerate-api"),
            ProviderKind::OpenExchangeRates => write!(f, "open-exchange-rates"),
        }
    }
}

/// Where and how to call a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub kind: ProviderKind,
    pub base_url: String,
}

/// One configured exchange-rate source.
///
/// Runtime usage is owned by the quota tracker, keyed by `name`.
#[derive(Debug, Clone)]
pub struct Provider {
    pub name: String,
    pub endpoint: Endpoint,
    pub credential: Option<Credential>,
    pub quota_ceiling: u32,
    pub reset_period: ResetPeriod,
}

/// Lookup of providers by name. Built once, never mutated afterwards.
#[derive(Debug)]
pub struct Registry {
    providers: Vec<Provider>,
}

impl Registry {
    pub fn new(providers: Vec<Provider>) -> Result<Self, ConfigError> {
        if providers.is_empty() {
            return Err(ConfigError::NoProviders);
        }

        let mut seen = HashSet::new();
        for provider in &providers {
            if provider.name.trim().is_empty() {
                return Err(ConfigError::EmptyName);
            }
            if !seen.insert(provider.name.as_str()) {
                return Err(ConfigError::DuplicateProvider(provider.name.clone()));
            }
            if provider.quota_ceiling == 0 {
                return Err(ConfigError::ZeroQuota(provider.name.clone()));
            }
            if provider.reset_period == (ResetPeriod::Rolling { days: 0 }) {
                return Err(ConfigError::InvalidResetPeriod(provider.name.clone()));
            }
        }

        Ok(Self { providers })
    }

    pub fn find(&self, name: &str) -> Result<&Provider, QuotaError> {
        self.find_entry(name).map(|(_, provider)| provider)
    }

    /// Like `find`, also returning the provider's position in the registry.
    pub fn find_entry(&self, name: &str) -> Result<(usize, &Provider), QuotaError> {
        self.providers
            .iter()
            .enumerate()
            .find(|(_, p)| p.name == name)
            .ok_or_else(|| QuotaError::ProviderNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.iter().any(|p| p.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Provider> {
        self.providers.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|p| p.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
pub(crate) fn test_provider(name: &str, quota_ceiling: u32) -> Provider {
    Provider {
        name: name.to_string(),
        endpoint: Endpoint {
            kind: ProviderKind::OpenExchangeRates,
            base_url: "http://localhost/".to_string(),
        },
        credential: Some(Credential::new("test-key")),
        quota_ceiling,
        reset_period: ResetPeriod::Monthly,
    }
}
