//! Exchange-rate abstractions

use super::error::FetchError;
use super::registry::Provider;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rates quoted against a base currency, keyed by ISO 4217 code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRates {
    pub rates: BTreeMap<String, f64>,
}

/// Performs the downstream call for a provider.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_rates(&self, provider: &Provider, base: &str)
    -> Result<ExchangeRates, FetchError>;
}
