pub mod exchangerate_api;
pub mod open_exchange_rates;

use crate::core::error::FetchError;
use crate::core::rates::{ExchangeRates, RateSource};
use crate::core::registry::{Provider, ProviderKind};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, instrument};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Calls providers over HTTP, picking the wire format from the provider kind.
#[derive(Debug, Clone)]
pub struct HttpRateSource {
    client: reqwest::Client,
}

impl HttpRateSource {
    pub fn new() -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("fxgate/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    #[instrument(
        name = "RatesFetch",
        skip(self, provider),
        fields(provider = %provider.name, kind = %provider.endpoint.kind)
    )]
    async fn fetch_rates(
        &self,
        provider: &Provider,
        base: &str,
    ) -> Result<ExchangeRates, FetchError> {
        let credential = provider
            .credential
            .as_ref()
            .ok_or_else(|| FetchError::MissingCredential(provider.name.clone()))?;
        let base_url = &provider.endpoint.base_url;
        let key = credential.expose();

        let request = match provider.endpoint.kind {
            ProviderKind::ExchangerateApi => {
                exchangerate_api::latest(&self.client, base_url, key, base)
            }
            ProviderKind::OpenExchangeRates => {
                open_exchange_rates::latest(&self.client, base_url, key, base)
            }
        };

        // The URL carries the API key, so it is stripped from errors.
        let transport = |e: reqwest::Error| FetchError::Transport {
            provider: provider.name.clone(),
            source: e.without_url(),
        };

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        debug!(%status, "Received provider response");

        if status == StatusCode::FORBIDDEN {
            return Err(FetchError::QuotaRejected(provider.name.clone()));
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                provider: provider.name.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(transport)?;
        let decoded = match provider.endpoint.kind {
            ProviderKind::ExchangerateApi => exchangerate_api::decode(&body),
            ProviderKind::OpenExchangeRates => open_exchange_rates::decode(&body),
        };

        decoded.map_err(|reason| FetchError::Decode {
            provider: provider.name.clone(),
            reason,
        })
    }
}

/// Joins a configured base URL and a path without doubling the slash.
fn join_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}
