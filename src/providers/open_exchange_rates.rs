//! openexchangerates.org

use super::join_url;
use crate::core::rates::ExchangeRates;
use reqwest::Url;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct LatestResponse {
    rates: BTreeMap<String, f64>,
}

pub(crate) fn latest(
    client: &reqwest::Client,
    base_url: &str,
    app_id: &str,
    base: &str,
) -> reqwest::RequestBuilder {
    let url = join_url(base_url, "latest.json");
    match Url::parse_with_params(&url, &[("app_id", app_id), ("base", base)]) {
        Ok(url) => client.get(url),
        // Let the send report the bad URL as a request error.
        Err(_) => client.get(url),
    }
}

pub(crate) fn decode(body: &str) -> Result<ExchangeRates, String> {
    let response: LatestResponse = serde_json::from_str(body).map_err(|e| e.to_string())?;
    Ok(ExchangeRates {
        rates: response.rates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::credentials::Credential;
    use crate::core::rates::RateSource;
    use crate::core::registry::{Endpoint, Provider, ProviderKind};
    use crate::core::window::ResetPeriod;
    use crate::providers::HttpRateSource;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: &str) -> Provider {
        Provider {
            name: "oer".to_string(),
            endpoint: Endpoint {
                kind: ProviderKind::OpenExchangeRates,
                base_url: base_url.to_string(),
            },
            credential: Some(Credential::new("test-app-id")),
            quota_ceiling: 1000,
            reset_period: ResetPeriod::Monthly,
        }
    }

    #[tokio::test]
    async fn test_successful_rates_fetch() {
        let mock_server = MockServer::start().await;
        let mock_response = r#"{
            "disclaimer": "Usage subject to terms",
            "timestamp": 1760868000,
            "base": "USD",
            "rates": {
                "EUR": 0.9223,
                "JPY": 151.2
            }
        }"#;

        Mock::given(method("GET"))
            .and(path("/api/latest.json"))
            .and(query_param("app_id", "test-app-id"))
            .and(query_param("base", "USD"))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        let source = HttpRateSource::new().unwrap();
        let rates = source
            .fetch_rates(&provider(&format!("{}/api/", mock_server.uri())), "USD")
            .await
            .expect("Failed to get rates");

        assert_eq!(rates.rates.len(), 2);
        assert_eq!(rates.rates["EUR"], 0.9223);
        assert_eq!(rates.rates["JPY"], 151.2);
    }

    #[tokio::test]
    async fn test_malformed_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"error": true}"#))
            .mount(&mock_server)
            .await;

        let source = HttpRateSource::new().unwrap();
        let err = source
            .fetch_rates(&provider(&mock_server.uri()), "USD")
            .await
            .unwrap_err();
        assert!(
            err.to_string()
                .contains("Failed to decode response from oer")
        );
    }
}
