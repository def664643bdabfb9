//! v6.exchangerate-api.com

use super::join_url;
use crate::core::rates::ExchangeRates;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct LatestResponse {
    result: Option<String>,
    #[serde(alias = "error-type")]
    error_type: Option<String>,
    conversion_rates: Option<BTreeMap<String, f64>>,
}

pub(crate) fn latest(
    client: &reqwest::Client,
    base_url: &str,
    key: &str,
    base: &str,
) -> reqwest::RequestBuilder {
    client.get(join_url(base_url, &format!("{key}/latest/{base}")))
}

pub(crate) fn decode(body: &str) -> Result<ExchangeRates, String> {
    let response: LatestResponse = serde_json::from_str(body).map_err(|e| e.to_string())?;

    if response.result.as_deref() == Some("error") {
        return Err(format!(
            "provider reported error: {}",
            response.error_type.as_deref().unwrap_or("unknown")
        ));
    }

    response
        .conversion_rates
        .map(|rates| ExchangeRates { rates })
        .ok_or_else(|| "missing field `conversion_rates`".to_string())
}
