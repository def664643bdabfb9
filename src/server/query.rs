//! Validation of inbound rate queries.

use crate::core::registry::Registry;
use serde::Deserialize;

const DEFAULT_BASE: &str = "USD";

/// Raw query string of `GET /exchange-rates`.
#[derive(Debug, Default, Deserialize)]
pub struct RatesParams {
    pub api: Option<String>,
    pub base: Option<String>,
}

/// A query whose provider is registered and whose base currency is well formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateQuery {
    pub provider: String,
    pub base: String,
}

impl RateQuery {
    pub fn parse(params: RatesParams, registry: &Registry) -> Result<Self, String> {
        let provider = match params.api.filter(|api| !api.is_empty()) {
            Some(api) => api,
            None => return Err("Missing 'api' query parameter".to_string()),
        };
        if !registry.contains(&provider) {
            return Err("Invalid 'api' parameter".to_string());
        }

        let base = params
            .base
            .filter(|base| !base.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE.to_string());
        if !is_currency_code(&base) {
            return Err("Invalid 'base' parameter".to_string());
        }

        Ok(Self { provider, base })
    }
}

/// Three uppercase ASCII letters, e.g. `USD`.
pub fn is_currency_code(code: &str) -> bool {
    code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::test_provider;

    fn registry() -> Registry {
        Registry::new(vec![test_provider("er-a", 1500), test_provider("oer", 1000)]).unwrap()
    }

    fn params(api: Option<&str>, base: Option<&str>) -> RatesParams {
        RatesParams {
            api: api.map(str::to_string),
            base: base.map(str::to_string),
        }
    }

    #[test]
    fn test_currency_codes() {
        assert!(is_currency_code("USD"));
        assert!(is_currency_code("EUR"));
        assert!(!is_currency_code("usd"));
        assert!(!is_currency_code("US"));
        assert!(!is_currency_code("USDT"));
        assert!(!is_currency_code("U5D"));
        assert!(!is_currency_code("ÜSD"));
    }

    #[test]
    fn test_valid_query() {
        let query = RateQuery::parse(params(Some("oer"), Some("EUR")), &registry()).unwrap();
        assert_eq!(
            query,
            RateQuery {
                provider: "oer".to_string(),
                base: "EUR".to_string()
            }
        );
    }

    #[test]
    fn test_base_defaults_to_usd() {
        let registry = registry();
        let query = RateQuery::parse(params(Some("er-a"), None), &registry).unwrap();
        assert_eq!(query.base, "USD");
        let query = RateQuery::parse(params(Some("er-a"), Some("")), &registry).unwrap();
        assert_eq!(query.base, "USD");
    }

    #[test]
    fn test_invalid_queries() {
        let registry = registry();
        assert_eq!(
            RateQuery::parse(params(None, Some("USD")), &registry).unwrap_err(),
            "Missing 'api' query parameter"
        );
        assert_eq!(
            RateQuery::parse(params(Some(""), None), &registry).unwrap_err(),
            "Missing 'api' query parameter"
        );
        assert_eq!(
            RateQuery::parse(params(Some("fixer"), None), &registry).unwrap_err(),
            "Invalid 'api' parameter"
        );
        assert_eq!(
            RateQuery::parse(params(Some("oer"), Some("usd")), &registry).unwrap_err(),
            "Invalid 'base' parameter"
        );
    }
}
