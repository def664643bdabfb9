use super::credentials::CredentialSource;
use super::error::ConfigError;
use super::registry::{Endpoint, Provider, ProviderKind, Registry};
use super::window::ResetPeriod;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: ProviderKind,
    pub base_url: String,
    pub quota: u32,
    /// Environment variable holding the API key. Defaults per `kind`.
    #[serde(default)]
    pub credential_env: Option<String>,
    #[serde(default)]
    pub reset: ResetPeriod,
}

impl ProviderConfig {
    pub fn credential_env(&self) -> &str {
        self.credential_env
            .as_deref()
            .unwrap_or_else(|| self.kind.default_credential_env())
    }
}

/// How the rate service brackets the downstream call.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AdmissionMode {
    /// Admission and commit are separate critical sections. Concurrent calls
    /// may overshoot the ceiling by at most the number in flight minus one.
    #[default]
    Optimistic,
    /// One call per provider at a time, from admission through commit.
    Serialized,
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_flush_interval_secs() -> u64 {
    300
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig {
            name: "er-a".to_string(),
            kind: ProviderKind::ExchangerateApi,
            base_url: "https://v6.exchangerate-api.com/v6/".to_string(),
            quota: 1500,
            credential_env: None,
            reset: ResetPeriod::Monthly,
        },
        ProviderConfig {
            name: "oer".to_string(),
            kind: ProviderKind::OpenExchangeRates,
            base_url: "https://openexchangerates.org/api/".to_string(),
            quota: 1000,
            credential_env: None,
            reset: ResetPeriod::Monthly,
        },
    ]
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    pub state_file: Option<String>,
    /// Seconds between safety-net flushes of the state file; 0 disables.
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    #[serde(default)]
    pub admission: AdmissionMode,
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            listen: default_listen(),
            state_file: None,
            flush_interval_secs: default_flush_interval_secs(),
            admission: AdmissionMode::default(),
            providers: default_providers(),
        }
    }
}

impl AppConfig {
    /// Loads the config at the default location, or the built-in defaults if
    /// there is none.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            info!(
                "No config file at {}, using built-in providers",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "fxgate", "fxgate")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn state_file_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.state_file {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("dev", "fxgate", "fxgate")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().join("api_state.json"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn flush_interval(&self) -> Option<Duration> {
        (self.flush_interval_secs > 0).then(|| Duration::from_secs(self.flush_interval_secs))
    }

    /// Builds the provider registry, injecting credentials from `credentials`.
    ///
    /// A provider without a credential is still registered; its calls fail
    /// downstream without consuming quota.
    pub fn build_registry(
        &self,
        credentials: &dyn CredentialSource,
    ) -> Result<Registry, ConfigError> {
        let providers = self
            .providers
            .iter()
            .map(|p| {
                let credential = credentials.credential(p.credential_env());
                if credential.is_none() {
                    warn!(
                        provider = %p.name,
                        env = p.credential_env(),
                        "No credential configured for provider"
                    );
                }
                if matches!(p.reset, ResetPeriod::Rolling { .. }) {
                    warn!(
                        provider = %p.name,
                        "Rolling reset periods are deprecated, prefer monthly"
                    );
                }
                Provider {
                    name: p.name.clone(),
                    endpoint: Endpoint {
                        kind: p.kind,
                        base_url: p.base_url.clone(),
                    },
                    credential,
                    quota_ceiling: p.quota,
                    reset_period: p.reset,
                }
            })
            .collect();

        Registry::new(providers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::credentials::StaticCredentials;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
listen: "127.0.0.1:9090"
state_file: "/var/lib/fxgate/api_state.json"
flush_interval_secs: 0
admission: serialized
providers:
  - name: "er-a"
    kind: exchangerate-api
    base_url: "https://v6.exchangerate-api.com/v6/"
    quota: 1500
  - name: "oer"
    kind: open-exchange-rates
    base_url: "https://openexchangerates.org/api/"
    quota: 1000
    credential_env: "OER_KEY"
    reset:
      rolling:
        days: 30
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.listen, "127.0.0.1:9090");
        assert_eq!(
            config.state_file_path().unwrap(),
            PathBuf::from("/var/lib/fxgate/api_state.json")
        );
        assert!(config.flush_interval().is_none());
        assert_eq!(config.admission, AdmissionMode::Serialized);
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[0].kind, ProviderKind::ExchangerateApi);
        assert_eq!(config.providers[0].reset, ResetPeriod::Monthly);
        assert_eq!(config.providers[0].credential_env(), "EXCHANGERATE_API_KEY");
        assert_eq!(config.providers[1].credential_env(), "OER_KEY");
        assert_eq!(config.providers[1].reset, ResetPeriod::Rolling { days: 30 });
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.listen, "0.0.0.0:8080");
        assert_eq!(config.flush_interval(), Some(Duration::from_secs(300)));
        assert_eq!(config.admission, AdmissionMode::Optimistic);

        let names: Vec<_> = config.providers.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["er-a", "oer"]);
        assert_eq!(config.providers[0].quota, 1500);
        assert_eq!(config.providers[1].quota, 1000);
    }

    #[test]
    fn test_build_registry_injects_credentials() {
        let config = AppConfig::default();
        let credentials = StaticCredentials::new([("EXCHANGERATE_API_KEY", "er-key")]);

        let registry = config.build_registry(&credentials).unwrap();
        let er_a = registry.find("er-a").unwrap();
        assert_eq!(er_a.credential.as_ref().map(|c| c.expose()), Some("er-key"));
        assert_eq!(er_a.endpoint.kind, ProviderKind::ExchangerateApi);
        assert!(registry.find("oer").unwrap().credential.is_none());
    }

    #[test]
    fn test_build_registry_rejects_duplicates() {
        let mut config = AppConfig::default();
        config.providers[1].name = "er-a".to_string();
        let err = config
            .build_registry(&StaticCredentials::default())
            .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateProvider("er-a".to_string()));
    }

    #[test]
    fn test_load_from_missing_path_fails() {
        let err = AppConfig::load_from_path("/nonexistent/fxgate.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
