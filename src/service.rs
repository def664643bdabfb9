//! The caller side of the quota protocol.
//!
//! `admit -> fetch -> commit`, with the tracker lock released while the
//! provider is being called.

use crate::core::config::AdmissionMode;
use crate::core::error::{FetchError, QuotaError};
use crate::core::quota::QuotaTracker;
use crate::core::rates::{ExchangeRates, RateSource};
use crate::core::registry::Registry;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Quota(#[from] QuotaError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

pub struct RateService {
    registry: Arc<Registry>,
    tracker: Arc<dyn QuotaTracker>,
    source: Arc<dyn RateSource>,
    // One gate per provider in `Serialized` mode, none otherwise.
    gates: HashMap<String, Mutex<()>>,
}

impl RateService {
    pub fn new(
        registry: Arc<Registry>,
        tracker: Arc<dyn QuotaTracker>,
        source: Arc<dyn RateSource>,
        admission: AdmissionMode,
    ) -> Self {
        let gates = match admission {
            AdmissionMode::Optimistic => HashMap::new(),
            AdmissionMode::Serialized => registry
                .names()
                .map(|name| (name.to_string(), Mutex::new(())))
                .collect(),
        };
        info!(?admission, providers = registry.len(), "Rate service ready");

        Self {
            registry,
            tracker,
            source,
            gates,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn tracker(&self) -> &Arc<dyn QuotaTracker> {
        &self.tracker
    }

    /// Fetches rates for `base` from the named provider.
    ///
    /// Quota is only consumed when the provider answered successfully. A
    /// failure to persist the new count is logged and does not fail the call.
    #[instrument(skip(self))]
    pub async fn exchange_rates(
        &self,
        provider: &str,
        base: &str,
    ) -> Result<ExchangeRates, ServiceError> {
        let entry = self.registry.find(provider)?;

        let _gate = match self.gates.get(provider) {
            Some(gate) => Some(gate.lock().await),
            None => None,
        };

        let admission = self.tracker.check_admission(provider).await?;
        debug!(
            used = admission.used_count,
            remaining = admission.remaining,
            "Admitted provider call"
        );

        let rates = match self.source.fetch_rates(entry, base).await {
            Ok(rates) => rates,
            Err(e) => {
                warn!(error = %e, "Provider call failed, no quota consumed");
                return Err(e.into());
            }
        };

        // The commit runs as its own task so a dropped request cannot skip it
        // once the provider has already counted the call.
        let tracker = Arc::clone(&self.tracker);
        let name = provider.to_string();
        let committed = tokio::spawn(async move { tracker.commit(&name).await }).await;

        match committed {
            Ok(Ok(usage)) => {
                debug!(used = usage.used_count, "Committed provider call");
            }
            Ok(Err(e)) if e.is_persistence() => {
                warn!(error = %e, "Usage recorded in memory but not saved");
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(e) => warn!(error = %e, "Commit task did not complete"),
        }

        Ok(rates)
    }
}
