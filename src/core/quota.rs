//! Admission and commit of provider calls against their quotas.
//!
//! A call goes through two short critical sections: `check_admission` before
//! the downstream request and `commit` after it succeeded. The lock is not
//! held in between, so with `n` concurrent callers on the last unit of quota
//! a provider can end up at most `n - 1` over its ceiling. Counters only ever
//! advance through `commit`, so failed or cancelled calls cost nothing.

use super::error::QuotaError;
use super::registry::{Provider, Registry};
use super::window::{Clock, ResetPeriod};
use crate::store::{ProviderRecord, StateFile};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Committed usage of one provider in its current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub used_count: u32,
    pub last_reset: DateTime<Utc>,
}

/// A granted admission. Nothing has been consumed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub provider: String,
    pub used_count: u32,
    pub quota_ceiling: u32,
    pub remaining: u32,
    pub window_start: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowState {
    Open,
    Exhausted,
}

/// Usage report for one provider, with the window catch-up applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaStatus {
    pub name: String,
    pub used_count: u32,
    pub quota_ceiling: u32,
    pub remaining: u32,
    pub last_reset: DateTime<Utc>,
    pub reset_period: ResetPeriod,
    pub state: WindowState,
}

#[async_trait]
pub trait QuotaTracker: Send + Sync {
    /// Decides whether `provider` may be called now. Never increments.
    async fn check_admission(&self, provider: &str) -> Result<Admission, QuotaError>;

    /// Records one successful call and persists the full snapshot.
    ///
    /// On `PersistenceWriteFailed` the increment has still happened.
    async fn commit(&self, provider: &str) -> Result<Usage, QuotaError>;

    /// Current state of every provider, in registry order.
    async fn report(&self) -> Vec<QuotaStatus>;

    /// Persists the current snapshot without touching any counter.
    async fn flush(&self) -> Result<(), QuotaError>;
}

struct Table {
    usage: Vec<Usage>,
    generation: u64,
}

/// Tracker backed by a JSON state file.
pub struct FileQuotaTracker<C: Clock> {
    registry: Arc<Registry>,
    state_file: Arc<StateFile>,
    clock: C,
    table: Mutex<Table>,
}

impl<C: Clock> FileQuotaTracker<C> {
    /// Builds the tracker and restores saved usage.
    ///
    /// Never fails: a missing, unreadable or malformed state file leaves every
    /// provider at zero, and records for unknown providers are ignored.
    pub fn open(registry: Arc<Registry>, state_file: StateFile, clock: C) -> Self {
        let now = clock.now();
        let now_utc = now.with_timezone(&Utc);
        let mut usage: Vec<Usage> = registry
            .iter()
            .map(|p| Usage {
                used_count: 0,
                last_reset: p.reset_period.window_start(&now, now_utc),
            })
            .collect();

        match state_file.load() {
            Ok(records) => restore(&registry, &mut usage, records),
            Err(QuotaError::PersistenceMissing(path)) => {
                info!(path = %path.display(), "No saved quota state, starting from zero");
            }
            Err(e) => {
                warn!(error = %e, "Could not restore quota state, starting from zero");
            }
        }

        Self {
            registry,
            state_file: Arc::new(state_file),
            clock,
            table: Mutex::new(Table {
                usage,
                generation: 0,
            }),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Moves `usage` into the current window if its window has passed.
    fn catch_up(&self, provider: &Provider, usage: &mut Usage) {
        let window_start = provider
            .reset_period
            .window_start(&self.clock.now(), usage.last_reset);
        if usage.last_reset < window_start {
            info!(
                provider = %provider.name,
                previous = %usage.last_reset,
                window_start = %window_start,
                "Resetting request count for new quota window"
            );
            usage.used_count = 0;
            usage.last_reset = window_start;
        }
    }

    fn records(&self, table: &Table) -> Vec<ProviderRecord> {
        self.registry
            .iter()
            .zip(&table.usage)
            .map(|(provider, usage)| ProviderRecord {
                name: provider.name.clone(),
                used_count: usage.used_count,
                last_reset: usage.last_reset,
                quota_ceiling: provider.quota_ceiling,
                reset_period: provider.reset_period,
            })
            .collect()
    }

    /// Writes a snapshot of `table` on the blocking pool.
    ///
    /// Called with the table lock held so snapshots are taken in order; the
    /// generation check in `StateFile::save` keeps them in order on disk even
    /// if a caller is cancelled mid-write.
    async fn persist(&self, table: &mut Table) -> Result<(), QuotaError> {
        table.generation += 1;
        let generation = table.generation;
        let records = self.records(table);
        let state_file = Arc::clone(&self.state_file);

        match tokio::task::spawn_blocking(move || state_file.save(generation, &records)).await {
            Ok(result) => result.map(|_| ()),
            Err(e) => Err(QuotaError::PersistenceWriteFailed {
                path: self.state_file.path().to_path_buf(),
                source: io::Error::other(e),
            }),
        }
    }
}

fn restore(registry: &Registry, usage: &mut [Usage], records: Vec<ProviderRecord>) {
    let mut restored = 0;
    for record in records {
        match registry.find_entry(&record.name) {
            Ok((index, _)) => {
                if let Some(slot) = usage.get_mut(index) {
                    slot.used_count = record.used_count;
                    slot.last_reset = record.last_reset;
                    restored += 1;
                }
            }
            Err(_) => {
                warn!(provider = %record.name, "Ignoring saved state for unknown provider");
            }
        }
    }
    info!(restored, "Loaded API state from file");
}

#[async_trait]
impl<C: Clock> QuotaTracker for FileQuotaTracker<C> {
    async fn check_admission(&self, name: &str) -> Result<Admission, QuotaError> {
        let (index, provider) = self.registry.find_entry(name)?;
        let mut table = self.table.lock().await;
        let usage = table
            .usage
            .get_mut(index)
            .ok_or_else(|| QuotaError::ProviderNotFound(name.to_string()))?;

        self.catch_up(provider, usage);

        if usage.used_count >= provider.quota_ceiling {
            warn!(
                provider = %name,
                used = usage.used_count,
                ceiling = provider.quota_ceiling,
                "API has exceeded its request limit"
            );
            return Err(QuotaError::QuotaExceeded {
                provider: name.to_string(),
                used: usage.used_count,
                ceiling: provider.quota_ceiling,
            });
        }

        Ok(Admission {
            provider: name.to_string(),
            used_count: usage.used_count,
            quota_ceiling: provider.quota_ceiling,
            remaining: provider.quota_ceiling - usage.used_count,
            window_start: usage.last_reset,
        })
    }

    async fn commit(&self, name: &str) -> Result<Usage, QuotaError> {
        let (index, provider) = self.registry.find_entry(name)?;
        let mut table = self.table.lock().await;
        let usage = table
            .usage
            .get_mut(index)
            .ok_or_else(|| QuotaError::ProviderNotFound(name.to_string()))?;

        usage.used_count = usage.used_count.saturating_add(1);
        let committed = *usage;
        debug!(
            provider = %name,
            used = committed.used_count,
            ceiling = provider.quota_ceiling,
            "Incremented request count"
        );

        self.persist(&mut table).await?;
        Ok(committed)
    }

    async fn report(&self) -> Vec<QuotaStatus> {
        let mut table = self.table.lock().await;
        self.registry
            .iter()
            .zip(table.usage.iter_mut())
            .map(|(provider, usage)| {
                self.catch_up(provider, usage);
                let remaining = provider.quota_ceiling.saturating_sub(usage.used_count);
                QuotaStatus {
                    name: provider.name.clone(),
                    used_count: usage.used_count,
                    quota_ceiling: provider.quota_ceiling,
                    remaining,
                    last_reset: usage.last_reset,
                    reset_period: provider.reset_period,
                    state: if remaining == 0 {
                        WindowState::Exhausted
                    } else {
                        WindowState::Open
                    },
                }
            })
            .collect()
    }

    async fn flush(&self) -> Result<(), QuotaError> {
        let mut table = self.table.lock().await;
        self.persist(&mut table).await
    }
}

/// Flushes `tracker` every `every` until the returned task is aborted.
pub fn spawn_periodic_flush(tracker: Arc<dyn QuotaTracker>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; state was just loaded.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match tracker.flush().await {
                Ok(()) => debug!("Periodic quota flush complete"),
                Err(e) => warn!(error = %e, "Periodic quota flush failed"),
            }
        }
    })
}
