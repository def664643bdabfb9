//! Provider registry, quota tracking and the abstractions around them

pub mod config;
pub mod credentials;
pub mod error;
pub mod log;
pub mod quota;
pub mod rates;
pub mod registry;
pub mod window;

// Re-export main types for cleaner imports
pub use error::{ConfigError, FetchError, QuotaError};
pub use quota::{Admission, FileQuotaTracker, QuotaStatus, QuotaTracker, Usage};
pub use rates::{ExchangeRates, RateSource};
pub use registry::{Provider, ProviderKind, Registry};
pub use window::{Clock, ResetPeriod, SystemClock};
