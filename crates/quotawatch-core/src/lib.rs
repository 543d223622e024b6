//! # QuotaWatch
//!
//! Storage quota alerting for hosted file services.
//!
//! QuotaWatch looks at how much of a user's storage quota is in use, maps it
//! onto a severity tier, and raises, escalates, or resolves a notification,
//! repeating a notification at an unchanged tier at most once a week.
//!
//! ## Architecture
//!
//! - **Alerting**: the tier/cooldown evaluator and its collaborator traits
//! - **Usage**: lookups of a user's quota and fill ratio (HTTP or Postgres)
//! - **Storage**: Redis for per-tier alert timestamps, Postgres for
//!   notifications and host usage tables
//!
//! ## Quick Start
//!
//! ```bash
//! # Check one user, as a host scheduler would
//! quotawatch check alice
//!
//! # Inspect what has been recorded for them
//! quotawatch state alice
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod alerting;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod usage;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::alerting::{
        AlertStateStore, CheckOutcome, Decision, NotificationSink, QuotaAlertEvaluator,
    };
    pub use crate::config::Config;
    pub use crate::db::Database;
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
    pub use crate::usage::UsageSource;
}
