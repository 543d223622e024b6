//! Data models for QuotaWatch

mod notification;
mod tier;
mod usage;

pub use notification::*;
pub use tier::*;
pub use usage::*;
