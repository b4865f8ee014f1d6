//! Quota controllers: per-namespace quota and limit range sync, project usage
//! aggregation, and the project controller, run by `QuotaControllerManager`.

pub mod lock;
pub mod manager;
pub mod project;
pub mod queue;
pub mod resource_quota;
pub mod usage;

#[cfg(test)]
mod test_support;

pub use manager::{ControllerConfig, QuotaControllerManager};
