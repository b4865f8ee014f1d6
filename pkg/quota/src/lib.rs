//! Pure quota arithmetic for the k3rs quota controller.
//!
//! Nothing here touches the store: derivation, fit checks, and spec diffs are
//! deterministic functions of their inputs and fail only on malformed
//! quantities.

pub mod derive;
pub mod fit;
pub mod spec;

pub use derive::{derive_container_limit, derive_namespace_quota, merge_container_limit};
pub use fit::{QuotaFit, exceeded_message, is_quota_fit, zero_out_exceeded};
pub use spec::{SyncOp, decide_limit_range_op, decide_quota_op, limit_range_spec, quota_spec};
