//! State store, change stream, and project-namespace index.

pub mod client;
pub mod error;
pub mod index;
pub mod watch;
