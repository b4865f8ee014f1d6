//! Shared object model for the k3rs quota controller: projects, namespaces,
//! derived quota objects, and exact resource quantities.

pub mod config;
pub mod limit_range;
pub mod meta;
pub mod namespace;
pub mod project;
pub mod quantity;
pub mod quota;
pub mod resources;
