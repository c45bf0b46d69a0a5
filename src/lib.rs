//! Keeps Caddy's routing configuration in step with labelled Docker
//! containers.

pub mod config;
pub mod environment;
pub mod error;
pub mod metadata;
pub mod proxy;
pub mod reconcile;
pub mod render;
pub mod runtime;
pub mod state;
pub mod supervisor;
pub mod templates;
pub mod types;
