use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::types::{ContainerDescriptor, LifecycleEvent};

pub mod docker;
pub use docker::DockerRuntime;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("docker: {0}")]
    Docker(#[from] bollard::errors::Error),
    #[error("{0}")]
    Other(String),
}

/// Lifecycle events and subscription failures, delivered separately.
pub struct Subscription {
    pub events: mpsc::Receiver<LifecycleEvent>,
    pub errors: mpsc::Receiver<RuntimeError>,
}

#[async_trait]
pub trait ContainerRuntime {
    /// Subscribe to `start`, `die` and `oom` events of containers carrying
    /// `label`. Events are delivered in the runtime's order.
    async fn subscribe(&self, label: &str) -> Result<Subscription, RuntimeError>;

    /// Running containers carrying `label`.
    async fn list_running(&self, label: &str) -> Result<Vec<ContainerDescriptor>, RuntimeError>;
}
