//! Data structures shared by the reconciliation pipeline.
//!
//! A container advertises the hostnames it wants exposed through a
//! single label value such as `example.com:8080,git.example.com:8081`.
//! Those entries become [`Route`]s in the desired state, which the
//! renderer turns into [`ConfigFragment`]s for the proxy admin API.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A hostname routed to an upstream target (`container:port`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Route {
    pub hostname: String,
    pub upstream: String,
}

impl Route {
    pub fn new(hostname: impl Into<String>, upstream: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            upstream: upstream.into(),
        }
    }
}

/// The runtime's view of one labelled container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDescriptor {
    pub name: String,
    /// Raw routing label value.
    pub metadata: String,
    pub running: bool,
}

/// A lifecycle notification for a labelled container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    /// Docker action: `start`, `die` or `oom`.
    pub status: String,
    pub name: String,
    pub metadata: String,
}

impl LifecycleEvent {
    /// Only `start` brings routes up; every other status tears them down.
    pub fn is_up(&self) -> bool {
        self.status == "start"
    }
}

/// Deployment classification selecting the template set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Name of the template directory for this environment.
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of configuration posted to the proxy.
///
/// `api_path` is relative to the admin API's `/config/` endpoint; an
/// empty path addresses the configuration root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFragment {
    pub api_path: String,
    pub body: Vec<u8>,
}
