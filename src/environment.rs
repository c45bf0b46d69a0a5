//! Deployment environment detection.
//!
//! The first hostname the process ever routes decides which template set
//! is used for the rest of its life: a name resolving to a loopback
//! address means a development machine, anything else is production.

use std::net::IpAddr;

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use log::info;
use thiserror::Error;

use crate::types::Environment;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to create system resolver: {0}")]
    Setup(#[source] hickory_resolver::error::ResolveError),
    #[error("failed to resolve {hostname}: {source}")]
    Lookup {
        hostname: String,
        #[source]
        source: hickory_resolver::error::ResolveError,
    },
    #[error("{0} resolved to no addresses")]
    NoAddress(String),
}

/// Name resolution used for classification.
#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn resolve(&self, hostname: &str) -> Result<Vec<IpAddr>, ResolveError>;
}

/// Resolver backed by the host's resolv.conf and hosts file.
pub struct SystemResolver {
    inner: TokioAsyncResolver,
}

impl SystemResolver {
    pub fn from_system_conf() -> Result<Self, ResolveError> {
        let inner = TokioAsyncResolver::tokio_from_system_conf().map_err(ResolveError::Setup)?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl HostResolver for SystemResolver {
    async fn resolve(&self, hostname: &str) -> Result<Vec<IpAddr>, ResolveError> {
        let lookup = self
            .inner
            .lookup_ip(hostname)
            .await
            .map_err(|source| ResolveError::Lookup {
                hostname: hostname.to_string(),
                source,
            })?;
        Ok(lookup.iter().collect())
    }
}

/// Classifies `hostname` by its first resolved address.
pub async fn classify<R>(resolver: &R, hostname: &str) -> Result<Environment, ResolveError>
where
    R: HostResolver + ?Sized,
{
    let addrs = resolver.resolve(hostname).await?;
    let first = addrs
        .first()
        .ok_or_else(|| ResolveError::NoAddress(hostname.to_string()))?;
    let env = if first.to_canonical().is_loopback() {
        Environment::Development
    } else {
        Environment::Production
    };
    info!("{} resolved to {}: {} environment", hostname, first, env);
    Ok(env)
}

/// One-shot environment state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EnvironmentGate {
    #[default]
    Unclassified,
    Classified(Environment),
}

impl EnvironmentGate {
    pub fn environment(&self) -> Option<Environment> {
        match self {
            EnvironmentGate::Unclassified => None,
            EnvironmentGate::Classified(env) => Some(*env),
        }
    }

    /// Latches the gate. Returns `true` only on the transition.
    pub fn classify_once(&mut self, env: Environment) -> bool {
        match self {
            EnvironmentGate::Unclassified => {
                *self = EnvironmentGate::Classified(env);
                true
            }
            EnvironmentGate::Classified(_) => false,
        }
    }
}
