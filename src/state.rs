//! Desired routing state.
//!
//! Owned by the reconciler and mutated only from its loop, so no lock is
//! involved. Iteration order of the backing map is irrelevant: every
//! consumer goes through [`DesiredState::snapshot`], which sorts by
//! hostname.

use std::collections::HashMap;

use log::info;

use crate::metadata::Mutation;
use crate::types::Route;

/// What a batch of mutations actually changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Delta {
    pub added: Vec<Route>,
    /// Hostnames that already existed and now point elsewhere.
    pub changed: Vec<Route>,
    pub removed: Vec<String>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }

    /// True when routes went away or moved, which appending cannot express.
    pub fn needs_rebuild(&self) -> bool {
        !self.changed.is_empty() || !self.removed.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct DesiredState {
    routes: HashMap<String, String>,
    first_hostname: Option<String>,
}

impl DesiredState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies mutations in order; the last one for a hostname wins.
    pub fn apply(&mut self, mutations: Vec<Mutation>) -> Delta {
        let mut delta = Delta::default();
        for mutation in mutations {
            match mutation {
                Mutation::Upsert(route) => {
                    if self.first_hostname.is_none() {
                        self.first_hostname = Some(route.hostname.clone());
                    }
                    match self
                        .routes
                        .insert(route.hostname.clone(), route.upstream.clone())
                    {
                        None => {
                            info!("route added: {} => {}", route.hostname, route.upstream);
                            delta.added.push(route);
                        }
                        Some(previous) if previous != route.upstream => {
                            info!(
                                "route changed: {} => {} (was {})",
                                route.hostname, route.upstream, previous
                            );
                            delta.changed.push(route);
                        }
                        Some(_) => {}
                    }
                }
                Mutation::Remove(hostname) => {
                    if self.routes.remove(&hostname).is_some() {
                        info!("route removed: {}", hostname);
                        delta.added.retain(|r| r.hostname != hostname);
                        delta.changed.retain(|r| r.hostname != hostname);
                        delta.removed.push(hostname);
                    }
                }
            }
        }
        delta
    }

    /// The first hostname ever inserted during this process's lifetime.
    pub fn first_hostname(&self) -> Option<&str> {
        self.first_hostname.as_deref()
    }

    pub fn get(&self, hostname: &str) -> Option<&str> {
        self.routes.get(hostname).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// All routes, sorted by hostname.
    pub fn snapshot(&self) -> Vec<Route> {
        let mut routes: Vec<Route> = self
            .routes
            .iter()
            .map(|(hostname, upstream)| Route::new(hostname.as_str(), upstream.as_str()))
            .collect();
        routes.sort();
        routes
    }
}
