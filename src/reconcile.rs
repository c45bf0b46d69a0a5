//! Reconciliation loop.
//!
//! Subscribes to container events, seeds the desired state from the
//! containers already running, then handles events one at a time. Each
//! event is fully rendered and applied before the next one is read, so
//! two events for the same hostname can never race.
//!
//! Every error that reaches this module is fatal and is returned to the
//! caller; nothing is retried here.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::{debug, info};
use tokio::time::sleep;

use crate::config::Config;
use crate::environment::{classify, EnvironmentGate, HostResolver};
use crate::error::SyncError;
use crate::metadata::parse;
use crate::proxy::ConfigSink;
use crate::render::{render_pass, RenderMode};
use crate::runtime::{ContainerRuntime, Subscription};
use crate::state::{Delta, DesiredState};
use crate::templates::TemplateSet;
use crate::types::{Environment, LifecycleEvent};

#[derive(Debug, Clone)]
pub struct Settings {
    pub label: String,
    pub mode: RenderMode,
    pub templates_dir: PathBuf,
    /// Forces the environment instead of resolving the first hostname.
    pub environment: Option<Environment>,
    pub apply_delay: Option<Duration>,
}

impl From<&Config> for Settings {
    fn from(cfg: &Config) -> Self {
        Self {
            label: cfg.label.clone(),
            mode: cfg.mode,
            templates_dir: cfg.templates_dir.clone(),
            environment: cfg.environment,
            apply_delay: cfg.apply_delay(),
        }
    }
}

pub struct Reconciler<S, H> {
    settings: Settings,
    sink: S,
    resolver: H,
    state: DesiredState,
    gate: EnvironmentGate,
    templates: Option<TemplateSet>,
    passes: u64,
}

impl<S, H> Reconciler<S, H>
where
    S: ConfigSink,
    H: HostResolver,
{
    pub fn new(settings: Settings, sink: S, resolver: H) -> Self {
        Self {
            settings,
            sink,
            resolver,
            state: DesiredState::new(),
            gate: EnvironmentGate::Unclassified,
            templates: None,
            passes: 0,
        }
    }

    pub fn state(&self) -> &DesiredState {
        &self.state
    }

    pub fn environment(&self) -> Option<Environment> {
        self.gate.environment()
    }

    /// Number of reconciliation passes started so far.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Runs until a fatal error occurs.
    pub async fn run<R>(&mut self, runtime: &R) -> Result<(), SyncError>
    where
        R: ContainerRuntime + ?Sized,
    {
        // Subscribe before listing so nothing started in between is missed.
        let subscription = runtime.subscribe(&self.settings.label).await?;
        self.seed(runtime).await?;
        self.consume(subscription).await
    }

    /// Loads every running labelled container and applies the result once.
    pub async fn seed<R>(&mut self, runtime: &R) -> Result<(), SyncError>
    where
        R: ContainerRuntime + ?Sized,
    {
        let containers = runtime.list_running(&self.settings.label).await?;
        let mut mutations = Vec::new();
        for container in containers.iter().filter(|c| c.running) {
            mutations.extend(parse(&container.name, &container.metadata, true));
        }
        let delta = self.state.apply(mutations);
        self.reconcile(&delta).await
    }

    /// Handles events in delivery order until the subscription fails.
    pub async fn consume(&mut self, mut subscription: Subscription) -> Result<(), SyncError> {
        loop {
            tokio::select! {
                biased;
                Some(err) = subscription.errors.recv() => return Err(err.into()),
                event = subscription.events.recv() => match event {
                    Some(event) => self.handle_event(event).await?,
                    None => return Err(SyncError::StreamEnded),
                },
            }
        }
    }

    pub async fn handle_event(&mut self, event: LifecycleEvent) -> Result<(), SyncError> {
        info!("container {} {}", event.name, event.status);
        let delta = self
            .state
            .apply(parse(&event.name, &event.metadata, event.is_up()));
        self.reconcile(&delta).await
    }

    /// Classifies the environment on first use, then renders and applies.
    async fn reconcile(&mut self, delta: &Delta) -> Result<(), SyncError> {
        self.passes += 1;

        let first = match self.gate {
            EnvironmentGate::Classified(_) => false,
            EnvironmentGate::Unclassified => {
                if self.state.is_empty() {
                    debug!("nothing to route yet");
                    return Ok(());
                }
                let Some(hostname) = self.state.first_hostname().map(str::to_string) else {
                    return Ok(());
                };
                let env = match self.settings.environment {
                    Some(env) => env,
                    None => classify(&self.resolver, &hostname).await?,
                };
                let templates = TemplateSet::load(&self.settings.templates_dir, env)?;
                info!("environment: {}", env);
                self.templates = Some(templates);
                self.gate.classify_once(env)
            }
        };
        let Some(templates) = self.templates.as_ref() else {
            return Ok(());
        };

        let started = Instant::now();
        let snapshot = self.state.snapshot();
        let fragments = render_pass(self.settings.mode, delta, first, &snapshot, templates)?;
        for (i, fragment) in fragments.iter().enumerate() {
            if i > 0 {
                if let Some(delay) = self.settings.apply_delay {
                    sleep(delay).await;
                }
            }
            self.sink.apply(fragment).await?;
        }

        info!(
            "config loaded in {:?} ({} fragments):",
            started.elapsed(),
            fragments.len()
        );
        for route in &snapshot {
            info!("  {} => {}", route.hostname, route.upstream);
        }
        Ok(())
    }
}
