use super::{ContainerRuntime, RuntimeError, Subscription};
use crate::types::{ContainerDescriptor, LifecycleEvent};
use async_trait::async_trait;
use bollard::container::ListContainersOptions;
use bollard::models::EventMessage;
use bollard::system::EventsOptions;
use bollard::Docker;
use futures_util::stream::StreamExt;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use tokio::sync::mpsc;

const EVENT_BUFFER: usize = 128;

pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to the local Docker daemon (unix socket on Linux).
    pub fn connect() -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker })
    }
}

fn filters(pairs: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
        .collect()
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn subscribe(&self, label: &str) -> Result<Subscription, RuntimeError> {
        let opts = EventsOptions::<String> {
            filters: filters(&[
                ("label", [label].as_slice()),
                ("type", ["container"].as_slice()),
                ("event", ["start", "die", "oom"].as_slice()),
            ]),
            ..Default::default()
        };

        let (events_tx, events) = mpsc::channel(EVENT_BUFFER);
        let (errors_tx, errors) = mpsc::channel(1);
        let docker = self.docker.clone();
        let label = label.to_string();

        tokio::spawn(async move {
            let mut stream = docker.events(Some(opts));
            info!("Listening for Docker events on label {}...", label);
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(message) => {
                        let Some(event) = to_lifecycle_event(message, &label) else {
                            continue;
                        };
                        debug!("Container event: {} for {}", event.status, event.name);
                        if events_tx.send(event).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        error!("Error in Docker event stream: {}", e);
                        let _ = errors_tx.send(e.into()).await;
                        return;
                    }
                }
            }
            warn!("Docker event stream ended");
        });

        Ok(Subscription { events, errors })
    }

    async fn list_running(&self, label: &str) -> Result<Vec<ContainerDescriptor>, RuntimeError> {
        let opts = ListContainersOptions::<String> {
            all: false,
            filters: filters(&[("label", [label].as_slice())]),
            ..Default::default()
        };
        let containers = self.docker.list_containers(Some(opts)).await?;

        let mut descriptors = Vec::with_capacity(containers.len());
        for c in containers {
            let Some(name) = c
                .names
                .as_ref()
                .and_then(|n| n.first())
                .map(|n| n.trim_start_matches('/').to_string())
            else {
                warn!("Skipping unnamed container {:?}", c.id);
                continue;
            };
            let metadata = c
                .labels
                .as_ref()
                .and_then(|labels| labels.get(label))
                .cloned()
                .unwrap_or_default();
            descriptors.push(ContainerDescriptor {
                name,
                metadata,
                running: c.state.as_deref() == Some("running"),
            });
        }
        info!("Initial scan found {} labelled containers", descriptors.len());
        Ok(descriptors)
    }
}

fn to_lifecycle_event(message: EventMessage, label: &str) -> Option<LifecycleEvent> {
    let status = message.action?;
    let mut attributes = message.actor?.attributes?;
    let name = attributes.remove("name")?;
    let metadata = attributes.remove(label).unwrap_or_default();
    Some(LifecycleEvent {
        status,
        name,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::EventActor;

    const LABEL: &str = "org.01-edu.https";

    fn message(action: &str, attributes: &[(&str, &str)]) -> EventMessage {
        EventMessage {
            action: Some(action.to_string()),
            actor: Some(EventActor {
                id: Some("abc123".to_string()),
                attributes: Some(
                    attributes
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                ),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn maps_event_attributes() {
        let event = to_lifecycle_event(
            message("die", &[("name", "web2"), (LABEL, "a.com:80,b.com:81")]),
            LABEL,
        )
        .unwrap();
        assert_eq!(
            event,
            LifecycleEvent {
                status: "die".into(),
                name: "web2".into(),
                metadata: "a.com:80,b.com:81".into(),
            }
        );
        assert!(!event.is_up());
    }

    #[test]
    fn event_without_name_is_dropped() {
        assert!(to_lifecycle_event(message("start", &[(LABEL, "a.com:80")]), LABEL).is_none());
    }

    #[test]
    fn builds_filter_map() {
        let map = filters(&[
            ("label", [LABEL].as_slice()),
            ("event", ["start", "die"].as_slice()),
        ]);
        assert_eq!(map["label"], vec![LABEL.to_string()]);
        assert_eq!(map["event"], vec!["start".to_string(), "die".to_string()]);
    }
}
