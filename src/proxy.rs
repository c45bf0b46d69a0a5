//! Caddy admin API client.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{header, Client, StatusCode};
use thiserror::Error;

use crate::types::ConfigFragment;

/// Timeout applied to every admin API request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("POST {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("POST {url} returned {status}: {body}")]
    Rejected {
        url: String,
        status: StatusCode,
        body: String,
    },
}

/// Destination for rendered configuration.
#[async_trait]
pub trait ConfigSink: Send + Sync {
    async fn apply(&self, fragment: &ConfigFragment) -> Result<(), ProxyError>;
}

pub struct CaddyAdmin {
    client: Client,
    base_url: String,
}

impl CaddyAdmin {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProxyError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ProxyError::Client)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `{base}/config/{api_path}`; the root path keeps the trailing slash.
    pub fn config_url(&self, api_path: &str) -> String {
        format!("{}/config/{}", self.base_url, api_path.trim_start_matches('/'))
    }
}

#[async_trait]
impl ConfigSink for CaddyAdmin {
    async fn apply(&self, fragment: &ConfigFragment) -> Result<(), ProxyError> {
        let url = self.config_url(&fragment.api_path);
        debug!("POST {} ({} bytes)", url, fragment.body.len());

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(fragment.body.clone())
            .send()
            .await
            .map_err(|source| ProxyError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ProxyError::Rejected { url, status, body });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::{HeaderMap, Uri};
    use axum::Router;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    type Received = Arc<Mutex<Vec<(String, String, String)>>>;

    async fn record(
        State((received, status)): State<(Received, u16)>,
        uri: Uri,
        headers: HeaderMap,
        body: String,
    ) -> (axum::http::StatusCode, &'static str) {
        let content_type = headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        received
            .lock()
            .unwrap()
            .push((uri.path().to_string(), content_type, body));
        (
            axum::http::StatusCode::from_u16(status).unwrap(),
            "unknown module: apps.nope",
        )
    }

    async fn fake_admin(status: u16) -> (String, Received) {
        let received: Received = Arc::default();
        let app = Router::new()
            .fallback(record)
            .with_state((received.clone(), status));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), received)
    }

    #[test]
    fn builds_config_urls() {
        let admin = CaddyAdmin::new("http://localhost:2019/", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(admin.config_url(""), "http://localhost:2019/config/");
        assert_eq!(
            admin.config_url("apps/http/servers/srv0/routes"),
            "http://localhost:2019/config/apps/http/servers/srv0/routes"
        );
    }

    #[tokio::test]
    async fn posts_json_fragment() {
        let (url, received) = fake_admin(200).await;
        let admin = CaddyAdmin::new(&url, DEFAULT_TIMEOUT).unwrap();
        let fragment = ConfigFragment {
            api_path: "apps/http/servers/srv0/routes".into(),
            body: br#"{"a":1}"#.to_vec(),
        };
        admin.apply(&fragment).await.unwrap();

        let received = received.lock().unwrap();
        assert_eq!(
            received.as_slice(),
            &[(
                "/config/apps/http/servers/srv0/routes".to_string(),
                "application/json".to_string(),
                r#"{"a":1}"#.to_string()
            )]
        );
    }

    #[tokio::test]
    async fn non_ok_status_is_rejected_with_body() {
        let (url, _) = fake_admin(400).await;
        let admin = CaddyAdmin::new(&url, DEFAULT_TIMEOUT).unwrap();
        let fragment = ConfigFragment {
            api_path: String::new(),
            body: b"{}".to_vec(),
        };
        match admin.apply(&fragment).await {
            Err(ProxyError::Rejected { status, body, .. }) => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(body, "unknown module: apps.nope");
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn created_is_not_ok() {
        let (url, _) = fake_admin(201).await;
        let admin = CaddyAdmin::new(&url, DEFAULT_TIMEOUT).unwrap();
        let fragment = ConfigFragment {
            api_path: String::new(),
            body: b"{}".to_vec(),
        };
        assert!(matches!(
            admin.apply(&fragment).await,
            Err(ProxyError::Rejected { .. })
        ));
    }

    #[tokio::test]
    async fn unreachable_admin_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let admin = CaddyAdmin::new(&format!("http://{}", addr), DEFAULT_TIMEOUT).unwrap();
        let fragment = ConfigFragment {
            api_path: String::new(),
            body: b"{}".to_vec(),
        };
        assert!(matches!(
            admin.apply(&fragment).await,
            Err(ProxyError::Transport { .. })
        ));
    }
}
