use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::proxy::DEFAULT_TIMEOUT;
use crate::render::RenderMode;
use crate::types::Environment;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Docker label carrying `hostname:port,...`.
    pub label: String,
    pub admin_url: String,
    /// Holds one subdirectory per environment.
    pub templates_dir: PathBuf,
    pub mode: RenderMode,
    /// Skips DNS based detection when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
    pub request_timeout_secs: u64,
    /// Pause between fragments of one pass.
    pub apply_delay_ms: u64,
    pub proxy: ProxyProcess,
}

/// The proxy binary started before reconciliation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyProcess {
    pub enabled: bool,
    pub command: String,
    pub args: Vec<String>,
    pub startup_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            label: "org.01-edu.https".into(),
            admin_url: "http://localhost:2019".into(),
            templates_dir: PathBuf::from("templates"),
            mode: RenderMode::Incremental,
            environment: None,
            request_timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            apply_delay_ms: 0,
            proxy: ProxyProcess::default(),
        }
    }
}

impl Default for ProxyProcess {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "caddy".into(),
            args: vec!["run".into()],
            startup_delay_ms: 1000,
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::figment()
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("ingressd.toml"))
            .merge(Json::file("ingressd.json"))
            .merge(Env::prefixed("INGRESSD_").split("__"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn apply_delay(&self) -> Option<Duration> {
        (self.apply_delay_ms > 0).then(|| Duration::from_millis(self.apply_delay_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_sources() {
        figment::Jail::expect_with(|_| {
            let cfg: Config = Config::figment().extract()?;
            assert_eq!(cfg.label, "org.01-edu.https");
            assert_eq!(cfg.admin_url, "http://localhost:2019");
            assert_eq!(cfg.mode, RenderMode::Incremental);
            assert_eq!(cfg.environment, None);
            assert_eq!(cfg.request_timeout(), DEFAULT_TIMEOUT);
            assert_eq!(cfg.request_timeout(), Duration::from_secs(15));
            assert_eq!(cfg.apply_delay(), None);
            assert_eq!(cfg.proxy.args, vec!["run".to_string()]);
            Ok(())
        });
    }

    #[test]
    fn file_and_env_overrides() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "ingressd.toml",
                r#"
                    mode = "snapshot"
                    templates_dir = "/etc/ingressd"

                    [proxy]
                    enabled = false
                "#,
            )?;
            jail.set_env("INGRESSD_ENVIRONMENT", "development");
            jail.set_env("INGRESSD_PROXY__STARTUP_DELAY_MS", "0");
            jail.set_env("INGRESSD_APPLY_DELAY_MS", "50");

            let cfg: Config = Config::figment().extract()?;
            assert_eq!(cfg.mode, RenderMode::Snapshot);
            assert_eq!(cfg.templates_dir, PathBuf::from("/etc/ingressd"));
            assert_eq!(cfg.environment, Some(Environment::Development));
            assert!(!cfg.proxy.enabled);
            assert_eq!(cfg.proxy.startup_delay_ms, 0);
            assert_eq!(cfg.apply_delay(), Some(Duration::from_millis(50)));
            Ok(())
        });
    }
}
