//! ingressd entry point.

use log::{error, info};

use ingressd::config::Config;
use ingressd::environment::SystemResolver;
use ingressd::error::SyncError;
use ingressd::proxy::CaddyAdmin;
use ingressd::reconcile::{Reconciler, Settings};
use ingressd::runtime::DockerRuntime;
use ingressd::supervisor::spawn_proxy;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    // Load configuration
    let cfg = Config::load()?;
    info!("Starting ingressd with config: {:?}", cfg);

    let runtime = DockerRuntime::connect()?;

    // The child is killed when this handle drops on exit.
    let _proxy = if cfg.proxy.enabled {
        Some(spawn_proxy(&cfg.proxy).await.map_err(SyncError::from)?)
    } else {
        None
    };

    let sink = CaddyAdmin::new(&cfg.admin_url, cfg.request_timeout())?;
    let resolver = SystemResolver::from_system_conf()?;
    let mut reconciler = Reconciler::new(Settings::from(&cfg), sink, resolver);

    // Only returns on a fatal error.
    let result = reconciler.run(&runtime).await;
    if let Err(e) = &result {
        error!("Reconciliation stopped: {}", e);
    }
    result.map_err(Into::into)
}
