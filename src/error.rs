use thiserror::Error;

use crate::environment::ResolveError;
use crate::proxy::ProxyError;
use crate::render::RenderError;
use crate::runtime::RuntimeError;
use crate::supervisor::SupervisorError;
use crate::templates::TemplateError;

/// Every condition that stops the synchronizer.
///
/// Malformed metadata never shows up here: it is logged and skipped by
/// the parser.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("environment detection failed: {0}")]
    Resolve(#[from] ResolveError),
    #[error("template load failed: {0}")]
    Template(#[from] TemplateError),
    #[error("render failed: {0}")]
    Render(#[from] RenderError),
    #[error("proxy rejected configuration: {0}")]
    Proxy(#[from] ProxyError),
    #[error("container runtime failed: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("proxy process failed: {0}")]
    Supervisor(#[from] SupervisorError),
    #[error("container event stream ended")]
    StreamEnded,
}
