//! Template rendering.
//!
//! Placeholders are substituted literally; the result is then parsed as
//! JSON so a broken template fails here, naming the template, instead of
//! being rejected by the proxy with an opaque message.
//!
//! Two modes are supported:
//!
//! * [`RenderMode::Incremental`] posts one fragment per route template to
//!   the subtree derived from the template's name, and only for routes
//!   that were added. The root templates go out once, ahead of the first
//!   routes, and again whenever routes were removed or moved, since the
//!   admin API's `POST` can only append.
//! * [`RenderMode::Snapshot`] merges every route into the root document
//!   and posts the whole tree to the configuration root on every pass.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::state::Delta;
use crate::templates::{Template, TemplateSet};
use crate::types::{ConfigFragment, Route};

pub const DOMAIN_PLACEHOLDER: &str = "{{DOMAIN}}";
pub const CONTAINER_PLACEHOLDER: &str = "{{CONTAINER}}";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    #[default]
    Incremental,
    Snapshot,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template {template} did not render to valid JSON: {source}")]
    InvalidJson {
        template: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("template {template} cannot be placed at /{path}")]
    Conflict { template: String, path: String },
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Replaces every placeholder occurrence in `body`.
pub fn substitute(body: &str, route: &Route) -> String {
    body.replace(DOMAIN_PLACEHOLDER, &route.hostname)
        .replace(CONTAINER_PLACEHOLDER, &route.upstream)
}

fn parse_rendered(template: &Template, rendered: &str) -> Result<Value, RenderError> {
    serde_json::from_str(rendered).map_err(|source| RenderError::InvalidJson {
        template: template.name.clone(),
        source,
    })
}

/// Root skeleton fragments, unmodified.
pub fn render_root(templates: &TemplateSet) -> Result<Vec<ConfigFragment>, RenderError> {
    templates
        .root
        .iter()
        .map(|template| {
            parse_rendered(template, &template.body)?;
            Ok(ConfigFragment {
                api_path: template.api_path.clone(),
                body: template.body.clone().into_bytes(),
            })
        })
        .collect()
}

/// One fragment per route template for a single route.
pub fn render_route(
    route: &Route,
    templates: &TemplateSet,
) -> Result<Vec<ConfigFragment>, RenderError> {
    templates
        .routes
        .iter()
        .map(|template| {
            let rendered = substitute(&template.body, route);
            parse_rendered(template, &rendered)?;
            Ok(ConfigFragment {
                api_path: template.api_path.clone(),
                body: rendered.into_bytes(),
            })
        })
        .collect()
}

/// The whole routing table as a single root fragment.
///
/// `routes` must already be sorted; the output is then byte-for-byte
/// reproducible.
pub fn render_snapshot(
    routes: &[Route],
    templates: &TemplateSet,
) -> Result<ConfigFragment, RenderError> {
    let mut tree = Value::Object(Map::new());
    for template in &templates.root {
        merge(&mut tree, parse_rendered(template, &template.body)?);
    }
    for route in routes {
        for template in &templates.routes {
            let value = parse_rendered(template, &substitute(&template.body, route))?;
            append_at(&mut tree, &template.api_path, value).ok_or_else(|| {
                RenderError::Conflict {
                    template: template.name.clone(),
                    path: template.api_path.clone(),
                }
            })?;
        }
    }
    Ok(ConfigFragment {
        api_path: String::new(),
        body: serde_json::to_vec(&tree)?,
    })
}

/// Fragments for one reconciliation pass.
///
/// `first` is set on the pass that classified the environment.
pub fn render_pass(
    mode: RenderMode,
    delta: &Delta,
    first: bool,
    snapshot: &[Route],
    templates: &TemplateSet,
) -> Result<Vec<ConfigFragment>, RenderError> {
    match mode {
        RenderMode::Snapshot => Ok(vec![render_snapshot(snapshot, templates)?]),
        RenderMode::Incremental if first || delta.needs_rebuild() => {
            let mut fragments = render_root(templates)?;
            for route in snapshot {
                fragments.extend(render_route(route, templates)?);
            }
            Ok(fragments)
        }
        RenderMode::Incremental => {
            let mut added = delta.added.clone();
            added.sort();
            let mut fragments = Vec::new();
            for route in &added {
                fragments.extend(render_route(route, templates)?);
            }
            Ok(fragments)
        }
    }
}

fn merge(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(dst), Value::Object(src)) => {
            for (key, value) in src {
                match dst.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        dst.insert(key, value);
                    }
                }
            }
        }
        (dst, src) => *dst = src,
    }
}

/// Appends `value` to the array at `path`, the way a `POST` to that
/// admin path would. Missing objects along the way are created and a
/// missing leaf becomes a one-element array.
fn append_at(tree: &mut Value, path: &str, value: Value) -> Option<()> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let (leaf, parents) = segments.split_last()?;

    let mut node = tree;
    for segment in parents {
        node = match node {
            Value::Object(map) => map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    let target = match node {
        Value::Object(map) => map
            .entry(leaf.to_string())
            .or_insert_with(|| Value::Array(Vec::new())),
        Value::Array(items) => items.get_mut(leaf.parse::<usize>().ok()?)?,
        _ => return None,
    };
    match target {
        Value::Array(items) => {
            items.push(value);
            Some(())
        }
        _ => None,
    }
}
