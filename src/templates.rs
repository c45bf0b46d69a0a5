//! Per-environment configuration templates.
//!
//! Templates live in `<templates_dir>/<environment>/` as JSON documents.
//! A file's name encodes the admin API subtree it targets:
//!
//! * the extension is dropped,
//! * everything from the first `-` on is dropped, so several files can
//!   feed the same subtree (`...routes-app.json`, `...routes-git.json`),
//! * the remaining dots become path separators.
//!
//! `base.json` (and any `base-*.json`) targets the configuration root.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use thiserror::Error;

use crate::types::Environment;

const TEMPLATE_EXTENSION: &str = "json";
const ROOT_TEMPLATE: &str = "base";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("cannot read template directory {path}: {source}")]
    Dir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot read template {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no route templates found in {0}")]
    Empty(PathBuf),
    #[error("no base template found in {0}")]
    MissingRoot(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub name: String,
    pub api_path: String,
    pub body: String,
}

impl Template {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            api_path: derive_api_path(&name),
            name,
            body: body.into(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.api_path.is_empty()
    }
}

/// The templates governing one environment, each list in file-name order.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    /// Skeleton documents posted to the configuration root.
    pub root: Vec<Template>,
    /// Per-route documents carrying `{{DOMAIN}}` / `{{CONTAINER}}`.
    pub routes: Vec<Template>,
}

impl TemplateSet {
    pub fn from_templates(templates: impl IntoIterator<Item = Template>) -> Self {
        let mut set = TemplateSet::default();
        let mut templates: Vec<Template> = templates.into_iter().collect();
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        for template in templates {
            if template.is_root() {
                set.root.push(template);
            } else {
                set.routes.push(template);
            }
        }
        set
    }

    /// Loads `<dir>/<env>/*.json`.
    pub fn load(dir: &Path, env: Environment) -> Result<Self, TemplateError> {
        let env_dir = dir.join(env.as_str());
        let entries = fs::read_dir(&env_dir).map_err(|source| TemplateError::Dir {
            path: env_dir.clone(),
            source,
        })?;

        let mut templates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| TemplateError::Dir {
                path: env_dir.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(TEMPLATE_EXTENSION)
            {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let body = fs::read_to_string(&path).map_err(|source| TemplateError::File {
                path: path.clone(),
                source,
            })?;
            let template = Template::new(name, body);
            debug!("template {} -> /config/{}", template.name, template.api_path);
            templates.push(template);
        }

        let set = Self::from_templates(templates);
        if set.routes.is_empty() {
            return Err(TemplateError::Empty(env_dir));
        }
        // Rebuild passes reset the tree through the root templates.
        if set.root.is_empty() {
            return Err(TemplateError::MissingRoot(env_dir));
        }
        info!(
            "loaded {} templates ({} root) from {}",
            set.root.len() + set.routes.len(),
            set.root.len(),
            env_dir.display()
        );
        Ok(set)
    }
}

/// Maps a template file name to its admin API path.
pub fn derive_api_path(file_name: &str) -> String {
    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name);
    let subtree = stem.split('-').next().unwrap_or_default();
    if subtree == ROOT_TEMPLATE {
        return String::new();
    }
    subtree.replace('.', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_from_route_template() {
        assert_eq!(
            derive_api_path("apps.http.servers.srv0.routes-app.json"),
            "apps/http/servers/srv0/routes"
        );
        assert_eq!(
            derive_api_path("apps.tls.automation.policies.0.subjects-gitea.json"),
            "apps/tls/automation/policies/0/subjects"
        );
        assert_eq!(derive_api_path("apps.http.servers.json"), "apps/http/servers");
    }

    #[test]
    fn root_templates() {
        assert_eq!(derive_api_path("base.json"), "");
        assert_eq!(derive_api_path("base-tls.json"), "");
        assert_eq!(derive_api_path("-orphan.json"), "");
    }

    #[test]
    fn loads_environment_directory() {
        let dir = tempfile::tempdir().unwrap();
        let env_dir = dir.path().join("development");
        fs::create_dir(&env_dir).unwrap();
        fs::write(env_dir.join("base.json"), "{}").unwrap();
        fs::write(env_dir.join("apps.http.servers.srv0.routes-b.json"), "{}").unwrap();
        fs::write(env_dir.join("apps.http.servers.srv0.routes-a.json"), "{}").unwrap();
        fs::write(env_dir.join("README.md"), "ignored").unwrap();

        let set = TemplateSet::load(dir.path(), Environment::Development).unwrap();
        assert_eq!(set.root.len(), 1);
        let names: Vec<&str> = set.routes.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "apps.http.servers.srv0.routes-a.json",
                "apps.http.servers.srv0.routes-b.json"
            ]
        );
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            TemplateSet::load(dir.path(), Environment::Production),
            Err(TemplateError::Dir { .. })
        ));
    }

    #[test]
    fn directory_without_route_templates_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let env_dir = dir.path().join("production");
        fs::create_dir(&env_dir).unwrap();
        fs::write(env_dir.join("base.json"), "{}").unwrap();
        assert!(matches!(
            TemplateSet::load(dir.path(), Environment::Production),
            Err(TemplateError::Empty(_))
        ));
    }

    #[test]
    fn directory_without_base_template_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let env_dir = dir.path().join("production");
        fs::create_dir(&env_dir).unwrap();
        fs::write(env_dir.join("apps.http.servers.srv0.routes-app.json"), "{}").unwrap();
        assert!(matches!(
            TemplateSet::load(dir.path(), Environment::Production),
            Err(TemplateError::MissingRoot(_))
        ));
    }
}
