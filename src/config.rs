use serde_derive::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use toml;
use tracing::debug;

use crate::error::{GeneratorError, Result};
use crate::types::{ArtifactKind, DerivedForms};

pub const CONFIG_FILE_NAME: &str = "crud-generate.toml";

/// Project-level settings, read from `crud-generate.toml` when present.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Prefix routers are mounted under in the host application.
    pub api_prefix: String,
    /// Comment line after which router registrations are inserted.
    pub registration_anchor: String,
    /// Lines of content shown per artifact in dry-run output.
    pub preview_lines: usize,
    /// Project-relative paths write mode may replace.
    pub allow_overwrite: Vec<PathBuf>,
    pub layout: Layout,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_prefix: "/api/v1".into(),
            registration_anchor: "# crud-generate: register routers".into(),
            preview_lines: 12,
            allow_overwrite: Vec::new(),
            layout: Layout::default(),
        }
    }
}

/// Where each artifact kind lives, relative to the project root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Layout {
    pub models_dir: PathBuf,
    pub services_dir: PathBuf,
    pub schemas_dir: PathBuf,
    pub api_dir: PathBuf,
    pub tests_dir: PathBuf,
    pub migrations_dir: PathBuf,
    pub router_host: PathBuf,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            models_dir: "app/models".into(),
            services_dir: "app/services".into(),
            schemas_dir: "app/schemas".into(),
            api_dir: "app/api".into(),
            tests_dir: "tests".into(),
            migrations_dir: "alembic/versions".into(),
            router_host: "app/main.py".into(),
        }
    }
}

impl Layout {
    /// Deterministic path of an artifact. Only migrations depend on the revision id.
    pub fn artifact_path(&self, kind: ArtifactKind, forms: &DerivedForms, revision_id: &str) -> PathBuf {
        match kind {
            ArtifactKind::Model => self.models_dir.join(format!("{}.py", forms.singular)),
            ArtifactKind::Service => self
                .services_dir
                .join(format!("{}_service.py", forms.singular)),
            ArtifactKind::Schema => self
                .schemas_dir
                .join(format!("{}_schemas.py", forms.singular)),
            ArtifactKind::Router => self.api_dir.join(format!("{}.py", forms.plural)),
            ArtifactKind::ApiTest => self.tests_dir.join(format!("test_{}_api.py", forms.plural)),
            ArtifactKind::ServiceTest => self
                .tests_dir
                .join(format!("test_{}_service.py", forms.plural)),
            ArtifactKind::Migration => self.migrations_dir.join(format!(
                "{}_create_{}_table.py",
                revision_id, forms.table_name
            )),
        }
    }

    /// Dotted import path of a module under the project root, e.g. `app.models.product`.
    pub fn module_path(&self, dir: &Path, module: &str) -> String {
        let mut parts: Vec<String> = dir
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect();
        parts.push(module.to_string());
        parts.join(".")
    }
}

pub fn load_config(root: &Path) -> Result<GeneratorConfig> {
    let path = root.join(CONFIG_FILE_NAME);

    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        return Ok(GeneratorConfig::default());
    }

    let raw = fs::read_to_string(&path).map_err(|err| GeneratorError::io(&path, err))?;
    let config: GeneratorConfig = toml::from_str(&raw).map_err(|err| GeneratorError::Config {
        path: path.clone(),
        message: err.message().to_string(),
    })?;

    debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Write the default configuration under `root`. Never replaces an existing file.
pub fn write_default_config(root: &Path) -> Result<PathBuf> {
    let path = root.join(CONFIG_FILE_NAME);

    if path.exists() {
        return Err(GeneratorError::PathConflict { path });
    }

    let data = toml::to_string_pretty(&GeneratorConfig::default()).map_err(|err| {
        GeneratorError::Config {
            path: path.clone(),
            message: err.to_string(),
        }
    })?;

    fs::write(&path, data).map_err(|err| GeneratorError::io(&path, err))?;
    Ok(path)
}

/// Explicit `--output-dir`, else `./` or `./backend` when it holds an `app/` directory.
pub fn resolve_project_root(output_dir: Option<&Path>, cwd: &Path) -> Result<PathBuf> {
    if let Some(dir) = output_dir {
        return Ok(dir.to_path_buf());
    }

    [cwd.to_path_buf(), cwd.join("backend")]
        .into_iter()
        .find(|candidate| candidate.join("app").is_dir())
        .ok_or_else(|| GeneratorError::ProjectRootNotFound {
            searched: cwd.to_path_buf(),
        })
}
