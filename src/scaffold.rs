//! Orchestration: validate the request, read the project, render everything,
//! then either preview or write.
//!
//! Input errors are raised before the project directory is looked at, so a bad
//! field spec or entity name never depends on filesystem state.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::artifacts::{generate_artifacts, RenderContext};
use crate::config::{load_config, resolve_project_root, GeneratorConfig};
use crate::entity_builder::{annotate_fk_targets, build_entity, EntityOptions};
use crate::error::{GeneratorError, Result};
use crate::field_parser::parse_fields;
use crate::file_emitter::{self, WriteReport};
use crate::migration_chain::{new_revision_id, plan_revision, MigrationChain};
use crate::router_registration::{plan_patch, HostPatch};
use crate::type_registry::TypeRegistry;
use crate::types::{ArtifactSet, BehaviorFlags, Domain, EntityDefinition, MigrationRevision};

/// One `generate` invocation.
#[derive(Clone, Debug, Default)]
pub struct GenerateRequest {
    pub entity_name: String,
    pub fields: String,
    pub domain: Domain,
    pub behavior: BehaviorFlags,
    pub output_dir: Option<PathBuf>,
    pub dry_run: bool,
    /// Added to the configured `allow_overwrite` list.
    pub allow_overwrite: Vec<PathBuf>,
    pub preview_lines: Option<usize>,
}

/// How the router will be registered in the host file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Registration {
    Planned { host: PathBuf, patch: HostPatch },
    /// Only produced in dry-run mode, when there is no host file to inspect.
    Unavailable { host: PathBuf, reason: String },
}

/// Everything a run will do, computed without touching the disk.
#[derive(Clone, Debug)]
pub struct ScaffoldPlan {
    pub root: PathBuf,
    /// False when a dry run found no project and previews against an empty one.
    pub project_found: bool,
    pub config: GeneratorConfig,
    pub entity: EntityDefinition,
    pub revision: MigrationRevision,
    pub artifacts: ArtifactSet,
    pub registration: Registration,
}

impl ScaffoldPlan {
    pub fn context(&self) -> RenderContext<'_> {
        RenderContext::new(&self.entity, TypeRegistry::standard(), &self.config)
    }

    pub fn migrations_dir(&self) -> PathBuf {
        self.root.join(&self.config.layout.migrations_dir)
    }

    pub fn host_path(&self) -> PathBuf {
        self.root.join(&self.config.layout.router_host)
    }
}

#[derive(Debug)]
pub enum Outcome {
    Previewed(ScaffoldPlan),
    Written(ScaffoldPlan, WriteReport),
}

pub fn plan(request: &GenerateRequest, cwd: &Path) -> Result<ScaffoldPlan> {
    plan_with(request, cwd, new_revision_id(), Utc::now())
}

/// [`plan`] with a fixed revision id and creation date.
pub fn plan_with(
    request: &GenerateRequest,
    cwd: &Path,
    revision_id: String,
    create_date: DateTime<Utc>,
) -> Result<ScaffoldPlan> {
    let fields = parse_fields(&request.fields)?;
    let entity = build_entity(
        &request.entity_name,
        fields,
        &EntityOptions {
            domain: request.domain,
            behavior: request.behavior,
            known_tables: None,
        },
    )?;

    let (root, project_found) = match resolve_project_root(request.output_dir.as_deref(), cwd) {
        Ok(root) => (root, true),
        Err(err @ GeneratorError::ProjectRootNotFound { .. }) if request.dry_run => {
            warn!(%err, "previewing against an empty project");
            (cwd.to_path_buf(), false)
        }
        Err(err) => return Err(err),
    };

    let mut config = if project_found {
        load_config(&root)?
    } else {
        GeneratorConfig::default()
    };
    config.allow_overwrite.extend(request.allow_overwrite.iter().cloned());
    if let Some(lines) = request.preview_lines {
        config.preview_lines = lines;
    }

    let chain = if project_found {
        MigrationChain::discover(&root.join(&config.layout.migrations_dir))?
    } else {
        MigrationChain::empty()
    };
    let entity = annotate_fk_targets(entity, &chain.known_tables());

    let registry = TypeRegistry::standard();
    let revision = plan_revision(
        &entity,
        chain.head().map(str::to_string),
        revision_id,
        create_date,
        registry,
    );
    let artifacts = generate_artifacts(&entity, &revision, registry, &config);

    let host = root.join(&config.layout.router_host);
    let registration = {
        let ctx = RenderContext::new(&entity, registry, &config);
        match fs::read_to_string(&host) {
            Ok(source) => Registration::Planned {
                patch: plan_patch(&ctx, &host, &source)?,
                host,
            },
            Err(err) if request.dry_run => Registration::Unavailable {
                reason: err.to_string(),
                host,
            },
            Err(err) => return Err(GeneratorError::io(&host, err)),
        }
    };

    info!(
        entity = %entity.entity_name(),
        revision = %revision.revision_id,
        down_revision = revision.down_revision.as_deref().unwrap_or("<none>"),
        "planned scaffold"
    );

    Ok(ScaffoldPlan {
        root,
        project_found,
        config,
        entity,
        revision,
        artifacts,
        registration,
    })
}

/// Plan, then preview to `out` or write to disk.
pub fn run(request: &GenerateRequest, cwd: &Path, out: &mut dyn Write) -> Result<Outcome> {
    let plan = plan(request, cwd)?;

    if request.dry_run {
        file_emitter::print_manifest(&plan, out)?;
        return Ok(Outcome::Previewed(plan));
    }

    let report = file_emitter::write_plan(&plan)?;
    file_emitter::print_report(&plan, &report, out)?;
    Ok(Outcome::Written(plan, report))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    pub(crate) const HOST: &str =
        "from fastapi import FastAPI\n\napp = FastAPI()\n\n# crud-generate: register routers\n";

    /// A minimal project: `app/main.py` with the anchor and an empty versions dir.
    pub(crate) fn project() -> TempDir {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("app")).unwrap();
        fs::create_dir_all(tmp.path().join("alembic/versions")).unwrap();
        fs::write(tmp.path().join("app/main.py"), HOST).unwrap();
        tmp
    }

    pub(crate) fn request(name: &str, fields: &str) -> GenerateRequest {
        GenerateRequest {
            entity_name: name.to_string(),
            fields: fields.to_string(),
            ..GenerateRequest::default()
        }
    }

    pub(crate) fn fixed_plan(request: &GenerateRequest, cwd: &Path) -> Result<ScaffoldPlan> {
        plan_with(
            request,
            cwd,
            "0a1b2c3d4e5f".to_string(),
            Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap(),
        )
    }

    #[test]
    fn plans_against_a_project() {
        let tmp = project();
        fs::write(
            tmp.path().join("alembic/versions/aaa_create_users_table.py"),
            "revision = 'aaa'\ndown_revision = None\n\ndef upgrade():\n    op.create_table('users')\n",
        )
        .unwrap();

        let plan = fixed_plan(&request("task", "owner_id:fk:users,team_id:fk"), tmp.path()).unwrap();

        assert!(plan.project_found);
        assert_eq!(plan.revision.down_revision.as_deref(), Some("aaa"));
        assert_eq!(
            plan.artifacts.migration.path,
            PathBuf::from("alembic/versions/0a1b2c3d4e5f_create_tasks_table.py")
        );
        assert_eq!(plan.entity.notes().len(), 1);
        assert!(matches!(
            plan.registration,
            Registration::Planned {
                patch: HostPatch::Insert { .. },
                ..
            }
        ));
    }

    #[test]
    fn input_errors_come_before_project_lookup() {
        let tmp = TempDir::new().unwrap();

        let err = fixed_plan(&request("class", "name:str"), tmp.path()).unwrap_err();
        assert_eq!(err.exit_code(), 1);

        let err = fixed_plan(&request("product", "price:dollars"), tmp.path()).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn write_mode_needs_a_project() {
        let tmp = TempDir::new().unwrap();

        let err = fixed_plan(&request("product", "name:str"), tmp.path()).unwrap_err();
        assert!(matches!(err, GeneratorError::ProjectRootNotFound { .. }));
    }

    #[test]
    fn dry_run_degrades_to_an_empty_project() {
        let tmp = TempDir::new().unwrap();
        let request = GenerateRequest {
            dry_run: true,
            ..request("product", "name:str")
        };

        let plan = fixed_plan(&request, tmp.path()).unwrap();

        assert!(!plan.project_found);
        assert_eq!(plan.revision.down_revision, None);
        assert!(matches!(plan.registration, Registration::Unavailable { .. }));
    }

    #[test]
    fn backend_subdirectory_is_detected() {
        let tmp = TempDir::new().unwrap();
        let backend = tmp.path().join("backend");
        fs::create_dir_all(backend.join("app")).unwrap();
        fs::write(backend.join("app/main.py"), HOST).unwrap();

        let plan = fixed_plan(&request("product", "name:str"), tmp.path()).unwrap();

        assert_eq!(plan.root, backend);
    }

    #[test]
    fn request_overrides_extend_config() {
        let tmp = project();
        fs::write(
            tmp.path().join("crud-generate.toml"),
            "preview_lines = 3\nallow_overwrite = [\"app/models/product.py\"]\n",
        )
        .unwrap();
        let request = GenerateRequest {
            allow_overwrite: vec![PathBuf::from("tests/test_products_api.py")],
            preview_lines: Some(5),
            ..request("product", "name:str")
        };

        let plan = fixed_plan(&request, tmp.path()).unwrap();

        assert_eq!(plan.config.preview_lines, 5);
        assert_eq!(
            plan.config.allow_overwrite,
            vec![
                PathBuf::from("app/models/product.py"),
                PathBuf::from("tests/test_products_api.py")
            ]
        );
    }
}
