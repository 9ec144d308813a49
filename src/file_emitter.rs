//! Dry-run manifest and the all-or-nothing batch write.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use owo_colors::{OwoColorize, Stream::Stdout};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{GeneratorError, Result};
use crate::migration_chain::MigrationChain;
use crate::router_registration::{apply_patch, HostPatch};
use crate::scaffold::{Registration, ScaffoldPlan};
use crate::types::GeneratedArtifact;

/// What a write run changed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteReport {
    /// Project-relative paths, in artifact order.
    pub written: Vec<PathBuf>,
    pub registration: HostPatch,
}

/// Artifacts whose target already exists and is not listed in `allow_overwrite`.
pub fn conflicts(plan: &ScaffoldPlan) -> Vec<&Path> {
    plan.artifacts
        .iter()
        .filter(|artifact| plan.root.join(&artifact.path).exists() && !overwrite_allowed(plan, artifact))
        .map(|artifact| artifact.path.as_path())
        .collect()
}

fn overwrite_allowed(plan: &ScaffoldPlan, artifact: &GeneratedArtifact) -> bool {
    plan.config.allow_overwrite.iter().any(|path| *path == artifact.path)
}

fn stdout_error(err: io::Error) -> GeneratorError {
    GeneratorError::io("<stdout>", err)
}

/// Print what a write run would do. Never writes to disk.
pub fn print_manifest(plan: &ScaffoldPlan, out: &mut dyn Write) -> Result<()> {
    write_manifest(plan, out).map_err(stdout_error)
}

fn write_manifest(plan: &ScaffoldPlan, out: &mut dyn Write) -> io::Result<()> {
    let forms = plan.entity.derived();
    writeln!(
        out,
        "{} {} (table {}), nothing will be written",
        "dry run:".if_supports_color(Stdout, |t| t.bold()),
        plan.entity.entity_name(),
        forms.table_name
    )?;
    if !plan.project_found {
        writeln!(
            out,
            "{}",
            "no project found; previewing against an empty one"
                .if_supports_color(Stdout, |t| t.yellow())
        )?;
    }
    writeln!(out)?;

    let width = plan
        .artifacts
        .iter()
        .map(|artifact| artifact.path.display().to_string().len())
        .max()
        .unwrap_or(0);
    let preview = plan.config.preview_lines;

    for artifact in plan.artifacts.iter() {
        let path = artifact.path.display().to_string();
        writeln!(
            out,
            "  {} {:<width$}  {} bytes",
            format!("{:<12}", artifact.kind).if_supports_color(Stdout, |t| t.cyan()),
            path,
            artifact.content.len(),
            width = width
        )?;

        let total = artifact.content.lines().count();
        for line in artifact.content.lines().take(preview) {
            writeln!(out, "      {} {}", "|".if_supports_color(Stdout, |t| t.dimmed()), line)?;
        }
        if total > preview {
            writeln!(
                out,
                "      {}",
                format!("... {} more lines", total - preview).if_supports_color(Stdout, |t| t.dimmed())
            )?;
        }
    }

    writeln!(out)?;
    match &plan.revision.down_revision {
        Some(parent) => writeln!(
            out,
            "migration {} revises {}",
            plan.revision.revision_id, parent
        )?,
        None => writeln!(
            out,
            "migration {} starts a new chain",
            plan.revision.revision_id
        )?,
    }

    let conflicts = conflicts(plan);
    if !conflicts.is_empty() {
        writeln!(out)?;
        writeln!(
            out,
            "{}",
            "conflicts (write mode would refuse to run):".if_supports_color(Stdout, |t| t.red())
        )?;
        for path in conflicts {
            writeln!(out, "  {} already exists", path.display())?;
        }
    }

    if !plan.entity.notes().is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", "notes:".if_supports_color(Stdout, |t| t.yellow()))?;
        for note in plan.entity.notes() {
            writeln!(out, "  warning: {}", note)?;
        }
    }

    writeln!(out)?;
    match &plan.registration {
        Registration::Planned {
            host,
            patch: HostPatch::Insert {
                line, line_number, ..
            },
        } => {
            writeln!(out, "router registration ({}):", relative(plan, host).display())?;
            writeln!(
                out,
                "  {} {}: {}",
                "+".if_supports_color(Stdout, |t| t.green()),
                line_number,
                line.trim_start()
            )?;
        }
        Registration::Planned {
            host,
            patch: HostPatch::AlreadyRegistered,
        } => {
            writeln!(
                out,
                "router registration ({}): already registered",
                relative(plan, host).display()
            )?;
        }
        Registration::Unavailable { host, reason } => {
            writeln!(
                out,
                "router registration ({}): skipped, {}",
                relative(plan, host).display(),
                reason
            )?;
        }
    }

    Ok(())
}

fn relative<'a>(plan: &ScaffoldPlan, path: &'a Path) -> &'a Path {
    path.strip_prefix(&plan.root).unwrap_or(path)
}

/// Summary of a finished write run.
pub fn print_report(plan: &ScaffoldPlan, report: &WriteReport, out: &mut dyn Write) -> Result<()> {
    write_report(plan, report, out).map_err(stdout_error)
}

fn write_report(plan: &ScaffoldPlan, report: &WriteReport, out: &mut dyn Write) -> io::Result<()> {
    for path in &report.written {
        writeln!(
            out,
            "{} {}",
            "created".if_supports_color(Stdout, |t| t.green()),
            path.display()
        )?;
    }

    let host = plan.config.layout.router_host.display();
    match &report.registration {
        HostPatch::Insert { line_number, .. } => writeln!(
            out,
            "{} {} (line {})",
            "patched".if_supports_color(Stdout, |t| t.green()),
            host,
            line_number
        )?,
        HostPatch::AlreadyRegistered => {
            writeln!(out, "unchanged {} (router already registered)", host)?
        }
    }

    for note in plan.entity.notes() {
        writeln!(
            out,
            "{} {}",
            "warning:".if_supports_color(Stdout, |t| t.yellow()),
            note
        )?;
    }
    Ok(())
}

/// A file staged next to its target, not yet visible under the final name.
struct Staged {
    target: PathBuf,
    relative: PathBuf,
    file: NamedTempFile,
    replace: bool,
}

/// A file moved into place; `previous` holds replaced content for rollback.
struct Persisted {
    target: PathBuf,
    previous: Option<Vec<u8>>,
}

/// Undo log for a batch.
#[derive(Default)]
struct Rollback {
    created_dirs: Vec<PathBuf>,
    persisted: Vec<Persisted>,
}

impl Rollback {
    fn create_dir_all(&mut self, dir: &Path) -> Result<()> {
        let missing: Vec<PathBuf> = dir
            .ancestors()
            .take_while(|ancestor| !ancestor.exists())
            .map(Path::to_path_buf)
            .collect();
        fs::create_dir_all(dir).map_err(|err| GeneratorError::io(dir, err))?;
        // Outermost first, so undo can pop innermost first.
        self.created_dirs.extend(missing.into_iter().rev());
        Ok(())
    }

    fn undo(self) {
        for persisted in self.persisted.into_iter().rev() {
            let result = match &persisted.previous {
                Some(content) => fs::write(&persisted.target, content),
                None => fs::remove_file(&persisted.target),
            };
            if let Err(err) = result {
                warn!(path = %persisted.target.display(), %err, "rollback failed");
            }
        }
        for dir in self.created_dirs.into_iter().rev() {
            // Only empty directories go; anything else was not ours.
            let _ = fs::remove_dir(&dir);
        }
    }
}

/// Write every artifact, then patch the router host. Either all of it lands or
/// none of it does.
pub fn write_plan(plan: &ScaffoldPlan) -> Result<WriteReport> {
    if let Some(path) = conflicts(plan).first() {
        return Err(GeneratorError::PathConflict {
            path: path.to_path_buf(),
        });
    }

    let host = match &plan.registration {
        Registration::Planned { host, .. } => host.clone(),
        Registration::Unavailable { host, reason } => {
            return Err(GeneratorError::io(
                host,
                io::Error::new(io::ErrorKind::NotFound, reason.clone()),
            ))
        }
    };

    check_chain_tip(plan)?;

    let mut rollback = Rollback::default();
    match write_batch(plan, &host, &mut rollback) {
        Ok(report) => Ok(report),
        Err(err) => {
            warn!(%err, "write failed, rolling back");
            rollback.undo();
            Err(err)
        }
    }
}

/// The chain must still end where it ended when the revision was planned.
fn check_chain_tip(plan: &ScaffoldPlan) -> Result<()> {
    let dir = plan.migrations_dir();
    let chain = MigrationChain::discover(&dir)?;
    let planned = plan.revision.down_revision.as_deref();

    if chain.head() != planned {
        return Err(GeneratorError::BrokenMigrationChain {
            dir,
            reason: format!(
                "head moved from {} to {} since planning; re-run to chain onto the new head",
                planned.unwrap_or("<none>"),
                chain.head().unwrap_or("<none>")
            ),
        });
    }
    Ok(())
}

fn write_batch(plan: &ScaffoldPlan, host: &Path, rollback: &mut Rollback) -> Result<WriteReport> {
    let mut staged = Vec::new();
    for artifact in plan.artifacts.iter() {
        staged.push(stage(plan, artifact, rollback)?);
    }

    let mut written = Vec::with_capacity(staged.len());
    for file in staged {
        let relative = file.relative.clone();
        persist(file, rollback)?;
        written.push(relative);
    }

    let registration = apply_patch(&plan.context(), host)?;
    info!(files = written.len(), "scaffold written");

    Ok(WriteReport {
        written,
        registration,
    })
}

fn stage(plan: &ScaffoldPlan, artifact: &GeneratedArtifact, rollback: &mut Rollback) -> Result<Staged> {
    let target = plan.root.join(&artifact.path);
    let dir = target
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| plan.root.clone());
    rollback.create_dir_all(&dir)?;

    let mut file = NamedTempFile::new_in(&dir).map_err(|err| GeneratorError::io(&dir, err))?;
    file.write_all(artifact.content.as_bytes())
        .and_then(|_| file.flush())
        .map_err(|err| GeneratorError::io(file.path(), err))?;
    debug!(kind = %artifact.kind, path = %target.display(), "staged");

    Ok(Staged {
        target,
        relative: artifact.path.clone(),
        file,
        replace: overwrite_allowed(plan, artifact),
    })
}

fn persist(staged: Staged, rollback: &mut Rollback) -> Result<()> {
    let Staged {
        target,
        file,
        replace,
        ..
    } = staged;

    let previous = if replace && target.exists() {
        Some(fs::read(&target).map_err(|err| GeneratorError::io(&target, err))?)
    } else {
        None
    };

    let result = if replace {
        file.persist(&target)
    } else {
        file.persist_noclobber(&target)
    };
    result.map_err(|err| {
        if err.error.kind() == io::ErrorKind::AlreadyExists {
            GeneratorError::PathConflict {
                path: target.clone(),
            }
        } else {
            GeneratorError::io(&target, err.error)
        }
    })?;

    info!(path = %target.display(), "wrote file");
    rollback.persisted.push(Persisted { target, previous });
    Ok(())
}
