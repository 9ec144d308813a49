//! Insertion of the generated router into the host application file.

use std::path::Path;

use tracing::{debug, info};

use crate::artifacts::RenderContext;
use crate::error::{GeneratorError, Result};

/// Outcome of planning the host file patch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostPatch {
    /// The router is already registered; the host stays as it is.
    AlreadyRegistered,
    /// `updated` is the full host content with `line` inserted at `line_number` (1-based).
    Insert {
        line: String,
        line_number: usize,
        updated: String,
    },
}

impl HostPatch {
    pub fn is_noop(&self) -> bool {
        matches!(self, HostPatch::AlreadyRegistered)
    }
}

/// `from app.api.products import router as products_router; app.include_router(...)`
pub fn registration_line(ctx: &RenderContext) -> String {
    let plural = &ctx.entity.derived().plural;
    format!(
        "from {} import router as {plural}_router; app.include_router({plural}_router, prefix=\"{}\", tags=[\"{plural}\"])",
        ctx.router_module(),
        ctx.api_prefix(),
        plural = plural,
    )
}

fn router_alias(ctx: &RenderContext) -> String {
    format!("include_router({}_router", ctx.entity.derived().plural)
}

/// Work out how `source` changes. The anchor must appear exactly once, as a
/// whole line.
pub fn plan_patch(ctx: &RenderContext, host: &Path, source: &str) -> Result<HostPatch> {
    let anchor = ctx.config.registration_anchor.as_str();
    let anchors: Vec<usize> = source
        .lines()
        .enumerate()
        .filter(|(_, line)| line.trim() == anchor)
        .map(|(idx, _)| idx)
        .collect();

    let anchor_idx = match anchors.as_slice() {
        [] => {
            return Err(GeneratorError::RegistrationAnchorNotFound {
                path: host.to_path_buf(),
                anchor: anchor.to_string(),
            })
        }
        [idx] => *idx,
        _ => {
            return Err(GeneratorError::AmbiguousRegistrationAnchor {
                path: host.to_path_buf(),
                anchor: anchor.to_string(),
                count: anchors.len(),
            })
        }
    };

    let alias = router_alias(ctx);
    if source.lines().any(|line| line.contains(&alias)) {
        debug!(host = %host.display(), "router already registered");
        return Ok(HostPatch::AlreadyRegistered);
    }

    let lines: Vec<&str> = source.lines().collect();
    let indent: String = lines[anchor_idx]
        .chars()
        .take_while(|c| c.is_whitespace())
        .collect();
    let line = format!("{}{}", indent, registration_line(ctx));

    let mut updated: Vec<&str> = Vec::with_capacity(lines.len() + 1);
    updated.extend_from_slice(&lines[..=anchor_idx]);
    updated.push(&line);
    updated.extend_from_slice(&lines[anchor_idx + 1..]);

    let mut updated = updated.join("\n");
    if source.ends_with('\n') {
        updated.push('\n');
    }

    Ok(HostPatch::Insert {
        line_number: anchor_idx + 2,
        line,
        updated,
    })
}

/// Read the host, plan the patch and write it back.
pub fn apply_patch(ctx: &RenderContext, host: &Path) -> Result<HostPatch> {
    let source = std::fs::read_to_string(host).map_err(|err| GeneratorError::io(host, err))?;
    let patch = plan_patch(ctx, host, &source)?;

    if let HostPatch::Insert {
        updated,
        line_number,
        ..
    } = &patch
    {
        std::fs::write(host, updated).map_err(|err| GeneratorError::io(host, err))?;
        info!(host = %host.display(), line = line_number, "registered router");
    }

    Ok(patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::fixtures;
    use crate::config::GeneratorConfig;
    use crate::type_registry::TypeRegistry;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const HOST: &str = "from fastapi import FastAPI\n\napp = FastAPI()\n\n# crud-generate: register routers\n\n\n@app.get(\"/health\")\ndef health():\n    return {\"ok\": True}\n";

    fn plan(source: &str) -> Result<HostPatch> {
        let entity = fixtures::entity("product", "name:str");
        let config = GeneratorConfig::default();
        let ctx = RenderContext::new(&entity, TypeRegistry::standard(), &config);
        plan_patch(&ctx, &PathBuf::from("app/main.py"), source)
    }

    #[test]
    fn inserts_after_anchor() {
        let patch = plan(HOST).unwrap();

        let HostPatch::Insert {
            line,
            line_number,
            updated,
        } = patch
        else {
            panic!("expected an insert");
        };
        assert_eq!(line_number, 6);
        assert_eq!(
            line,
            "from app.api.products import router as products_router; app.include_router(products_router, prefix=\"/api/v1\", tags=[\"products\"])"
        );
        assert!(updated.contains(&format!("# crud-generate: register routers\n{}\n", line)));
        assert!(updated.ends_with("return {\"ok\": True}\n"));
        assert_eq!(updated.lines().count(), HOST.lines().count() + 1);
    }

    #[test]
    fn trailing_slash_is_dropped_from_the_prefix() {
        let entity = fixtures::entity("product", "name:str");
        let config = GeneratorConfig {
            api_prefix: "/internal/".to_string(),
            ..GeneratorConfig::default()
        };
        let ctx = RenderContext::new(&entity, TypeRegistry::standard(), &config);

        let line = registration_line(&ctx);

        assert!(line.contains("prefix=\"/internal\""));
        assert!(!line.contains("prefix=\"/internal/\""));
        assert_eq!(
            format!("{}/{}", ctx.api_prefix(), entity.derived().plural),
            ctx.endpoint_base()
        );
    }

    #[test]
    fn keeps_anchor_indentation() {
        let source = "def create_app():\n    app = FastAPI()\n    # crud-generate: register routers\n    return app\n";
        let HostPatch::Insert { line, .. } = plan(source).unwrap() else {
            panic!("expected an insert");
        };

        assert!(line.starts_with("    from app.api.products import"));
    }

    #[test]
    fn second_run_is_a_noop() {
        let HostPatch::Insert { updated, .. } = plan(HOST).unwrap() else {
            panic!("expected an insert");
        };

        assert_eq!(plan(&updated).unwrap(), HostPatch::AlreadyRegistered);
    }

    #[test]
    fn missing_anchor_is_an_error() {
        let err = plan("app = FastAPI()\n").unwrap_err();

        assert!(matches!(err, GeneratorError::RegistrationAnchorNotFound { .. }));
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("# crud-generate: register routers"));
    }

    #[test]
    fn duplicated_anchor_is_an_error() {
        let source = "# crud-generate: register routers\n# crud-generate: register routers\n";
        let err = plan(source).unwrap_err();

        assert!(matches!(
            err,
            GeneratorError::AmbiguousRegistrationAnchor { count: 2, .. }
        ));
    }

    #[test]
    fn apply_writes_the_host() {
        let tmp = TempDir::new().unwrap();
        let host = tmp.path().join("main.py");
        std::fs::write(&host, HOST).unwrap();

        let entity = fixtures::entity("product", "name:str");
        let config = GeneratorConfig::default();
        let ctx = RenderContext::new(&entity, TypeRegistry::standard(), &config);

        assert!(!apply_patch(&ctx, &host).unwrap().is_noop());
        assert!(apply_patch(&ctx, &host).unwrap().is_noop());
        let written = std::fs::read_to_string(&host).unwrap();
        assert_eq!(written.matches("include_router(products_router").count(), 1);
    }
}
