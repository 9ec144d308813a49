//! Discovery of the existing alembic revision chain and planning of the next
//! revision.
//!
//! Revision files are read as text. Only the `revision` / `down_revision`
//! assignments and the `op.create_table(...)` calls of `upgrade()` are looked
//! at; anything else in the file is ignored.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{GeneratorError, Result};
use crate::type_registry::{DdlEffect, TypeRegistry, IDENTITY_COLUMN, IDENTITY_TYPE};
use crate::types::{
    ColumnOperation, ConstraintOperation, EntityDefinition, FieldSpec, MigrationRevision,
    TableOperation,
};

const REVISION_ID_LENGTH: usize = 12;

/// One revision file found on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevisionFile {
    pub path: PathBuf,
    pub revision: String,
    /// Empty for the root; several entries for a merge revision.
    pub down_revisions: Vec<String>,
    pub created_tables: Vec<String>,
}

/// A validated, linear-at-the-tip chain of revisions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MigrationChain {
    revisions: IndexMap<String, RevisionFile>,
    head: Option<String>,
}

impl MigrationChain {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Read every revision file under `dir`. A missing directory is an empty chain.
    pub fn discover(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "no migrations directory");
            return Ok(Self::empty());
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|err| GeneratorError::io(dir, err))?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| is_revision_file(path))
            .collect();
        paths.sort();

        let mut revisions: IndexMap<String, RevisionFile> = IndexMap::new();
        for path in paths {
            let source = fs::read_to_string(&path).map_err(|err| GeneratorError::io(&path, err))?;
            let file = parse_revision_file(&path, &source).map_err(|reason| broken(dir, reason))?;

            if let Some(previous) = revisions.get(&file.revision) {
                return Err(broken(
                    dir,
                    format!(
                        "revision '{}' is declared by both {} and {}",
                        file.revision,
                        previous.path.display(),
                        file.path.display()
                    ),
                ));
            }
            revisions.insert(file.revision.clone(), file);
        }

        let head = validate(&revisions).map_err(|reason| broken(dir, reason))?;
        info!(
            dir = %dir.display(),
            revisions = revisions.len(),
            head = head.as_deref().unwrap_or("<none>"),
            "discovered migration chain"
        );

        Ok(Self { revisions, head })
    }

    /// The revision a new migration should point at.
    pub fn head(&self) -> Option<&str> {
        self.head.as_deref()
    }

    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    pub fn revisions(&self) -> impl Iterator<Item = &RevisionFile> {
        self.revisions.values()
    }

    /// Tables created anywhere in the chain.
    pub fn known_tables(&self) -> BTreeSet<String> {
        self.revisions
            .values()
            .flat_map(|file| file.created_tables.iter().cloned())
            .collect()
    }
}

/// Fresh 12-hex-digit revision identifier.
pub fn new_revision_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(REVISION_ID_LENGTH);
    id
}

/// Table creation for `entity`, columns in field order after the identity column.
pub fn plan_revision(
    entity: &EntityDefinition,
    down_revision: Option<String>,
    revision_id: String,
    create_date: DateTime<Utc>,
    registry: &TypeRegistry,
) -> MigrationRevision {
    let table = &entity.derived().table_name;

    let mut columns = vec![ColumnOperation {
        name: IDENTITY_COLUMN.to_string(),
        type_tag: IDENTITY_TYPE,
        nullable: false,
        server_default: None,
    }];
    columns.extend(entity.fields().iter().map(|field: &FieldSpec| ColumnOperation {
        name: field.name.clone(),
        type_tag: field.type_tag,
        nullable: registry.has_ddl_effect(field, DdlEffect::NullableColumn),
        server_default: field.default,
    }));

    let mut primary_key = vec![IDENTITY_COLUMN.to_string()];
    primary_key.extend(
        entity
            .fields()
            .iter()
            .filter(|field| registry.has_ddl_effect(field, DdlEffect::PrimaryKeyMember))
            .map(|field| field.name.clone()),
    );

    let mut constraints = vec![ConstraintOperation::PrimaryKey {
        columns: primary_key,
    }];
    for field in entity.fields() {
        if let Some(target) = &field.fk_target {
            constraints.push(ConstraintOperation::ForeignKey {
                column: field.name.clone(),
                target_table: target.table.clone(),
            });
        }
        if registry.has_ddl_effect(field, DdlEffect::UniqueConstraint) {
            constraints.push(ConstraintOperation::Unique {
                column: field.name.clone(),
            });
        }
        if registry.has_ddl_effect(field, DdlEffect::Index) {
            constraints.push(ConstraintOperation::Index {
                column: field.name.clone(),
            });
        }
    }

    MigrationRevision {
        revision_id,
        down_revision,
        message: format!("create {} table", table),
        create_date,
        operations: vec![TableOperation {
            table: table.clone(),
            columns,
            constraints,
        }],
    }
}

fn broken(dir: &Path, reason: String) -> GeneratorError {
    GeneratorError::BrokenMigrationChain {
        dir: dir.to_path_buf(),
        reason,
    }
}

fn is_revision_file(path: &Path) -> bool {
    path.is_file()
        && path.extension().map_or(false, |ext| ext == "py")
        && path.file_name().map_or(false, |name| name != "__init__.py")
}

/// Extract the identifiers and created tables of one revision file.
pub fn parse_revision_file(path: &Path, source: &str) -> std::result::Result<RevisionFile, String> {
    let mut revision = None;
    let mut down_revisions = None;

    let mut lines = source.lines();
    while let Some(line) = lines.next() {
        if let Some(value) = assignment(line, "revision") {
            let ids = parse_ids(value)
                .ok_or_else(|| format!("{}: cannot read revision value {}", path.display(), value))?;
            revision = ids.into_iter().next();
        } else if let Some(value) = assignment(line, "down_revision") {
            let value = continued(value, &mut lines);
            down_revisions = Some(parse_ids(&value).ok_or_else(|| {
                format!("{}: cannot read down_revision value {}", path.display(), value)
            })?);
        }
    }

    let revision = revision.ok_or_else(|| format!("{} declares no revision", path.display()))?;

    Ok(RevisionFile {
        path: path.to_path_buf(),
        revision,
        down_revisions: down_revisions.unwrap_or_default(),
        created_tables: created_tables(source),
    })
}

/// Right-hand side of a module-level `name = ...` or `name: T = ...`.
fn assignment<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(name)?;
    let rest = rest.trim_start();

    let rest = if let Some(annotated) = rest.strip_prefix(':') {
        let (_, value) = annotated.split_once('=')?;
        value
    } else {
        rest.strip_prefix('=')?
    };

    Some(rest.trim())
}

/// Join the lines of a tuple or list that spans several lines.
fn continued<'a>(first: &str, lines: &mut impl Iterator<Item = &'a str>) -> String {
    let mut value = strip_comment(first).to_string();
    let close = match value.chars().next() {
        Some('(') => ')',
        Some('[') => ']',
        _ => return value,
    };

    while !value.ends_with(close) {
        match lines.next() {
            Some(line) => {
                value.push(' ');
                value.push_str(strip_comment(line));
            }
            None => break,
        }
    }
    value
}

fn strip_comment(line: &str) -> &str {
    line.split('#').next().unwrap_or(line).trim()
}

/// `None`, `'abc'`, `"abc"`, or a tuple/list of those.
fn parse_ids(value: &str) -> Option<Vec<String>> {
    let value = strip_comment(value);
    if value == "None" {
        return Some(Vec::new());
    }

    let inner = value
        .strip_prefix('(')
        .and_then(|v| v.strip_suffix(')'))
        .or_else(|| value.strip_prefix('[').and_then(|v| v.strip_suffix(']')));

    match inner {
        Some(items) => items
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(unquote)
            .collect(),
        None => unquote(value).map(|id| vec![id]),
    }
}

fn unquote(value: &str) -> Option<String> {
    ['\'', '"'].into_iter().find_map(|quote| {
        value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
            .map(str::to_string)
    })
}

fn created_tables(source: &str) -> Vec<String> {
    let upgrade = match source.find("def upgrade") {
        Some(start) => {
            let body = &source[start..];
            match body.find("def downgrade") {
                Some(end) => &body[..end],
                None => body,
            }
        }
        None => source,
    };

    upgrade
        .match_indices("op.create_table(")
        .filter_map(|(idx, call)| {
            let args = upgrade[idx + call.len()..].trim_start();
            let quote = args.chars().next().filter(|c| *c == '\'' || *c == '"')?;
            let name = &args[1..];
            name.find(quote).map(|end| name[..end].to_string())
        })
        .collect()
}

/// Check the chain has one root and one head and no cycles; returns the head.
fn validate(revisions: &IndexMap<String, RevisionFile>) -> std::result::Result<Option<String>, String> {
    if revisions.is_empty() {
        return Ok(None);
    }

    for file in revisions.values() {
        for parent in &file.down_revisions {
            if !revisions.contains_key(parent) {
                return Err(format!(
                    "revision '{}' points at unknown revision '{}'",
                    file.revision, parent
                ));
            }
        }
    }

    let roots: Vec<&str> = revisions
        .values()
        .filter(|file| file.down_revisions.is_empty())
        .map(|file| file.revision.as_str())
        .collect();
    match roots.len() {
        0 => return Err("no root revision (every revision has a parent)".to_string()),
        1 => {}
        _ => return Err(format!("multiple root revisions: {}", roots.join(", "))),
    }

    let parents: HashSet<&str> = revisions
        .values()
        .flat_map(|file| file.down_revisions.iter().map(String::as_str))
        .collect();
    let heads: Vec<&str> = revisions
        .keys()
        .map(String::as_str)
        .filter(|id| !parents.contains(id))
        .collect();
    let head = match heads.as_slice() {
        [] => return Err("revision cycle detected".to_string()),
        [head] => *head,
        _ => {
            return Err(format!(
                "multiple heads: {}; merge them before generating",
                heads.join(", ")
            ))
        }
    };

    // Every revision must be an ancestor of the single head; anything left over
    // sits on a cycle.
    let mut seen = HashSet::new();
    let mut stack = vec![head];
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        if let Some(file) = revisions.get(id) {
            stack.extend(file.down_revisions.iter().map(String::as_str));
        }
    }
    if seen.len() != revisions.len() {
        return Err("revision cycle detected".to_string());
    }

    Ok(Some(head.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::fixtures;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, source: &str) {
        fs::write(dir.join(name), source).unwrap();
    }

    fn revision_source(id: &str, down: &str, table: &str) -> String {
        format!(
            "\"\"\"create {table}\"\"\"\nfrom alembic import op\n\nrevision = '{id}'\ndown_revision = {down}\n\n\ndef upgrade() -> None:\n    op.create_table(\n        '{table}',\n    )\n\n\ndef downgrade() -> None:\n    op.create_table('not_{table}')\n",
        )
    }

    #[test]
    fn missing_directory_is_an_empty_chain() {
        let tmp = TempDir::new().unwrap();
        let chain = MigrationChain::discover(&tmp.path().join("alembic/versions")).unwrap();

        assert!(chain.is_empty());
        assert_eq!(chain.head(), None);
    }

    #[test]
    fn linear_chain_head_and_tables() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a_create_users.py", &revision_source("aaa", "None", "users"));
        write(tmp.path(), "b_create_teams.py", &revision_source("bbb", "'aaa'", "teams"));
        write(tmp.path(), "__init__.py", "");
        write(tmp.path(), "notes.txt", "revision = 'zzz'");

        let chain = MigrationChain::discover(tmp.path()).unwrap();

        assert_eq!(chain.len(), 2);
        assert_eq!(chain.head(), Some("bbb"));
        assert_eq!(
            chain.known_tables(),
            BTreeSet::from(["teams".to_string(), "users".to_string()])
        );
    }

    #[test]
    fn annotated_and_merge_revisions() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "1.py", "revision: str = 'root'\ndown_revision: Union[str, None] = None\n");
        write(tmp.path(), "2.py", "revision = \"left\"\ndown_revision = \"root\"\n");
        write(tmp.path(), "3.py", "revision = 'right'\ndown_revision = 'root'\n");
        write(tmp.path(), "4.py", "revision = 'merged'\ndown_revision = ('left', 'right')\n");

        let chain = MigrationChain::discover(tmp.path()).unwrap();

        assert_eq!(chain.head(), Some("merged"));
    }

    #[test]
    fn merge_revision_spanning_several_lines() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "1.py", &revision_source("root", "None", "users"));
        write(tmp.path(), "2.py", &revision_source("left", "'root'", "teams"));
        write(tmp.path(), "3.py", &revision_source("right", "'root'", "tags"));
        write(
            tmp.path(),
            "4.py",
            "revision = 'merged'\ndown_revision = (  # merge heads\n    'left',\n    'right',\n)\nbranch_labels = None\n",
        );

        let chain = MigrationChain::discover(tmp.path()).unwrap();

        assert_eq!(chain.head(), Some("merged"));
        let merged = chain.revisions().find(|file| file.revision == "merged").unwrap();
        assert_eq!(merged.down_revisions, vec!["left".to_string(), "right".to_string()]);
    }

    #[test]
    fn branched_chain_is_rejected() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "1.py", &revision_source("root", "None", "users"));
        write(tmp.path(), "2.py", &revision_source("left", "'root'", "teams"));
        write(tmp.path(), "3.py", &revision_source("right", "'root'", "tags"));

        let err = MigrationChain::discover(tmp.path()).unwrap_err();

        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("multiple heads: left, right"));
    }

    #[test]
    fn dangling_parent_is_rejected() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "1.py", &revision_source("child", "'ghost'", "users"));

        let err = MigrationChain::discover(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("unknown revision 'ghost'"));
    }

    #[test]
    fn cycle_is_rejected() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "1.py", &revision_source("root", "None", "users"));
        write(tmp.path(), "2.py", &revision_source("a", "'b'", "teams"));
        write(tmp.path(), "3.py", &revision_source("b", "'a'", "tags"));
        write(tmp.path(), "4.py", &revision_source("tip", "'root'", "posts"));

        let err = MigrationChain::discover(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn duplicate_revision_is_rejected() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "1.py", &revision_source("same", "None", "users"));
        write(tmp.path(), "2.py", &revision_source("same", "None", "teams"));

        let err = MigrationChain::discover(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("declared by both"));
    }

    #[test]
    fn file_without_revision_is_rejected() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "helpers.py", "def helper():\n    pass\n");

        let err = MigrationChain::discover(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("declares no revision"));
    }

    #[test]
    fn revision_ids_are_short_hex() {
        let id = new_revision_id();

        assert_eq!(id.len(), 12);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, new_revision_id());
    }

    #[test]
    fn plan_follows_field_order() {
        let entity = fixtures::entity("membership", "team_id:fk:teams:index,code:str:primary,note:text:nullable");
        let plan = plan_revision(
            &entity,
            None,
            "abcdef012345".to_string(),
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            TypeRegistry::standard(),
        );
        let table = &plan.operations[0];

        assert_eq!(plan.message, "create memberships table");
        assert_eq!(table.table, "memberships");
        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(&names[..4], &["id", "team_id", "code", "note"]);
        assert!(table.columns[3].nullable);
        assert!(!table.columns[1].nullable);

        assert_eq!(
            table.constraints[0],
            ConstraintOperation::PrimaryKey {
                columns: vec!["id".to_string(), "code".to_string()]
            }
        );
        assert_eq!(
            table.constraints[1],
            ConstraintOperation::ForeignKey {
                column: "team_id".to_string(),
                target_table: "teams".to_string()
            }
        );
        assert_eq!(table.indexes().collect::<Vec<_>>(), vec!["team_id", "is_deleted"]);
    }
}
