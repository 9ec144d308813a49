//! Generator errors.
//!
//! Every failure is detected before the first write and reported to the caller
//! with enough context to fix the input and re-run.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GeneratorError>;

/// Error in the `--fields` specification.
/// Carries the offending clause and where it sits in the input.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{kind} at column {column}")]
pub struct ParseError {
    /// The clause text as written, trimmed.
    pub clause: String,
    /// 1-based character column of the offending token within the full input.
    pub column: usize,
    pub kind: ParseErrorKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("empty field clause")]
    EmptyClause,
    #[error("expected 'name:type[:constraint]*', got '{clause}'")]
    MalformedClause { clause: String },
    #[error("invalid field name '{name}' (expected [a-z][a-z0-9_]*)")]
    InvalidFieldName { name: String },
    #[error("unknown type '{tag}' (valid types: {valid})")]
    UnknownType { tag: String, valid: String },
    #[error("unknown constraint '{token}' in '{clause}' (valid: primary, unique, nullable, index)")]
    UnknownConstraint { token: String, clause: String },
    #[error("duplicate field name '{name}'")]
    DuplicateField { name: String },
    #[error("'{token}' looks like a table reference but the field is not of type fk")]
    FkTargetOnNonFk { token: String },
    #[error("invalid foreign key table '{table}'")]
    InvalidFkTarget { table: String },
    #[error("cannot infer the table for foreign key '{name}': {reason}; write it as '{name}:fk:<table>'")]
    FkInference { name: String, reason: String },
    #[error("field '{name}' cannot be both primary and nullable")]
    ConflictingConstraints { name: String },
    #[error("only one field may be marked primary ('{first}' and '{second}')")]
    MultiplePrimary { first: String, second: String },
}

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("invalid field specification: {0}")]
    Parse(#[from] ParseError),

    #[error("invalid entity name '{name}': {reason}")]
    InvalidEntityName { name: String, reason: String },

    #[error("'{name}' is a reserved name (denylist v{version}); try '{name}_entity' or 'crm_{name}'")]
    ReservedName { name: String, version: u32 },

    #[error("field name '{name}' is reserved: {reason}")]
    ReservedFieldName { name: String, reason: String },

    #[error("relationship attribute '{attribute}' derived from '{field}' collides with an existing field")]
    RelationshipNameCollision { field: String, attribute: String },

    #[error("invalid configuration in {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("broken migration chain in {dir}: {reason}")]
    BrokenMigrationChain { dir: PathBuf, reason: String },

    #[error("refusing to overwrite existing file {path} (allow it with --allow-overwrite)")]
    PathConflict { path: PathBuf },

    #[error("registration anchor '{anchor}' not found in {path}; add a line containing exactly that comment where routers are registered")]
    RegistrationAnchorNotFound { path: PathBuf, anchor: String },

    #[error("registration anchor '{anchor}' appears {count} times in {path}; it must be unique")]
    AmbiguousRegistrationAnchor {
        path: PathBuf,
        anchor: String,
        count: usize,
    },

    #[error("could not find a project root (a directory containing app/); pass --output-dir")]
    ProjectRootNotFound { searched: PathBuf },

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl GeneratorError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        GeneratorError::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code: 1 validation, 2 filesystem precondition, 3 migration chain.
    pub fn exit_code(&self) -> u8 {
        match self {
            GeneratorError::Parse(_)
            | GeneratorError::InvalidEntityName { .. }
            | GeneratorError::ReservedName { .. }
            | GeneratorError::ReservedFieldName { .. }
            | GeneratorError::RelationshipNameCollision { .. }
            | GeneratorError::Config { .. } => 1,
            GeneratorError::PathConflict { .. }
            | GeneratorError::RegistrationAnchorNotFound { .. }
            | GeneratorError::AmbiguousRegistrationAnchor { .. }
            | GeneratorError::ProjectRootNotFound { .. }
            | GeneratorError::Io { .. } => 2,
            GeneratorError::BrokenMigrationChain { .. } => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_names_the_column() {
        let error = ParseError {
            clause: "price:dollars".into(),
            column: 7,
            kind: ParseErrorKind::UnknownType {
                tag: "dollars".into(),
                valid: "str, int".into(),
            },
        };

        assert_eq!(
            error.to_string(),
            "unknown type 'dollars' (valid types: str, int) at column 7"
        );
    }

    #[test]
    fn clause_level_messages() {
        let malformed = ParseError {
            clause: "name".into(),
            column: 1,
            kind: ParseErrorKind::MalformedClause {
                clause: "name".into(),
            },
        };
        let constraint = ParseError {
            clause: "sku:str:uniq".into(),
            column: 9,
            kind: ParseErrorKind::UnknownConstraint {
                token: "uniq".into(),
                clause: "sku:str:uniq".into(),
            },
        };
        let wrapped = GeneratorError::from(constraint.clone());

        assert_eq!(
            malformed.to_string(),
            "expected 'name:type[:constraint]*', got 'name' at column 1"
        );
        assert_eq!(
            constraint.to_string(),
            "unknown constraint 'uniq' in 'sku:str:uniq' (valid: primary, unique, nullable, index) at column 9"
        );
        assert_eq!(
            wrapped.to_string(),
            format!("invalid field specification: {}", constraint)
        );
    }

    #[test]
    fn exit_codes_follow_error_class() {
        let reserved = GeneratorError::ReservedName {
            name: "class".into(),
            version: 1,
        };
        let conflict = GeneratorError::PathConflict {
            path: "app/models/product.py".into(),
        };
        let chain = GeneratorError::BrokenMigrationChain {
            dir: "alembic/versions".into(),
            reason: "two heads".into(),
        };

        assert_eq!(reserved.exit_code(), 1);
        assert_eq!(conflict.exit_code(), 2);
        assert_eq!(chain.exit_code(), 3);
    }
}
