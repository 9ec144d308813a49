use chrono::{DateTime, Utc};

use super::field_spec::{FieldDefault, TypeTag};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnOperation {
    pub name: String,
    pub type_tag: TypeTag,
    pub nullable: bool,
    pub server_default: Option<FieldDefault>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConstraintOperation {
    PrimaryKey { columns: Vec<String> },
    ForeignKey { column: String, target_table: String },
    Unique { column: String },
    Index { column: String },
}

/// Creation of one table: columns and constraints in entity field order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableOperation {
    pub table: String,
    pub columns: Vec<ColumnOperation>,
    pub constraints: Vec<ConstraintOperation>,
}

impl TableOperation {
    pub fn indexes(&self) -> impl Iterator<Item = &str> {
        self.constraints.iter().filter_map(|constraint| match constraint {
            ConstraintOperation::Index { column } => Some(column.as_str()),
            _ => None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigrationRevision {
    pub revision_id: String,
    /// Tip of the chain at planning time, `None` for the first revision.
    pub down_revision: Option<String>,
    pub message: String,
    pub create_date: DateTime<Utc>,
    pub operations: Vec<TableOperation>,
}
