use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::entity_definition::{Behavior, Domain};

/// Type tag accepted by the field grammar.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeTag {
    Str,
    Text,
    Int,
    Float,
    Decimal,
    Money,
    Bool,
    Date,
    DateTime,
    Time,
    Uuid,
    Json,
    Email,
    Phone,
    Fk,
}

impl TypeTag {
    pub const ALL: [TypeTag; 15] = [
        TypeTag::Str,
        TypeTag::Text,
        TypeTag::Int,
        TypeTag::Float,
        TypeTag::Decimal,
        TypeTag::Money,
        TypeTag::Bool,
        TypeTag::Date,
        TypeTag::DateTime,
        TypeTag::Time,
        TypeTag::Uuid,
        TypeTag::Json,
        TypeTag::Email,
        TypeTag::Phone,
        TypeTag::Fk,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TypeTag::Str => "str",
            TypeTag::Text => "text",
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Decimal => "decimal",
            TypeTag::Money => "money",
            TypeTag::Bool => "bool",
            TypeTag::Date => "date",
            TypeTag::DateTime => "datetime",
            TypeTag::Time => "time",
            TypeTag::Uuid => "uuid",
            TypeTag::Json => "json",
            TypeTag::Email => "email",
            TypeTag::Phone => "phone",
            TypeTag::Fk => "fk",
        }
    }

    /// Comma separated list of every tag, for error messages.
    pub fn valid_tags() -> String {
        TypeTag::ALL
            .iter()
            .map(|tag| tag.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for TypeTag {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TypeTag::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str() == s)
            .ok_or(())
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column constraint. The derive order is the canonical serialization order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Constraint {
    Primary,
    Unique,
    Nullable,
    Index,
}

impl Constraint {
    pub const ALL: [Constraint; 4] = [
        Constraint::Primary,
        Constraint::Unique,
        Constraint::Nullable,
        Constraint::Index,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Constraint::Primary => "primary",
            Constraint::Unique => "unique",
            Constraint::Nullable => "nullable",
            Constraint::Index => "index",
        }
    }
}

impl FromStr for Constraint {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Constraint::ALL
            .iter()
            .copied()
            .find(|constraint| constraint.as_str() == s)
            .ok_or(())
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a foreign key target table was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FkOrigin {
    /// Written as `fk:<table>` or `fk(<table>)`.
    Explicit,
    /// Derived from the field name (`owner_id` -> `owners`).
    Inferred,
    /// Points back at the entity's own table.
    SelfReference,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FkTarget {
    pub table: String,
    pub origin: FkOrigin,
}

impl FkTarget {
    pub fn explicit(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            origin: FkOrigin::Explicit,
        }
    }

    pub fn inferred(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            origin: FkOrigin::Inferred,
        }
    }
}

/// Server-side default carried by pattern and behavior fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldDefault {
    Bool(bool),
    Text(&'static str),
    /// Current timestamp on insert.
    Now,
    /// Current timestamp on insert and on every update.
    NowOnUpdate,
}

/// Where a field came from during resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldOrigin {
    User,
    Domain(Domain),
    Behavior(Behavior),
}

/// One user- or pattern-declared field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub type_tag: TypeTag,
    pub constraints: BTreeSet<Constraint>,
    pub fk_target: Option<FkTarget>,
    pub default: Option<FieldDefault>,
    pub origin: FieldOrigin,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, type_tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            type_tag,
            constraints: BTreeSet::new(),
            fk_target: None,
            default: None,
            origin: FieldOrigin::User,
        }
    }

    pub fn with(mut self, constraint: Constraint) -> Self {
        self.constraints.insert(constraint);
        self
    }

    pub fn has(&self, constraint: Constraint) -> bool {
        self.constraints.contains(&constraint)
    }

    pub fn is_nullable(&self) -> bool {
        self.has(Constraint::Nullable)
    }

    pub fn is_foreign_key(&self) -> bool {
        self.type_tag == TypeTag::Fk
    }

    /// Behavior fields are maintained by the persistence layer, never by clients.
    pub fn is_server_managed(&self) -> bool {
        matches!(self.origin, FieldOrigin::Behavior(_))
    }

    /// Canonical grammar form of this field, e.g. `owner_id:fk:users:nullable`.
    ///
    /// A target spelled like a constraint (`index`) is written as `fk(index)`
    /// so it does not read back as one.
    pub fn to_clause(&self) -> String {
        let mut parts: Vec<String> = vec![self.name.clone()];

        match &self.fk_target {
            Some(target) if target.origin != FkOrigin::Inferred => {
                if target.table.parse::<Constraint>().is_ok() {
                    parts.push(format!("{}({})", self.type_tag, target.table));
                } else {
                    parts.push(self.type_tag.as_str().to_string());
                    parts.push(target.table.clone());
                }
            }
            _ => parts.push(self.type_tag.as_str().to_string()),
        }

        parts.extend(self.constraints.iter().map(|c| c.as_str().to_string()));
        parts.join(":")
    }
}

/// Serializes a field list back into the `--fields` grammar.
pub fn to_field_spec_string(fields: &[FieldSpec]) -> String {
    fields
        .iter()
        .map(FieldSpec::to_clause)
        .collect::<Vec<_>>()
        .join(",")
}
