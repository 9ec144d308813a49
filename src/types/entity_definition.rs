use std::fmt;

use super::field_spec::{FieldSpec, FkOrigin};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Domain {
    #[default]
    Generic,
    Employee,
    Customer,
}

impl Domain {
    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Generic => "generic",
            Domain::Employee => "employee",
            Domain::Customer => "customer",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the behavior bundles appended after user and domain fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Behavior {
    SoftDelete,
    Timestamps,
    Audit,
}

impl Behavior {
    /// Fixed tail order.
    pub const ORDER: [Behavior; 3] = [Behavior::SoftDelete, Behavior::Timestamps, Behavior::Audit];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BehaviorFlags {
    pub soft_delete: bool,
    pub timestamps: bool,
    pub audit: bool,
}

impl BehaviorFlags {
    pub fn is_enabled(&self, behavior: Behavior) -> bool {
        match behavior {
            Behavior::SoftDelete => self.soft_delete,
            Behavior::Timestamps => self.timestamps,
            Behavior::Audit => self.audit,
        }
    }
}

impl Default for BehaviorFlags {
    fn default() -> Self {
        Self {
            soft_delete: true,
            timestamps: true,
            audit: true,
        }
    }
}

/// Naming forms computed once per entity and reused verbatim by every artifact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DerivedForms {
    pub singular: String,    // snake_case
    pub plural: String,      // snake_case
    pub pascal_case: String, // UpperCamelCase
    pub upper_snake: String, // SHOUTY_SNAKE
    pub table_name: String,
}

/// Warning-level observation made while resolving an entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolutionNote {
    /// A domain pattern field was dropped because the user declared the same name.
    PatternFieldShadowed { field: String, domain: Domain },
    /// A foreign key points at a table no existing revision creates.
    UnknownFkTarget { field: String, table: String },
}

impl fmt::Display for ResolutionNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionNote::PatternFieldShadowed { field, domain } => write!(
                f,
                "user field '{}' overrides the '{}' domain field of the same name",
                field, domain
            ),
            ResolutionNote::UnknownFkTarget { field, table } => write!(
                f,
                "foreign key '{}' references table '{}', which no existing migration creates",
                field, table
            ),
        }
    }
}

/// A model-level relationship derived from a foreign key field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relationship<'a> {
    pub field: &'a FieldSpec,
    pub attribute: String,
    pub target_table: &'a str,
    pub target_class: String,
    pub self_referential: bool,
}

/// The resolved compilation unit. Only `entity_builder` constructs it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityDefinition {
    entity_name: String,
    derived: DerivedForms,
    fields: Vec<FieldSpec>,
    domain: Domain,
    behavior: BehaviorFlags,
    notes: Vec<ResolutionNote>,
}

impl EntityDefinition {
    pub(crate) fn new(
        entity_name: String,
        derived: DerivedForms,
        fields: Vec<FieldSpec>,
        domain: Domain,
        behavior: BehaviorFlags,
        notes: Vec<ResolutionNote>,
    ) -> Self {
        Self {
            entity_name,
            derived,
            fields,
            domain,
            behavior,
            notes,
        }
    }

    pub(crate) fn with_notes(mut self, notes: impl IntoIterator<Item = ResolutionNote>) -> Self {
        self.notes.extend(notes);
        self
    }

    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    pub fn derived(&self) -> &DerivedForms {
        &self.derived
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn behavior(&self) -> BehaviorFlags {
        self.behavior
    }

    pub fn notes(&self) -> &[ResolutionNote] {
        &self.notes
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Fields a client may send on create/update.
    pub fn input_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|field| !field.is_server_managed())
    }

    pub fn relationships(&self) -> Vec<Relationship<'_>> {
        self.fields
            .iter()
            .filter_map(|field| {
                let target = field.fk_target.as_ref()?;
                let self_referential = target.origin == FkOrigin::SelfReference
                    || target.table == self.derived.table_name;
                let target_class = if self_referential {
                    self.derived.pascal_case.clone()
                } else {
                    crate::naming::class_name_for_table(&target.table)
                };

                Some(Relationship {
                    field,
                    attribute: crate::naming::relationship_attribute(&field.name),
                    target_table: &target.table,
                    target_class,
                    self_referential,
                })
            })
            .collect()
    }
}
