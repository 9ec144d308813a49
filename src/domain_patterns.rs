//! Predefined field bundles and the order-preserving merge that applies them.
//!
//! Patterns are plain data. The resolved field list is always
//! `user fields ++ domain fields ++ behavior fields`.

use std::collections::HashSet;

use tracing::warn;

use crate::types::Constraint::{Index, Nullable, Unique};
use crate::types::{
    Behavior, BehaviorFlags, Constraint, Domain, FieldDefault, FieldOrigin, FieldSpec, FkOrigin,
    FkTarget, ResolutionNote, TypeTag,
};

/// Foreign key target of a pattern field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatternFk {
    Table(&'static str),
    /// The table of the entity the pattern is applied to.
    SelfTable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PatternField {
    pub name: &'static str,
    pub type_tag: TypeTag,
    pub constraints: &'static [Constraint],
    pub fk: Option<PatternFk>,
    pub default: Option<FieldDefault>,
}

impl PatternField {
    const fn plain(name: &'static str, type_tag: TypeTag, constraints: &'static [Constraint]) -> Self {
        Self {
            name,
            type_tag,
            constraints,
            fk: None,
            default: None,
        }
    }

    const fn fk(name: &'static str, target: PatternFk, constraints: &'static [Constraint]) -> Self {
        Self {
            name,
            type_tag: TypeTag::Fk,
            constraints,
            fk: Some(target),
            default: None,
        }
    }

    const fn defaulted(
        name: &'static str,
        type_tag: TypeTag,
        constraints: &'static [Constraint],
        default: FieldDefault,
    ) -> Self {
        Self {
            name,
            type_tag,
            constraints,
            fk: None,
            default: Some(default),
        }
    }

    /// Materialize the field for an entity stored in `table_name`.
    pub fn to_field_spec(&self, origin: FieldOrigin, table_name: &str) -> FieldSpec {
        let mut field = FieldSpec::new(self.name, self.type_tag);
        field.constraints = self.constraints.iter().copied().collect();
        field.default = self.default;
        field.origin = origin;
        field.fk_target = self.fk.map(|fk| match fk {
            PatternFk::Table(table) => FkTarget::explicit(table),
            PatternFk::SelfTable => FkTarget {
                table: table_name.to_string(),
                origin: FkOrigin::SelfReference,
            },
        });
        field
    }
}

#[derive(Clone, Copy, Debug)]
pub struct DomainPattern {
    pub name: Domain,
    pub version: u32,
    pub fields: &'static [PatternField],
}

const PERSON_CONTACT: [PatternField; 4] = [
    PatternField::plain("first_name", TypeTag::Str, &[Index]),
    PatternField::plain("last_name", TypeTag::Str, &[Index]),
    PatternField::plain("email", TypeTag::Email, &[Nullable, Index]),
    PatternField::plain("phone", TypeTag::Phone, &[Nullable]),
];

pub static GENERIC: DomainPattern = DomainPattern {
    name: Domain::Generic,
    version: 1,
    fields: &[],
};

pub static EMPLOYEE: DomainPattern = DomainPattern {
    name: Domain::Employee,
    version: 1,
    fields: &[
        PERSON_CONTACT[0],
        PERSON_CONTACT[1],
        PERSON_CONTACT[2],
        PERSON_CONTACT[3],
        PatternField::plain("employee_number", TypeTag::Str, &[Unique, Index]),
        PatternField::plain("hire_date", TypeTag::Date, &[]),
        PatternField::fk("position_id", PatternFk::Table("positions"), &[Nullable, Index]),
        PatternField::fk("department_id", PatternFk::Table("departments"), &[Nullable, Index]),
        PatternField::fk("manager_id", PatternFk::SelfTable, &[Nullable, Index]),
        PatternField::defaulted("is_active", TypeTag::Bool, &[], FieldDefault::Bool(true)),
    ],
};

pub static CUSTOMER: DomainPattern = DomainPattern {
    name: Domain::Customer,
    version: 1,
    fields: &[
        PERSON_CONTACT[0],
        PERSON_CONTACT[1],
        PERSON_CONTACT[2],
        PERSON_CONTACT[3],
        PatternField::plain("customer_number", TypeTag::Str, &[Unique, Index]),
        PatternField::defaulted(
            "customer_type",
            TypeTag::Str,
            &[Index],
            FieldDefault::Text("individual"),
        ),
        PatternField::defaulted("status", TypeTag::Str, &[Index], FieldDefault::Text("active")),
        PatternField::defaulted("priority", TypeTag::Str, &[Index], FieldDefault::Text("medium")),
    ],
};

const SOFT_DELETE_FIELDS: &[PatternField] = &[
    PatternField::defaulted("is_deleted", TypeTag::Bool, &[Index], FieldDefault::Bool(false)),
    PatternField::plain("deleted_at", TypeTag::DateTime, &[Nullable]),
];

const TIMESTAMP_FIELDS: &[PatternField] = &[
    PatternField::defaulted("created_at", TypeTag::DateTime, &[], FieldDefault::Now),
    PatternField::defaulted("updated_at", TypeTag::DateTime, &[], FieldDefault::NowOnUpdate),
];

const AUDIT_FIELDS: &[PatternField] = &[
    PatternField::plain("created_by_id", TypeTag::Uuid, &[Nullable]),
    PatternField::plain("updated_by_id", TypeTag::Uuid, &[Nullable]),
];

pub fn pattern(domain: Domain) -> &'static DomainPattern {
    match domain {
        Domain::Generic => &GENERIC,
        Domain::Employee => &EMPLOYEE,
        Domain::Customer => &CUSTOMER,
    }
}

pub fn behavior_fields(behavior: Behavior) -> &'static [PatternField] {
    match behavior {
        Behavior::SoftDelete => SOFT_DELETE_FIELDS,
        Behavior::Timestamps => TIMESTAMP_FIELDS,
        Behavior::Audit => AUDIT_FIELDS,
    }
}

/// Field list after merging, with the warnings produced along the way.
#[derive(Debug)]
pub struct MergedFields {
    pub fields: Vec<FieldSpec>,
    pub notes: Vec<ResolutionNote>,
}

/// Append the domain pattern and enabled behavior bundles to the user's fields.
///
/// User fields are never removed or retyped: a pattern field whose name is
/// already taken is dropped and reported.
pub fn merge(
    user_fields: Vec<FieldSpec>,
    domain: Domain,
    behavior: BehaviorFlags,
    table_name: &str,
) -> MergedFields {
    let mut taken: HashSet<String> = user_fields.iter().map(|f| f.name.clone()).collect();
    let mut fields = user_fields;
    let mut notes = Vec::new();

    for pattern_field in pattern(domain).fields {
        if taken.contains(pattern_field.name) {
            warn!(field = pattern_field.name, %domain, "user field shadows domain field");
            notes.push(ResolutionNote::PatternFieldShadowed {
                field: pattern_field.name.to_string(),
                domain,
            });
            continue;
        }
        taken.insert(pattern_field.name.to_string());
        fields.push(pattern_field.to_field_spec(FieldOrigin::Domain(domain), table_name));
    }

    for kind in Behavior::ORDER {
        if !behavior.is_enabled(kind) {
            continue;
        }
        fields.extend(
            behavior_fields(kind)
                .iter()
                .map(|f| f.to_field_spec(FieldOrigin::Behavior(kind), table_name)),
        );
    }

    MergedFields { fields, notes }
}
