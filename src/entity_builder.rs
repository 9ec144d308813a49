//! Assembles the immutable [`EntityDefinition`].
//!
//! Validation is all-or-nothing: either every check passes and a definition is
//! returned, or nothing is constructed.

use std::collections::{BTreeSet, HashMap};

use tracing::{info, warn};

use crate::domain_patterns::{self, behavior_fields};
use crate::error::{GeneratorError, Result};
use crate::naming;
use crate::reserved_words::{Denylist, DENYLIST_V1};
use crate::type_registry::IDENTITY_COLUMN;
use crate::types::{
    Behavior, BehaviorFlags, Domain, EntityDefinition, FieldSpec, ResolutionNote,
};

/// Everything the builder needs besides the parsed fields.
#[derive(Clone, Debug, Default)]
pub struct EntityOptions {
    pub domain: Domain,
    pub behavior: BehaviorFlags,
    /// Tables created by existing migrations. `None` skips the reference check.
    pub known_tables: Option<BTreeSet<String>>,
}

pub fn build_entity(
    entity_name: &str,
    user_fields: Vec<FieldSpec>,
    options: &EntityOptions,
) -> Result<EntityDefinition> {
    build_entity_with(entity_name, user_fields, options, &DENYLIST_V1)
}

pub fn build_entity_with(
    entity_name: &str,
    user_fields: Vec<FieldSpec>,
    options: &EntityOptions,
    denylist: &Denylist,
) -> Result<EntityDefinition> {
    validate_entity_name(entity_name, denylist)?;
    for field in &user_fields {
        validate_field_name(&field.name, options.behavior, denylist)?;
    }

    let derived = naming::derive_forms(entity_name);
    let merged = domain_patterns::merge(
        user_fields,
        options.domain,
        options.behavior,
        &derived.table_name,
    );

    check_relationship_names(&merged.fields, denylist)?;

    let mut notes = merged.notes;
    if let Some(known) = &options.known_tables {
        notes.extend(unknown_fk_targets(&merged.fields, &derived.table_name, known));
    }

    info!(
        entity = entity_name,
        table = %derived.table_name,
        fields = merged.fields.len(),
        domain = %options.domain,
        "resolved entity"
    );

    Ok(EntityDefinition::new(
        entity_name.to_string(),
        derived,
        merged.fields,
        options.domain,
        options.behavior,
        notes,
    ))
}

/// Add a note for every foreign key whose table is neither `known` nor the
/// entity's own.
pub fn annotate_fk_targets(entity: EntityDefinition, known: &BTreeSet<String>) -> EntityDefinition {
    let notes = unknown_fk_targets(entity.fields(), &entity.derived().table_name, known);
    entity.with_notes(notes)
}

fn unknown_fk_targets(
    fields: &[FieldSpec],
    own_table: &str,
    known: &BTreeSet<String>,
) -> Vec<ResolutionNote> {
    fields
        .iter()
        .filter_map(|field| {
            let target = field.fk_target.as_ref()?;
            if target.table == own_table || known.contains(&target.table) {
                return None;
            }
            warn!(field = %field.name, table = %target.table, "foreign key target not found");
            Some(ResolutionNote::UnknownFkTarget {
                field: field.name.clone(),
                table: target.table.clone(),
            })
        })
        .collect()
}

pub fn validate_entity_name(name: &str, denylist: &Denylist) -> Result<()> {
    if !naming::is_snake_case(name) {
        return Err(GeneratorError::InvalidEntityName {
            name: name.to_string(),
            reason: "expected a lowercase snake_case identifier such as 'work_log'".to_string(),
        });
    }

    if denylist.contains(name) {
        return Err(GeneratorError::ReservedName {
            name: name.to_string(),
            version: denylist.version,
        });
    }

    Ok(())
}

fn validate_field_name(name: &str, behavior: BehaviorFlags, denylist: &Denylist) -> Result<()> {
    let reserved = |reason: String| GeneratorError::ReservedFieldName {
        name: name.to_string(),
        reason,
    };

    if name == IDENTITY_COLUMN {
        return Err(reserved("every entity already has an identity column".to_string()));
    }

    if denylist.is_keyword(name) {
        return Err(reserved("it is a language keyword".to_string()));
    }

    if denylist.is_model_attribute(name) {
        return Err(reserved("the ORM base class already defines it".to_string()));
    }

    for kind in Behavior::ORDER {
        if behavior.is_enabled(kind) && behavior_fields(kind).iter().any(|f| f.name == name) {
            return Err(reserved(format!(
                "it is managed by the {} behavior; disable it or rename the field",
                behavior_flag(kind)
            )));
        }
    }

    Ok(())
}

fn behavior_flag(kind: Behavior) -> &'static str {
    match kind {
        Behavior::SoftDelete => "soft-delete",
        Behavior::Timestamps => "timestamps",
        Behavior::Audit => "audit",
    }
}

/// Relationship attributes live next to the columns on the model; they must not
/// shadow a column or each other.
fn check_relationship_names(fields: &[FieldSpec], denylist: &Denylist) -> Result<()> {
    let mut attributes: HashMap<String, &str> = HashMap::new();

    for field in fields.iter().filter(|f| f.fk_target.is_some()) {
        let attribute = naming::relationship_attribute(&field.name);
        if denylist.is_model_attribute(&attribute) {
            return Err(GeneratorError::ReservedFieldName {
                name: field.name.clone(),
                reason: format!(
                    "its relationship attribute '{}' is already defined by the ORM base class",
                    attribute
                ),
            });
        }
        let collides = fields.iter().any(|other| other.name == attribute)
            || attributes.contains_key(&attribute);

        if collides {
            return Err(GeneratorError::RelationshipNameCollision {
                field: field.name.clone(),
                attribute,
            });
        }
        attributes.insert(attribute, &field.name);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_parser::parse_fields;
    use crate::types::{Constraint, FkOrigin, TypeTag};

    fn build(name: &str, spec: &str, options: &EntityOptions) -> Result<EntityDefinition> {
        build_entity(name, parse_fields(spec)?, options)
    }

    #[test]
    fn builds_product() {
        let entity = build(
            "product",
            "name:str,price:decimal,sku:str:unique",
            &EntityOptions::default(),
        )
        .unwrap();

        assert_eq!(entity.derived().table_name, "products");
        assert_eq!(entity.derived().pascal_case, "Product");
        assert_eq!(entity.fields().len(), 9);
        assert_eq!(entity.input_fields().count(), 3);
        assert!(entity.notes().is_empty());
    }

    #[test]
    fn reserved_entity_names() {
        for name in ["class", "model", "schema", "service"] {
            match build(name, "name:str", &EntityOptions::default()) {
                Err(GeneratorError::ReservedName { name: reported, version }) => {
                    assert_eq!(reported, name);
                    assert_eq!(version, 1);
                }
                other => panic!("expected ReservedName for {}, got {:?}", name, other),
            }
        }
    }

    #[test]
    fn invalid_entity_names() {
        for name in ["Product", "work-log", "2fa", "work__log", ""] {
            assert!(matches!(
                build(name, "", &EntityOptions::default()),
                Err(GeneratorError::InvalidEntityName { .. })
            ));
        }
    }

    #[test]
    fn reserved_field_names() {
        let defaults = EntityOptions::default();

        assert!(matches!(
            build("product", "id:uuid", &defaults),
            Err(GeneratorError::ReservedFieldName { .. })
        ));
        assert!(matches!(
            build("product", "from:str", &defaults),
            Err(GeneratorError::ReservedFieldName { .. })
        ));
        assert!(matches!(
            build("product", "created_at:datetime", &defaults),
            Err(GeneratorError::ReservedFieldName { .. })
        ));

        let no_timestamps = EntityOptions {
            behavior: BehaviorFlags {
                timestamps: false,
                ..BehaviorFlags::default()
            },
            ..EntityOptions::default()
        };
        assert!(build("product", "created_at:datetime", &no_timestamps).is_ok());
    }

    #[test]
    fn orm_base_attributes_are_reserved() {
        let defaults = EntityOptions::default();

        for spec in ["metadata:json", "registry:str", "metadata_id:fk:metadata_sets"] {
            match build("document", spec, &defaults) {
                Err(GeneratorError::ReservedFieldName { reason, .. }) => {
                    assert!(reason.contains("ORM base class"), "{}", reason);
                }
                other => panic!("expected ReservedFieldName for {}, got {:?}", spec, other),
            }
        }
        assert!(build("document", "meta:json", &defaults).is_ok());
    }

    #[test]
    fn relationship_attribute_collision() {
        let result = build("task", "owner:str,owner_id:fk:users", &EntityOptions::default());

        assert!(matches!(
            result,
            Err(GeneratorError::RelationshipNameCollision { attribute, .. }) if attribute == "owner"
        ));
    }

    #[test]
    fn employee_self_reference() {
        let options = EntityOptions {
            domain: Domain::Employee,
            ..EntityOptions::default()
        };
        let entity = build("employee", "", &options).unwrap();
        let relationships = entity.relationships();
        let manager = relationships
            .iter()
            .find(|r| r.attribute == "manager")
            .unwrap();

        assert!(manager.self_referential);
        assert_eq!(manager.target_class, "Employee");
        assert_eq!(manager.field.fk_target.as_ref().unwrap().origin, FkOrigin::SelfReference);

        let position = relationships.iter().find(|r| r.attribute == "position").unwrap();
        assert_eq!(position.target_class, "Position");
    }

    #[test]
    fn collision_precedence_keeps_user_field() {
        let options = EntityOptions {
            domain: Domain::Employee,
            ..EntityOptions::default()
        };
        let entity = build("employee", "is_active:str:nullable", &options).unwrap();
        let active: Vec<_> = entity
            .fields()
            .iter()
            .filter(|f| f.name == "is_active")
            .collect();

        assert_eq!(active.len(), 1);
        assert_eq!(active[0].type_tag, TypeTag::Str);
        assert!(active[0].has(Constraint::Nullable));
        assert_eq!(entity.notes().len(), 1);
    }

    #[test]
    fn unknown_fk_targets_are_noted() {
        let known: BTreeSet<String> = ["users".to_string()].into_iter().collect();
        let options = EntityOptions {
            known_tables: Some(known),
            ..EntityOptions::default()
        };
        let entity = build("task", "owner_id:fk:users,team_id:fk,parent_id:fk:tasks", &options)
            .unwrap();

        assert_eq!(
            entity.notes(),
            &[ResolutionNote::UnknownFkTarget {
                field: "team_id".into(),
                table: "teams".into()
            }]
        );
    }

    #[test]
    fn annotating_after_the_fact_matches_building_with_known_tables() {
        let known: BTreeSet<String> = ["users".to_string()].into_iter().collect();
        let spec = "owner_id:fk:users,team_id:fk";
        let eager = build(
            "task",
            spec,
            &EntityOptions {
                known_tables: Some(known.clone()),
                ..EntityOptions::default()
            },
        )
        .unwrap();
        let late = annotate_fk_targets(build("task", spec, &EntityOptions::default()).unwrap(), &known);

        assert_eq!(eager, late);
    }
}
