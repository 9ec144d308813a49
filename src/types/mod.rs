pub mod artifact;
pub mod entity_definition;
pub mod field_spec;
pub mod migration_revision;

pub use artifact::{ArtifactKind, ArtifactSet, GeneratedArtifact};
pub use entity_definition::{
    Behavior, BehaviorFlags, DerivedForms, Domain, EntityDefinition, Relationship, ResolutionNote,
};
pub use field_spec::{
    to_field_spec_string, Constraint, FieldDefault, FieldOrigin, FieldSpec, FkOrigin, FkTarget,
    TypeTag,
};
pub use migration_revision::{
    ColumnOperation, ConstraintOperation, MigrationRevision, TableOperation,
};
