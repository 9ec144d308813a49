//! One emitter per artifact kind.
//!
//! Every emitter takes the same immutable [`EntityDefinition`] and the shared
//! [`TypeRegistry`]; none of them matches on type tags directly.

pub mod migration;
pub mod model;
pub mod python;
pub mod router;
pub mod schema;
pub mod service;

use tracing::debug;

use crate::artifacts::python::Imports;
use crate::config::{GeneratorConfig, Layout};
use crate::type_registry::{SamplePick, TypeRegistry};
use crate::types::{
    ArtifactKind, ArtifactSet, EntityDefinition, FieldSpec, GeneratedArtifact, MigrationRevision,
};

/// Modules of the host application the generated code is written against.
pub(crate) const DATABASE_MODULE: &str = "app.core.database";
pub(crate) const BASE_SCHEMAS_MODULE: &str = "app.schemas.base";
pub(crate) const BASE_SERVICE_MODULE: &str = "app.services.base";

pub(crate) const GENERATED_BY: &str = "Generated by crud-generate.";

/// What every emitter reads from.
#[derive(Clone, Copy, Debug)]
pub struct RenderContext<'a> {
    pub entity: &'a EntityDefinition,
    pub registry: &'a TypeRegistry,
    pub config: &'a GeneratorConfig,
}

impl<'a> RenderContext<'a> {
    pub fn new(
        entity: &'a EntityDefinition,
        registry: &'a TypeRegistry,
        config: &'a GeneratorConfig,
    ) -> Self {
        Self {
            entity,
            registry,
            config,
        }
    }

    pub fn layout(&self) -> &'a Layout {
        &self.config.layout
    }

    /// Configured API prefix without a trailing `/`; FastAPI refuses one.
    pub fn api_prefix(&self) -> &'a str {
        self.config.api_prefix.trim_end_matches('/')
    }

    /// Mount point of the generated router, e.g. `/api/v1/products`.
    pub fn endpoint_base(&self) -> String {
        format!("{}/{}", self.api_prefix(), self.entity.derived().plural)
    }

    pub fn class_name(&self) -> &str {
        &self.entity.derived().pascal_case
    }

    pub fn schema_class(&self, suffix: &str) -> String {
        format!("{}{}", self.class_name(), suffix)
    }

    pub fn service_class(&self) -> String {
        format!("{}Service", self.class_name())
    }

    pub fn model_module(&self) -> String {
        self.layout()
            .module_path(&self.layout().models_dir, &self.entity.derived().singular)
    }

    pub fn schema_module(&self) -> String {
        self.layout().module_path(
            &self.layout().schemas_dir,
            &format!("{}_schemas", self.entity.derived().singular),
        )
    }

    pub fn service_module(&self) -> String {
        self.layout().module_path(
            &self.layout().services_dir,
            &format!("{}_service", self.entity.derived().singular),
        )
    }

    pub fn router_module(&self) -> String {
        self.layout()
            .module_path(&self.layout().api_dir, &self.entity.derived().plural)
    }

    /// `work log`
    pub fn human_singular(&self) -> String {
        self.entity.derived().singular.replace('_', " ")
    }

    /// `work logs`
    pub fn human_plural(&self) -> String {
        self.entity.derived().plural.replace('_', " ")
    }

    /// A sample literal for `field`, importing its helper if the literal uses it.
    pub fn sample(&self, imports: &mut Imports, field: &FieldSpec, pick: SamplePick) -> String {
        let literal = self.registry.sample(field, pick);
        if let Some((module, name)) = self.registry.mapping(field.type_tag).samples.import {
            if literal.contains(name) {
                imports.from(module, name);
            }
        }
        literal
    }

    pub fn artifact(&self, kind: ArtifactKind, revision_id: &str, content: String) -> GeneratedArtifact {
        let path = self
            .layout()
            .artifact_path(kind, self.entity.derived(), revision_id);
        debug!(%kind, path = %path.display(), bytes = content.len(), "rendered artifact");

        GeneratedArtifact {
            kind,
            path,
            content,
        }
    }
}

/// Render the full artifact set. Pure: same inputs, same bytes.
pub fn generate_artifacts(
    entity: &EntityDefinition,
    revision: &MigrationRevision,
    registry: &TypeRegistry,
    config: &GeneratorConfig,
) -> ArtifactSet {
    let ctx = RenderContext::new(entity, registry, config);

    ArtifactSet {
        model: model::emit(&ctx),
        service: service::emit(&ctx),
        schema: schema::emit(&ctx),
        router: router::emit(&ctx),
        api_test: api_test::emit(&ctx),
        service_test: service_test::emit(&ctx),
        migration: migration::emit(&ctx, revision),
    }
}


#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn one_artifact_per_kind() {
        let entity = fixtures::entity("product", "name:str,price:decimal,sku:str:unique");
        let revision = fixtures::revision(&entity);
        let set = generate_artifacts(
            &entity,
            &revision,
            TypeRegistry::standard(),
            &GeneratorConfig::default(),
        );

        let kinds: Vec<ArtifactKind> = set.iter().map(|artifact| artifact.kind).collect();
        assert_eq!(kinds, ArtifactKind::ALL.to_vec());
        for kind in ArtifactKind::ALL {
            assert_eq!(set.get(kind).kind, kind);
            assert!(!set.get(kind).content.is_empty());
        }
    }

    proptest! {
        #[test]
        fn rendering_is_idempotent(
            types in prop::collection::vec(
                prop::sample::select(vec!["str", "text", "int", "money", "bool", "date", "json", "email", "phone", "uuid"]),
                0..6,
            ),
            nullable in any::<bool>(),
            domain in prop::sample::select(vec![
                crate::types::Domain::Generic,
                crate::types::Domain::Employee,
                crate::types::Domain::Customer,
            ]),
        ) {
            let spec = types
                .iter()
                .enumerate()
                .map(|(idx, tag)| {
                    if nullable {
                        format!("field_{}:{}:nullable", idx, tag)
                    } else {
                        format!("field_{}:{}", idx, tag)
                    }
                })
                .collect::<Vec<_>>()
                .join(",");
            let entity = fixtures::entity_in("stock_item", &spec, domain);
            let revision = fixtures::revision(&entity);
            let registry = TypeRegistry::standard();
            let config = GeneratorConfig::default();

            let first = generate_artifacts(&entity, &revision, registry, &config);
            let second = generate_artifacts(&entity, &revision, registry, &config);
            prop_assert_eq!(first, second);
        }
    }
}
