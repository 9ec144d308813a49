use crate::artifacts::python::{Imports, PythonWriter};
use crate::artifacts::{RenderContext, BASE_SCHEMAS_MODULE, GENERATED_BY};
use crate::type_registry::{IDENTITY_COLUMN, IDENTITY_TYPE};
use crate::types::{ArtifactKind, FieldSpec, GeneratedArtifact};

/// Which request schema a field line is rendered for.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Payload {
    Create,
    Update,
}

pub fn emit(ctx: &RenderContext) -> GeneratedArtifact {
    let entity = ctx.entity;
    let mut imports = Imports::new();
    imports
        .from_many(
            BASE_SCHEMAS_MODULE,
            &["BaseSchema", "CreateSchema", "ListResponseSchema", "UpdateSchema"],
        )
        .from("pydantic", "Field");

    let create_lines: Vec<String> = entity
        .input_fields()
        .map(|field| payload_line(ctx, &mut imports, field, Payload::Create))
        .collect();
    let update_lines: Vec<String> = entity
        .input_fields()
        .map(|field| payload_line(ctx, &mut imports, field, Payload::Update))
        .collect();

    let identity = ctx.registry.mapping(IDENTITY_TYPE);
    imports.maybe(identity.validation.import);
    let mut response_lines = vec![format!("{}: {}", IDENTITY_COLUMN, identity.validation.annotation)];
    response_lines.extend(entity.fields().iter().map(|field: &FieldSpec| {
        let validation = &ctx.registry.mapping(field.type_tag).validation;
        imports.maybe(validation.import);

        if field.is_nullable() {
            imports.from("typing", "Optional");
            format!("{}: Optional[{}] = None", field.name, validation.annotation)
        } else {
            format!("{}: {}", field.name, validation.annotation)
        }
    }));

    let singular = ctx.human_singular();
    let mut writer = PythonWriter::new();
    writer
        .docstring(&format!("{} schemas.\n\n{}", ctx.class_name(), GENERATED_BY))
        .lines(imports.render());

    class(
        &mut writer,
        &format!("{}(CreateSchema)", ctx.schema_class("Create")),
        &format!("Payload for creating a {}.", singular),
        &create_lines,
    );
    class(
        &mut writer,
        &format!("{}(UpdateSchema)", ctx.schema_class("Update")),
        &format!(
            "Payload for updating a {}. Omitted fields are left unchanged.",
            singular
        ),
        &update_lines,
    );
    class(
        &mut writer,
        &format!("{}(BaseSchema)", ctx.schema_class("Response")),
        &format!("A {} as returned by the API.", singular),
        &response_lines,
    );
    class(
        &mut writer,
        &format!(
            "{}(ListResponseSchema[{}])",
            ctx.schema_class("ListResponse"),
            ctx.schema_class("Response")
        ),
        &format!("Paginated list of {}.", ctx.human_plural()),
        &[],
    );

    ctx.artifact(ArtifactKind::Schema, "", writer.finish())
}

fn class(writer: &mut PythonWriter, header: &str, doc: &str, body: &[String]) {
    writer
        .blank()
        .blank()
        .line(format!("class {}:", header))
        .indent()
        .docstring(doc);
    if !body.is_empty() {
        writer.blank().lines(body);
    }
    writer.dedent();
}

fn payload_line(ctx: &RenderContext, imports: &mut Imports, field: &FieldSpec, payload: Payload) -> String {
    let (annotation, import) = ctx.registry.schema_type(field.type_tag);
    imports.maybe(import);

    let optional = payload == Payload::Update || ctx.registry.is_optional_in_schema(field);
    let default = match payload {
        Payload::Update => "None".to_string(),
        Payload::Create if field.is_nullable() => "None".to_string(),
        Payload::Create => field
            .default
            .as_ref()
            .and_then(|default| ctx.registry.default_schema_literal(default))
            .unwrap_or_else(|| "...".to_string()),
    };

    let mut args = vec![default];
    args.extend(ctx.registry.validation_kwargs(field.type_tag));
    if let Some(target) = &field.fk_target {
        args.push(format!(
            "description=\"References {}\"",
            ctx.registry.foreign_key_reference(&target.table)
        ));
    }

    let annotation = if optional {
        imports.from("typing", "Optional");
        format!("Optional[{}]", annotation)
    } else {
        annotation.to_string()
    };

    format!("{}: {} = Field({})", field.name, annotation, args.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::fixtures;
    use crate::config::GeneratorConfig;
    use crate::type_registry::TypeRegistry;
    use crate::types::{Domain, EntityDefinition};

    fn render(entity: &EntityDefinition) -> String {
        let config = GeneratorConfig::default();
        emit(&RenderContext::new(entity, TypeRegistry::standard(), &config)).content
    }

    #[test]
    fn product_schemas() {
        let content = render(&fixtures::entity("product", "name:str,price:decimal,sku:str:unique"));

        assert!(content.contains("class ProductCreate(CreateSchema):"));
        assert!(content.contains("class ProductUpdate(UpdateSchema):"));
        assert!(content.contains("class ProductResponse(BaseSchema):"));
        assert!(content.contains("class ProductListResponse(ListResponseSchema[ProductResponse]):"));
        assert!(content.contains("    name: str = Field(..., max_length=255)"));
        assert!(content.contains("    price: Decimal = Field(..., max_digits=15, decimal_places=2)"));
        assert!(content.contains("    price: Optional[Decimal] = Field(None, max_digits=15, decimal_places=2)"));
    }

    #[test]
    fn unique_does_not_loosen_required_ness() {
        let content = render(&fixtures::entity("product", "sku:str:unique"));

        assert!(content.contains("    sku: str = Field(..., max_length=255)"));
        assert!(content.contains("    sku: str\n"));
    }

    #[test]
    fn server_managed_fields_only_in_response() {
        let content = render(&fixtures::entity("product", "name:str"));
        let response = content.split("class ProductResponse").nth(1).unwrap();
        let requests = content.split("class ProductResponse").next().unwrap();

        assert!(!requests.contains("created_at"));
        assert!(response.contains("created_at: datetime"));
        assert!(response.contains("deleted_at: Optional[datetime] = None"));
        assert!(response.contains("id: UUID"));
    }

    #[test]
    fn semantic_tags_reach_the_schema() {
        let content = render(&fixtures::entity_in("customer", "", Domain::Customer));

        assert!(content.contains("from pydantic import EmailStr, Field"));
        assert!(content.contains("email: Optional[EmailStr] = Field(None)"));
        assert!(content.contains("phone: Optional[str] = Field(None, pattern=r\""));
        assert!(content.contains("status: str = Field(\"active\", max_length=255)"));
    }

    #[test]
    fn foreign_keys_are_reference_parameters() {
        let content = render(&fixtures::entity("task", "owner_id:fk:users"));

        assert!(content.contains(
            "owner_id: UUID = Field(..., description=\"References users.id\")"
        ));
    }
}
