use crate::artifacts::python::{quoted, Imports, PythonWriter};
use crate::artifacts::{RenderContext, DATABASE_MODULE, GENERATED_BY};
use crate::type_registry::{IDENTITY_COLUMN, IDENTITY_TYPE};
use crate::types::{ArtifactKind, FieldSpec, GeneratedArtifact, Relationship};

const MAX_LINE: usize = 88;

pub fn emit(ctx: &RenderContext) -> GeneratedArtifact {
    let entity = ctx.entity;
    let class_name = ctx.class_name();
    let relationships: Vec<Relationship> = entity.relationships();

    let mut imports = Imports::new();
    imports
        .from_many("sqlalchemy.orm", &["Mapped", "mapped_column"])
        .from(DATABASE_MODULE, "Base");

    let identity = ctx.registry.mapping(IDENTITY_TYPE);
    imports
        .from("sqlalchemy", identity.storage.name)
        .maybe(identity.validation.import)
        .from("uuid", "uuid4");

    let columns: Vec<(String, Vec<String>)> = entity
        .fields()
        .iter()
        .map(|field: &FieldSpec| {
            let mapping = ctx.registry.mapping(field.type_tag);
            imports
                .from("sqlalchemy", mapping.storage.name)
                .maybe(mapping.validation.import);

            let mut args: Vec<String> = vec![mapping.storage.model_expr()];
            if let Some(target) = &field.fk_target {
                imports.from("sqlalchemy", "ForeignKey");
                args.push(format!(
                    "ForeignKey({})",
                    quoted(&ctx.registry.foreign_key_reference(&target.table))
                ));
            }
            args.extend(ctx.registry.column_kwargs(field));
            if let Some(default) = &field.default {
                args.extend(ctx.registry.default_model_kwargs(default));
                for (module, name) in ctx.registry.default_model_imports(default) {
                    imports.from(module, name);
                }
            }

            let annotation = if field.is_nullable() {
                imports.from("typing", "Optional");
                format!("Optional[{}]", mapping.validation.annotation)
            } else {
                mapping.validation.annotation.to_string()
            };

            (format!("{}: Mapped[{}]", field.name, annotation), args)
        })
        .collect();

    if !relationships.is_empty() {
        imports.from("sqlalchemy.orm", "relationship");
    }
    let relations: Vec<(String, Vec<String>)> = relationships
        .iter()
        .map(|relation: &Relationship| {
            let annotation = if relation.field.is_nullable() {
                imports.from("typing", "Optional");
                format!("Optional[{}]", quoted(&relation.target_class))
            } else {
                quoted(&relation.target_class)
            };

            let mut args = vec![
                quoted(&relation.target_class),
                format!("foreign_keys=[{}]", relation.field.name),
            ];
            if relation.self_referential {
                args.push(format!("remote_side=[{}]", IDENTITY_COLUMN));
            }

            (format!("{}: Mapped[{}]", relation.attribute, annotation), args)
        })
        .collect();

    let mut writer = PythonWriter::new();
    writer
        .docstring(&format!("{} model.\n\n{}", class_name, GENERATED_BY))
        .lines(imports.render())
        .blank()
        .blank()
        .line(format!("class {}(Base):", class_name))
        .indent()
        .docstring(&format!("A {} record.", ctx.human_singular()))
        .blank()
        .line(format!("__tablename__ = {}", quoted(&entity.derived().table_name)))
        .blank();

    let identity_args = vec![
        identity.storage.model_expr(),
        "primary_key=True".to_string(),
        "default=uuid4".to_string(),
    ];
    assignment(
        &mut writer,
        &format!("{}: Mapped[{}]", IDENTITY_COLUMN, identity.validation.annotation),
        "mapped_column",
        &identity_args,
    );
    for (target, args) in &columns {
        assignment(&mut writer, target, "mapped_column", args);
    }

    if !relations.is_empty() {
        writer.blank();
        for (target, args) in &relations {
            assignment(&mut writer, target, "relationship", args);
        }
    }

    writer
        .blank()
        .line("def __repr__(self) -> str:")
        .indent()
        .line(format!(
            "return f\"<{}(id={{self.{}}})>\"",
            class_name, IDENTITY_COLUMN
        ))
        .dedent()
        .dedent();

    ctx.artifact(ArtifactKind::Model, "", writer.finish())
}

/// `target = func(args)` on one line when it fits, wrapped otherwise.
fn assignment(writer: &mut PythonWriter, target: &str, func: &str, args: &[String]) {
    let single = format!("{} = {}({})", target, func, args.join(", "));
    // the class body is indented once
    if single.len() + 4 <= MAX_LINE {
        writer.line(single);
    } else {
        writer.call(&format!("{} = {}", target, func), args, "");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::fixtures;
    use crate::config::GeneratorConfig;
    use crate::type_registry::TypeRegistry;
    use crate::types::Domain;

    fn render(entity: &crate::types::EntityDefinition) -> String {
        let config = GeneratorConfig::default();
        emit(&RenderContext::new(entity, TypeRegistry::standard(), &config)).content
    }

    #[test]
    fn product_model() {
        let entity = fixtures::entity("product", "name:str,price:decimal,sku:str:unique");
        let content = render(&entity);

        assert!(content.contains("class Product(Base):"));
        assert!(content.contains("__tablename__ = \"products\""));
        assert!(content.contains("id: Mapped[UUID] = mapped_column(Uuid(), primary_key=True, default=uuid4)"));
        assert!(content.contains("name: Mapped[str] = mapped_column(String(255), nullable=False)"));
        assert!(content.contains("price: Mapped[Decimal] = mapped_column(Numeric(15, 2), nullable=False)"));
        assert!(content.contains("sku: Mapped[str] = mapped_column(String(255), unique=True, nullable=False)"));
        assert!(content.contains("from decimal import Decimal"));
        assert!(content.contains("deleted_at: Mapped[Optional[datetime]]"));
        assert!(content.contains("onupdate=func.now()"));
    }

    #[test]
    fn fields_appear_in_entity_order() {
        let entity = fixtures::entity("product", "name:str,price:decimal,sku:str:unique");
        let content = render(&entity);

        let positions: Vec<usize> = entity
            .fields()
            .iter()
            .map(|field| content.find(&format!("    {}: Mapped", field.name)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn foreign_keys_get_relationships() {
        let entity = fixtures::entity_in("employee", "", Domain::Employee);
        let content = render(&entity);

        assert!(content.contains("ForeignKey(\"positions.id\")"));
        assert!(content.contains("position: Mapped[Optional[\"Position\"]] = relationship("));
        assert!(content.contains("foreign_keys=[position_id],"));
        assert!(content.contains("remote_side=[id]"));
        assert!(content.contains("from sqlalchemy.orm import Mapped, mapped_column, relationship"));
    }

    #[test]
    fn money_and_decimal_render_identically() {
        let money = render(&fixtures::entity("invoice", "total:money"));
        let decimal = render(&fixtures::entity("invoice", "total:decimal"));

        assert_eq!(money, decimal);
    }
}
