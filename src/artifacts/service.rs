use crate::artifacts::python::{Imports, PythonWriter};
use crate::artifacts::{RenderContext, BASE_SERVICE_MODULE, GENERATED_BY};
use crate::types::{ArtifactKind, Constraint, FieldSpec, GeneratedArtifact};

pub fn emit(ctx: &RenderContext) -> GeneratedArtifact {
    let entity = ctx.entity;
    let class_name = ctx.class_name();
    let soft_delete = entity.behavior().soft_delete;
    let create = ctx.schema_class("Create");
    let update = ctx.schema_class("Update");
    let response = ctx.schema_class("Response");

    let mut imports = Imports::new();
    imports
        .from("sqlalchemy.ext.asyncio", "AsyncSession")
        .from(&ctx.model_module(), class_name)
        .from_many(&ctx.schema_module(), &[create.as_str(), update.as_str(), response.as_str()])
        .from(BASE_SERVICE_MODULE, "BaseService");

    // Unique user columns get a dedicated lookup.
    let lookups: Vec<&FieldSpec> = entity
        .input_fields()
        .filter(|field| field.has(Constraint::Unique))
        .collect();
    if !lookups.is_empty() {
        imports.from("typing", "Optional").from("sqlalchemy", "select");
    }

    let doc = if soft_delete {
        format!(
            "Persistence operations for {}.\n\nDeleting a {} marks it as deleted; `restore` brings it back.",
            ctx.human_plural(),
            ctx.human_singular()
        )
    } else {
        format!(
            "Persistence operations for {}.\n\nDeleting a {} removes the row.",
            ctx.human_plural(),
            ctx.human_singular()
        )
    };

    let mut writer = PythonWriter::new();
    writer
        .docstring(&format!("{} service.\n\n{}", class_name, GENERATED_BY))
        .lines(imports.render())
        .blank()
        .blank()
        .line(format!(
            "class {}(BaseService[{}, {}, {}, {}]):",
            ctx.service_class(),
            class_name,
            create,
            update,
            response
        ))
        .indent()
        .docstring(&doc)
        .blank()
        .line("def __init__(self, db: AsyncSession):")
        .indent()
        .line(format!(
            "super().__init__({}, db, {}, soft_delete={})",
            class_name,
            response,
            if soft_delete { "True" } else { "False" }
        ))
        .dedent();

    for field in lookups {
        let annotation = ctx.registry.mapping(field.type_tag).validation.annotation;
        let mut conditions = vec![format!("{}.{} == {}", class_name, field.name, field.name)];
        if soft_delete {
            conditions.push(format!("{}.is_deleted.is_(False)", class_name));
        }

        writer
            .blank()
            .line(format!(
                "async def get_by_{}(self, {}: {}) -> Optional[{}]:",
                field.name, field.name, annotation, class_name
            ))
            .indent()
            .docstring(&format!(
                "Return the {} with the given {}, if any.",
                ctx.human_singular(),
                field.name.replace('_', " ")
            ))
            .line(format!(
                "stmt = select({}).where({})",
                class_name,
                conditions.join(", ")
            ))
            .line("result = await self.db.execute(stmt)")
            .line("return result.scalar_one_or_none()")
            .dedent();
    }
    writer.dedent();

    ctx.artifact(ArtifactKind::Service, "", writer.finish())
}
