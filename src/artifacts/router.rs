use crate::artifacts::python::{quoted, Imports, PythonWriter};
use crate::artifacts::{RenderContext, BASE_SCHEMAS_MODULE, DATABASE_MODULE, GENERATED_BY};
use crate::type_registry::IDENTITY_TYPE;
use crate::types::{ArtifactKind, GeneratedArtifact};

/// One generated endpoint.
struct Endpoint {
    decorator: String,
    name: String,
    params: Vec<String>,
    doc: String,
    body: Vec<String>,
}

pub fn emit(ctx: &RenderContext) -> GeneratedArtifact {
    let entity = ctx.entity;
    let forms = entity.derived();
    let class_name = ctx.class_name();
    let service_class = ctx.service_class();
    let create = ctx.schema_class("Create");
    let update = ctx.schema_class("Update");
    let response = ctx.schema_class("Response");
    let list_response = ctx.schema_class("ListResponse");
    let identity = ctx.registry.mapping(IDENTITY_TYPE).validation.annotation;
    let dependency = format!("get_{}_service", forms.singular);

    let mut imports = Imports::new();
    imports
        .from("typing", "Any")
        .maybe(ctx.registry.mapping(IDENTITY_TYPE).validation.import)
        .from_many("fastapi", &["APIRouter", "Depends", "HTTPException", "status"])
        .from("sqlalchemy.ext.asyncio", "AsyncSession")
        .from(DATABASE_MODULE, "get_db")
        .from_many(BASE_SCHEMAS_MODULE, &["MessageResponse", "PaginationParams"])
        .from_many(
            &ctx.schema_module(),
            &[
                create.as_str(),
                update.as_str(),
                response.as_str(),
                list_response.as_str(),
            ],
        )
        .from(&ctx.service_module(), &service_class);

    let service_param = format!("service: {} = Depends({})", service_class, dependency);
    let id_param = format!("id: {}", identity);
    let not_found = vec![
        "if not item:".to_string(),
        "    raise HTTPException(".to_string(),
        "        status_code=status.HTTP_404_NOT_FOUND,".to_string(),
        format!("        detail={},", quoted(&format!("{} not found", class_name))),
        "    )".to_string(),
    ];
    let respond = format!("return {}.model_validate(item)", response);

    let singular = ctx.human_singular();
    let mut endpoints = vec![
        Endpoint {
            decorator: format!(
                "@router.post(\"/\", response_model={}, status_code=status.HTTP_201_CREATED)",
                response
            ),
            name: format!("create_{}", forms.singular),
            params: vec![format!("payload: {}", create), service_param.clone()],
            doc: format!("Create a {}.", singular),
            body: vec![
                "item = await service.create(payload)".to_string(),
                respond.clone(),
            ],
        },
        Endpoint {
            decorator: format!("@router.get(\"/{{id}}\", response_model={})", response),
            name: format!("get_{}", forms.singular),
            params: vec![id_param.clone(), service_param.clone()],
            doc: format!("Fetch one {} by id.", singular),
            body: [
                vec!["item = await service.get_by_id(id)".to_string()],
                not_found.clone(),
                vec![respond.clone()],
            ]
            .concat(),
        },
        Endpoint {
            decorator: format!("@router.get(\"/\", response_model={})", list_response),
            name: format!("list_{}", forms.plural),
            params: vec![
                "pagination: PaginationParams = Depends()".to_string(),
                service_param.clone(),
            ],
            doc: format!("List {}, one page at a time.", ctx.human_plural()),
            body: vec!["return await service.get_list(pagination=pagination)".to_string()],
        },
        Endpoint {
            decorator: format!("@router.patch(\"/{{id}}\", response_model={})", response),
            name: format!("update_{}", forms.singular),
            params: vec![
                id_param.clone(),
                format!("payload: {}", update),
                service_param.clone(),
            ],
            doc: format!("Update the given fields of a {}.", singular),
            body: [
                vec!["item = await service.update(id, payload)".to_string()],
                not_found.clone(),
                vec![respond.clone()],
            ]
            .concat(),
        },
        Endpoint {
            decorator: "@router.delete(\"/{id}\", response_model=MessageResponse)".to_string(),
            name: format!("delete_{}", forms.singular),
            params: vec![id_param.clone(), service_param.clone()],
            doc: if entity.behavior().soft_delete {
                format!("Mark a {} as deleted.", singular)
            } else {
                format!("Permanently delete a {}.", singular)
            },
            body: [
                vec!["item = await service.delete(id)".to_string()],
                not_found.clone(),
                vec![format!(
                    "return MessageResponse(message={})",
                    quoted(&format!("{} deleted successfully", class_name))
                )],
            ]
            .concat(),
        },
    ];

    if entity.behavior().soft_delete {
        endpoints.push(Endpoint {
            decorator: format!(
                "@router.post(\"/{{id}}/restore\", response_model={})",
                response
            ),
            name: format!("restore_{}", forms.singular),
            params: vec![id_param, service_param],
            doc: format!("Undo the deletion of a {}.", singular),
            body: [
                vec!["item = await service.restore(id)".to_string()],
                not_found,
                vec![respond],
            ]
            .concat(),
        });
    }

    let mut writer = PythonWriter::new();
    writer
        .docstring(&format!("{} API endpoints.\n\n{}", class_name, GENERATED_BY))
        .lines(imports.render())
        .blank()
        .blank()
        .call(
            "router = APIRouter",
            &[
                format!("prefix={}", quoted(&format!("/{}", forms.plural))),
                format!("tags=[{}]", quoted(&forms.plural)),
            ],
            "",
        )
        .blank()
        .blank()
        .line(format!(
            "def {}(db: AsyncSession = Depends(get_db)) -> {}:",
            dependency, service_class
        ))
        .indent()
        .line(format!("return {}(db)", service_class))
        .dedent();

    for endpoint in &endpoints {
        writer
            .blank()
            .blank()
            .line(&endpoint.decorator)
            .call(&format!("async def {}", endpoint.name), &endpoint.params, " -> Any:")
            .indent()
            .docstring(&endpoint.doc)
            .lines(&endpoint.body)
            .dedent();
    }

    ctx.artifact(ArtifactKind::Router, "", writer.finish())
}
