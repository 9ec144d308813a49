use crate::artifacts::python::PythonWriter;
use crate::artifacts::RenderContext;
use crate::types::{
    ArtifactKind, ColumnOperation, ConstraintOperation, GeneratedArtifact, MigrationRevision,
    TableOperation,
};

pub fn emit(ctx: &RenderContext, revision: &MigrationRevision) -> GeneratedArtifact {
    let down_revision = revision
        .down_revision
        .as_deref()
        .map(single_quoted)
        .unwrap_or_else(|| "None".to_string());

    let mut writer = PythonWriter::new();
    writer
        .line("\"\"\"")
        .line(&revision.message)
        .blank()
        .line(format!("Revision ID: {}", revision.revision_id))
        .line(format!(
            "Revises: {}",
            revision.down_revision.as_deref().unwrap_or("")
        ))
        .line(format!(
            "Create Date: {}",
            revision.create_date.format("%Y-%m-%d %H:%M:%S%.6f")
        ))
        .blank()
        .line("\"\"\"")
        .line("from alembic import op")
        .line("import sqlalchemy as sa")
        .blank()
        .blank()
        .line("# revision identifiers, used by Alembic.")
        .line(format!("revision = {}", single_quoted(&revision.revision_id)))
        .line(format!("down_revision = {}", down_revision))
        .line("branch_labels = None")
        .line("depends_on = None")
        .blank()
        .blank()
        .line("def upgrade() -> None:")
        .indent();
    for table in &revision.operations {
        upgrade(ctx, &mut writer, table);
    }
    writer
        .dedent()
        .blank()
        .blank()
        .line("def downgrade() -> None:")
        .indent();
    for table in revision.operations.iter().rev() {
        downgrade(&mut writer, table);
    }
    writer.dedent();

    ctx.artifact(ArtifactKind::Migration, &revision.revision_id, writer.finish())
}

fn upgrade(ctx: &RenderContext, writer: &mut PythonWriter, table: &TableOperation) {
    let mut args = vec![single_quoted(&table.table)];
    args.extend(table.columns.iter().map(|column| column_expr(ctx, column)));
    args.extend(table.constraints.iter().filter_map(constraint_expr));
    writer.call("op.create_table", &args, "");

    for column in table.indexes() {
        writer.line(format!(
            "op.create_index({}, {}, [{}], unique=False)",
            single_quoted(&index_name(&table.table, column)),
            single_quoted(&table.table),
            single_quoted(column)
        ));
    }
}

fn downgrade(writer: &mut PythonWriter, table: &TableOperation) {
    let indexes: Vec<&str> = table.indexes().collect();
    for column in indexes.into_iter().rev() {
        writer.line(format!(
            "op.drop_index({}, table_name={})",
            single_quoted(&index_name(&table.table, column)),
            single_quoted(&table.table)
        ));
    }
    writer.line(format!("op.drop_table({})", single_quoted(&table.table)));
}

fn column_expr(ctx: &RenderContext, column: &ColumnOperation) -> String {
    let storage = &ctx.registry.mapping(column.type_tag).storage;
    let mut parts = vec![single_quoted(&column.name), storage.migration_expr()];
    if let Some(default) = &column.server_default {
        parts.push(format!(
            "server_default={}",
            ctx.registry.default_migration_expr(default)
        ));
    }
    parts.push(format!(
        "nullable={}",
        if column.nullable { "True" } else { "False" }
    ));

    format!("sa.Column({})", parts.join(", "))
}

/// Table-level constraints; indexes are created separately after the table.
fn constraint_expr(constraint: &ConstraintOperation) -> Option<String> {
    match constraint {
        ConstraintOperation::PrimaryKey { columns } => Some(format!(
            "sa.PrimaryKeyConstraint({})",
            columns
                .iter()
                .map(|column| single_quoted(column))
                .collect::<Vec<_>>()
                .join(", ")
        )),
        ConstraintOperation::ForeignKey {
            column,
            target_table,
        } => Some(format!(
            "sa.ForeignKeyConstraint([{}], [{}])",
            single_quoted(column),
            single_quoted(&format!("{}.id", target_table))
        )),
        ConstraintOperation::Unique { column } => {
            Some(format!("sa.UniqueConstraint({})", single_quoted(column)))
        }
        ConstraintOperation::Index { .. } => None,
    }
}

fn index_name(table: &str, column: &str) -> String {
    format!("ix_{}_{}", table, column)
}

fn single_quoted(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}
