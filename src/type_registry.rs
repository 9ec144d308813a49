//! Type & constraint registry.
//!
//! The only place that knows how a type tag or a constraint is spelled in the
//! generated model, schema, migration and tests. Emitters ask the registry and
//! never match on [`TypeTag`] themselves.

use crate::types::{Constraint, FieldDefault, FieldSpec, TypeTag};

/// Name and type of the implicit identity column every entity gets.
pub const IDENTITY_COLUMN: &str = "id";
pub const IDENTITY_TYPE: TypeTag = TypeTag::Uuid;

pub const DEFAULT_STRING_LENGTH: u32 = 255;
pub const PHONE_LENGTH: u32 = 20;
pub const NUMERIC_PRECISION: u8 = 15;
pub const NUMERIC_SCALE: u8 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Size {
    Unbounded,
    Length(u32),
    Precision { precision: u8, scale: u8 },
}

/// Column storage type as understood by the persistence layer.
#[derive(Debug, PartialEq, Eq)]
pub struct StorageType {
    pub name: &'static str,
    pub size: Size,
}

impl StorageType {
    /// Expression used in the model, e.g. `String(255)`.
    pub fn model_expr(&self) -> String {
        match self.size {
            Size::Unbounded => format!("{}()", self.name),
            Size::Length(length) => format!("{}({})", self.name, length),
            Size::Precision { precision, scale } => {
                format!("{}({}, {})", self.name, precision, scale)
            }
        }
    }

    /// Expression used in the migration, e.g. `sa.String(length=255)`.
    pub fn migration_expr(&self) -> String {
        match self.size {
            Size::Unbounded => format!("sa.{}()", self.name),
            Size::Length(length) => format!("sa.{}(length={})", self.name, length),
            Size::Precision { precision, scale } => format!(
                "sa.{}(precision={}, scale={})",
                self.name, precision, scale
            ),
        }
    }
}

/// Extra validation attached to bounded string types, consumed by the schema artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SemanticTag {
    Email,
    Phone,
}

pub const PHONE_PATTERN: &str = r"^\+?[0-9 ().-]{7,20}$";

impl SemanticTag {
    /// Annotation replacing the plain validation type in schemas.
    pub fn schema_annotation(self) -> Option<(&'static str, &'static str, &'static str)> {
        match self {
            SemanticTag::Email => Some(("EmailStr", "pydantic", "EmailStr")),
            SemanticTag::Phone => None,
        }
    }

    /// Extra `Field(...)` keyword for schemas.
    pub fn schema_field_kwarg(self) -> Option<String> {
        match self {
            SemanticTag::Email => None,
            SemanticTag::Phone => Some(format!("pattern=r\"{}\"", PHONE_PATTERN)),
        }
    }
}

/// Python-side type used for annotations and request validation.
#[derive(Debug, PartialEq, Eq)]
pub struct ValidationType {
    pub annotation: &'static str,
    /// `(module, name)` the annotation needs.
    pub import: Option<(&'static str, &'static str)>,
    pub semantic: Option<SemanticTag>,
}

/// Literal values used by the generated test suites. `{name}` is replaced with
/// the field name; `pattern` may reference the loop variable `i`.
#[derive(Debug, PartialEq, Eq)]
pub struct SampleValues {
    pub python: &'static str,
    pub python_updated: &'static str,
    pub python_pattern: &'static str,
    pub json: &'static str,
    pub json_updated: &'static str,
    pub json_pattern: &'static str,
    pub import: Option<(&'static str, &'static str)>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct TypeMapping {
    pub storage: StorageType,
    pub validation: ValidationType,
    pub samples: SampleValues,
}

impl TypeMapping {
    pub fn size(&self) -> Size {
        self.storage.size
    }
}

/// What a constraint does to the table definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DdlEffect {
    PrimaryKeyMember,
    UniqueConstraint,
    NullableColumn,
    Index,
}

/// What a constraint does to request/response schemas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaEffect {
    Unchanged,
    Optional,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ConstraintEffect {
    pub ddl: DdlEffect,
    pub schema: SchemaEffect,
    /// Keyword argument on the model column.
    pub column_kwarg: &'static str,
}

static STR: TypeMapping = TypeMapping {
    storage: StorageType {
        name: "String",
        size: Size::Length(DEFAULT_STRING_LENGTH),
    },
    validation: ValidationType {
        annotation: "str",
        import: None,
        semantic: None,
    },
    samples: SampleValues {
        python: "\"{name}_value\"",
        python_updated: "\"{name}_updated\"",
        python_pattern: "f\"{name}_{i}\"",
        json: "\"{name}_value\"",
        json_updated: "\"{name}_updated\"",
        json_pattern: "f\"{name}_{i}\"",
        import: None,
    },
};

static TEXT: TypeMapping = TypeMapping {
    storage: StorageType {
        name: "Text",
        size: Size::Unbounded,
    },
    validation: ValidationType {
        annotation: "str",
        import: None,
        semantic: None,
    },
    samples: SampleValues {
        python: "\"{name} text\"",
        python_updated: "\"{name} text updated\"",
        python_pattern: "f\"{name} text {i}\"",
        json: "\"{name} text\"",
        json_updated: "\"{name} text updated\"",
        json_pattern: "f\"{name} text {i}\"",
        import: None,
    },
};

static INT: TypeMapping = TypeMapping {
    storage: StorageType {
        name: "Integer",
        size: Size::Unbounded,
    },
    validation: ValidationType {
        annotation: "int",
        import: None,
        semantic: None,
    },
    samples: SampleValues {
        python: "123",
        python_updated: "456",
        python_pattern: "i",
        json: "123",
        json_updated: "456",
        json_pattern: "i",
        import: None,
    },
};

static FLOAT: TypeMapping = TypeMapping {
    storage: StorageType {
        name: "Float",
        size: Size::Unbounded,
    },
    validation: ValidationType {
        annotation: "float",
        import: None,
        semantic: None,
    },
    samples: SampleValues {
        python: "123.45",
        python_updated: "456.78",
        python_pattern: "float(i)",
        json: "123.45",
        json_updated: "456.78",
        json_pattern: "float(i)",
        import: None,
    },
};

/// Shared by `decimal` and `money`.
static NUMERIC: TypeMapping = TypeMapping {
    storage: StorageType {
        name: "Numeric",
        size: Size::Precision {
            precision: NUMERIC_PRECISION,
            scale: NUMERIC_SCALE,
        },
    },
    validation: ValidationType {
        annotation: "Decimal",
        import: Some(("decimal", "Decimal")),
        semantic: None,
    },
    samples: SampleValues {
        python: "Decimal(\"123.45\")",
        python_updated: "Decimal(\"456.78\")",
        python_pattern: "Decimal(f\"{i}.99\")",
        json: "\"123.45\"",
        json_updated: "\"456.78\"",
        json_pattern: "f\"{i}.99\"",
        import: Some(("decimal", "Decimal")),
    },
};

static BOOL: TypeMapping = TypeMapping {
    storage: StorageType {
        name: "Boolean",
        size: Size::Unbounded,
    },
    validation: ValidationType {
        annotation: "bool",
        import: None,
        semantic: None,
    },
    samples: SampleValues {
        python: "True",
        python_updated: "False",
        python_pattern: "i % 2 == 0",
        json: "True",
        json_updated: "False",
        json_pattern: "i % 2 == 0",
        import: None,
    },
};

static DATE: TypeMapping = TypeMapping {
    storage: StorageType {
        name: "Date",
        size: Size::Unbounded,
    },
    validation: ValidationType {
        annotation: "date",
        import: Some(("datetime", "date")),
        semantic: None,
    },
    samples: SampleValues {
        python: "date(2025, 1, 1)",
        python_updated: "date(2025, 12, 31)",
        python_pattern: "date(2025, 1, i + 1)",
        json: "\"2025-01-01\"",
        json_updated: "\"2025-12-31\"",
        json_pattern: "f\"2025-01-{i + 1:02d}\"",
        import: Some(("datetime", "date")),
    },
};

static DATETIME: TypeMapping = TypeMapping {
    storage: StorageType {
        name: "DateTime",
        size: Size::Unbounded,
    },
    validation: ValidationType {
        annotation: "datetime",
        import: Some(("datetime", "datetime")),
        semantic: None,
    },
    samples: SampleValues {
        python: "datetime(2025, 1, 1, 12, 0, 0)",
        python_updated: "datetime(2025, 12, 31, 23, 59, 59)",
        python_pattern: "datetime(2025, 1, i + 1, 12, 0, 0)",
        json: "\"2025-01-01T12:00:00\"",
        json_updated: "\"2025-12-31T23:59:59\"",
        json_pattern: "f\"2025-01-{i + 1:02d}T12:00:00\"",
        import: Some(("datetime", "datetime")),
    },
};

static TIME: TypeMapping = TypeMapping {
    storage: StorageType {
        name: "Time",
        size: Size::Unbounded,
    },
    validation: ValidationType {
        annotation: "time",
        import: Some(("datetime", "time")),
        semantic: None,
    },
    samples: SampleValues {
        python: "time(9, 0)",
        python_updated: "time(17, 30)",
        python_pattern: "time(9, i)",
        json: "\"09:00:00\"",
        json_updated: "\"17:30:00\"",
        json_pattern: "f\"09:{i:02d}:00\"",
        import: Some(("datetime", "time")),
    },
};

static UUID: TypeMapping = TypeMapping {
    storage: StorageType {
        name: "Uuid",
        size: Size::Unbounded,
    },
    validation: ValidationType {
        annotation: "UUID",
        import: Some(("uuid", "UUID")),
        semantic: None,
    },
    samples: SampleValues {
        python: "uuid4()",
        python_updated: "uuid4()",
        python_pattern: "uuid4()",
        json: "str(uuid4())",
        json_updated: "str(uuid4())",
        json_pattern: "str(uuid4())",
        import: Some(("uuid", "uuid4")),
    },
};

static JSON: TypeMapping = TypeMapping {
    storage: StorageType {
        name: "JSON",
        size: Size::Unbounded,
    },
    validation: ValidationType {
        annotation: "dict[str, Any]",
        import: Some(("typing", "Any")),
        semantic: None,
    },
    samples: SampleValues {
        python: "{\"key\": \"value\"}",
        python_updated: "{\"key\": \"updated\"}",
        python_pattern: "{\"index\": i}",
        json: "{\"key\": \"value\"}",
        json_updated: "{\"key\": \"updated\"}",
        json_pattern: "{\"index\": i}",
        import: None,
    },
};

static EMAIL: TypeMapping = TypeMapping {
    storage: StorageType {
        name: "String",
        size: Size::Length(DEFAULT_STRING_LENGTH),
    },
    validation: ValidationType {
        annotation: "str",
        import: None,
        semantic: Some(SemanticTag::Email),
    },
    samples: SampleValues {
        python: "\"{name}@example.com\"",
        python_updated: "\"{name}.updated@example.com\"",
        python_pattern: "f\"{name}{i}@example.com\"",
        json: "\"{name}@example.com\"",
        json_updated: "\"{name}.updated@example.com\"",
        json_pattern: "f\"{name}{i}@example.com\"",
        import: None,
    },
};

static PHONE: TypeMapping = TypeMapping {
    storage: StorageType {
        name: "String",
        size: Size::Length(PHONE_LENGTH),
    },
    validation: ValidationType {
        annotation: "str",
        import: None,
        semantic: Some(SemanticTag::Phone),
    },
    samples: SampleValues {
        python: "\"+15555550100\"",
        python_updated: "\"+15555550199\"",
        python_pattern: "f\"+155555501{i:02d}\"",
        json: "\"+15555550100\"",
        json_updated: "\"+15555550199\"",
        json_pattern: "f\"+155555501{i:02d}\"",
        import: None,
    },
};

/// Foreign keys store the referenced row's identity.
static FK: TypeMapping = TypeMapping {
    storage: StorageType {
        name: "Uuid",
        size: Size::Unbounded,
    },
    validation: ValidationType {
        annotation: "UUID",
        import: Some(("uuid", "UUID")),
        semantic: None,
    },
    samples: SampleValues {
        python: "uuid4()",
        python_updated: "uuid4()",
        python_pattern: "uuid4()",
        json: "str(uuid4())",
        json_updated: "str(uuid4())",
        json_pattern: "str(uuid4())",
        import: Some(("uuid", "uuid4")),
    },
};

static PRIMARY: ConstraintEffect = ConstraintEffect {
    ddl: DdlEffect::PrimaryKeyMember,
    schema: SchemaEffect::Unchanged,
    column_kwarg: "primary_key=True",
};

static UNIQUE: ConstraintEffect = ConstraintEffect {
    ddl: DdlEffect::UniqueConstraint,
    schema: SchemaEffect::Unchanged,
    column_kwarg: "unique=True",
};

static NULLABLE: ConstraintEffect = ConstraintEffect {
    ddl: DdlEffect::NullableColumn,
    schema: SchemaEffect::Optional,
    column_kwarg: "nullable=True",
};

static INDEX: ConstraintEffect = ConstraintEffect {
    ddl: DdlEffect::Index,
    schema: SchemaEffect::Unchanged,
    column_kwarg: "index=True",
};

/// Static registry; cheap to pass by reference to every emitter.
#[derive(Clone, Copy, Debug, Default)]
pub struct TypeRegistry;

impl TypeRegistry {
    pub fn standard() -> &'static TypeRegistry {
        static REGISTRY: TypeRegistry = TypeRegistry;
        &REGISTRY
    }

    pub fn mapping(&self, tag: TypeTag) -> &'static TypeMapping {
        match tag {
            TypeTag::Str => &STR,
            TypeTag::Text => &TEXT,
            TypeTag::Int => &INT,
            TypeTag::Float => &FLOAT,
            TypeTag::Decimal | TypeTag::Money => &NUMERIC,
            TypeTag::Bool => &BOOL,
            TypeTag::Date => &DATE,
            TypeTag::DateTime => &DATETIME,
            TypeTag::Time => &TIME,
            TypeTag::Uuid => &UUID,
            TypeTag::Json => &JSON,
            TypeTag::Email => &EMAIL,
            TypeTag::Phone => &PHONE,
            TypeTag::Fk => &FK,
        }
    }

    pub fn constraint(&self, constraint: Constraint) -> &'static ConstraintEffect {
        match constraint {
            Constraint::Primary => &PRIMARY,
            Constraint::Unique => &UNIQUE,
            Constraint::Nullable => &NULLABLE,
            Constraint::Index => &INDEX,
        }
    }

    pub fn has_ddl_effect(&self, field: &FieldSpec, effect: DdlEffect) -> bool {
        field
            .constraints
            .iter()
            .any(|constraint| self.constraint(*constraint).ddl == effect)
    }

    /// Whether schemas should accept `None` for this field.
    pub fn is_optional_in_schema(&self, field: &FieldSpec) -> bool {
        field
            .constraints
            .iter()
            .any(|constraint| self.constraint(*constraint).schema == SchemaEffect::Optional)
    }

    /// `nullable=True|False` plus every other constraint keyword, in canonical order.
    pub fn column_kwargs(&self, field: &FieldSpec) -> Vec<String> {
        let mut kwargs: Vec<String> = Vec::new();

        for constraint in Constraint::ALL {
            let effect = self.constraint(constraint);
            if effect.ddl == DdlEffect::NullableColumn {
                kwargs.push(format!("nullable={}", py_bool(field.has(constraint))));
            } else if field.has(constraint) {
                kwargs.push(effect.column_kwarg.to_string());
            }
        }

        kwargs
    }

    /// `<table>.id`
    pub fn foreign_key_reference(&self, table: &str) -> String {
        format!("{}.{}", table, IDENTITY_COLUMN)
    }

    /// Model keyword arguments for a server-side default.
    pub fn default_model_kwargs(&self, default: &FieldDefault) -> Vec<String> {
        match default {
            FieldDefault::Bool(value) => vec![
                format!("default={}", py_bool(*value)),
                format!("server_default={}()", if *value { "true" } else { "false" }),
            ],
            FieldDefault::Text(value) => vec![
                format!("default=\"{}\"", value),
                format!("server_default=\"{}\"", value),
            ],
            FieldDefault::Now => vec!["server_default=func.now()".to_string()],
            FieldDefault::NowOnUpdate => vec![
                "server_default=func.now()".to_string(),
                "onupdate=func.now()".to_string(),
            ],
        }
    }

    /// Annotation used for request schemas, honoring semantic tags.
    pub fn schema_type(&self, tag: TypeTag) -> (&'static str, Option<(&'static str, &'static str)>) {
        let validation = &self.mapping(tag).validation;
        match validation.semantic.and_then(SemanticTag::schema_annotation) {
            Some((annotation, module, name)) => (annotation, Some((module, name))),
            None => (validation.annotation, validation.import),
        }
    }

    /// `Field(...)` keywords enforcing the storage bounds of `tag`.
    /// A semantic tag replaces the plain length bound.
    pub fn validation_kwargs(&self, tag: TypeTag) -> Vec<String> {
        let mapping = self.mapping(tag);

        if let Some(semantic) = mapping.validation.semantic {
            return semantic.schema_field_kwarg().into_iter().collect();
        }

        match mapping.storage.size {
            Size::Unbounded => Vec::new(),
            Size::Length(length) => vec![format!("max_length={}", length)],
            Size::Precision { precision, scale } => vec![
                format!("max_digits={}", precision),
                format!("decimal_places={}", scale),
            ],
        }
    }

    /// `(module, name)` pairs the model needs for [`Self::default_model_kwargs`].
    pub fn default_model_imports(&self, default: &FieldDefault) -> &'static [(&'static str, &'static str)] {
        match default {
            FieldDefault::Bool(true) => &[("sqlalchemy", "true")],
            FieldDefault::Bool(false) => &[("sqlalchemy", "false")],
            FieldDefault::Text(_) => &[],
            FieldDefault::Now | FieldDefault::NowOnUpdate => &[("sqlalchemy", "func")],
        }
    }

    /// Migration `server_default=` expression.
    pub fn default_migration_expr(&self, default: &FieldDefault) -> String {
        match default {
            FieldDefault::Bool(true) => "sa.true()".to_string(),
            FieldDefault::Bool(false) => "sa.false()".to_string(),
            FieldDefault::Text(value) => format!("'{}'", value),
            FieldDefault::Now | FieldDefault::NowOnUpdate => "sa.func.now()".to_string(),
        }
    }

    /// Default value a create schema falls back to, if the client may omit the field.
    pub fn default_schema_literal(&self, default: &FieldDefault) -> Option<String> {
        match default {
            FieldDefault::Bool(value) => Some(py_bool(*value).to_string()),
            FieldDefault::Text(value) => Some(format!("\"{}\"", value)),
            FieldDefault::Now | FieldDefault::NowOnUpdate => None,
        }
    }

    /// Sample literal for tests with `{name}` substituted.
    pub fn sample(&self, field: &FieldSpec, pick: SamplePick) -> String {
        let samples = &self.mapping(field.type_tag).samples;
        let template = match pick {
            SamplePick::Python => samples.python,
            SamplePick::PythonUpdated => samples.python_updated,
            SamplePick::PythonPattern => samples.python_pattern,
            SamplePick::Json => samples.json,
            SamplePick::JsonUpdated => samples.json_updated,
            SamplePick::JsonPattern => samples.json_pattern,
        };
        template.replace("{name}", &field.name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SamplePick {
    Python,
    PythonUpdated,
    PythonPattern,
    Json,
    JsonUpdated,
    JsonPattern,
}

fn py_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}
