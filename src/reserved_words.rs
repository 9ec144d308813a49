//! Names an entity may not take.
//!
//! The list is versioned and kept independently of any one target grammar:
//! bumping the version is how new entries are introduced.

#[derive(Clone, Copy, Debug)]
pub struct Denylist {
    pub version: u32,
    /// Keywords of the languages generated code is written in.
    pub keywords: &'static [&'static str],
    /// Names of the generator's own artifact kinds and project directories.
    pub internal: &'static [&'static str],
    /// Attributes the ORM base class already defines; a column under one of
    /// these names breaks the generated model at import time.
    pub model_attributes: &'static [&'static str],
}

pub const DENYLIST_V1: Denylist = Denylist {
    version: 1,
    keywords: &[
        "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del",
        "elif", "else", "except", "finally", "for", "from", "global", "if", "import", "in",
        "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try", "while",
        "with", "yield",
    ],
    internal: &[
        "alembic", "api", "app", "base", "config", "core", "database", "main", "migration",
        "model", "models", "router", "schema", "schemas", "service", "services", "test",
        "tests",
    ],
    model_attributes: &["metadata", "registry"],
};

impl Denylist {
    pub fn is_keyword(&self, name: &str) -> bool {
        self.keywords.contains(&name)
    }

    pub fn is_model_attribute(&self, name: &str) -> bool {
        self.model_attributes.contains(&name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.is_keyword(name) || self.internal.contains(&name)
    }
}
