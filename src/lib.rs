pub mod artifacts;
pub mod config;
pub mod domain_patterns;
pub mod entity_builder;
pub mod error;
pub mod field_parser;
pub mod file_emitter;
pub mod migration_chain;
pub mod naming;
pub mod reserved_words;
pub mod router_registration;
pub mod scaffold;
pub mod type_registry;
pub mod types;

pub use error::{GeneratorError, ParseError, ParseErrorKind, Result};
pub use scaffold::{GenerateRequest, Outcome, ScaffoldPlan};
