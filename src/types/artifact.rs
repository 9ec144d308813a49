use std::fmt;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Model,
    Service,
    Schema,
    Router,
    ApiTest,
    ServiceTest,
    Migration,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 7] = [
        ArtifactKind::Model,
        ArtifactKind::Service,
        ArtifactKind::Schema,
        ArtifactKind::Router,
        ArtifactKind::ApiTest,
        ArtifactKind::ServiceTest,
        ArtifactKind::Migration,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ArtifactKind::Model => "model",
            ArtifactKind::Service => "service",
            ArtifactKind::Schema => "schema",
            ArtifactKind::Router => "router",
            ArtifactKind::ApiTest => "api_test",
            ArtifactKind::ServiceTest => "service_test",
            ArtifactKind::Migration => "migration",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One rendered output file, held in memory until emission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedArtifact {
    pub kind: ArtifactKind,
    /// Relative to the project root.
    pub path: PathBuf,
    pub content: String,
}

/// The full, fixed artifact set for one entity.
///
/// One named slot per kind so a missing emitter is a compile error rather than
/// a short list at runtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactSet {
    pub model: GeneratedArtifact,
    pub service: GeneratedArtifact,
    pub schema: GeneratedArtifact,
    pub router: GeneratedArtifact,
    pub api_test: GeneratedArtifact,
    pub service_test: GeneratedArtifact,
    pub migration: GeneratedArtifact,
}

impl ArtifactSet {
    pub fn iter(&self) -> impl Iterator<Item = &GeneratedArtifact> {
        [
            &self.model,
            &self.service,
            &self.schema,
            &self.router,
            &self.api_test,
            &self.service_test,
            &self.migration,
        ]
        .into_iter()
    }

    pub fn get(&self, kind: ArtifactKind) -> &GeneratedArtifact {
        match kind {
            ArtifactKind::Model => &self.model,
            ArtifactKind::Service => &self.service,
            ArtifactKind::Schema => &self.schema,
            ArtifactKind::Router => &self.router,
            ArtifactKind::ApiTest => &self.api_test,
            ArtifactKind::ServiceTest => &self.service_test,
            ArtifactKind::Migration => &self.migration,
        }
    }
}
