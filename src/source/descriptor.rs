// ABOUTME: Deployment descriptor detection at the working copy root.
// ABOUTME: Compose files are preferred; a bare Dockerfile runs in degraded mode.

use super::git::SyncError;
use std::path::Path;

/// Compose file names, in order of preference.
pub const COMPOSE_FILES: [&str; 4] = [
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];

pub const DOCKERFILE: &str = "Dockerfile";

/// How the application describes its containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    /// A compose file; the name is relative to the project root.
    Compose { file: String },
    /// Only a Dockerfile. The app is built and run as a single container.
    Dockerfile,
}

impl Descriptor {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Descriptor::Dockerfile)
    }
}

pub fn detect_descriptor(root: &Path) -> Result<Descriptor, SyncError> {
    if let Some(file) = COMPOSE_FILES.iter().find(|f| root.join(f).is_file()) {
        return Ok(Descriptor::Compose {
            file: file.to_string(),
        });
    }

    if root.join(DOCKERFILE).is_file() {
        return Ok(Descriptor::Dockerfile);
    }

    Err(SyncError::MissingDescriptor(root.to_path_buf()))
}
