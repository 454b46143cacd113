// ABOUTME: Diagnostics accumulator for non-fatal warnings during a run.
// ABOUTME: Collects warnings that shouldn't fail a deployment but are summarized at the end.

/// Collects non-fatal warnings during a deploy or teardown run.
#[derive(Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn count(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }
}

/// A non-fatal warning collected during a run.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn empty_credential() -> Self {
        Self {
            kind: WarningKind::EmptyCredential,
            message: "No access token given; cloning will only work for public repositories"
                .to_string(),
        }
    }

    pub fn degraded_descriptor(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::DegradedDescriptor,
            message: message.into(),
        }
    }

    pub fn teardown_step(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::TeardownStep,
            message: message.into(),
        }
    }

    pub fn external_unreachable(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::ExternalUnreachable,
            message: message.into(),
        }
    }

    pub fn ssh_disconnect(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::SshDisconnect,
            message: message.into(),
        }
    }
}

/// Categories of warnings that can occur during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Repository credential was left empty.
    EmptyCredential,
    /// Only a Dockerfile was found, no compose file.
    DegradedDescriptor,
    /// A best-effort teardown step failed.
    TeardownStep,
    /// The public address did not answer from this machine.
    ExternalUnreachable,
    /// Failed to cleanly disconnect SSH session.
    SshDisconnect,
}
