// ABOUTME: Source of the repository credential in a deploy file.
// ABOUTME: Either a literal token or a reference to an environment variable.

use crate::error::{Error, Result};
use secrecy::SecretString;
use serde::Deserialize;

/// Where the repository credential comes from.
///
/// ```yaml
/// credential: ghp_literal_token
/// credential: { env: GIT_TOKEN }
/// credential: { env: GIT_TOKEN, default: "" }
/// ```
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CredentialSource {
    Literal(String),
    FromEnv {
        #[serde(rename = "env")]
        var: String,
        #[serde(default)]
        default: Option<String>,
    },
}

impl CredentialSource {
    pub fn resolve(&self) -> Result<SecretString> {
        let value = match self {
            CredentialSource::Literal(s) => s.clone(),
            CredentialSource::FromEnv { var, default } => match std::env::var(var) {
                Ok(val) => val,
                Err(_) => default
                    .clone()
                    .ok_or_else(|| Error::MissingEnvVar(var.clone()))?,
            },
        };
        Ok(SecretString::from(value))
    }
}

impl std::fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialSource::Literal(_) => f.write_str("Literal([REDACTED])"),
            CredentialSource::FromEnv { var, .. } => {
                f.debug_struct("FromEnv").field("var", var).finish()
            }
        }
    }
}
