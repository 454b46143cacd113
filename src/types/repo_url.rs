// ABOUTME: Validated HTTP(S) Git repository URL.
// ABOUTME: Derives the application name and builds credential-bearing clone URLs.

use super::app_name::{AppName, AppNameError};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

static REPO_URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(https?)://.*\.git$").expect("valid regex"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepoUrlError {
    #[error("repository URL must look like https://host/path/name.git, got '{0}'")]
    Malformed(String),

    #[error("cannot derive an application name from '{url}': {source}")]
    BadName {
        url: String,
        #[source]
        source: AppNameError,
    },
}

/// A repository URL accepted by the collector.
///
/// Holds the derived application name so it is computed exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoUrl {
    url: String,
    app_name: AppName,
}

impl RepoUrl {
    pub fn parse(value: &str) -> Result<Self, RepoUrlError> {
        let url = value.trim();
        if !REPO_URL_PATTERN.is_match(url) {
            return Err(RepoUrlError::Malformed(url.to_string()));
        }

        let app_name = derive_app_name(url).map_err(|source| RepoUrlError::BadName {
            url: url.to_string(),
            source,
        })?;

        Ok(Self {
            url: url.to_string(),
            app_name,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn app_name(&self) -> &AppName {
        &self.app_name
    }

    /// Build the URL git should use, with the credential in the userinfo part.
    ///
    /// Userinfo already present in the URL is replaced. The result must only
    /// live as long as the git invocation that needs it. An empty credential
    /// yields the plain URL.
    pub fn authenticated(&self, credential: &SecretString) -> String {
        let token = credential.expose_secret();
        if token.is_empty() {
            return self.url.clone();
        }

        let Some((scheme, rest)) = self.url.split_once("://") else {
            return self.url.clone();
        };
        let (authority, path) = rest.split_at(rest.find('/').unwrap_or(rest.len()));
        let host = authority
            .rsplit_once('@')
            .map_or(authority, |(_, host)| host);

        format!("{}://{}@{}{}", scheme, urlencoding::encode(token), host, path)
    }
}

impl fmt::Display for RepoUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

fn derive_app_name(url: &str) -> Result<AppName, AppNameError> {
    let segment = url.rsplit('/').next().unwrap_or(url);
    let stem = segment.strip_suffix(".git").unwrap_or(segment);
    AppName::new(stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_app_name_from_last_segment() {
        let url = RepoUrl::parse("https://example.com/group/widgets.git").unwrap();
        assert_eq!(url.app_name().as_str(), "widgets");
    }

    #[test]
    fn accepts_plain_http() {
        let url = RepoUrl::parse("http://git.local/team/api.git").unwrap();
        assert_eq!(url.app_name().as_str(), "api");
    }

    #[test]
    fn rejects_ssh_and_missing_suffix() {
        assert!(matches!(
            RepoUrl::parse("git@github.com:org/repo.git"),
            Err(RepoUrlError::Malformed(_))
        ));
        assert!(matches!(
            RepoUrl::parse("https://github.com/org/repo"),
            Err(RepoUrlError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_unusable_name() {
        assert!(matches!(
            RepoUrl::parse("https://github.com/org/.git"),
            Err(RepoUrlError::BadName { .. })
        ));
    }

    #[test]
    fn authenticated_url_embeds_encoded_token() {
        let url = RepoUrl::parse("https://github.com/org/repo.git").unwrap();
        let secret = SecretString::from("ab/c@d".to_string());
        assert_eq!(
            url.authenticated(&secret),
            "https://ab%2Fc%40d@github.com/org/repo.git"
        );
    }

    #[test]
    fn authenticated_url_replaces_existing_userinfo() {
        let url = RepoUrl::parse("https://bob@git.example.com/org/repo.git").unwrap();
        let secret = SecretString::from("tok".to_string());
        assert_eq!(
            url.authenticated(&secret),
            "https://tok@git.example.com/org/repo.git"
        );
    }

    #[test]
    fn authenticated_url_ignores_at_signs_in_the_path() {
        let url = RepoUrl::parse("https://git.example.com/org/@scope/repo.git").unwrap();
        let secret = SecretString::from("tok".to_string());
        assert_eq!(
            url.authenticated(&secret),
            "https://tok@git.example.com/org/@scope/repo.git"
        );
    }

    #[test]
    fn empty_credential_keeps_url() {
        let url = RepoUrl::parse("https://github.com/org/repo.git").unwrap();
        let secret = SecretString::from(String::new());
        assert_eq!(url.authenticated(&secret), url.as_str());
    }
}
