// ABOUTME: Application identity derived from a repository URL.
// ABOUTME: Keys the working copy, release directory, proxy rule, and container lookup.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppNameError {
    #[error("application name cannot be empty")]
    Empty,

    #[error("application name cannot start with '{0}'")]
    InvalidStart(char),

    #[error("invalid character in application name: '{0}'")]
    InvalidChar(char),
}

/// Name of the deployed application.
///
/// The name is interpolated into remote paths and shell commands, so it is
/// restricted to ASCII alphanumerics, `-`, `_` and `.`, and must start with an
/// alphanumeric.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppName(String);

impl AppName {
    pub fn new(value: &str) -> Result<Self, AppNameError> {
        let value = value.trim();
        let first = value.chars().next().ok_or(AppNameError::Empty)?;

        if !first.is_ascii_alphanumeric() {
            return Err(AppNameError::InvalidStart(first));
        }

        for c in value.chars() {
            if !c.is_ascii_alphanumeric() && c != '-' && c != '_' && c != '.' {
                return Err(AppNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compose project and container name, and the substring used to find
    /// the running container.
    ///
    /// Normalized the way compose normalizes project names: lowercase, with
    /// anything outside `[a-z0-9_-]` dropped. Never empty, since the name
    /// starts with an alphanumeric. This is a substring match: an app named
    /// `web` also matches containers of an app named `webshop`.
    pub fn container_filter(&self) -> String {
        self.0
            .chars()
            .map(|c| c.to_ascii_lowercase())
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect()
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_names() {
        assert_eq!(AppName::new("widgets").unwrap().as_str(), "widgets");
        assert_eq!(AppName::new("todo_app-2.0").unwrap().as_str(), "todo_app-2.0");
    }

    #[test]
    fn rejects_shell_metacharacters() {
        assert_eq!(AppName::new("a;b"), Err(AppNameError::InvalidChar(';')));
        assert_eq!(AppName::new("a b"), Err(AppNameError::InvalidChar(' ')));
        assert_eq!(AppName::new("a/b"), Err(AppNameError::InvalidChar('/')));
    }

    #[test]
    fn rejects_leading_dot_or_hyphen() {
        assert_eq!(AppName::new(".."), Err(AppNameError::InvalidStart('.')));
        assert_eq!(AppName::new("-rf"), Err(AppNameError::InvalidStart('-')));
        assert_eq!(AppName::new("_x"), Err(AppNameError::InvalidStart('_')));
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(AppName::new("   "), Err(AppNameError::Empty));
    }

    #[test]
    fn container_filter_is_lowercase() {
        let name = AppName::new("MyApp").unwrap();
        assert_eq!(name.container_filter(), "myapp");
    }

    #[test]
    fn container_filter_drops_dots_like_compose() {
        let name = AppName::new("Site.io").unwrap();
        assert_eq!(name.as_str(), "Site.io");
        assert_eq!(name.container_filter(), "siteio");
        assert_eq!(
            AppName::new("todo_app-2.0").unwrap().container_filter(),
            "todo_app-20"
        );
    }
}
