// ABOUTME: Validated TCP port the application listens on inside its container.
// ABOUTME: Accepts integers in 1..=65535.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContainerPortError {
    #[error("port must be a number, got '{0}'")]
    NotANumber(String),

    #[error("port {0} is out of range (1-65535)")]
    OutOfRange(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerPort(u16);

impl ContainerPort {
    pub fn new(port: u16) -> Result<Self, ContainerPortError> {
        if port == 0 {
            return Err(ContainerPortError::OutOfRange(0));
        }
        Ok(Self(port))
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl FromStr for ContainerPort {
    type Err = ContainerPortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let value: u64 = s
            .parse()
            .map_err(|_| ContainerPortError::NotANumber(s.to_string()))?;
        let port = u16::try_from(value).map_err(|_| ContainerPortError::OutOfRange(value))?;
        Self::new(port)
    }
}

impl fmt::Display for ContainerPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> serde::Deserialize<'de> for ContainerPort {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let port = u16::deserialize(deserializer)?;
        ContainerPort::new(port).map_err(serde::de::Error::custom)
    }
}
