//! Definitions of errors that can occur while resolving deployment configuration

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

/// Errors that can occur while resolving deployment configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No network with the given name is configured
    UnknownNetwork(String),
    /// The private key environment variable is unset or empty
    MissingPrivateKey(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownNetwork(name) => write!(f, "unknown network: {}", name),
            ConfigError::MissingPrivateKey(var) => {
                write!(f, "private key not set, expected `{}` in the environment", var)
            }
        }
    }
}

impl Error for ConfigError {}
