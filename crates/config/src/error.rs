use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Backend name not in the known set.
    UnknownBackend(String),
    /// Settings file could not be read or written.
    Io(String),
    /// Settings could not be serialized.
    Serialize(String),
    /// Keychain unavailable or rejected the operation.
    Keychain(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownBackend(name) => write!(
                f,
                "unknown backend '{name}' (expected one of: gemini, donut, moondream, tesseract)"
            ),
            Self::Io(msg) => write!(f, "settings IO error: {msg}"),
            Self::Serialize(msg) => write!(f, "settings serialization error: {msg}"),
            Self::Keychain(msg) => write!(f, "keychain error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
