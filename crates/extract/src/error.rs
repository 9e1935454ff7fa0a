use std::fmt;

/// Why one decode strategy gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyFailure {
    pub strategy: &'static str,
    pub reason: String,
}

#[derive(Debug)]
pub enum ExtractError {
    /// Backend cannot be built: unknown name, missing key or program.
    Configuration(String),
    /// Image could not be read.
    Io(String),
    /// Backend ran but failed (HTTP error, non-zero exit, empty output).
    Backend(String),
    /// Every decode strategy rejected the backend output.
    Undecodable {
        raw: String,
        attempts: Vec<StrategyFailure>,
    },
}

impl ExtractError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Raw backend output, when decoding is what failed.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            Self::Undecodable { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "configuration error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::Backend(msg) => write!(f, "extraction failed: {msg}"),
            Self::Undecodable { attempts, .. } => {
                write!(f, "could not decode backend output")?;
                for (i, a) in attempts.iter().enumerate() {
                    let sep = if i == 0 { ": " } else { "; " };
                    write!(f, "{sep}{} ({})", a.strategy, a.reason)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ExtractError {}

impl From<splitbill_config::ConfigError> for ExtractError {
    fn from(e: splitbill_config::ConfigError) -> Self {
        Self::Configuration(e.to_string())
    }
}
