// Resolved backend configuration (single source of truth)

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::keys::{get_api_key, key_hint, KeySource};
use crate::settings::{BackendKind, Settings};

/// Status of a backend's configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendStatus {
    Ready,
    /// Backend needs an API key and none was found
    MissingKey,
    /// Backend runs an external program that is not on PATH
    MissingProgram,
}

impl BackendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::MissingKey => "missing_key",
            Self::MissingProgram => "missing_program",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// The effective configuration of one backend, resolved from settings,
/// key sources and PATH.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedBackend {
    pub kind: BackendKind,
    pub status: BackendStatus,
    #[serde(skip)]
    pub api_key: Option<String>,
    #[serde(serialize_with = "serialize_key_source")]
    pub key_source: KeySource,
    /// Absolute path of the external program, when one is needed and found
    pub program: Option<PathBuf>,
    /// Human-readable reason if not ready
    pub blocking_reason: Option<String>,
}

fn serialize_key_source<S: serde::Serializer>(source: &KeySource, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(source.as_str())
}

impl ResolvedBackend {
    /// Resolve the backend selected in settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::resolve(settings, settings.backend)
    }

    pub fn resolve(settings: &Settings, kind: BackendKind) -> Self {
        let mut resolved = Self {
            kind,
            status: BackendStatus::Ready,
            api_key: None,
            key_source: KeySource::None,
            program: None,
            blocking_reason: None,
        };

        if kind.needs_api_key() {
            let lookup = get_api_key(kind.name());
            match lookup.key {
                Some(key) => {
                    resolved.api_key = Some(key);
                    resolved.key_source = lookup.source;
                }
                None => {
                    resolved.status = BackendStatus::MissingKey;
                    resolved.blocking_reason =
                        Some(format!("no API key found; {}", key_hint(kind.name())));
                }
            }
            return resolved;
        }

        let program = match kind {
            BackendKind::Tesseract => settings.tesseract.program.as_str(),
            _ => settings
                .sidecar(kind)
                .map(|s| s.program.as_str())
                .unwrap_or_default(),
        };

        if program.trim().is_empty() {
            resolved.status = BackendStatus::MissingProgram;
            resolved.blocking_reason = Some(format!("no program configured for {kind}"));
            return resolved;
        }

        match which::which(program) {
            Ok(path) => resolved.program = Some(path),
            Err(_) => {
                resolved.status = BackendStatus::MissingProgram;
                resolved.blocking_reason = Some(format!("'{program}' not found on PATH"));
            }
        }
        resolved
    }

    /// Every known backend, for diagnostics.
    pub fn resolve_all(settings: &Settings) -> Vec<Self> {
        BackendKind::ALL
            .iter()
            .map(|kind| Self::resolve(settings, *kind))
            .collect()
    }
}

impl fmt::Display for ResolvedBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<10} {:<16}", self.kind.name(), self.status.as_str())?;
        if let Some(program) = &self.program {
            write!(f, " {}", program.display())?;
        }
        if self.kind.needs_api_key() && self.api_key.is_some() {
            write!(f, " key: {}", self.key_source.as_str())?;
        }
        if let Some(reason) = &self.blocking_reason {
            write!(f, " ({reason})")?;
        }
        Ok(())
    }
}
