// Application settings
// Loaded from ~/.config/splitbill/settings.json

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ConfigError;

/// Extraction backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Hosted multimodal model (Google Gemini REST API)
    #[default]
    Gemini,
    /// Donut document model emitting CORD markup, via sidecar program
    Donut,
    /// Moondream vision model emitting JSON, via sidecar program
    Moondream,
    /// Tesseract OCR words + layout heuristics
    Tesseract,
}

impl BackendKind {
    pub const ALL: [BackendKind; 4] = [
        BackendKind::Gemini,
        BackendKind::Donut,
        BackendKind::Moondream,
        BackendKind::Tesseract,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Gemini => "gemini",
            BackendKind::Donut => "donut",
            BackendKind::Moondream => "moondream",
            BackendKind::Tesseract => "tesseract",
        }
    }

    /// Parse a user-facing backend name. Case-insensitive; `moondream2` is an
    /// alias of `moondream`.
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(BackendKind::Gemini),
            "donut" => Ok(BackendKind::Donut),
            "moondream" | "moondream2" => Ok(BackendKind::Moondream),
            "tesseract" | "layoutlm" | "layoutlmv3" => Ok(BackendKind::Tesseract),
            _ => Err(ConfigError::UnknownBackend(name.to_string())),
        }
    }

    pub fn needs_api_key(&self) -> bool {
        matches!(self, BackendKind::Gemini)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl<'de> Deserialize<'de> for BackendKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Self::from_name(&name).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    pub model: String,
    /// Base URL up to and including the API version
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 60,
        }
    }
}

/// External program that runs a local model and prints its raw output.
/// The image path is appended after `args`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SidecarSettings {
    pub program: String,
    pub args: Vec<String>,
}

impl SidecarSettings {
    fn named(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
        }
    }
}

impl Default for SidecarSettings {
    fn default() -> Self {
        Self::named("")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractSettings {
    pub program: String,
    /// Passed as `-l <language>` when set
    pub language: Option<String>,
    /// Vertical distance (0-1000 scale) under which words share a line
    pub line_threshold: i32,
}

impl Default for TesseractSettings {
    fn default() -> Self {
        Self {
            program: "tesseract".to_string(),
            language: None,
            line_threshold: 15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub backend: BackendKind,
    pub gemini: GeminiSettings,
    pub donut: SidecarSettings,
    pub moondream: SidecarSettings,
    pub tesseract: TesseractSettings,
    pub retry: RetrySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            gemini: GeminiSettings::default(),
            donut: SidecarSettings::named("splitbill-donut"),
            moondream: SidecarSettings::named("splitbill-moondream"),
            tesseract: TesseractSettings::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("splitbill");
        config_dir.join("settings.json")
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load settings from a specific file. A missing file yields defaults
    /// silently; an unreadable or malformed one yields defaults with a warning.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => {
                // Strip comments (lines starting with //)
                let cleaned: String = contents
                    .lines()
                    .filter(|line| !line.trim().starts_with("//"))
                    .collect::<Vec<_>>()
                    .join("\n");

                match serde_json::from_str(&cleaned) {
                    Ok(settings) => settings,
                    Err(e) => {
                        log::warn!("error parsing {}: {e}; using default settings", path.display());
                        Self::default()
                    }
                }
            }
            Err(e) => {
                log::warn!("error reading {}: {e}; using default settings", path.display());
                Self::default()
            }
        }
    }

    /// Save current settings to disk
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        fs::write(path, json)?;
        Ok(())
    }

    /// Sidecar program settings for the backends that run one.
    pub fn sidecar(&self, kind: BackendKind) -> Option<&SidecarSettings> {
        match kind {
            BackendKind::Donut => Some(&self.donut),
            BackendKind::Moondream => Some(&self.moondream),
            BackendKind::Gemini | BackendKind::Tesseract => None,
        }
    }

    /// Get the config file path for display
    pub fn config_path_display() -> String {
        Self::config_path().to_string_lossy().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn backend_names_parse_case_insensitively() {
        assert_eq!(BackendKind::from_name("Gemini").unwrap(), BackendKind::Gemini);
        assert_eq!(BackendKind::from_name(" DONUT ").unwrap(), BackendKind::Donut);
        assert_eq!(BackendKind::from_name("Moondream2").unwrap(), BackendKind::Moondream);
        assert_eq!("tesseract".parse::<BackendKind>().unwrap(), BackendKind::Tesseract);
    }

    #[test]
    fn unknown_backend_is_an_error() {
        let err = BackendKind::from_name("gpt-vision").unwrap_err();
        assert_eq!(err, ConfigError::UnknownBackend("gpt-vision".to_string()));
        assert!(err.to_string().contains("gpt-vision"));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("nope.json"));
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.gemini.model, "gemini-2.5-flash");
        assert_eq!(settings.tesseract.line_threshold, 15);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{
    // which model runs
    "backend": "Moondream2",
    "retry": { "max_retries": 5 }
}"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path);
        assert_eq!(settings.backend, BackendKind::Moondream);
        assert_eq!(settings.retry.max_retries, 5);
        assert_eq!(settings.retry.initial_backoff_ms, 1000);
        assert_eq!(settings.moondream.program, "splitbill-moondream");
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"backend": "nonsense"}"#).unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut settings = Settings::default();
        settings.backend = BackendKind::Donut;
        settings.donut.args = vec!["--device".into(), "cpu".into()];
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path);
        assert_eq!(loaded, settings);
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"backend\": \"donut\""));
    }

    #[test]
    fn sidecar_lookup() {
        let settings = Settings::default();
        assert!(settings.sidecar(BackendKind::Donut).is_some());
        assert!(settings.sidecar(BackendKind::Gemini).is_none());
    }
}
