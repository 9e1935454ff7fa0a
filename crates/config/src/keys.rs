// API key lookup
//
// Keys are looked up in:
// 1. System keychain (with the `keychain` feature)
// 2. SPLITBILL_<PROVIDER>_KEY
// 3. Provider-specific conventional variables (GOOGLE_API_KEY for gemini)
//
// Keys are NEVER stored in settings.json

use std::env;

use crate::error::ConfigError;

/// Service name for keychain storage
#[cfg(feature = "keychain")]
const KEYCHAIN_SERVICE: &str = "splitbill";

/// Source of an API key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Keychain,
    Environment,
    None,
}

impl KeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySource::Keychain => "keychain",
            KeySource::Environment => "environment",
            KeySource::None => "none",
        }
    }
}

/// Result of key lookup
#[derive(Debug, Clone)]
pub struct KeyLookup {
    pub key: Option<String>,
    pub source: KeySource,
}

/// Environment variable name for a provider
pub fn env_var_name(provider: &str) -> String {
    format!("SPLITBILL_{}_KEY", provider.to_uppercase())
}

fn fallback_env_vars(provider: &str) -> &'static [&'static str] {
    match provider.to_lowercase().as_str() {
        "gemini" => &["GOOGLE_API_KEY"],
        _ => &[],
    }
}

#[cfg(feature = "keychain")]
fn keychain_account(provider: &str) -> String {
    format!("backend/{}", provider.to_lowercase())
}

/// Get an API key for the specified provider
pub fn get_api_key(provider: &str) -> KeyLookup {
    #[cfg(feature = "keychain")]
    {
        if let Ok(entry) = keyring::Entry::new(KEYCHAIN_SERVICE, &keychain_account(provider)) {
            if let Ok(key) = entry.get_password() {
                return KeyLookup {
                    key: Some(key),
                    source: KeySource::Keychain,
                };
            }
        }
    }

    let primary = env_var_name(provider);
    let names = std::iter::once(primary.as_str()).chain(fallback_env_vars(provider).iter().copied());
    for name in names {
        if let Ok(key) = env::var(name) {
            if !key.trim().is_empty() {
                log::debug!("{provider} key found in ${name}");
                return KeyLookup {
                    key: Some(key),
                    source: KeySource::Environment,
                };
            }
        }
    }

    KeyLookup {
        key: None,
        source: KeySource::None,
    }
}

/// Human-readable list of where a key may be put.
pub fn key_hint(provider: &str) -> String {
    let mut vars = vec![env_var_name(provider)];
    vars.extend(fallback_env_vars(provider).iter().map(|v| v.to_string()));
    if keychain_available() {
        format!("store it in the keychain or set {}", vars.join(" / "))
    } else {
        format!("set {}", vars.join(" / "))
    }
}

/// Store an API key in the system keychain
#[cfg(feature = "keychain")]
pub fn set_api_key(provider: &str, key: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, &keychain_account(provider))
        .map_err(|e| ConfigError::Keychain(format!("failed to create keychain entry: {e}")))?;

    entry
        .set_password(key)
        .map_err(|e| ConfigError::Keychain(format!("failed to store key: {e}")))
}

#[cfg(not(feature = "keychain"))]
pub fn set_api_key(provider: &str, _key: &str) -> Result<(), ConfigError> {
    Err(ConfigError::Keychain(format!(
        "keychain support not enabled; set {} instead",
        env_var_name(provider)
    )))
}

/// Check if keychain support is available
pub fn keychain_available() -> bool {
    #[cfg(feature = "keychain")]
    {
        keyring::Entry::new(KEYCHAIN_SERVICE, "test").is_ok()
    }
    #[cfg(not(feature = "keychain"))]
    {
        false
    }
}
