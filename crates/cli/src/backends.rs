//! `splitbill backends`: configuration doctor for the extraction backends.

use std::path::Path;

use splitbill_config::{keys, BackendKind, ResolvedBackend, Settings};

use crate::exit_codes::EXIT_CONFIGURATION;
use crate::CliError;

pub fn cmd_backends(settings: &Settings, config: Option<&Path>, json: bool) -> Result<(), CliError> {
    let resolved = ResolvedBackend::resolve_all(settings);
    let config_path = match config {
        Some(path) => path.display().to_string(),
        None => Settings::config_path_display(),
    };
    let selected = resolved.iter().find(|r| r.kind == settings.backend);

    if json {
        let doc = serde_json::json!({
            "schema_version": 1,
            "config_path": config_path,
            "selected": settings.backend.name(),
            "keychain": if keys::keychain_available() { "ok" } else { "unavailable" },
            "backends": resolved,
        });
        let text = serde_json::to_string_pretty(&doc)
            .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
        println!("{text}");
    } else {
        println!("Backends");
        println!("--------");
        println!("config:   {config_path}");
        println!("selected: {}", settings.backend);
        println!();
        for backend in &resolved {
            let marker = if backend.kind == settings.backend { "*" } else { " " };
            println!("{marker} {backend}");
        }
    }

    match selected {
        Some(backend) if !backend.status.is_ready() => {
            let err = CliError::new(
                EXIT_CONFIGURATION,
                format!("selected backend '{}' is not ready", settings.backend),
            );
            Err(match &backend.blocking_reason {
                Some(reason) => err.with_hint(reason.clone()),
                None => err,
            })
        }
        _ => Ok(()),
    }
}

/// Store a backend API key in the system keychain. The key is read from the
/// first line of stdin so it never shows up in shell history.
pub fn cmd_set_key(backend: &str) -> Result<(), CliError> {
    let kind = BackendKind::from_name(backend).map_err(|e| CliError::configuration(e.to_string()))?;
    if !kind.needs_api_key() {
        return Err(CliError::usage(format!("{kind} does not use an API key")));
    }

    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .map_err(|e| CliError::io(format!("cannot read key from stdin: {e}")))?;
    let key = line.trim();
    if key.is_empty() {
        return Err(CliError::usage("no key on stdin")
            .with_hint(format!("echo $KEY | splitbill set-key {}", kind.name())));
    }

    keys::set_api_key(kind.name(), key)
        .map_err(|e| CliError::configuration(e.to_string()).with_hint(keys::key_hint(kind.name())))?;
    eprintln!("stored {} key in the keychain", kind.name());
    Ok(())
}
