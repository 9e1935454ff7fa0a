//! `splitbill extract` and `splitbill decode`: photo or saved backend output
//! to a canonical receipt.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use splitbill_config::{BackendKind, Settings};
use splitbill_core::{IdGenerator, Receipt};
use splitbill_extract::tesseract::parse_tsv;
use splitbill_extract::{build_extractor, ExtractError, Extractor, OutputFormat, RawOutput};
use splitbill_io::csv::export_items;
use splitbill_io::receipt_to_json;

use crate::{emit, CliError, RawFormat};

pub fn cmd_extract(
    settings: &Settings,
    image: PathBuf,
    backend: Option<String>,
    out: Option<PathBuf>,
    json: bool,
    save_raw: Option<PathBuf>,
) -> Result<(), CliError> {
    let kind = match backend {
        Some(name) => BackendKind::from_str(&name)
            .map_err(|e| CliError::configuration(e.to_string()))?,
        None => settings.backend,
    };
    tracing::debug!("using backend {kind}");

    let extractor = build_extractor(settings, kind).map_err(CliError::extract)?;
    let ids = IdGenerator::new();

    let receipt = match extractor.extract(&image, &ids) {
        Ok(receipt) => receipt,
        Err(err) => {
            let mut saved = false;
            if let (Some(path), Some(raw)) = (&save_raw, err.raw_output()) {
                std::fs::write(path, raw)
                    .map_err(|e| CliError::io(format!("cannot write {}: {e}", path.display())))?;
                eprintln!("raw backend output saved to {}", path.display());
                saved = true;
            }
            let undecodable = matches!(err, ExtractError::Undecodable { .. });
            let cli_err = CliError::extract(err);
            return Err(if undecodable && !saved {
                cli_err.with_hint("rerun with --save-raw FILE to keep the backend output")
            } else {
                cli_err
            });
        }
    };

    write_receipt(&receipt, out.as_deref(), json)
}

pub fn cmd_decode(
    settings: &Settings,
    input: PathBuf,
    format: RawFormat,
    line_threshold: Option<i32>,
    out: Option<PathBuf>,
    json: bool,
) -> Result<(), CliError> {
    let text = std::fs::read_to_string(&input)
        .map_err(|e| CliError::io(format!("cannot read {}: {e}", input.display())))?;

    let (raw, output_format) = match format {
        RawFormat::Cord => (RawOutput::Text(text), OutputFormat::Cord),
        RawFormat::Json => (RawOutput::Text(text), OutputFormat::Json),
        RawFormat::Tsv => {
            let words = parse_tsv(&text).map_err(|e| {
                CliError::usage(format!("{}: {e}", input.display()))
            })?;
            let line_threshold = line_threshold.unwrap_or(settings.tesseract.line_threshold);
            (RawOutput::Words(words), OutputFormat::Ocr { line_threshold })
        }
    };

    let extraction = output_format.decode(&raw).map_err(CliError::extract)?;
    let receipt = extraction.into_receipt(&IdGenerator::new());
    write_receipt(&receipt, out.as_deref(), json)
}

fn write_receipt(receipt: &Receipt, out: Option<&Path>, json: bool) -> Result<(), CliError> {
    let content = if json {
        receipt_to_json(receipt)
    } else {
        export_items(receipt)
    }
    .map_err(|e| CliError::general(e.to_string()))?;

    emit(&content, out)?;

    eprintln!(
        "{} item(s), subtotal {:.2}, total {:.2}, others {:.2}",
        receipt.len(),
        receipt.subtotal(),
        receipt.total,
        receipt.others()
    );
    if receipt.is_empty() {
        tracing::warn!("receipt has no items");
    }
    Ok(())
}
