use std::path::Path;

use splitbill_config::{BackendKind, ResolvedBackend, Settings};
use splitbill_core::{IdGenerator, Receipt};

use crate::command::CommandRunner;
use crate::decode::{OutputFormat, RawExtraction, RawOutput};
use crate::error::ExtractError;
use crate::gemini::GeminiRunner;
use crate::retry::RetryPolicy;
use crate::tesseract::TesseractRunner;

/// Produces raw output for one image.
pub trait InferenceRunner: Send + Sync {
    fn name(&self) -> &str;
    fn run(&self, image: &Path) -> Result<RawOutput, ExtractError>;
}

/// Image in, canonical receipt out.
pub trait Extractor {
    fn extract(&self, image: &Path, ids: &IdGenerator) -> Result<Receipt, ExtractError>;
}

/// A runner paired with the format of what it prints.
pub struct BackendExtractor {
    kind: BackendKind,
    runner: Box<dyn InferenceRunner>,
    format: OutputFormat,
}

impl BackendExtractor {
    pub fn new(kind: BackendKind, runner: Box<dyn InferenceRunner>, format: OutputFormat) -> Self {
        Self { kind, runner, format }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Run and decode, without canonicalizing.
    pub fn extract_raw(&self, image: &Path) -> Result<RawExtraction, ExtractError> {
        let raw = self.runner.run(image)?;
        let extraction = self.format.decode(&raw)?;
        log::debug!(
            "{}: decoded {} row(s), total {:?}",
            self.runner.name(),
            extraction.rows.len(),
            extraction.total
        );
        Ok(extraction)
    }
}

impl Extractor for BackendExtractor {
    fn extract(&self, image: &Path, ids: &IdGenerator) -> Result<Receipt, ExtractError> {
        let receipt = self.extract_raw(image)?.into_receipt(ids);
        log::info!(
            "{}: {} item(s), total {}",
            self.kind,
            receipt.len(),
            receipt.total
        );
        Ok(receipt)
    }
}

/// Build the extractor for `kind`, failing with a configuration error when
/// its key or program is missing.
pub fn build_extractor(settings: &Settings, kind: BackendKind) -> Result<BackendExtractor, ExtractError> {
    let resolved = ResolvedBackend::resolve(settings, kind);
    if !resolved.status.is_ready() {
        let reason = resolved
            .blocking_reason
            .unwrap_or_else(|| resolved.status.as_str().to_string());
        return Err(ExtractError::Configuration(format!("{kind}: {reason}")));
    }

    let policy = RetryPolicy::from(&settings.retry);
    let runner: Box<dyn InferenceRunner> = match kind {
        BackendKind::Gemini => {
            let api_key = resolved
                .api_key
                .ok_or_else(|| ExtractError::Configuration("gemini: no API key".to_string()))?;
            Box::new(GeminiRunner::new(&settings.gemini, api_key, policy)?)
        }
        BackendKind::Donut | BackendKind::Moondream => {
            let program = resolved
                .program
                .ok_or_else(|| ExtractError::Configuration(format!("{kind}: no program")))?;
            let args = settings
                .sidecar(kind)
                .map(|s| s.args.clone())
                .unwrap_or_default();
            Box::new(CommandRunner::new(kind.name(), program, args, policy))
        }
        BackendKind::Tesseract => {
            let program = resolved
                .program
                .ok_or_else(|| ExtractError::Configuration("tesseract: no program".to_string()))?;
            Box::new(TesseractRunner::new(
                program,
                settings.tesseract.language.clone(),
                policy,
            ))
        }
    };

    let format = OutputFormat::for_backend(kind, settings.tesseract.line_threshold);
    log::debug!("backend {kind} ready ({format:?})");
    Ok(BackendExtractor::new(kind, runner, format))
}
