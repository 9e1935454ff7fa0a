//! Backend output → raw rows.
//!
//! Each output format has an ordered list of [`DecodeStrategy`]s. They are
//! tried in order and the first success wins; when all of them fail the
//! caller gets [`ExtractError::Undecodable`] with the raw output and every
//! strategy's reason.

use std::borrow::Cow;

use splitbill_config::BackendKind;
use splitbill_core::{IdGenerator, Receipt};
use splitbill_io::{canonicalize, RawRow};

use crate::cord::{CordMarkup, CordScrape};
use crate::error::{ExtractError, StrategyFailure};
use crate::ocr::OcrLayout;
use crate::reply::{BraceSpanJson, FencedJson, FieldScrape};

/// One OCR word with its box on a 0-1000 page scale: `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrWord {
    pub text: String,
    pub bbox: [i32; 4],
}

impl OcrWord {
    pub fn new(text: impl Into<String>, bbox: [i32; 4]) -> Self {
        Self {
            text: text.into(),
            bbox,
        }
    }
}

/// What a backend produced, before decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutput {
    Text(String),
    Words(Vec<OcrWord>),
}

impl RawOutput {
    /// Textual rendering for error reports. Words become one per line.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            RawOutput::Text(text) => Cow::Borrowed(text),
            RawOutput::Words(words) => Cow::Owned(
                words
                    .iter()
                    .map(|w| format!("{} {:?}", w.text, w.bbox))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
        }
    }
}

/// Rows and total as text, exactly as a decoder found them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawExtraction {
    pub rows: Vec<RawRow>,
    pub total: Option<String>,
}

impl RawExtraction {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.total.is_none()
    }

    pub fn into_receipt(self, ids: &IdGenerator) -> Receipt {
        canonicalize(self.rows, self.total.as_deref(), ids)
    }
}

pub trait DecodeStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Err` carries a short human-readable reason.
    fn decode(&self, raw: &RawOutput) -> Result<RawExtraction, String>;
}

/// Run strategies in order, first success wins.
pub fn decode_with(
    strategies: &[&dyn DecodeStrategy],
    raw: &RawOutput,
) -> Result<RawExtraction, ExtractError> {
    let mut attempts = Vec::new();
    for strategy in strategies {
        match strategy.decode(raw) {
            Ok(extraction) => {
                if !attempts.is_empty() {
                    log::debug!(
                        "decoded with fallback strategy {} after {} failure(s)",
                        strategy.name(),
                        attempts.len()
                    );
                }
                return Ok(extraction);
            }
            Err(reason) => {
                log::debug!("strategy {} failed: {reason}", strategy.name());
                attempts.push(StrategyFailure {
                    strategy: strategy.name(),
                    reason,
                });
            }
        }
    }
    Err(ExtractError::Undecodable {
        raw: raw.as_text().into_owned(),
        attempts,
    })
}

/// Raw output dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// CORD token markup (`<s_menu><s_nm>…`)
    Cord,
    /// JSON reply of a language model, possibly wrapped in prose or fences
    Json,
    /// OCR words with boxes
    Ocr { line_threshold: i32 },
}

impl OutputFormat {
    pub fn for_backend(kind: BackendKind, line_threshold: i32) -> Self {
        match kind {
            BackendKind::Donut => OutputFormat::Cord,
            BackendKind::Gemini | BackendKind::Moondream => OutputFormat::Json,
            BackendKind::Tesseract => OutputFormat::Ocr { line_threshold },
        }
    }

    pub fn decode(&self, raw: &RawOutput) -> Result<RawExtraction, ExtractError> {
        match *self {
            OutputFormat::Cord => decode_with(&[&CordMarkup, &CordScrape], raw),
            OutputFormat::Json => decode_with(&[&FencedJson, &BraceSpanJson, &FieldScrape], raw),
            OutputFormat::Ocr { line_threshold } => {
                decode_with(&[&OcrLayout::new(line_threshold)], raw)
            }
        }
    }
}

/// Text body of a [`RawOutput`] for text-based strategies.
pub(crate) fn expect_text(raw: &RawOutput) -> Result<&str, String> {
    match raw {
        RawOutput::Text(text) => Ok(text),
        RawOutput::Words(_) => Err("expected text output, got OCR words".to_string()),
    }
}

pub(crate) fn non_empty(extraction: RawExtraction) -> Result<RawExtraction, String> {
    if extraction.is_empty() {
        Err("no items or total found".to_string())
    } else {
        Ok(extraction)
    }
}

/// Keys tried, in order, when a total is a nested structure.
pub const NESTED_TOTAL_KEYS: [&str; 3] = ["grand_total", "tagihan", "total_bill"];

/// Keys holding a generic text value inside a nested total.
const GENERIC_TOTAL_KEYS: [&str; 3] = ["#text", "total", "value"];

/// Pick the total out of a nested structure's `(key, text)` pairs, falling
/// back to the element's own text.
pub(crate) fn pick_nested_total(fields: &[(String, String)], own_text: Option<&str>) -> Option<String> {
    let lookup = |key: &str| {
        fields
            .iter()
            .find(|(k, v)| k == key && !v.trim().is_empty())
            .map(|(_, v)| v.trim().to_string())
    };
    NESTED_TOTAL_KEYS
        .iter()
        .find_map(|key| lookup(key))
        .or_else(|| own_text.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string))
        .or_else(|| GENERIC_TOTAL_KEYS.iter().find_map(|key| lookup(key)))
}
