//! `splitbill-extract`: turn a receipt photo into a canonical receipt.
//!
//! A backend is an [`InferenceRunner`] (hosted model, local sidecar program,
//! OCR engine) paired with the [`OutputFormat`] its raw output uses. Raw
//! output goes through an ordered list of decode strategies and then the
//! canonicalizer in `splitbill-io`.

pub mod backend;
pub mod command;
pub mod cord;
pub mod decode;
pub mod error;
pub mod gemini;
pub mod ocr;
pub mod reply;
pub mod retry;
pub mod tesseract;

pub use backend::{build_extractor, BackendExtractor, Extractor, InferenceRunner};
pub use decode::{decode_with, DecodeStrategy, OcrWord, OutputFormat, RawExtraction, RawOutput};
pub use error::{ExtractError, StrategyFailure};
