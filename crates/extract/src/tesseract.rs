//! Tesseract OCR backend: `tesseract <image> stdout tsv`.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::backend::InferenceRunner;
use crate::decode::{OcrWord, RawOutput};
use crate::error::ExtractError;
use crate::retry::{with_retry, AttemptError, RetryPolicy};

/// TSV `level` of page rows and word rows.
const PAGE_LEVEL: i64 = 1;
const WORD_LEVEL: i64 = 5;

pub struct TesseractRunner {
    program: PathBuf,
    language: Option<String>,
    policy: RetryPolicy,
}

impl TesseractRunner {
    pub fn new(program: PathBuf, language: Option<String>, policy: RetryPolicy) -> Self {
        Self { program, language, policy }
    }

    fn command(&self, image: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(image).arg("stdout");
        if let Some(lang) = &self.language {
            cmd.arg("-l").arg(lang);
        }
        cmd.arg("tsv");
        cmd
    }

    fn attempt(&self, image: &Path) -> Result<String, AttemptError> {
        let output = self.command(image).output().map_err(|e| {
            AttemptError::transient(format!("failed to run {}: {e}", self.program.display()))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AttemptError::transient(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl InferenceRunner for TesseractRunner {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn run(&self, image: &Path) -> Result<RawOutput, ExtractError> {
        if !image.is_file() {
            return Err(ExtractError::Io(format!("{}: no such file", image.display())));
        }
        log::info!("tesseract: {}", image.display());

        let tsv = with_retry(self.policy, "tesseract", |_| self.attempt(image))?;
        parse_tsv(&tsv).map(RawOutput::Words)
    }
}

/// Parse Tesseract TSV into words with boxes normalized to 0-1000 by the
/// page size (page row, or the extent of all words when there is none).
pub fn parse_tsv(tsv: &str) -> Result<Vec<OcrWord>, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        .from_reader(tsv.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ExtractError::Backend(format!("bad tesseract TSV header: {e}")))?
        .clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ExtractError::Backend(format!("tesseract TSV lacks '{name}' column")))
    };
    let (level, left, top, width, height, text) = (
        column("level")?,
        column("left")?,
        column("top")?,
        column("width")?,
        column("height")?,
        column("text")?,
    );

    let mut page: Option<(i64, i64)> = None;
    let mut raw_words: Vec<(String, [i64; 4])> = Vec::new();

    for record in reader.records() {
        let record = record.map_err(|e| ExtractError::Backend(format!("bad tesseract TSV row: {e}")))?;
        let int = |col: usize| record.get(col).and_then(|v| v.trim().parse::<i64>().ok());
        let (Some(lvl), Some(l), Some(t), Some(w), Some(h)) =
            (int(level), int(left), int(top), int(width), int(height))
        else {
            continue;
        };

        if lvl == PAGE_LEVEL && page.is_none() {
            page = Some((w, h));
        } else if lvl == WORD_LEVEL {
            let word = record.get(text).unwrap_or_default().trim();
            if !word.is_empty() {
                raw_words.push((word.to_string(), [l, t, l + w, t + h]));
            }
        }
    }

    let (page_w, page_h) = page.unwrap_or_else(|| {
        raw_words.iter().fold((0, 0), |(w, h), (_, b)| (w.max(b[2]), h.max(b[3])))
    });
    let page_w = page_w.max(1);
    let page_h = page_h.max(1);
    let scale = |v: i64, extent: i64| (1000 * v / extent) as i32;

    Ok(raw_words
        .into_iter()
        .map(|(text, b)| {
            OcrWord::new(
                text,
                [scale(b[0], page_w), scale(b[1], page_h), scale(b[2], page_w), scale(b[3], page_h)],
            )
        })
        .collect())
}
