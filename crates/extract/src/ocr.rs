//! Layout heuristics over OCR word streams.
//!
//! Words arrive in reading order with boxes on a 0-1000 scale. Consecutive
//! words whose top edges are within the threshold form a line; each line is
//! then a total line, a summary line (tax, service, discount, subtotal) or
//! an item line.

use once_cell::sync::Lazy;
use regex::Regex;

use splitbill_io::RawRow;

use crate::decode::{non_empty, DecodeStrategy, OcrWord, RawExtraction, RawOutput};

pub const DEFAULT_LINE_THRESHOLD: i32 = 15;

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:[.,]\d+)*").expect("static regex"));

const SUBTOTAL_KEYWORDS: [&str; 3] = ["subtotal", "sub total", "sub-total"];
const TOTAL_KEYWORDS: [&str; 3] = ["grand total", "total", "tagihan"];
const SUMMARY_KEYWORDS: [&str; 8] = [
    "tax", "service", "serv.", "ppn", "diskon", "discount", "pajak", "charge",
];
const NAME_BLACKLIST: [&str; 10] = [
    "total", "subtotal", "tax", "service", "ppn", "diskon", "discount", "tagihan",
    "serv. charge", "pajak",
];
/// Tokens left over after numbers are removed that are not part of a name.
const NOISE_TOKENS: [&str; 6] = ["x", "@", "rp", "rp.", "idr", "-"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Total,
    Summary,
    Item,
}

/// Join words into lines. A word starts a new line when its top edge is
/// more than `threshold` away from the previous word's.
pub fn group_lines(words: &[OcrWord], threshold: i32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut last_y: Option<i32> = None;

    for word in words {
        let y = word.bbox[1];
        if let Some(prev) = last_y {
            if (y - prev).abs() > threshold && !current.is_empty() {
                lines.push(current.join(" "));
                current.clear();
            }
        }
        current.push(word.text.as_str());
        last_y = Some(y);
    }
    if !current.is_empty() {
        lines.push(current.join(" "));
    }
    lines
}

pub fn classify(line: &str) -> LineKind {
    let low = line.to_lowercase();
    if SUBTOTAL_KEYWORDS.iter().any(|k| low.contains(k)) {
        LineKind::Summary
    } else if TOTAL_KEYWORDS.iter().any(|k| low.contains(k)) {
        LineKind::Total
    } else if SUMMARY_KEYWORDS.iter().any(|k| low.contains(k)) {
        LineKind::Summary
    } else {
        LineKind::Item
    }
}

/// One number: price with count 1. Several: first is the count, last is the
/// price. A first number with separators is a price, not a count.
pub fn parse_item_line(line: &str) -> Option<RawRow> {
    let numbers: Vec<&str> = NUMBER.find_iter(line).map(|m| m.as_str()).collect();
    let (count, price) = match numbers.as_slice() {
        [] => return None,
        [price] => ("1", *price),
        [first, .., last] => {
            let count = if first.contains(|c: char| c == '.' || c == ',') { "1" } else { *first };
            (count, *last)
        }
    };

    let stripped = NUMBER.replace_all(line, " ");
    let name = stripped
        .split_whitespace()
        .filter(|w| w.chars().any(char::is_alphanumeric))
        .filter(|w| !NOISE_TOKENS.contains(&w.to_lowercase().as_str()))
        .collect::<Vec<_>>()
        .join(" ");

    if name.chars().count() < 2 {
        return None;
    }
    let low = name.to_lowercase();
    if NAME_BLACKLIST.iter().any(|b| low.contains(b)) {
        return None;
    }

    Some(RawRow::new(name, count, price))
}

pub struct OcrLayout {
    line_threshold: i32,
}

impl OcrLayout {
    pub fn new(line_threshold: i32) -> Self {
        Self { line_threshold }
    }

    /// Decode already-grouped lines.
    pub fn decode_lines<S: AsRef<str>>(&self, lines: &[S]) -> RawExtraction {
        let mut rows = Vec::new();
        let mut total = None;

        for line in lines {
            let line = line.as_ref();
            match classify(line) {
                LineKind::Total => {
                    if let Some(last) = NUMBER.find_iter(line).last() {
                        total = Some(last.as_str().to_string());
                    }
                }
                LineKind::Summary => log::debug!("summary line skipped: {line:?}"),
                LineKind::Item => match parse_item_line(line) {
                    Some(row) => rows.push(row),
                    None => log::debug!("line rejected: {line:?}"),
                },
            }
        }

        RawExtraction { rows, total }
    }
}

impl Default for OcrLayout {
    fn default() -> Self {
        Self::new(DEFAULT_LINE_THRESHOLD)
    }
}

impl DecodeStrategy for OcrLayout {
    fn name(&self) -> &'static str {
        "ocr-layout"
    }

    fn decode(&self, raw: &RawOutput) -> Result<RawExtraction, String> {
        let lines = match raw {
            RawOutput::Words(words) => group_lines(words, self.line_threshold),
            // Plain text: one line per text line
            RawOutput::Text(text) => text.lines().map(str::to_string).collect(),
        };
        non_empty(self.decode_lines(&lines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, x: i32, y: i32) -> OcrWord {
        OcrWord::new(text, [x, y, x + 40, y + 12])
    }

    #[test]
    fn words_group_by_vertical_distance() {
        let words = vec![
            word("Coffee", 10, 100),
            word("2", 300, 103),
            word("20.000", 800, 98),
            word("Cake", 10, 130),
            word("15.000", 800, 131),
        ];
        assert_eq!(group_lines(&words, 15), vec!["Coffee 2 20.000", "Cake 15.000"]);
        assert_eq!(group_lines(&words, 40).len(), 1);
    }

    #[test]
    fn classification() {
        assert_eq!(classify("GRAND TOTAL 45.000"), LineKind::Total);
        assert_eq!(classify("Tagihan 45.000"), LineKind::Total);
        assert_eq!(classify("Subtotal 40.000"), LineKind::Summary);
        assert_eq!(classify("PPN 10% 4.000"), LineKind::Summary);
        assert_eq!(classify("Serv. Charge 5% 2.000"), LineKind::Summary);
        assert_eq!(classify("Es Teh 2 10.000"), LineKind::Item);
    }

    #[test]
    fn item_lines() {
        let row = parse_item_line("2 x Nasi Goreng 50.000").unwrap();
        assert_eq!((row.name.as_str(), row.count.as_str(), row.price.as_str()), ("Nasi Goreng", "2", "50.000"));

        let row = parse_item_line("Kerupuk 5.000").unwrap();
        assert_eq!((row.count.as_str(), row.price.as_str()), ("1", "5.000"));

        let row = parse_item_line("Ayam 12.500 25.000").unwrap();
        assert_eq!((row.count.as_str(), row.price.as_str()), ("1", "25.000"));
    }

    #[test]
    fn rejected_lines() {
        assert!(parse_item_line("Thank you!").is_none());
        assert!(parse_item_line("A 5.000").is_none());
        assert!(parse_item_line("Rp 5.000").is_none());
        assert!(parse_item_line("Diskon member 5.000").is_none());
    }

    #[test]
    fn full_receipt() {
        let lines = [
            "WARUNG SEDERHANA",
            "Jl. Merdeka 12",
            "2 Nasi Goreng 50.000",
            "Es Teh 3 15.000",
            "Subtotal 65.000",
            "PPN 10% 6.500",
            "Total 71.500",
        ];
        let ex = OcrLayout::default().decode_lines(&lines);
        let rows: Vec<_> = ex
            .rows
            .iter()
            .map(|r| (r.name.as_str(), r.count.as_str(), r.price.as_str()))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("Jl. Merdeka", "1", "12"),
                ("Nasi Goreng", "2", "50.000"),
                ("Es Teh", "3", "15.000"),
            ]
        );
        assert_eq!(ex.total.as_deref(), Some("71.500"));
    }

    #[test]
    fn last_total_line_wins() {
        let ex = OcrLayout::default().decode_lines(&["Kopi 10", "Total 10", "Grand Total 12"]);
        assert_eq!(ex.total.as_deref(), Some("12"));
    }

    #[test]
    fn empty_stream_is_an_error() {
        let raw = RawOutput::Words(vec![word("blurry", 0, 0)]);
        assert!(OcrLayout::default().decode(&raw).is_err());
    }
}
