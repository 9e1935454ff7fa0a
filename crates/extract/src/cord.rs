//! CORD markup decoding (Donut-style document models).
//!
//! ```text
//! <s_cord-v2><s_menu><s_nm>Coffee</s_nm><s_cnt>2</s_cnt><s_price>10,000</s_price>
//! <sep/><s_nm>Cake</s_nm>…</s_menu><s_total><s_total_price>35,000</s_total_price></s_total></s_cord-v2>
//! ```
//!
//! Model output is often not well-formed, so structural decoding is backed
//! by a tag scrape.

use once_cell::sync::Lazy;
use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesRef, Event};
use quick_xml::Reader;
use regex::Regex;

use splitbill_io::RawRow;

use crate::decode::{expect_text, non_empty, pick_nested_total, DecodeStrategy, RawExtraction, RawOutput};

const ROOT: &str = "s_cord-v2";
const ROOT_CLOSE: &str = "</s_cord-v2>";

/// Strip generation tokens and make sure the sequence has exactly one root
/// close tag.
pub fn normalize_sequence(raw: &str) -> String {
    let mut seq = raw.to_string();
    for token in ["</s>", "<pad>", "<s>", ROOT_CLOSE] {
        seq = seq.replace(token, "");
    }
    let mut seq = seq.trim().to_string();
    if !seq.starts_with("<s_cord-v2>") {
        seq.insert_str(0, "<s_cord-v2>");
    }
    seq.push_str(ROOT_CLOSE);
    seq
}

#[derive(Default)]
struct Segment {
    name: Option<String>,
    count: Option<String>,
    price: Option<String>,
}

impl Segment {
    fn flush_into(&mut self, rows: &mut Vec<RawRow>) {
        let seg = std::mem::take(self);
        if seg.name.is_none() && seg.price.is_none() {
            return;
        }
        rows.push(RawRow::new(
            seg.name.unwrap_or_default(),
            seg.count.unwrap_or_else(|| "1".to_string()),
            seg.price.unwrap_or_default(),
        ));
    }
}

/// Append the text an entity or character reference stands for. Unknown
/// entities are kept as written.
fn push_reference(text: &mut String, reference: &BytesRef<'_>) {
    if let Ok(Some(ch)) = reference.resolve_char_ref() {
        text.push(ch);
        return;
    }
    let name = String::from_utf8_lossy(&reference[..]);
    match resolve_predefined_entity(&name) {
        Some(value) => text.push_str(value),
        None => {
            text.push('&');
            text.push_str(&name);
            text.push(';');
        }
    }
}

/// Tag body as text, with entities resolved when they parse.
fn unescape_body(body: &str) -> String {
    let body = body.trim();
    match unescape(body) {
        Ok(value) => value.into_owned(),
        Err(_) => body.to_string(),
    }
}

/// Structural decode of well-formed markup.
pub struct CordMarkup;

impl DecodeStrategy for CordMarkup {
    fn name(&self) -> &'static str {
        "cord-markup"
    }

    fn decode(&self, raw: &RawOutput) -> Result<RawExtraction, String> {
        let seq = normalize_sequence(expect_text(raw)?);
        let mut reader = Reader::from_str(&seq);
        // Models write `Fish & Chips` as often as `Fish &amp; Chips`
        reader.config_mut().allow_dangling_amp = true;

        let mut stack: Vec<String> = Vec::new();
        let mut rows = Vec::new();
        let mut segment = Segment::default();
        let mut total_text: Option<String> = None;
        let mut total_fields: Vec<(String, String)> = Vec::new();
        // Text of the innermost open element; entities arrive as separate events
        let mut text = String::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    stack.push(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                    text.clear();
                }
                Ok(Event::Empty(ref e)) => {
                    if e.name().as_ref() == b"sep" && stack.last().map(String::as_str) == Some("s_menu") {
                        segment.flush_into(&mut rows);
                    }
                }
                Ok(Event::Text(ref e)) => match e.decode() {
                    Ok(chunk) => text.push_str(&chunk),
                    Err(err) => return Err(format!("bad text at byte {}: {err}", reader.buffer_position())),
                },
                Ok(Event::GeneralRef(ref e)) => push_reference(&mut text, e),
                Ok(Event::End(_)) => {
                    let value = std::mem::take(&mut text).trim().to_string();
                    if !value.is_empty() && !stack.iter().any(|s| s == "s_sub") {
                        let field = stack.last().map(String::as_str).unwrap_or_default();
                        let parent = stack
                            .len()
                            .checked_sub(2)
                            .map(|i| stack[i].as_str())
                            .unwrap_or_default();
                        match (parent, field) {
                            ("s_menu", "s_nm") => {
                                if segment.name.is_some() {
                                    segment.flush_into(&mut rows);
                                }
                                segment.name = Some(value);
                            }
                            ("s_menu", "s_cnt") => segment.count = Some(value),
                            ("s_menu", "s_price") => segment.price = Some(value),
                            ("s_total", "s_total_price") => total_text = Some(value),
                            ("s_total_price", key) => total_fields.push((key.to_string(), value)),
                            _ => {}
                        }
                    }
                    if stack.pop().as_deref() == Some("s_menu") {
                        segment.flush_into(&mut rows);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(format!(
                        "malformed markup at byte {}: {e}",
                        reader.buffer_position()
                    ))
                }
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(format!("unclosed element <{}>", stack.join("><")));
        }
        segment.flush_into(&mut rows);

        non_empty(RawExtraction {
            rows,
            total: pick_nested_total(&total_fields, total_text.as_deref()),
        })
    }
}

static NAME_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<s_nm>(.*?)</s_nm>").expect("static regex"));
static COUNT_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<s_cnt>(.*?)</s_cnt>").expect("static regex"));
static PRICE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<s_price>(.*?)</s_price>").expect("static regex"));
static TOTAL_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<s_total_price>(.*?)</s_total_price>").expect("static regex"));
static NESTED_TOTAL_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<(grand_total|tagihan|total_bill|total|value)>(.*?)</(?:grand_total|tagihan|total_bill|total|value)>")
        .expect("static regex")
});
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("static regex"));

/// Tag scrape for markup the structural decoder rejects. Name, count and
/// price lists are zipped and trimmed to the shortest.
pub struct CordScrape;

impl DecodeStrategy for CordScrape {
    fn name(&self) -> &'static str {
        "cord-scrape"
    }

    fn decode(&self, raw: &RawOutput) -> Result<RawExtraction, String> {
        let seq = normalize_sequence(expect_text(raw)?);
        let capture = |re: &Regex| -> Vec<String> {
            re.captures_iter(&seq).map(|c| unescape_body(&c[1])).collect()
        };

        let names = capture(&NAME_TAG);
        let counts = capture(&COUNT_TAG);
        let prices = capture(&PRICE_TAG);
        let rows = names
            .into_iter()
            .zip(counts)
            .zip(prices)
            .map(|((name, count), price)| RawRow::new(name, count, price))
            .collect();

        let total = TOTAL_TAG.captures(&seq).and_then(|c| {
            let body = &c[1];
            let fields: Vec<(String, String)> = NESTED_TOTAL_TAG
                .captures_iter(body)
                .map(|n| (n[1].to_string(), unescape_body(&n[2])))
                .collect();
            let own = ANY_TAG.replace_all(body, " ");
            let own = if fields.is_empty() { Some(own.trim()) } else { None };
            pick_nested_total(&fields, own)
        });

        non_empty(RawExtraction { rows, total })
    }
}
