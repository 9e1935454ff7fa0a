//! JSON replies from language-model backends.
//!
//! Models are asked for `{"menus": [{"name", "count", "price"}], "total"}`
//! but wrap it in prose, code fences, or break it outright.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use splitbill_io::{format_amount, RawRow};

use crate::decode::{expect_text, non_empty, pick_nested_total, DecodeStrategy, RawExtraction, RawOutput};

static FENCED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").expect("static regex"));

/// JSON inside a fenced code block.
pub struct FencedJson;

impl DecodeStrategy for FencedJson {
    fn name(&self) -> &'static str {
        "fenced-json"
    }

    fn decode(&self, raw: &RawOutput) -> Result<RawExtraction, String> {
        let text = expect_text(raw)?;
        let body = FENCED
            .captures(text)
            .map(|c| c.get(1).map_or("", |m| m.as_str()))
            .ok_or("no fenced block")?;
        from_json_text(body)
    }
}

/// JSON between the first `{` and the last `}`.
pub struct BraceSpanJson;

impl DecodeStrategy for BraceSpanJson {
    fn name(&self) -> &'static str {
        "brace-span-json"
    }

    fn decode(&self, raw: &RawOutput) -> Result<RawExtraction, String> {
        let text = expect_text(raw)?;
        match (text.find('{'), text.rfind('}')) {
            (Some(start), Some(end)) if start < end => from_json_text(&text[start..=end]),
            _ => Err("no JSON object found".to_string()),
        }
    }
}

fn from_json_text(body: &str) -> Result<RawExtraction, String> {
    let value: Value = serde_json::from_str(body).map_err(|e| format!("invalid JSON: {e}"))?;
    from_value(&value)
}

/// Read a decoded reply. Items come from `menus` or `items`.
pub fn from_value(value: &Value) -> Result<RawExtraction, String> {
    let obj = value.as_object().ok_or("reply is not a JSON object")?;

    let items = ["menus", "items"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_array));

    let rows: Vec<RawRow> = items
        .map(|list| list.iter().filter_map(Value::as_object).map(item_row).collect())
        .unwrap_or_default();

    let total = obj.get("total").and_then(total_text);

    non_empty(RawExtraction { rows, total })
}

fn item_row(item: &Map<String, Value>) -> RawRow {
    let field = |keys: &[&str]| keys.iter().find_map(|k| item.get(*k).and_then(scalar_text));
    RawRow::new(
        field(&["name"]).unwrap_or_default(),
        field(&["count", "qty", "quantity"]).unwrap_or_else(|| "1".to_string()),
        field(&["price", "total_price"]).unwrap_or_default(),
    )
}

/// Strings verbatim, numbers through [`format_amount`] so re-parsing can't
/// mistake `0.125` for a thousands group.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(i.to_string()),
            None => n.as_f64().map(format_amount),
        },
        _ => None,
    }
}

fn total_text(value: &Value) -> Option<String> {
    match value {
        Value::Object(fields) => {
            let fields: Vec<(String, String)> = fields
                .iter()
                .filter_map(|(k, v)| scalar_text(v).map(|t| (k.clone(), t)))
                .collect();
            pick_nested_total(&fields, None)
        }
        other => scalar_text(other),
    }
}

static NAME_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""name"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("static regex"));
static COUNT_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""(?:count|qty|quantity)"\s*:\s*"?([^",}\]\n]*)"#).expect("static regex")
});
static PRICE_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""(?:price|total_price)"\s*:\s*"?([^",}\]\n]*)"#).expect("static regex")
});
static TOTAL_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""total"\s*:\s*"?([^",}\]\n]*)"#).expect("static regex"));

/// Field scrape of broken JSON. Name, count and price lists are zipped and
/// trimmed to the shortest; the last `"total"` wins.
pub struct FieldScrape;

impl DecodeStrategy for FieldScrape {
    fn name(&self) -> &'static str {
        "field-scrape"
    }

    fn decode(&self, raw: &RawOutput) -> Result<RawExtraction, String> {
        let text = expect_text(raw)?;
        let capture = |re: &Regex| -> Vec<String> {
            re.captures_iter(text)
                .map(|c| c[1].trim().to_string())
                .collect()
        };

        let rows = capture(&NAME_FIELD)
            .into_iter()
            .zip(capture(&COUNT_FIELD))
            .zip(capture(&PRICE_FIELD))
            .map(|((name, count), price)| RawRow::new(name.replace("\\\"", "\""), count, price))
            .collect();

        let total = capture(&TOTAL_FIELD)
            .into_iter()
            .filter(|t| !t.is_empty())
            .last();

        non_empty(RawExtraction { rows, total })
    }
}
