// Receipt and report JSON documents

use serde::{Deserialize, Serialize};
use serde_json::Value;

use splitbill_core::{IdGenerator, Receipt};
use splitbill_engine::{ParticipantReport, Report};

use crate::amount::try_parse_amount;
use crate::canonical::{coerce_count, coerce_count_value, finish_item};
use crate::error::IoError;
use crate::REPORT_FORMAT_VERSION;

/// `{total, subtotal, items}` exchange document for a canonical receipt.
///
/// On read, `subtotal` is informational and recomputed from the items;
/// `count` and `total_price` may be numbers or text and are coerced like
/// backend output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptDocument {
    #[serde(default)]
    pub total: Option<Value>,
    #[serde(default)]
    pub subtotal: Option<f64>,
    #[serde(default)]
    pub items: Vec<ItemEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub count: Option<Value>,
    #[serde(default)]
    pub total_price: Option<Value>,
}

pub fn receipt_to_json(receipt: &Receipt) -> Result<String, IoError> {
    let doc = ReceiptDocument {
        total: Some(Value::from(receipt.total)),
        subtotal: Some(receipt.subtotal()),
        items: receipt
            .items()
            .map(|it| ItemEntry {
                id: Some(it.id.0),
                name: it.name.clone(),
                count: Some(Value::from(it.count)),
                total_price: Some(Value::from(it.total_price)),
            })
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Read a receipt document. Ids in the document are ignored and fresh ones
/// drawn from `ids`; a missing or unusable total falls back to the subtotal.
pub fn receipt_from_json(content: &str, ids: &IdGenerator) -> Result<Receipt, IoError> {
    let doc: ReceiptDocument = serde_json::from_str(content)?;

    let items: Vec<_> = doc
        .items
        .iter()
        .enumerate()
        .filter_map(|(row, entry)| {
            let count = match &entry.count {
                Some(Value::String(s)) => coerce_count(s),
                Some(v) => coerce_count_value(value_as_i64(v)),
                None => 1,
            };
            let price = entry.total_price.as_ref().and_then(value_as_amount);
            finish_item(row, &entry.name, count, price, ids)
        })
        .collect();

    let subtotal: f64 = items.iter().map(|it| it.total_price).sum();
    let total = doc.total.as_ref().and_then(value_as_amount).unwrap_or_else(|| {
        log::debug!("receipt document has no usable total, defaulting to subtotal {subtotal}");
        subtotal
    });

    Ok(Receipt::new(items, total))
}

fn value_as_i64(v: &Value) -> Option<i64> {
    v.as_i64().or_else(|| {
        v.as_f64()
            .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

fn value_as_amount(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => try_parse_amount(s),
        _ => None,
    }
}

#[derive(Debug, Serialize)]
pub struct ReportMeta {
    pub format_version: u32,
    pub engine_version: String,
    pub generated_at: String,
}

#[derive(Debug, Serialize)]
pub struct ReportSummary {
    pub receipt_total: f64,
    pub receipt_subtotal: f64,
    pub others_total: f64,
    pub unclaimed_subtotal: f64,
    pub allocated_total: f64,
    pub participant_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ReportDocument<'a> {
    pub meta: ReportMeta,
    pub summary: ReportSummary,
    pub participants: &'a [ParticipantReport],
}

pub fn report_document(report: &Report) -> ReportDocument<'_> {
    ReportDocument {
        meta: ReportMeta {
            format_version: REPORT_FORMAT_VERSION,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
        },
        summary: ReportSummary {
            receipt_total: report.receipt_total,
            receipt_subtotal: report.receipt_subtotal,
            others_total: report.others_total,
            unclaimed_subtotal: report.unclaimed_subtotal,
            allocated_total: report.allocated_total(),
            participant_count: report.participants.len(),
        },
        participants: &report.participants,
    }
}

pub fn report_to_json(report: &Report) -> Result<String, IoError> {
    Ok(serde_json::to_string_pretty(&report_document(report))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use splitbill_core::{Item, ParticipantRoster};
    use splitbill_engine::{compute_report, AssignmentLedger};

    #[test]
    fn receipt_document_reads_back() {
        let ids = IdGenerator::new();
        let receipt = Receipt::new(
            vec![
                Item::new(ids.next_item(), "Coffee", 2, 10_000.0),
                Item::new(ids.next_item(), "Cake", 1, 15_000.0),
            ],
            35_000.0,
        );
        let json = receipt_to_json(&receipt).unwrap();
        let back = receipt_from_json(&json, &ids).unwrap();

        assert_eq!(back.total, 35_000.0);
        assert_eq!(back.subtotal(), 25_000.0);
        let names: Vec<_> = back.items().map(|it| (it.name.as_str(), it.count)).collect();
        assert_eq!(names, vec![("Coffee", 2), ("Cake", 1)]);
        assert!(back.items().all(|it| receipt.get(it.id).is_none()));
    }

    #[test]
    fn hand_written_document_is_coerced() {
        let ids = IdGenerator::new();
        let json = r#"{
            "total": "Rp 40.000",
            "items": [
                {"name": " Es  Teh ", "count": "2x", "total_price": "10.000"},
                {"name": "Sate", "count": 0, "total_price": -5},
                {"name": "", "count": 1, "total_price": 100},
                {"name": "Kopi", "count": 3.0}
            ]
        }"#;
        let receipt = receipt_from_json(json, &ids).unwrap();
        let rows: Vec<_> = receipt
            .items()
            .map(|it| (it.name.as_str(), it.count, it.total_price))
            .collect();
        assert_eq!(
            rows,
            vec![("Es Teh", 2, 10_000.0), ("Sate", 1, 0.0), ("Kopi", 3, 0.0)]
        );
        assert_eq!(receipt.total, 40_000.0);
    }

    #[test]
    fn missing_total_defaults_to_subtotal() {
        let ids = IdGenerator::new();
        let json = r#"{"items": [{"name": "A", "count": 1, "total_price": 7}]}"#;
        assert_eq!(receipt_from_json(json, &ids).unwrap().total, 7.0);
    }

    #[test]
    fn malformed_document_is_an_error() {
        let ids = IdGenerator::new();
        assert!(matches!(receipt_from_json("{not json", &ids), Err(IoError::Json(_))));
    }

    #[test]
    fn report_document_shape() {
        let ids = IdGenerator::new();
        let receipt = Receipt::new(vec![Item::new(ids.next_item(), "Steak", 1, 60.0)], 66.0);
        let mut roster = ParticipantRoster::new();
        let a = roster.add("Alice", &ids);
        let mut ledger = AssignmentLedger::new(&receipt, roster.ids());
        let steak = receipt.items().next().unwrap().id;
        ledger.assign(steak, a, 1).unwrap();
        let report = compute_report(&receipt, &ledger, &roster);

        let value: Value = serde_json::from_str(&report_to_json(&report).unwrap()).unwrap();
        assert_eq!(value["meta"]["format_version"], REPORT_FORMAT_VERSION);
        assert!(value["meta"]["generated_at"].is_string());
        assert_eq!(value["summary"]["others_total"], 6.0);
        assert_eq!(value["summary"]["participant_count"], 1);
        assert_eq!(value["participants"][0]["name"], "Alice");
        assert_eq!(value["participants"][0]["purchased_total"], 66.0);
        assert_eq!(value["participants"][0]["items"][0]["count"], 1);
    }
}
