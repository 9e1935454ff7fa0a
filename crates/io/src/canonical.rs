//! Raw backend rows → canonical [`Receipt`].
//!
//! Field-level noise is absorbed here and never aborts the receipt:
//! - empty name → row dropped
//! - unparseable or non-positive count → 1
//! - unparseable or negative price → 0.0
//! - unparseable or missing total → subtotal
//!
//! Each coercion is logged at debug level.

use splitbill_core::{IdGenerator, Item, Receipt};

use crate::amount::try_parse_amount;

/// One row as a backend reported it, every field still text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub name: String,
    pub count: String,
    pub price: String,
}

impl RawRow {
    pub fn new(name: impl Into<String>, count: impl Into<String>, price: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count: count.into(),
            price: price.into(),
        }
    }
}

/// Build a receipt from raw rows and the raw total text.
///
/// A missing or unparseable total falls back to the item subtotal. This can
/// hide a real tax/service difference the backend failed to read; it is kept
/// so a receipt always has a usable total.
pub fn canonicalize(
    rows: impl IntoIterator<Item = RawRow>,
    total_text: Option<&str>,
    ids: &IdGenerator,
) -> Receipt {
    let items = build_items(rows, ids);
    let subtotal: f64 = items.iter().map(|it| it.total_price).sum();

    let total = match total_text.and_then(try_parse_amount) {
        Some(total) => total,
        None => {
            log::debug!("total {total_text:?} unusable, defaulting to subtotal {subtotal}");
            subtotal
        }
    };

    Receipt::new(items, total)
}

/// Build a receipt from raw rows with an already-known total (table import).
pub fn canonicalize_with_total(
    rows: impl IntoIterator<Item = RawRow>,
    total: f64,
    ids: &IdGenerator,
) -> Receipt {
    Receipt::new(build_items(rows, ids), total)
}

fn build_items(rows: impl IntoIterator<Item = RawRow>, ids: &IdGenerator) -> Vec<Item> {
    rows.into_iter()
        .enumerate()
        .filter_map(|(row, raw)| {
            let count = coerce_count(&raw.count);
            if count.to_string() != raw.count.trim() {
                log::debug!("row {row}: count {:?} coerced to {count}", raw.count);
            }
            let price = match try_parse_amount(&raw.price) {
                Some(p) => Some(p),
                None => {
                    log::debug!("row {row}: price {:?} unparseable", raw.price);
                    None
                }
            };
            finish_item(row, &raw.name, count, price, ids)
        })
        .collect()
}

/// Apply the name and price rules to already-typed values and mint an id.
/// `None` when the row has no usable name.
pub(crate) fn finish_item(
    row: usize,
    raw_name: &str,
    count: u32,
    price: Option<f64>,
    ids: &IdGenerator,
) -> Option<Item> {
    let name = clean_name(raw_name);
    if name.is_empty() {
        log::debug!("row {row}: empty name, dropped");
        return None;
    }

    let total_price = match price {
        Some(p) if p.is_finite() && p >= 0.0 => p,
        Some(p) => {
            log::debug!("row {row}: price {p} out of range, coerced to 0");
            0.0
        }
        None => 0.0,
    };

    Some(Item::new(ids.next_item(), name, count, total_price))
}

/// Trim and collapse inner whitespace.
pub fn clean_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Integer count with the `1` fallback. Accepts `2`, `2.0`, `2x`, `x2`.
pub fn coerce_count(raw: &str) -> u32 {
    let text = raw.trim().trim_matches(|c: char| c == 'x' || c == 'X').trim();

    let parsed = text.parse::<i64>().ok().or_else(|| {
        text.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    });

    coerce_count_value(parsed)
}

pub(crate) fn coerce_count_value(count: Option<i64>) -> u32 {
    match count {
        Some(n) if n >= 1 => u32::try_from(n).unwrap_or(u32::MAX),
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[(&str, &str, &str)]) -> Vec<RawRow> {
        data.iter().map(|(n, c, p)| RawRow::new(*n, *c, *p)).collect()
    }

    #[test]
    fn coffee_and_cake() {
        let ids = IdGenerator::new();
        let receipt = canonicalize(
            rows(&[("Coffee", "2", "10,000"), ("Cake", "1", "15,000")]),
            Some("35,000"),
            &ids,
        );

        let items: Vec<_> = receipt.items().collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Coffee");
        assert_eq!(items[0].count, 2);
        assert_eq!(items[0].total_price, 10_000.0);
        assert_eq!(items[1].total_price, 15_000.0);
        assert_eq!(receipt.subtotal(), 25_000.0);
        assert_eq!(receipt.total, 35_000.0);
    }

    #[test]
    fn bad_counts_become_one() {
        let ids = IdGenerator::new();
        let receipt = canonicalize(
            rows(&[("A", "abc", "1"), ("B", "-3", "1"), ("C", "0", "1"), ("D", "", "1")]),
            None,
            &ids,
        );
        assert!(receipt.items().all(|it| it.count == 1));
        assert_eq!(receipt.len(), 4);
    }

    #[test]
    fn count_variants_are_accepted() {
        assert_eq!(coerce_count("3"), 3);
        assert_eq!(coerce_count(" 2.0 "), 2);
        assert_eq!(coerce_count("2x"), 2);
        assert_eq!(coerce_count("x4"), 4);
        assert_eq!(coerce_count("2.5"), 1);
        assert_eq!(coerce_count("99999999999"), u32::MAX);
    }

    #[test]
    fn empty_names_are_dropped() {
        let ids = IdGenerator::new();
        let receipt = canonicalize(rows(&[("  ", "1", "5"), ("Tea", "1", "5")]), Some("10"), &ids);
        assert_eq!(receipt.len(), 1);
        assert_eq!(receipt.items().next().unwrap().name, "Tea");
    }

    #[test]
    fn names_are_cleaned() {
        let ids = IdGenerator::new();
        let receipt = canonicalize(rows(&[("  Iced   Lemon\tTea ", "1", "5")]), None, &ids);
        assert_eq!(receipt.items().next().unwrap().name, "Iced Lemon Tea");
    }

    #[test]
    fn bad_prices_become_zero() {
        let ids = IdGenerator::new();
        let receipt = canonicalize(
            rows(&[("A", "1", "n/a"), ("B", "1", "-2.000"), ("C", "1", "3,5")]),
            Some("10"),
            &ids,
        );
        let prices: Vec<_> = receipt.items().map(|it| it.total_price).collect();
        assert_eq!(prices, vec![0.0, 0.0, 3.5]);
    }

    #[test]
    fn unparseable_total_defaults_to_subtotal() {
        let ids = IdGenerator::new();
        let data = rows(&[("A", "1", "4"), ("B", "1", "6")]);
        assert_eq!(canonicalize(data.clone(), Some("???"), &ids).total, 10.0);
        assert_eq!(canonicalize(data, None, &ids).total, 10.0);
    }

    #[test]
    fn zero_total_is_kept() {
        let ids = IdGenerator::new();
        let receipt = canonicalize(rows(&[("A", "1", "4")]), Some("0"), &ids);
        assert_eq!(receipt.total, 0.0);
    }

    #[test]
    fn every_item_gets_a_fresh_id() {
        let ids = IdGenerator::new();
        let first = canonicalize(rows(&[("A", "1", "1"), ("B", "1", "1")]), None, &ids);
        let second = canonicalize(rows(&[("A", "1", "1")]), None, &ids);
        let mut all: Vec<_> = first.items().chain(second.items()).map(|it| it.id).collect();
        all.dedup();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn known_total_is_used_verbatim() {
        let ids = IdGenerator::new();
        let receipt = canonicalize_with_total(rows(&[("A", "1", "4")]), 7.5, &ids);
        assert_eq!(receipt.total, 7.5);
    }
}
