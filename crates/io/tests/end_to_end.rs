use std::path::PathBuf;

use splitbill_core::{IdGenerator, ParticipantRoster};
use splitbill_engine::{compute_report, AssignmentLedger, BillSession, LedgerError};
use splitbill_io::csv::import_items;
use splitbill_io::{canonicalize, receipt_from_json, receipt_to_json, RawRow};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn assert_close(actual: f64, expected: f64) {
    assert!((actual - expected).abs() < 1e-6, "expected {expected}, got {actual}");
}

#[test]
fn backend_rows_to_split() {
    let ids = IdGenerator::new();
    let receipt = canonicalize(
        vec![RawRow::new("Coffee", "2", "10,000"), RawRow::new("Cake", "1", "15,000")],
        Some("35,000"),
        &ids,
    );

    let mut roster = ParticipantRoster::new();
    let alice = roster.add("Alice", &ids);
    let bob = roster.add("Bob", &ids);
    let mut ledger = AssignmentLedger::new(&receipt, roster.ids());

    let item_ids: Vec<_> = receipt.items().map(|it| it.id).collect();
    ledger.assign(item_ids[0], alice, 2).unwrap();
    ledger.assign(item_ids[1], alice, 1).unwrap();

    let report = compute_report(&receipt, &ledger, &roster);
    let a = report.participant(alice).unwrap();
    let b = report.participant(bob).unwrap();
    assert_close(a.purchased_subtotal, 25_000.0);
    assert_close(a.purchased_others, 10_000.0);
    assert_close(a.purchased_total, 35_000.0);
    assert_close(b.purchased_total, 0.0);
    assert_close(report.allocated_total(), report.receipt_total);
}

#[test]
fn table_fixture_through_session() {
    let mut session = BillSession::new();
    let alice = session.add_participant("Alice");
    let bob = session.add_participant("Bob");

    let receipt = import_items(&fixtures_dir().join("coffee_cake.csv"), 35_000.0, session.ids()).unwrap();
    assert_eq!(receipt.subtotal(), 25_000.0);
    let items: Vec<_> = receipt.items().map(|it| it.id).collect();
    session.submit_receipt(receipt);

    session.assign(items[0], alice, 1).unwrap();
    session.assign(items[0], bob, 1).unwrap();
    let err = session.assign(items[0], bob, 1).unwrap_err();
    assert!(matches!(err, LedgerError::OverAssignment { already_assigned: 2, .. }));
    session.assign(items[1], bob, 1).unwrap();

    let report = session.report().unwrap();
    // Alice: 5000 of 25000 -> 2000 of the 10000 others
    assert_close(report.participant(alice).unwrap().purchased_total, 7_000.0);
    assert_close(report.participant(bob).unwrap().purchased_total, 28_000.0);
}

#[test]
fn semicolon_fixture_is_coerced() {
    let ids = IdGenerator::new();
    let receipt = import_items(&fixtures_dir().join("warung_semicolon.csv"), 70_000.0, &ids).unwrap();
    let rows: Vec<_> = receipt
        .items()
        .map(|it| (it.name.as_str(), it.count, it.total_price))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("Nasi Goreng", 2, 50_000.0),
            ("Es Teh", 3, 15_000.0),
            ("Kerupuk", 1, 5_000.0),
        ]
    );
}

#[test]
fn json_document_survives_exchange() {
    let ids = IdGenerator::new();
    let receipt = import_items(&fixtures_dir().join("coffee_cake.csv"), 35_000.0, &ids).unwrap();
    let back = receipt_from_json(&receipt_to_json(&receipt).unwrap(), &ids).unwrap();
    assert_eq!(back.total, receipt.total);
    assert_eq!(back.subtotal(), receipt.subtotal());
    assert_eq!(back.len(), receipt.len());
}
