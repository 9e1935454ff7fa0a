//! Pro-rata split of a receipt across participants.
//!
//! Each participant pays for the units they claimed, plus a share of
//! `others = total - subtotal` proportional to their share of the subtotal.
//! A participant with pricier items absorbs more of the tax/service/discount.

use serde::Serialize;

use splitbill_core::{ItemId, ParticipantId, ParticipantRoster, Receipt};

use crate::ledger::AssignmentLedger;

/// An item as seen by one participant: only their units, priced per unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportLine {
    pub item_id: ItemId,
    pub name: String,
    pub count: u32,
    pub total_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantReport {
    pub participant_id: ParticipantId,
    pub name: String,
    pub items: Vec<ReportLine>,
    pub purchased_subtotal: f64,
    pub purchased_others: f64,
    pub purchased_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub receipt_total: f64,
    pub receipt_subtotal: f64,
    /// `receipt_total - receipt_subtotal`, never clamped.
    pub others_total: f64,
    /// Value of units nobody claimed, before any share of others.
    pub unclaimed_subtotal: f64,
    pub participants: Vec<ParticipantReport>,
}

impl Report {
    /// Sum of every participant's `purchased_total`.
    pub fn allocated_total(&self) -> f64 {
        self.participants.iter().map(|p| p.purchased_total).sum()
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&ParticipantReport> {
        self.participants.iter().find(|p| p.participant_id == id)
    }
}

/// Build the per-participant report, one entry per roster member in roster
/// order (members without claims get zeros).
pub fn compute_report(
    receipt: &Receipt,
    ledger: &AssignmentLedger,
    participants: &ParticipantRoster,
) -> Report {
    let receipt_subtotal = receipt.subtotal();
    let others_total = receipt.total - receipt_subtotal;

    let participants = participants
        .iter()
        .map(|participant| {
            let items: Vec<ReportLine> = ledger
                .assignments_for(participant.id)
                .into_iter()
                .map(|(item, assigned)| ReportLine {
                    item_id: item.id,
                    name: item.name.clone(),
                    count: assigned,
                    total_price: item.unit_price() * assigned as f64,
                })
                .collect();

            let purchased_subtotal: f64 = items.iter().map(|line| line.total_price).sum();
            let ratio = if receipt_subtotal > 0.0 {
                purchased_subtotal / receipt_subtotal
            } else {
                0.0
            };
            let purchased_others = others_total * ratio;

            ParticipantReport {
                participant_id: participant.id,
                name: participant.name.clone(),
                items,
                purchased_subtotal,
                purchased_others,
                purchased_total: purchased_subtotal + purchased_others,
            }
        })
        .collect();

    let unclaimed_subtotal = ledger
        .unclaimed()
        .into_iter()
        .map(|(item, left)| item.unit_price() * left as f64)
        .sum();

    Report {
        receipt_total: receipt.total,
        receipt_subtotal,
        others_total,
        unclaimed_subtotal,
        participants,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use splitbill_core::{IdGenerator, Item};

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    struct Fixture {
        receipt: Receipt,
        roster: ParticipantRoster,
        ledger: AssignmentLedger,
        people: Vec<ParticipantId>,
    }

    fn fixture(items: Vec<(&str, u32, f64)>, total: f64, names: &[&str]) -> Fixture {
        let ids = IdGenerator::new();
        let receipt = Receipt::new(
            items
                .into_iter()
                .map(|(n, c, p)| Item::new(ids.next_item(), n, c, p)),
            total,
        );
        let mut roster = ParticipantRoster::new();
        let people: Vec<_> = names.iter().map(|n| roster.add(*n, &ids)).collect();
        let ledger = AssignmentLedger::new(&receipt, roster.ids());
        Fixture { receipt, roster, ledger, people }
    }

    fn item_id(f: &Fixture, name: &str) -> ItemId {
        f.receipt.items().find(|it| it.name == name).unwrap().id
    }

    #[test]
    fn others_split_pro_rata() {
        let mut f = fixture(vec![("Steak", 1, 60.0), ("Salad", 1, 40.0)], 110.0, &["A", "B"]);
        let (a, b) = (f.people[0], f.people[1]);
        let steak = item_id(&f, "Steak");
        let salad = item_id(&f, "Salad");
        f.ledger.assign(steak, a, 1).unwrap();
        f.ledger.assign(salad, b, 1).unwrap();

        let report = compute_report(&f.receipt, &f.ledger, &f.roster);
        assert_close(report.others_total, 10.0);

        let ra = report.participant(a).unwrap();
        let rb = report.participant(b).unwrap();
        assert_close(ra.purchased_subtotal, 60.0);
        assert_close(ra.purchased_others, 6.0);
        assert_close(ra.purchased_total, 66.0);
        assert_close(rb.purchased_subtotal, 40.0);
        assert_close(rb.purchased_others, 4.0);
        assert_close(rb.purchased_total, 44.0);
        assert_close(report.allocated_total(), 110.0);
    }

    #[test]
    fn zero_subtotal_gives_no_share_of_others() {
        let mut f = fixture(vec![("Water", 2, 0.0)], 5_000.0, &["A", "B"]);
        let water = item_id(&f, "Water");
        f.ledger.assign(water, f.people[0], 1).unwrap();
        f.ledger.assign(water, f.people[1], 1).unwrap();

        let report = compute_report(&f.receipt, &f.ledger, &f.roster);
        assert_close(report.others_total, 5_000.0);
        for p in &report.participants {
            assert_eq!(p.purchased_others, 0.0);
            assert_eq!(p.purchased_total, 0.0);
        }
    }

    #[test]
    fn negative_others_reduce_totals() {
        let mut f = fixture(vec![("Pizza", 1, 100.0)], 80.0, &["A"]);
        let pizza = item_id(&f, "Pizza");
        f.ledger.assign(pizza, f.people[0], 1).unwrap();

        let report = compute_report(&f.receipt, &f.ledger, &f.roster);
        let a = &report.participants[0];
        assert_close(a.purchased_others, -20.0);
        assert_close(a.purchased_total, 80.0);
    }

    #[test]
    fn partial_units_are_priced_per_unit() {
        let mut f = fixture(vec![("Beer", 3, 90.0)], 90.0, &["A", "B"]);
        let beer = item_id(&f, "Beer");
        f.ledger.assign(beer, f.people[0], 2).unwrap();
        f.ledger.assign(beer, f.people[1], 1).unwrap();

        let report = compute_report(&f.receipt, &f.ledger, &f.roster);
        let a = &report.participants[0];
        assert_eq!(a.items.len(), 1);
        assert_eq!(a.items[0].count, 2);
        assert_close(a.items[0].total_price, 60.0);
        assert_close(report.participants[1].purchased_total, 30.0);
    }

    #[test]
    fn participants_without_claims_report_zero() {
        let mut f = fixture(vec![("Tea", 1, 10.0)], 12.0, &["A", "B"]);
        let tea = item_id(&f, "Tea");
        f.ledger.assign(tea, f.people[0], 1).unwrap();

        let report = compute_report(&f.receipt, &f.ledger, &f.roster);
        assert_eq!(report.participants.len(), 2);
        let b = &report.participants[1];
        assert_eq!(b.name, "B");
        assert!(b.items.is_empty());
        assert_eq!(b.purchased_total, 0.0);
    }

    #[test]
    fn unclaimed_units_are_reported() {
        let mut f = fixture(vec![("Dumplings", 4, 40.0), ("Rice", 1, 5.0)], 50.0, &["A"]);
        let dumplings = item_id(&f, "Dumplings");
        f.ledger.assign(dumplings, f.people[0], 1).unwrap();

        let report = compute_report(&f.receipt, &f.ledger, &f.roster);
        assert_close(report.unclaimed_subtotal, 35.0);
        assert_close(report.participants[0].purchased_others, 5.0 * 10.0 / 45.0);
    }
}
