use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{IdGenerator, ItemId, ParticipantId};

// ---------------------------------------------------------------------------
// Items + Receipt
// ---------------------------------------------------------------------------

/// One line of a receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub count: u32,
    pub total_price: f64,
}

impl Item {
    pub fn new(id: ItemId, name: impl Into<String>, count: u32, total_price: f64) -> Self {
        Self {
            id,
            name: name.into(),
            count,
            total_price,
        }
    }

    /// Price of a single unit. Falls back to `total_price` when `count` is 0
    /// so a malformed item never divides by zero.
    pub fn unit_price(&self) -> f64 {
        if self.count == 0 {
            self.total_price
        } else {
            self.total_price / self.count as f64
        }
    }
}

/// Canonical receipt: items keyed by id plus the printed total.
///
/// `subtotal` is always derived from the items. `total` may differ from it;
/// the difference is tax, service, discount and rounding ("others").
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    items: BTreeMap<ItemId, Item>,
    pub total: f64,
}

impl Receipt {
    pub fn new(items: impl IntoIterator<Item = Item>, total: f64) -> Self {
        Self {
            items: items.into_iter().map(|it| (it.id, it)).collect(),
            total,
        }
    }

    pub fn empty(total: f64) -> Self {
        Self {
            items: BTreeMap::new(),
            total,
        }
    }

    pub fn subtotal(&self) -> f64 {
        self.items.values().map(|it| it.total_price).sum()
    }

    /// `total - subtotal`. Negative when a discount outweighs tax and service.
    pub fn others(&self) -> f64 {
        self.total - self.subtotal()
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    /// Items in id order, which is creation order for a single generator.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Participants
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
}

/// Participants of one bill-splitting session, in the order they joined.
#[derive(Debug, Clone, Default)]
pub struct ParticipantRoster {
    participants: Vec<Participant>,
}

impl ParticipantRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, ids: &IdGenerator) -> ParticipantId {
        let id = ids.next_participant();
        self.participants.push(Participant { id, name: name.into() });
        id
    }

    pub fn remove(&mut self, id: ParticipantId) -> Option<Participant> {
        let pos = self.participants.iter().position(|p| p.id == id)?;
        Some(self.participants.remove(pos))
    }

    pub fn get(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    /// Case-insensitive lookup on the trimmed name.
    pub fn find_by_name(&self, name: &str) -> Option<&Participant> {
        let wanted = name.trim().to_lowercase();
        self.participants
            .iter()
            .find(|p| p.name.trim().to_lowercase() == wanted)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.participants.iter().map(|p| p.id)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn clear(&mut self) {
        self.participants.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: u64, name: &str, count: u32, price: f64) -> Item {
        Item::new(ItemId(id), name, count, price)
    }

    #[test]
    fn unit_price_divides_by_count() {
        assert_eq!(item(1, "Coffee", 2, 10_000.0).unit_price(), 5_000.0);
    }

    #[test]
    fn unit_price_with_zero_count_is_total() {
        assert_eq!(item(1, "Broken", 0, 700.0).unit_price(), 700.0);
    }

    #[test]
    fn subtotal_is_derived_from_items() {
        let receipt = Receipt::new(
            vec![item(1, "Coffee", 2, 10_000.0), item(2, "Cake", 1, 15_000.0)],
            35_000.0,
        );
        assert_eq!(receipt.subtotal(), 25_000.0);
        assert_eq!(receipt.others(), 10_000.0);
        assert_eq!(receipt.len(), 2);
    }

    #[test]
    fn others_can_be_negative() {
        let receipt = Receipt::new(vec![item(1, "Soup", 1, 100.0)], 80.0);
        assert_eq!(receipt.others(), -20.0);
    }

    #[test]
    fn items_iterate_in_id_order() {
        let receipt = Receipt::new(
            vec![item(7, "B", 1, 1.0), item(3, "A", 1, 1.0), item(9, "C", 1, 1.0)],
            3.0,
        );
        let names: Vec<_> = receipt.items().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn empty_receipt_keeps_total() {
        let receipt = Receipt::empty(12.5);
        assert!(receipt.is_empty());
        assert_eq!(receipt.subtotal(), 0.0);
        assert_eq!(receipt.total, 12.5);
    }

    #[test]
    fn roster_add_remove_lookup() {
        let ids = IdGenerator::new();
        let mut roster = ParticipantRoster::new();
        let alice = roster.add("Alice", &ids);
        let bob = roster.add("Bob", &ids);
        assert_ne!(alice, bob);
        assert_eq!(roster.find_by_name(" alice ").map(|p| p.id), Some(alice));

        let removed = roster.remove(alice).unwrap();
        assert_eq!(removed.name, "Alice");
        assert!(roster.get(alice).is_none());
        assert!(roster.remove(alice).is_none());
        assert_eq!(roster.ids().collect::<Vec<_>>(), vec![bob]);
    }

    #[test]
    fn item_serializes_with_plain_id() {
        let json = serde_json::to_value(item(4, "Tea", 1, 3.5)).unwrap();
        assert_eq!(json["id"], 4);
        assert_eq!(json["name"], "Tea");
    }
}
