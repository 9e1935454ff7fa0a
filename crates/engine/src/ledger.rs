use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use splitbill_core::{Item, ItemId, ParticipantId, Receipt};

use crate::error::LedgerError;

/// A participant's claim on some units of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub item_id: ItemId,
    pub participant_id: ParticipantId,
    pub assigned_count: u32,
}

/// Claims against one receipt.
///
/// Invariant: for every item, the sum of `assigned_count` over its
/// assignments never exceeds the item's `count`. Mutations that would break
/// it are rejected before anything changes.
///
/// Repeated claims by the same participant on the same item are merged into
/// the first assignment, which keeps its position.
#[derive(Debug, Clone)]
pub struct AssignmentLedger {
    items: BTreeMap<ItemId, Item>,
    participants: BTreeSet<ParticipantId>,
    assignments: Vec<Assignment>,
}

impl AssignmentLedger {
    pub fn new(receipt: &Receipt, participants: impl IntoIterator<Item = ParticipantId>) -> Self {
        Self {
            items: receipt.items().map(|it| (it.id, it.clone())).collect(),
            participants: participants.into_iter().collect(),
            assignments: Vec::new(),
        }
    }

    pub fn add_participant(&mut self, id: ParticipantId) {
        self.participants.insert(id);
    }

    /// Forget a participant and every claim they hold.
    pub fn remove_participant(&mut self, id: ParticipantId) {
        self.participants.remove(&id);
        self.assignments.retain(|a| a.participant_id != id);
        debug_assert!(self.invariant_holds());
    }

    /// Claim `count` more units of `item_id` for `participant_id`.
    pub fn assign(
        &mut self,
        item_id: ItemId,
        participant_id: ParticipantId,
        count: u32,
    ) -> Result<(), LedgerError> {
        if count == 0 {
            return Err(LedgerError::ZeroCount);
        }
        let item = self.items.get(&item_id).ok_or(LedgerError::UnknownItem(item_id))?;
        if !self.participants.contains(&participant_id) {
            return Err(LedgerError::UnknownParticipant(participant_id));
        }

        let already = self.assigned_total(item_id);
        if u64::from(already) + u64::from(count) > u64::from(item.count) {
            return Err(LedgerError::OverAssignment {
                item: item_id,
                requested: count,
                already_assigned: already,
                available: item.count,
            });
        }

        match self
            .assignments
            .iter_mut()
            .find(|a| a.item_id == item_id && a.participant_id == participant_id)
        {
            Some(existing) => existing.assigned_count += count,
            None => self.assignments.push(Assignment {
                item_id,
                participant_id,
                assigned_count: count,
            }),
        }

        log::debug!("{participant_id} claimed {count} of {item_id}");
        debug_assert!(self.invariant_holds());
        Ok(())
    }

    /// Drop a participant's claim on one item. No-op when there is none.
    pub fn unassign(&mut self, item_id: ItemId, participant_id: ParticipantId) {
        self.assignments
            .retain(|a| !(a.item_id == item_id && a.participant_id == participant_id));
    }

    /// Drop every claim on one item. No-op when there is none.
    pub fn clear(&mut self, item_id: ItemId) {
        self.assignments.retain(|a| a.item_id != item_id);
    }

    pub fn assigned_total(&self, item_id: ItemId) -> u32 {
        self.assignments
            .iter()
            .filter(|a| a.item_id == item_id)
            .map(|a| a.assigned_count)
            .sum()
    }

    /// Units of `item_id` nobody has claimed yet. `None` for unknown items.
    pub fn remaining(&self, item_id: ItemId) -> Option<u32> {
        let item = self.items.get(&item_id)?;
        Some(item.count.saturating_sub(self.assigned_total(item_id)))
    }

    /// Every assignment in creation order.
    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    /// A participant's claims as `(item, assigned_count)` in creation order.
    pub fn assignments_for(&self, participant_id: ParticipantId) -> Vec<(&Item, u32)> {
        self.assignments
            .iter()
            .filter(|a| a.participant_id == participant_id)
            .filter_map(|a| self.items.get(&a.item_id).map(|it| (it, a.assigned_count)))
            .collect()
    }

    /// Items with units left over, paired with how many.
    pub fn unclaimed(&self) -> Vec<(&Item, u32)> {
        self.items
            .values()
            .filter_map(|it| {
                let left = it.count.saturating_sub(self.assigned_total(it.id));
                (left > 0).then_some((it, left))
            })
            .collect()
    }

    pub fn item(&self, item_id: ItemId) -> Option<&Item> {
        self.items.get(&item_id)
    }

    pub fn invariant_holds(&self) -> bool {
        self.items
            .values()
            .all(|it| u64::from(self.assigned_total(it.id)) <= u64::from(it.count))
    }
}
