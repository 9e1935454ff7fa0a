//! Bill-splitting sessions.
//!
//! A session owns its roster, the current receipt, the ledger for that
//! receipt and the id generator that minted all of them. Nothing is shared
//! between sessions. [`SessionRegistry`] hands out sessions behind a
//! per-session mutex so mutations on one session are serialized while other
//! sessions proceed independently.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use splitbill_core::{IdGenerator, ItemId, Participant, ParticipantId, ParticipantRoster, Receipt};

use crate::error::LedgerError;
use crate::ledger::AssignmentLedger;
use crate::split::{compute_report, Report};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct BillSession {
    ids: IdGenerator,
    roster: ParticipantRoster,
    receipt: Option<Receipt>,
    ledger: Option<AssignmentLedger>,
}

impl BillSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator to use when canonicalizing receipts for this session.
    pub fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    pub fn add_participant(&mut self, name: impl Into<String>) -> ParticipantId {
        let id = self.roster.add(name, &self.ids);
        if let Some(ledger) = self.ledger.as_mut() {
            ledger.add_participant(id);
        }
        id
    }

    pub fn remove_participant(&mut self, id: ParticipantId) -> Option<Participant> {
        if let Some(ledger) = self.ledger.as_mut() {
            ledger.remove_participant(id);
        }
        self.roster.remove(id)
    }

    pub fn participants(&self) -> &ParticipantRoster {
        &self.roster
    }

    /// Replace the current receipt. Every prior assignment is discarded.
    pub fn submit_receipt(&mut self, receipt: Receipt) {
        log::info!(
            "receipt submitted: {} items, subtotal {}, total {}",
            receipt.len(),
            receipt.subtotal(),
            receipt.total
        );
        self.ledger = Some(AssignmentLedger::new(&receipt, self.roster.ids()));
        self.receipt = Some(receipt);
    }

    pub fn receipt(&self) -> Option<&Receipt> {
        self.receipt.as_ref()
    }

    pub fn ledger(&self) -> Option<&AssignmentLedger> {
        self.ledger.as_ref()
    }

    pub fn assign(
        &mut self,
        item_id: ItemId,
        participant_id: ParticipantId,
        count: u32,
    ) -> Result<(), LedgerError> {
        self.ledger
            .as_mut()
            .ok_or(LedgerError::NoReceipt)?
            .assign(item_id, participant_id, count)
    }

    pub fn unassign(&mut self, item_id: ItemId, participant_id: ParticipantId) {
        if let Some(ledger) = self.ledger.as_mut() {
            ledger.unassign(item_id, participant_id);
        }
    }

    pub fn clear(&mut self, item_id: ItemId) {
        if let Some(ledger) = self.ledger.as_mut() {
            ledger.clear(item_id);
        }
    }

    pub fn report(&self) -> Result<Report, LedgerError> {
        match (&self.receipt, &self.ledger) {
            (Some(receipt), Some(ledger)) => Ok(compute_report(receipt, ledger, &self.roster)),
            _ => Err(LedgerError::NoReceipt),
        }
    }

    /// Start a new bill: drops participants, receipt and assignments.
    /// Ids keep counting so nothing is ever reissued.
    pub fn reset(&mut self) {
        self.roster.clear();
        self.receipt = None;
        self.ledger = None;
    }
}

/// Isolated sessions keyed by [`SessionId`].
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, Arc<Mutex<BillSession>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self) -> SessionId {
        let id = SessionId::new();
        self.sessions
            .lock()
            .insert(id, Arc::new(Mutex::new(BillSession::new())));
        log::debug!("session {id} created");
        id
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<Mutex<BillSession>>> {
        self.sessions.lock().get(&id).cloned()
    }

    /// Run `f` with exclusive access to one session. The registry lock is
    /// released before `f` runs.
    pub fn with_session<R>(&self, id: SessionId, f: impl FnOnce(&mut BillSession) -> R) -> Option<R> {
        let session = self.get(id)?;
        let mut guard = session.lock();
        Some(f(&mut guard))
    }

    pub fn remove(&self, id: SessionId) -> bool {
        self.sessions.lock().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}
