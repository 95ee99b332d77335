//! Deferred cards ("parties")
//!
//! Each skip appends an entry that remembers the highest incoming number in
//! the queue at that moment. The oldest entry's boundary decides which cards
//! must be worked through before the deferred ones come back.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{CardId, IncomingNo};

/// A card the operator postponed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeferredEntry {
    pub card_id: CardId,
    pub incoming_no: IncomingNo,
    /// Highest incoming number in the queue when the card was deferred
    pub party_end: IncomingNo,
    pub deferred_at: DateTime<Utc>,
}

/// Ordered deferred entries plus a membership index.
///
/// Both views are only changed together, so `members` always holds exactly
/// the card ids of `entries`.
#[derive(Debug, Default)]
pub struct DeferLedger {
    entries: Vec<DeferredEntry>,
    members: HashSet<CardId>,
}

impl DeferLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, card_id: CardId) -> bool {
        self.members.contains(&card_id)
    }

    /// Oldest deferred entry; its boundary gates the focus
    pub fn oldest(&self) -> Option<&DeferredEntry> {
        self.entries.first()
    }

    pub fn entries(&self) -> &[DeferredEntry] {
        &self.entries
    }

    /// Append a deferred card. A card that is already deferred is moved to the
    /// back with the new boundary; the replaced entry is returned.
    pub fn defer(
        &mut self,
        card_id: CardId,
        incoming_no: IncomingNo,
        party_end: IncomingNo,
    ) -> Option<DeferredEntry> {
        let replaced = self.remove(card_id);
        self.entries.push(DeferredEntry {
            card_id,
            incoming_no,
            party_end,
            deferred_at: Utc::now(),
        });
        self.members.insert(card_id);
        self.debug_check();
        replaced
    }

    /// Drop a card's entry, if any
    pub fn remove(&mut self, card_id: CardId) -> Option<DeferredEntry> {
        if !self.members.remove(&card_id) {
            return None;
        }
        let pos = self.entries.iter().position(|e| e.card_id == card_id)?;
        let entry = self.entries.remove(pos);
        self.debug_check();
        Some(entry)
    }

    fn debug_check(&self) {
        debug_assert_eq!(self.entries.len(), self.members.len());
        debug_assert!(self.entries.iter().all(|e| self.members.contains(&e.card_id)));
    }
}
