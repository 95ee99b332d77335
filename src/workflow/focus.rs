//! Focus selection
//!
//! Decides which card the operator sees next. Without deferred cards that is
//! simply the lowest incoming number. Once something is deferred, every card
//! up to the oldest deferral's boundary is replayed first, and only then does
//! the deferred card itself come back.

use std::collections::HashSet;

use crate::models::{CardId, IncomingNo, QueueItem};

use super::ledger::{DeferLedger, DeferredEntry};

/// A queue card with a known incoming number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueCard {
    pub incoming_no: IncomingNo,
    pub item: QueueItem,
}

/// Live queue, ordered by incoming number ascending
#[derive(Debug, Clone, Default)]
pub struct QueueSnapshot {
    cards: Vec<QueueCard>,
}

impl QueueSnapshot {
    /// Keep the cards that carry an incoming number and sort them. The sort is
    /// stable, so among duplicate numbers the first card listed wins.
    pub fn new(items: Vec<QueueItem>) -> Self {
        let mut cards: Vec<QueueCard> = items
            .into_iter()
            .filter_map(|item| match item.incoming_no {
                Some(incoming_no) => Some(QueueCard { incoming_no, item }),
                None => {
                    tracing::debug!(card_id = item.id, "Card has no incoming number, ignored");
                    None
                }
            })
            .collect();
        cards.sort_by_key(|c| c.incoming_no);

        let mut seen = HashSet::new();
        for card in &cards {
            if !seen.insert(card.incoming_no) {
                tracing::warn!(
                    card_id = card.item.id,
                    incoming_no = card.incoming_no,
                    "Duplicate incoming number in queue"
                );
            }
        }

        Self { cards }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn cards(&self) -> &[QueueCard] {
        &self.cards
    }

    pub fn get(&self, card_id: CardId) -> Option<&QueueCard> {
        self.cards.iter().find(|c| c.item.id == card_id)
    }

    /// Highest incoming number across the whole queue
    pub fn max_incoming_no(&self) -> Option<IncomingNo> {
        self.cards.last().map(|c| c.incoming_no)
    }
}

/// Outcome of focus selection
#[derive(Debug, PartialEq, Eq)]
pub enum Focus<'a> {
    /// Nothing to show
    Empty,
    /// A card from the live queue
    Live(&'a QueueCard),
    /// The party is exhausted; the oldest deferred card comes back and has to
    /// be fetched directly
    Fallback(&'a DeferredEntry),
}

pub fn select_focus<'a>(queue: &'a QueueSnapshot, ledger: &'a DeferLedger) -> Focus<'a> {
    let Some(oldest) = ledger.oldest() else {
        return match queue.cards.first() {
            Some(card) => Focus::Live(card),
            None => Focus::Empty,
        };
    };

    let party_end = oldest.party_end;
    queue
        .cards
        .iter()
        .take_while(|c| c.incoming_no <= party_end)
        .find(|c| !ledger.contains(c.item.id))
        .map(Focus::Live)
        .unwrap_or(Focus::Fallback(oldest))
}
