//! Player seats.

use crate::card::{Card, Rank, Suit};
use serde::{Deserialize, Serialize};

/// One seat at the table. Connection state is not tracked here; that is the
/// session layer's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    /// Opaque identifier chosen by the caller.
    pub id: String,
    pub name: String,
    pub hand: Vec<Card>,
    /// AI-controlled seats take their turns via the bot policy.
    pub is_ai: bool,
}

impl Player {
    pub fn new(id: impl Into<String>, name: impl Into<String>, is_ai: bool) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            hand: Vec::new(),
            is_ai,
        }
    }

    pub fn hand_size(&self) -> usize {
        self.hand.len()
    }

    pub fn has_rank(&self, rank: Rank) -> bool {
        self.hand.iter().any(|c| c.rank == rank)
    }

    pub fn suit_count(&self, suit: Suit) -> usize {
        self.hand.iter().filter(|c| c.suit == suit).count()
    }
}
