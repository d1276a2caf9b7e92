//! Draw pile and discard pile management.
//!
//! The discard pile is kept most-recent-first, so index 0 is always the
//! face-up card. When the draw pile runs short, everything below the face-up
//! card is shuffled back into the draw pile. An exhausted pack is a valid
//! degenerate state: `draw` returns fewer cards than asked rather than
//! erroring.

use crate::card::{full_deck, Card};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// The shared draw and discard piles for one game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deck {
    pub draw_pile: Vec<Card>,
    /// Most-recent-first: `discard_pile[0]` is the face-up card.
    pub discard_pile: Vec<Card>,
}

impl Deck {
    /// A full 52-card draw pile in random order, empty discard pile.
    pub fn new<R: Rng>(rng: &mut R) -> Self {
        let mut draw_pile = full_deck();
        draw_pile.shuffle(rng);
        Self {
            draw_pile,
            discard_pile: Vec::new(),
        }
    }

    /// An empty deck, for assembling states by hand in tests.
    pub fn empty() -> Self {
        Self {
            draw_pile: Vec::new(),
            discard_pile: Vec::new(),
        }
    }

    /// Total cards held by both piles.
    pub fn len(&self) -> usize {
        self.draw_pile.len() + self.discard_pile.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Draw up to `n` cards from the top of the draw pile.
    ///
    /// If the draw pile is short and the discard pile holds more than its
    /// face-up card, the remainder is shuffled in and the draw retried. If
    /// the pack is still short after that, whatever exists is returned.
    pub fn draw<R: Rng>(&mut self, n: usize, rng: &mut R) -> Vec<Card> {
        if self.draw_pile.len() < n && self.discard_pile.len() > 1 {
            let top = self.discard_pile.remove(0);
            let mut rest = std::mem::take(&mut self.discard_pile);
            rest.shuffle(rng);
            self.draw_pile.append(&mut rest);
            self.discard_pile.push(top);
        }

        let take = n.min(self.draw_pile.len());
        self.draw_pile.drain(..take).collect()
    }

    /// Push played cards onto the discard pile in play order, so the last
    /// card played becomes the face-up card.
    pub fn add_to_discard(&mut self, cards: &[Card]) {
        for card in cards {
            self.discard_pile.insert(0, *card);
        }
    }

    /// The face-up card, if any.
    pub fn top_discard(&self) -> Option<Card> {
        self.discard_pile.first().copied()
    }
}
