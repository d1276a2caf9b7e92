//! Card value types.
//!
//! A standard 52-card deck: four suits by thirteen ranks. Cards are immutable
//! value types compared by (suit, rank). The special-effect classification
//! used by the rules engine lives here so it can be dispatched exhaustively.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four suits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Hearts,
    Diamonds,
    Clubs,
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Hearts, Suit::Diamonds, Suit::Clubs, Suit::Spades];

    /// Hearts and diamonds are red; clubs and spades are black.
    pub fn is_red(&self) -> bool {
        matches!(self, Suit::Hearts | Suit::Diamonds)
    }

    pub fn is_black(&self) -> bool {
        !self.is_red()
    }

    pub fn symbol(&self) -> char {
        match self {
            Suit::Hearts => '♥',
            Suit::Diamonds => '♦',
            Suit::Clubs => '♣',
            Suit::Spades => '♠',
        }
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Card rank, Two through Ace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
        Rank::Ace,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
            Rank::Ace => "A",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A single playing card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
}

/// What playing a card does to the game state.
///
/// A red jack only counters while a black-jack attack is chaining; its effect
/// therefore depends on context, which the caller supplies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecialEffect {
    None,
    /// Rank 2: next player owes two more cards.
    PickupTwo,
    /// Rank 7: skip one more turn.
    Skip,
    /// Black jack: next player owes five more cards.
    JackAttack,
    /// Red jack while a black-jack attack is pending: cancel five owed cards.
    JackCounter,
    /// Queen: flip play direction.
    Reverse,
    /// Ace: the player nominates the next suit.
    Wild,
}

impl Card {
    pub fn new(suit: Suit, rank: Rank) -> Self {
        Self { suit, rank }
    }

    /// A black jack (clubs or spades).
    pub fn is_black_jack(&self) -> bool {
        self.rank == Rank::Jack && self.suit.is_black()
    }

    /// A red jack (hearts or diamonds).
    pub fn is_red_jack(&self) -> bool {
        self.rank == Rank::Jack && self.suit.is_red()
    }

    /// Classify this card's effect given whether a black-jack attack is
    /// currently chaining.
    pub fn special_effect(&self, black_jacks_pending: bool) -> SpecialEffect {
        match self.rank {
            Rank::Two => SpecialEffect::PickupTwo,
            Rank::Seven => SpecialEffect::Skip,
            Rank::Jack if self.suit.is_black() => SpecialEffect::JackAttack,
            Rank::Jack if black_jacks_pending => SpecialEffect::JackCounter,
            Rank::Jack => SpecialEffect::None,
            Rank::Queen => SpecialEffect::Reverse,
            Rank::Ace => SpecialEffect::Wild,
            _ => SpecialEffect::None,
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

/// All 52 cards in suit-then-rank order.
pub fn full_deck() -> Vec<Card> {
    let mut cards = Vec::with_capacity(52);
    for suit in Suit::ALL {
        for rank in Rank::ALL {
            cards.push(Card::new(suit, rank));
        }
    }
    cards
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_deck_composition() {
        let deck = full_deck();
        assert_eq!(deck.len(), 52);

        let unique: std::collections::HashSet<_> = deck.iter().collect();
        assert_eq!(unique.len(), 52);
    }

    #[test]
    fn test_suit_colors() {
        assert!(Suit::Hearts.is_red());
        assert!(Suit::Diamonds.is_red());
        assert!(Suit::Clubs.is_black());
        assert!(Suit::Spades.is_black());
    }

    #[test]
    fn test_jack_classification() {
        let black = Card::new(Suit::Spades, Rank::Jack);
        let red = Card::new(Suit::Hearts, Rank::Jack);

        assert!(black.is_black_jack());
        assert!(!black.is_red_jack());
        assert!(red.is_red_jack());

        assert_eq!(black.special_effect(false), SpecialEffect::JackAttack);
        assert_eq!(black.special_effect(true), SpecialEffect::JackAttack);
        assert_eq!(red.special_effect(true), SpecialEffect::JackCounter);
        assert_eq!(red.special_effect(false), SpecialEffect::None);
    }

    #[test]
    fn test_effect_table() {
        assert_eq!(
            Card::new(Suit::Clubs, Rank::Two).special_effect(false),
            SpecialEffect::PickupTwo
        );
        assert_eq!(
            Card::new(Suit::Hearts, Rank::Seven).special_effect(false),
            SpecialEffect::Skip
        );
        assert_eq!(
            Card::new(Suit::Diamonds, Rank::Queen).special_effect(false),
            SpecialEffect::Reverse
        );
        assert_eq!(
            Card::new(Suit::Spades, Rank::Ace).special_effect(false),
            SpecialEffect::Wild
        );
        assert_eq!(
            Card::new(Suit::Clubs, Rank::Ten).special_effect(false),
            SpecialEffect::None
        );
    }

    #[test]
    fn test_display() {
        let card = Card::new(Suit::Spades, Rank::Queen);
        assert_eq!(card.to_string(), "Q♠");
    }
}
