//! Rachel - a shedding-style multiplayer card game engine
//!
//! This crate provides the core game logic for Rachel, including:
//! - Card and deck model with the empty-pile reshuffle policy
//! - Rules state machine with full legality enforcement
//! - AI decision policy for bot-controlled seats
//! - Versioned snapshot serialization for persistence collaborators
//!
//! # Architecture
//!
//! The engine is deterministic, transport-free, and purely in-memory. All
//! multiplayer bookkeeping (connections, timers, broadcast) lives in the
//! server crate; everything here is synchronous state transition.
//!
//! # Modules
//!
//! - [`card`]: card, suit, rank, and special-effect classification
//! - [`deck`]: draw and discard piles
//! - [`player`]: player seats
//! - [`game`]: the rules state machine
//! - [`bot`]: AI decision policy
//! - [`snapshot`]: versioned serialize/deserialize of game state

pub mod bot;
pub mod card;
pub mod deck;
pub mod game;
pub mod player;
pub mod snapshot;

// Re-export commonly used types
pub use bot::{Bot, BotAction};
pub use card::{full_deck, Card, Rank, SpecialEffect, Suit};
pub use deck::Deck;
pub use game::{
    Direction, GameError, GameState, GameStatus, Nomination, PendingPickup, STARTING_HAND_SIZE,
};
pub use player::Player;
pub use snapshot::{SnapshotError, SNAPSHOT_VERSION};
