//! Core rules state machine.
//!
//! `GameState` owns every domain invariant: context-sensitive play legality,
//! special-effect stacking, pickup chains, skip chains, suit nomination, and
//! skip-consuming turn advancement. All transitions validate first and commit
//! second; a rejected command leaves the state untouched.

use crate::card::{Card, Rank, SpecialEffect, Suit};
use crate::deck::Deck;
use crate::player::Player;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cards dealt to each seat at game start.
pub const STARTING_HAND_SIZE: usize = 7;

/// Play direction around the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Clockwise,
    Counterclockwise,
}

impl Direction {
    pub fn flipped(&self) -> Self {
        match self {
            Direction::Clockwise => Direction::Counterclockwise,
            Direction::Counterclockwise => Direction::Clockwise,
        }
    }
}

/// Which card family is currently chaining a forced pickup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingPickup {
    Twos,
    BlackJacks,
}

/// Suit nomination state. `Pending` freezes the turn on the ace player until
/// they nominate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nomination {
    None,
    Pending,
    Suit(Suit),
}

/// Overall game lifecycle. Monotonic: waiting → playing → finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Waiting,
    Playing,
    Finished,
}

/// Errors returned by rule validation. These are expected conditions, never
/// faults, and never leave partial mutations behind.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameError {
    #[error("Not your turn")]
    NotYourTurn,

    #[error("Card index out of range")]
    InvalidCardIndex,

    #[error("Those cards are not in your hand")]
    CardsNotInHand,

    #[error("Card doesn't match the current card's suit or rank")]
    FirstCardInvalid,

    #[error("You must play a 2 or draw the penalty")]
    MustPlayTwos,

    #[error("You must play a jack or draw the penalty")]
    MustPlayJacks,

    #[error("You must play the nominated suit or an ace")]
    MustPlayNominatedSuit,

    #[error("Stacked cards must all share one rank")]
    CanOnlyStackSameRank,

    #[error("You have a valid play and cannot draw")]
    MustPlayValidCard,

    #[error("No ace was played; there is no suit to nominate")]
    NoAcePlayed,

    #[error("You must nominate a suit before doing anything else")]
    MustNominateSuit,

    #[error("Game has already started")]
    GameStarted,

    #[error("Need at least two players to start")]
    NotEnoughPlayers,

    #[error("Game has already started")]
    AlreadyStarted,

    #[error("Game has not started yet")]
    GameNotStarted,

    #[error("Game is over")]
    GameFinished,
}

impl GameError {
    /// Stable machine-readable kind, used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            GameError::NotYourTurn => "not_your_turn",
            GameError::InvalidCardIndex => "invalid_card_index",
            GameError::CardsNotInHand => "cards_not_in_hand",
            GameError::FirstCardInvalid => "first_card_invalid",
            GameError::MustPlayTwos => "must_play_twos",
            GameError::MustPlayJacks => "must_play_jacks",
            GameError::MustPlayNominatedSuit => "must_play_nominated_suit",
            GameError::CanOnlyStackSameRank => "can_only_stack_same_rank",
            GameError::MustPlayValidCard => "must_play_valid_card",
            GameError::NoAcePlayed => "no_ace_played",
            GameError::MustNominateSuit => "must_nominate_suit",
            GameError::GameStarted => "game_started",
            GameError::NotEnoughPlayers => "not_enough_players",
            GameError::AlreadyStarted => "already_started",
            GameError::GameNotStarted => "game_not_started",
            GameError::GameFinished => "game_finished",
        }
    }
}

/// The complete authoritative state of one match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub id: String,
    pub players: Vec<Player>,
    pub deck: Deck,
    /// The face-up card plays are matched against. `None` only while waiting.
    pub current_card: Option<Card>,
    pub current_player_index: usize,
    pub direction: Direction,
    /// Accumulated forced-draw penalty owed by the next player to draw.
    pub pending_pickups: u32,
    pub pending_pickup_type: Option<PendingPickup>,
    /// Accumulated turns to bypass, built by stacking 7s.
    pub pending_skips: u32,
    pub nominated_suit: Nomination,
    pub status: GameStatus,
    /// Player ids in finish order.
    pub winners: Vec<String>,
}

impl GameState {
    /// An empty game in the waiting lobby. Seat ids must be unique; the
    /// caller owns that guarantee.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            players: Vec::new(),
            deck: Deck::empty(),
            current_card: None,
            current_player_index: 0,
            direction: Direction::Clockwise,
            pending_pickups: 0,
            pending_pickup_type: None,
            pending_skips: 0,
            nominated_suit: Nomination::None,
            status: GameStatus::Waiting,
            winners: Vec::new(),
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn seat_index(&self, player_id: &str) -> Option<usize> {
        self.players.iter().position(|p| p.id == player_id)
    }

    pub fn get_player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn current_player(&self) -> Option<&Player> {
        self.players.get(self.current_player_index)
    }

    fn is_current(&self, player_id: &str) -> bool {
        self.current_player().map(|p| p.id == player_id).unwrap_or(false)
    }

    fn seat_finished(&self, index: usize) -> bool {
        self.players
            .get(index)
            .map(|p| self.winners.contains(&p.id))
            .unwrap_or(true)
    }

    /// Seats still holding cards (not yet in `winners`).
    pub fn active_seat_count(&self) -> usize {
        self.players
            .iter()
            .filter(|p| !self.winners.contains(&p.id))
            .count()
    }

    // ==================== Lobby ====================

    /// Add a seat. Only legal while waiting.
    pub fn add_player(
        &mut self,
        player_id: impl Into<String>,
        name: impl Into<String>,
        is_ai: bool,
    ) -> Result<(), GameError> {
        if self.status != GameStatus::Waiting {
            return Err(GameError::GameStarted);
        }
        self.players.push(Player::new(player_id, name, is_ai));
        Ok(())
    }

    /// Remove a seat while waiting. Returns whether a seat was removed.
    pub fn remove_player(&mut self, player_id: &str) -> Result<bool, GameError> {
        if self.status != GameStatus::Waiting {
            return Err(GameError::GameStarted);
        }
        let before = self.players.len();
        self.players.retain(|p| p.id != player_id);
        Ok(self.players.len() != before)
    }

    /// Hand a seat over to AI control. Permanent for the match. Returns
    /// whether the seat exists.
    pub fn convert_to_ai(&mut self, player_id: &str) -> bool {
        match self.players.iter_mut().find(|p| p.id == player_id) {
            Some(p) => {
                p.is_ai = true;
                true
            }
            None => false,
        }
    }

    /// Shuffle a fresh deck, flip the opening card, deal an equal hand to
    /// every seat, and begin play.
    ///
    /// Hands are seven cards, or fewer at a full table: the pack cannot
    /// cover eight seven-card hands, so the deal shrinks to keep every hand
    /// equal and the face-up card is flipped before dealing.
    pub fn start_game(&mut self) -> Result<(), GameError> {
        if self.status != GameStatus::Waiting {
            return Err(GameError::AlreadyStarted);
        }
        if self.players.len() < 2 {
            return Err(GameError::NotEnoughPlayers);
        }

        let mut rng = rand::thread_rng();
        let mut deck = Deck::new(&mut rng);
        let opening = deck.draw(1, &mut rng);
        deck.add_to_discard(&opening);
        self.current_card = opening.first().copied();

        let dealable = deck.draw_pile.len();
        let hand_size = STARTING_HAND_SIZE.min(dealable / self.players.len());
        for player in &mut self.players {
            player.hand = deck.draw(hand_size, &mut rng);
        }
        self.deck = deck;
        self.current_player_index = 0;
        self.status = GameStatus::Playing;
        Ok(())
    }

    // ==================== Play ====================

    /// Play one card, or several of one rank, from the acting player's hand.
    ///
    /// Returns the cards played, in play order. On success the last card
    /// becomes the face-up card and the turn advances, unless an ace left a
    /// nomination pending, in which case the turn stays frozen on the player.
    pub fn play_card(
        &mut self,
        player_id: &str,
        indices: &[usize],
    ) -> Result<Vec<Card>, GameError> {
        match self.status {
            GameStatus::Waiting => return Err(GameError::GameNotStarted),
            GameStatus::Finished => return Err(GameError::GameFinished),
            GameStatus::Playing => {}
        }

        let seat = self.seat_index(player_id).ok_or(GameError::NotYourTurn)?;

        // Resolve indices against the acting player's hand.
        let hand = &self.players[seat].hand;
        if indices.is_empty() || indices.iter().any(|&i| i >= hand.len()) {
            return Err(GameError::InvalidCardIndex);
        }
        {
            let mut seen = indices.to_vec();
            seen.sort_unstable();
            seen.dedup();
            if seen.len() != indices.len() {
                return Err(GameError::InvalidCardIndex);
            }
        }
        let played: Vec<Card> = indices.iter().map(|&i| hand[i]).collect();

        if seat != self.current_player_index {
            return Err(GameError::NotYourTurn);
        }
        if self.nominated_suit == Nomination::Pending {
            return Err(GameError::MustNominateSuit);
        }

        // Stacked cards must share one rank.
        if played.iter().any(|c| c.rank != played[0].rank) {
            return Err(GameError::CanOnlyStackSameRank);
        }

        self.check_play_legality(&played)?;

        // Validated; commit. Remove highest indices first so the remaining
        // indices stay stable.
        let mut removal: Vec<usize> = indices.to_vec();
        removal.sort_unstable_by(|a, b| b.cmp(a));
        for i in removal {
            self.players[seat].hand.remove(i);
        }

        // A successful play satisfies any prior nomination.
        self.nominated_suit = Nomination::None;

        for card in &played {
            let black_jacks_pending =
                self.pending_pickup_type == Some(PendingPickup::BlackJacks);
            match card.special_effect(black_jacks_pending) {
                SpecialEffect::PickupTwo => {
                    self.pending_pickups += 2;
                    self.pending_pickup_type = Some(PendingPickup::Twos);
                }
                SpecialEffect::Skip => {
                    self.pending_skips += 1;
                }
                SpecialEffect::JackAttack => {
                    self.pending_pickups += 5;
                    self.pending_pickup_type = Some(PendingPickup::BlackJacks);
                }
                SpecialEffect::JackCounter => {
                    self.pending_pickups = self.pending_pickups.saturating_sub(5);
                    if self.pending_pickups == 0 {
                        self.pending_pickup_type = None;
                    }
                }
                SpecialEffect::Reverse => {
                    self.direction = self.direction.flipped();
                }
                SpecialEffect::Wild => {
                    self.nominated_suit = Nomination::Pending;
                }
                SpecialEffect::None => {}
            }
        }

        self.current_card = played.last().copied();
        self.deck.add_to_discard(&played);

        if self.players[seat].hand.is_empty() {
            self.winners.push(player_id.to_string());
            // A finished seat cannot nominate; let the ace on top stand for
            // its own suit.
            if self.nominated_suit == Nomination::Pending {
                if let Some(card) = self.current_card {
                    self.nominated_suit = Nomination::Suit(card.suit);
                }
            }
            if self.active_seat_count() < 2 {
                self.status = GameStatus::Finished;
                return Ok(played);
            }
        }

        if self.nominated_suit == Nomination::Pending {
            // Turn frozen: the same player must nominate next.
            return Ok(played);
        }

        self.advance_turn();
        Ok(played)
    }

    /// Draw cards instead of playing. Only legal for the current player when
    /// they have no legal play; draws `max(1, pending_pickups)` and clears
    /// the pickup chain.
    pub fn draw_card(&mut self, player_id: &str) -> Result<Vec<Card>, GameError> {
        match self.status {
            GameStatus::Waiting => return Err(GameError::GameNotStarted),
            GameStatus::Finished => return Err(GameError::GameFinished),
            GameStatus::Playing => {}
        }
        if !self.is_current(player_id) {
            return Err(GameError::NotYourTurn);
        }
        if self.nominated_suit == Nomination::Pending {
            return Err(GameError::MustNominateSuit);
        }
        if self.has_valid_play(player_id) {
            return Err(GameError::MustPlayValidCard);
        }

        let count = self.pending_pickups.max(1) as usize;
        let mut rng = rand::thread_rng();
        let drawn = self.deck.draw(count, &mut rng);
        let seat = self.current_player_index;
        self.players[seat].hand.extend(drawn.iter().copied());
        self.pending_pickups = 0;
        self.pending_pickup_type = None;
        self.advance_turn();
        Ok(drawn)
    }

    /// Resolve a pending ace by nominating the next suit to follow.
    pub fn nominate_suit(&mut self, player_id: &str, suit: Suit) -> Result<(), GameError> {
        match self.status {
            GameStatus::Waiting => return Err(GameError::GameNotStarted),
            GameStatus::Finished => return Err(GameError::GameFinished),
            GameStatus::Playing => {}
        }
        if self.nominated_suit != Nomination::Pending {
            return Err(GameError::NoAcePlayed);
        }
        if !self.is_current(player_id) {
            return Err(GameError::NotYourTurn);
        }

        self.nominated_suit = Nomination::Suit(suit);
        self.advance_turn();
        Ok(())
    }

    // ==================== Legality ====================

    /// Step-4 legality for a whole move. The pickup chain binds every card;
    /// nomination and normal matching bind only the first.
    fn check_play_legality(&self, played: &[Card]) -> Result<(), GameError> {
        let first = played[0];
        match self.pending_pickup_type {
            Some(PendingPickup::Twos) => {
                if played.iter().any(|c| c.rank != Rank::Two) {
                    return Err(GameError::MustPlayTwos);
                }
            }
            Some(PendingPickup::BlackJacks) => {
                if played.iter().any(|c| c.rank != Rank::Jack) {
                    return Err(GameError::MustPlayJacks);
                }
            }
            None => match self.nominated_suit {
                Nomination::Suit(suit) => {
                    if first.suit != suit && first.rank != Rank::Ace {
                        return Err(GameError::MustPlayNominatedSuit);
                    }
                }
                _ => {
                    let Some(current) = self.current_card else {
                        return Err(GameError::GameNotStarted);
                    };
                    if first.suit != current.suit
                        && first.rank != current.rank
                        && first.rank != Rank::Ace
                    {
                        return Err(GameError::FirstCardInvalid);
                    }
                }
            },
        }
        Ok(())
    }

    /// Would playing this single card alone be legal right now?
    pub fn is_card_playable(&self, card: Card) -> bool {
        self.check_play_legality(&[card]).is_ok()
    }

    /// Every `(card, index)` in the player's hand playable as a single card
    /// against the current context.
    pub fn get_valid_plays(&self, player_id: &str) -> Vec<(Card, usize)> {
        if self.status != GameStatus::Playing || self.nominated_suit == Nomination::Pending {
            return Vec::new();
        }
        let Some(player) = self.get_player(player_id) else {
            return Vec::new();
        };
        player
            .hand
            .iter()
            .enumerate()
            .filter(|(_, c)| self.is_card_playable(**c))
            .map(|(i, c)| (*c, i))
            .collect()
    }

    pub fn has_valid_play(&self, player_id: &str) -> bool {
        !self.get_valid_plays(player_id).is_empty()
    }

    // ==================== Turn advancement ====================

    /// Advance past `pending_skips` active seats, consuming the skip budget,
    /// then one normal step. Iterative: bounded by seat count per step, so
    /// stacked skips never grow the stack.
    fn advance_turn(&mut self) {
        let skips = self.pending_skips;
        self.pending_skips = 0;
        for _ in 0..=skips {
            self.step_to_next_active_seat();
        }
    }

    fn step_to_next_active_seat(&mut self) {
        let n = self.players.len();
        if n == 0 {
            return;
        }
        for _ in 0..n {
            self.current_player_index = match self.direction {
                Direction::Clockwise => (self.current_player_index + 1) % n,
                Direction::Counterclockwise => (self.current_player_index + n - 1) % n,
            };
            if !self.seat_finished(self.current_player_index) {
                return;
            }
        }
    }

    /// Conservation check: every card of the 52 is in exactly one place.
    pub fn total_cards(&self) -> usize {
        self.deck.len() + self.players.iter().map(|p| p.hand.len()).sum::<usize>()
    }
}
