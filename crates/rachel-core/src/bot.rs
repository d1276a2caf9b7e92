//! AI decision policy.
//!
//! A stateless heuristic over engine state: counter attacks first, keep the
//! chain going second, spend disruption cards while nobody is close to going
//! out, and hoard defensive red jacks and aces otherwise. Ties at the top
//! score break uniformly at random.

use crate::card::{Card, Rank, Suit};
use crate::game::{GameState, Nomination, PendingPickup};
use rand::prelude::*;

/// An action chosen by the bot, expressed in the same vocabulary the engine
/// validates for human players.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotAction {
    /// Hand indices to play.
    Play(Vec<usize>),
    Draw,
    Nominate(Suit),
}

/// AI decision maker. Holds its own rng so tests can seed it.
pub struct Bot {
    rng: StdRng,
}

impl Default for Bot {
    fn default() -> Self {
        Self::new()
    }
}

impl Bot {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Pick an action for the given seat.
    pub fn decide(&mut self, game: &GameState, player_id: &str) -> BotAction {
        let is_current = game
            .current_player()
            .map(|p| p.id == player_id)
            .unwrap_or(false);

        if game.nominated_suit == Nomination::Pending && is_current {
            return BotAction::Nominate(self.choose_suit(game, player_id));
        }

        let valid_plays = game.get_valid_plays(player_id);
        if valid_plays.is_empty() {
            return BotAction::Draw;
        }

        let scored: Vec<(usize, u32)> = valid_plays
            .iter()
            .map(|(card, idx)| (*idx, self.score_card(game, *card)))
            .collect();
        let best = scored.iter().map(|(_, s)| *s).max().unwrap_or(0);
        let top: Vec<usize> = scored
            .iter()
            .filter(|(_, s)| *s == best)
            .map(|(i, _)| *i)
            .collect();

        match top.choose(&mut self.rng) {
            Some(idx) => BotAction::Play(vec![*idx]),
            None => BotAction::Draw,
        }
    }

    /// Most-held suit in hand; ties go to the first suit encountered in hand
    /// order, and an empty hand falls back to hearts.
    fn choose_suit(&mut self, game: &GameState, player_id: &str) -> Suit {
        let Some(player) = game.get_player(player_id) else {
            return Suit::Hearts;
        };

        let mut best = Suit::Hearts;
        let mut best_count = 0;
        for card in &player.hand {
            let count = player.suit_count(card.suit);
            if count > best_count {
                best = card.suit;
                best_count = count;
            }
        }
        best
    }

    fn score_card(&mut self, game: &GameState, card: Card) -> u32 {
        match game.pending_pickup_type {
            Some(PendingPickup::BlackJacks) => {
                if card.is_red_jack() {
                    100
                } else if card.is_black_jack() {
                    90
                } else {
                    0
                }
            }
            Some(PendingPickup::Twos) => {
                if card.rank == Rank::Two {
                    85
                } else {
                    0
                }
            }
            None => {
                let opponent_low = self.opponent_low_on_cards(game);
                if card.is_black_jack() && !opponent_low {
                    75
                } else if card.rank == Rank::Two && !opponent_low {
                    70
                } else if card.rank == Rank::Seven && !opponent_low {
                    65
                } else if card.rank == Rank::Queen && game.player_count() >= 3 {
                    60
                } else if card.is_red_jack() {
                    // Worth hoarding as a counter.
                    30
                } else if card.rank == Rank::Ace {
                    30
                } else {
                    self.rng.gen_range(40..=50)
                }
            }
        }
    }

    /// Does any unfinished seat other than the acting one hold three cards
    /// or fewer?
    fn opponent_low_on_cards(&self, game: &GameState) -> bool {
        game.players
            .iter()
            .enumerate()
            .filter(|(i, p)| {
                *i != game.current_player_index && !game.winners.contains(&p.id)
            })
            .any(|(_, p)| p.hand.len() <= 3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameStatus;

    fn card(suit: Suit, rank: Rank) -> Card {
        Card::new(suit, rank)
    }

    fn playing_state(hands: Vec<Vec<Card>>, current: Card) -> GameState {
        let mut game = GameState::new("g1");
        for (i, hand) in hands.into_iter().enumerate() {
            game.add_player(format!("p{i}"), format!("Player {i}"), true)
                .unwrap();
            game.players[i].hand = hand;
        }
        game.status = GameStatus::Playing;
        game.current_card = Some(current);
        game.deck.discard_pile = vec![current];
        game
    }

    #[test]
    fn test_red_jack_dominates_under_attack() {
        let mut game = playing_state(
            vec![
                vec![
                    card(Suit::Spades, Rank::Jack),
                    card(Suit::Hearts, Rank::Jack),
                    card(Suit::Diamonds, Rank::Jack),
                ],
                vec![card(Suit::Clubs, Rank::Four); 5],
            ],
            card(Suit::Clubs, Rank::Jack),
        );
        game.pending_pickups = 5;
        game.pending_pickup_type = Some(PendingPickup::BlackJacks);

        // Red jacks at indices 1 and 2 strictly dominate the black jack.
        for seed in 0..20 {
            let mut bot = Bot::with_seed(seed);
            match bot.decide(&game, "p0") {
                BotAction::Play(indices) => {
                    assert_eq!(indices.len(), 1);
                    assert!(indices[0] == 1 || indices[0] == 2);
                }
                other => panic!("expected a play, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_draws_with_no_valid_play() {
        let game = playing_state(
            vec![
                vec![card(Suit::Clubs, Rank::Four)],
                vec![card(Suit::Clubs, Rank::Nine)],
            ],
            card(Suit::Hearts, Rank::Ten),
        );
        let mut bot = Bot::with_seed(1);
        assert_eq!(bot.decide(&game, "p0"), BotAction::Draw);
    }

    #[test]
    fn test_nominates_most_held_suit() {
        let mut game = playing_state(
            vec![
                vec![
                    card(Suit::Clubs, Rank::Four),
                    card(Suit::Diamonds, Rank::Six),
                    card(Suit::Diamonds, Rank::Nine),
                ],
                vec![card(Suit::Clubs, Rank::Nine)],
            ],
            card(Suit::Hearts, Rank::Ace),
        );
        game.nominated_suit = Nomination::Pending;

        let mut bot = Bot::with_seed(7);
        assert_eq!(bot.decide(&game, "p0"), BotAction::Nominate(Suit::Diamonds));
    }

    #[test]
    fn test_nomination_fallback_is_hearts() {
        let mut game = playing_state(
            vec![vec![], vec![card(Suit::Clubs, Rank::Nine)]],
            card(Suit::Hearts, Rank::Ace),
        );
        game.nominated_suit = Nomination::Pending;

        let mut bot = Bot::with_seed(7);
        assert_eq!(bot.decide(&game, "p0"), BotAction::Nominate(Suit::Hearts));
    }

    #[test]
    fn test_continues_two_chain() {
        let mut game = playing_state(
            vec![
                vec![card(Suit::Hearts, Rank::Two), card(Suit::Hearts, Rank::King)],
                vec![card(Suit::Clubs, Rank::Nine); 5],
            ],
            card(Suit::Spades, Rank::Two),
        );
        game.pending_pickups = 2;
        game.pending_pickup_type = Some(PendingPickup::Twos);

        let mut bot = Bot::with_seed(3);
        assert_eq!(bot.decide(&game, "p0"), BotAction::Play(vec![0]));
    }

    #[test]
    fn test_holds_attack_cards_when_opponent_low() {
        // Opponent holds 2 cards, so the black jack loses its bonus and an
        // ordinary matching card (40-50) outranks the hoarded ace (30).
        let game = playing_state(
            vec![
                vec![card(Suit::Spades, Rank::Ace), card(Suit::Spades, Rank::Nine)],
                vec![card(Suit::Clubs, Rank::Four), card(Suit::Clubs, Rank::Five)],
            ],
            card(Suit::Spades, Rank::Five),
        );

        for seed in 0..10 {
            let mut bot = Bot::with_seed(seed);
            assert_eq!(bot.decide(&game, "p0"), BotAction::Play(vec![1]));
        }
    }
}
