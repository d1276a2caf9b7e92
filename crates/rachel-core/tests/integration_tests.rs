//! Integration tests for the Rachel rules engine.
//!
//! These tests verify complete game flows: deal, stacked plays, forced
//! pickups, and running a full match to completion with the bot policy.

use rachel_core::*;

fn card(suit: Suit, rank: Rank) -> Card {
    Card::new(suit, rank)
}

/// Build a playing state with fixed hands and a fixed face-up card.
fn playing_state(hands: Vec<Vec<Card>>, current: Card) -> GameState {
    let mut game = GameState::new("integration");
    for (i, hand) in hands.into_iter().enumerate() {
        game.add_player(format!("p{i}"), format!("Player {i}"), false)
            .unwrap();
        game.players[i].hand = hand;
    }
    game.status = GameStatus::Playing;
    game.current_card = Some(current);
    game.deck.discard_pile = vec![current];
    game
}

#[test]
fn test_full_deal_conserves_cards() {
    let mut game = GameState::new("g");
    for i in 0..4 {
        game.add_player(format!("p{i}"), format!("Player {i}"), false)
            .unwrap();
    }
    game.start_game().unwrap();

    assert_eq!(game.status, GameStatus::Playing);
    assert_eq!(game.total_cards(), 52);
    assert_eq!(game.deck.draw_pile.len(), 52 - 4 * STARTING_HAND_SIZE - 1);
    assert_eq!(game.deck.discard_pile.len(), 1);
    assert_eq!(game.current_card, game.deck.top_discard());
}

#[test]
fn test_pickup_chain_scenario() {
    // Seat A holds [2♠, 2♥, 5♦] against a 5♠; plays both 2s stacked.
    let mut game = playing_state(
        vec![
            vec![
                card(Suit::Spades, Rank::Two),
                card(Suit::Hearts, Rank::Two),
                card(Suit::Diamonds, Rank::Five),
            ],
            vec![
                card(Suit::Clubs, Rank::Nine),
                card(Suit::Clubs, Rank::Ten),
            ],
        ],
        card(Suit::Spades, Rank::Five),
    );
    game.deck.draw_pile = vec![
        card(Suit::Diamonds, Rank::Three),
        card(Suit::Diamonds, Rank::Four),
        card(Suit::Diamonds, Rank::Six),
        card(Suit::Diamonds, Rank::Seven),
        card(Suit::Diamonds, Rank::Eight),
    ];

    game.play_card("p0", &[0, 1]).unwrap();
    assert_eq!(game.pending_pickups, 4);
    assert_eq!(game.pending_pickup_type, Some(PendingPickup::Twos));
    assert_eq!(game.current_card, Some(card(Suit::Hearts, Rank::Two)));
    assert_eq!(game.current_player_index, 1);

    // B holds no 2, so B cannot play and must draw the whole penalty.
    assert!(game.get_valid_plays("p1").is_empty());
    let drawn = game.draw_card("p1").unwrap();
    assert_eq!(drawn.len(), 4);
    assert_eq!(game.pending_pickups, 0);
    assert_eq!(game.pending_pickup_type, None);
    assert_eq!(game.players[1].hand.len(), 6);
    assert_eq!(game.current_player_index, 0);
}

#[test]
fn test_jack_war() {
    // Black jack attack, black jack escalation, then a double red jack
    // counter bringing the chain back to zero.
    let mut game = playing_state(
        vec![
            vec![card(Suit::Spades, Rank::Jack), card(Suit::Spades, Rank::Nine)],
            vec![card(Suit::Clubs, Rank::Jack), card(Suit::Clubs, Rank::Nine)],
            vec![
                card(Suit::Hearts, Rank::Jack),
                card(Suit::Diamonds, Rank::Jack),
                card(Suit::Hearts, Rank::Nine),
            ],
        ],
        card(Suit::Spades, Rank::Five),
    );

    game.play_card("p0", &[0]).unwrap();
    assert_eq!(game.pending_pickups, 5);

    game.play_card("p1", &[0]).unwrap();
    assert_eq!(game.pending_pickups, 10);
    assert_eq!(game.pending_pickup_type, Some(PendingPickup::BlackJacks));

    game.play_card("p2", &[0, 1]).unwrap();
    assert_eq!(game.pending_pickups, 0);
    assert_eq!(game.pending_pickup_type, None);
}

#[test]
fn test_turn_isolation() {
    let mut game = playing_state(
        vec![
            vec![card(Suit::Spades, Rank::Nine), card(Suit::Spades, Rank::Two)],
            vec![card(Suit::Hearts, Rank::Four)],
            vec![card(Suit::Clubs, Rank::Six)],
        ],
        card(Suit::Spades, Rank::Five),
    );

    assert_eq!(game.play_card("p1", &[0]), Err(GameError::NotYourTurn));
    assert_eq!(game.play_card("p2", &[0]), Err(GameError::NotYourTurn));
    assert_eq!(game.draw_card("p2"), Err(GameError::NotYourTurn));
    assert_eq!(
        game.nominate_suit("p2", Suit::Hearts),
        Err(GameError::NoAcePlayed)
    );
    // Rejections left nothing behind.
    assert_eq!(game.players[1].hand.len(), 1);
    assert_eq!(game.current_player_index, 0);
}

#[test]
fn test_bot_plays_full_game_to_completion() {
    let mut game = GameState::new("bots");
    for i in 0..4 {
        game.add_player(format!("bot{i}"), format!("Bot {i}"), true)
            .unwrap();
    }
    game.start_game().unwrap();

    let mut bot = Bot::with_seed(42);
    let mut moves = 0;
    let max_moves = 2000;

    while game.status == GameStatus::Playing && moves < max_moves {
        let current = game.current_player().expect("current seat").id.clone();
        let action = bot.decide(&game, &current);
        let result = match action {
            BotAction::Play(indices) => game.play_card(&current, &indices).map(|_| ()),
            BotAction::Draw => game.draw_card(&current).map(|_| ()),
            BotAction::Nominate(suit) => game.nominate_suit(&current, suit),
        };
        assert!(result.is_ok(), "bot made an illegal move: {result:?}");
        assert_eq!(game.total_cards(), 52, "card conservation violated");
        moves += 1;
    }

    assert_eq!(game.status, GameStatus::Finished);
    assert!(!game.winners.is_empty());
    // The last seat standing never joins the winners list.
    assert!(game.winners.len() < 4);
}

#[test]
fn test_snapshot_round_trip_mid_game() {
    let mut game = GameState::new("snap");
    game.add_player("a", "A", false).unwrap();
    game.add_player("b", "B", true).unwrap();
    game.start_game().unwrap();

    let json = snapshot::to_json(&game).unwrap();
    let restored = snapshot::from_json(&json).unwrap();

    assert_eq!(restored.total_cards(), 52);
    assert_eq!(restored.current_card, game.current_card);
    assert_eq!(restored.players[0].hand, game.players[0].hand);
    assert_eq!(restored.deck.draw_pile, game.deck.draw_pile);
}
