//! WebSocket protocol messages for Rachel multiplayer.

use rachel_core::{Card, GameState, GameStatus, Suit};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Create a new game session and take the host seat
    CreateGame { player_name: String },

    /// Join an existing game. Passing the `player_id` from a previous
    /// connection reclaims that seat after a disconnect.
    JoinGame {
        game_id: Uuid,
        player_name: String,
        player_id: Option<Uuid>,
    },

    /// Watch a game that is already underway
    SpectateGame { game_id: Uuid, name: String },

    /// Leave the current game
    LeaveGame,

    /// Start the game (host only)
    StartGame,

    /// Play one or more cards from hand, by value
    PlayCards { cards: Vec<Card> },

    /// Draw instead of playing
    DrawCard,

    /// Nominate the suit after playing an ace
    NominateSuit { suit: Suit },

    /// Add an AI-controlled seat (while waiting)
    AddAiPlayer { name: String },

    /// Request a fresh state snapshot
    GetState,

    /// Request the list of joinable games
    ListGames,

    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Welcome message with assigned player ID
    Welcome { player_id: Uuid },

    /// Game created successfully
    GameCreated { game_id: Uuid },

    /// Joined (or rejoined) a game
    Joined { game_id: Uuid, state: GameView },

    /// Spectating a game
    Spectating { game_id: Uuid, state: GameView },

    /// Left the game
    Left,

    /// Fresh state snapshot
    State { state: GameView },

    /// A session event from the per-game topic
    Event { event: SessionEvent },

    /// List of joinable games
    GameList { games: Vec<GameSummary> },

    /// Command rejected
    Error { kind: String, message: String },

    /// Pong response
    Pong,
}

/// Session events fanned out on the per-game broadcast topic.
///
/// Delivery is at-most-once; observers that fall behind must pull a fresh
/// snapshot rather than rely on replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum SessionEvent {
    GameUpdated { state: GameView },
    GameStarted { state: GameView },
    CardsPlayed {
        player_id: Uuid,
        cards: Vec<Card>,
        state: GameView,
    },
    CardDrawn { player_id: Uuid, count: usize },
    SuitNominated { player_id: Uuid, suit: Suit },
    PlayerWon { player_id: Uuid, position: usize },
    PlayerReconnected { player_id: Uuid },
    PlayerDisconnected { player_id: Uuid },
    SpectatorJoined { spectator_id: Uuid },
}

/// Snapshot of one session, as observers see it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameView {
    pub game: GameState,
    /// Connection status per seat id.
    pub connected: HashMap<String, bool>,
    pub spectators: Vec<SpectatorInfo>,
    pub host_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectatorInfo {
    pub id: Uuid,
    pub name: String,
    pub connected: bool,
}

/// One row in the game list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSummary {
    pub id: Uuid,
    pub status: GameStatus,
    pub players: usize,
    pub max_players: usize,
}
