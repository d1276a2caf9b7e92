//! Per-game session orchestration.
//!
//! One task owns the authoritative state of one live match. Commands arrive
//! on an mpsc channel and are applied strictly in order; every accepted
//! mutation publishes on the session's broadcast topic, and rejected commands
//! publish nothing. Timers (AI turn, disconnect grace, idle shutdown) are
//! one-shot notifications delivered back into the same command queue, so all
//! mutation stays on the session task.

use crate::protocol::{GameView, SessionEvent, SpectatorInfo};
use rachel_core::{Bot, BotAction, Card, GameError, GameState, GameStatus, Suit};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

/// Seat cap per game.
pub const MAX_PLAYERS: usize = 8;

/// Delay before an AI-controlled seat takes its turn.
pub const AI_TURN_DELAY: Duration = Duration::from_millis(800);

/// How long a disconnected human seat waits before AI conversion.
pub const DISCONNECT_GRACE: Duration = Duration::from_secs(30);

/// Sessions with no inbound commands for this long shut themselves down.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Session-level rejections. Rules rejections pass through unchanged.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Game is full")]
    GameFull,

    #[error("Already joined this game")]
    AlreadyJoined,

    #[error("Already spectating this game")]
    AlreadySpectating,

    #[error("Only the host can do that")]
    NotHost,

    #[error("Game not found")]
    GameNotFound,

    #[error("Cannot add an AI player now")]
    CannotAddAi,

    #[error("You are not in this game")]
    PlayerNotInGame,

    #[error("Game has not started yet")]
    GameNotStarted,

    #[error("You are seated in this game, not spectating")]
    AlreadyPlaying,

    #[error(transparent)]
    Rules(#[from] GameError),
}

impl SessionError {
    /// Stable machine-readable kind, used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::GameFull => "game_full",
            SessionError::AlreadyJoined => "already_joined",
            SessionError::AlreadySpectating => "already_spectating",
            SessionError::NotHost => "not_host",
            SessionError::GameNotFound => "game_not_found",
            SessionError::CannotAddAi => "cannot_add_ai",
            SessionError::PlayerNotInGame => "player_not_in_game",
            SessionError::GameNotStarted => "game_not_started",
            SessionError::AlreadyPlaying => "already_playing",
            SessionError::Rules(e) => e.kind(),
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

/// Commands accepted by a session task.
pub enum Command {
    Join {
        player_id: Uuid,
        name: String,
        reply: Reply<GameView>,
    },
    Spectate {
        id: Uuid,
        name: String,
        reply: Reply<GameView>,
    },
    Leave {
        player_id: Uuid,
        reply: Reply<()>,
    },
    Start {
        player_id: Uuid,
        reply: Reply<GameView>,
    },
    PlayCards {
        player_id: Uuid,
        cards: Vec<Card>,
        reply: Reply<GameView>,
    },
    DrawCard {
        player_id: Uuid,
        reply: Reply<GameView>,
    },
    NominateSuit {
        player_id: Uuid,
        suit: Suit,
        reply: Reply<GameView>,
    },
    AddAi {
        name: String,
        reply: Reply<GameView>,
    },
    GetState {
        reply: oneshot::Sender<GameView>,
    },
    /// Transport-level notice that a participant's connection dropped.
    Disconnected { player_id: Uuid },
    /// Deferred AI-turn timer fired.
    AiTurn { generation: u64 },
    /// A disconnect grace timer fired.
    GraceExpired { player_id: Uuid, generation: u64 },
    /// Terminate the session.
    Stop,
}

/// Cheap handle for talking to a session task.
#[derive(Clone)]
pub struct SessionHandle {
    pub id: Uuid,
    cmd_tx: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .map_err(|_| SessionError::GameNotFound)?;
        rx.await.map_err(|_| SessionError::GameNotFound)?
    }

    pub async fn join(&self, player_id: Uuid, name: String) -> Result<GameView, SessionError> {
        self.request(|reply| Command::Join {
            player_id,
            name,
            reply,
        })
        .await
    }

    pub async fn spectate(&self, id: Uuid, name: String) -> Result<GameView, SessionError> {
        self.request(|reply| Command::Spectate { id, name, reply }).await
    }

    pub async fn leave(&self, player_id: Uuid) -> Result<(), SessionError> {
        self.request(|reply| Command::Leave { player_id, reply }).await
    }

    pub async fn start(&self, player_id: Uuid) -> Result<GameView, SessionError> {
        self.request(|reply| Command::Start { player_id, reply }).await
    }

    pub async fn play_cards(
        &self,
        player_id: Uuid,
        cards: Vec<Card>,
    ) -> Result<GameView, SessionError> {
        self.request(|reply| Command::PlayCards {
            player_id,
            cards,
            reply,
        })
        .await
    }

    pub async fn draw_card(&self, player_id: Uuid) -> Result<GameView, SessionError> {
        self.request(|reply| Command::DrawCard { player_id, reply }).await
    }

    pub async fn nominate_suit(
        &self,
        player_id: Uuid,
        suit: Suit,
    ) -> Result<GameView, SessionError> {
        self.request(|reply| Command::NominateSuit {
            player_id,
            suit,
            reply,
        })
        .await
    }

    pub async fn add_ai_player(&self, name: String) -> Result<GameView, SessionError> {
        self.request(|reply| Command::AddAi { name, reply }).await
    }

    pub async fn get_state(&self) -> Result<GameView, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::GetState { reply: tx })
            .map_err(|_| SessionError::GameNotFound)?;
        rx.await.map_err(|_| SessionError::GameNotFound)
    }

    /// Fire-and-forget connection-drop notice.
    pub fn notify_disconnect(&self, player_id: Uuid) {
        let _ = self.cmd_tx.send(Command::Disconnected { player_id });
    }

    pub fn stop(&self) {
        let _ = self.cmd_tx.send(Command::Stop);
    }
}

struct Spectator {
    name: String,
    connected: bool,
}

/// A pending one-shot timer. Replaced, never stacked: arming a new timer of
/// the same kind aborts the old task, and a stale firing is ignored by
/// generation check.
struct Timer {
    generation: u64,
    handle: JoinHandle<()>,
}

impl Timer {
    fn cancel(self) {
        self.handle.abort();
    }
}

/// The single-writer owner of one live match.
struct Session {
    id: Uuid,
    game: GameState,
    connected: HashMap<Uuid, bool>,
    spectators: HashMap<Uuid, Spectator>,
    host_id: Option<Uuid>,
    bot: Bot,
    ai_timer: Option<Timer>,
    grace_timers: HashMap<Uuid, Timer>,
    timer_generation: u64,
    created_at: Instant,
    started_at: Option<Instant>,
    cmd_tx: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<SessionEvent>,
    stopping: bool,
}

/// Spawn a new session task. The returned join handle completes when the
/// session shuts down (explicit stop, empty lobby, or idle timeout).
pub fn spawn(id: Uuid) -> (SessionHandle, JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (events, _) = broadcast::channel(64);

    let session = Session {
        id,
        game: GameState::new(id.to_string()),
        connected: HashMap::new(),
        spectators: HashMap::new(),
        host_id: None,
        bot: Bot::new(),
        ai_timer: None,
        grace_timers: HashMap::new(),
        timer_generation: 0,
        created_at: Instant::now(),
        started_at: None,
        cmd_tx: cmd_tx.clone(),
        events: events.clone(),
        stopping: false,
    };

    let handle = SessionHandle { id, cmd_tx, events };
    let task = tokio::spawn(session.run(cmd_rx));
    (handle, task)
}

impl Session {
    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
        let mut idle_deadline = Instant::now() + IDLE_TIMEOUT;

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Stop) | None => break,
                    Some(cmd) => {
                        idle_deadline = Instant::now() + IDLE_TIMEOUT;
                        self.handle(cmd);
                        if self.stopping {
                            break;
                        }
                    }
                },
                _ = sleep_until(idle_deadline) => {
                    info!("session {} idle for {:?}, shutting down", self.id, IDLE_TIMEOUT);
                    break;
                }
            }
        }

        self.cancel_all_timers();
        info!(
            "session {} closed after {:?}",
            self.id,
            self.created_at.elapsed()
        );
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Join {
                player_id,
                name,
                reply,
            } => {
                let _ = reply.send(self.join(player_id, name));
            }
            Command::Spectate { id, name, reply } => {
                let _ = reply.send(self.spectate(id, name));
            }
            Command::Leave { player_id, reply } => {
                let _ = reply.send(self.leave(player_id));
            }
            Command::Start { player_id, reply } => {
                let _ = reply.send(self.start(player_id));
            }
            Command::PlayCards {
                player_id,
                cards,
                reply,
            } => {
                let res = self
                    .resolve_indices(player_id, &cards)
                    .and_then(|indices| self.apply_play(player_id, &indices))
                    .map(|_| self.view());
                let _ = reply.send(res);
            }
            Command::DrawCard { player_id, reply } => {
                let res = self.apply_draw(player_id).map(|_| self.view());
                let _ = reply.send(res);
            }
            Command::NominateSuit {
                player_id,
                suit,
                reply,
            } => {
                let res = self.apply_nominate(player_id, suit).map(|_| self.view());
                let _ = reply.send(res);
            }
            Command::AddAi { name, reply } => {
                let _ = reply.send(self.add_ai(name));
            }
            Command::GetState { reply } => {
                let _ = reply.send(self.view());
            }
            Command::Disconnected { player_id } => self.on_disconnected(player_id),
            Command::AiTurn { generation } => self.on_ai_turn(generation),
            Command::GraceExpired {
                player_id,
                generation,
            } => self.on_grace_expired(player_id, generation),
            // Stop handled in the run loop.
            Command::Stop => {}
        }
    }

    // ==================== Membership ====================

    fn join(&mut self, player_id: Uuid, name: String) -> Result<GameView, SessionError> {
        let seat_id = player_id.to_string();

        if self.game.seat_index(&seat_id).is_some() {
            // Reconnect path: an existing seat reclaiming its identity.
            if self.connected.get(&player_id) == Some(&true) {
                return Err(SessionError::AlreadyJoined);
            }
            self.connected.insert(player_id, true);
            if let Some(timer) = self.grace_timers.remove(&player_id) {
                timer.cancel();
            }
            info!("player {} reconnected to game {}", player_id, self.id);
            self.publish(SessionEvent::PlayerReconnected { player_id });
            self.publish_updated();
            return Ok(self.view());
        }

        if self.game.status != GameStatus::Waiting {
            return Err(SessionError::Rules(GameError::GameStarted));
        }
        if self.game.player_count() >= MAX_PLAYERS {
            return Err(SessionError::GameFull);
        }

        self.game.add_player(seat_id, name, false)?;
        self.connected.insert(player_id, true);
        if self.host_id.is_none() {
            self.host_id = Some(player_id);
        }
        self.publish_updated();
        Ok(self.view())
    }

    fn spectate(&mut self, id: Uuid, name: String) -> Result<GameView, SessionError> {
        if self.game.status == GameStatus::Waiting {
            return Err(SessionError::GameNotStarted);
        }
        if self.game.seat_index(&id.to_string()).is_some() {
            return Err(SessionError::AlreadyPlaying);
        }
        if self.spectators.contains_key(&id) {
            return Err(SessionError::AlreadySpectating);
        }

        self.spectators.insert(
            id,
            Spectator {
                name,
                connected: true,
            },
        );
        self.publish(SessionEvent::SpectatorJoined { spectator_id: id });
        Ok(self.view())
    }

    fn leave(&mut self, player_id: Uuid) -> Result<(), SessionError> {
        if self.spectators.remove(&player_id).is_some() {
            return Ok(());
        }

        let seat_id = player_id.to_string();
        if self.game.seat_index(&seat_id).is_none() {
            return Err(SessionError::PlayerNotInGame);
        }

        match self.game.status {
            GameStatus::Waiting => {
                self.game.remove_player(&seat_id)?;
                self.connected.remove(&player_id);
                if self.host_id == Some(player_id) {
                    self.host_id = self
                        .game
                        .players
                        .first()
                        .and_then(|p| Uuid::parse_str(&p.id).ok());
                }
                if self.game.player_count() == 0 {
                    info!("game {} emptied while waiting, closing", self.id);
                    self.stopping = true;
                    return Ok(());
                }
                self.publish_updated();
            }
            GameStatus::Playing => {
                // Mid-game the seat stays, under AI control, keeping its
                // hand and position.
                self.game.convert_to_ai(&seat_id);
                self.connected.insert(player_id, false);
                if let Some(timer) = self.grace_timers.remove(&player_id) {
                    timer.cancel();
                }
                info!("player {} left game {}, seat handed to AI", player_id, self.id);
                self.publish_updated();
                self.schedule_ai_if_needed();
            }
            GameStatus::Finished => {
                self.connected.insert(player_id, false);
            }
        }
        Ok(())
    }

    fn start(&mut self, player_id: Uuid) -> Result<GameView, SessionError> {
        if self.game.seat_index(&player_id.to_string()).is_none() {
            return Err(SessionError::PlayerNotInGame);
        }
        if self.host_id != Some(player_id) {
            return Err(SessionError::NotHost);
        }

        self.game.start_game()?;
        self.started_at = Some(Instant::now());
        info!(
            "game {} started with {} players",
            self.id,
            self.game.player_count()
        );
        self.publish(SessionEvent::GameStarted { state: self.view() });
        self.schedule_ai_if_needed();
        Ok(self.view())
    }

    fn add_ai(&mut self, name: String) -> Result<GameView, SessionError> {
        if self.game.status != GameStatus::Waiting {
            return Err(SessionError::Rules(GameError::GameStarted));
        }
        if self.game.player_count() >= MAX_PLAYERS {
            return Err(SessionError::CannotAddAi);
        }

        self.game.add_player(Uuid::new_v4().to_string(), name, true)?;
        self.publish_updated();
        Ok(self.view())
    }

    // ==================== Game actions ====================

    /// Map card values to hand indices; first unused match wins.
    fn resolve_indices(
        &self,
        player_id: Uuid,
        cards: &[Card],
    ) -> Result<Vec<usize>, SessionError> {
        let seat_id = player_id.to_string();
        let player = self
            .game
            .get_player(&seat_id)
            .ok_or(SessionError::PlayerNotInGame)?;

        let mut used = vec![false; player.hand.len()];
        let mut indices = Vec::with_capacity(cards.len());
        for want in cards {
            let found = player
                .hand
                .iter()
                .enumerate()
                .find(|(i, have)| !used[*i] && *have == want);
            match found {
                Some((i, _)) => {
                    used[i] = true;
                    indices.push(i);
                }
                None => return Err(SessionError::Rules(GameError::CardsNotInHand)),
            }
        }
        Ok(indices)
    }

    fn apply_play(&mut self, player_id: Uuid, indices: &[usize]) -> Result<(), SessionError> {
        let prior_winners = self.game.winners.len();
        let played = self.game.play_card(&player_id.to_string(), indices)?;
        self.publish(SessionEvent::CardsPlayed {
            player_id,
            cards: played,
            state: self.view(),
        });
        self.publish_new_winners(prior_winners);
        if self.game.status == GameStatus::Finished {
            if let Some(started) = self.started_at {
                info!("game {} finished after {:?}", self.id, started.elapsed());
            }
        }
        self.schedule_ai_if_needed();
        Ok(())
    }

    fn apply_draw(&mut self, player_id: Uuid) -> Result<(), SessionError> {
        let drawn = self.game.draw_card(&player_id.to_string())?;
        self.publish(SessionEvent::CardDrawn {
            player_id,
            count: drawn.len(),
        });
        self.publish_updated();
        self.schedule_ai_if_needed();
        Ok(())
    }

    fn apply_nominate(&mut self, player_id: Uuid, suit: Suit) -> Result<(), SessionError> {
        self.game.nominate_suit(&player_id.to_string(), suit)?;
        self.publish(SessionEvent::SuitNominated { player_id, suit });
        self.publish_updated();
        self.schedule_ai_if_needed();
        Ok(())
    }

    // ==================== Connection state ====================

    fn on_disconnected(&mut self, player_id: Uuid) {
        if let Some(spectator) = self.spectators.get_mut(&player_id) {
            spectator.connected = false;
            return;
        }

        let seat_id = player_id.to_string();
        let Some(seat) = self.game.seat_index(&seat_id) else {
            return;
        };

        match self.game.status {
            GameStatus::Waiting => {
                // No game yet; drop the seat entirely, like an explicit leave.
                let _ = self.leave(player_id);
            }
            GameStatus::Playing => {
                if self.game.players[seat].is_ai {
                    return;
                }
                self.connected.insert(player_id, false);
                info!("player {} disconnected from game {}", player_id, self.id);
                self.publish(SessionEvent::PlayerDisconnected { player_id });
                self.arm_grace_timer(player_id);
            }
            GameStatus::Finished => {
                self.connected.insert(player_id, false);
            }
        }
    }

    fn arm_grace_timer(&mut self, player_id: Uuid) {
        // Cancel-then-replace: at most one grace timer per player.
        if let Some(old) = self.grace_timers.remove(&player_id) {
            old.cancel();
        }
        self.timer_generation += 1;
        let generation = self.timer_generation;
        let tx = self.cmd_tx.clone();
        let handle = tokio::spawn(async move {
            sleep(DISCONNECT_GRACE).await;
            let _ = tx.send(Command::GraceExpired {
                player_id,
                generation,
            });
        });
        self.grace_timers.insert(player_id, Timer { generation, handle });
    }

    fn on_grace_expired(&mut self, player_id: Uuid, generation: u64) {
        // A canceled timer may still have fired before the abort landed.
        if self.grace_timers.get(&player_id).map(|t| t.generation) != Some(generation) {
            return;
        }
        self.grace_timers.remove(&player_id);

        if self.game.status != GameStatus::Playing {
            return;
        }
        if self.connected.get(&player_id) == Some(&true) {
            return;
        }
        if self.game.convert_to_ai(&player_id.to_string()) {
            info!(
                "player {} grace expired in game {}, seat handed to AI",
                player_id, self.id
            );
            self.publish_updated();
            self.schedule_ai_if_needed();
        }
    }

    // ==================== AI turns ====================

    /// Arm the deferred AI-turn timer if the current seat is AI-controlled.
    /// At most one AI timer is ever outstanding.
    fn schedule_ai_if_needed(&mut self) {
        if let Some(old) = self.ai_timer.take() {
            old.cancel();
        }
        if self.game.status != GameStatus::Playing {
            return;
        }
        let Some(current) = self.game.current_player() else {
            return;
        };
        if !current.is_ai {
            return;
        }

        self.timer_generation += 1;
        let generation = self.timer_generation;
        let tx = self.cmd_tx.clone();
        let handle = tokio::spawn(async move {
            sleep(AI_TURN_DELAY).await;
            let _ = tx.send(Command::AiTurn { generation });
        });
        self.ai_timer = Some(Timer { generation, handle });
    }

    fn on_ai_turn(&mut self, generation: u64) {
        if self.ai_timer.as_ref().map(|t| t.generation) != Some(generation) {
            return;
        }
        self.ai_timer = None;

        // Re-validate: the seat may have reconnected, changed, or the game
        // ended while the timer was in flight.
        if self.game.status != GameStatus::Playing {
            return;
        }
        let Some(current) = self.game.current_player() else {
            return;
        };
        if !current.is_ai {
            return;
        }
        let seat_id = current.id.clone();
        let Ok(player_id) = Uuid::parse_str(&seat_id) else {
            warn!("game {}: AI seat {} has a malformed id", self.id, seat_id);
            return;
        };

        let action = self.bot.decide(&self.game, &seat_id);
        let result = match action {
            BotAction::Play(indices) => self.apply_play(player_id, &indices),
            BotAction::Draw => self.apply_draw(player_id),
            BotAction::Nominate(suit) => self.apply_nominate(player_id, suit),
        };

        if let Err(err) = result {
            // A raced or stale decision is rejected like any other input;
            // fall back to drawing.
            warn!(
                "game {}: AI move for {} rejected ({}), drawing instead",
                self.id, seat_id, err
            );
            if let Err(err) = self.apply_draw(player_id) {
                warn!("game {}: AI fallback draw also rejected ({})", self.id, err);
            }
        }
    }

    // ==================== Plumbing ====================

    fn view(&self) -> GameView {
        GameView {
            game: self.game.clone(),
            connected: self
                .connected
                .iter()
                .map(|(id, c)| (id.to_string(), *c))
                .collect(),
            spectators: self
                .spectators
                .iter()
                .map(|(id, s)| SpectatorInfo {
                    id: *id,
                    name: s.name.clone(),
                    connected: s.connected,
                })
                .collect(),
            host_id: self.host_id,
        }
    }

    fn publish(&self, event: SessionEvent) {
        // No receivers is fine; delivery is at-most-once by design.
        let _ = self.events.send(event);
    }

    fn publish_updated(&self) {
        self.publish(SessionEvent::GameUpdated { state: self.view() });
    }

    fn publish_new_winners(&self, prior_count: usize) {
        for (position, winner) in self.game.winners.iter().enumerate().skip(prior_count) {
            if let Ok(player_id) = Uuid::parse_str(winner) {
                self.publish(SessionEvent::PlayerWon {
                    player_id,
                    position: position + 1,
                });
            }
        }
    }

    fn cancel_all_timers(&mut self) {
        if let Some(timer) = self.ai_timer.take() {
            timer.cancel();
        }
        for (_, timer) in self.grace_timers.drain() {
            timer.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rachel_core::Nomination;

    async fn two_player_session() -> (SessionHandle, Uuid, Uuid) {
        let (handle, _task) = spawn(Uuid::new_v4());
        let host = Uuid::new_v4();
        let other = Uuid::new_v4();
        handle.join(host, "Host".into()).await.unwrap();
        handle.join(other, "Other".into()).await.unwrap();
        (handle, host, other)
    }

    #[tokio::test]
    async fn test_join_and_host_assignment() {
        let (handle, host, _other) = two_player_session().await;
        let view = handle.get_state().await.unwrap();

        assert_eq!(view.game.player_count(), 2);
        assert_eq!(view.host_id, Some(host));
        assert_eq!(view.connected.len(), 2);
    }

    #[tokio::test]
    async fn test_double_join_rejected() {
        let (handle, host, _other) = two_player_session().await;
        let err = handle.join(host, "Host".into()).await.unwrap_err();
        assert!(matches!(err, SessionError::AlreadyJoined));
    }

    #[tokio::test]
    async fn test_game_full() {
        let (handle, _task) = spawn(Uuid::new_v4());
        let host = Uuid::new_v4();
        handle.join(host, "Player 0".into()).await.unwrap();
        for i in 1..MAX_PLAYERS {
            handle
                .join(Uuid::new_v4(), format!("Player {i}"))
                .await
                .unwrap();
        }
        let err = handle
            .join(Uuid::new_v4(), "Too many".into())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::GameFull));

        // A table at the seat cap still starts into a playable game.
        let view = handle.start(host).await.unwrap();
        assert_eq!(view.game.status, GameStatus::Playing);
        assert!(view.game.current_card.is_some());
    }

    #[tokio::test]
    async fn test_only_host_starts() {
        let (handle, host, other) = two_player_session().await;

        let err = handle.start(other).await.unwrap_err();
        assert!(matches!(err, SessionError::NotHost));

        let view = handle.start(host).await.unwrap();
        assert_eq!(view.game.status, GameStatus::Playing);

        let err = handle.start(host).await.unwrap_err();
        assert!(matches!(err, SessionError::Rules(GameError::AlreadyStarted)));
    }

    #[tokio::test]
    async fn test_join_after_start_rejected() {
        let (handle, host, _other) = two_player_session().await;
        handle.start(host).await.unwrap();

        let err = handle
            .join(Uuid::new_v4(), "Late".into())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Rules(GameError::GameStarted)));
    }

    #[tokio::test]
    async fn test_spectate_lifecycle() {
        let (handle, host, _other) = two_player_session().await;

        let spectator = Uuid::new_v4();
        let err = handle
            .spectate(spectator, "Watcher".into())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::GameNotStarted));

        handle.start(host).await.unwrap();
        handle.spectate(spectator, "Watcher".into()).await.unwrap();

        let err = handle
            .spectate(spectator, "Watcher".into())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::AlreadySpectating));

        let err = handle.spectate(host, "Host".into()).await.unwrap_err();
        assert!(matches!(err, SessionError::AlreadyPlaying));
    }

    #[tokio::test]
    async fn test_add_ai_only_while_waiting() {
        let (handle, host, _other) = two_player_session().await;
        handle.add_ai_player("Bot".into()).await.unwrap();

        let view = handle.get_state().await.unwrap();
        assert_eq!(view.game.player_count(), 3);
        assert!(view.game.players[2].is_ai);

        handle.start(host).await.unwrap();
        let err = handle.add_ai_player("Late bot".into()).await.unwrap_err();
        assert!(matches!(err, SessionError::Rules(GameError::GameStarted)));
    }

    #[tokio::test]
    async fn test_leave_while_waiting_reassigns_host() {
        let (handle, host, other) = two_player_session().await;
        handle.leave(host).await.unwrap();

        let view = handle.get_state().await.unwrap();
        assert_eq!(view.game.player_count(), 1);
        assert_eq!(view.host_id, Some(other));
    }

    #[tokio::test]
    async fn test_leave_mid_game_converts_to_ai() {
        let (handle, host, other) = two_player_session().await;
        handle.start(host).await.unwrap();
        handle.leave(other).await.unwrap();

        let view = handle.get_state().await.unwrap();
        assert_eq!(view.game.player_count(), 2);
        let seat = view
            .game
            .players
            .iter()
            .find(|p| p.id == other.to_string())
            .unwrap();
        assert!(seat.is_ai);
        assert_eq!(view.connected.get(&other.to_string()), Some(&false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_expiry_converts_seat() {
        let (handle, host, other) = two_player_session().await;
        handle.start(host).await.unwrap();
        handle.notify_disconnect(other);

        // Paused time: the grace timer fires as soon as the runtime idles.
        tokio::time::sleep(DISCONNECT_GRACE + Duration::from_secs(1)).await;

        let view = handle.get_state().await.unwrap();
        let seat = view
            .game
            .players
            .iter()
            .find(|p| p.id == other.to_string())
            .unwrap();
        assert!(seat.is_ai);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_cancels_grace() {
        let (handle, host, other) = two_player_session().await;
        handle.start(host).await.unwrap();
        handle.notify_disconnect(other);

        // Reconnect well inside the grace period.
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.join(other, "Other".into()).await.unwrap();

        tokio::time::sleep(DISCONNECT_GRACE * 2).await;
        let view = handle.get_state().await.unwrap();
        let seat = view
            .game
            .players
            .iter()
            .find(|p| p.id == other.to_string())
            .unwrap();
        assert!(!seat.is_ai);
        assert_eq!(view.connected.get(&other.to_string()), Some(&true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ai_seats_play_to_completion() {
        let (handle, host, other) = two_player_session().await;
        handle.start(host).await.unwrap();

        // Both humans walk away; their AI replacements finish the match.
        handle.leave(host).await.unwrap();
        handle.leave(other).await.unwrap();

        let mut finished = false;
        for _ in 0..5000 {
            tokio::time::sleep(AI_TURN_DELAY * 2).await;
            let view = handle.get_state().await.unwrap();
            assert_eq!(view.game.total_cards(), 52);
            if view.game.status == GameStatus::Finished {
                finished = true;
                break;
            }
        }
        assert!(finished, "AI-vs-AI game never finished");
    }

    #[tokio::test]
    async fn test_play_by_card_value() {
        let (handle, host, other) = two_player_session().await;
        let view = handle.start(host).await.unwrap();

        // Whoever is current plays their first valid card by value.
        let game = view.game;
        let current = game.current_player().unwrap();
        let current_id = Uuid::parse_str(&current.id).unwrap();
        assert!(current_id == host || current_id == other);

        match game.get_valid_plays(&current.id).first() {
            Some((card, _)) => {
                let after = handle.play_cards(current_id, vec![*card]).await.unwrap();
                assert_eq!(after.game.total_cards(), 52);
                if after.game.nominated_suit == Nomination::Pending {
                    handle
                        .nominate_suit(current_id, Suit::Hearts)
                        .await
                        .unwrap();
                }
            }
            None => {
                handle.draw_card(current_id).await.unwrap();
            }
        }

        // A card nobody holds is rejected without side effects.
        let view = handle.get_state().await.unwrap();
        let current = view.game.current_player().unwrap().clone();
        let missing = rachel_core::full_deck()
            .into_iter()
            .find(|c| !current.hand.contains(c))
            .unwrap();
        let current_id = Uuid::parse_str(&current.id).unwrap();
        let before = handle.get_state().await.unwrap();
        let err = handle
            .play_cards(current_id, vec![missing])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Rules(GameError::CardsNotInHand)
                | SessionError::Rules(GameError::FirstCardInvalid)
        ));
        let after = handle.get_state().await.unwrap();
        assert_eq!(
            before.game.players[0].hand.len(),
            after.game.players[0].hand.len()
        );
    }
}
