//! WebSocket server and connection handling.
//!
//! Connections never touch game state directly: every command is forwarded
//! to the owning session task, and every session event reaches the client
//! through a per-connection subscription on the session's broadcast topic.

use crate::protocol::{ClientMessage, GameSummary, ServerMessage};
use crate::session::{self, SessionError, SessionHandle, MAX_PLAYERS};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};
use uuid::Uuid;

/// How long ListGames waits on any one session before skipping it.
const LIST_TIMEOUT: Duration = Duration::from_millis(500);

/// Server state shared across all connections.
pub struct ServerState {
    /// All live sessions
    pub sessions: DashMap<Uuid, SessionHandle>,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    fn get_session(&self, game_id: Uuid) -> Option<SessionHandle> {
        self.sessions.get(&game_id).map(|h| h.clone())
    }

    /// Spawn a fresh session and keep the registry consistent with its
    /// lifetime: when the task exits the entry is reaped.
    fn create_session(self: &Arc<Self>) -> SessionHandle {
        let game_id = Uuid::new_v4();
        let (handle, task) = session::spawn(game_id);
        self.sessions.insert(game_id, handle.clone());

        let state = Arc::clone(self);
        tokio::spawn(async move {
            let _ = task.await;
            state.sessions.remove(&game_id);
            info!("session {} removed from registry", game_id);
        });

        handle
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the WebSocket server.
pub async fn run_server(addr: SocketAddr, state: Arc<ServerState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Rachel server listening on {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

/// Per-connection state: identity, current session, event forwarding.
struct Connection {
    player_id: Uuid,
    state: Arc<ServerState>,
    outbox: mpsc::UnboundedSender<ServerMessage>,
    session: Option<SessionHandle>,
    forward_task: Option<JoinHandle<()>>,
}

impl Connection {
    fn send(&self, msg: ServerMessage) {
        let _ = self.outbox.send(msg);
    }

    fn reject(&self, err: SessionError) {
        self.send(ServerMessage::Error {
            kind: err.kind().to_string(),
            message: err.to_string(),
        });
    }

    fn reject_with(&self, kind: &str, message: &str) {
        self.send(ServerMessage::Error {
            kind: kind.to_string(),
            message: message.to_string(),
        });
    }

    /// Bind this connection to a session and start forwarding its events.
    fn attach(&mut self, handle: SessionHandle) {
        self.detach();

        let mut events = handle.subscribe();
        let outbox = self.outbox.clone();
        self.forward_task = Some(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if outbox.send(ServerMessage::Event { event }).is_err() {
                            break;
                        }
                    }
                    // Fell behind; the client recovers via GetState.
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("event subscriber lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));
        self.session = Some(handle);
    }

    fn detach(&mut self) {
        if let Some(task) = self.forward_task.take() {
            task.abort();
        }
        self.session = None;
    }

    fn current_session(&self) -> Option<SessionHandle> {
        self.session.clone()
    }
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New WebSocket connection from {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Assign a player ID
    let player_id = Uuid::new_v4();

    // Channel for outgoing messages
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let welcome = ServerMessage::Welcome { player_id };
    let msg_text = serde_json::to_string(&welcome)?;
    ws_sender.send(Message::Text(msg_text.into())).await?;

    // Forward outbox messages to the WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(text) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    let mut conn = Connection {
        player_id,
        state,
        outbox: tx,
        session: None,
        forward_task: None,
    };

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Ok(client_msg) = serde_json::from_str::<ClientMessage>(&text) {
                    handle_message(&mut conn, client_msg).await;
                } else {
                    warn!("Invalid message from {}: {}", conn.player_id, text);
                    conn.reject_with("malformed_message", "Could not parse message");
                }
            }
            Ok(Message::Close(_)) => {
                info!("Client {} closing connection", conn.player_id);
                break;
            }
            Ok(Message::Ping(data)) => {
                conn.send(ServerMessage::Pong);
                let _ = data;
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", conn.player_id, e);
                break;
            }
            _ => {}
        }
    }

    // The seat survives the connection: the session applies its own grace
    // period before handing it to AI.
    if let Some(handle) = conn.current_session() {
        handle.notify_disconnect(conn.player_id);
    }
    conn.detach();
    send_task.abort();

    info!("Connection closed for {}", conn.player_id);
    Ok(())
}

/// Handle a client message.
async fn handle_message(conn: &mut Connection, msg: ClientMessage) {
    match msg {
        ClientMessage::CreateGame { player_name } => {
            if conn.session.is_some() {
                conn.reject_with("already_in_game", "Leave your current game first");
                return;
            }

            let handle = conn.state.create_session();
            let game_id = handle.id;
            match handle.join(conn.player_id, player_name).await {
                Ok(state) => {
                    conn.attach(handle);
                    conn.send(ServerMessage::GameCreated { game_id });
                    conn.send(ServerMessage::Joined { game_id, state });
                }
                Err(e) => {
                    handle.stop();
                    conn.reject(e);
                }
            }
        }

        ClientMessage::JoinGame {
            game_id,
            player_name,
            player_id,
        } => {
            if conn.session.is_some() {
                conn.reject_with("already_in_game", "Leave your current game first");
                return;
            }
            let Some(handle) = conn.state.get_session(game_id) else {
                conn.reject(SessionError::GameNotFound);
                return;
            };

            // A returning client reclaims its old seat by presenting the
            // identity it was welcomed with before the drop.
            if let Some(reclaimed) = player_id {
                conn.player_id = reclaimed;
            }

            match handle.join(conn.player_id, player_name).await {
                Ok(state) => {
                    conn.attach(handle);
                    conn.send(ServerMessage::Joined { game_id, state });
                }
                Err(e) => conn.reject(e),
            }
        }

        ClientMessage::SpectateGame { game_id, name } => {
            if conn.session.is_some() {
                conn.reject_with("already_in_game", "Leave your current game first");
                return;
            }
            let Some(handle) = conn.state.get_session(game_id) else {
                conn.reject(SessionError::GameNotFound);
                return;
            };

            match handle.spectate(conn.player_id, name).await {
                Ok(state) => {
                    conn.attach(handle);
                    conn.send(ServerMessage::Spectating { game_id, state });
                }
                Err(e) => conn.reject(e),
            }
        }

        ClientMessage::LeaveGame => {
            let Some(handle) = conn.current_session() else {
                conn.reject(SessionError::GameNotFound);
                return;
            };
            if let Err(e) = handle.leave(conn.player_id).await {
                conn.reject(e);
                return;
            }
            conn.detach();
            conn.send(ServerMessage::Left);
        }

        ClientMessage::StartGame => {
            respond_with_state(conn, |handle, pid| async move { handle.start(pid).await }).await;
        }

        ClientMessage::PlayCards { cards } => {
            respond_with_state(conn, move |handle, pid| async move {
                handle.play_cards(pid, cards).await
            })
            .await;
        }

        ClientMessage::DrawCard => {
            respond_with_state(conn, |handle, pid| async move { handle.draw_card(pid).await })
                .await;
        }

        ClientMessage::NominateSuit { suit } => {
            respond_with_state(conn, move |handle, pid| async move {
                handle.nominate_suit(pid, suit).await
            })
            .await;
        }

        ClientMessage::AddAiPlayer { name } => {
            respond_with_state(conn, move |handle, _pid| async move {
                handle.add_ai_player(name).await
            })
            .await;
        }

        ClientMessage::GetState => {
            respond_with_state(conn, |handle, _pid| async move { handle.get_state().await })
                .await;
        }

        ClientMessage::ListGames => {
            let games = list_games(&conn.state).await;
            conn.send(ServerMessage::GameList { games });
        }

        ClientMessage::Ping => {
            conn.send(ServerMessage::Pong);
        }
    }
}

/// Run a session command that answers with a state snapshot.
async fn respond_with_state<F, Fut>(conn: &Connection, f: F)
where
    F: FnOnce(SessionHandle, Uuid) -> Fut,
    Fut: std::future::Future<Output = Result<crate::protocol::GameView, SessionError>>,
{
    let Some(handle) = conn.current_session() else {
        conn.reject(SessionError::GameNotFound);
        return;
    };
    match f(handle, conn.player_id).await {
        Ok(state) => conn.send(ServerMessage::State { state }),
        Err(e) => conn.reject(e),
    }
}

/// Best-effort snapshot of all live sessions. A session that does not
/// answer within the timeout is skipped rather than stalling the list.
async fn list_games(state: &Arc<ServerState>) -> Vec<GameSummary> {
    let handles: Vec<SessionHandle> = state.sessions.iter().map(|e| e.value().clone()).collect();

    let mut games = Vec::with_capacity(handles.len());
    for handle in handles {
        match timeout(LIST_TIMEOUT, handle.get_state()).await {
            Ok(Ok(view)) => games.push(GameSummary {
                id: handle.id,
                status: view.game.status,
                players: view.game.player_count(),
                max_players: MAX_PLAYERS,
            }),
            Ok(Err(_)) | Err(_) => {}
        }
    }
    games
}
