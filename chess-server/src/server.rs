//! 服务器主逻辑

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use protocol::{
    ClientMessage, Connection, ErrorCode, GameId, GameStatus, GameSummary, Listener, Move,
    ProtocolError, ServerMessage, TcpConnection, TcpListener, TeamColor, UserData,
    MAX_CONNECTIONS,
};
use tokio::sync::{mpsc, Mutex, RwLock, Semaphore};
use tracing::{debug, error, info, warn};

use crate::auth::UserStore;
use crate::error::ServiceResult;
use crate::service::GameService;
use crate::session::{ConnectionId, SessionHub};
use crate::storage::GameStore;

/// 每个连接的发送队列长度
const OUTBOUND_QUEUE: usize = 64;

/// 服务器状态
pub struct ServerState {
    pub users: Arc<RwLock<UserStore>>,
    pub games: GameService,
    pub sessions: Mutex<SessionHub>,
    next_conn_id: AtomicU64,
}

impl ServerState {
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        let users = Arc::new(RwLock::new(UserStore::new()));
        Self {
            games: GameService::new(users.clone(), store),
            users,
            sessions: Mutex::new(SessionHub::new()),
            next_conn_id: AtomicU64::new(1),
        }
    }

    /// 分配连接 ID
    pub fn next_connection_id(&self) -> ConnectionId {
        self.next_conn_id.fetch_add(1, Ordering::SeqCst)
    }

    /// 广播消息给对局内的连接
    pub async fn broadcast_to_game(
        &self,
        game_id: GameId,
        msg: ServerMessage,
        except: Option<ConnectionId>,
    ) {
        let recipients = self.sessions.lock().await.recipients(game_id, except);
        for tx in recipients {
            let _ = tx.send(msg.clone()).await;
        }
    }
}

/// 待发送的广播，处理完请求后统一发送
struct PendingMessages {
    broadcasts: Vec<(GameId, ServerMessage, Option<ConnectionId>)>,
}

impl PendingMessages {
    fn new() -> Self {
        Self {
            broadcasts: Vec::new(),
        }
    }

    /// 发给对局内所有连接
    fn broadcast(&mut self, game_id: GameId, msg: ServerMessage) {
        self.broadcasts.push((game_id, msg, None));
    }

    /// 发给对局内除 `except` 外的连接
    fn broadcast_except(&mut self, game_id: GameId, msg: ServerMessage, except: ConnectionId) {
        self.broadcasts.push((game_id, msg, Some(except)));
    }

    async fn flush(self, state: &ServerState) {
        for (game_id, msg, except) in self.broadcasts {
            state.broadcast_to_game(game_id, msg, except).await;
        }
    }
}

/// 走法的文字描述，如 "e2 to e4"
fn describe_move(mv: &Move) -> String {
    let mut text = format!("{} to {}", mv.start.square(), mv.end.square());
    if let Some(promotion) = mv.promotion {
        text.push_str(&format!(" promoting to {}", promotion));
    }
    text
}

/// 消息处理器
pub struct MessageHandler;

impl MessageHandler {
    /// 处理客户端消息，返回给发送方的直接回复
    pub async fn handle(
        state: &ServerState,
        conn_id: ConnectionId,
        msg: ClientMessage,
    ) -> Option<ServerMessage> {
        let mut pending = PendingMessages::new();

        let result = match msg {
            ClientMessage::Register { user } => Self::handle_register(state, user).await,
            ClientMessage::Login { username, password } => {
                Self::handle_login(state, &username, &password).await
            }
            ClientMessage::Logout { auth_token } => Self::handle_logout(state, &auth_token).await,
            ClientMessage::ListGames { auth_token } => {
                Self::handle_list_games(state, &auth_token).await
            }
            ClientMessage::CreateGame {
                auth_token,
                game_name,
            } => Self::handle_create_game(state, &auth_token, &game_name).await,
            ClientMessage::JoinGame {
                auth_token,
                game_id,
                color,
            } => Self::handle_join_game(state, &auth_token, game_id, color).await,
            ClientMessage::Connect {
                auth_token,
                game_id,
            } => Self::handle_connect(state, &mut pending, conn_id, &auth_token, game_id).await,
            ClientMessage::MakeMove {
                auth_token,
                game_id,
                mv,
            } => {
                Self::handle_make_move(state, &mut pending, conn_id, &auth_token, game_id, mv)
                    .await
            }
            ClientMessage::Leave {
                auth_token,
                game_id,
            } => Self::handle_leave(state, &mut pending, conn_id, &auth_token, game_id).await,
            ClientMessage::Resign {
                auth_token,
                game_id,
            } => Self::handle_resign(state, &mut pending, &auth_token, game_id).await,
            ClientMessage::Clear => Self::handle_clear(state).await,
            ClientMessage::Ping => Ok(Some(ServerMessage::Pong)),
        };

        let reply = match result {
            Ok(reply) => reply,
            Err(err) => {
                warn!(conn_id, code = %err.code, message = %err.message, "request rejected");
                Some(err.into_message())
            }
        };

        pending.flush(state).await;
        reply
    }

    async fn handle_register(state: &ServerState, user: UserData) -> ServiceResult<Option<ServerMessage>> {
        let auth = state.users.write().await.register(user)?;
        Ok(Some(ServerMessage::Registered { auth }))
    }

    async fn handle_login(
        state: &ServerState,
        username: &str,
        password: &str,
    ) -> ServiceResult<Option<ServerMessage>> {
        let auth = state.users.write().await.login(username, password)?;
        Ok(Some(ServerMessage::LoggedIn { auth }))
    }

    async fn handle_logout(state: &ServerState, auth_token: &str) -> ServiceResult<Option<ServerMessage>> {
        state.users.write().await.logout(auth_token)?;
        Ok(Some(ServerMessage::LoggedOut))
    }

    async fn handle_list_games(
        state: &ServerState,
        auth_token: &str,
    ) -> ServiceResult<Option<ServerMessage>> {
        let games = state.games.list_games(auth_token).await?;
        let games = games.iter().map(GameSummary::from).collect();
        Ok(Some(ServerMessage::GameList { games }))
    }

    async fn handle_create_game(
        state: &ServerState,
        auth_token: &str,
        game_name: &str,
    ) -> ServiceResult<Option<ServerMessage>> {
        let game = state.games.create_game(auth_token, game_name).await?;
        Ok(Some(ServerMessage::GameCreated {
            game_id: game.game_id,
        }))
    }

    async fn handle_join_game(
        state: &ServerState,
        auth_token: &str,
        game_id: GameId,
        color: TeamColor,
    ) -> ServiceResult<Option<ServerMessage>> {
        state.games.join_game(auth_token, color, game_id).await?;
        Ok(Some(ServerMessage::GameJoined { game_id, color }))
    }

    /// 进入对局：订阅推送，通知对局内其他人
    async fn handle_connect(
        state: &ServerState,
        pending: &mut PendingMessages,
        conn_id: ConnectionId,
        auth_token: &str,
        game_id: GameId,
    ) -> ServiceResult<Option<ServerMessage>> {
        let (auth, game) = state.games.connect(auth_token, game_id).await?;
        state.sessions.lock().await.attach(conn_id, game_id);

        let role = match game.player_color(&auth.username) {
            Some(color) => format!("as {}", color),
            None => "as an observer".to_string(),
        };
        pending.broadcast_except(
            game_id,
            ServerMessage::notification(format!("{} joined the game {}", auth.username, role)),
            conn_id,
        );
        debug!(conn_id, game_id, username = %auth.username, "connection attached");

        Ok(Some(ServerMessage::LoadGame { game }))
    }

    /// 走棋：新局面发给所有人，走法通知发给其他人，再附加将军/结束通知
    async fn handle_make_move(
        state: &ServerState,
        pending: &mut PendingMessages,
        conn_id: ConnectionId,
        auth_token: &str,
        game_id: GameId,
        mv: Move,
    ) -> ServiceResult<Option<ServerMessage>> {
        let result = state.games.make_move(auth_token, game_id, mv).await?;

        pending.broadcast(game_id, ServerMessage::LoadGame {
            game: result.game.clone(),
        });
        pending.broadcast_except(
            game_id,
            ServerMessage::notification(format!(
                "{} moved {}",
                result.auth.username,
                describe_move(&mv)
            )),
            conn_id,
        );

        let status_note = match result.status {
            GameStatus::Ongoing => None,
            GameStatus::Check(team) => Some(format!("{} is in check", team)),
            GameStatus::Checkmate(team) => Some(format!("{} is in checkmate", team)),
            GameStatus::Stalemate(team) => Some(format!("{} is in stalemate", team)),
        };
        if let Some(note) = status_note {
            pending.broadcast(game_id, ServerMessage::notification(note));
        }
        if let Some(outcome) = result.game.state.outcome() {
            info!(game_id, %outcome, "game concluded");
        }

        Ok(None)
    }

    async fn handle_leave(
        state: &ServerState,
        pending: &mut PendingMessages,
        conn_id: ConnectionId,
        auth_token: &str,
        game_id: GameId,
    ) -> ServiceResult<Option<ServerMessage>> {
        let result = state.games.leave(auth_token, game_id).await?;
        state.sessions.lock().await.detach(conn_id, game_id);

        pending.broadcast(
            game_id,
            ServerMessage::notification(format!("{} left the game", result.auth.username)),
        );
        if result.vacated.is_some() {
            pending.broadcast(game_id, ServerMessage::LoadGame { game: result.game });
        }

        Ok(Some(ServerMessage::notification(format!(
            "You left game {}",
            game_id
        ))))
    }

    async fn handle_resign(
        state: &ServerState,
        pending: &mut PendingMessages,
        auth_token: &str,
        game_id: GameId,
    ) -> ServiceResult<Option<ServerMessage>> {
        let (auth, game) = state.games.resign(auth_token, game_id).await?;
        let note = match game.state.outcome().and_then(|outcome| outcome.winner()) {
            Some(winner) => format!("{} resigned, {} wins", auth.username, winner),
            None => format!("{} resigned", auth.username),
        };

        pending.broadcast(game_id, ServerMessage::LoadGame { game });
        pending.broadcast(game_id, ServerMessage::notification(note));
        Ok(None)
    }

    async fn handle_clear(state: &ServerState) -> ServiceResult<Option<ServerMessage>> {
        state.games.clear().await?;
        state.users.write().await.clear();
        state.sessions.lock().await.detach_all();
        info!("all users and games cleared");
        Ok(Some(ServerMessage::Cleared))
    }
}

/// 处理单个连接：读循环处理请求，写任务负责发送
pub async fn handle_connection(state: Arc<ServerState>, conn: TcpConnection) {
    let conn_id = state.next_connection_id();
    let peer = conn.peer_addr().unwrap_or_else(|| "unknown".to_string());
    info!(conn_id, %peer, "client connected");

    let (mut reader, mut writer) = conn.split();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(OUTBOUND_QUEUE);
    state.sessions.lock().await.register(conn_id, tx.clone());

    let writer_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let result = match writer.write_frame(&msg).await {
                // 编码失败时尚未写出任何字节，连接仍然可用
                Err(ProtocolError::FrameTooLarge { size, max }) => {
                    warn!(conn_id, size, max, "reply too large, sending error instead");
                    let reply = ServerMessage::error(
                        ErrorCode::InternalError,
                        format!("Error: reply too large ({} bytes, max {})", size, max),
                    );
                    writer.write_frame(&reply).await
                }
                other => other,
            };
            if let Err(e) = result {
                warn!(conn_id, error = %e, "failed to send message");
                break;
            }
        }
    });

    loop {
        match reader.read_frame::<ClientMessage>().await {
            Ok(msg) => {
                if let Some(reply) = MessageHandler::handle(&state, conn_id, msg).await {
                    if tx.send(reply).await.is_err() {
                        break;
                    }
                }
            }
            Err(ProtocolError::ConnectionClosed) => break,
            Err(e) => {
                warn!(conn_id, error = %e, "dropping connection");
                break;
            }
        }
    }

    let games = state.sessions.lock().await.unregister(conn_id);
    drop(tx);
    let _ = writer_task.await;
    info!(conn_id, ?games, "client disconnected");
}

/// 接受连接，每个连接一个任务；超过连接上限时直接断开
pub async fn serve(mut listener: TcpListener, state: Arc<ServerState>) -> anyhow::Result<()> {
    let limit = Arc::new(Semaphore::new(MAX_CONNECTIONS));
    if let Some(addr) = listener.local_addr() {
        info!(%addr, "server listening");
    }

    loop {
        let conn = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!(error = %e, "failed to accept connection");
                continue;
            }
        };

        let Ok(permit) = limit.clone().try_acquire_owned() else {
            warn!(peer = ?conn.peer_addr(), "connection limit reached");
            continue;
        };

        let state = state.clone();
        tokio::spawn(async move {
            handle_connection(state, conn).await;
            drop(permit);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryGameStore;
    use protocol::{Connector, ErrorCode, Position, TcpConnector};

    fn pos(row: u8, column: u8) -> Position {
        Position::new(row, column).unwrap()
    }

    fn new_state() -> ServerState {
        ServerState::new(Arc::new(MemoryGameStore::new()))
    }

    async fn connect_client(state: &ServerState) -> (ConnectionId, mpsc::Receiver<ServerMessage>) {
        let conn_id = state.next_connection_id();
        let (tx, rx) = mpsc::channel(32);
        state.sessions.lock().await.register(conn_id, tx);
        (conn_id, rx)
    }

    async fn register(state: &ServerState, conn_id: ConnectionId, name: &str) -> String {
        let msg = ClientMessage::Register {
            user: UserData::new(name, "pw", format!("{}@example.com", name)),
        };
        match MessageHandler::handle(state, conn_id, msg).await {
            Some(ServerMessage::Registered { auth }) => auth.auth_token,
            other => panic!("register failed: {:?}", other),
        }
    }

    fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            messages.push(msg);
        }
        messages
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let state = new_state();
        let (conn, _rx) = connect_client(&state).await;
        register(&state, conn, "alice").await;

        let reply = MessageHandler::handle(
            &state,
            conn,
            ClientMessage::Login {
                username: "alice".to_string(),
                password: "nope".to_string(),
            },
        )
        .await;
        assert!(matches!(
            reply,
            Some(ServerMessage::Error {
                code: ErrorCode::Unauthorized,
                ..
            })
        ));

        let reply = MessageHandler::handle(
            &state,
            conn,
            ClientMessage::Login {
                username: "alice".to_string(),
                password: "pw".to_string(),
            },
        )
        .await;
        assert!(matches!(reply, Some(ServerMessage::LoggedIn { .. })));
    }

    #[tokio::test]
    async fn test_match_flow_broadcasts() {
        let state = new_state();
        let (white_conn, mut white_rx) = connect_client(&state).await;
        let (black_conn, mut black_rx) = connect_client(&state).await;
        let (watch_conn, mut watch_rx) = connect_client(&state).await;
        let alice = register(&state, white_conn, "alice").await;
        let bob = register(&state, black_conn, "bob").await;
        let carol = register(&state, watch_conn, "carol").await;

        let game_id = match MessageHandler::handle(
            &state,
            white_conn,
            ClientMessage::CreateGame {
                auth_token: alice.clone(),
                game_name: "club".to_string(),
            },
        )
        .await
        {
            Some(ServerMessage::GameCreated { game_id }) => game_id,
            other => panic!("create failed: {:?}", other),
        };

        for (conn, token, color) in [
            (white_conn, &alice, TeamColor::White),
            (black_conn, &bob, TeamColor::Black),
        ] {
            let reply = MessageHandler::handle(
                &state,
                conn,
                ClientMessage::JoinGame {
                    auth_token: token.clone(),
                    game_id,
                    color,
                },
            )
            .await;
            assert_eq!(reply, Some(ServerMessage::GameJoined { game_id, color }));
        }

        for (conn, token) in [(white_conn, &alice), (black_conn, &bob), (watch_conn, &carol)] {
            let reply = MessageHandler::handle(
                &state,
                conn,
                ClientMessage::Connect {
                    auth_token: token.clone(),
                    game_id,
                },
            )
            .await;
            assert!(matches!(reply, Some(ServerMessage::LoadGame { .. })));
        }

        // alice 收到 bob 和 carol 进入的通知
        let notes = drain(&mut white_rx);
        assert_eq!(
            notes,
            vec![
                ServerMessage::notification("bob joined the game as BLACK"),
                ServerMessage::notification("carol joined the game as an observer"),
            ]
        );
        drain(&mut black_rx);

        let reply = MessageHandler::handle(
            &state,
            white_conn,
            ClientMessage::MakeMove {
                auth_token: alice.clone(),
                game_id,
                mv: Move::new(pos(2, 5), pos(4, 5)),
            },
        )
        .await;
        assert_eq!(reply, None);

        let to_white = drain(&mut white_rx);
        assert_eq!(to_white.len(), 1);
        assert!(matches!(&to_white[0], ServerMessage::LoadGame { game } if game.state.game().team_turn() == TeamColor::Black));

        let to_watcher = drain(&mut watch_rx);
        assert_eq!(to_watcher.len(), 2);
        assert_eq!(
            to_watcher[1],
            ServerMessage::notification("alice moved e2 to e4")
        );

        // 观战者不能走棋
        let reply = MessageHandler::handle(
            &state,
            watch_conn,
            ClientMessage::MakeMove {
                auth_token: carol.clone(),
                game_id,
                mv: Move::new(pos(7, 5), pos(5, 5)),
            },
        )
        .await;
        assert!(matches!(
            reply,
            Some(ServerMessage::Error {
                code: ErrorCode::Unauthorized,
                ..
            })
        ));

        let reply = MessageHandler::handle(
            &state,
            black_conn,
            ClientMessage::Resign {
                auth_token: bob.clone(),
                game_id,
            },
        )
        .await;
        assert_eq!(reply, None);
        let to_watcher = drain(&mut watch_rx);
        assert!(matches!(&to_watcher[0], ServerMessage::LoadGame { game } if !game.is_active()));
        assert_eq!(
            to_watcher[1],
            ServerMessage::notification("bob resigned, WHITE wins")
        );
    }

    #[tokio::test]
    async fn test_leave_stops_broadcasts() {
        let state = new_state();
        let (conn_a, _rx_a) = connect_client(&state).await;
        let (conn_b, mut rx_b) = connect_client(&state).await;
        let alice = register(&state, conn_a, "alice").await;
        let bob = register(&state, conn_b, "bob").await;

        let game = state.games.create_game(&alice, "casual").await.unwrap();
        state
            .games
            .join_game(&alice, TeamColor::White, game.game_id)
            .await
            .unwrap();
        for (conn, token) in [(conn_a, &alice), (conn_b, &bob)] {
            MessageHandler::handle(
                &state,
                conn,
                ClientMessage::Connect {
                    auth_token: token.clone(),
                    game_id: game.game_id,
                },
            )
            .await;
        }
        drain(&mut rx_b);

        let reply = MessageHandler::handle(
            &state,
            conn_b,
            ClientMessage::Leave {
                auth_token: bob.clone(),
                game_id: game.game_id,
            },
        )
        .await;
        assert!(matches!(reply, Some(ServerMessage::Notification { .. })));
        assert_eq!(state.sessions.lock().await.member_count(game.game_id), 1);

        MessageHandler::handle(
            &state,
            conn_a,
            ClientMessage::MakeMove {
                auth_token: alice.clone(),
                game_id: game.game_id,
                mv: Move::new(pos(2, 4), pos(4, 4)),
            },
        )
        .await;
        assert!(drain(&mut rx_b).is_empty());
    }

    #[tokio::test]
    async fn test_clear() {
        let state = new_state();
        let (conn, _rx) = connect_client(&state).await;
        let token = register(&state, conn, "alice").await;
        state.games.create_game(&token, "old").await.unwrap();

        let reply = MessageHandler::handle(&state, conn, ClientMessage::Clear).await;
        assert_eq!(reply, Some(ServerMessage::Cleared));

        let reply = MessageHandler::handle(
            &state,
            conn,
            ClientMessage::ListGames { auth_token: token },
        )
        .await;
        assert!(matches!(
            reply,
            Some(ServerMessage::Error {
                code: ErrorCode::Unauthorized,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_serve_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(new_state());
        tokio::spawn(serve(listener, state));

        let mut conn = TcpConnector.connect(&addr).await.unwrap();
        conn.send(&ClientMessage::Ping).await.unwrap();
        assert_eq!(conn.recv::<ServerMessage>().await.unwrap(), ServerMessage::Pong);

        conn.send(&ClientMessage::Register {
            user: UserData::new("dave", "pw", "dave@example.com"),
        })
        .await
        .unwrap();
        let auth = match conn.recv::<ServerMessage>().await.unwrap() {
            ServerMessage::Registered { auth } => auth,
            other => panic!("unexpected reply: {:?}", other),
        };

        conn.send(&ClientMessage::ListGames {
            auth_token: auth.auth_token,
        })
        .await
        .unwrap();
        assert_eq!(
            conn.recv::<ServerMessage>().await.unwrap(),
            ServerMessage::GameList { games: Vec::new() }
        );
    }

    #[tokio::test]
    async fn test_oversized_reply_keeps_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(new_state());
        let auth = state
            .users
            .write()
            .await
            .register(UserData::new("erin", "pw", "erin@example.com"))
            .unwrap();
        // 对局列表超过单帧上限
        let name = "x".repeat(2000);
        for _ in 0..40 {
            state.games.create_game(&auth.auth_token, &name).await.unwrap();
        }
        tokio::spawn(serve(listener, state));

        let mut conn = TcpConnector.connect(&addr).await.unwrap();
        conn.send(&ClientMessage::ListGames {
            auth_token: auth.auth_token.clone(),
        })
        .await
        .unwrap();
        assert!(matches!(
            conn.recv::<ServerMessage>().await.unwrap(),
            ServerMessage::Error {
                code: ErrorCode::InternalError,
                ..
            }
        ));

        conn.send(&ClientMessage::Ping).await.unwrap();
        assert_eq!(conn.recv::<ServerMessage>().await.unwrap(), ServerMessage::Pong);
    }

    #[test]
    fn test_describe_move() {
        let mv = Move::with_promotion(pos(7, 1), pos(8, 1), protocol::PieceType::Queen);
        assert_eq!(describe_move(&mv), "a7 to a8 promoting to QUEEN");
    }
}
