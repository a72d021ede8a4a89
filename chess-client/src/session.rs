//! 客户端会话状态
//!
//! 把命令转换为请求，把服务端消息转换为屏幕输出。

use std::collections::HashSet;

use protocol::{
    render_board, AuthData, ClientMessage, GameData, GameId, GameSummary, Position,
    ServerMessage, TeamColor, UserData,
};

use crate::command::{Command, HELP};

/// 处理命令的结果
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// 发送请求
    Send(ClientMessage),
    /// 直接输出
    Print(String),
    /// 退出
    Quit,
}

/// 处理服务端消息的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reaction {
    /// 输出内容
    pub output: Option<String>,
    /// 需要紧接着发送的请求
    pub follow_up: Option<ClientMessage>,
}

impl Reaction {
    fn print(text: impl Into<String>) -> Self {
        Self {
            output: Some(text.into()),
            follow_up: None,
        }
    }
}

/// 当前所在对局
#[derive(Debug, Clone)]
struct CurrentGame {
    game_id: GameId,
    /// 执子方，观战者为 None（按白方视角显示）
    color: Option<TeamColor>,
    last_state: Option<GameData>,
}

impl CurrentGame {
    fn perspective(&self) -> TeamColor {
        self.color.unwrap_or(TeamColor::White)
    }
}

/// 客户端会话
#[derive(Debug, Default)]
pub struct ClientSession {
    auth: Option<AuthData>,
    current: Option<CurrentGame>,
    /// 已发送 Connect、尚未收到局面的对局
    pending: Option<CurrentGame>,
}

impl ClientSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已登录的用户名
    pub fn username(&self) -> Option<&str> {
        self.auth.as_ref().map(|auth| auth.username.as_str())
    }

    /// 当前对局 ID
    pub fn game_id(&self) -> Option<GameId> {
        self.current.as_ref().map(|current| current.game_id)
    }

    /// 提示符
    pub fn prompt(&self) -> String {
        match (self.username(), &self.current) {
            (None, _) => "[LOGGED_OUT] >>> ".to_string(),
            (Some(name), None) => format!("[{}] >>> ", name),
            (Some(name), Some(current)) => format!("[{} @ game {}] >>> ", name, current.game_id),
        }
    }

    fn token(&self) -> Result<String, String> {
        self.auth
            .as_ref()
            .map(|auth| auth.auth_token.clone())
            .ok_or_else(|| "You must log in first.".to_string())
    }

    fn in_game(&self) -> Result<&CurrentGame, String> {
        self.current
            .as_ref()
            .ok_or_else(|| "You are not in a game.".to_string())
    }

    /// 处理用户命令
    pub fn request(&mut self, command: Command) -> Result<Action, String> {
        let action = match command {
            Command::Help => Action::Print(HELP.to_string()),
            Command::Quit => Action::Quit,
            Command::Register {
                username,
                password,
                email,
            } => Action::Send(ClientMessage::Register {
                user: UserData::new(username, password, email),
            }),
            Command::Login { username, password } => {
                Action::Send(ClientMessage::Login { username, password })
            }
            Command::Logout => Action::Send(ClientMessage::Logout {
                auth_token: self.token()?,
            }),
            Command::Create { name } => Action::Send(ClientMessage::CreateGame {
                auth_token: self.token()?,
                game_name: name,
            }),
            Command::List => Action::Send(ClientMessage::ListGames {
                auth_token: self.token()?,
            }),
            Command::Join { game_id, color } => Action::Send(ClientMessage::JoinGame {
                auth_token: self.token()?,
                game_id,
                color,
            }),
            Command::Observe { game_id } => {
                let auth_token = self.token()?;
                self.pending = Some(CurrentGame {
                    game_id,
                    color: None,
                    last_state: None,
                });
                Action::Send(ClientMessage::Connect {
                    auth_token,
                    game_id,
                })
            }
            Command::Redraw => {
                let current = self.in_game()?;
                match &current.last_state {
                    Some(state) => Action::Print(render_board(
                        state.state.game().board(),
                        current.perspective(),
                        &HashSet::new(),
                    )),
                    None => Action::Print("No game state available yet.".to_string()),
                }
            }
            Command::Leave => {
                let auth_token = self.token()?;
                let game_id = self.in_game()?.game_id;
                self.current = None;
                Action::Send(ClientMessage::Leave {
                    auth_token,
                    game_id,
                })
            }
            Command::Move(mv) => {
                let auth_token = self.token()?;
                let game_id = self.in_game()?.game_id;
                Action::Send(ClientMessage::MakeMove {
                    auth_token,
                    game_id,
                    mv,
                })
            }
            Command::Resign => {
                let auth_token = self.token()?;
                let game_id = self.in_game()?.game_id;
                Action::Send(ClientMessage::Resign {
                    auth_token,
                    game_id,
                })
            }
            Command::Legal(square) => Action::Print(self.legal_moves(square)?),
        };
        Ok(action)
    }

    /// 在本地计算并高亮 `square` 处棋子的合法走法
    fn legal_moves(&self, square: Position) -> Result<String, String> {
        let current = self.in_game()?;
        let state = current
            .last_state
            .as_ref()
            .ok_or_else(|| "No game state available yet.".to_string())?;
        let game = state.state.game();

        let moves = game
            .valid_moves(square)
            .ok_or_else(|| format!("No piece at {}.", square.square()))?;
        let mut highlights: HashSet<Position> = moves.iter().map(|mv| mv.end).collect();
        highlights.insert(square);

        Ok(render_board(game.board(), current.perspective(), &highlights))
    }

    /// 处理服务端消息
    pub fn on_message(&mut self, msg: ServerMessage) -> Reaction {
        match msg {
            ServerMessage::Registered { auth } | ServerMessage::LoggedIn { auth } => {
                let text = format!("Logged in as {}.", auth.username);
                self.auth = Some(auth);
                Reaction::print(text)
            }
            ServerMessage::LoggedOut => {
                self.auth = None;
                self.current = None;
                self.pending = None;
                Reaction::print("Logged out.")
            }
            ServerMessage::GameList { games } => Reaction::print(format_game_list(&games)),
            ServerMessage::GameCreated { game_id } => {
                Reaction::print(format!("Created game {}.", game_id))
            }
            ServerMessage::GameJoined { game_id, color } => {
                self.pending = Some(CurrentGame {
                    game_id,
                    color: Some(color),
                    last_state: None,
                });
                Reaction {
                    output: Some(format!("Joined game {} as {}.", game_id, color)),
                    follow_up: self.auth.as_ref().map(|auth| ClientMessage::Connect {
                        auth_token: auth.auth_token.clone(),
                        game_id,
                    }),
                }
            }
            ServerMessage::Cleared => Reaction::print("Server data cleared."),
            ServerMessage::LoadGame { game } => self.on_load_game(game),
            ServerMessage::Notification { message } => {
                Reaction::print(format!("Notification: {}", message))
            }
            ServerMessage::Pong => Reaction::default(),
            ServerMessage::Error { code, message } => {
                // 进入对局失败时不切换当前对局
                self.pending = None;
                Reaction::print(format!("{} [{}]", message, code))
            }
        }
    }

    fn on_load_game(&mut self, game: GameData) -> Reaction {
        if self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.game_id == game.game_id)
        {
            self.current = self.pending.take();
        }

        let Some(current) = self
            .current
            .as_mut()
            .filter(|current| current.game_id == game.game_id)
        else {
            return Reaction::default();
        };

        let mut text = render_board(
            game.state.game().board(),
            current.perspective(),
            &HashSet::new(),
        );
        match game.state.outcome() {
            Some(outcome) => text.push_str(&format!("Game over: {}\n", outcome)),
            None => text.push_str(&format!("{} to move\n", game.state.game().team_turn())),
        }
        current.last_state = Some(game);
        Reaction::print(text)
    }
}

/// 对局列表文本
pub fn format_game_list(games: &[GameSummary]) -> String {
    if games.is_empty() {
        return "No games yet.".to_string();
    }

    games
        .iter()
        .map(|game| {
            format!(
                "{}. {} - white: {}, black: {}{}",
                game.game_id,
                game.game_name,
                game.white_username.as_deref().unwrap_or("<open>"),
                game.black_username.as_deref().unwrap_or("<open>"),
                if game.active { "" } else { " (finished)" },
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
