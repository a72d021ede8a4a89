//! 对局记录
//!
//! `MatchState` 显式区分进行中与已结束的对局，结束后保留最终局面，
//! `GameData` 是服务端持久化与客户端展示共用的完整记录。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ChessError;
use crate::game::Game;
use crate::piece::TeamColor;

/// 对局 ID
pub type GameId = u32;

/// 对局结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// 一方认输
    Resigned { winner: TeamColor },
    /// 将死
    Checkmate { winner: TeamColor },
    /// 逼和
    Stalemate,
}

impl Outcome {
    /// 胜方，和棋返回 None
    pub fn winner(&self) -> Option<TeamColor> {
        match self {
            Outcome::Resigned { winner } | Outcome::Checkmate { winner } => Some(*winner),
            Outcome::Stalemate => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Resigned { winner } => {
                write!(f, "{} resigned, {} wins", winner.opponent(), winner)
            }
            Outcome::Checkmate { winner } => {
                write!(f, "{} is checkmated, {} wins", winner.opponent(), winner)
            }
            Outcome::Stalemate => f.write_str("stalemate, the game is drawn"),
        }
    }
}

/// 对局状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchState {
    /// 进行中
    Active(Game),
    /// 已结束，保留最终局面
    Concluded { outcome: Outcome, game: Game },
}

impl MatchState {
    /// 当前（或最终）局面
    pub fn game(&self) -> &Game {
        match self {
            MatchState::Active(game) => game,
            MatchState::Concluded { game, .. } => game,
        }
    }

    /// 是否进行中
    pub fn is_active(&self) -> bool {
        matches!(self, MatchState::Active(_))
    }

    /// 对局结果，进行中返回 None
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            MatchState::Active(_) => None,
            MatchState::Concluded { outcome, .. } => Some(*outcome),
        }
    }

    /// 进行中对局的可变引用，已结束时返回 `GameOver`
    pub fn active_mut(&mut self) -> Result<&mut Game, ChessError> {
        match self {
            MatchState::Active(game) => Ok(game),
            MatchState::Concluded { .. } => Err(ChessError::GameOver),
        }
    }

    /// 结束对局；已结束的对局返回 `GameOver`，结果不变
    pub fn conclude(&mut self, outcome: Outcome) -> Result<(), ChessError> {
        match self {
            MatchState::Active(game) => {
                let game = std::mem::take(game);
                *self = MatchState::Concluded { outcome, game };
                Ok(())
            }
            MatchState::Concluded { .. } => Err(ChessError::GameOver),
        }
    }
}

impl Default for MatchState {
    fn default() -> Self {
        MatchState::Active(Game::new())
    }
}

/// 完整的对局记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameData {
    pub game_id: GameId,
    /// 白方用户名，空位为 None
    pub white_username: Option<String>,
    /// 黑方用户名，空位为 None
    pub black_username: Option<String>,
    pub game_name: String,
    pub state: MatchState,
    pub created_at: DateTime<Utc>,
}

impl GameData {
    /// 创建新对局记录（标准开局，双方座位为空）
    pub fn new(game_id: GameId, game_name: impl Into<String>) -> Self {
        Self {
            game_id,
            white_username: None,
            black_username: None,
            game_name: game_name.into(),
            state: MatchState::default(),
            created_at: Utc::now(),
        }
    }

    /// 指定阵营座位上的用户名
    pub fn seat(&self, color: TeamColor) -> Option<&str> {
        match color {
            TeamColor::White => self.white_username.as_deref(),
            TeamColor::Black => self.black_username.as_deref(),
        }
    }

    /// 座位的可变引用
    pub fn seat_mut(&mut self, color: TeamColor) -> &mut Option<String> {
        match color {
            TeamColor::White => &mut self.white_username,
            TeamColor::Black => &mut self.black_username,
        }
    }

    /// 用户执哪一方；观战者返回 None
    ///
    /// 同一用户占据两个座位时优先返回当前走子方，自己和自己下棋才能进行。
    pub fn player_color(&self, username: &str) -> Option<TeamColor> {
        let turn = self.state.game().team_turn();
        [turn, turn.opponent()]
            .into_iter()
            .find(|&color| self.seat(color) == Some(username))
    }

    /// 是否进行中
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// 转换为 JSON 字符串
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// 从 JSON 字符串解析
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// 用户信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    pub username: String,
    pub password: String,
    pub email: String,
}

impl UserData {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            email: email.into(),
        }
    }
}

/// 登录凭证
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthData {
    pub username: String,
    pub auth_token: String,
}
