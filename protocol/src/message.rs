//! 消息类型定义

use serde::{Deserialize, Serialize};

use crate::moves::Move;
use crate::piece::TeamColor;
use crate::record::{AuthData, GameData, GameId, UserData};

/// 对局列表条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSummary {
    pub game_id: GameId,
    pub game_name: String,
    pub white_username: Option<String>,
    pub black_username: Option<String>,
    pub active: bool,
}

impl From<&GameData> for GameSummary {
    fn from(data: &GameData) -> Self {
        Self {
            game_id: data.game_id,
            game_name: data.game_name.clone(),
            white_username: data.white_username.clone(),
            black_username: data.black_username.clone(),
            active: data.is_active(),
        }
    }
}

/// 客户端发送给服务端的消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    // === 账户 ===
    /// 注册并登录
    Register { user: UserData },
    /// 登录
    Login { username: String, password: String },
    /// 登出
    Logout { auth_token: String },

    // === 对局管理 ===
    /// 获取对局列表
    ListGames { auth_token: String },
    /// 创建对局
    CreateGame { auth_token: String, game_name: String },
    /// 占据座位
    JoinGame {
        auth_token: String,
        game_id: GameId,
        color: TeamColor,
    },

    // === 对局内 ===
    /// 进入对局（玩家与观战者相同），之后接收该对局的推送
    Connect { auth_token: String, game_id: GameId },
    /// 走棋
    MakeMove {
        auth_token: String,
        game_id: GameId,
        mv: Move,
    },
    /// 离开对局，玩家同时让出座位
    Leave { auth_token: String, game_id: GameId },
    /// 认输
    Resign { auth_token: String, game_id: GameId },

    // === 管理 ===
    /// 清空所有用户与对局
    Clear,

    // === 心跳 ===
    /// 心跳请求
    Ping,
}

/// 服务端发送给客户端的消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    // === 账户 ===
    /// 注册成功
    Registered { auth: AuthData },
    /// 登录成功
    LoggedIn { auth: AuthData },
    /// 登出成功
    LoggedOut,

    // === 对局管理 ===
    /// 对局列表
    GameList { games: Vec<GameSummary> },
    /// 对局创建成功
    GameCreated { game_id: GameId },
    /// 占座成功
    GameJoined { game_id: GameId, color: TeamColor },
    /// 数据已清空
    Cleared,

    // === 对局推送 ===
    /// 完整对局状态，每次变化后发给对局内所有连接
    LoadGame { game: GameData },
    /// 文本通知
    Notification { message: String },

    // === 心跳 ===
    /// 心跳响应
    Pong,

    // === 错误 ===
    /// 错误消息
    Error { code: ErrorCode, message: String },
}

impl ServerMessage {
    /// 构造错误消息
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code,
            message: message.into(),
        }
    }

    /// 构造通知消息
    pub fn notification(message: impl Into<String>) -> Self {
        ServerMessage::Notification {
            message: message.into(),
        }
    }
}

/// 错误码定义，取值沿用 HTTP 状态码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    /// 参数缺失或对局不存在
    BadRequest = 400,
    /// 未登录或凭证无效
    Unauthorized = 401,
    /// 用户名或座位已被占用
    AlreadyTaken = 403,
    /// 对局不存在
    GameNotFound = 404,
    /// 无效走法
    InvalidMove = 422,
    /// 不是你的回合
    NotYourTurn = 409,
    /// 对局已结束
    GameOver = 410,
    /// 内部错误
    InternalError = 500,
}

impl ErrorCode {
    /// 数值形式
    pub fn status(&self) -> u16 {
        *self as u16
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} ({})", self, self.status())
    }
}
