//! 错误类型定义

use std::fmt;

use thiserror::Error;

use crate::moves::Move;

/// 走法被拒绝的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveRejection {
    /// 起点没有棋子
    NoPiece,
    /// 不是该方的回合
    NotYourTurn,
    /// 不在合法走法集合中（含走后己方被将军）
    Illegal,
}

impl fmt::Display for MoveRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveRejection::NoPiece => write!(f, "no piece at start position"),
            MoveRejection::NotYourTurn => write!(f, "not your turn"),
            MoveRejection::Illegal => write!(f, "not a legal move"),
        }
    }
}

/// 国际象棋规则错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChessError {
    /// 无效的走法
    #[error("Invalid move {mv}: {reason}")]
    InvalidMove { mv: Move, reason: MoveRejection },

    /// 对局已结束
    #[error("Game is already over")]
    GameOver,
}

impl ChessError {
    pub(crate) fn invalid(mv: Move, reason: MoveRejection) -> Self {
        ChessError::InvalidMove { mv, reason }
    }
}

/// 协议错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化错误（bincode）
    #[error("Bincode serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// JSON 序列化错误
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// 协议版本不匹配
    #[error("Protocol version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u8, actual: u8 },

    /// 帧大小超限
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// 连接超时
    #[error("Connection timeout")]
    ConnectionTimeout,

    /// 连接已关闭
    #[error("Connection closed")]
    ConnectionClosed,

    /// 国际象棋规则错误
    #[error("Chess error: {0}")]
    Chess(#[from] ChessError),
}

/// 协议操作结果类型
pub type Result<T> = std::result::Result<T, ProtocolError>;
