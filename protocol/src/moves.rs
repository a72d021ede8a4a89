//! 走法

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::piece::{PieceType, Position};

/// 走法
///
/// 相等与哈希同时比较起点、终点和升变类型，
/// 仅升变不同的两个走法视为不同走法。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    /// 起始位置
    pub start: Position,
    /// 目标位置
    pub end: Position,
    /// 兵到达底线时的升变类型
    pub promotion: Option<PieceType>,
}

impl Move {
    /// 创建普通走法
    pub fn new(start: Position, end: Position) -> Self {
        Self {
            start,
            end,
            promotion: None,
        }
    }

    /// 创建升变走法
    pub fn with_promotion(start: Position, end: Position, promotion: PieceType) -> Self {
        Self {
            start,
            end,
            promotion: Some(promotion),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)?;
        if let Some(promotion) = self.promotion {
            write!(f, ":{}", promotion)?;
        }
        Ok(())
    }
}
