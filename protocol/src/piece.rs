//! 棋子与坐标定义

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::BOARD_SIZE;

/// 棋子类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceType {
    King,
    Queen,
    Bishop,
    Knight,
    Rook,
    Pawn,
}

impl PieceType {
    /// 兵升变可选的棋子类型
    pub const PROMOTIONS: [PieceType; 4] = [
        PieceType::Queen,
        PieceType::Rook,
        PieceType::Bishop,
        PieceType::Knight,
    ];

    /// 单字母符号（白方大写，黑方小写）
    pub fn symbol(&self, team: TeamColor) -> char {
        let c = match self {
            PieceType::King => 'k',
            PieceType::Queen => 'q',
            PieceType::Bishop => 'b',
            PieceType::Knight => 'n',
            PieceType::Rook => 'r',
            PieceType::Pawn => 'p',
        };
        match team {
            TeamColor::White => c.to_ascii_uppercase(),
            TeamColor::Black => c,
        }
    }

    /// 从名称或单字母解析（不区分大小写）
    pub fn from_name(name: &str) -> Option<PieceType> {
        match name.to_ascii_lowercase().as_str() {
            "k" | "king" => Some(PieceType::King),
            "q" | "queen" => Some(PieceType::Queen),
            "b" | "bishop" => Some(PieceType::Bishop),
            "n" | "knight" => Some(PieceType::Knight),
            "r" | "rook" => Some(PieceType::Rook),
            "p" | "pawn" => Some(PieceType::Pawn),
            _ => None,
        }
    }
}

impl fmt::Display for PieceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PieceType::King => "KING",
            PieceType::Queen => "QUEEN",
            PieceType::Bishop => "BISHOP",
            PieceType::Knight => "KNIGHT",
            PieceType::Rook => "ROOK",
            PieceType::Pawn => "PAWN",
        };
        f.write_str(name)
    }
}

/// 阵营
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TeamColor {
    /// 白方（先手，在下方）
    White,
    /// 黑方（后手，在上方）
    Black,
}

impl TeamColor {
    /// 获取对方阵营
    pub fn opponent(&self) -> TeamColor {
        match self {
            TeamColor::White => TeamColor::Black,
            TeamColor::Black => TeamColor::White,
        }
    }

    /// 兵的前进方向（行增量）
    pub fn forward(&self) -> i8 {
        match self {
            TeamColor::White => 1,
            TeamColor::Black => -1,
        }
    }

    /// 兵的初始行，只有在这一行才能走两格
    pub fn pawn_home_row(&self) -> u8 {
        match self {
            TeamColor::White => 2,
            TeamColor::Black => 7,
        }
    }

    /// 底线（兵到达后必须升变）
    pub fn promotion_row(&self) -> u8 {
        match self {
            TeamColor::White => BOARD_SIZE,
            TeamColor::Black => 1,
        }
    }

    /// 从名称解析（不区分大小写）
    pub fn from_name(name: &str) -> Option<TeamColor> {
        match name.to_ascii_lowercase().as_str() {
            "w" | "white" => Some(TeamColor::White),
            "b" | "black" => Some(TeamColor::Black),
            _ => None,
        }
    }
}

impl fmt::Display for TeamColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeamColor::White => f.write_str("WHITE"),
            TeamColor::Black => f.write_str("BLACK"),
        }
    }
}

/// 棋子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub team: TeamColor,
    pub piece_type: PieceType,
}

impl Piece {
    /// 创建新棋子
    pub fn new(team: TeamColor, piece_type: PieceType) -> Self {
        Self { team, piece_type }
    }

    /// 单字母符号
    pub fn symbol(&self) -> char {
        self.piece_type.symbol(self.team)
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.team, self.piece_type)
    }
}

/// 棋盘坐标，行列均为 1..=8
///
/// 字段私有：只能通过 [`Position::new`] 或 [`Position::offset`] 得到，
/// 因此任何 `Position` 值都落在棋盘内。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPosition", into = "RawPosition")]
pub struct Position {
    row: u8,
    column: u8,
}

/// 序列化用的原始坐标，反序列化时经过边界检查
#[derive(Serialize, Deserialize)]
struct RawPosition {
    row: u8,
    column: u8,
}

impl Position {
    /// 创建新位置，越界返回 None
    pub fn new(row: u8, column: u8) -> Option<Self> {
        if Self::is_valid(row as i8, column as i8) {
            Some(Self { row, column })
        } else {
            None
        }
    }

    /// 创建新位置（不检查边界，内部使用）
    pub(crate) const fn new_unchecked(row: u8, column: u8) -> Self {
        Self { row, column }
    }

    /// 检查行列是否在棋盘内
    pub fn is_valid(row: i8, column: i8) -> bool {
        (1..=BOARD_SIZE as i8).contains(&row) && (1..=BOARD_SIZE as i8).contains(&column)
    }

    /// 行（1 为白方底线）
    pub fn row(&self) -> u8 {
        self.row
    }

    /// 列（1 为 a 列）
    pub fn column(&self) -> u8 {
        self.column
    }

    /// 获取偏移后的位置
    pub fn offset(&self, d_row: i8, d_column: i8) -> Option<Position> {
        let row = self.row as i8 + d_row;
        let column = self.column as i8 + d_column;
        if Self::is_valid(row, column) {
            Some(Position::new_unchecked(row as u8, column as u8))
        } else {
            None
        }
    }

    /// 转换为数组索引
    pub(crate) fn to_index(self) -> usize {
        (self.row as usize - 1) * BOARD_SIZE as usize + (self.column as usize - 1)
    }

    /// 从数组索引转换
    pub(crate) fn from_index(index: usize) -> Self {
        let size = BOARD_SIZE as usize;
        Position::new_unchecked((index / size + 1) as u8, (index % size + 1) as u8)
    }

    /// 解析 "e4" 形式的格子名
    pub fn from_square(square: &str) -> Option<Position> {
        let mut chars = square.trim().chars();
        let file = chars.next()?.to_ascii_lowercase();
        let rank = chars.next()?.to_digit(10)?;
        if chars.next().is_some() || !file.is_ascii_lowercase() {
            return None;
        }
        let column = file as u8 - b'a' + 1;
        Position::new(rank as u8, column)
    }

    /// 格子名，如 "e4"
    pub fn square(&self) -> String {
        format!("{}{}", (b'a' + self.column - 1) as char, self.row)
    }
}

impl TryFrom<RawPosition> for Position {
    type Error = String;

    fn try_from(raw: RawPosition) -> Result<Self, Self::Error> {
        Position::new(raw.row, raw.column)
            .ok_or_else(|| format!("position ({}, {}) is off the board", raw.row, raw.column))
    }
}

impl From<Position> for RawPosition {
    fn from(pos: Position) -> Self {
        RawPosition {
            row: pos.row,
            column: pos.column,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.row, self.column)
    }
}
