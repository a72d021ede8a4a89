//! 棋盘

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{BOARD_SIZE, SQUARE_COUNT};
use crate::piece::{Piece, PieceType, Position, TeamColor};

/// 底线棋子排列（a 列到 h 列）
const BACK_RANK: [PieceType; 8] = [
    PieceType::Rook,
    PieceType::Knight,
    PieceType::Bishop,
    PieceType::Queen,
    PieceType::King,
    PieceType::Bishop,
    PieceType::Knight,
    PieceType::Rook,
];

/// 棋盘
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawBoard")]
pub struct Board {
    /// 8x8 棋盘，索引为 (row - 1) * 8 + (column - 1)，使用 Vec 以支持 serde
    squares: Vec<Option<Piece>>,
}

/// 反序列化用，检查格子数量
#[derive(Deserialize)]
struct RawBoard {
    squares: Vec<Option<Piece>>,
}

impl TryFrom<RawBoard> for Board {
    type Error = String;

    fn try_from(raw: RawBoard) -> Result<Self, Self::Error> {
        if raw.squares.len() != SQUARE_COUNT {
            return Err(format!(
                "board must have {} squares, got {}",
                SQUARE_COUNT,
                raw.squares.len()
            ));
        }
        Ok(Board {
            squares: raw.squares,
        })
    }
}

impl Board {
    /// 创建空棋盘
    pub fn empty() -> Self {
        Self {
            squares: vec![None; SQUARE_COUNT],
        }
    }

    /// 创建初始棋盘
    pub fn initial() -> Self {
        let mut board = Self::empty();
        board.reset();
        board
    }

    /// 清空后摆放标准开局
    pub fn reset(&mut self) {
        self.squares.iter_mut().for_each(|square| *square = None);

        for column in 1..=BOARD_SIZE {
            let piece_type = BACK_RANK[column as usize - 1];
            self.set(
                Position::new_unchecked(1, column),
                Piece::new(TeamColor::White, piece_type),
            );
            self.set(
                Position::new_unchecked(2, column),
                Piece::new(TeamColor::White, PieceType::Pawn),
            );
            self.set(
                Position::new_unchecked(7, column),
                Piece::new(TeamColor::Black, PieceType::Pawn),
            );
            self.set(
                Position::new_unchecked(8, column),
                Piece::new(TeamColor::Black, piece_type),
            );
        }
    }

    /// 获取指定位置的棋子
    pub fn get(&self, pos: Position) -> Option<Piece> {
        self.squares[pos.to_index()]
    }

    /// 放置棋子（覆盖原有棋子）
    pub fn set(&mut self, pos: Position, piece: Piece) {
        self.squares[pos.to_index()] = Some(piece);
    }

    /// 移除棋子，空格无操作
    pub fn clear(&mut self, pos: Position) {
        self.squares[pos.to_index()] = None;
    }

    /// 替换格子内容，返回原来的棋子
    pub(crate) fn replace(&mut self, pos: Position, piece: Option<Piece>) -> Option<Piece> {
        std::mem::replace(&mut self.squares[pos.to_index()], piece)
    }

    /// 查找指定阵营的王
    pub fn find_king(&self, team: TeamColor) -> Option<Position> {
        self.occupied()
            .find(|(_, piece)| piece.team == team && piece.piece_type == PieceType::King)
            .map(|(pos, _)| pos)
    }

    /// 获取指定阵营的所有棋子位置
    pub fn pieces(&self, team: TeamColor) -> Vec<(Position, Piece)> {
        self.occupied().filter(|(_, piece)| piece.team == team).collect()
    }

    /// 获取所有棋子
    pub fn all_pieces(&self) -> Vec<(Position, Piece)> {
        self.occupied().collect()
    }

    /// 棋子总数
    pub fn piece_count(&self) -> usize {
        self.squares.iter().filter(|square| square.is_some()).count()
    }

    fn occupied(&self) -> impl Iterator<Item = (Position, Piece)> + '_ {
        self.squares
            .iter()
            .enumerate()
            .filter_map(|(index, square)| square.map(|piece| (Position::from_index(index), piece)))
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::initial()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in (1..=BOARD_SIZE).rev() {
            for column in 1..=BOARD_SIZE {
                let symbol = self
                    .get(Position::new_unchecked(row, column))
                    .map_or('.', |piece| piece.symbol());
                write!(f, "{} ", symbol)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
