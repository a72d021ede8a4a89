//! 走子规则
//!
//! 每种棋子对应三种规则之一：滑行（象、车、后）、定步（马、王）、兵。
//! 这里只生成伪合法走法，不考虑走后己方王是否被将军。

use crate::board::Board;
use crate::moves::Move;
use crate::piece::{PieceType, Position, TeamColor};

const DIAGONALS: [(i8, i8); 4] = [(1, 1), (-1, 1), (-1, -1), (1, -1)];

const ORTHOGONALS: [(i8, i8); 4] = [(1, 0), (0, -1), (-1, 0), (0, 1)];

const ALL_DIRECTIONS: [(i8, i8); 8] = [
    (1, 1),
    (-1, 1),
    (-1, -1),
    (1, -1),
    (1, 0),
    (0, -1),
    (-1, 0),
    (0, 1),
];

const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (1, 2),
    (-1, 2),
    (1, -2),
    (-1, -2),
    (2, 1),
    (-2, 1),
    (2, -1),
    (-2, -1),
];

/// 走子规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveRule {
    /// 沿每个方向一直走到棋盘边缘或遇到棋子
    Sliding(&'static [(i8, i8)]),
    /// 每个偏移量只走一步
    FixedOffset(&'static [(i8, i8)]),
    /// 兵
    Pawn,
}

impl MoveRule {
    /// 棋子类型对应的规则
    pub fn for_piece(piece_type: PieceType) -> MoveRule {
        match piece_type {
            PieceType::Bishop => MoveRule::Sliding(&DIAGONALS),
            PieceType::Rook => MoveRule::Sliding(&ORTHOGONALS),
            PieceType::Queen => MoveRule::Sliding(&ALL_DIRECTIONS),
            PieceType::Knight => MoveRule::FixedOffset(&KNIGHT_OFFSETS),
            PieceType::King => MoveRule::FixedOffset(&ALL_DIRECTIONS),
            PieceType::Pawn => MoveRule::Pawn,
        }
    }

    /// 生成 `team` 方位于 `from` 的棋子的伪合法走法
    pub fn moves(&self, board: &Board, from: Position, team: TeamColor) -> Vec<Move> {
        let mut moves = Vec::new();
        match self {
            MoveRule::Sliding(directions) => {
                Self::generate_sliding(board, from, team, directions, &mut moves)
            }
            MoveRule::FixedOffset(offsets) => {
                Self::generate_fixed(board, from, team, offsets, &mut moves)
            }
            MoveRule::Pawn => Self::generate_pawn(board, from, team, &mut moves),
        }
        moves
    }

    fn generate_sliding(
        board: &Board,
        from: Position,
        team: TeamColor,
        directions: &[(i8, i8)],
        moves: &mut Vec<Move>,
    ) {
        for &(d_row, d_column) in directions {
            let mut current = from;
            while let Some(to) = current.offset(d_row, d_column) {
                match board.get(to) {
                    Some(target) => {
                        if target.team != team {
                            moves.push(Move::new(from, to));
                        }
                        break;
                    }
                    None => moves.push(Move::new(from, to)),
                }
                current = to;
            }
        }
    }

    fn generate_fixed(
        board: &Board,
        from: Position,
        team: TeamColor,
        offsets: &[(i8, i8)],
        moves: &mut Vec<Move>,
    ) {
        for &(d_row, d_column) in offsets {
            let Some(to) = from.offset(d_row, d_column) else {
                continue;
            };
            match board.get(to) {
                Some(target) if target.team == team => {}
                _ => moves.push(Move::new(from, to)),
            }
        }
    }

    fn generate_pawn(board: &Board, from: Position, team: TeamColor, moves: &mut Vec<Move>) {
        let forward = team.forward();

        // 前进一格，只能走到空格
        if let Some(one) = from.offset(forward, 0) {
            if board.get(one).is_none() {
                Self::push_pawn_move(from, one, team, moves);

                // 初始行可以前进两格，中间格和目标格都必须为空
                if from.row() == team.pawn_home_row() {
                    if let Some(two) = from.offset(forward * 2, 0) {
                        if board.get(two).is_none() {
                            Self::push_pawn_move(from, two, team, moves);
                        }
                    }
                }
            }
        }

        // 斜前方只能吃子
        for d_column in [1, -1] {
            if let Some(to) = from.offset(forward, d_column) {
                if matches!(board.get(to), Some(target) if target.team != team) {
                    Self::push_pawn_move(from, to, team, moves);
                }
            }
        }
    }

    /// 到达底线时展开为四种升变
    fn push_pawn_move(from: Position, to: Position, team: TeamColor, moves: &mut Vec<Move>) {
        if to.row() == team.promotion_row() {
            moves.extend(
                PieceType::PROMOTIONS
                    .iter()
                    .map(|&promotion| Move::with_promotion(from, to, promotion)),
            );
        } else {
            moves.push(Move::new(from, to));
        }
    }
}

/// 位于 `from` 的棋子的伪合法走法，空格返回空列表
pub fn pseudo_legal_moves(board: &Board, from: Position) -> Vec<Move> {
    match board.get(from) {
        Some(piece) => MoveRule::for_piece(piece.piece_type).moves(board, from, piece.team),
        None => Vec::new(),
    }
}

/// `team` 方的王是否正受到对方任一棋子的攻击
///
/// 找不到王时返回 false。
pub fn king_attacked(board: &Board, team: TeamColor) -> bool {
    let Some(king) = board.find_king(team) else {
        return false;
    };

    board
        .pieces(team.opponent())
        .into_iter()
        .any(|(pos, piece)| {
            MoveRule::for_piece(piece.piece_type)
                .moves(board, pos, piece.team)
                .iter()
                .any(|mv| mv.end == king)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::Piece;

    fn pos(row: u8, column: u8) -> Position {
        Position::new(row, column).unwrap()
    }

    fn lone(piece_type: PieceType, team: TeamColor, at: Position) -> Board {
        let mut board = Board::empty();
        board.set(at, Piece::new(team, piece_type));
        board
    }

    #[test]
    fn test_rule_dispatch() {
        assert_eq!(MoveRule::for_piece(PieceType::Pawn), MoveRule::Pawn);
        assert!(matches!(MoveRule::for_piece(PieceType::Rook), MoveRule::Sliding(d) if d.len() == 4));
        assert!(matches!(MoveRule::for_piece(PieceType::Queen), MoveRule::Sliding(d) if d.len() == 8));
        assert!(matches!(MoveRule::for_piece(PieceType::King), MoveRule::FixedOffset(d) if d.len() == 8));
    }

    #[test]
    fn test_queen_center() {
        let board = lone(PieceType::Queen, TeamColor::White, pos(4, 4));
        assert_eq!(pseudo_legal_moves(&board, pos(4, 4)).len(), 27);
    }

    #[test]
    fn test_rook_blocked_and_capture() {
        let mut board = lone(PieceType::Rook, TeamColor::White, pos(1, 1));
        board.set(pos(3, 1), Piece::new(TeamColor::White, PieceType::Pawn));
        board.set(pos(1, 4), Piece::new(TeamColor::Black, PieceType::Pawn));

        let moves = pseudo_legal_moves(&board, pos(1, 1));
        // 向上 1 格，向右 3 格（含吃子）
        assert_eq!(moves.len(), 4);
        assert!(moves.contains(&Move::new(pos(1, 1), pos(1, 4))));
        assert!(!moves.contains(&Move::new(pos(1, 1), pos(3, 1))));
        assert!(!moves.contains(&Move::new(pos(1, 1), pos(1, 5))));
    }

    #[test]
    fn test_bishop_corner() {
        let board = lone(PieceType::Bishop, TeamColor::Black, pos(8, 8));
        assert_eq!(pseudo_legal_moves(&board, pos(8, 8)).len(), 7);
    }

    #[test]
    fn test_knight_moves() {
        let board = lone(PieceType::Knight, TeamColor::White, pos(4, 4));
        assert_eq!(pseudo_legal_moves(&board, pos(4, 4)).len(), 8);

        let mut board = lone(PieceType::Knight, TeamColor::White, pos(1, 1));
        board.set(pos(3, 2), Piece::new(TeamColor::White, PieceType::Pawn));
        board.set(pos(2, 3), Piece::new(TeamColor::Black, PieceType::Pawn));
        let moves = pseudo_legal_moves(&board, pos(1, 1));
        assert_eq!(moves, vec![Move::new(pos(1, 1), pos(2, 3))]);
    }

    #[test]
    fn test_king_moves() {
        let board = lone(PieceType::King, TeamColor::White, pos(1, 5));
        assert_eq!(pseudo_legal_moves(&board, pos(1, 5)).len(), 5);

        let board = lone(PieceType::King, TeamColor::Black, pos(4, 4));
        assert_eq!(pseudo_legal_moves(&board, pos(4, 4)).len(), 8);
    }

    #[test]
    fn test_pawn_double_step() {
        let board = lone(PieceType::Pawn, TeamColor::White, pos(2, 3));
        let moves = pseudo_legal_moves(&board, pos(2, 3));
        assert_eq!(moves.len(), 2);
        assert!(moves.contains(&Move::new(pos(2, 3), pos(4, 3))));

        // 离开初始行后只能走一格
        let board = lone(PieceType::Pawn, TeamColor::White, pos(3, 3));
        assert_eq!(pseudo_legal_moves(&board, pos(3, 3)).len(), 1);
    }

    #[test]
    fn test_pawn_blocked() {
        let mut board = lone(PieceType::Pawn, TeamColor::Black, pos(7, 4));
        board.set(pos(5, 4), Piece::new(TeamColor::White, PieceType::Knight));
        assert_eq!(
            pseudo_legal_moves(&board, pos(7, 4)),
            vec![Move::new(pos(7, 4), pos(6, 4))]
        );

        // 正前方被挡住时两格也不能走
        board.set(pos(6, 4), Piece::new(TeamColor::White, PieceType::Knight));
        assert!(pseudo_legal_moves(&board, pos(7, 4)).is_empty());
    }

    #[test]
    fn test_pawn_captures() {
        let mut board = lone(PieceType::Pawn, TeamColor::White, pos(4, 4));
        board.set(pos(5, 5), Piece::new(TeamColor::Black, PieceType::Rook));
        board.set(pos(5, 3), Piece::new(TeamColor::White, PieceType::Rook));

        let moves = pseudo_legal_moves(&board, pos(4, 4));
        assert_eq!(moves.len(), 2);
        assert!(moves.contains(&Move::new(pos(4, 4), pos(5, 5))));
        assert!(moves.contains(&Move::new(pos(4, 4), pos(5, 4))));
    }

    #[test]
    fn test_pawn_promotion_expands() {
        let mut board = lone(PieceType::Pawn, TeamColor::Black, pos(2, 2));
        board.set(pos(1, 1), Piece::new(TeamColor::White, PieceType::Rook));

        let moves = pseudo_legal_moves(&board, pos(2, 2));
        // 前进 4 种升变 + 吃子 4 种升变
        assert_eq!(moves.len(), 8);
        assert!(moves.iter().all(|mv| mv.promotion.is_some()));
    }

    #[test]
    fn test_king_attacked() {
        let mut board = Board::empty();
        board.set(pos(1, 1), Piece::new(TeamColor::White, PieceType::King));
        board.set(pos(8, 1), Piece::new(TeamColor::Black, PieceType::Rook));
        assert!(king_attacked(&board, TeamColor::White));

        board.set(pos(4, 1), Piece::new(TeamColor::White, PieceType::Bishop));
        assert!(!king_attacked(&board, TeamColor::White));

        // 没有王不算被将军
        assert!(!king_attacked(&board, TeamColor::Black));
    }
}
