//! 对局：回合、合法走法过滤、将军/将死/逼和判定

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::board::Board;
use crate::error::{ChessError, MoveRejection};
use crate::moves::Move;
use crate::piece::{Piece, Position, TeamColor};
use crate::rules::{king_attacked, MoveRule};

/// 当前走子方的局面状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    /// 对局进行中
    Ongoing,
    /// 该方被将军
    Check(TeamColor),
    /// 该方被将死
    Checkmate(TeamColor),
    /// 该方无子可动且未被将军
    Stalemate(TeamColor),
}

/// 一局棋：棋盘与当前走子方
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    board: Board,
    team_turn: TeamColor,
}

/// 试走记录
///
/// `Probe::apply` 修改棋盘并返回此记录，`revert` 消费记录并恢复
/// 起点与终点两个格子，保证每次试走恰好撤销一次。
#[must_use]
struct Probe {
    mv: Move,
    mover: Piece,
    replaced: Option<Piece>,
}

impl Probe {
    /// 在棋盘上执行走法（升变时在终点放置升变后的棋子）
    fn apply(board: &mut Board, mv: Move, mover: Piece) -> Probe {
        board.clear(mv.start);
        let placed = match mv.promotion {
            Some(piece_type) => Piece::new(mover.team, piece_type),
            None => mover,
        };
        let replaced = board.replace(mv.end, Some(placed));
        Probe {
            mv,
            mover,
            replaced,
        }
    }

    /// 恢复走法之前的棋盘
    fn revert(self, board: &mut Board) {
        board.replace(self.mv.end, self.replaced);
        board.set(self.mv.start, self.mover);
    }

    /// 保留走法的结果，返回被吃掉的棋子
    fn commit(self) -> Option<Piece> {
        self.replaced
    }
}

/// 试走 `mv`，判断走后己方王是否安全，棋盘随即复原
fn leaves_king_safe(board: &mut Board, mv: Move, mover: Piece) -> bool {
    let probe = Probe::apply(board, mv, mover);
    let safe = !king_attacked(board, mover.team);
    probe.revert(board);
    safe
}

/// 过滤掉走后己方被将军的伪合法走法
fn legal_moves_from(board: &mut Board, from: Position, mover: Piece) -> Vec<Move> {
    MoveRule::for_piece(mover.piece_type)
        .moves(board, from, mover.team)
        .into_iter()
        .filter(|&mv| leaves_king_safe(board, mv, mover))
        .collect()
}

impl Game {
    /// 新对局：标准开局，白方先走
    pub fn new() -> Self {
        Self {
            board: Board::initial(),
            team_turn: TeamColor::White,
        }
    }

    /// 从已有棋盘和走子方恢复对局
    pub fn from_parts(board: Board, team_turn: TeamColor) -> Self {
        Self { board, team_turn }
    }

    /// 当前走子方
    pub fn team_turn(&self) -> TeamColor {
        self.team_turn
    }

    /// 设置走子方
    pub fn set_team_turn(&mut self, team: TeamColor) {
        self.team_turn = team;
    }

    /// 当前棋盘
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// 整体替换棋盘（用于加载持久化状态）
    pub fn set_board(&mut self, board: Board) {
        self.board = board;
    }

    /// `pos` 处棋子的合法走法，空格返回 None
    pub fn valid_moves(&self, pos: Position) -> Option<Vec<Move>> {
        let mover = self.board.get(pos)?;
        let mut scratch = self.board.clone();
        Some(legal_moves_from(&mut scratch, pos, mover))
    }

    /// 执行走法并交换走子方
    pub fn make_move(&mut self, mv: Move) -> Result<(), ChessError> {
        let mover = self
            .board
            .get(mv.start)
            .ok_or(ChessError::invalid(mv, MoveRejection::NoPiece))?;

        if mover.team != self.team_turn {
            return Err(ChessError::invalid(mv, MoveRejection::NotYourTurn));
        }

        let legal = self.valid_moves(mv.start).unwrap_or_default();
        if !legal.contains(&mv) {
            return Err(ChessError::invalid(mv, MoveRejection::Illegal));
        }

        let captured = Probe::apply(&mut self.board, mv, mover).commit();
        debug!(%mv, team = %mover.team, captured = ?captured, "move applied");

        self.team_turn = self.team_turn.opponent();
        Ok(())
    }

    /// `team` 方是否被将军（没有王时返回 false）
    pub fn is_in_check(&self, team: TeamColor) -> bool {
        king_attacked(&self.board, team)
    }

    /// `team` 方是否被将死
    pub fn is_in_checkmate(&self, team: TeamColor) -> bool {
        if !self.is_in_check(team) {
            return false;
        }

        let mut scratch = self.board.clone();
        for (pos, mover) in self.board.pieces(team) {
            let moves = MoveRule::for_piece(mover.piece_type).moves(&scratch, pos, team);
            if moves
                .into_iter()
                .any(|mv| leaves_king_safe(&mut scratch, mv, mover))
            {
                return false;
            }
        }
        true
    }

    /// `team` 方是否被逼和：未被将军且所有棋子都没有合法走法
    pub fn is_in_stalemate(&self, team: TeamColor) -> bool {
        if self.is_in_check(team) {
            return false;
        }

        self.board
            .pieces(team)
            .into_iter()
            .all(|(pos, _)| self.valid_moves(pos).map_or(true, |moves| moves.is_empty()))
    }

    /// 当前走子方的局面状态
    pub fn status(&self) -> GameStatus {
        let team = self.team_turn;
        if self.is_in_checkmate(team) {
            GameStatus::Checkmate(team)
        } else if self.is_in_check(team) {
            GameStatus::Check(team)
        } else if self.is_in_stalemate(team) {
            GameStatus::Stalemate(team)
        } else {
            GameStatus::Ongoing
        }
    }

    /// 转换为 JSON 字符串
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// 从 JSON 字符串解析
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::PieceType;

    fn pos(row: u8, column: u8) -> Position {
        Position::new(row, column).unwrap()
    }

    fn place(board: &mut Board, row: u8, column: u8, team: TeamColor, piece_type: PieceType) {
        board.set(pos(row, column), Piece::new(team, piece_type));
    }

    #[test]
    fn test_initial_moves() {
        let game = Game::new();

        // 马有两种走法，兵有两种走法，车被挡住
        assert_eq!(game.valid_moves(pos(1, 2)).unwrap().len(), 2);
        assert_eq!(game.valid_moves(pos(2, 5)).unwrap().len(), 2);
        assert!(game.valid_moves(pos(1, 1)).unwrap().is_empty());
        assert!(game.valid_moves(pos(4, 4)).is_none());
    }

    #[test]
    fn test_probe_restores_capture() {
        let mut board = Board::empty();
        place(&mut board, 4, 4, TeamColor::White, PieceType::Rook);
        place(&mut board, 4, 7, TeamColor::Black, PieceType::Knight);
        let before = board.clone();

        let rook = Piece::new(TeamColor::White, PieceType::Rook);
        let probe = Probe::apply(&mut board, Move::new(pos(4, 4), pos(4, 7)), rook);
        assert_eq!(board.get(pos(4, 7)), Some(rook));
        assert!(board.get(pos(4, 4)).is_none());

        probe.revert(&mut board);
        assert_eq!(board, before);
    }

    #[test]
    fn test_probe_restores_promotion() {
        let mut board = Board::empty();
        place(&mut board, 7, 1, TeamColor::White, PieceType::Pawn);
        let before = board.clone();

        let pawn = Piece::new(TeamColor::White, PieceType::Pawn);
        let mv = Move::with_promotion(pos(7, 1), pos(8, 1), PieceType::Knight);
        let probe = Probe::apply(&mut board, mv, pawn);
        assert_eq!(
            board.get(pos(8, 1)),
            Some(Piece::new(TeamColor::White, PieceType::Knight))
        );

        probe.revert(&mut board);
        assert_eq!(board, before);
    }

    #[test]
    fn test_pinned_piece() {
        // 白车被黑车牵制在王前，只能沿牵制线移动
        let mut board = Board::empty();
        place(&mut board, 1, 5, TeamColor::White, PieceType::King);
        place(&mut board, 3, 5, TeamColor::White, PieceType::Rook);
        place(&mut board, 8, 5, TeamColor::Black, PieceType::Rook);
        let game = Game::from_parts(board, TeamColor::White);

        let moves = game.valid_moves(pos(3, 5)).unwrap();
        assert!(!moves.is_empty());
        assert!(moves.iter().all(|mv| mv.end.column() == 5));
        assert!(moves.contains(&Move::new(pos(3, 5), pos(8, 5))));
    }

    #[test]
    fn test_make_move_switches_turn() {
        let mut game = Game::new();
        game.make_move(Move::new(pos(2, 5), pos(4, 5))).unwrap();

        assert_eq!(game.team_turn(), TeamColor::Black);
        assert!(game.board().get(pos(2, 5)).is_none());
        assert_eq!(
            game.board().get(pos(4, 5)),
            Some(Piece::new(TeamColor::White, PieceType::Pawn))
        );
    }

    #[test]
    fn test_make_move_rejections() {
        let mut game = Game::new();
        let before = game.clone();

        let empty = Move::new(pos(4, 4), pos(5, 4));
        assert_eq!(
            game.make_move(empty),
            Err(ChessError::invalid(empty, MoveRejection::NoPiece))
        );

        let black_pawn = Move::new(pos(7, 5), pos(5, 5));
        assert_eq!(
            game.make_move(black_pawn),
            Err(ChessError::invalid(black_pawn, MoveRejection::NotYourTurn))
        );

        let triple = Move::new(pos(2, 5), pos(5, 5));
        assert_eq!(
            game.make_move(triple),
            Err(ChessError::invalid(triple, MoveRejection::Illegal))
        );

        assert_eq!(game, before);
    }

    #[test]
    fn test_promotion_must_be_chosen() {
        let mut board = Board::empty();
        place(&mut board, 1, 1, TeamColor::White, PieceType::King);
        place(&mut board, 8, 8, TeamColor::Black, PieceType::King);
        place(&mut board, 7, 3, TeamColor::White, PieceType::Pawn);
        let mut game = Game::from_parts(board, TeamColor::White);

        let plain = Move::new(pos(7, 3), pos(8, 3));
        assert!(game.make_move(plain).is_err());

        game.make_move(Move::with_promotion(pos(7, 3), pos(8, 3), PieceType::Queen))
            .unwrap();
        assert_eq!(
            game.board().get(pos(8, 3)),
            Some(Piece::new(TeamColor::White, PieceType::Queen))
        );
    }

    #[test]
    fn test_missing_king_is_never_in_check() {
        let mut board = Board::empty();
        place(&mut board, 4, 4, TeamColor::Black, PieceType::Queen);
        let game = Game::from_parts(board, TeamColor::White);

        assert!(!game.is_in_check(TeamColor::White));
        assert!(!game.is_in_checkmate(TeamColor::White));
    }

    #[test]
    fn test_check_escape_by_capture() {
        let mut board = Board::empty();
        place(&mut board, 1, 1, TeamColor::White, PieceType::King);
        place(&mut board, 2, 2, TeamColor::Black, PieceType::Queen);
        let game = Game::from_parts(board, TeamColor::White);

        assert!(game.is_in_check(TeamColor::White));
        // 王可以吃掉没有保护的后
        assert!(!game.is_in_checkmate(TeamColor::White));
        assert_eq!(game.status(), GameStatus::Check(TeamColor::White));
    }

    #[test]
    fn test_status_checkmate() {
        // 后车杀
        let mut board = Board::empty();
        place(&mut board, 8, 8, TeamColor::Black, PieceType::King);
        place(&mut board, 7, 1, TeamColor::White, PieceType::Rook);
        place(&mut board, 8, 2, TeamColor::White, PieceType::Queen);
        place(&mut board, 1, 1, TeamColor::White, PieceType::King);
        let game = Game::from_parts(board, TeamColor::Black);

        assert_eq!(game.status(), GameStatus::Checkmate(TeamColor::Black));
        assert!(!game.is_in_stalemate(TeamColor::Black));
    }

    #[test]
    fn test_status_ongoing() {
        assert_eq!(Game::new().status(), GameStatus::Ongoing);
    }

    #[test]
    fn test_json_round_trip() {
        let mut game = Game::new();
        game.make_move(Move::new(pos(2, 4), pos(4, 4))).unwrap();
        game.make_move(Move::new(pos(8, 7), pos(6, 6))).unwrap();

        let json = game.to_json().unwrap();
        let loaded = Game::from_json(&json).unwrap();
        assert_eq!(loaded, game);
        assert_eq!(loaded.team_turn(), TeamColor::White);
    }
}
