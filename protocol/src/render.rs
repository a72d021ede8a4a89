//! 终端棋盘渲染（ANSI 颜色）

use std::collections::HashSet;
use std::fmt::Write;

use crate::board::Board;
use crate::constants::BOARD_SIZE;
use crate::piece::{Position, TeamColor};

const RESET: &str = "\x1b[0m";
const LIGHT_SQUARE: &str = "\x1b[47m";
const DARK_SQUARE: &str = "\x1b[100m";
const HIGHLIGHT_SQUARE: &str = "\x1b[43m";
const WHITE_PIECE: &str = "\x1b[1;32m";
const BLACK_PIECE: &str = "\x1b[1;31m";

/// 按 `perspective` 的视角渲染棋盘
///
/// 白方视角第 8 行在上、a 列在左；黑方视角相反。
/// `highlights` 中的格子使用高亮背景。
pub fn render_board(
    board: &Board,
    perspective: TeamColor,
    highlights: &HashSet<Position>,
) -> String {
    let (rows, columns): (Vec<u8>, Vec<u8>) = match perspective {
        TeamColor::White => ((1..=BOARD_SIZE).rev().collect(), (1..=BOARD_SIZE).collect()),
        TeamColor::Black => ((1..=BOARD_SIZE).collect(), (1..=BOARD_SIZE).rev().collect()),
    };

    let mut out = String::new();
    for &row in &rows {
        let _ = write!(out, "{} ", row);
        for &column in &columns {
            let pos = Position::new_unchecked(row, column);
            let background = if highlights.contains(&pos) {
                HIGHLIGHT_SQUARE
            } else if (row + column) % 2 == 1 {
                LIGHT_SQUARE
            } else {
                DARK_SQUARE
            };

            match board.get(pos) {
                Some(piece) => {
                    let color = match piece.team {
                        TeamColor::White => WHITE_PIECE,
                        TeamColor::Black => BLACK_PIECE,
                    };
                    let _ = write!(out, "{}{} {} {}", background, color, piece.symbol(), RESET);
                }
                None => {
                    let _ = write!(out, "{}   {}", background, RESET);
                }
            }
        }
        out.push('\n');
    }

    out.push_str("  ");
    for &column in &columns {
        let _ = write!(out, " {} ", (b'a' + column - 1) as char);
    }
    out.push('\n');
    out
}
