//! 国际象棋共享协议库
//!
//! 包含:
//! - 棋子、坐标、棋盘等核心数据结构
//! - 走子规则与合法走法过滤 (MoveRule, Game)
//! - 对局记录 (MatchState, GameData)
//! - 消息类型定义 (ClientMessage, ServerMessage)
//! - 传输层抽象与帧编解码
//! - 终端棋盘渲染

mod board;
mod config;
mod constants;
mod error;
mod game;
mod message;
mod moves;
mod piece;
mod record;
mod render;
mod rules;
mod transport;

pub use board::Board;
pub use config::{NetworkConfig, HOST_ENV, PORT_ENV};
pub use constants::*;
pub use error::{ChessError, MoveRejection, ProtocolError, Result};
pub use game::{Game, GameStatus};
pub use message::{ClientMessage, ErrorCode, GameSummary, ServerMessage};
pub use moves::Move;
pub use piece::{Piece, PieceType, Position, TeamColor};
pub use record::{AuthData, GameData, GameId, MatchState, Outcome, UserData};
pub use render::render_board;
pub use rules::{king_attacked, pseudo_legal_moves, MoveRule};
pub use transport::{
    decode_header, encode_frame, Connection, Connector, FrameReader, FrameWriter, Listener,
    TcpConnection, TcpConnector, TcpListener, HEADER_SIZE,
};
