//! 命令行输入解析

use protocol::{GameId, Move, PieceType, Position, TeamColor};
use thiserror::Error;

/// 输入解析错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command '{0}'. Type 'help' for options.")]
    Unknown(String),

    #[error("Expected: {0}")]
    Usage(&'static str),

    #[error("Invalid square '{0}' (expected a1..h8)")]
    Square(String),

    #[error("Invalid promotion piece '{0}' (expected q, r, b or n)")]
    Promotion(String),

    #[error("Invalid color '{0}' (expected white or black)")]
    Color(String),

    #[error("Invalid game id '{0}'")]
    GameId(String),
}

/// 用户命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    Register {
        username: String,
        password: String,
        email: String,
    },
    Login {
        username: String,
        password: String,
    },
    Logout,
    Create {
        name: String,
    },
    List,
    Join {
        game_id: GameId,
        color: TeamColor,
    },
    Observe {
        game_id: GameId,
    },
    Redraw,
    Leave,
    Move(Move),
    Resign,
    Legal(Position),
}

fn parse_square(text: &str) -> Result<Position, CommandError> {
    Position::from_square(text).ok_or_else(|| CommandError::Square(text.to_string()))
}

fn parse_game_id(text: &str) -> Result<GameId, CommandError> {
    text.parse()
        .map_err(|_| CommandError::GameId(text.to_string()))
}

fn parse_promotion(text: &str) -> Result<PieceType, CommandError> {
    PieceType::from_name(text)
        .filter(|piece_type| PieceType::PROMOTIONS.contains(piece_type))
        .ok_or_else(|| CommandError::Promotion(text.to_string()))
}

impl Command {
    /// 解析一行输入；空行返回 None
    pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((&cmd, params)) = tokens.split_first() else {
            return Ok(None);
        };

        let command = match (cmd.to_ascii_lowercase().as_str(), params) {
            ("help", _) => Command::Help,
            ("quit" | "exit", _) => Command::Quit,
            ("register", [username, password, email]) => Command::Register {
                username: username.to_string(),
                password: password.to_string(),
                email: email.to_string(),
            },
            ("register", _) => return Err(CommandError::Usage("register <username> <password> <email>")),
            ("login", [username, password]) => Command::Login {
                username: username.to_string(),
                password: password.to_string(),
            },
            ("login", _) => return Err(CommandError::Usage("login <username> <password>")),
            ("logout", _) => Command::Logout,
            ("create", []) => return Err(CommandError::Usage("create <name>")),
            ("create", name) => Command::Create {
                name: name.join(" "),
            },
            ("list", _) => Command::List,
            ("join", [id, color]) => Command::Join {
                game_id: parse_game_id(id)?,
                color: TeamColor::from_name(color)
                    .ok_or_else(|| CommandError::Color(color.to_string()))?,
            },
            ("join", _) => return Err(CommandError::Usage("join <id> <white|black>")),
            ("observe", [id]) => Command::Observe {
                game_id: parse_game_id(id)?,
            },
            ("observe", _) => return Err(CommandError::Usage("observe <id>")),
            ("redraw", _) => Command::Redraw,
            ("leave", _) => Command::Leave,
            ("move", [from, to]) => Command::Move(Move::new(parse_square(from)?, parse_square(to)?)),
            ("move", [from, to, promotion]) => Command::Move(Move::with_promotion(
                parse_square(from)?,
                parse_square(to)?,
                parse_promotion(promotion)?,
            )),
            ("move", _) => {
                return Err(CommandError::Usage(
                    "move <source> <destination> <optional promotion> (e.g. e7 e8 q)",
                ))
            }
            ("resign", _) => Command::Resign,
            ("legal", [square]) => Command::Legal(parse_square(square)?),
            ("legal", _) => return Err(CommandError::Usage("legal <square> (e.g. f5)")),
            (other, _) => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

/// 帮助文本
pub const HELP: &str = "\
register <username> <password> <email> - create an account
login <username> <password> - sign in
logout - sign out
create <name> - create a game
list - list games
join <id> <white|black> - take a seat and enter a game
observe <id> - watch a game
redraw - redraw the chess board
leave - leave the current game
move <source> <destination> <optional promotion> (e.g. e7 e8 q) - make a move
resign - forfeit the current game
legal <square> (e.g. f5) - highlight legal moves for the piece on that square
help - show possible commands
quit - exit";
