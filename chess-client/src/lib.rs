//! 国际象棋命令行客户端

pub mod command;
pub mod session;

pub use command::{Command, CommandError, HELP};
pub use session::{format_game_list, Action, ClientSession, Reaction};
