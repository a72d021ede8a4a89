//! 国际象棋服务端
//!
//! 包含:
//! - 用户注册与登录凭证
//! - 对局存储（内存 / JSON 文件）
//! - 对局业务逻辑与逐对局加锁
//! - 连接管理与对局推送

pub mod auth;
pub mod error;
pub mod server;
pub mod service;
pub mod session;
pub mod storage;

pub use auth::UserStore;
pub use error::{ServiceError, ServiceResult};
pub use server::{handle_connection, serve, MessageHandler, ServerState};
pub use service::{GameService, LeaveResult, MoveResult};
pub use session::{ConnectionId, SessionHub};
pub use storage::{FileGameStore, GameStore, MemoryGameStore};
