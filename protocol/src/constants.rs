//! 协议常量定义

use std::time::Duration;

/// 协议版本号
pub const PROTOCOL_VERSION: u8 = 1;

/// 棋盘边长（行数 = 列数）
pub const BOARD_SIZE: u8 = 8;

/// 棋盘格子总数
pub const SQUARE_COUNT: usize = (BOARD_SIZE as usize) * (BOARD_SIZE as usize);

/// 用户名最大长度
pub const MAX_USERNAME_LEN: usize = 32;

/// 认证令牌长度
pub const AUTH_TOKEN_LEN: usize = 32;

/// 消息帧最大大小
pub const MAX_FRAME_SIZE: usize = 65536;

/// 服务端最大连接数
pub const MAX_CONNECTIONS: usize = 100;

/// 默认监听端口
pub const DEFAULT_PORT: u16 = 9527;

/// 连接超时（秒）
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// 连接超时 Duration
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(CONNECT_TIMEOUT_SECS);
