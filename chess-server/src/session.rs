//! 连接与对局订阅

use std::collections::{HashMap, HashSet};

use protocol::{GameId, ServerMessage};
use tokio::sync::mpsc;

/// 连接 ID
pub type ConnectionId = u64;

/// 连接注册表：连接 ID -> 发送通道，对局 ID -> 订阅的连接
#[derive(Debug, Default)]
pub struct SessionHub {
    connections: HashMap<ConnectionId, mpsc::Sender<ServerMessage>>,
    games: HashMap<GameId, HashSet<ConnectionId>>,
}

impl SessionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记新连接
    pub fn register(&mut self, conn_id: ConnectionId, tx: mpsc::Sender<ServerMessage>) {
        self.connections.insert(conn_id, tx);
    }

    /// 移除连接及其所有订阅，返回它订阅过的对局
    pub fn unregister(&mut self, conn_id: ConnectionId) -> Vec<GameId> {
        self.connections.remove(&conn_id);
        let mut left = Vec::new();
        self.games.retain(|&game_id, members| {
            if members.remove(&conn_id) {
                left.push(game_id);
            }
            !members.is_empty()
        });
        left
    }

    /// 订阅对局推送
    pub fn attach(&mut self, conn_id: ConnectionId, game_id: GameId) {
        self.games.entry(game_id).or_default().insert(conn_id);
    }

    /// 取消订阅
    pub fn detach(&mut self, conn_id: ConnectionId, game_id: GameId) {
        if let Some(members) = self.games.get_mut(&game_id) {
            members.remove(&conn_id);
            if members.is_empty() {
                self.games.remove(&game_id);
            }
        }
    }

    /// 清除所有订阅（连接保留）
    pub fn detach_all(&mut self) {
        self.games.clear();
    }

    /// 对局内除 `except` 外所有连接的发送通道
    pub fn recipients(
        &self,
        game_id: GameId,
        except: Option<ConnectionId>,
    ) -> Vec<mpsc::Sender<ServerMessage>> {
        self.games
            .get(&game_id)
            .into_iter()
            .flatten()
            .filter(|&&conn_id| Some(conn_id) != except)
            .filter_map(|conn_id| self.connections.get(conn_id).cloned())
            .collect()
    }

    /// 对局的订阅数
    pub fn member_count(&self, game_id: GameId) -> usize {
        self.games.get(&game_id).map_or(0, HashSet::len)
    }
}
