//! 对局业务逻辑
//!
//! 每个对局一把 `tokio::sync::Mutex`：同一对局的读改写串行执行，
//! 不同对局互不阻塞。

use std::collections::HashMap;
use std::sync::Arc;

use protocol::{AuthData, ErrorCode, GameData, GameId, GameStatus, Move, Outcome, TeamColor};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};

use crate::auth::UserStore;
use crate::error::{ServiceError, ServiceResult};
use crate::storage::GameStore;

/// 走棋结果
#[derive(Debug, Clone)]
pub struct MoveResult {
    pub auth: AuthData,
    /// 走棋方
    pub color: TeamColor,
    /// 走棋后的对局记录（已保存）
    pub game: GameData,
    /// 对方的局面状态
    pub status: GameStatus,
}

/// 离开对局的结果
#[derive(Debug, Clone)]
pub struct LeaveResult {
    pub auth: AuthData,
    pub game: GameData,
    /// 让出的座位，观战者为 None
    pub vacated: Option<TeamColor>,
}

/// 对局服务
pub struct GameService {
    users: Arc<RwLock<UserStore>>,
    store: Arc<dyn GameStore>,
    locks: Mutex<HashMap<GameId, Arc<Mutex<()>>>>,
}

impl GameService {
    pub fn new(users: Arc<RwLock<UserStore>>, store: Arc<dyn GameStore>) -> Self {
        Self {
            users,
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn authenticate(&self, auth_token: &str) -> ServiceResult<AuthData> {
        self.users.read().await.authenticate(auth_token)
    }

    /// 锁定并读取对局，持有锁期间独占该对局
    ///
    /// 只为已存在的对局建锁，不存在时返回 `missing()`。
    async fn lock_game(
        &self,
        game_id: GameId,
        missing: fn() -> ServiceError,
    ) -> ServiceResult<(OwnedMutexGuard<()>, GameData)> {
        let existing = self.locks.lock().await.get(&game_id).cloned();
        let lock = match existing {
            Some(lock) => lock,
            None => {
                if self.store.get_game(game_id).await?.is_none() {
                    return Err(missing());
                }
                self.locks.lock().await.entry(game_id).or_default().clone()
            }
        };

        let guard = lock.lock_owned().await;
        let game = self.store.get_game(game_id).await?.ok_or_else(missing)?;
        Ok((guard, game))
    }

    async fn load(&self, game_id: GameId) -> ServiceResult<GameData> {
        self.store
            .get_game(game_id)
            .await?
            .ok_or_else(ServiceError::game_not_found)
    }

    async fn save(&self, game: &GameData) -> ServiceResult<()> {
        self.store.update_game(game).await?;
        Ok(())
    }

    /// 所有对局
    pub async fn list_games(&self, auth_token: &str) -> ServiceResult<Vec<GameData>> {
        self.authenticate(auth_token).await?;
        Ok(self.store.list_games().await?)
    }

    /// 创建对局
    pub async fn create_game(&self, auth_token: &str, game_name: &str) -> ServiceResult<GameData> {
        if game_name.trim().is_empty() {
            return Err(ServiceError::bad_request());
        }
        let auth = self.authenticate(auth_token).await?;

        let game = self.store.create_game(game_name.trim()).await?;
        info!(game_id = game.game_id, username = %auth.username, "game created");
        Ok(game)
    }

    /// 占据座位；已被他人占据返回 `AlreadyTaken`，重复占据自己的座位视为成功
    pub async fn join_game(
        &self,
        auth_token: &str,
        color: TeamColor,
        game_id: GameId,
    ) -> ServiceResult<GameData> {
        let auth = self.authenticate(auth_token).await?;
        let (_guard, mut game) = self.lock_game(game_id, ServiceError::bad_request).await?;

        match game.seat(color).map(str::to_owned) {
            Some(owner) if owner != auth.username => return Err(ServiceError::already_taken()),
            Some(_) => return Ok(game),
            None => {}
        }

        *game.seat_mut(color) = Some(auth.username.clone());
        self.save(&game).await?;
        info!(game_id, username = %auth.username, %color, "seat taken");
        Ok(game)
    }

    /// 进入对局（玩家或观战者），返回当前记录
    pub async fn connect(&self, auth_token: &str, game_id: GameId) -> ServiceResult<(AuthData, GameData)> {
        let auth = self.authenticate(auth_token).await?;
        let game = self.load(game_id).await?;
        Ok((auth, game))
    }

    /// 走棋，将死或逼和时自动结束对局
    pub async fn make_move(
        &self,
        auth_token: &str,
        game_id: GameId,
        mv: Move,
    ) -> ServiceResult<MoveResult> {
        let auth = self.authenticate(auth_token).await?;
        let (_guard, mut data) = self.lock_game(game_id, ServiceError::game_not_found).await?;
        let color = data.player_color(&auth.username).ok_or_else(|| {
            ServiceError::new(ErrorCode::Unauthorized, "observers cannot make moves")
        })?;

        let game = data.state.active_mut()?;
        if game.team_turn() != color {
            return Err(ServiceError::new(ErrorCode::NotYourTurn, "not your turn"));
        }
        game.make_move(mv)?;

        let status = game.status();
        match status {
            GameStatus::Checkmate(loser) => data.state.conclude(Outcome::Checkmate {
                winner: loser.opponent(),
            })?,
            GameStatus::Stalemate(_) => data.state.conclude(Outcome::Stalemate)?,
            GameStatus::Ongoing | GameStatus::Check(_) => {}
        }
        self.save(&data).await?;

        debug!(game_id, username = %auth.username, %mv, ?status, "move accepted");
        Ok(MoveResult {
            auth,
            color,
            game: data,
            status,
        })
    }

    /// 认输，对方获胜
    pub async fn resign(&self, auth_token: &str, game_id: GameId) -> ServiceResult<(AuthData, GameData)> {
        let auth = self.authenticate(auth_token).await?;
        let (_guard, mut data) = self.lock_game(game_id, ServiceError::game_not_found).await?;
        let color = data.player_color(&auth.username).ok_or_else(|| {
            ServiceError::new(ErrorCode::Unauthorized, "observers cannot resign")
        })?;

        data.state.conclude(Outcome::Resigned {
            winner: color.opponent(),
        })?;
        self.save(&data).await?;

        info!(game_id, username = %auth.username, "player resigned");
        Ok((auth, data))
    }

    /// 离开对局，玩家让出座位
    pub async fn leave(&self, auth_token: &str, game_id: GameId) -> ServiceResult<LeaveResult> {
        let auth = self.authenticate(auth_token).await?;
        let (_guard, mut game) = self.lock_game(game_id, ServiceError::game_not_found).await?;
        let mut vacated = None;
        for color in [TeamColor::White, TeamColor::Black] {
            let seat = game.seat_mut(color);
            if seat.as_deref() == Some(auth.username.as_str()) {
                *seat = None;
                vacated.get_or_insert(color);
            }
        }
        if vacated.is_some() {
            self.save(&game).await?;
        }

        Ok(LeaveResult {
            auth,
            game,
            vacated,
        })
    }

    /// 清空所有对局
    pub async fn clear(&self) -> ServiceResult<()> {
        self.store.clear().await?;
        self.locks.lock().await.clear();
        Ok(())
    }
}
