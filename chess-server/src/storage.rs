//! 对局存储
//!
//! `GameStore` 隔离存储后端：内存实现用于测试和临时服务，
//! 文件实现每个对局一个 JSON 文件。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use protocol::{GameData, GameId};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// 对局存储后端
#[async_trait]
pub trait GameStore: Send + Sync {
    /// 创建新对局（标准开局，座位为空）
    async fn create_game(&self, game_name: &str) -> Result<GameData>;

    /// 按 ID 获取对局
    async fn get_game(&self, game_id: GameId) -> Result<Option<GameData>>;

    /// 覆盖保存已有对局
    async fn update_game(&self, game: &GameData) -> Result<()>;

    /// 所有对局，按 ID 升序
    async fn list_games(&self) -> Result<Vec<GameData>>;

    /// 删除所有对局，ID 重新从 1 开始
    async fn clear(&self) -> Result<()>;
}

/// 内存存储
pub struct MemoryGameStore {
    games: RwLock<BTreeMap<GameId, GameData>>,
    next_id: AtomicU32,
}

impl MemoryGameStore {
    pub fn new() -> Self {
        Self {
            games: RwLock::new(BTreeMap::new()),
            next_id: AtomicU32::new(1),
        }
    }
}

impl Default for MemoryGameStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GameStore for MemoryGameStore {
    async fn create_game(&self, game_name: &str) -> Result<GameData> {
        let game_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let game = GameData::new(game_id, game_name);
        self.games.write().await.insert(game_id, game.clone());
        Ok(game)
    }

    async fn get_game(&self, game_id: GameId) -> Result<Option<GameData>> {
        Ok(self.games.read().await.get(&game_id).cloned())
    }

    async fn update_game(&self, game: &GameData) -> Result<()> {
        let mut games = self.games.write().await;
        let slot = games
            .get_mut(&game.game_id)
            .with_context(|| format!("game {} does not exist", game.game_id))?;
        *slot = game.clone();
        Ok(())
    }

    async fn list_games(&self) -> Result<Vec<GameData>> {
        Ok(self.games.read().await.values().cloned().collect())
    }

    async fn clear(&self) -> Result<()> {
        self.games.write().await.clear();
        self.next_id.store(1, Ordering::SeqCst);
        Ok(())
    }
}

/// 文件存储，文件名为 `game-<id>.json`
pub struct FileGameStore {
    games_dir: PathBuf,
    next_id: AtomicU32,
}

impl FileGameStore {
    /// 使用指定目录，目录不存在时创建；ID 从已有文件的最大值之后继续
    pub async fn open(games_dir: impl Into<PathBuf>) -> Result<Self> {
        let games_dir = games_dir.into();
        fs::create_dir_all(&games_dir)
            .await
            .with_context(|| format!("无法创建存储目录: {:?}", games_dir))?;

        let store = Self {
            games_dir,
            next_id: AtomicU32::new(1),
        };
        let max_id = store.stored_ids().await?.into_iter().max().unwrap_or(0);
        store.next_id.store(max_id + 1, Ordering::SeqCst);
        debug!(dir = ?store.games_dir, next_id = max_id + 1, "file game store opened");
        Ok(store)
    }

    /// 使用系统数据目录下的默认位置
    pub async fn open_default() -> Result<Self> {
        Self::open(default_games_directory()?).await
    }

    /// 存储目录
    pub fn games_directory(&self) -> &Path {
        &self.games_dir
    }

    fn game_path(&self, game_id: GameId) -> PathBuf {
        self.games_dir.join(format!("game-{}.json", game_id))
    }

    async fn write_game(&self, game: &GameData) -> Result<()> {
        let path = self.game_path(game.game_id);
        let json = game.to_json().context("序列化对局失败")?;
        fs::write(&path, json)
            .await
            .with_context(|| format!("写入文件失败: {:?}", path))
    }

    /// 目录中已保存的对局 ID
    async fn stored_ids(&self) -> Result<Vec<GameId>> {
        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&self.games_dir)
            .await
            .with_context(|| format!("读取存储目录失败: {:?}", self.games_dir))?;

        while let Some(entry) = entries.next_entry().await.context("读取目录项失败")? {
            if let Some(id) = entry.file_name().to_str().and_then(parse_game_file_name) {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }
}

/// 从 `game-<id>.json` 中解析 ID
fn parse_game_file_name(name: &str) -> Option<GameId> {
    name.strip_prefix("game-")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

/// 跨平台默认存储目录
fn default_games_directory() -> Result<PathBuf> {
    let app_data_dir = dirs::data_dir().context("无法获取应用数据目录")?;
    Ok(app_data_dir.join("chess-server").join("games"))
}

#[async_trait]
impl GameStore for FileGameStore {
    async fn create_game(&self, game_name: &str) -> Result<GameData> {
        let game_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let game = GameData::new(game_id, game_name);
        self.write_game(&game).await?;
        Ok(game)
    }

    async fn get_game(&self, game_id: GameId) -> Result<Option<GameData>> {
        let path = self.game_path(game_id);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("读取文件失败: {:?}", path)),
        };
        let game = GameData::from_json(&content)
            .with_context(|| format!("解析对局文件失败: {:?}", path))?;
        Ok(Some(game))
    }

    async fn update_game(&self, game: &GameData) -> Result<()> {
        if !fs::try_exists(self.game_path(game.game_id)).await? {
            anyhow::bail!("game {} does not exist", game.game_id);
        }
        self.write_game(game).await
    }

    async fn list_games(&self) -> Result<Vec<GameData>> {
        let mut games = Vec::new();
        for game_id in self.stored_ids().await? {
            match self.get_game(game_id).await {
                Ok(Some(game)) => games.push(game),
                Ok(None) => {}
                // 跳过损坏的文件
                Err(e) => warn!(game_id, error = %e, "skipping unreadable game file"),
            }
        }
        Ok(games)
    }

    async fn clear(&self) -> Result<()> {
        for game_id in self.stored_ids().await? {
            let path = self.game_path(game_id);
            fs::remove_file(&path)
                .await
                .with_context(|| format!("删除文件失败: {:?}", path))?;
        }
        self.next_id.store(1, Ordering::SeqCst);
        Ok(())
    }
}
