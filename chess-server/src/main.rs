use std::sync::Arc;

use anyhow::{Context, Result};
use chess_server::{serve, FileGameStore, GameStore, MemoryGameStore, ServerState};
use protocol::{Listener, NetworkConfig, TcpListener};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 存储后端：memory（默认）或 file
const STORAGE_ENV: &str = "CHESS_STORAGE";

/// 文件存储目录，未设置时使用系统数据目录
const DATA_DIR_ENV: &str = "CHESS_DATA_DIR";

async fn open_store() -> Result<Arc<dyn GameStore>> {
    match std::env::var(STORAGE_ENV).ok().as_deref() {
        None | Some("memory") => {
            info!("using in-memory game storage");
            Ok(Arc::new(MemoryGameStore::new()))
        }
        Some("file") => {
            let store = match std::env::var(DATA_DIR_ENV) {
                Ok(dir) => FileGameStore::open(dir).await?,
                Err(_) => FileGameStore::open_default().await?,
            };
            info!(dir = ?store.games_directory(), "using file game storage");
            Ok(Arc::new(store))
        }
        Some(other) => anyhow::bail!("unknown {} value: {}", STORAGE_ENV, other),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("chess_server=debug".parse()?))
        .init();

    info!("国际象棋服务端启动中...");

    let config = NetworkConfig::from_env();
    let store = open_store().await?;
    let state = Arc::new(ServerState::new(store));

    let addr = config.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("无法监听地址: {}", addr))?;

    serve(listener, state).await
}
