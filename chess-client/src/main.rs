use std::io::Write;

use anyhow::{Context, Result};
use chess_client::{Action, ClientSession, Command};
use protocol::{Connector, NetworkConfig, ServerMessage, TcpConnector};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn show(text: &str, prompt: &str) -> Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "\n{}", text)?;
    write!(stdout, "{}", prompt)?;
    stdout.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 日志输出到 stderr，避免干扰棋盘显示
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("chess_client=info".parse()?))
        .init();

    let config = NetworkConfig::from_env();
    let addr = config.addr();
    let conn = TcpConnector
        .connect(&addr)
        .await
        .with_context(|| format!("无法连接服务器: {}", addr))?;
    info!("已连接到服务器: {}", addr);

    let (mut reader, mut writer) = conn.split();

    // 读取任务：把服务端消息转发给主循环
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(64);
    let read_task = tokio::spawn(async move {
        loop {
            match reader.read_frame::<ServerMessage>().await {
                Ok(msg) => {
                    if tx.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!("读取结束: {}", e);
                    break;
                }
            }
        }
    });

    let mut session = ClientSession::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    show("Welcome to chess. Type 'help' to get started.", &session.prompt())?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let command = match Command::parse(&line) {
                    Ok(Some(command)) => command,
                    Ok(None) => {
                        show("", &session.prompt())?;
                        continue;
                    }
                    Err(e) => {
                        show(&e.to_string(), &session.prompt())?;
                        continue;
                    }
                };

                match session.request(command) {
                    Ok(Action::Send(msg)) => writer.write_frame(&msg).await?,
                    Ok(Action::Print(text)) => show(&text, &session.prompt())?,
                    Ok(Action::Quit) => break,
                    Err(text) => show(&text, &session.prompt())?,
                }
            }
            msg = rx.recv() => {
                let Some(msg) = msg else {
                    warn!("与服务器的连接已断开");
                    break;
                };
                let reaction = session.on_message(msg);
                if let Some(follow_up) = reaction.follow_up {
                    writer.write_frame(&follow_up).await?;
                }
                if let Some(text) = reaction.output {
                    show(&text, &session.prompt())?;
                }
            }
        }
    }

    read_task.abort();
    println!();
    Ok(())
}
