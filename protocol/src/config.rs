//! 网络配置

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_PORT;

/// 主机地址环境变量
pub const HOST_ENV: &str = "CHESS_HOST";

/// 端口环境变量
pub const PORT_ENV: &str = "CHESS_PORT";

/// 网络配置
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub host: String,
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl NetworkConfig {
    /// 默认配置，再用 `CHESS_HOST` / `CHESS_PORT` 覆盖
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 按给定的查找函数覆盖默认值，无法解析的端口保持默认
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let host = lookup(HOST_ENV)
            .filter(|host| !host.trim().is_empty())
            .unwrap_or(defaults.host);
        let port = lookup(PORT_ENV)
            .and_then(|port| port.trim().parse::<u16>().ok())
            .unwrap_or(defaults.port);
        Self { host, port }
    }

    /// "host:port" 形式的地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_addr() {
        assert_eq!(NetworkConfig::default().addr(), "127.0.0.1:9527");
    }

    #[test]
    fn test_overrides() {
        let config = NetworkConfig::from_lookup(|key| match key {
            HOST_ENV => Some("0.0.0.0".to_string()),
            PORT_ENV => Some("8080".to_string()),
            _ => None,
        });
        assert_eq!(config.addr(), "0.0.0.0:8080");

        let config = NetworkConfig::from_lookup(|key| match key {
            PORT_ENV => Some("not-a-port".to_string()),
            _ => None,
        });
        assert_eq!(config, NetworkConfig::default());
    }
}
