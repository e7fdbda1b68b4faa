//! CLI 配置文件
//!
//! TOML 格式，包含 `[session]`（会话参数）和 `[udp]`（监听地址）两节。
//! 文件不存在时使用默认值；命令行参数覆盖文件中的值。
//!
//! ```toml
//! [session]
//! settle_delay_ms = 500
//! history_capacity = 10
//! mode = "passive"
//! format = "datagram"
//!
//! [udp]
//! bind = "0.0.0.0:4210"
//! max_datagram = 256
//! # 完整握手模式必须指定设备地址
//! # peer = "192.168.4.1:4210"
//! ```

use anyhow::{Context, Result, anyhow};
use measuremate_driver::SessionConfig;
use measuremate_transport::udp::{DEFAULT_MAX_DATAGRAM, DEFAULT_UDP_PORT};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};

/// 默认配置文件路径：`<系统配置目录>/measuremate/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("measuremate").join("config.toml"))
}

/// UDP 监听配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UdpConfig {
    pub bind: String,
    pub max_datagram: usize,
    /// 设备地址（为空时从第一个收到的数据报学习）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer: Option<String>,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            bind: format!("0.0.0.0:{DEFAULT_UDP_PORT}"),
            max_datagram: DEFAULT_MAX_DATAGRAM,
            peer: None,
        }
    }
}

impl UdpConfig {
    /// 解析设备地址（支持主机名）
    pub fn peer_addr(&self) -> Result<Option<SocketAddr>> {
        let Some(peer) = &self.peer else {
            return Ok(None);
        };
        let addr = peer
            .to_socket_addrs()
            .with_context(|| format!("无效的设备地址: {peer}"))?
            .next()
            .ok_or_else(|| anyhow!("无法解析设备地址: {peer}"))?;
        Ok(Some(addr))
    }
}

/// CLI 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub session: SessionConfig,
    pub udp: UdpConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            // CLI 的传输层是 UDP
            session: SessionConfig::passive_datagram(),
            udp: UdpConfig::default(),
        }
    }
}

impl CliConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("解析配置文件失败")
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置失败")
    }

    /// 加载配置
    ///
    /// - 显式指定的路径必须存在
    /// - 未指定时尝试默认路径，不存在则使用默认值
    ///
    /// 返回配置和实际读取的文件路径（使用默认值时为 None）。
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            let content = fs::read_to_string(path)
                .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
            return Ok((Self::from_toml(&content)?, Some(path.to_path_buf())));
        }

        match default_config_path() {
            Some(path) if path.exists() => {
                let content = fs::read_to_string(&path)
                    .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
                Ok((Self::from_toml(&content)?, Some(path)))
            },
            _ => Ok((Self::default(), None)),
        }
    }
}
