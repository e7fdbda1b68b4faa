//! 会话配置
//!
//! 纯数据（POD），可从 TOML 反序列化；运行时组件（回调等）不放在这里。

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 握手模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// 完整握手（BLE 二进制协议）：确认矩阵帧、结算后请求下一周期
    #[default]
    Acknowledged,
    /// 被动接收（UDP / 文本变体）：只更新状态，从不下发命令
    Passive,
}

/// 上行字节的解释方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    /// 每次通知是一个完整二进制帧（矩阵帧 211 字节 / 结果帧 10 字节）
    #[default]
    Binary,
    /// UDP 数据报，矩阵帧允许带一个末尾填充字节
    Datagram,
    /// 每次通知是一行文本，33 行构成一个块
    Text,
}

/// 会话配置
///
/// # Example
///
/// ```
/// use measuremate_driver::SessionConfig;
///
/// let config = SessionConfig::default();
/// assert_eq!(config.settle_delay_ms, 500);
/// assert_eq!(config.history_capacity, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 结果帧处理完毕到发送 START 之间的结算延迟（毫秒）
    pub settle_delay_ms: u64,
    /// 会话开始时 CONNECTED 与 START 之间的延迟（毫秒）
    pub connect_start_delay_ms: u64,
    /// 最近长度记录的容量
    pub history_capacity: usize,
    /// 接收超时（毫秒），超时是正常情况，只用于检查运行标志
    pub receive_timeout_ms: u64,
    pub mode: SessionMode,
    pub format: WireFormat,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 500,
            connect_start_delay_ms: 500,
            history_capacity: 10,
            receive_timeout_ms: 100,
            mode: SessionMode::Acknowledged,
            format: WireFormat::Binary,
        }
    }
}

impl SessionConfig {
    /// UDP / WiFi 变体的预设
    pub fn passive_datagram() -> Self {
        Self {
            mode: SessionMode::Passive,
            format: WireFormat::Datagram,
            ..Self::default()
        }
    }

    /// 文本块变体的预设
    pub fn passive_text() -> Self {
        Self {
            mode: SessionMode::Passive,
            format: WireFormat::Text,
            ..Self::default()
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn connect_start_delay(&self) -> Duration {
        Duration::from_millis(self.connect_start_delay_ms)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}
