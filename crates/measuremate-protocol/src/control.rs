//! 下行命令定义
//!
//! 主机写入设备的命令都是不带结束符的 ASCII 字符串。

use std::fmt;

/// 下行命令
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Command {
    /// 会话建立后发送一次
    Connected,
    /// 请求设备开始下一个测量周期
    Start,
    /// 确认收到矩阵帧，设备继续发送
    Approved,
    /// 拒绝确认（协议保留，握手流程中不主动发送）
    Disapproved,
}

impl Command {
    /// 全部命令
    pub const ALL: [Command; 4] = [
        Command::Connected,
        Command::Start,
        Command::Approved,
        Command::Disapproved,
    ];

    /// 线上 ASCII 载荷
    pub const fn as_bytes(self) -> &'static [u8] {
        match self {
            Command::Connected => b"CONNECTED",
            Command::Start => b"START",
            Command::Approved => b"APPROVED",
            Command::Disapproved => b"DISAPPROVED",
        }
    }

    /// 从载荷解析（精确匹配，不做大小写折叠）
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Self::ALL.into_iter().find(|cmd| cmd.as_bytes() == bytes)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // as_bytes 恒为 ASCII
        f.write_str(std::str::from_utf8(self.as_bytes()).unwrap_or("?"))
    }
}
