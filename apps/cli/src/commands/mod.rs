//! 命令定义和实现

pub mod config;
pub mod decode;
pub mod listen;
pub mod replay;

pub use config::ConfigCommand;
pub use decode::DecodeCommand;
pub use listen::ListenCommand;
pub use replay::ReplayCommand;

use clap::ValueEnum;
use measuremate_driver::{SessionConfig, SessionMode, WireFormat};

/// 握手模式（命令行）
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// 完整握手：确认矩阵帧，结算后请求下一周期
    Acknowledged,
    /// 只接收，不下发命令
    Passive,
}

impl From<ModeArg> for SessionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Acknowledged => SessionMode::Acknowledged,
            ModeArg::Passive => SessionMode::Passive,
        }
    }
}

/// 上行字节格式（命令行）
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Binary,
    Datagram,
    Text,
}

impl From<FormatArg> for WireFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Binary => WireFormat::Binary,
            FormatArg::Datagram => WireFormat::Datagram,
            FormatArg::Text => WireFormat::Text,
        }
    }
}

/// 用命令行参数覆盖配置文件中的会话参数
pub fn apply_overrides(
    config: &mut SessionConfig,
    mode: Option<ModeArg>,
    format: Option<FormatArg>,
) {
    if let Some(mode) = mode {
        config.mode = mode.into();
    }
    if let Some(format) = format {
        config.format = format.into();
    }
}
