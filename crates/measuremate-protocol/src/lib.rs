//! # MeasureMates Protocol
//!
//! 压力垫设备协议定义（无 IO 依赖）
//!
//! ## 模块
//!
//! - `constants`: 判别字节、帧长度、矩阵尺寸等协议常量
//! - `feedback`: 设备上行帧（矩阵帧 / 结果帧）解析
//! - `text`: 文本块变体（33 行）解析与逐行组装
//! - `control`: 下行命令（`CONNECTED`/`START`/`APPROVED`/`DISAPPROVED`）
//!
//! ## 字节序
//!
//! 矩阵帧的压力值使用大端 u16，结果帧的浮点数使用小端 f32。
//! 两者混用是设备固件决定的，本模块提供对应的转换工具函数。

pub mod constants;
pub mod control;
pub mod feedback;
pub mod text;

// 重新导出常用类型
pub use constants::*;
pub use control::Command;
pub use feedback::*;
pub use text::{TextBlockAssembler, TextFrame, decode_text_block};

use thiserror::Error;

/// 帧解析错误类型
///
/// 所有解析错误都由调用方在本地恢复（丢弃该帧），不会向上传播为致命错误。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    BadLength { expected: usize, actual: usize },

    #[error("Unknown discriminator byte: 0x{0:02X}")]
    UnknownDiscriminator(u8),

    #[error("Bad discriminator byte: expected 0x{expected:02X}, got 0x{actual:02X}")]
    BadDiscriminator { expected: u8, actual: u8 },

    #[error("Malformed text block: {0}")]
    MalformedBlock(String),
}

/// 大端字节序转 u16
pub fn bytes_to_u16_be(bytes: [u8; 2]) -> u16 {
    u16::from_be_bytes(bytes)
}

/// u16 转大端字节序
pub fn u16_to_bytes_be(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

/// 小端字节序转 f32
pub fn bytes_to_f32_le(bytes: [u8; 4]) -> f32 {
    f32::from_le_bytes(bytes)
}

/// f32 转小端字节序
pub fn f32_to_bytes_le(value: f32) -> [u8; 4] {
    value.to_le_bytes()
}
