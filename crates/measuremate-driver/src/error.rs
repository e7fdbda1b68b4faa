//! 驱动层错误类型定义

use measuremate_protocol::DecodeError;
use measuremate_transport::TransportError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 传输层错误
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// 帧解析错误
    ///
    /// 会话线程内的解析失败只计数并丢弃，不会以此返回；
    /// 供直接驱动 [`HandshakeEngine`](crate::HandshakeEngine) 的调用方用 `?` 汇总错误。
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// 命令通道已关闭（TX 线程退出）
    #[error("Command channel closed")]
    ChannelClosed,

    /// 会话已停止
    #[error("Session is not running")]
    NotRunning,
}
