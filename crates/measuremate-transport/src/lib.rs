//! # MeasureMates Transport Layer
//!
//! 字节传输抽象层，屏蔽 BLE 通知 / UDP 数据报的差异。
//!
//! 上层（driver）只关心两件事：
//! - 收到一段字节（一次通知或一个数据报，即一帧）
//! - 把一条命令的字节写回设备
//!
//! 设备发现、连接与重连由具体适配器或调用方负责。

use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

#[cfg(feature = "udp")]
pub mod udp;

#[cfg(feature = "udp")]
pub use udp::{UdpMatAdapter, UdpRxAdapter, UdpTxAdapter};

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockAdapter, MockDevice};

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Read timeout")]
    Timeout,
    #[error("Device disconnected")]
    Disconnected,
    #[error("No peer address known yet")]
    NoPeer,
}

impl TransportError {
    /// 是否为致命错误（接收循环应当退出）
    pub fn is_fatal(&self) -> bool {
        match self {
            TransportError::Disconnected => true,
            TransportError::Io(e) => !matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
            ),
            TransportError::Timeout | TransportError::NoPeer => false,
        }
    }
}

/// 双向字节传输适配器
///
/// 一次 `receive` 返回一个完整的帧（BLE 通知或 UDP 数据报），适配器不做拆包。
pub trait MatAdapter {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;
    fn receive(&mut self) -> Result<Bytes, TransportError>;
    fn set_receive_timeout(&mut self, _timeout: Duration) {}
    fn receive_timeout(&mut self, timeout: Duration) -> Result<Bytes, TransportError> {
        self.set_receive_timeout(timeout);
        self.receive()
    }
    fn try_receive(&mut self) -> Result<Option<Bytes>, TransportError> {
        match self.receive_timeout(Duration::ZERO) {
            Ok(payload) => Ok(Some(payload)),
            Err(TransportError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

pub trait RxAdapter {
    fn receive(&mut self) -> Result<Bytes, TransportError>;
}

pub trait TxAdapter {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;
}

/// 可分离为独立收发两端的适配器（用于 RX/TX 双线程）
pub trait SplittableAdapter: MatAdapter {
    type RxAdapter: RxAdapter;
    type TxAdapter: TxAdapter;
    fn split(self) -> Result<(Self::RxAdapter, Self::TxAdapter), TransportError>;
}
