//! Builder 模式实现
//!
//! 提供链式构造 `Session` 实例的便捷方式。

use crate::config::{SessionConfig, SessionMode, WireFormat};
use crate::error::DriverError;
use crate::hooks::SnapshotSink;
use crate::session::Session;
use measuremate_transport::{MatAdapter, SplittableAdapter};
use std::sync::Arc;
use std::time::Duration;

/// Session Builder（链式构造）
///
/// # Example
///
/// ```
/// use measuremate_driver::{SessionBuilder, SessionMode};
/// use std::time::Duration;
///
/// let builder = SessionBuilder::new()
///     .mode(SessionMode::Acknowledged)
///     .settle_delay(Duration::from_millis(300))
///     .history_capacity(20);
/// assert_eq!(builder.config().settle_delay_ms, 300);
/// assert_eq!(builder.config().history_capacity, 20);
/// ```
#[derive(Default)]
pub struct SessionBuilder {
    config: SessionConfig,
    sinks: Vec<Arc<dyn SnapshotSink>>,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 整体替换会话配置（通常来自配置文件）
    pub fn config_from(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn mode(mut self, mode: SessionMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn format(mut self, format: WireFormat) -> Self {
        self.config.format = format;
        self
    }

    /// 结果帧之后到发送 START 的延迟（默认 500ms）
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.config.settle_delay_ms = duration_ms(delay);
        self
    }

    /// 会话开始时 CONNECTED 与 START 之间的延迟（默认 500ms）
    pub fn connect_start_delay(mut self, delay: Duration) -> Self {
        self.config.connect_start_delay_ms = duration_ms(delay);
        self
    }

    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.config.history_capacity = capacity;
        self
    }

    /// 空闲时的接收超时（影响停止会话的响应速度）
    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.config.receive_timeout_ms = duration_ms(timeout);
        self
    }

    /// 注册展示层钩子（会话开始前注册，第一帧也会被渲染）
    pub fn sink(mut self, sink: Arc<dyn SnapshotSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// 单线程模式构建
    pub fn build(self, adapter: impl MatAdapter + Send + 'static) -> Session {
        Session::with_sinks(adapter, &self.config, self.sinks)
    }

    /// 双线程模式构建
    ///
    /// # 错误
    /// - `DriverError::Transport`: 分离适配器失败
    pub fn build_dual_thread<A>(self, adapter: A) -> Result<Session, DriverError>
    where
        A: SplittableAdapter + Send + 'static,
        A::RxAdapter: Send + 'static,
        A::TxAdapter: Send + 'static,
    {
        Session::dual_thread_with_sinks(adapter, &self.config, self.sinks)
    }

    /// 绑定本地 UDP 端口并以双线程模式构建
    ///
    /// `peer` 为空时设备地址从第一个收到的数据报学习。完整握手模式由主机先发
    /// CONNECTED / START，设备在此之前不会发送数据，因此必须指定 `peer`。
    ///
    /// # 错误
    /// - `DriverError::Transport(TransportError::NoPeer)`: 完整握手模式未指定设备地址
    /// - `DriverError::Transport`: 绑定端口失败
    #[cfg(feature = "udp")]
    pub fn build_udp(
        self,
        bind_addr: impl std::net::ToSocketAddrs,
        max_datagram: usize,
        peer: Option<std::net::SocketAddr>,
    ) -> Result<Session, DriverError> {
        if self.config.mode == SessionMode::Acknowledged && peer.is_none() {
            return Err(measuremate_transport::TransportError::NoPeer.into());
        }

        let mut adapter = measuremate_transport::UdpMatAdapter::bind(bind_addr, max_datagram)?;
        if let Some(peer) = peer {
            adapter = adapter.with_peer(peer);
        }
        if let Ok(addr) = adapter.local_addr() {
            tracing::info!(
                "Listening for mat datagrams on {} (peer: {:?})",
                addr,
                adapter.peer()
            );
        }
        self.build_dual_thread(adapter)
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
