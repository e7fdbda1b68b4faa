//! 展示层钩子
//!
//! 每处理成功一帧，RX 线程把新快照交给所有已注册的 [`SnapshotSink`]。
//! 渲染（绘图、终端输出）通常很慢，不应在 RX 线程里直接做：
//! 推荐使用 [`ChannelSink`] 把快照转交给渲染线程。
//!
//! # 使用示例
//!
//! ```rust
//! use measuremate_driver::hooks::{ChannelSink, SinkManager, SnapshotSink};
//! use measuremate_driver::MeasurementSnapshot;
//! use std::sync::Arc;
//!
//! let mut sinks = SinkManager::new();
//! let (sink, rx) = ChannelSink::new(8);
//! sinks.add_sink(Arc::new(sink) as Arc<dyn SnapshotSink>);
//!
//! sinks.render_all(&MeasurementSnapshot::default());
//! assert!(rx.try_recv().is_ok());
//! ```

use crate::state::MeasurementSnapshot;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use measuremate_protocol::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// 快照接收端
///
/// # 性能要求
///
/// 在 RX 线程中同步调用，必须非阻塞（禁止 IO、长时间持锁）。
pub trait SnapshotSink: Send + Sync {
    /// 每处理成功一帧调用一次
    fn render(&self, snapshot: &MeasurementSnapshot);

    /// 命令成功写入设备后调用（可选，在 TX 线程中调用）
    fn on_command_sent(&self, command: Command) {
        let _ = command;
    }
}

/// 钩子管理器
///
/// 本身不是线程安全的；会话中以 `ArcSwap<SinkManager>` 发布，注册时整体替换。
#[derive(Clone, Default)]
pub struct SinkManager {
    sinks: Vec<Arc<dyn SnapshotSink>>,
}

impl SinkManager {
    #[must_use]
    pub const fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add_sink(&mut self, sink: Arc<dyn SnapshotSink>) {
        self.sinks.push(sink);
    }

    pub fn clear(&mut self) {
        self.sinks.clear();
    }

    /// 触发所有渲染回调（在 rx_loop 中调用）
    pub fn render_all(&self, snapshot: &MeasurementSnapshot) {
        for sink in self.sinks.iter() {
            sink.render(snapshot);
        }
    }

    /// 触发所有发送回调（在 tx_loop 发送成功后调用）
    pub fn notify_sent(&self, command: Command) {
        for sink in self.sinks.iter() {
            sink.on_command_sent(command);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

/// 通过有界通道转发快照的钩子
///
/// 通道满时丢弃新快照（展示层只关心最新状态，下一帧会再次到来），并计数。
pub struct ChannelSink {
    tx: Sender<MeasurementSnapshot>,
    dropped: AtomicU64,
}

impl ChannelSink {
    /// 创建钩子和对应的接收端
    pub fn new(capacity: usize) -> (Self, Receiver<MeasurementSnapshot>) {
        let (tx, rx) = bounded(capacity.max(1));
        (
            Self {
                tx,
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }

    /// 因通道满而丢弃的快照数
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl SnapshotSink for ChannelSink {
    fn render(&self, snapshot: &MeasurementSnapshot) {
        match self.tx.try_send(snapshot.clone()) {
            Ok(()) => {},
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            },
            // 接收端已退出，静默忽略
            Err(TrySendError::Disconnected(_)) => {},
        }
    }
}
