//! 驱动指标
//!
//! 原子计数器，可在任何线程读取，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 驱动实时指标
///
/// # 使用示例
///
/// ```rust
/// use measuremate_driver::DriverMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = DriverMetrics::new();
/// metrics.rx_frames_total.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().rx_frames_total, 1);
/// ```
#[derive(Debug, Default)]
pub struct DriverMetrics {
    /// 收到的通知 / 数据报总数
    pub rx_frames_total: AtomicU64,
    /// 解析成功并被引擎处理的帧数
    pub rx_frames_decoded: AtomicU64,
    /// 解析失败被丢弃的帧数
    pub rx_frames_dropped: AtomicU64,
    /// RX 超时次数（正常现象，无数据时会超时）
    pub rx_timeouts: AtomicU64,
    /// 进入发件箱的命令数
    pub tx_commands_queued: AtomicU64,
    /// 成功写入设备的命令数
    pub tx_commands_sent: AtomicU64,
    /// 写入失败次数
    pub tx_send_failures: AtomicU64,
    /// 会话结束时被取消的待发送命令数
    pub tx_commands_cancelled: AtomicU64,
}

impl DriverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rx_frames_total: self.rx_frames_total.load(Ordering::Relaxed),
            rx_frames_decoded: self.rx_frames_decoded.load(Ordering::Relaxed),
            rx_frames_dropped: self.rx_frames_dropped.load(Ordering::Relaxed),
            rx_timeouts: self.rx_timeouts.load(Ordering::Relaxed),
            tx_commands_queued: self.tx_commands_queued.load(Ordering::Relaxed),
            tx_commands_sent: self.tx_commands_sent.load(Ordering::Relaxed),
            tx_send_failures: self.tx_send_failures.load(Ordering::Relaxed),
            tx_commands_cancelled: self.tx_commands_cancelled.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照（不可变）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub rx_frames_total: u64,
    pub rx_frames_decoded: u64,
    pub rx_frames_dropped: u64,
    pub rx_timeouts: u64,
    pub tx_commands_queued: u64,
    pub tx_commands_sent: u64,
    pub tx_send_failures: u64,
    pub tx_commands_cancelled: u64,
}

impl MetricsSnapshot {
    /// 丢帧率（百分比），未收到任何帧时为 0
    pub fn drop_rate(&self) -> f64 {
        if self.rx_frames_total == 0 {
            return 0.0;
        }
        (self.rx_frames_dropped as f64 / self.rx_frames_total as f64) * 100.0
    }
}
