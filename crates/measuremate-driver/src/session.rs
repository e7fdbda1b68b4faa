//! 会话 API 模块
//!
//! 提供对外的 `Session` 结构体，封装后台 IO 线程和状态同步细节。

use crate::command::Scheduled;
use crate::config::SessionConfig;
use crate::context::SessionContext;
use crate::error::DriverError;
use crate::hooks::SnapshotSink;
use crate::metrics::MetricsSnapshot;
use crate::pipeline::{io_loop, rx_loop, tx_loop};
use crate::state::MeasurementSnapshot;
use crossbeam_channel::Sender;
use measuremate_protocol::Command;
use measuremate_transport::{MatAdapter, SplittableAdapter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::{Duration, Instant};
use tracing::{error, info};

/// 命令通道容量
const COMMAND_QUEUE_CAPACITY: usize = 16;

/// Extension trait for timeout-capable thread joins
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();

        // Watchdog thread joins the target so we can wait with a deadline
        spawn(move || {
            let result = self.join();
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// 一次测量会话（对外 API）
///
/// 创建即开始：完整握手模式下立即发送 CONNECTED，随后发送 START。
/// Drop 时停止后台线程，未发送的命令被丢弃。
///
/// 支持单线程和双线程两种模式
/// - 单线程模式：使用 `io_thread`
/// - 双线程模式：使用 `rx_thread` 和 `tx_thread`（接收不受发送阻塞影响）
pub struct Session {
    /// 命令发送通道
    ///
    /// Drop 时必须先关闭通道再 join 线程，否则循环收不到 `Disconnected`。
    cmd_tx: Option<Sender<Scheduled>>,
    ctx: Arc<SessionContext>,
    io_thread: Option<JoinHandle<()>>,
    rx_thread: Option<JoinHandle<()>>,
    tx_thread: Option<JoinHandle<()>>,
    is_running: Arc<AtomicBool>,
}

impl Session {
    /// 单线程模式
    ///
    /// # 参数
    /// - `adapter`: 双向适配器（会被移动到 IO 线程）
    /// - `config`: 会话配置
    pub fn new(adapter: impl MatAdapter + Send + 'static, config: &SessionConfig) -> Self {
        Self::with_sinks(adapter, config, Vec::new())
    }

    pub(crate) fn with_sinks(
        adapter: impl MatAdapter + Send + 'static,
        config: &SessionConfig,
        sinks: Vec<Arc<dyn SnapshotSink>>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = crossbeam_channel::bounded(COMMAND_QUEUE_CAPACITY);
        let ctx = Arc::new(SessionContext::with_sinks(config, sinks));
        let is_running = Arc::new(AtomicBool::new(true));

        let mut session = Self {
            cmd_tx: Some(cmd_tx),
            ctx: ctx.clone(),
            io_thread: None,
            rx_thread: None,
            tx_thread: None,
            is_running: is_running.clone(),
        };
        session.schedule_start();

        let receive_timeout = config.receive_timeout();
        session.io_thread = Some(spawn(move || {
            io_loop(adapter, cmd_rx, ctx, receive_timeout, is_running);
        }));

        info!("Session started ({:?}, single thread)", config.mode);
        session
    }

    /// 双线程模式
    ///
    /// 将适配器分离为独立的 RX 和 TX 两端，接收线程永远不会因发送或延迟而阻塞。
    ///
    /// # 错误
    /// - `DriverError::Transport`: 分离适配器失败
    pub fn new_dual_thread<A>(adapter: A, config: &SessionConfig) -> Result<Self, DriverError>
    where
        A: SplittableAdapter + Send + 'static,
        A::RxAdapter: Send + 'static,
        A::TxAdapter: Send + 'static,
    {
        Self::dual_thread_with_sinks(adapter, config, Vec::new())
    }

    pub(crate) fn dual_thread_with_sinks<A>(
        mut adapter: A,
        config: &SessionConfig,
        sinks: Vec<Arc<dyn SnapshotSink>>,
    ) -> Result<Self, DriverError>
    where
        A: SplittableAdapter + Send + 'static,
        A::RxAdapter: Send + 'static,
        A::TxAdapter: Send + 'static,
    {
        adapter.set_receive_timeout(config.receive_timeout());
        let (rx_adapter, tx_adapter) = adapter.split()?;

        let (cmd_tx, cmd_rx) = crossbeam_channel::bounded(COMMAND_QUEUE_CAPACITY);
        let ctx = Arc::new(SessionContext::with_sinks(config, sinks));
        let is_running = Arc::new(AtomicBool::new(true));

        let mut session = Self {
            cmd_tx: Some(cmd_tx.clone()),
            ctx: ctx.clone(),
            io_thread: None,
            rx_thread: None,
            tx_thread: None,
            is_running: is_running.clone(),
        };
        session.schedule_start();

        let ctx_rx = ctx.clone();
        let is_running_rx = is_running.clone();
        session.rx_thread = Some(spawn(move || {
            rx_loop(rx_adapter, ctx_rx, cmd_tx, is_running_rx);
        }));

        session.tx_thread = Some(spawn(move || {
            tx_loop(tx_adapter, cmd_rx, ctx, is_running);
        }));

        info!("Session started ({:?}, dual thread)", config.mode);
        Ok(session)
    }

    /// 把会话开始的命令放入通道（此时线程尚未启动，通道必有空位）
    fn schedule_start(&self) {
        let step = self.ctx.start();
        let Some(cmd_tx) = &self.cmd_tx else {
            return;
        };
        let triggered_at = Instant::now();
        for outbound in step.commands {
            self.ctx
                .metrics
                .tx_commands_queued
                .fetch_add(1, Ordering::Relaxed);
            if cmd_tx.try_send(outbound.schedule(triggered_at)).is_err() {
                error!("Failed to queue session start command {}", outbound.command);
            }
        }
    }

    /// 当前状态快照（副本）
    pub fn snapshot(&self) -> MeasurementSnapshot {
        self.ctx.latest().as_ref().clone()
    }

    /// 当前状态快照（共享，无锁）
    pub fn latest_snapshot(&self) -> Arc<MeasurementSnapshot> {
        self.ctx.latest()
    }

    /// 获取性能指标快照
    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    /// 后台线程是否仍在运行（致命传输错误后变为 `false`）
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// 手动发送一条命令（立即排队，仍遵守 FIFO 顺序）
    ///
    /// # 错误
    /// - `DriverError::NotRunning`: 会话已停止
    /// - `DriverError::ChannelClosed`: IO 线程已退出
    pub fn send_command(&self, command: Command) -> Result<(), DriverError> {
        if !self.is_running() {
            return Err(DriverError::NotRunning);
        }
        let cmd_tx = self.cmd_tx.as_ref().ok_or(DriverError::ChannelClosed)?;
        cmd_tx
            .send(Scheduled {
                command,
                not_before: Instant::now(),
            })
            .map_err(|_| DriverError::ChannelClosed)?;
        self.ctx
            .metrics
            .tx_commands_queued
            .fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// 注册展示层钩子
    pub fn add_sink(&self, sink: Arc<dyn SnapshotSink>) {
        self.ctx.add_sink(sink);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Release: All writes before this are visible to threads that see the false value
        self.is_running.store(false, Ordering::Release);

        // 先关闭命令通道，再 join 线程
        drop(self.cmd_tx.take());

        let join_timeout = Duration::from_secs(2);

        if let Some(handle) = self.rx_thread.take()
            && handle.join_timeout(join_timeout).is_err()
        {
            error!(
                "RX thread panicked or failed to shut down within {:?}",
                join_timeout
            );
        }

        if let Some(handle) = self.tx_thread.take()
            && handle.join_timeout(join_timeout).is_err()
        {
            error!(
                "TX thread panicked or failed to shut down within {:?}",
                join_timeout
            );
        }

        if let Some(handle) = self.io_thread.take()
            && handle.join_timeout(join_timeout).is_err()
        {
            error!(
                "IO thread panicked or failed to shut down within {:?}",
                join_timeout
            );
        }
    }
}
