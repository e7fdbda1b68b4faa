//! Pipeline IO 循环模块
//!
//! 负责后台线程的通知接收、交给握手引擎处理、以及按调度时间发送命令。
//!
//! 两种运行方式：
//! - 单线程：[`io_loop`] 在同一线程内收发，接收超时会被缩短到下一条命令的到期时间
//! - 双线程：[`rx_loop`] 只负责接收和处理，[`tx_loop`] 独占发件箱并按时发送
//!
//! 无论哪种方式，接收路径都不会睡眠：结算延迟只体现在发件箱的调度时间上。

use crate::command::{CommandBuffer, Outbox, Scheduled};
use crate::context::SessionContext;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use measuremate_protocol::Command;
use measuremate_transport::{MatAdapter, RxAdapter, TransportError, TxAdapter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, error, trace, warn};

/// 发件箱为空时 TX 线程检查运行标志的间隔
const TX_IDLE_POLL: Duration = Duration::from_millis(10);

/// 单线程模式下接收超时的下限（避免忙等）
const MIN_RECEIVE_TIMEOUT: Duration = Duration::from_millis(1);

/// 处理一次上行通知
///
/// 解析失败的帧只记录日志并丢弃，不会改变状态，也不会产生命令。
/// 处理成功时触发渲染钩子，并返回需要发送的命令。
fn handle_notification(payload: &[u8], ctx: &SessionContext) -> Option<CommandBuffer> {
    ctx.metrics.rx_frames_total.fetch_add(1, Ordering::Relaxed);

    match ctx.process(payload, SystemTime::now()) {
        Ok(step) => {
            if let Some(snapshot) = &step.snapshot {
                ctx.render(snapshot);
            }
            Some(step.commands)
        },
        Err(e) => {
            ctx.metrics.rx_frames_dropped.fetch_add(1, Ordering::Relaxed);
            warn!("Dropping malformed frame ({} bytes): {}", payload.len(), e);
            None
        },
    }
}

/// 发送一条命令
///
/// 写入失败只记录日志，不会中断循环：设备端会在下一次测量时重新同步。
fn transmit(
    command: Command,
    ctx: &SessionContext,
    send: impl FnOnce(&[u8]) -> Result<(), TransportError>,
) {
    match send(command.as_bytes()) {
        Ok(()) => {
            ctx.metrics.tx_commands_sent.fetch_add(1, Ordering::Relaxed);
            debug!("Sent {}", command);
            ctx.notify_sent(command);
        },
        Err(e) => {
            ctx.metrics.tx_send_failures.fetch_add(1, Ordering::Relaxed);
            error!("Failed to send {}: {}", command, e);
        },
    }
}

/// 把一批命令放入发件箱（以当前时刻为触发时刻）
fn enqueue(outbox: &mut Outbox, commands: CommandBuffer, ctx: &SessionContext) {
    let triggered_at = Instant::now();
    for outbound in commands {
        ctx.metrics.tx_commands_queued.fetch_add(1, Ordering::Relaxed);
        outbox.push(outbound.schedule(triggered_at));
    }
}

/// 会话结束时丢弃待发送命令
fn cancel_pending(outbox: &mut Outbox, cmd_rx: &Receiver<Scheduled>, ctx: &SessionContext) {
    let mut cancelled = outbox.clear();
    cancelled += cmd_rx.try_iter().count();
    if cancelled > 0 {
        debug!("Cancelled {} pending commands", cancelled);
        ctx.metrics
            .tx_commands_cancelled
            .fetch_add(cancelled as u64, Ordering::Relaxed);
    }
}

/// 处理接收错误，返回是否应当退出
fn on_receive_error(e: TransportError, ctx: &SessionContext, is_running: &AtomicBool) -> bool {
    if let TransportError::Timeout = e {
        ctx.metrics.rx_timeouts.fetch_add(1, Ordering::Relaxed);
        return false;
    }

    error!("Receive error: {}", e);
    if e.is_fatal() {
        error!("Fatal transport error detected, setting is_running = false");
        is_running.store(false, Ordering::Release);
        return true;
    }
    false
}

/// IO 线程循环（单线程模式）
///
/// # 参数
/// - `adapter`: 双向适配器（在循环中独占）
/// - `cmd_rx`: 外部命令通道（调用方手动发送的命令）
/// - `ctx`: 共享状态上下文
/// - `receive_timeout`: 空闲时的接收超时
/// - `is_running`: 运行标志（用于生命周期联动）
///
/// 命令通道断开或出现致命传输错误时退出，未发送的命令被丢弃。
pub fn io_loop(
    mut adapter: impl MatAdapter,
    cmd_rx: Receiver<Scheduled>,
    ctx: Arc<SessionContext>,
    receive_timeout: Duration,
    is_running: Arc<AtomicBool>,
) {
    let mut outbox = Outbox::new();

    loop {
        if !is_running.load(Ordering::Acquire) {
            trace!("IO thread: is_running flag is false, exiting");
            break;
        }

        // 1. 收取外部命令
        let mut disconnected = false;
        loop {
            match cmd_rx.try_recv() {
                Ok(scheduled) => outbox.push(scheduled),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                },
            }
        }
        if disconnected {
            trace!("IO thread: command channel disconnected");
            break;
        }

        // 2. 发送所有已到期的命令（FIFO，队首未到期时后续命令等待）
        while let Some(command) = outbox.pop_due(Instant::now()) {
            transmit(command, &ctx, |bytes| adapter.send(bytes));
        }

        // 3. 接收，超时不超过下一条命令的到期时间
        let timeout = outbox
            .time_until_head(Instant::now())
            .map_or(receive_timeout, |until| until.min(receive_timeout))
            .max(MIN_RECEIVE_TIMEOUT);

        match adapter.receive_timeout(timeout) {
            Ok(payload) => {
                if let Some(commands) = handle_notification(&payload, &ctx) {
                    enqueue(&mut outbox, commands, &ctx);
                }
            },
            Err(e) => {
                if on_receive_error(e, &ctx, &is_running) {
                    break;
                }
            },
        }
    }

    cancel_pending(&mut outbox, &cmd_rx, &ctx);
    trace!("IO thread: loop exited");
}

/// RX 线程主循环
///
/// 专门负责接收通知、交给引擎处理，并把产生的命令（已换算为绝对时间）交给 TX 线程。
///
/// # 参数
/// - `rx`: RX 适配器（只读）
/// - `ctx`: 共享状态上下文
/// - `cmd_tx`: 发往 TX 线程的命令通道
/// - `is_running`: 运行标志（用于生命周期联动）
pub fn rx_loop(
    mut rx: impl RxAdapter,
    ctx: Arc<SessionContext>,
    cmd_tx: Sender<Scheduled>,
    is_running: Arc<AtomicBool>,
) {
    loop {
        // Acquire: If we see false, we must see all cleanup writes from other threads
        if !is_running.load(Ordering::Acquire) {
            trace!("RX thread: is_running flag is false, exiting");
            break;
        }

        let payload = match rx.receive() {
            Ok(payload) => payload,
            Err(e) => {
                if on_receive_error(e, &ctx, &is_running) {
                    break;
                }
                continue;
            },
        };

        let Some(commands) = handle_notification(&payload, &ctx) else {
            continue;
        };

        let triggered_at = Instant::now();
        for outbound in commands {
            ctx.metrics.tx_commands_queued.fetch_add(1, Ordering::Relaxed);
            if cmd_tx.send(outbound.schedule(triggered_at)).is_err() {
                error!("RX thread: TX thread is gone, setting is_running = false");
                is_running.store(false, Ordering::Release);
                break;
            }
        }
    }

    trace!("RX thread: loop exited");
}

/// TX 线程主循环
///
/// 独占发件箱：队首到期即发送，未到期时阻塞等待新命令或到期时刻。
///
/// # 参数
/// - `tx`: TX 适配器（只写）
/// - `cmd_rx`: 命令通道（来自 RX 线程和调用方）
/// - `ctx`: 共享状态上下文（指标、发送回调）
/// - `is_running`: 运行标志（用于生命周期联动）
pub fn tx_loop(
    mut tx: impl TxAdapter,
    cmd_rx: Receiver<Scheduled>,
    ctx: Arc<SessionContext>,
    is_running: Arc<AtomicBool>,
) {
    let mut outbox = Outbox::new();

    loop {
        if !is_running.load(Ordering::Acquire) {
            trace!("TX thread: is_running flag is false, exiting");
            break;
        }

        while let Some(command) = outbox.pop_due(Instant::now()) {
            transmit(command, &ctx, |bytes| tx.send(bytes));
        }

        let wait = outbox
            .time_until_head(Instant::now())
            .map_or(TX_IDLE_POLL, |until| until.min(TX_IDLE_POLL));

        match cmd_rx.recv_timeout(wait) {
            Ok(scheduled) => outbox.push(scheduled),
            Err(RecvTimeoutError::Timeout) => {},
            Err(RecvTimeoutError::Disconnected) => {
                trace!("TX thread: command channel disconnected");
                break;
            },
        }
    }

    cancel_pending(&mut outbox, &cmd_rx, &ctx);
    trace!("TX thread: loop exited");
}
