//! 下行命令调度
//!
//! 握手引擎只描述“发什么、至少等多久”（[`Outbound`]），不做任何等待；
//! 真正的延迟由 TX 侧的 [`Outbox`] 以 FIFO 方式执行：
//! 队首未到期时，后面的命令一律排队，保证发送顺序与触发顺序一致。

use measuremate_protocol::Command;
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// 一次状态转移产生的命令
///
/// 单次转移最多产生 2 条命令（会话开始：CONNECTED + START），栈上预留 2 个位置。
pub type CommandBuffer = SmallVec<[Outbound; 2]>;

/// 待发送命令（相对延迟）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outbound {
    pub command: Command,
    /// 从触发时刻起至少等待的时长
    pub delay: Duration,
}

impl Outbound {
    /// 立即发送
    #[inline]
    pub fn now(command: Command) -> Self {
        Self {
            command,
            delay: Duration::ZERO,
        }
    }

    /// 延迟发送
    #[inline]
    pub fn after(command: Command, delay: Duration) -> Self {
        Self { command, delay }
    }

    /// 以触发时刻为基准换算为绝对时间
    #[inline]
    pub fn schedule(self, triggered_at: Instant) -> Scheduled {
        Scheduled {
            command: self.command,
            not_before: triggered_at + self.delay,
        }
    }
}

/// 待发送命令（绝对时间）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduled {
    pub command: Command,
    pub not_before: Instant,
}

/// FIFO 发件箱
#[derive(Debug, Default)]
pub struct Outbox {
    queue: VecDeque<Scheduled>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, scheduled: Scheduled) {
        self.queue.push_back(scheduled);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// 取出已到期的队首命令
    pub fn pop_due(&mut self, now: Instant) -> Option<Command> {
        match self.queue.front() {
            Some(head) if head.not_before <= now => self.queue.pop_front().map(|s| s.command),
            _ => None,
        }
    }

    /// 距队首到期的时长（空队列返回 None，已到期返回 ZERO）
    pub fn time_until_head(&self, now: Instant) -> Option<Duration> {
        self.queue
            .front()
            .map(|head| head.not_before.saturating_duration_since(now))
    }

    /// 丢弃全部待发送命令（会话结束时调用）
    pub fn clear(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_schedule() {
        let t0 = Instant::now();
        let s = Outbound::after(Command::Start, Duration::from_millis(500)).schedule(t0);
        assert_eq!(s.command, Command::Start);
        assert_eq!(s.not_before, t0 + Duration::from_millis(500));

        let s = Outbound::now(Command::Approved).schedule(t0);
        assert_eq!(s.not_before, t0);
    }

    #[test]
    fn test_pop_due_respects_delay() {
        let t0 = Instant::now();
        let mut outbox = Outbox::new();
        outbox.push(Outbound::after(Command::Start, Duration::from_millis(500)).schedule(t0));

        assert_eq!(outbox.pop_due(t0), None);
        assert_eq!(
            outbox.time_until_head(t0),
            Some(Duration::from_millis(500))
        );
        assert_eq!(
            outbox.pop_due(t0 + Duration::from_millis(500)),
            Some(Command::Start)
        );
        assert!(outbox.is_empty());
        assert_eq!(outbox.time_until_head(t0), None);
    }

    #[test]
    fn test_fifo_blocks_behind_pending_head() {
        let t0 = Instant::now();
        let mut outbox = Outbox::new();
        outbox.push(Outbound::after(Command::Start, Duration::from_millis(500)).schedule(t0));
        outbox.push(Outbound::now(Command::Approved).schedule(t0 + Duration::from_millis(10)));

        // APPROVED 已到期，但必须排在 START 之后
        assert_eq!(outbox.pop_due(t0 + Duration::from_millis(20)), None);

        let later = t0 + Duration::from_millis(600);
        assert_eq!(outbox.pop_due(later), Some(Command::Start));
        assert_eq!(outbox.pop_due(later), Some(Command::Approved));
    }

    #[test]
    fn test_clear() {
        let t0 = Instant::now();
        let mut outbox = Outbox::new();
        outbox.push(Outbound::now(Command::Connected).schedule(t0));
        outbox.push(Outbound::now(Command::Start).schedule(t0));
        assert_eq!(outbox.clear(), 2);
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_command_buffer_inline() {
        let mut buffer = CommandBuffer::new();
        buffer.push(Outbound::now(Command::Connected));
        buffer.push(Outbound::after(Command::Start, Duration::from_millis(500)));
        assert!(!buffer.spilled());
    }
}
