//! Mock 适配器
//!
//! 用于测试的模拟设备：测试代码通过 [`MockDevice`] 注入上行帧、读取下行命令，
//! 驱动层通过 [`MockAdapter`]（或其拆分后的两端）收发。

use crate::{MatAdapter, RxAdapter, SplittableAdapter, TransportError, TxAdapter};
use bytes::Bytes;
use measuremate_protocol::Command;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Default)]
struct Queues {
    inbound: VecDeque<Bytes>,
    outbound: Vec<(Instant, Vec<u8>)>,
}

#[derive(Default)]
struct Shared {
    queues: Mutex<Queues>,
    inbound_ready: Condvar,
    disconnected: AtomicBool,
    fail_sends: AtomicBool,
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, Queues> {
        self.queues.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn receive(&self, timeout: Duration) -> Result<Bytes, TransportError> {
        let mut queues = self.lock();
        if queues.inbound.is_empty() && !timeout.is_zero() {
            queues = self
                .inbound_ready
                .wait_timeout(queues, timeout)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
        if let Some(payload) = queues.inbound.pop_front() {
            return Ok(payload);
        }
        if self.disconnected.load(Ordering::Acquire) {
            return Err(TransportError::Disconnected);
        }
        Err(TransportError::Timeout)
    }

    fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        if self.disconnected.load(Ordering::Acquire) {
            return Err(TransportError::Disconnected);
        }
        if self.fail_sends.load(Ordering::Acquire) {
            return Err(TransportError::Io(std::io::Error::other("mock send failure")));
        }
        self.lock().outbound.push((Instant::now(), payload.to_vec()));
        Ok(())
    }
}

/// 模拟设备端句柄
#[derive(Clone, Default)]
pub struct MockDevice {
    shared: Arc<Shared>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建连接到本设备的适配器
    pub fn adapter(&self) -> MockAdapter {
        MockAdapter {
            shared: self.shared.clone(),
            timeout: Duration::from_millis(10),
        }
    }

    /// 注入一条上行通知
    pub fn notify(&self, payload: impl AsRef<[u8]>) {
        self.shared
            .lock()
            .inbound
            .push_back(Bytes::copy_from_slice(payload.as_ref()));
        self.shared.inbound_ready.notify_all();
    }

    /// 模拟断开（接收端返回 `Disconnected`）
    pub fn disconnect(&self) {
        self.shared.disconnected.store(true, Ordering::Release);
        self.shared.inbound_ready.notify_all();
    }

    /// 令后续发送失败
    pub fn set_fail_sends(&self, fail: bool) {
        self.shared.fail_sends.store(fail, Ordering::Release);
    }

    /// 已写入设备的原始载荷
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.shared
            .lock()
            .outbound
            .iter()
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// 已写入设备的命令（无法识别的载荷被忽略）
    pub fn commands(&self) -> Vec<Command> {
        self.written()
            .iter()
            .filter_map(|payload| Command::from_bytes(payload))
            .collect()
    }

    /// 已写入设备的命令及写入时刻
    pub fn timed_commands(&self) -> Vec<(Instant, Command)> {
        self.shared
            .lock()
            .outbound
            .iter()
            .filter_map(|(at, payload)| Command::from_bytes(payload).map(|cmd| (*at, cmd)))
            .collect()
    }

    /// 尚未被读取的上行通知数量
    pub fn pending_inbound(&self) -> usize {
        self.shared.lock().inbound.len()
    }
}

/// 模拟适配器（主机端）
pub struct MockAdapter {
    shared: Arc<Shared>,
    timeout: Duration,
}

impl MatAdapter for MockAdapter {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        self.shared.send(payload)
    }

    fn receive(&mut self) -> Result<Bytes, TransportError> {
        self.shared.receive(self.timeout)
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }
}

pub struct MockRxAdapter {
    shared: Arc<Shared>,
    timeout: Duration,
}

impl RxAdapter for MockRxAdapter {
    fn receive(&mut self) -> Result<Bytes, TransportError> {
        self.shared.receive(self.timeout)
    }
}

pub struct MockTxAdapter {
    shared: Arc<Shared>,
}

impl TxAdapter for MockTxAdapter {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        self.shared.send(payload)
    }
}

impl SplittableAdapter for MockAdapter {
    type RxAdapter = MockRxAdapter;
    type TxAdapter = MockTxAdapter;

    fn split(self) -> Result<(Self::RxAdapter, Self::TxAdapter), TransportError> {
        Ok((
            MockRxAdapter {
                shared: self.shared.clone(),
                timeout: self.timeout,
            },
            MockTxAdapter {
                shared: self.shared,
            },
        ))
    }
}
