//! 共享状态上下文
//!
//! IO 线程与调用方之间共享的全部状态：
//! - 握手引擎（`Mutex`，只有 IO 线程写入）
//! - 最新快照（`ArcSwap`，读取无锁）
//! - 展示层钩子（`ArcSwap`，注册时复制后整体替换，IO 线程读取无锁且不会漏掉渲染）
//! - 指标（原子计数器）

use crate::config::SessionConfig;
use crate::engine::{HandshakeEngine, Step};
use crate::hooks::{SinkManager, SnapshotSink};
use crate::metrics::DriverMetrics;
use crate::state::MeasurementSnapshot;
use arc_swap::ArcSwap;
use measuremate_protocol::{Command, DecodeError};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

pub struct SessionContext {
    engine: Mutex<HandshakeEngine>,
    latest: ArcSwap<MeasurementSnapshot>,
    sinks: ArcSwap<SinkManager>,
    pub metrics: Arc<DriverMetrics>,
}

impl SessionContext {
    pub fn new(config: &SessionConfig) -> Self {
        Self::with_sinks(config, Vec::new())
    }

    /// 创建上下文并预先注册钩子（保证第一帧也会被渲染）
    pub fn with_sinks(config: &SessionConfig, sinks: Vec<Arc<dyn SnapshotSink>>) -> Self {
        let engine = HandshakeEngine::new(config);
        let latest = ArcSwap::from_pointee(engine.snapshot());
        let mut manager = SinkManager::new();
        for sink in sinks {
            manager.add_sink(sink);
        }
        Self {
            engine: Mutex::new(engine),
            latest,
            sinks: ArcSwap::from_pointee(manager),
            metrics: Arc::new(DriverMetrics::new()),
        }
    }

    fn engine(&self) -> MutexGuard<'_, HandshakeEngine> {
        // 引擎内部没有跨调用的不变量会因 panic 而半途破坏，中毒后继续使用
        self.engine.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 会话开始
    pub fn start(&self) -> Step {
        self.engine().start()
    }

    /// 把一次通知交给引擎，成功时发布新快照
    pub fn process(&self, payload: &[u8], now: SystemTime) -> Result<Step, DecodeError> {
        let step = self.engine().on_bytes(payload, now)?;
        if let Some(snapshot) = &step.snapshot {
            self.latest.store(Arc::new(snapshot.clone()));
            self.metrics.rx_frames_decoded.fetch_add(1, Ordering::Relaxed);
        }
        Ok(step)
    }

    /// 最新快照（无锁）
    pub fn latest(&self) -> Arc<MeasurementSnapshot> {
        self.latest.load_full()
    }

    /// 注册展示层钩子（复制当前列表后整体替换，不阻塞 IO 线程）
    pub fn add_sink(&self, sink: Arc<dyn SnapshotSink>) {
        self.sinks.rcu(|current| {
            let mut next = SinkManager::clone(current);
            next.add_sink(sink.clone());
            next
        });
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.load().len()
    }

    /// 触发所有渲染钩子
    pub fn render(&self, snapshot: &MeasurementSnapshot) {
        self.sinks.load().render_all(snapshot);
    }

    /// 触发所有发送回调
    pub fn notify_sent(&self, command: Command) {
        self.sinks.load().notify_sent(command);
    }
}
