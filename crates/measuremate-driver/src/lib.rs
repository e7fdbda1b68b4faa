//! 驱动层模块
//!
//! 本模块提供 MeasureMates 压力垫的测量会话驱动，包括：
//! - 测量状态（双脚矩阵、长度接受策略、历史记录）
//! - 握手状态机（CONNECTED / START / APPROVED，结算延迟调度）
//! - IO 线程管理（单线程/双线程模式）
//! - 状态同步（ArcSwap 无锁读取）
//! - 钩子系统：展示层快照回调
//!
//! # 使用示例
//!
//! ```rust
//! use measuremate_driver::{HandshakeEngine, StatusMessage};
//! use measuremate_protocol::ResultFrame;
//! use std::time::SystemTime;
//!
//! let mut engine = HandshakeEngine::default();
//! let frame = ResultFrame::new(52.3, 74.2, 0).encode();
//! let step = engine.on_bytes(&frame, SystemTime::now()).unwrap();
//!
//! let snapshot = step.snapshot.unwrap();
//! assert_eq!(snapshot.status, StatusMessage::NewMeasurementApproved);
//! assert_eq!(snapshot.last_accepted_length, Some(74.2));
//! ```

mod builder;
pub mod command;
pub mod config;
mod context;
pub mod engine;
mod error;
pub mod hooks;
pub mod metrics;
pub mod pipeline;
mod session;
pub mod state;

pub use builder::SessionBuilder;
pub use command::{Outbound, Outbox, Scheduled};
pub use config::{SessionConfig, SessionMode, WireFormat};
pub use context::SessionContext;
pub use engine::{HandshakeEngine, Phase, Step};
pub use error::DriverError;
pub use hooks::{ChannelSink, SinkManager, SnapshotSink};
pub use metrics::{DriverMetrics, MetricsSnapshot};
pub use pipeline::{io_loop, rx_loop, tx_loop};
pub use session::Session;
pub use state::*;
