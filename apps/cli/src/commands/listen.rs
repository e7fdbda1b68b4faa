//! listen 命令
//!
//! 在 UDP 端口上接收压力垫数据，持续在终端显示测量状态，Ctrl-C 退出。

use super::{FormatArg, ModeArg, apply_overrides};
use crate::config::CliConfig;
use crate::render::{render_feet, render_summary};
use anyhow::{Context, Result, bail};
use clap::Args;
use measuremate_driver::{
    ChannelSink, MeasurementSnapshot, MetricsSnapshot, SessionBuilder, SessionMode,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};
use tracing::info;

/// 终端刷新的最长等待（同时决定 Ctrl-C 的响应速度）
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// 渲染通道容量（终端跟不上时丢弃旧快照）
const RENDER_QUEUE_CAPACITY: usize = 16;

/// 监听命令参数
#[derive(Args, Debug)]
pub struct ListenCommand {
    /// 本地监听地址（覆盖配置，如 0.0.0.0:4210）
    #[arg(short, long)]
    pub bind: Option<String>,

    /// 设备地址（覆盖配置；完整握手模式必需，如 192.168.4.1:4210）
    #[arg(long)]
    pub peer: Option<String>,

    /// 握手模式（覆盖配置）
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// 上行字节格式（覆盖配置）
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// 显示双脚压力热力图
    #[arg(long)]
    pub matrix: bool,

    /// 每个快照输出一行 JSON（便于其他程序读取）
    #[arg(long, conflicts_with = "matrix")]
    pub json: bool,
}

impl ListenCommand {
    pub fn execute(&self, mut config: CliConfig) -> Result<()> {
        apply_overrides(&mut config.session, self.mode, self.format);
        if let Some(bind) = &self.bind {
            config.udp.bind = bind.clone();
        }
        if let Some(peer) = &self.peer {
            config.udp.peer = Some(peer.clone());
        }
        let peer = config.udp.peer_addr()?;
        if config.session.mode == SessionMode::Acknowledged && peer.is_none() {
            bail!("完整握手模式需要设备地址（--peer 或配置文件 [udp] peer）");
        }

        // 注册 Ctrl-C 处理器
        let running = Arc::new(AtomicBool::new(true));
        let running_handler = running.clone();
        ctrlc::set_handler(move || {
            running_handler.store(false, Ordering::SeqCst);
        })
        .context("注册 Ctrl-C 处理器失败")?;

        let (sink, snapshots) = ChannelSink::new(RENDER_QUEUE_CAPACITY);
        let session = SessionBuilder::new()
            .config_from(config.session.clone())
            .sink(Arc::new(sink))
            .build_udp(config.udp.bind.as_str(), config.udp.max_datagram, peer)
            .with_context(|| format!("无法监听 {}", config.udp.bind))?;

        println!(
            "Listening on {} ({:?}, {:?}), Ctrl-C to stop",
            config.udp.bind, config.session.mode, config.session.format
        );

        while running.load(Ordering::SeqCst) && session.is_running() {
            match snapshots.recv_timeout(POLL_INTERVAL) {
                Ok(snapshot) => println!("{}", self.format_snapshot(&snapshot)?),
                Err(e) if e.is_timeout() => continue,
                Err(_) => break,
            }
        }

        let metrics = session.metrics();
        drop(session);
        info!("Session stopped");
        println!("{}", describe_metrics(&metrics));
        Ok(())
    }
}

impl ListenCommand {
    fn format_snapshot(&self, snapshot: &MeasurementSnapshot) -> Result<String> {
        if self.json {
            return serde_json::to_string(snapshot).context("序列化快照失败");
        }
        let mut out = String::new();
        if self.matrix {
            out.push_str(&render_feet(&snapshot.left, &snapshot.right));
        }
        out.push_str(&render_summary(snapshot, SystemTime::now()));
        Ok(out)
    }
}

fn describe_metrics(metrics: &MetricsSnapshot) -> String {
    format!(
        "frames: {} received, {} decoded, {} dropped ({:.1}%) | commands: {} sent, {} failed, {} cancelled",
        metrics.rx_frames_total,
        metrics.rx_frames_decoded,
        metrics.rx_frames_dropped,
        metrics.drop_rate(),
        metrics.tx_commands_sent,
        metrics.tx_send_failures,
        metrics.tx_commands_cancelled,
    )
}
