//! replay 命令
//!
//! 把录制的帧（每行一个）交给进程内的握手引擎，使用手动推进的时钟，
//! 打印每一帧之后的命令序列和状态，不需要真实设备。

use super::{FormatArg, ModeArg, apply_overrides};
use crate::config::CliConfig;
use crate::render::render_summary;
use anyhow::{Context, Result};
use clap::Args;
use measuremate_driver::{HandshakeEngine, SessionConfig, Step, WireFormat};
use measuremate_protocol::{FrameKind, classify};
use std::fmt::Write;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// 回放命令参数
#[derive(Args, Debug)]
pub struct ReplayCommand {
    /// 录制文件路径（每行一帧；二进制格式为十六进制，文本格式为原始行；`#` 开头为注释）
    pub input: PathBuf,

    /// 握手模式（覆盖配置）
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// 上行字节格式（覆盖配置）
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// 相邻两帧之间时钟推进的毫秒数
    #[arg(long, default_value_t = 100)]
    pub interval_ms: u64,
}

impl ReplayCommand {
    pub fn execute(&self, config: &CliConfig) -> Result<()> {
        let content = fs::read_to_string(&self.input)
            .with_context(|| format!("读取录制文件失败: {}", self.input.display()))?;

        let mut session = config.session.clone();
        apply_overrides(&mut session, self.mode, self.format);

        for line in replay(&content, &session, Duration::from_millis(self.interval_ms))? {
            println!("{line}");
        }
        Ok(())
    }
}

/// 手动时钟（从 UNIX 纪元开始，输出可复现）
struct ManualClock {
    elapsed: Duration,
}

impl ManualClock {
    fn now(&self) -> SystemTime {
        SystemTime::UNIX_EPOCH + self.elapsed
    }

    fn advance(&mut self, by: Duration) {
        self.elapsed += by;
    }
}

fn describe_commands(step: &Step) -> String {
    if step.commands.is_empty() {
        return "-".to_string();
    }
    step.commands
        .iter()
        .map(|outbound| {
            if outbound.delay.is_zero() {
                outbound.command.to_string()
            } else {
                format!("{} (+{}ms)", outbound.command, outbound.delay.as_millis())
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_kind(bytes: &[u8], format: WireFormat) -> String {
    if format == WireFormat::Text {
        return "text line".to_string();
    }
    match classify(bytes) {
        FrameKind::Matrix(foot) => format!("matrix {foot:?}"),
        FrameKind::Result => "result".to_string(),
        FrameKind::Unknown => "unknown".to_string(),
    }
}

/// 回放录制内容，返回输出行
///
/// 解析失败的帧与真实会话一样被丢弃，回放继续。
pub fn replay(content: &str, config: &SessionConfig, interval: Duration) -> Result<Vec<String>> {
    let mut engine = HandshakeEngine::new(config);
    let mut clock = ManualClock {
        elapsed: Duration::ZERO,
    };
    let mut out = Vec::new();

    let start = engine.start();
    out.push(format!(
        "[t={}ms] session start -> {}",
        clock.elapsed.as_millis(),
        describe_commands(&start)
    ));

    for (index, raw) in content.lines().enumerate() {
        let line_no = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let bytes = if config.format == WireFormat::Text {
            trimmed.as_bytes().to_vec()
        } else {
            super::decode::parse_hex(trimmed).with_context(|| format!("第 {line_no} 行"))?
        };

        clock.advance(interval);
        let mut entry = format!(
            "[t={}ms] line {}: {}",
            clock.elapsed.as_millis(),
            line_no,
            describe_kind(&bytes, config.format)
        );

        match engine.on_bytes(&bytes, clock.now()) {
            Ok(step) if step.is_empty() => {
                let _ = write!(entry, " (buffered)");
            },
            Ok(step) => {
                let _ = write!(entry, " -> {}", describe_commands(&step));
                if let Some(snapshot) = &step.snapshot {
                    let _ = write!(entry, " | {}", render_summary(snapshot, clock.now()));
                }
            },
            Err(e) => {
                let _ = write!(entry, " dropped: {e}");
            },
        }
        out.push(entry);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use measuremate_protocol::{Foot, MatrixFrame, PressureMatrix, ResultFrame};

    fn hex_line(bytes: &[u8]) -> String {
        hex::encode(bytes)
    }

    #[test]
    fn test_replay_acknowledged_cycle() {
        let content = [
            "# recorded session".to_string(),
            hex_line(&MatrixFrame::new(Foot::Left, PressureMatrix::zeroed()).encode()),
            String::new(),
            hex_line(&ResultFrame::new(52.3, 74.2, 0).encode()),
            "5700".to_string(),
        ]
        .join("\n");

        let out = replay(&content, &SessionConfig::default(), Duration::from_millis(100)).unwrap();
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], "[t=0ms] session start -> CONNECTED, START (+500ms)");
        assert!(out[1].starts_with("[t=100ms] line 2: matrix Left -> APPROVED | [measurement in progress]"));
        assert_eq!(
            out[2],
            "[t=200ms] line 4: result -> START (+500ms) | [new measurement approved] weight 52.3 kg | length 74.2 cm (0s ago) | recent 74.2"
        );
        assert!(out[3].starts_with("[t=300ms] line 5: result dropped: Invalid frame length"));
    }

    #[test]
    fn test_replay_passive() {
        let content = hex_line(&ResultFrame::new(52.3, -1.0, 0).encode());
        let out = replay(
            &content,
            &SessionConfig::passive_datagram(),
            Duration::from_millis(100),
        )
        .unwrap();
        assert_eq!(out[0], "[t=0ms] session start -> -");
        assert_eq!(
            out[1],
            "[t=100ms] line 1: result -> - | [no valid length measurement] weight 52.3 kg | length ?"
        );
    }

    #[test]
    fn test_replay_text_buffers_lines() {
        let content = "---START---\nWeight:70.0";
        let out = replay(
            content,
            &SessionConfig::passive_text(),
            Duration::from_millis(10),
        )
        .unwrap();
        assert_eq!(out[1], "[t=10ms] line 1: text line (buffered)");
        assert_eq!(out[2], "[t=20ms] line 2: text line (buffered)");
    }

    #[test]
    fn test_replay_bad_hex_is_error() {
        let err = replay("not hex", &SessionConfig::default(), Duration::ZERO).unwrap_err();
        assert!(format!("{err:#}").contains("第 1 行"));
    }
}
