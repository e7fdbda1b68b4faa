//! decode 命令
//!
//! 解析一个十六进制编码的二进制帧并打印

use anyhow::{Context, Result};
use clap::Args;
use measuremate_protocol::{
    Frame, FrameKind, PressureMatrix, classify, decode_frame, decode_matrix_datagram,
    decode_result,
};

/// 解析命令参数
#[derive(Args, Debug)]
pub struct DecodeCommand {
    /// 十六进制帧（允许空格和 `0x` 前缀）
    pub hex: String,

    /// 以 JSON 输出
    #[arg(long)]
    pub json: bool,
}

impl DecodeCommand {
    pub fn execute(&self) -> Result<()> {
        let bytes = parse_hex(&self.hex)?;
        let frame = decode_any(&bytes)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&frame)?);
        } else {
            print!("{}", describe(&frame));
        }
        Ok(())
    }
}

/// 十六进制文本转字节
pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let text = text.trim();
    let text = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&compact).with_context(|| format!("无效的十六进制数据: {compact:?}"))
}

/// 按判别字节解析（矩阵帧允许数据报的末尾填充字节）
pub fn decode_any(bytes: &[u8]) -> Result<Frame> {
    let frame = match classify(bytes) {
        FrameKind::Matrix(_) => decode_matrix_datagram(bytes).map(Frame::Matrix),
        FrameKind::Result => decode_result(bytes).map(Frame::Result),
        FrameKind::Unknown => decode_frame(bytes),
    };
    frame.with_context(|| format!("无法解析 {} 字节的帧", bytes.len()))
}

fn describe_matrix(matrix: &PressureMatrix) -> String {
    let mut out = String::new();
    for row in matrix.rows() {
        let cells: Vec<String> = row.iter().map(|v| format!("{v:>5}")).collect();
        out.push_str(&cells.join(""));
        out.push('\n');
    }
    out
}

/// 人类可读的帧描述
pub fn describe(frame: &Frame) -> String {
    match frame {
        Frame::Matrix(matrix) => format!(
            "Matrix frame ({:?} foot), peak {}, total {}\n{}",
            matrix.foot,
            matrix.matrix.peak(),
            matrix.matrix.total(),
            describe_matrix(&matrix.matrix),
        ),
        Frame::Result(result) => {
            let length = if result.has_length() {
                format!("{:.1} cm", result.length)
            } else {
                "none".to_string()
            };
            let verdict = if result.is_approved() {
                "approved".to_string()
            } else {
                format!("rejected (status {})", result.approval_status)
            };
            format!(
                "Result frame: weight {:.1} kg, length {}, {}\n",
                result.weight, length, verdict
            )
        },
    }
}
