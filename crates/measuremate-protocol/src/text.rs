//! 文本块变体
//!
//! 早期固件通过 BLE 逐行发送 ASCII 文本，每 33 行构成一个完整块：
//!
//! ```text
//! ---START---
//! Weight:52.3
//! Height:NaN
//! 0,0,12,40,12,0,0      <- 左脚第 0 行
//! ...                   <- 共 15 行
//! 0,0,9,33,10,0,0       <- 右脚第 0 行
//! ...                   <- 共 15 行
//! ```
//!
//! 任何字段解析失败都会整块丢弃，不会产生部分矩阵。

use crate::DecodeError;
use crate::constants::*;
use crate::feedback::PressureMatrix;

/// 文本块帧（双脚矩阵 + 重量/身高）
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextFrame {
    /// 重量（kg）
    pub weight: f32,
    /// 身高（cm），设备发送 `NaN` 时为 None
    pub height: Option<f32>,
    pub left: PressureMatrix,
    pub right: PressureMatrix,
}

fn malformed(reason: impl Into<String>) -> DecodeError {
    DecodeError::MalformedBlock(reason.into())
}

/// 取 `key:value` 中第一个冒号之后的值
fn field_value<'a>(line: &'a str, name: &str) -> Result<&'a str, DecodeError> {
    line.split(':')
        .nth(1)
        .map(str::trim)
        .ok_or_else(|| malformed(format!("{name} line has no ':' separator: {line:?}")))
}

fn parse_row(line: &str, index: usize) -> Result<[u16; MATRIX_COLS], DecodeError> {
    let mut row = [0u16; MATRIX_COLS];
    let mut count = 0;
    for field in line.split(',') {
        if count >= MATRIX_COLS {
            return Err(malformed(format!(
                "line {index}: more than {MATRIX_COLS} columns"
            )));
        }
        row[count] = field
            .trim()
            .parse::<u16>()
            .map_err(|e| malformed(format!("line {index}: bad cell {field:?}: {e}")))?;
        count += 1;
    }
    if count != MATRIX_COLS {
        return Err(malformed(format!(
            "line {index}: expected {MATRIX_COLS} columns, got {count}"
        )));
    }
    Ok(row)
}

fn parse_matrix<S: AsRef<str>>(
    lines: &[S],
    first_line: usize,
) -> Result<PressureMatrix, DecodeError> {
    let mut rows = [[0u16; MATRIX_COLS]; MATRIX_ROWS];
    for (i, row) in rows.iter_mut().enumerate() {
        let index = first_line + i;
        *row = parse_row(lines[index].as_ref(), index)?;
    }
    Ok(PressureMatrix::from_rows(rows))
}

/// 解析 33 行文本块
///
/// # 错误
/// 行数不为 33、缺少起始标记、数值字段非法或列数不为 7 时返回 `MalformedBlock`。
pub fn decode_text_block<S: AsRef<str>>(lines: &[S]) -> Result<TextFrame, DecodeError> {
    if lines.len() != TEXT_BLOCK_LINES {
        return Err(malformed(format!(
            "expected {TEXT_BLOCK_LINES} lines, got {}",
            lines.len()
        )));
    }

    if lines[0].as_ref().trim() != TEXT_START_MARKER {
        return Err(malformed("missing start marker"));
    }

    let weight_line = lines[1].as_ref();
    let weight = field_value(weight_line, "weight")?
        .parse::<f32>()
        .map_err(|e| malformed(format!("bad weight {weight_line:?}: {e}")))?;

    let height_line = lines[2].as_ref();
    let height = if height_line.contains("NaN") {
        None
    } else {
        let height = field_value(height_line, "height")?
            .parse::<f32>()
            .map_err(|e| malformed(format!("bad height {height_line:?}: {e}")))?;
        Some(height)
    };

    let left = parse_matrix(lines, 3)?;
    let right = parse_matrix(lines, 3 + MATRIX_ROWS)?;

    Ok(TextFrame {
        weight,
        height,
        left,
        right,
    })
}

/// 文本块逐行组装器
///
/// 每次 BLE 通知携带一行。收到起始标记时开始（或重新开始）一个块，
/// 凑满 33 行后解析并清空缓冲区。起始标记之前的行直接丢弃。
#[derive(Debug, Default)]
pub struct TextBlockAssembler {
    lines: Vec<String>,
}

impl TextBlockAssembler {
    pub fn new() -> Self {
        Self {
            lines: Vec::with_capacity(TEXT_BLOCK_LINES),
        }
    }

    /// 当前缓冲的行数
    pub fn pending_lines(&self) -> usize {
        self.lines.len()
    }

    /// 推入原始字节（UTF-8 解码失败视为格式错误并丢弃当前块）
    pub fn push_bytes(&mut self, data: &[u8]) -> Option<Result<TextFrame, DecodeError>> {
        match std::str::from_utf8(data) {
            Ok(line) => self.push_line(line),
            Err(e) => {
                self.lines.clear();
                Some(Err(malformed(format!("line is not UTF-8: {e}"))))
            },
        }
    }

    /// 推入一行
    ///
    /// 块完成时返回 `Some`（解析结果），否则返回 `None`。
    pub fn push_line(&mut self, line: &str) -> Option<Result<TextFrame, DecodeError>> {
        let line = line.trim();

        if line == TEXT_START_MARKER {
            self.lines.clear();
            self.lines.push(line.to_string());
            return None;
        }

        if self.lines.is_empty() {
            // 尚未收到起始标记
            return None;
        }

        self.lines.push(line.to_string());
        if self.lines.len() < TEXT_BLOCK_LINES {
            return None;
        }

        let result = decode_text_block(&self.lines);
        self.lines.clear();
        Some(result)
    }
}
