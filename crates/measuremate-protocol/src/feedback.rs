//! 上行帧结构体定义
//!
//! 包含设备发出的矩阵帧和结果帧，提供从原始字节缓冲区解析的方法，
//! 以及反向编码（用于测试、回放和模拟设备）。

use crate::constants::*;
use crate::{DecodeError, bytes_to_f32_le, bytes_to_u16_be, f32_to_bytes_le, u16_to_bytes_be};
use num_enum::{IntoPrimitive, TryFromPrimitive};

// ============================================================================
// 枚举类型定义
// ============================================================================

/// 脚别（矩阵帧判别字节）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Foot {
    /// 左脚（'L'）
    Left = 0x4C,
    /// 右脚（'R'）
    Right = 0x52,
}

impl Foot {
    /// 判别字节
    pub fn tag(self) -> u8 {
        self.into()
    }
}

/// 帧类型（仅根据判别字节路由，不做完整解析）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// 矩阵帧（'L' / 'R'）
    Matrix(Foot),
    /// 结果帧（0x57）
    Result,
    /// 未知判别字节或空缓冲区
    Unknown,
}

/// 根据判别字节对缓冲区分类
///
/// 只检查第一个字节，不验证长度；长度错误由对应的 decode 函数报告。
pub fn classify(buffer: &[u8]) -> FrameKind {
    match buffer.first() {
        Some(&TAG_RESULT) => FrameKind::Result,
        Some(&tag) => match Foot::try_from(tag) {
            Ok(foot) => FrameKind::Matrix(foot),
            Err(_) => FrameKind::Unknown,
        },
        None => FrameKind::Unknown,
    }
}

// ============================================================================
// 压力矩阵
// ============================================================================

/// 单只脚的压力矩阵（15 行 × 7 列，行优先）
///
/// 取值范围通常为 0-1024，但解析时不做限制。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PressureMatrix {
    rows: [[u16; MATRIX_COLS]; MATRIX_ROWS],
}

impl PressureMatrix {
    /// 全零矩阵
    pub const fn zeroed() -> Self {
        Self {
            rows: [[0; MATRIX_COLS]; MATRIX_ROWS],
        }
    }

    /// 从二维数组构造
    pub const fn from_rows(rows: [[u16; MATRIX_COLS]; MATRIX_ROWS]) -> Self {
        Self { rows }
    }

    /// 从行优先的 105 个值构造
    pub fn from_cells(cells: &[u16; MATRIX_CELLS]) -> Self {
        let mut rows = [[0u16; MATRIX_COLS]; MATRIX_ROWS];
        for (i, value) in cells.iter().enumerate() {
            rows[i / MATRIX_COLS][i % MATRIX_COLS] = *value;
        }
        Self { rows }
    }

    /// 获取单元值（越界返回 None）
    pub fn get(&self, row: usize, col: usize) -> Option<u16> {
        self.rows.get(row).and_then(|r| r.get(col)).copied()
    }

    /// 按行访问
    pub fn rows(&self) -> &[[u16; MATRIX_COLS]; MATRIX_ROWS] {
        &self.rows
    }

    /// 行优先展开的单元迭代器
    pub fn cells(&self) -> impl Iterator<Item = u16> + '_ {
        self.rows.iter().flat_map(|row| row.iter().copied())
    }

    /// 最大压力值
    pub fn peak(&self) -> u16 {
        self.cells().max().unwrap_or(0)
    }

    /// 压力总和（用于显示负载分布）
    pub fn total(&self) -> u32 {
        self.cells().map(u32::from).sum()
    }

    /// 水平镜像（右脚显示时使用）
    pub fn mirrored(&self) -> Self {
        let mut rows = self.rows;
        for row in rows.iter_mut() {
            row.reverse();
        }
        Self { rows }
    }

    /// 是否全零
    pub fn is_zero(&self) -> bool {
        self.cells().all(|v| v == 0)
    }
}

// ============================================================================
// 矩阵帧
// ============================================================================

/// 矩阵帧（一次单脚扫描）
///
/// 线格式（211 字节）：
///
/// | Byte | 内容 |
/// |---|---|
/// | 0 | 'L' (0x4C) 或 'R' (0x52) |
/// | 1..211 | 105 × u16 大端，行优先 15×7 |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatrixFrame {
    pub foot: Foot,
    pub matrix: PressureMatrix,
}

impl MatrixFrame {
    pub fn new(foot: Foot, matrix: PressureMatrix) -> Self {
        Self { foot, matrix }
    }

    /// 编码为 211 字节的线格式
    pub fn encode(&self) -> [u8; MATRIX_FRAME_LEN] {
        let mut buffer = [0u8; MATRIX_FRAME_LEN];
        buffer[0] = self.foot.tag();
        for (i, value) in self.matrix.cells().enumerate() {
            let [hi, lo] = u16_to_bytes_be(value);
            buffer[1 + 2 * i] = hi;
            buffer[2 + 2 * i] = lo;
        }
        buffer
    }
}

impl TryFrom<&[u8]> for MatrixFrame {
    type Error = DecodeError;

    fn try_from(buffer: &[u8]) -> Result<Self, Self::Error> {
        decode_matrix(buffer)
    }
}

/// 解析矩阵帧
///
/// # 错误
/// - `BadLength`: 长度不等于 211
/// - `UnknownDiscriminator`: 首字节既不是 'L' 也不是 'R'
pub fn decode_matrix(buffer: &[u8]) -> Result<MatrixFrame, DecodeError> {
    // 验证数据长度
    if buffer.len() != MATRIX_FRAME_LEN {
        return Err(DecodeError::BadLength {
            expected: MATRIX_FRAME_LEN,
            actual: buffer.len(),
        });
    }

    let foot = Foot::try_from(buffer[0]).map_err(|_| DecodeError::UnknownDiscriminator(buffer[0]))?;

    let mut cells = [0u16; MATRIX_CELLS];
    for (i, cell) in cells.iter_mut().enumerate() {
        *cell = bytes_to_u16_be([buffer[1 + 2 * i], buffer[2 + 2 * i]]);
    }

    Ok(MatrixFrame {
        foot,
        matrix: PressureMatrix::from_cells(&cells),
    })
}

/// 解析 UDP 数据报中的矩阵帧
///
/// WiFi 固件在 211 字节帧后附加一个填充字节，这里同时接受 211 和 212 字节，
/// 忽略末尾填充字节。
pub fn decode_matrix_datagram(buffer: &[u8]) -> Result<MatrixFrame, DecodeError> {
    match buffer.len() {
        MATRIX_FRAME_LEN => decode_matrix(buffer),
        MATRIX_DATAGRAM_LEN => decode_matrix(&buffer[..MATRIX_FRAME_LEN]),
        actual => Err(DecodeError::BadLength {
            expected: MATRIX_DATAGRAM_LEN,
            actual,
        }),
    }
}

// ============================================================================
// 结果帧
// ============================================================================

/// 结果帧（一次重量 / 长度测量）
///
/// 线格式（10 字节）：
///
/// | Byte | 内容 |
/// |---|---|
/// | 0 | 0x57 |
/// | 1..5 | 重量 f32 小端（kg） |
/// | 5..9 | 长度 f32 小端（cm），-1 表示无效 |
/// | 9 | 审批状态，0 = 通过，其余 = 拒绝 |
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResultFrame {
    /// 重量（kg）
    pub weight: f32,
    /// 长度（cm），`-1` 表示未获得有效长度
    pub length: f32,
    /// 设备端审批状态
    pub approval_status: u8,
}

impl ResultFrame {
    pub fn new(weight: f32, length: f32, approval_status: u8) -> Self {
        Self {
            weight,
            length,
            approval_status,
        }
    }

    /// 长度是否有效（不等于哨兵值 -1）
    pub fn has_length(&self) -> bool {
        self.length != LENGTH_SENTINEL
    }

    /// 设备是否通过了本次测量（只有 0 表示通过）
    pub fn is_approved(&self) -> bool {
        self.approval_status == 0
    }

    /// 编码为 10 字节的线格式
    pub fn encode(&self) -> [u8; RESULT_FRAME_LEN] {
        let mut buffer = [0u8; RESULT_FRAME_LEN];
        buffer[0] = TAG_RESULT;
        buffer[1..5].copy_from_slice(&f32_to_bytes_le(self.weight));
        buffer[5..9].copy_from_slice(&f32_to_bytes_le(self.length));
        buffer[9] = self.approval_status;
        buffer
    }
}

impl TryFrom<&[u8]> for ResultFrame {
    type Error = DecodeError;

    fn try_from(buffer: &[u8]) -> Result<Self, Self::Error> {
        decode_result(buffer)
    }
}

/// 解析结果帧
///
/// # 错误
/// - `BadLength`: 长度不等于 10
/// - `BadDiscriminator`: 首字节不是 0x57
pub fn decode_result(buffer: &[u8]) -> Result<ResultFrame, DecodeError> {
    if buffer.len() != RESULT_FRAME_LEN {
        return Err(DecodeError::BadLength {
            expected: RESULT_FRAME_LEN,
            actual: buffer.len(),
        });
    }

    if buffer[0] != TAG_RESULT {
        return Err(DecodeError::BadDiscriminator {
            expected: TAG_RESULT,
            actual: buffer[0],
        });
    }

    let weight = bytes_to_f32_le([buffer[1], buffer[2], buffer[3], buffer[4]]);
    let length = bytes_to_f32_le([buffer[5], buffer[6], buffer[7], buffer[8]]);

    Ok(ResultFrame {
        weight,
        length,
        approval_status: buffer[9],
    })
}

// ============================================================================
// 统一入口
// ============================================================================

/// 已解析的二进制帧
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Frame {
    Matrix(MatrixFrame),
    Result(ResultFrame),
}

/// 先分类再解析
///
/// 空缓冲区报告为 `BadLength { expected: 1, actual: 0 }`。
pub fn decode_frame(buffer: &[u8]) -> Result<Frame, DecodeError> {
    match classify(buffer) {
        FrameKind::Matrix(_) => decode_matrix(buffer).map(Frame::Matrix),
        FrameKind::Result => decode_result(buffer).map(Frame::Result),
        FrameKind::Unknown => match buffer.first() {
            Some(&tag) => Err(DecodeError::UnknownDiscriminator(tag)),
            None => Err(DecodeError::BadLength {
                expected: 1,
                actual: 0,
            }),
        },
    }
}
