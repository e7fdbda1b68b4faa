//! 协议常量定义

/// 左脚矩阵帧判别字节（ASCII 'L'）
pub const TAG_LEFT: u8 = b'L';

/// 右脚矩阵帧判别字节（ASCII 'R'）
pub const TAG_RIGHT: u8 = b'R';

/// 结果帧判别字节（ASCII 'W'）
pub const TAG_RESULT: u8 = 0x57;

/// 压力矩阵行数
pub const MATRIX_ROWS: usize = 15;

/// 压力矩阵列数
pub const MATRIX_COLS: usize = 7;

/// 压力矩阵单元总数（15 × 7）
pub const MATRIX_CELLS: usize = MATRIX_ROWS * MATRIX_COLS;

/// 矩阵帧长度：1 字节判别 + 105 × 2 字节数据
pub const MATRIX_FRAME_LEN: usize = 1 + MATRIX_CELLS * 2;

/// UDP 数据报中的矩阵帧长度（末尾多一个填充字节）
pub const MATRIX_DATAGRAM_LEN: usize = MATRIX_FRAME_LEN + 1;

/// 结果帧长度：1 字节判别 + 4 字节重量 + 4 字节长度 + 1 字节状态
pub const RESULT_FRAME_LEN: usize = 10;

/// 结果帧中表示“未获得有效长度”的哨兵值
pub const LENGTH_SENTINEL: f32 = -1.0;

/// 压力值的满量程（仅用于显示，解析时不做限制）
pub const PRESSURE_FULL_SCALE: u16 = 1024;

/// 文本块起始标记
pub const TEXT_START_MARKER: &str = "---START---";

/// 文本块总行数：1 行标记 + 重量 + 身高 + 左右脚各 15 行
pub const TEXT_BLOCK_LINES: usize = 3 + MATRIX_ROWS * 2;
