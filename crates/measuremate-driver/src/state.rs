//! 测量状态
//!
//! 会话内唯一的权威状态：双脚矩阵、最近一次被接受的长度、重量、历史记录和状态文字。
//! 只有握手引擎可以修改它；展示层只能拿到 [`MeasurementSnapshot`] 副本。

use measuremate_protocol::{Foot, MatrixFrame, PressureMatrix, ResultFrame, TextFrame};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::SystemTime;

/// 默认历史记录容量
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// 展示用状态文字（固定集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusMessage {
    /// 会话刚开始，尚未收到任何帧
    #[default]
    WaitingForMeasurement,
    MeasurementInProgress,
    NoValidLength,
    LengthUnchanged,
    NewMeasurementApproved,
    LengthRejected,
}

impl StatusMessage {
    pub const fn as_str(self) -> &'static str {
        match self {
            StatusMessage::WaitingForMeasurement => "waiting for measurement",
            StatusMessage::MeasurementInProgress => "measurement in progress",
            StatusMessage::NoValidLength => "no valid length measurement",
            StatusMessage::LengthUnchanged => "length unchanged",
            StatusMessage::NewMeasurementApproved => "new measurement approved",
            StatusMessage::LengthRejected => "length measurement rejected",
        }
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 结果帧的处理结论（由接受策略给出，握手引擎据此决定后续动作）
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// 长度为哨兵值 -1
    NoValidLength,
    /// 设备通过，但与上次接受的长度完全相等（不重复记录）
    Unchanged,
    /// 新长度被接受并写入历史
    Accepted { length: f32 },
    /// 设备端拒绝（任意非零状态码）
    Rejected { status: u8 },
}

/// 测量状态（可变，仅由握手引擎持有）
#[derive(Debug, Clone)]
pub struct MeasurementState {
    left: PressureMatrix,
    right: PressureMatrix,
    last_accepted_length: Option<f32>,
    last_weight: Option<f32>,
    last_accepted_at: Option<SystemTime>,
    /// 最近被接受的长度，最新在前
    recent_lengths: VecDeque<f32>,
    history_capacity: usize,
    /// 文本变体上报的身高
    reported_height: Option<f32>,
    status: StatusMessage,
}

impl Default for MeasurementState {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl MeasurementState {
    /// 创建初始状态（矩阵全零，其余为空）
    ///
    /// 容量至少为 1。
    pub fn new(history_capacity: usize) -> Self {
        let history_capacity = history_capacity.max(1);
        Self {
            left: PressureMatrix::zeroed(),
            right: PressureMatrix::zeroed(),
            last_accepted_length: None,
            last_weight: None,
            last_accepted_at: None,
            recent_lengths: VecDeque::with_capacity(history_capacity + 1),
            history_capacity,
            reported_height: None,
            status: StatusMessage::default(),
        }
    }

    /// 用矩阵帧替换对应脚的矩阵
    pub fn apply_matrix(&mut self, frame: &MatrixFrame) {
        match frame.foot {
            Foot::Left => self.left = frame.matrix,
            Foot::Right => self.right = frame.matrix,
        }
    }

    /// 应用结果帧（接受策略）
    ///
    /// 重量无条件更新；长度按以下顺序判断：
    /// 1. 哨兵值 -1 → `NoValidLength`
    /// 2. 设备通过且与上次接受值完全相等 → `Unchanged`
    /// 3. 设备通过 → `Accepted`，写入历史（最新在前，超出容量丢弃最旧）
    /// 4. 设备拒绝 → `Rejected`
    pub fn apply_result(&mut self, frame: &ResultFrame, now: SystemTime) -> Decision {
        self.last_weight = Some(frame.weight);

        let decision = if !frame.has_length() {
            Decision::NoValidLength
        } else if frame.is_approved() {
            // 精确浮点比较（`==`）：NaN 与任何值都不相等，总会被接受；0.0 与 -0.0 视为相同
            if self.last_accepted_length == Some(frame.length) {
                Decision::Unchanged
            } else {
                self.last_accepted_length = Some(frame.length);
                self.last_accepted_at = Some(now);
                self.recent_lengths.push_front(frame.length);
                self.recent_lengths.truncate(self.history_capacity);
                Decision::Accepted {
                    length: frame.length,
                }
            }
        } else {
            Decision::Rejected {
                status: frame.approval_status,
            }
        };

        self.status = match decision {
            Decision::NoValidLength => StatusMessage::NoValidLength,
            Decision::Unchanged => StatusMessage::LengthUnchanged,
            Decision::Accepted { .. } => StatusMessage::NewMeasurementApproved,
            Decision::Rejected { .. } => StatusMessage::LengthRejected,
        };

        decision
    }

    /// 应用文本块：替换双脚矩阵，更新重量与上报身高，不经过接受策略
    pub fn apply_text(&mut self, frame: &TextFrame) {
        self.left = frame.left;
        self.right = frame.right;
        self.last_weight = Some(frame.weight);
        self.reported_height = frame.height;
    }

    pub fn set_status(&mut self, status: StatusMessage) {
        self.status = status;
    }

    pub fn status(&self) -> StatusMessage {
        self.status
    }

    pub fn matrix(&self, foot: Foot) -> &PressureMatrix {
        match foot {
            Foot::Left => &self.left,
            Foot::Right => &self.right,
        }
    }

    pub fn last_accepted_length(&self) -> Option<f32> {
        self.last_accepted_length
    }

    pub fn last_weight(&self) -> Option<f32> {
        self.last_weight
    }

    pub fn last_accepted_at(&self) -> Option<SystemTime> {
        self.last_accepted_at
    }

    pub fn recent_lengths(&self) -> impl ExactSizeIterator<Item = f32> + '_ {
        self.recent_lengths.iter().copied()
    }

    pub fn history_capacity(&self) -> usize {
        self.history_capacity
    }

    /// 生成只读快照（深拷贝，不与内部容器共享）
    pub fn snapshot(&self) -> MeasurementSnapshot {
        MeasurementSnapshot {
            left: self.left,
            right: self.right,
            last_accepted_length: self.last_accepted_length,
            last_weight: self.last_weight,
            last_accepted_at: self.last_accepted_at,
            recent_lengths: self.recent_lengths.iter().copied().collect(),
            reported_height: self.reported_height,
            status: self.status,
        }
    }
}

/// 测量状态快照（供展示层渲染）
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MeasurementSnapshot {
    pub left: PressureMatrix,
    pub right: PressureMatrix,
    pub last_accepted_length: Option<f32>,
    pub last_weight: Option<f32>,
    pub last_accepted_at: Option<SystemTime>,
    /// 最新在前
    pub recent_lengths: Vec<f32>,
    pub reported_height: Option<f32>,
    pub status: StatusMessage,
}

impl MeasurementSnapshot {
    /// 距上次接受测量的秒数（未接受过返回 None；时钟回拨按 0 处理）
    pub fn seconds_since_acceptance(&self, now: SystemTime) -> Option<u64> {
        self.last_accepted_at
            .map(|at| now.duration_since(at).map(|d| d.as_secs()).unwrap_or(0))
    }

    /// 例如 `"52.3 kg"`，未知时为 `"?"`
    pub fn weight_label(&self) -> String {
        self.last_weight
            .map(|w| format!("{w:.1} kg"))
            .unwrap_or_else(|| "?".to_string())
    }

    /// 例如 `"74.2 cm"`，未知时为 `"?"`
    pub fn length_label(&self) -> String {
        self.last_accepted_length
            .map(|l| format!("{l:.1} cm"))
            .unwrap_or_else(|| "?".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use measuremate_protocol::MATRIX_ROWS;
    use proptest::prelude::*;
    use std::time::Duration;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn test_initial_state() {
        let state = MeasurementState::default();
        assert!(state.matrix(Foot::Left).is_zero());
        assert!(state.matrix(Foot::Right).is_zero());
        assert_eq!(state.last_accepted_length(), None);
        assert_eq!(state.last_weight(), None);
        assert_eq!(state.recent_lengths().len(), 0);
        assert_eq!(state.status(), StatusMessage::WaitingForMeasurement);
    }

    #[test]
    fn test_apply_matrix_replaces_only_one_foot() {
        let mut state = MeasurementState::default();
        let mut rows = [[0u16; 7]; MATRIX_ROWS];
        rows[3][2] = 700;
        state.apply_matrix(&MatrixFrame::new(Foot::Right, PressureMatrix::from_rows(rows)));

        assert_eq!(state.matrix(Foot::Right).get(3, 2), Some(700));
        assert!(state.matrix(Foot::Left).is_zero());
    }

    #[test]
    fn test_first_acceptance() {
        let mut state = MeasurementState::default();
        let decision = state.apply_result(&ResultFrame::new(52.3, 74.2, 0), at(100));

        assert_eq!(decision, Decision::Accepted { length: 74.2 });
        assert_eq!(state.last_accepted_length(), Some(74.2));
        assert_eq!(state.last_weight(), Some(52.3));
        assert_eq!(state.last_accepted_at(), Some(at(100)));
        assert_eq!(state.recent_lengths().collect::<Vec<_>>(), vec![74.2]);
        assert_eq!(state.status(), StatusMessage::NewMeasurementApproved);
    }

    #[test]
    fn test_duplicate_uses_exact_equality() {
        let mut state = MeasurementState::default();
        state.apply_result(&ResultFrame::new(52.3, 74.2, 0), at(100));

        // 相差一个 ulp 的读数不是重复
        let nudged = f32::from_bits(74.2f32.to_bits() + 1);
        let decision = state.apply_result(&ResultFrame::new(52.3, nudged, 0), at(101));
        assert_eq!(decision, Decision::Accepted { length: nudged });
        assert_eq!(state.recent_lengths().len(), 2);

        // 0.0 与 -0.0 相等
        state.apply_result(&ResultFrame::new(52.3, 0.0, 0), at(102));
        let decision = state.apply_result(&ResultFrame::new(52.3, -0.0, 0), at(103));
        assert_eq!(decision, Decision::Unchanged);
    }

    #[test]
    fn test_nan_length_is_never_a_duplicate() {
        let mut state = MeasurementState::default();
        let frame = ResultFrame::new(52.3, f32::NAN, 0);

        for secs in [100, 101] {
            let decision = state.apply_result(&frame, at(secs));
            assert!(matches!(decision, Decision::Accepted { length } if length.is_nan()));
            assert_eq!(state.status(), StatusMessage::NewMeasurementApproved);
        }
        assert_eq!(state.recent_lengths().len(), 2);
        assert!(state.recent_lengths().all(f32::is_nan));
        assert!(state.last_accepted_length().is_some_and(f32::is_nan));
        assert_eq!(state.last_accepted_at(), Some(at(101)));
    }

    #[test]
    fn test_duplicate_is_not_logged() {
        let mut state = MeasurementState::default();
        let frame = ResultFrame::new(52.3, 74.2, 0);
        state.apply_result(&frame, at(100));
        let decision = state.apply_result(&frame, at(200));

        assert_eq!(decision, Decision::Unchanged);
        assert_eq!(state.recent_lengths().len(), 1);
        // 时间戳只在接受时更新
        assert_eq!(state.last_accepted_at(), Some(at(100)));
        assert_eq!(state.status(), StatusMessage::LengthUnchanged);
    }

    #[test]
    fn test_sentinel_length() {
        let mut state = MeasurementState::default();
        state.apply_result(&ResultFrame::new(50.0, 70.0, 0), at(1));
        let decision = state.apply_result(&ResultFrame::new(51.0, -1.0, 0), at(2));

        assert_eq!(decision, Decision::NoValidLength);
        assert_eq!(state.last_accepted_length(), Some(70.0));
        assert_eq!(state.last_weight(), Some(51.0));
        assert_eq!(state.recent_lengths().len(), 1);
        assert_eq!(state.status(), StatusMessage::NoValidLength);
    }

    #[test]
    fn test_sentinel_wins_over_rejection() {
        let mut state = MeasurementState::default();
        let decision = state.apply_result(&ResultFrame::new(51.0, -1.0, 4), at(2));
        assert_eq!(decision, Decision::NoValidLength);
    }

    #[test]
    fn test_rejection() {
        let mut state = MeasurementState::default();
        state.apply_result(&ResultFrame::new(50.0, 74.2, 0), at(1));
        let decision = state.apply_result(&ResultFrame::new(50.5, 80.0, 1), at(2));

        assert_eq!(decision, Decision::Rejected { status: 1 });
        assert_eq!(state.last_accepted_length(), Some(74.2));
        assert_eq!(state.last_weight(), Some(50.5));
        assert_eq!(state.recent_lengths().len(), 1);
        assert_eq!(state.status(), StatusMessage::LengthRejected);
    }

    #[test]
    fn test_any_nonzero_status_is_rejection() {
        let mut state = MeasurementState::default();
        for status in [1u8, 2, 0x7F, 0xFF] {
            let decision = state.apply_result(&ResultFrame::new(50.0, 80.0, status), at(1));
            assert_eq!(decision, Decision::Rejected { status });
        }
        assert_eq!(state.last_accepted_length(), None);
    }

    #[test]
    fn test_history_cap() {
        let mut state = MeasurementState::default();
        for i in 0..15 {
            state.apply_result(&ResultFrame::new(50.0, 60.0 + i as f32, 0), at(i));
        }
        let history: Vec<f32> = state.recent_lengths().collect();
        assert_eq!(history.len(), 10);
        assert_eq!(history[0], 74.0);
        assert_eq!(history[9], 65.0);
    }

    #[test]
    fn test_apply_text() {
        let mut state = MeasurementState::default();
        let mut rows = [[0u16; 7]; MATRIX_ROWS];
        rows[0][0] = 5;
        let frame = TextFrame {
            weight: 61.5,
            height: Some(172.0),
            left: PressureMatrix::from_rows(rows),
            right: PressureMatrix::zeroed(),
        };
        state.apply_text(&frame);

        let snapshot = state.snapshot();
        assert_eq!(snapshot.left.get(0, 0), Some(5));
        assert_eq!(snapshot.last_weight, Some(61.5));
        assert_eq!(snapshot.reported_height, Some(172.0));
        assert!(snapshot.recent_lengths.is_empty());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut state = MeasurementState::default();
        state.apply_result(&ResultFrame::new(50.0, 70.0, 0), at(1));
        let mut snapshot = state.snapshot();
        snapshot.recent_lengths.clear();
        snapshot.recent_lengths.push(1.0);

        assert_eq!(state.recent_lengths().collect::<Vec<_>>(), vec![70.0]);
    }

    #[test]
    fn test_snapshot_labels() {
        let mut state = MeasurementState::default();
        let snapshot = state.snapshot();
        assert_eq!(snapshot.weight_label(), "?");
        assert_eq!(snapshot.length_label(), "?");
        assert_eq!(snapshot.seconds_since_acceptance(at(5)), None);

        state.apply_result(&ResultFrame::new(52.3, 74.2, 0), at(100));
        let snapshot = state.snapshot();
        assert_eq!(snapshot.weight_label(), "52.3 kg");
        assert_eq!(snapshot.length_label(), "74.2 cm");
        assert_eq!(snapshot.seconds_since_acceptance(at(112)), Some(12));
        assert_eq!(snapshot.seconds_since_acceptance(at(50)), Some(0));
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(
            StatusMessage::NewMeasurementApproved.to_string(),
            "new measurement approved"
        );
        assert_eq!(
            StatusMessage::LengthRejected.to_string(),
            "length measurement rejected"
        );
    }

    fn length_strategy() -> impl Strategy<Value = f32> {
        prop_oneof![
            8 => (-1i8..20).prop_map(f32::from),
            1 => Just(f32::NAN),
        ]
    }

    proptest! {
        #[test]
        fn prop_history_invariants(frames in proptest::collection::vec((0u8..3, length_strategy(), 0u8..3), 0..64)) {
            let mut state = MeasurementState::default();
            for (i, (weight, length, status)) in frames.into_iter().enumerate() {
                let frame = ResultFrame::new(f32::from(weight), length, status);
                state.apply_result(&frame, at(i as u64));

                let history: Vec<f32> = state.recent_lengths().collect();
                prop_assert!(history.len() <= DEFAULT_HISTORY_CAPACITY);
                if let Some(first) = history.first() {
                    // 按位比较，NaN 也成立
                    prop_assert_eq!(
                        Some(first.to_bits()),
                        state.last_accepted_length().map(f32::to_bits)
                    );
                }
                prop_assert_eq!(state.last_weight(), Some(f32::from(weight)));
            }
        }
    }
}
