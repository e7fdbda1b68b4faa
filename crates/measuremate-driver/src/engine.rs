//! 握手状态机
//!
//! 显式状态机：每次转移接收一个事件（会话开始 / 原始字节 / 已解析帧），
//! 更新 [`MeasurementState`]，并返回本次产生的命令和快照（[`Step`]）。
//! 引擎本身不做 IO、不等待，结算延迟以 [`Outbound::delay`] 的形式交给调用方调度，
//! 因此整个协议可以脱离真实传输层测试。
//!
//! ```text
//!                 矩阵帧 / APPROVED
//!   AwaitingData ───────────────────▶ MeasuringInProgress
//!        ▲                                   │
//!        └───────────────────────────────────┘
//!              结果帧 / (500ms) START
//! ```

use crate::command::{CommandBuffer, Outbound};
use crate::config::{SessionConfig, SessionMode, WireFormat};
use crate::state::{Decision, MeasurementSnapshot, MeasurementState, StatusMessage};
use measuremate_protocol::{
    Command, DecodeError, Frame, FrameKind, MatrixFrame, ResultFrame, TextBlockAssembler,
    TextFrame, classify, decode_frame, decode_matrix_datagram, decode_result,
};
use std::time::{Duration, SystemTime};
use tracing::{debug, trace};

/// 握手阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// 等待数据（初始状态，也是每个结果帧之后的状态）
    #[default]
    AwaitingData,
    /// 已收到矩阵帧，等待结果帧
    MeasuringInProgress,
}

/// 一次状态转移的产物
#[derive(Debug, Clone, Default)]
pub struct Step {
    /// 按顺序发送的命令
    pub commands: CommandBuffer,
    /// 处理成功的帧会附带一份快照，供展示层渲染
    pub snapshot: Option<MeasurementSnapshot>,
    /// 结果帧的处理结论
    pub decision: Option<Decision>,
}

impl Step {
    /// 是否什么都没发生（如文本块尚未凑满）
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.snapshot.is_none()
    }

    /// 命令序列（忽略延迟）
    pub fn command_sequence(&self) -> impl Iterator<Item = Command> + '_ {
        self.commands.iter().map(|o| o.command)
    }
}

/// 握手引擎
pub struct HandshakeEngine {
    state: MeasurementState,
    phase: Phase,
    mode: SessionMode,
    format: WireFormat,
    settle_delay: Duration,
    connect_start_delay: Duration,
    assembler: TextBlockAssembler,
}

impl Default for HandshakeEngine {
    fn default() -> Self {
        Self::new(&SessionConfig::default())
    }
}

impl HandshakeEngine {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            state: MeasurementState::new(config.history_capacity),
            phase: Phase::AwaitingData,
            mode: config.mode,
            format: config.format,
            settle_delay: config.settle_delay(),
            connect_start_delay: config.connect_start_delay(),
            assembler: TextBlockAssembler::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// 只读访问内部状态
    pub fn state(&self) -> &MeasurementState {
        &self.state
    }

    pub fn snapshot(&self) -> MeasurementSnapshot {
        self.state.snapshot()
    }

    fn acknowledges(&self) -> bool {
        self.mode == SessionMode::Acknowledged
    }

    /// 会话开始（只调用一次，早于任何帧）
    ///
    /// 完整握手模式下发送 CONNECTED，延迟后发送 START；被动模式不发送任何命令。
    pub fn start(&mut self) -> Step {
        let mut step = Step::default();
        if self.acknowledges() {
            step.commands.push(Outbound::now(Command::Connected));
            step.commands
                .push(Outbound::after(Command::Start, self.connect_start_delay));
        }
        step
    }

    /// 处理一次原始通知
    ///
    /// # 错误
    /// 解析失败返回 `DecodeError`，此时状态不变、不产生命令，调用方负责记录并丢弃。
    pub fn on_bytes(&mut self, bytes: &[u8], now: SystemTime) -> Result<Step, DecodeError> {
        match self.format {
            WireFormat::Binary => {
                let frame = decode_frame(bytes)?;
                Ok(self.on_frame(frame, now))
            },
            WireFormat::Datagram => {
                let frame = match classify(bytes) {
                    FrameKind::Matrix(_) => Frame::Matrix(decode_matrix_datagram(bytes)?),
                    FrameKind::Result => Frame::Result(decode_result(bytes)?),
                    // 与二进制格式一致的错误报告
                    FrameKind::Unknown => decode_frame(bytes)?,
                };
                Ok(self.on_frame(frame, now))
            },
            WireFormat::Text => match self.assembler.push_bytes(bytes) {
                None => Ok(Step::default()),
                Some(Ok(frame)) => Ok(self.on_text(&frame)),
                Some(Err(e)) => Err(e),
            },
        }
    }

    /// 处理已解析的二进制帧
    pub fn on_frame(&mut self, frame: Frame, now: SystemTime) -> Step {
        match frame {
            Frame::Matrix(matrix) => self.on_matrix(&matrix),
            Frame::Result(result) => self.on_result(&result, now),
        }
    }

    fn on_matrix(&mut self, frame: &MatrixFrame) -> Step {
        trace!("Matrix frame for {:?}, peak={}", frame.foot, frame.matrix.peak());
        self.state.apply_matrix(frame);

        let mut step = Step::default();
        if self.acknowledges() {
            self.state.set_status(StatusMessage::MeasurementInProgress);
            self.phase = Phase::MeasuringInProgress;
            step.commands.push(Outbound::now(Command::Approved));
        }
        step.snapshot = Some(self.state.snapshot());
        step
    }

    fn on_result(&mut self, frame: &ResultFrame, now: SystemTime) -> Step {
        let decision = self.state.apply_result(frame, now);
        debug!(
            "Result frame: weight={} length={} status={} -> {:?}",
            frame.weight, frame.length, frame.approval_status, decision
        );

        let mut step = Step {
            decision: Some(decision),
            ..Step::default()
        };
        if self.acknowledges() {
            self.phase = Phase::AwaitingData;
            step.commands
                .push(Outbound::after(Command::Start, self.settle_delay));
        }
        step.snapshot = Some(self.state.snapshot());
        step
    }

    /// 处理完整的文本块（被动变体，不产生命令）
    pub fn on_text(&mut self, frame: &TextFrame) -> Step {
        trace!(
            "Text block: weight={} height={:?}",
            frame.weight, frame.height
        );
        self.state.apply_text(frame);
        Step {
            snapshot: Some(self.state.snapshot()),
            ..Step::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use measuremate_protocol::{
        Foot, MATRIX_FRAME_LEN, PressureMatrix, TEXT_START_MARKER, TAG_LEFT,
    };

    fn now() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_000)
    }

    fn result_bytes(weight: f32, length: f32, status: u8) -> [u8; 10] {
        ResultFrame::new(weight, length, status).encode()
    }

    fn zero_left_matrix() -> Vec<u8> {
        let mut buffer = vec![0u8; MATRIX_FRAME_LEN];
        buffer[0] = TAG_LEFT;
        buffer
    }

    #[test]
    fn test_session_start() {
        let mut engine = HandshakeEngine::default();
        let step = engine.start();
        assert_eq!(
            step.commands.as_slice(),
            &[
                Outbound::now(Command::Connected),
                Outbound::after(Command::Start, Duration::from_millis(500)),
            ]
        );
        assert!(step.snapshot.is_none());
    }

    #[test]
    fn test_scenario_a_first_acceptance() {
        let mut engine = HandshakeEngine::default();
        let step = engine.on_bytes(&result_bytes(52.3, 74.2, 0), now()).unwrap();

        let snapshot = step.snapshot.clone().unwrap();
        assert_eq!(snapshot.last_accepted_length, Some(74.2));
        assert_eq!(snapshot.recent_lengths, vec![74.2]);
        assert_eq!(snapshot.status, StatusMessage::NewMeasurementApproved);
        assert_eq!(step.command_sequence().last(), Some(Command::Start));
        assert_eq!(
            step.commands.last().map(|o| o.delay),
            Some(Duration::from_millis(500))
        );
        assert_eq!(step.decision, Some(Decision::Accepted { length: 74.2 }));
    }

    #[test]
    fn test_scenario_b_duplicate() {
        let mut engine = HandshakeEngine::default();
        engine.on_bytes(&result_bytes(52.3, 74.2, 0), now()).unwrap();
        let step = engine.on_bytes(&result_bytes(52.3, 74.2, 0), now()).unwrap();

        let snapshot = step.snapshot.clone().unwrap();
        assert_eq!(snapshot.recent_lengths, vec![74.2]);
        assert_eq!(snapshot.status, StatusMessage::LengthUnchanged);
        assert_eq!(step.command_sequence().collect::<Vec<_>>(), vec![Command::Start]);
    }

    #[test]
    fn test_scenario_c_sentinel() {
        let mut engine = HandshakeEngine::default();
        let step = engine.on_bytes(&result_bytes(52.3, -1.0, 0), now()).unwrap();

        let snapshot = step.snapshot.clone().unwrap();
        assert!(snapshot.recent_lengths.is_empty());
        assert_eq!(snapshot.last_accepted_length, None);
        assert_eq!(snapshot.status, StatusMessage::NoValidLength);
        assert_eq!(step.command_sequence().collect::<Vec<_>>(), vec![Command::Start]);
    }

    #[test]
    fn test_scenario_d_rejection() {
        let mut engine = HandshakeEngine::default();
        engine.on_bytes(&result_bytes(52.3, 74.2, 0), now()).unwrap();
        let step = engine.on_bytes(&result_bytes(52.3, 80.0, 1), now()).unwrap();

        let snapshot = step.snapshot.unwrap();
        assert_eq!(snapshot.last_accepted_length, Some(74.2));
        assert_eq!(snapshot.status, StatusMessage::LengthRejected);
        assert_eq!(step.decision, Some(Decision::Rejected { status: 1 }));
    }

    #[test]
    fn test_scenario_e_matrix_acknowledged() {
        let mut engine = HandshakeEngine::default();
        let step = engine.on_bytes(&zero_left_matrix(), now()).unwrap();

        assert_eq!(
            step.commands.as_slice(),
            &[Outbound::now(Command::Approved)]
        );
        assert_eq!(engine.phase(), Phase::MeasuringInProgress);
        let snapshot = step.snapshot.unwrap();
        assert!(snapshot.left.is_zero());
        assert!(snapshot.right.is_zero());
        assert_eq!(snapshot.status, StatusMessage::MeasurementInProgress);
    }

    #[test]
    fn test_scenario_f_bad_length_drops_frame() {
        let mut engine = HandshakeEngine::default();
        let mut buffer = vec![0u8; 200];
        buffer[0] = b'L';
        buffer[1] = 0xFF;

        let err = engine.on_bytes(&buffer, now()).unwrap_err();
        assert_eq!(
            err,
            DecodeError::BadLength {
                expected: 211,
                actual: 200
            }
        );
        assert_eq!(engine.phase(), Phase::AwaitingData);
        assert_eq!(engine.snapshot(), MeasurementState::default().snapshot());
    }

    #[test]
    fn test_bad_result_frame_drops_frame() {
        let mut engine = HandshakeEngine::default();
        let mut bytes = result_bytes(52.3, 74.2, 0).to_vec();
        bytes.push(0);
        assert!(engine.on_bytes(&bytes, now()).is_err());
        assert_eq!(engine.state().last_weight(), None);
    }

    #[test]
    fn test_unknown_discriminator() {
        let mut engine = HandshakeEngine::default();
        assert_eq!(
            engine.on_bytes(b"OK", now()).unwrap_err(),
            DecodeError::UnknownDiscriminator(b'O')
        );
    }

    #[test]
    fn test_full_cycle_phases() {
        let mut engine = HandshakeEngine::default();
        assert_eq!(engine.phase(), Phase::AwaitingData);

        let mut right = MatrixFrame::new(Foot::Right, PressureMatrix::zeroed()).encode();
        right[2] = 9;
        engine.on_bytes(&zero_left_matrix(), now()).unwrap();
        engine.on_bytes(&right, now()).unwrap();
        assert_eq!(engine.phase(), Phase::MeasuringInProgress);
        assert_eq!(engine.state().matrix(Foot::Right).get(0, 0), Some(9));

        engine.on_bytes(&result_bytes(60.0, 75.5, 0), now()).unwrap();
        assert_eq!(engine.phase(), Phase::AwaitingData);
    }

    #[test]
    fn test_passive_datagram_mode() {
        let mut engine = HandshakeEngine::new(&SessionConfig::passive_datagram());
        assert!(engine.start().commands.is_empty());

        let mut datagram = zero_left_matrix();
        datagram[1] = 0x01;
        datagram.push(0x00);
        let step = engine.on_bytes(&datagram, now()).unwrap();

        assert!(step.commands.is_empty());
        assert_eq!(step.snapshot.unwrap().left.get(0, 0), Some(256));
        assert_eq!(engine.phase(), Phase::AwaitingData);
    }

    #[test]
    fn test_passive_result_updates_state_without_commands() {
        let mut engine = HandshakeEngine::new(&SessionConfig::passive_datagram());
        let step = engine.on_bytes(&result_bytes(52.3, 74.2, 0), now()).unwrap();
        assert!(step.commands.is_empty());
        assert_eq!(engine.state().last_accepted_length(), Some(74.2));
    }

    #[test]
    fn test_text_mode() {
        let mut engine = HandshakeEngine::new(&SessionConfig::passive_text());
        let mut lines = vec![
            TEXT_START_MARKER.to_string(),
            "Weight:70.1".to_string(),
            "Height:NaN".to_string(),
        ];
        for _ in 0..30 {
            lines.push("1,2,3,4,5,6,7".to_string());
        }

        let mut last = Step::default();
        for line in &lines {
            last = engine.on_bytes(line.as_bytes(), now()).unwrap();
        }
        let snapshot = last.snapshot.unwrap();
        assert_eq!(snapshot.last_weight, Some(70.1));
        assert_eq!(snapshot.reported_height, None);
        assert_eq!(snapshot.right.get(14, 6), Some(7));
        assert!(last.commands.is_empty());
    }

    #[test]
    fn test_text_mode_partial_block_is_empty_step() {
        let mut engine = HandshakeEngine::new(&SessionConfig::passive_text());
        let step = engine.on_bytes(TEXT_START_MARKER.as_bytes(), now()).unwrap();
        assert!(step.is_empty());
    }

    #[test]
    fn test_custom_settle_delay() {
        let config = SessionConfig {
            settle_delay_ms: 50,
            ..SessionConfig::default()
        };
        let mut engine = HandshakeEngine::new(&config);
        let step = engine.on_bytes(&result_bytes(1.0, 2.0, 0), now()).unwrap();
        assert_eq!(
            step.commands.as_slice(),
            &[Outbound::after(Command::Start, Duration::from_millis(50))]
        );
    }
}
