//! 终端渲染
//!
//! 把测量快照格式化为纯文本：一行摘要，可选双脚压力热力图（右脚镜像显示）。

use measuremate_driver::MeasurementSnapshot;
use measuremate_protocol::{PRESSURE_FULL_SCALE, PressureMatrix};
use std::fmt::Write;
use std::time::SystemTime;

/// 由浅到深的灰度字符
const SHADES: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// 两只脚之间的间隔
const FOOT_GAP: &str = "    ";

/// 单个压力值对应的字符（超出满量程按满量程处理）
pub fn shade(value: u16) -> char {
    let clamped = usize::from(value.min(PRESSURE_FULL_SCALE));
    let index = clamped * (SHADES.len() - 1) / usize::from(PRESSURE_FULL_SCALE);
    SHADES[index]
}

/// 双脚热力图（左脚原样，右脚镜像）
pub fn render_feet(left: &PressureMatrix, right: &PressureMatrix) -> String {
    let right = right.mirrored();
    let mut out = String::new();
    for (left_row, right_row) in left.rows().iter().zip(right.rows().iter()) {
        out.extend(left_row.iter().map(|v| shade(*v)));
        out.push_str(FOOT_GAP);
        out.extend(right_row.iter().map(|v| shade(*v)));
        out.push('\n');
    }
    out
}

/// 一行摘要，例如：
///
/// `[new measurement approved] weight 52.3 kg | length 74.2 cm (3s ago) | recent 74.2, 73.9`
pub fn render_summary(snapshot: &MeasurementSnapshot, now: SystemTime) -> String {
    let mut out = format!(
        "[{}] weight {} | length {}",
        snapshot.status,
        snapshot.weight_label(),
        snapshot.length_label()
    );
    if let Some(secs) = snapshot.seconds_since_acceptance(now) {
        let _ = write!(out, " ({secs}s ago)");
    }
    if let Some(height) = snapshot.reported_height {
        let _ = write!(out, " | height {height:.1} cm");
    }
    if !snapshot.recent_lengths.is_empty() {
        let recent: Vec<String> = snapshot
            .recent_lengths
            .iter()
            .map(|l| format!("{l:.1}"))
            .collect();
        let _ = write!(out, " | recent {}", recent.join(", "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use measuremate_driver::StatusMessage;
    use measuremate_protocol::{MATRIX_COLS, MATRIX_ROWS};
    use std::time::Duration;

    #[test]
    fn test_shade_bounds() {
        assert_eq!(shade(0), ' ');
        assert_eq!(shade(PRESSURE_FULL_SCALE), '@');
        assert_eq!(shade(u16::MAX), '@');
        assert_eq!(shade(512), '=');
    }

    #[test]
    fn test_render_feet_mirrors_right() {
        let mut rows = [[0u16; MATRIX_COLS]; MATRIX_ROWS];
        rows[0][0] = PRESSURE_FULL_SCALE;
        let matrix = PressureMatrix::from_rows(rows);

        let text = render_feet(&matrix, &matrix);
        let first = text.lines().next().unwrap();
        assert_eq!(first, format!("@      {FOOT_GAP}      @"));
        assert_eq!(text.lines().count(), MATRIX_ROWS);
    }

    #[test]
    fn test_render_summary_unknown() {
        let snapshot = MeasurementSnapshot::default();
        assert_eq!(
            render_summary(&snapshot, SystemTime::now()),
            "[waiting for measurement] weight ? | length ?"
        );
    }

    #[test]
    fn test_render_summary_full() {
        let accepted_at = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let snapshot = MeasurementSnapshot {
            last_weight: Some(52.3),
            last_accepted_length: Some(74.2),
            last_accepted_at: Some(accepted_at),
            recent_lengths: vec![74.2, 73.9],
            status: StatusMessage::NewMeasurementApproved,
            ..MeasurementSnapshot::default()
        };
        assert_eq!(
            render_summary(&snapshot, accepted_at + Duration::from_secs(3)),
            "[new measurement approved] weight 52.3 kg | length 74.2 cm (3s ago) | recent 74.2, 73.9"
        );
    }
}
