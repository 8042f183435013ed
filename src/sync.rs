use crate::error::{OverlayError, Result};

/// 表示フレームとモーキャプサンプルの対応付け
///
/// 状態はオフセットだけ。オフセットを変えても再読み込みは発生しない。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TemporalAligner {
    offset: i64,
}

impl TemporalAligner {
    pub fn new(offset: i64) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn set_offset(&mut self, offset: i64) {
        self.offset = offset;
    }

    pub fn adjust(&mut self, delta: i64) -> i64 {
        self.offset = self.offset.saturating_add(delta);
        self.offset
    }

    /// display_frame + offset（クリップしない）
    pub fn effective_index(&self, display_frame: i64) -> i64 {
        effective_index(display_frame, self.offset)
    }

    /// 長さ len の配列に対する対応インデックス。範囲外なら None（そのフレームは描画しない）
    pub fn paired_index(&self, display_frame: usize, len: usize) -> Option<usize> {
        let index = self.effective_index(display_frame as i64);
        if index >= 0 && (index as u64) < len as u64 {
            Some(index as usize)
        } else {
            None
        }
    }

    /// 長さ len の配列に収まるようクランプした対応インデックス。空配列なら None
    pub fn clamped_index(&self, display_frame: usize, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let index = self.effective_index(display_frame as i64);
        Some(index.clamp(0, len as i64 - 1) as usize)
    }
}

pub fn effective_index(display_frame: i64, offset: i64) -> i64 {
    display_frame.wrapping_add(offset)
}

pub fn frame_to_time(frame: usize, fps: f64) -> f64 {
    if fps <= 0.0 {
        return 0.0;
    }
    frame as f64 / fps
}

/// round(seconds * fps) を [0, frame_count - 1] にクランプ
pub fn time_to_frame(seconds: f64, fps: f64, frame_count: usize) -> usize {
    if frame_count == 0 {
        return 0;
    }
    let frame = (seconds * fps).round();
    if frame.is_nan() || frame <= 0.0 {
        0
    } else {
        (frame as usize).min(frame_count - 1)
    }
}

/// "HH:MM:SS" を秒に変換する
pub fn parse_timestamp(text: &str) -> Result<u64> {
    let invalid = || OverlayError::InvalidTime(text.to_string());
    let parts: Vec<&str> = text.trim().split(':').collect();
    if parts.len() != 3 {
        return Err(invalid());
    }
    let mut fields = [0u64; 3];
    for (field, part) in fields.iter_mut().zip(&parts) {
        *field = part.trim().parse::<u64>().map_err(|_| invalid())?;
    }
    let [h, m, s] = fields;
    h.checked_mul(3600)
        .and_then(|v| v.checked_add(m.checked_mul(60)?))
        .and_then(|v| v.checked_add(s))
        .ok_or_else(invalid)
}

/// 時刻文字列からフレーム番号を求める
pub fn locate_by_time(text: &str, fps: f64, frame_count: usize) -> Result<usize> {
    let seconds = parse_timestamp(text)?;
    Ok(time_to_frame(seconds as f64, fps, frame_count))
}

/// 秒を "HH:MM:SS" に整形（小数部は切り捨て）
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// 再生位置の表示文字列 ("HH:MM:SS / HH:MM:SS", "Frame: i / n")
pub fn status_lines(frame: usize, frame_count: usize, fps: f64) -> [String; 2] {
    [
        format!(
            "{} / {}",
            format_time(frame_to_time(frame, fps)),
            format_time(frame_to_time(frame_count, fps))
        ),
        format!("Frame: {} / {}", frame, frame_count),
    ]
}
