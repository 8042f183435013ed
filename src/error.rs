use std::path::PathBuf;

use thiserror::Error;

/// ライブラリ共通のエラー型
///
/// - 構築時の致命的エラー（動画・キャリブレーション・関節ゼロ・ヘッダ不整合）
/// - 範囲外アクセス（`OutOfRange`）
/// - 回復可能な入力検証エラー（`InvalidTime`）
#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("Cannot open video '{path}': {reason}")]
    VideoOpen { path: PathBuf, reason: String },

    #[error("Video decoder error: {0}")]
    Decoder(String),

    #[error("Invalid calibration: {0}")]
    Calibration(String),

    #[error("No usable joints after schema parsing ({dropped_columns} sparse columns dropped)")]
    NoUsableJoints { dropped_columns: usize },

    #[error("Header row {row} has {actual} columns, expected {expected}")]
    HeaderMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Malformed table: {0}")]
    Table(String),

    #[error("Index {index} out of range (len {len})")]
    OutOfRange { index: i64, len: usize },

    #[error("Invalid time '{0}': expected HH:MM:SS")]
    InvalidTime(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("NPY error: {0}")]
    Npy(#[from] ndarray_npy::ReadNpyError),
}

impl OverlayError {
    pub fn out_of_range(index: impl TryInto<i64>, len: usize) -> Self {
        Self::OutOfRange {
            index: index.try_into().unwrap_or(i64::MAX),
            len,
        }
    }

    /// セッションを中断すべきエラーか
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::OutOfRange { .. } | Self::InvalidTime(_))
    }

    pub fn is_out_of_range(&self) -> bool {
        matches!(self, Self::OutOfRange { .. })
    }
}

pub type Result<T> = std::result::Result<T, OverlayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(OverlayError::out_of_range(10usize, 5).is_out_of_range());
        assert!(!OverlayError::out_of_range(10usize, 5).is_fatal());
        assert!(!OverlayError::InvalidTime("1:2".into()).is_fatal());
        assert!(OverlayError::NoUsableJoints { dropped_columns: 3 }.is_fatal());
        assert!(OverlayError::Calibration("empty".into()).is_fatal());
    }

    #[test]
    fn test_out_of_range_negative_index() {
        match OverlayError::out_of_range(-3i64, 5) {
            OverlayError::OutOfRange { index, len } => {
                assert_eq!(index, -3);
                assert_eq!(len, 5);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
