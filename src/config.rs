use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub mocap: MocapConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MocapConfig {
    /// 列を残すために必要な非空セル数
    #[serde(default = "default_column_threshold")]
    pub column_threshold: usize,
    /// LazyJointCache が一度に読み込むフレーム数
    #[serde(default = "default_preload_size")]
    pub preload_size: usize,
    /// マーカー名の先頭から取り除く ID プレフィックス長 ("Skeleton 001:" = 13)
    #[serde(default = "default_id_prefix_len")]
    pub id_prefix_len: usize,
    /// データ行のうちキャッシュが 0 フレーム目とみなす行
    #[serde(default = "default_start_row")]
    pub start_row: usize,
    /// ヘッダより前のメタデータ行数
    #[serde(default = "default_metadata_rows")]
    pub metadata_rows: usize,
    /// ヘッダブロック内の各行の位置
    #[serde(default = "default_type_row")]
    pub type_row: usize,
    #[serde(default = "default_name_row")]
    pub name_row: usize,
    #[serde(default = "default_id_row")]
    pub id_row: usize,
    #[serde(default = "default_kind_row")]
    pub kind_row: usize,
    #[serde(default = "default_axis_row")]
    pub axis_row: usize,
}

fn default_column_threshold() -> usize { 600 }
fn default_preload_size() -> usize { 1 }
fn default_id_prefix_len() -> usize { 13 }
fn default_start_row() -> usize { 0 }
fn default_metadata_rows() -> usize { 1 }
fn default_type_row() -> usize { 0 }
fn default_name_row() -> usize { 1 }
fn default_id_row() -> usize { 2 }
fn default_kind_row() -> usize { 3 }
fn default_axis_row() -> usize { 4 }

impl Default for MocapConfig {
    fn default() -> Self {
        Self {
            column_threshold: default_column_threshold(),
            preload_size: default_preload_size(),
            id_prefix_len: default_id_prefix_len(),
            start_row: default_start_row(),
            metadata_rows: default_metadata_rows(),
            type_row: default_type_row(),
            name_row: default_name_row(),
            id_row: default_id_row(),
            kind_row: default_kind_row(),
            axis_row: default_axis_row(),
        }
    }
}

impl MocapConfig {
    /// ヘッダブロックの行数
    pub fn header_rows(&self) -> usize {
        [self.type_row, self.name_row, self.id_row, self.kind_row, self.axis_row]
            .iter()
            .max()
            .map_or(0, |m| m + 1)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct VideoConfig {
    /// 動画なしセッション用の黒フレームサイズ
    #[serde(default = "default_blank_width")]
    pub blank_width: u32,
    #[serde(default = "default_blank_height")]
    pub blank_height: u32,
    #[serde(default = "default_blank_fps")]
    pub blank_fps: f64,
    /// 次フレームの先読みスレッドを使うか
    #[serde(default = "default_prefetch")]
    pub prefetch: bool,
}

fn default_blank_width() -> u32 { 1920 }
fn default_blank_height() -> u32 { 1080 }
fn default_blank_fps() -> f64 { 30.0 }
fn default_prefetch() -> bool { true }

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            blank_width: default_blank_width(),
            blank_height: default_blank_height(),
            blank_fps: default_blank_fps(),
            prefetch: default_prefetch(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RenderConfig {
    #[serde(default = "default_point_radius")]
    pub point_radius: i32,
    #[serde(default = "default_line_thickness")]
    pub line_thickness: i32,
    /// 骨格線の色 = 点の色 × edge_shade
    #[serde(default = "default_edge_shade")]
    pub edge_shade: f32,
    #[serde(default = "default_show_skeleton")]
    pub show_skeleton: bool,
    /// 2D トラックの色 (BGR)
    #[serde(default = "default_pixel_track_color")]
    pub pixel_track_color: [u8; 3],
}

fn default_point_radius() -> i32 { 4 }
fn default_line_thickness() -> i32 { 2 }
fn default_edge_shade() -> f32 { 0.7 }
fn default_show_skeleton() -> bool { true }
fn default_pixel_track_color() -> [u8; 3] { [34, 139, 230] }

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            point_radius: default_point_radius(),
            line_thickness: default_line_thickness(),
            edge_shade: default_edge_shade(),
            show_skeleton: default_show_skeleton(),
            pixel_track_color: default_pixel_track_color(),
        }
    }
}

/// 入力ファイルのパス（すべて任意）
#[derive(Debug, Deserialize, Default, Clone)]
pub struct PathsConfig {
    pub video: Option<PathBuf>,
    pub intrinsics: Option<PathBuf>,
    pub extrinsics: Option<PathBuf>,
    /// ターゲット関節テーブルで読む Motive エクスポート
    pub mocap: Option<PathBuf>,
    /// 全マーカーを表示する Motive エクスポート
    pub raw_mocap: Option<PathBuf>,
    #[serde(default)]
    pub keypoints: Vec<PathBuf>,
    /// 中央視点だけの 2D トラック
    #[serde(default)]
    pub pixel_tracks: Vec<PathBuf>,
    #[serde(default)]
    pub pixel_views: Vec<PixelViewPaths>,
    pub export: Option<PathBuf>,
}

/// 中央・左の 2 視点を持つ 2D トラック（`[[paths.pixel_views]]`）
#[derive(Debug, Deserialize, Default, Clone)]
pub struct PixelViewPaths {
    pub name: Option<String>,
    pub center: Option<PathBuf>,
    pub left: Option<PathBuf>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// ファイルが無ければデフォルト。壊れたファイルはエラーを記録してデフォルトを使う
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("{} not found, using default config", path.display());
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("{:#}; using default config", e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.mocap.column_threshold, 600);
        assert_eq!(config.mocap.id_prefix_len, 13);
        assert_eq!(config.mocap.header_rows(), 5);
        assert_eq!(config.video.blank_width, 1920);
        assert!((config.render.edge_shade - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [mocap]
            preload_size = 64

            [paths]
            video = "take.mp4"
            keypoints = ["a.csv", "b.csv"]
            "#,
        )
        .unwrap();
        assert_eq!(config.mocap.preload_size, 64);
        assert_eq!(config.mocap.column_threshold, 600);
        assert_eq!(config.paths.video, Some(PathBuf::from("take.mp4")));
        assert_eq!(config.paths.keypoints.len(), 2);
        assert!(config.render.show_skeleton);
    }

    #[test]
    fn test_pixel_views_table() {
        let config: Config = toml::from_str(
            r#"
            [paths]
            pixel_tracks = ["c.csv"]

            [[paths.pixel_views]]
            name = "subject"
            center = "center.npy"
            left = "left.npy"

            [[paths.pixel_views]]
            left = "only_left.csv"
            "#,
        )
        .unwrap();
        let views = &config.paths.pixel_views;
        assert_eq!(config.paths.pixel_tracks.len(), 1);
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].name.as_deref(), Some("subject"));
        assert_eq!(views[0].left, Some(PathBuf::from("left.npy")));
        assert!(views[1].center.is_none());
    }

    #[test]
    fn test_load_or_default_missing() {
        let config = Config::load_or_default("/nonexistent/config.toml");
        assert_eq!(config.video.blank_height, 1080);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[render]\nshow_skeleton = false\npoint_radius = 6").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert!(!config.render.show_skeleton);
        assert_eq!(config.render.point_radius, 6);
    }

    #[test]
    fn test_load_malformed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[render\nshow_skeleton = ").unwrap();
        assert!(Config::load(file.path()).is_err());
    }
}
