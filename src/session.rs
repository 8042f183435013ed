use std::sync::Arc;

use crate::calibration::CalibrationModel;
use crate::config::{Config, RenderConfig};
use crate::error::Result;
use crate::keypoints::{display_name, KeypointSequence, PixelTrack};
use crate::mocap::{GapFill, LazyJointCache, MocapRecording, MotiveExport, TargetJointTable};
use crate::projection::{project, Projected};
use crate::render::skeleton::{palette_color, RAW_MOCAP_COLOR};
use crate::render::{DrawStyle, Layer, RenderContext};
use crate::sync::TemporalAligner;

/// 重ねて表示するデータ
pub enum SourceData {
    /// 抽出済み 3D キーポイント
    Keypoints(KeypointSequence),
    /// ターゲット関節表で読むモーキャプ
    TargetJoints(LazyJointCache),
    /// 全マーカー。selection の名前だけ表示する
    RawMocap {
        recording: MocapRecording,
        selection: Vec<String>,
    },
    /// 投影済み 2D 座標（オフセットも投影も使わない）。視点ごとに任意
    PixelTrack {
        center: Option<PixelTrack>,
        left: Option<PixelTrack>,
    },
}

impl SourceData {
    /// 3D データのフレーム数。2D トラックは None
    pub fn frames_3d(&self) -> Option<usize> {
        match self {
            Self::Keypoints(seq) => Some(seq.total_frames()),
            Self::TargetJoints(cache) => Some(cache.total_frames()),
            Self::RawMocap { recording, .. } => Some(recording.total_frames()),
            Self::PixelTrack { .. } => None,
        }
    }
}

/// 2D トラックの表示視点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelView {
    #[default]
    Center,
    Left,
}

impl PixelView {
    pub fn toggled(self) -> Self {
        match self {
            Self::Center => Self::Left,
            Self::Left => Self::Center,
        }
    }
}

pub struct OverlaySource {
    pub name: String,
    pub data: SourceData,
    /// BGR
    pub color: [u8; 3],
    pub visible: bool,
}

/// 表示状態の一式
///
/// 描画時はここから `RenderContext` を作り、描画側は状態を持たない。
pub struct Session {
    aligner: TemporalAligner,
    sources: Vec<OverlaySource>,
    show_skeleton: bool,
    pixel_view: PixelView,
    calibration: Option<Arc<CalibrationModel>>,
    style: DrawStyle,
    pixel_track_color: [u8; 3],
    skeleton_sources: usize,
}

impl Session {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            aligner: TemporalAligner::default(),
            sources: Vec::new(),
            show_skeleton: config.show_skeleton,
            pixel_view: PixelView::default(),
            calibration: None,
            style: DrawStyle::from(config),
            pixel_track_color: config.pixel_track_color,
            skeleton_sources: 0,
        }
    }

    /// 設定ファイルのパスからすべてのソースを読み込む
    ///
    /// 外部パラメータが無ければキャリブレーションなし（何も描かない）。
    pub fn load(config: &Config) -> Result<Self> {
        let mut session = Self::new(&config.render);
        let paths = &config.paths;

        if let Some(extrinsics) = &paths.extrinsics {
            let calibration = CalibrationModel::from_files(paths.intrinsics.as_deref(), extrinsics)?;
            session.set_calibration(Some(Arc::new(calibration)));
        } else {
            log::warn!("No extrinsics configured, overlays are disabled");
        }

        for path in &paths.keypoints {
            session.add_keypoints(KeypointSequence::from_path(path)?);
        }

        if let Some(path) = &paths.mocap {
            let export = MotiveExport::from_path(path, &config.mocap)?;
            let cache = export.joint_cache(&config.mocap, Arc::new(TargetJointTable::smpl24()));
            session.add_target_joints(display_name(path), cache);
        }

        if let Some(path) = &paths.raw_mocap {
            let export = MotiveExport::from_path(path, &config.mocap)?;
            let recording = export.recording(config.mocap.column_threshold, GapFill::Nan)?;
            session.add_raw_mocap(format!("{} (raw)", display_name(path)), recording);
        }

        for path in &paths.pixel_tracks {
            session.add_pixel_track(PixelTrack::from_path(path)?);
        }

        for view in &paths.pixel_views {
            let center = view.center.as_deref().map(PixelTrack::from_path).transpose()?;
            let left = view.left.as_deref().map(PixelTrack::from_path).transpose()?;
            let name = view
                .name
                .clone()
                .or_else(|| view.center.as_deref().or(view.left.as_deref()).map(display_name))
                .unwrap_or_else(|| "pixel2d".to_string());
            session.add_pixel_views(name, center, left);
        }

        Ok(session)
    }

    // --- 状態 ---

    pub fn aligner(&self) -> &TemporalAligner {
        &self.aligner
    }

    pub fn offset(&self) -> i64 {
        self.aligner.offset()
    }

    pub fn set_offset(&mut self, offset: i64) {
        self.aligner.set_offset(offset);
    }

    pub fn adjust_offset(&mut self, delta: i64) -> i64 {
        self.aligner.adjust(delta)
    }

    pub fn show_skeleton(&self) -> bool {
        self.show_skeleton
    }

    pub fn set_show_skeleton(&mut self, show: bool) {
        self.show_skeleton = show;
    }

    pub fn pixel_view(&self) -> PixelView {
        self.pixel_view
    }

    pub fn set_pixel_view(&mut self, view: PixelView) {
        self.pixel_view = view;
    }

    pub fn calibration(&self) -> Option<&Arc<CalibrationModel>> {
        self.calibration.as_ref()
    }

    pub fn set_calibration(&mut self, calibration: Option<Arc<CalibrationModel>>) {
        self.calibration = calibration;
    }

    pub fn sources(&self) -> &[OverlaySource] {
        &self.sources
    }

    pub fn set_visible(&mut self, index: usize, visible: bool) -> bool {
        match self.sources.get_mut(index) {
            Some(source) => {
                source.visible = visible;
                true
            }
            None => false,
        }
    }

    /// 読み込まれた 3D データの最大フレーム数（黒フレームソースの長さ）
    pub fn max_frame_3d(&self) -> usize {
        self.sources
            .iter()
            .filter_map(|s| s.data.frames_3d())
            .max()
            .unwrap_or(0)
    }

    // --- 読み込み ---

    fn push(&mut self, name: String, data: SourceData, color: [u8; 3]) -> usize {
        log::info!("Added overlay source #{} '{}'", self.sources.len(), name);
        self.sources.push(OverlaySource {
            name,
            data,
            color,
            visible: true,
        });
        self.sources.len() - 1
    }

    /// 骨格を持つソースは読み込み順にパレットの色を割り当てる
    fn next_color(&mut self) -> [u8; 3] {
        let color = palette_color(self.skeleton_sources);
        self.skeleton_sources += 1;
        color
    }

    pub fn add_keypoints(&mut self, seq: KeypointSequence) -> usize {
        let color = self.next_color();
        let name = seq.name().to_string();
        self.push(name, SourceData::Keypoints(seq), color)
    }

    pub fn add_target_joints(&mut self, name: impl Into<String>, cache: LazyJointCache) -> usize {
        let color = self.next_color();
        self.push(name.into(), SourceData::TargetJoints(cache), color)
    }

    /// 初期状態では全関節を表示する
    pub fn add_raw_mocap(&mut self, name: impl Into<String>, recording: MocapRecording) -> usize {
        let selection = recording.joint_names().to_vec();
        self.push(
            name.into(),
            SourceData::RawMocap {
                recording,
                selection,
            },
            RAW_MOCAP_COLOR,
        )
    }

    /// 中央視点だけの 2D トラック
    pub fn add_pixel_track(&mut self, track: PixelTrack) -> usize {
        let name = track.name().to_string();
        self.add_pixel_views(name, Some(track), None)
    }

    pub fn add_pixel_views(
        &mut self,
        name: impl Into<String>,
        center: Option<PixelTrack>,
        left: Option<PixelTrack>,
    ) -> usize {
        let color = self.pixel_track_color;
        self.push(name.into(), SourceData::PixelTrack { center, left }, color)
    }

    /// 全マーカー表示の対象を差し替える。対象外のソースなら false
    pub fn set_raw_selection(&mut self, index: usize, names: Vec<String>) -> bool {
        match self.sources.get_mut(index).map(|s| &mut s.data) {
            Some(SourceData::RawMocap { selection, .. }) => {
                *selection = names;
                true
            }
            _ => false,
        }
    }

    /// "Skeleton 001" など 1 カテゴリだけ表示する
    pub fn select_raw_category(&mut self, index: usize, category: &str) -> bool {
        let names = match self.sources.get(index).map(|s| &s.data) {
            Some(SourceData::RawMocap { recording, .. }) => recording.names_in_category(category),
            _ => return false,
        };
        self.set_raw_selection(index, names)
    }

    // --- 描画 ---

    /// 表示フレームに対応するデータを集めて投影する
    ///
    /// 対応インデックスが配列外のソースはこのフレームでは描かない。
    /// キャリブレーションが無ければ 2D トラックも含めて何も描かない。
    pub fn render_context(&mut self, display_frame: usize) -> Result<RenderContext> {
        let layers = match self.calibration.clone() {
            Some(cal) => self.layers(display_frame, &cal)?,
            None => Vec::new(),
        };
        Ok(RenderContext {
            display_frame,
            effective_index: self.aligner.effective_index(display_frame as i64),
            layers,
            style: self.style,
        })
    }

    fn layers(&mut self, display_frame: usize, cal: &CalibrationModel) -> Result<Vec<Layer>> {
        let aligner = self.aligner;
        let show_skeleton = self.show_skeleton;
        let pixel_view = self.pixel_view;
        let mut layers = Vec::new();

        for source in self.sources.iter_mut().filter(|s| s.visible) {
            let (points, skeleton) = match &mut source.data {
                SourceData::PixelTrack { center, left } => {
                    let track = match pixel_view {
                        PixelView::Center => center.as_ref(),
                        PixelView::Left => left.as_ref(),
                    };
                    let Some(track) = track.filter(|t| display_frame < t.total_frames()) else {
                        continue;
                    };
                    (Projected::from_pixels(track.frame(display_frame)?), show_skeleton)
                }
                data => {
                    let Some(len) = data.frames_3d() else {
                        continue;
                    };
                    let Some(index) = aligner.paired_index(display_frame, len) else {
                        continue;
                    };
                    match data {
                        SourceData::Keypoints(seq) => (project(seq.frame(index)?, cal), show_skeleton),
                        SourceData::TargetJoints(cache) => (project(cache.get(index)?, cal), show_skeleton),
                        SourceData::RawMocap {
                            recording,
                            selection,
                        } => {
                            let joints = recording.joints_by_names(index, selection)?;
                            (project(joints.view(), cal), false)
                        }
                        SourceData::PixelTrack { .. } => continue,
                    }
                }
            };
            layers.push(Layer {
                name: source.name.clone(),
                points,
                color: source.color,
                skeleton,
            });
        }
        Ok(layers)
    }
}
