use std::sync::Arc;

use ndarray::{Array3, ArrayView2};

use super::raw_table::RawTable;
use super::target::{JointResolution, JointSource, MarkerColumns, MarkerMatch, TargetJointTable};
use crate::error::{OverlayError, Result};

/// ターゲット関節配列を窓単位で遅延ロードするキャッシュ
///
/// キャッシュ外のフレームが要求されると `[index, index + preload_size)` を
/// 読み直し、前の窓は破棄する（LRU ではない）。順方向再生に最適化。
/// 欠損は NaN のまま保持し、投影側で除外する。
pub struct LazyJointCache {
    table: Arc<RawTable>,
    columns: MarkerColumns,
    targets: Arc<TargetJointTable>,
    start_row: usize,
    preload_size: usize,
    id_prefix_len: usize,
    total_frames: usize,
    resolved: Option<Vec<JointResolution>>,
    window: Array3<f64>,
    range: (usize, usize),
    reloads: usize,
}

impl LazyJointCache {
    pub fn new(
        table: Arc<RawTable>,
        columns: MarkerColumns,
        start_row: usize,
        targets: Arc<TargetJointTable>,
        preload_size: usize,
        id_prefix_len: usize,
    ) -> Self {
        let total_frames = table.num_rows().saturating_sub(start_row);
        let joints = targets.len();
        Self {
            table,
            columns,
            targets,
            start_row,
            preload_size: preload_size.max(1),
            id_prefix_len,
            total_frames,
            resolved: None,
            window: Array3::zeros((0, joints, 3)),
            range: (0, 0),
            reloads: 0,
        }
    }

    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    /// (frames, joints, 3)
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.total_frames, self.targets.len(), 3)
    }

    pub fn targets(&self) -> &Arc<TargetJointTable> {
        &self.targets
    }

    /// 現在キャッシュしている範囲 [start, end)
    pub fn cached_range(&self) -> (usize, usize) {
        self.range
    }

    /// 窓を読み直した回数
    pub fn reload_count(&self) -> usize {
        self.reloads
    }

    /// 列の解決結果（初回アクセス時に確定）
    pub fn resolutions(&mut self) -> &[JointResolution] {
        self.ensure_resolved();
        self.resolved.as_deref().unwrap_or(&[])
    }

    pub fn get(&mut self, frame: usize) -> Result<ArrayView2<'_, f64>> {
        if frame >= self.total_frames {
            return Err(OverlayError::out_of_range(frame, self.total_frames));
        }
        if frame < self.range.0 || frame >= self.range.1 {
            self.load(frame, frame.saturating_add(self.preload_size));
        }
        Ok(self
            .window
            .index_axis(ndarray::Axis(0), frame - self.range.0))
    }

    fn ensure_resolved(&mut self) {
        if self.resolved.is_some() {
            return;
        }
        let resolved = self.columns.resolve_all(&self.targets, self.id_prefix_len);
        for (id, res) in resolved.iter().enumerate() {
            for (marker, m) in &res.matches {
                if m.columns().is_none() {
                    log::warn!("Target joint {} marker '{}' ({}): {}", id, marker.name, marker.kind, m);
                } else if let MarkerMatch::Duplicated { .. } = m {
                    log::debug!("Target joint {} marker '{}': {}", id, marker.name, m);
                }
            }
        }
        self.resolved = Some(resolved);
    }

    fn load(&mut self, start: usize, end: usize) {
        self.ensure_resolved();
        let end = end.min(self.total_frames);
        let joints = self.targets.len();
        let mut window = Array3::<f64>::from_elem((end - start, joints, 3), f64::NAN);

        if let Some(resolved) = &self.resolved {
            for frame in start..end {
                let row = self.start_row + frame;
                for (j, res) in resolved.iter().enumerate() {
                    let position = match &res.source {
                        Some(JointSource::Single(cols)) => self.read_triplet(row, cols),
                        Some(JointSource::Midpoint(a, b)) => {
                            let pa = self.read_triplet(row, a);
                            let pb = self.read_triplet(row, b);
                            [
                                (pa[0] + pb[0]) / 2.0,
                                (pa[1] + pb[1]) / 2.0,
                                (pa[2] + pb[2]) / 2.0,
                            ]
                        }
                        None => continue,
                    };
                    for axis in 0..3 {
                        window[[frame - start, j, axis]] = position[axis];
                    }
                }
            }
        }

        log::debug!("Joint cache loaded frames [{}, {})", start, end);
        self.window = window;
        self.range = (start, end);
        self.reloads += 1;
    }

    fn read_triplet(&self, row: usize, cols: &[usize; 3]) -> [f64; 3] {
        [
            self.table.value(row, cols[0]),
            self.table.value(row, cols[1]),
            self.table.value(row, cols[2]),
        ]
    }
}
