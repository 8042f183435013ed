use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use super::cache::LazyJointCache;
use super::raw_table::RawTable;
use super::schema::{ColumnHint, GapFill, JointSchemaParser, MocapRecording, ParsedSchema};
use super::target::{MarkerColumns, TargetJointTable};
use crate::config::MocapConfig;
use crate::error::{OverlayError, Result};

/// Motive の CSV エクスポート
///
/// メタデータ行の後に Type / Name / ID / (Rotation|Position) / 軸 の
/// ヘッダ行が並び、その後が 1 行 1 サンプルのデータ。
pub struct MotiveExport {
    table: Arc<RawTable>,
    types: Vec<String>,
    names: Vec<String>,
    ids: Vec<String>,
    kinds: Vec<String>,
    axes: Vec<String>,
}

impl MotiveExport {
    pub fn from_path<P: AsRef<Path>>(path: P, config: &MocapConfig) -> Result<Self> {
        let table = RawTable::from_path(path, config.metadata_rows, config.header_rows())?;
        Self::from_table(table, config)
    }

    pub fn from_reader<R: Read>(reader: R, config: &MocapConfig) -> Result<Self> {
        let table = RawTable::from_reader(reader, config.metadata_rows, config.header_rows())?;
        Self::from_table(table, config)
    }

    pub fn from_table(table: RawTable, config: &MocapConfig) -> Result<Self> {
        let row = |index: usize, label: &str| {
            table.header_strings(index).ok_or_else(|| {
                OverlayError::Table(format!("missing {} header row (row {})", label, index))
            })
        };
        let types = row(config.type_row, "type")?;
        let names = row(config.name_row, "name")?;
        let ids = row(config.id_row, "id")?;
        let kinds = row(config.kind_row, "rotation/position")?;
        let axes = row(config.axis_row, "axis")?;

        Ok(Self {
            table: Arc::new(table),
            types,
            names,
            ids,
            kinds,
            axes,
        })
    }

    pub fn table(&self) -> &Arc<RawTable> {
        &self.table
    }

    pub fn total_frames(&self) -> usize {
        self.table.num_rows()
    }

    /// 位置列だけに `"{ID}:{Name}({Type})_{Axis}"` のラベルを付ける
    pub fn position_hints(&self) -> Vec<ColumnHint> {
        (0..self.table.width())
            .map(|col| {
                if self.kinds[col] != "Position" {
                    return ColumnHint::skip();
                }
                let label = format!(
                    "{}:{}({})_{}",
                    self.ids[col], self.names[col], self.types[col], self.axes[col]
                );
                ColumnHint::infer(&self.table, col, label)
            })
            .collect()
    }

    pub fn marker_columns(&self) -> MarkerColumns {
        MarkerColumns {
            names: self.names.clone(),
            kinds: self.types.clone(),
        }
    }

    /// 全マーカーを (frames, joints, 3) に展開する
    /// 位置列だけを関節ごとに整形する（削除列数などの報告付き）
    pub fn parse_positions(&self, column_threshold: usize, gap_fill: GapFill) -> Result<ParsedSchema> {
        JointSchemaParser::new(column_threshold)
            .with_gap_fill(gap_fill)
            .parse(&self.table, &self.position_hints())
    }

    pub fn recording(&self, column_threshold: usize, gap_fill: GapFill) -> Result<MocapRecording> {
        self.parse_positions(column_threshold, gap_fill).map(MocapRecording::new)
    }

    pub fn joint_cache(&self, config: &MocapConfig, targets: Arc<TargetJointTable>) -> LazyJointCache {
        LazyJointCache::new(
            Arc::clone(&self.table),
            self.marker_columns(),
            config.start_row,
            targets,
            config.preload_size,
            config.id_prefix_len,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "\
Format Version,1.23,Take Name,walk,Capture Frame Rate,120

,,Bone,Bone,Bone,Bone,Bone,Bone,Bone,Marker,Marker,Marker
,,Skeleton 001:Hip,Skeleton 001:Hip,Skeleton 001:Hip,Skeleton 001:Hip,Skeleton 001:Hip,Skeleton 001:Hip,Skeleton 001:Hip,Unlabeled 1000,Unlabeled 1000,Unlabeled 1000
,,1,1,1,1,1,1,1,2,2,2
,,Rotation,Rotation,Rotation,Rotation,Position,Position,Position,Position,Position,Position
Frame,Time (Seconds),X,Y,Z,W,X,Y,Z,X,Y,Z
0,0.000,0.1,0.2,0.3,0.9,10,20,30,,,
1,0.008,0.1,0.2,0.3,0.9,11,21,31,5,6,7
";

    fn small_config() -> MocapConfig {
        MocapConfig {
            column_threshold: 1,
            ..MocapConfig::default()
        }
    }

    #[test]
    fn test_header_rows() {
        let export = MotiveExport::from_reader(EXPORT.as_bytes(), &small_config()).unwrap();
        assert_eq!(export.total_frames(), 2);
        assert_eq!(export.table().width(), 12);
    }

    #[test]
    fn test_position_hints_skip_rotation() {
        let export = MotiveExport::from_reader(EXPORT.as_bytes(), &small_config()).unwrap();
        let hints = export.position_hints();
        assert_eq!(hints[0], ColumnHint::skip());
        assert_eq!(hints[2], ColumnHint::skip());
        assert_eq!(hints[6].label, "1:Skeleton 001:Hip(Bone)_X");
        assert_eq!(hints[11].label, "2:Unlabeled 1000(Marker)_Z");
    }

    #[test]
    fn test_recording_uses_positions() {
        let export = MotiveExport::from_reader(EXPORT.as_bytes(), &small_config()).unwrap();
        let recording = export.recording(1, GapFill::Zero).unwrap();
        assert_eq!(
            recording.joint_names(),
            &["1:Skeleton 001:Hip(Bone)".to_string(), "2:Unlabeled 1000(Marker)".to_string()]
        );
        let frame = recording.frame(1).unwrap();
        assert_eq!(frame.row(0).to_vec(), vec![11.0, 21.0, 31.0]);
        assert_eq!(recording.frame(0).unwrap().row(1).to_vec(), vec![0.0, 0.0, 0.0]);

        let display = export.recording(1, GapFill::Nan).unwrap();
        assert!(display.frame(0).unwrap()[[1, 0]].is_nan());
    }

    #[test]
    fn test_joint_cache_picks_position_columns() {
        use crate::mocap::target::{MarkerRef, TargetJoint};

        let config = small_config();
        let export = MotiveExport::from_reader(EXPORT.as_bytes(), &config).unwrap();
        let targets = Arc::new(TargetJointTable::new(vec![TargetJoint::Single(MarkerRef::new(
            "Hip", "Bone",
        ))]));
        let mut cache = export.joint_cache(&config, targets);
        assert_eq!(cache.get(0).unwrap().row(0).to_vec(), vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_missing_header_row() {
        let config = MocapConfig {
            axis_row: 9,
            ..MocapConfig::default()
        };
        let text = "meta\na,b\nc,d\n";
        assert!(MotiveExport::from_reader(text.as_bytes(), &config).is_err());
    }
}
