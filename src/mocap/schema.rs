use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use ndarray::{Array2, Array3, ArrayView2};

use super::raw_table::{parse_cell, RawTable};
use crate::error::{OverlayError, Result};

/// 列の値の種類。Text 列は空白のみのセルも空とみなす
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Text,
    /// 関節の候補にしない列（Frame, Time, 回転成分など）
    Skip,
}

/// 列ごとのラベルと種類（"{id}:{category} {number}:{label}({type})_X" など）
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnHint {
    pub label: String,
    pub kind: ColumnKind,
}

impl ColumnHint {
    pub fn new(label: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            label: label.into(),
            kind,
        }
    }

    pub fn skip() -> Self {
        Self::new("", ColumnKind::Skip)
    }

    /// 非空セルに一つでも数値以外があれば Text
    pub fn infer(table: &RawTable, col: usize, label: impl Into<String>) -> Self {
        let is_text = table.column(col).any(|cell| {
            let trimmed = cell.trim();
            !trimmed.is_empty() && trimmed.parse::<f64>().is_err()
        });
        let kind = if is_text { ColumnKind::Text } else { ColumnKind::Numeric };
        Self::new(label, kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// "_X" / "_Y" / "_Z" を取り除いたベース名と軸
    pub fn split_suffix(label: &str) -> Option<(&str, Axis)> {
        let (base, axis) = if let Some(base) = label.strip_suffix("_X") {
            (base, Axis::X)
        } else if let Some(base) = label.strip_suffix("_Y") {
            (base, Axis::Y)
        } else if let Some(base) = label.strip_suffix("_Z") {
            (base, Axis::Z)
        } else {
            return None;
        };
        Some((base, axis))
    }
}

/// 関節の並び順キー (カテゴリ優先度, ID)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct JointSortKey {
    pub priority: u8,
    pub id: IdToken,
}

/// 数値 ID は非数値 ID より前
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum IdToken {
    Numeric(u64),
    Text(String),
}

impl JointSortKey {
    /// `{id}:{category} {number}:{label}({type})` 形式の名前からキーを作る
    pub fn from_name(name: &str) -> Self {
        let mut parts = name.split(':');
        let id_part = parts.next().unwrap_or("");
        let category = parts
            .next()
            .map(|p| p.trim().split(' ').next().unwrap_or(""))
            .unwrap_or("");

        let priority = if category.contains("Skeleton") {
            0
        } else if category.contains("Unlabeled") {
            2
        } else {
            1
        };

        let id = if !id_part.is_empty() && id_part.chars().all(|c| c.is_ascii_digit()) {
            match id_part.parse::<u64>() {
                Ok(v) => IdToken::Numeric(v),
                Err(_) => IdToken::Text(id_part.to_string()),
            }
        } else {
            IdToken::Text(id_part.to_string())
        };

        Self { priority, id }
    }
}

/// キー、同値なら名前で比較（列順に依存しない全順序）
pub fn compare_joint_names(a: &str, b: &str) -> Ordering {
    JointSortKey::from_name(a)
        .cmp(&JointSortKey::from_name(b))
        .then_with(|| a.cmp(b))
}

/// 並び順の確定した関節名と (X, Y, Z) 列インデックス
#[derive(Debug, Clone, Default)]
pub struct JointSchema {
    names: Vec<String>,
    columns: Vec<[usize; 3]>,
    index: HashMap<String, usize>,
}

impl JointSchema {
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn columns(&self) -> &[[usize; 3]] {
        &self.columns
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    fn push(&mut self, name: String, columns: [usize; 3]) {
        self.index.insert(name.clone(), self.names.len());
        self.names.push(name);
        self.columns.push(columns);
    }
}

/// パース結果。警告扱いの情報（削除列数・欠けた軸の関節）も含む
#[derive(Debug, Clone)]
pub struct ParsedSchema {
    pub schema: JointSchema,
    /// (frames, joints, 3)
    pub data: Array3<f64>,
    pub dropped_columns: usize,
    pub incomplete_joints: Vec<String>,
}

/// 整形時のセル欠損の扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapFill {
    /// 0 で埋める（一括処理向け）
    Zero,
    /// NaN のまま残す（表示時にフレームごとに除外する）
    Nan,
}

pub struct JointSchemaParser {
    threshold: usize,
    gap_fill: GapFill,
}

impl Default for JointSchemaParser {
    fn default() -> Self {
        Self::new(600)
    }
}

impl JointSchemaParser {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            gap_fill: GapFill::Zero,
        }
    }

    pub fn with_gap_fill(mut self, gap_fill: GapFill) -> Self {
        self.gap_fill = gap_fill;
        self
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// 列の有効セル数
    pub fn valid_count(table: &RawTable, col: usize, kind: ColumnKind) -> usize {
        match kind {
            ColumnKind::Numeric => table.column(col).filter(|c| !parse_cell(c).is_nan()).count(),
            ColumnKind::Text => table.column(col).filter(|c| !c.trim().is_empty()).count(),
            ColumnKind::Skip => 0,
        }
    }

    pub fn parse(&self, table: &RawTable, hints: &[ColumnHint]) -> Result<ParsedSchema> {
        if hints.len() != table.width() {
            return Err(OverlayError::Table(format!(
                "{} column hints for {} columns",
                hints.len(),
                table.width()
            )));
        }

        // 1. 疎な列を除外
        let candidates: Vec<usize> = (0..hints.len())
            .filter(|&col| hints[col].kind != ColumnKind::Skip)
            .collect();
        let kept: Vec<usize> = candidates
            .iter()
            .copied()
            .filter(|&col| Self::valid_count(table, col, hints[col].kind) >= self.threshold)
            .collect();
        let dropped_columns = candidates.len() - kept.len();
        if dropped_columns > 0 {
            log::warn!(
                "Dropping {} columns with fewer than {} valid values",
                dropped_columns,
                self.threshold
            );
        }

        // 2. 軸サフィックスでグループ化
        let mut groups: BTreeMap<&str, [Option<usize>; 3]> = BTreeMap::new();
        for &col in &kept {
            if let Some((base, axis)) = Axis::split_suffix(&hints[col].label) {
                let slot = groups.entry(base).or_insert([None; 3]);
                slot[axis as usize] = Some(col);
            }
        }

        // 3. 並び替え
        let mut names: Vec<&str> = groups.keys().copied().collect();
        names.sort_by(|a, b| compare_joint_names(a, b));

        let mut schema = JointSchema::default();
        let mut incomplete_joints = Vec::new();
        for name in names {
            match groups[name] {
                [Some(x), Some(y), Some(z)] => schema.push(name.to_string(), [x, y, z]),
                _ => {
                    log::warn!("{} does not have all X, Y, Z coordinates. Skipping.", name);
                    incomplete_joints.push(name.to_string());
                }
            }
        }

        if schema.is_empty() {
            return Err(OverlayError::NoUsableJoints { dropped_columns });
        }

        // 4. (frames, joints, 3) へ整形
        let frames = table.num_rows();
        let mut data = Array3::<f64>::zeros((frames, schema.len(), 3));
        for (j, cols) in schema.columns().iter().enumerate() {
            for (axis, &col) in cols.iter().enumerate() {
                for frame in 0..frames {
                    let v = table.value(frame, col);
                    data[[frame, j, axis]] = match self.gap_fill {
                        GapFill::Zero if v.is_nan() => 0.0,
                        _ => v,
                    };
                }
            }
        }

        log::info!(
            "Reshaped data to ({}, {}, 3) (Frames, Joints, XYZ)",
            frames,
            schema.len()
        );

        Ok(ParsedSchema {
            schema,
            data,
            dropped_columns,
            incomplete_joints,
        })
    }
}

/// 全マーカーを保持した録画データ
#[derive(Debug, Clone)]
pub struct MocapRecording {
    schema: JointSchema,
    data: Array3<f64>,
}

impl MocapRecording {
    pub fn new(parsed: ParsedSchema) -> Self {
        Self {
            schema: parsed.schema,
            data: parsed.data,
        }
    }

    pub fn total_frames(&self) -> usize {
        self.data.dim().0
    }

    pub fn schema(&self) -> &JointSchema {
        &self.schema
    }

    pub fn joint_names(&self) -> &[String] {
        self.schema.names()
    }

    pub fn joint_index(&self, name: &str) -> Option<usize> {
        self.schema.index_of(name)
    }

    pub fn frame(&self, frame: usize) -> Result<ArrayView2<'_, f64>> {
        if frame >= self.total_frames() {
            return Err(OverlayError::out_of_range(frame, self.total_frames()));
        }
        Ok(self.data.index_axis(ndarray::Axis(0), frame))
    }

    /// 指定した名前の関節だけを (N, 3) で返す。未知の名前は無視
    pub fn joints_by_names<S: AsRef<str>>(&self, frame: usize, names: &[S]) -> Result<Array2<f64>> {
        let view = self.frame(frame)?;
        let indices: Vec<usize> = names
            .iter()
            .filter_map(|n| self.schema.index_of(n.as_ref()))
            .collect();
        let mut out = Array2::<f64>::zeros((indices.len(), 3));
        for (row, &j) in indices.iter().enumerate() {
            out.row_mut(row).assign(&view.row(j));
        }
        Ok(out)
    }

    /// "Skeleton 001" など、名前に category を含む関節
    pub fn names_in_category(&self, category: &str) -> Vec<String> {
        self.schema
            .names()
            .iter()
            .filter(|n| n.contains(category))
            .cloned()
            .collect()
    }
}
