use std::fmt;

/// 参照するマーカー (名前, 種類)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerRef {
    pub name: String,
    /// ヘッダの Type 行に対する前方一致 ("Bone" は "Bone Marker" にも一致する)
    pub kind: String,
}

impl MarkerRef {
    pub fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
        }
    }
}

/// 1 つのターゲット関節の定義。マーカー 2 つなら中点（仮想関節）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetJoint {
    Single(MarkerRef),
    Midpoint(MarkerRef, MarkerRef),
}

impl TargetJoint {
    pub fn markers(&self) -> Vec<&MarkerRef> {
        match self {
            Self::Single(m) => vec![m],
            Self::Midpoint(a, b) => vec![a, b],
        }
    }
}

/// ターゲット関節 ID (0..N-1) → マーカー定義
///
/// 読み込み後は不変。スレッド間で `Arc` 共有する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetJointTable {
    joints: Vec<TargetJoint>,
}

impl TargetJointTable {
    pub fn new(joints: Vec<TargetJoint>) -> Self {
        Self { joints }
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&TargetJoint> {
        self.joints.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetJoint> {
        self.joints.iter()
    }

    /// Motive スケルトンから SMPL 24 関節順への対応表
    pub fn smpl24() -> Self {
        use TargetJoint::{Midpoint, Single};
        let bone = |n: &str| MarkerRef::new(n, "Bone");
        let marker = |n: &str| MarkerRef::new(n, "Bone Marker");
        Self::new(vec![
            Single(bone("Hip")),
            Single(bone("LThigh")),
            Single(bone("RThigh")),
            Single(bone("Ab")),
            Single(bone("LShin")),
            Single(bone("RShin")),
            Midpoint(marker("BackLeft"), marker("BackRight")),
            Single(bone("LFoot")),
            Single(bone("RFoot")),
            Single(marker("BackTop")),
            Single(bone("LToe")),
            Single(bone("RToe")),
            Single(bone("Neck")),
            Single(bone("LShoulder")),
            Single(bone("RShoulder")),
            Single(bone("Head")),
            Single(bone("LUArm")),
            Single(bone("RUArm")),
            Single(bone("LFArm")),
            Single(bone("RFArm")),
            Midpoint(marker("LWristIn"), marker("LWristOut")),
            Midpoint(marker("RWristIn"), marker("RWristOut")),
            Single(marker("RHandOut")),
            // 元データに LHandOut が無いため右手を流用している
            Single(marker("RHandOut")),
        ])
    }
}

/// マーカー名と種類のヘッダ（列ごと）
#[derive(Debug, Clone, Default)]
pub struct MarkerColumns {
    pub names: Vec<String>,
    pub kinds: Vec<String>,
}

/// 1 マーカーの列照合結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerMatch {
    /// ちょうど 3 列
    Exact([usize; 3]),
    /// 4 列以上。最後の 3 列を採用（Bone は回転 4 列 + 位置 3 列の並び）
    Duplicated { columns: [usize; 3], total: usize },
    /// 1〜2 列しか無い
    Incomplete { found: usize },
    Unmatched,
}

impl MarkerMatch {
    pub fn columns(&self) -> Option<[usize; 3]> {
        match self {
            Self::Exact(c) | Self::Duplicated { columns: c, .. } => Some(*c),
            _ => None,
        }
    }
}

impl fmt::Display for MarkerMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(c) => write!(f, "columns {:?}", c),
            Self::Duplicated { columns, total } => {
                write!(f, "columns {:?} (last 3 of {} matches)", columns, total)
            }
            Self::Incomplete { found } => write!(f, "incomplete ({} columns)", found),
            Self::Unmatched => write!(f, "unmatched"),
        }
    }
}

/// ターゲット関節の解決結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JointSource {
    Single([usize; 3]),
    Midpoint([usize; 3], [usize; 3]),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JointResolution {
    pub matches: Vec<(MarkerRef, MarkerMatch)>,
    pub source: Option<JointSource>,
}

impl MarkerColumns {
    /// 名前 (ID プレフィックス除去後) が一致し、種類が前方一致する列
    pub fn match_marker(&self, marker: &MarkerRef, id_prefix_len: usize) -> MarkerMatch {
        let found: Vec<usize> = self
            .names
            .iter()
            .zip(self.kinds.iter())
            .enumerate()
            .filter(|(_, (name, kind))| {
                strip_id_prefix(name, id_prefix_len) == marker.name && kind.starts_with(&marker.kind)
            })
            .map(|(i, _)| i)
            .collect();

        match found.len() {
            0 => MarkerMatch::Unmatched,
            1 | 2 => MarkerMatch::Incomplete { found: found.len() },
            3 => MarkerMatch::Exact([found[0], found[1], found[2]]),
            n => MarkerMatch::Duplicated {
                columns: [found[n - 3], found[n - 2], found[n - 1]],
                total: n,
            },
        }
    }

    pub fn resolve(&self, joint: &TargetJoint, id_prefix_len: usize) -> JointResolution {
        let matches: Vec<(MarkerRef, MarkerMatch)> = joint
            .markers()
            .into_iter()
            .map(|m| (m.clone(), self.match_marker(m, id_prefix_len)))
            .collect();

        let source = match (joint, matches.as_slice()) {
            (TargetJoint::Single(_), [(_, m)]) => m.columns().map(JointSource::Single),
            (TargetJoint::Midpoint(..), [(_, a), (_, b)]) => match (a.columns(), b.columns()) {
                (Some(a), Some(b)) => Some(JointSource::Midpoint(a, b)),
                _ => None,
            },
            _ => None,
        };

        JointResolution { matches, source }
    }

    pub fn resolve_all(&self, table: &TargetJointTable, id_prefix_len: usize) -> Vec<JointResolution> {
        table.iter().map(|j| self.resolve(j, id_prefix_len)).collect()
    }
}

/// 先頭 n 文字（"Skeleton 001:" など）を取り除く。短い名前は空文字列
pub fn strip_id_prefix(name: &str, n: usize) -> &str {
    match name.char_indices().nth(n) {
        Some((i, _)) => &name[i..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(entries: &[(&str, &str)]) -> MarkerColumns {
        MarkerColumns {
            names: entries.iter().map(|(n, _)| n.to_string()).collect(),
            kinds: entries.iter().map(|(_, k)| k.to_string()).collect(),
        }
    }

    #[test]
    fn test_smpl24_table() {
        let table = TargetJointTable::smpl24();
        assert_eq!(table.len(), 24);
        assert!(matches!(table.get(6), Some(TargetJoint::Midpoint(..))));
        assert!(matches!(table.get(0), Some(TargetJoint::Single(m)) if m.name == "Hip"));
        assert_eq!(table.get(24), None);
    }

    #[test]
    fn test_strip_id_prefix() {
        assert_eq!(strip_id_prefix("Skeleton 001:Hip", 13), "Hip");
        assert_eq!(strip_id_prefix("Short", 13), "");
        assert_eq!(strip_id_prefix("Skeleton 001:", 13), "");
    }

    #[test]
    fn test_bone_keeps_last_three_columns() {
        let cols = columns(&[
            ("", ""),
            ("Skeleton 001:Hip", "Bone"),
            ("Skeleton 001:Hip", "Bone"),
            ("Skeleton 001:Hip", "Bone"),
            ("Skeleton 001:Hip", "Bone"),
            ("Skeleton 001:Hip", "Bone"),
            ("Skeleton 001:Hip", "Bone"),
            ("Skeleton 001:Hip", "Bone"),
        ]);
        let m = cols.match_marker(&MarkerRef::new("Hip", "Bone"), 13);
        assert_eq!(m, MarkerMatch::Duplicated { columns: [5, 6, 7], total: 7 });
        assert_eq!(m.columns(), Some([5, 6, 7]));
    }

    #[test]
    fn test_kind_prefix_match() {
        let cols = columns(&[
            ("Skeleton 001:BackTop", "Bone Marker"),
            ("Skeleton 001:BackTop", "Bone Marker"),
            ("Skeleton 001:BackTop", "Bone Marker"),
            ("Skeleton 001:BackTop", "Marker"),
        ]);
        assert_eq!(
            cols.match_marker(&MarkerRef::new("BackTop", "Bone Marker"), 13),
            MarkerMatch::Exact([0, 1, 2])
        );
        // "Bone" は "Bone Marker" に前方一致する
        assert_eq!(
            cols.match_marker(&MarkerRef::new("BackTop", "Bone"), 13),
            MarkerMatch::Exact([0, 1, 2])
        );
        assert_eq!(
            cols.match_marker(&MarkerRef::new("BackTop", "Rigid"), 13),
            MarkerMatch::Unmatched
        );
    }

    #[test]
    fn test_midpoint_resolution() {
        let cols = columns(&[
            ("Skeleton 001:A", "Bone Marker"),
            ("Skeleton 001:A", "Bone Marker"),
            ("Skeleton 001:A", "Bone Marker"),
            ("Skeleton 001:B", "Bone Marker"),
            ("Skeleton 001:B", "Bone Marker"),
            ("Skeleton 001:B", "Bone Marker"),
        ]);
        let joint = TargetJoint::Midpoint(
            MarkerRef::new("A", "Bone Marker"),
            MarkerRef::new("B", "Bone Marker"),
        );
        let res = cols.resolve(&joint, 13);
        assert_eq!(res.source, Some(JointSource::Midpoint([0, 1, 2], [3, 4, 5])));
    }

    #[test]
    fn test_midpoint_with_missing_marker_unresolved() {
        let cols = columns(&[
            ("Skeleton 001:A", "Bone Marker"),
            ("Skeleton 001:A", "Bone Marker"),
            ("Skeleton 001:A", "Bone Marker"),
            ("Skeleton 001:B", "Bone Marker"),
        ]);
        let joint = TargetJoint::Midpoint(
            MarkerRef::new("A", "Bone Marker"),
            MarkerRef::new("B", "Bone Marker"),
        );
        let res = cols.resolve(&joint, 13);
        assert_eq!(res.source, None);
        assert_eq!(res.matches[1].1, MarkerMatch::Incomplete { found: 1 });
    }
}
