use nalgebra::Vector3;
use ndarray::ArrayView2;

use crate::calibration::CalibrationModel;

/// 投影結果
///
/// `points` は有効な行だけを元の順で詰めたもの。
/// `valid_mask[i]` は元の i 行目が投影されたか。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projected {
    pub points: Vec<[f64; 2]>,
    pub valid_mask: Vec<bool>,
}

impl Projected {
    pub fn len(&self) -> usize {
        self.valid_mask.len()
    }

    pub fn is_empty(&self) -> bool {
        self.valid_mask.is_empty()
    }

    /// 元の行インデックスに対応する 2D 点。無効なら None
    pub fn point(&self, index: usize) -> Option<[f64; 2]> {
        if !*self.valid_mask.get(index)? {
            return None;
        }
        let packed = self.valid_mask[..index].iter().filter(|&&v| v).count();
        self.points.get(packed).copied()
    }

    /// 元の行インデックスでアクセスできる形に展開する
    pub fn expand(&self) -> Vec<Option<[f64; 2]>> {
        let mut packed = self.points.iter();
        self.valid_mask
            .iter()
            .map(|&valid| if valid { packed.next().copied() } else { None })
            .collect()
    }

    /// 2D 座標をそのまま使う（投影しない）。NaN を含む行は無効
    pub fn from_pixels(points: ArrayView2<'_, f64>) -> Self {
        let mut out = Self::default();
        for row in points.rows() {
            let valid = row.len() >= 2 && row.iter().take(2).all(|v| !v.is_nan());
            out.valid_mask.push(valid);
            if valid {
                out.points.push([row[0], row[1]]);
            }
        }
        out
    }
}

/// (N, 3) の 3D 点をピクセル座標へ投影する
///
/// NaN を含む行は投影しない。`valid_mask` は NaN 行だけでなく
/// カメラ後方 (Z <= 0) の点でも false になり、その点は `points` に入らない。
/// 画像範囲外の点は有効のまま残し、描画側で除外する。
pub fn project(points: ArrayView2<'_, f64>, calibration: &CalibrationModel) -> Projected {
    let mut out = Projected::default();
    for row in points.rows() {
        let pixel = if row.len() >= 3 && row.iter().take(3).all(|v| !v.is_nan()) {
            project_point(&Vector3::new(row[0], row[1], row[2]), calibration)
        } else {
            None
        };
        out.valid_mask.push(pixel.is_some());
        if let Some(p) = pixel {
            out.points.push(p);
        }
    }
    out
}

/// 1 点の投影。カメラ座標で Z <= 0 なら None
pub fn project_point(point: &Vector3<f64>, calibration: &CalibrationModel) -> Option<[f64; 2]> {
    let cam = calibration.rotation * point + calibration.translation;
    if cam.z <= 0.0 {
        return None;
    }
    let (x, y) = distort(cam.x / cam.z, cam.y / cam.z, &calibration.dist_coeffs);
    let u = calibration.fx() * x + calibration.camera_matrix[(0, 1)] * y + calibration.cx();
    let v = calibration.fy() * y + calibration.cy();
    if u.is_finite() && v.is_finite() {
        Some([u, v])
    } else {
        None
    }
}

/// 正規化座標に歪みを適用
///
/// 係数順: k1, k2, p1, p2, k3, k4, k5, k6, s1, s2, s3, s4
pub fn distort(x: f64, y: f64, d: &[f64; 12]) -> (f64, f64) {
    let [k1, k2, p1, p2, k3, k4, k5, k6, s1, s2, s3, s4] = *d;
    let r2 = x * x + y * y;
    let r4 = r2 * r2;
    let r6 = r4 * r2;

    let radial = (1.0 + k1 * r2 + k2 * r4 + k3 * r6) / (1.0 + k4 * r2 + k5 * r4 + k6 * r6);
    let xd = x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x) + s1 * r2 + s2 * r4;
    let yd = y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y + s3 * r2 + s4 * r4;
    (xd, yd)
}

/// 画像範囲内か（描画時のフィルタ）
pub fn in_bounds(point: [f64; 2], width: usize, height: usize) -> bool {
    let [x, y] = point;
    x >= 0.0 && y >= 0.0 && (x as usize) < width && (y as usize) < height
}
