use std::fs;
use std::path::Path;

use nalgebra::{Matrix3, Matrix3x4, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{OverlayError, Result};

/// 歪み係数の最大数 (k1, k2, p1, p2, k3, k4, k5, k6, s1, s2, s3, s4)
pub const MAX_DIST_COEFFS: usize = 12;

// --- ファイル形式 ---

/// `[a, b, c]` と `[[a, b, c]]` / `[[a], [b], [c]]` のどちらも受け付ける
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum NumberList {
    Flat(Vec<f64>),
    Nested(Vec<Vec<f64>>),
}

impl NumberList {
    fn into_vec(self) -> Vec<f64> {
        match self {
            Self::Flat(v) => v,
            Self::Nested(v) => v.into_iter().flatten().collect(),
        }
    }
}

/// 内部パラメータファイル
#[derive(Debug, Deserialize)]
struct IntrinsicsFile {
    camera_matrix: Vec<Vec<f64>>,
    #[serde(default)]
    dist_coeffs: Option<NumberList>,
}

/// 外部パラメータファイル。`best_extrinsic` (3x4) か `rvec` + `tvec`
#[derive(Debug, Deserialize)]
struct ExtrinsicsFile {
    #[serde(default)]
    best_extrinsic: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    rvec: Option<NumberList>,
    #[serde(default)]
    tvec: Option<NumberList>,
    #[serde(default)]
    camera_matrix: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    dist_coeffs: Option<NumberList>,
}

/// 保存形式（外部パラメータファイルと互換）
#[derive(Debug, Serialize)]
struct SavedCalibration {
    camera_matrix: [[f64; 3]; 3],
    dist_coeffs: Vec<f64>,
    best_extrinsic: [[f64; 4]; 3],
}

// --- モデル ---

/// カメラキャリブレーション（内部 K、歪み係数、回転 R、並進 t）
///
/// 読み込み後は不変。セッション間では `Arc` で共有する。
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationModel {
    pub camera_matrix: Matrix3<f64>,
    /// OpenCV 順。足りない係数は 0
    pub dist_coeffs: [f64; MAX_DIST_COEFFS],
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
}

impl CalibrationModel {
    pub fn new(
        camera_matrix: Matrix3<f64>,
        dist_coeffs: &[f64],
        rotation: Matrix3<f64>,
        translation: Vector3<f64>,
    ) -> Result<Self> {
        let model = Self {
            camera_matrix,
            dist_coeffs: pad_dist_coeffs(dist_coeffs)?,
            rotation,
            translation,
        };
        model.validate()?;
        Ok(model)
    }

    /// 回転ベクトル (Rodrigues) から構築
    pub fn from_rvec(
        camera_matrix: Matrix3<f64>,
        dist_coeffs: &[f64],
        rvec: &Vector3<f64>,
        translation: Vector3<f64>,
    ) -> Result<Self> {
        Self::new(camera_matrix, dist_coeffs, rotation_from_rvec(rvec), translation)
    }

    /// 内部・外部パラメータの JSON を読み込む
    ///
    /// K は内部パラメータファイルを優先し、無ければ外部パラメータファイルのもの。
    /// 歪み係数は外部パラメータファイルを優先する。
    pub fn from_files(intrinsics: Option<&Path>, extrinsics: &Path) -> Result<Self> {
        let intr = match intrinsics {
            Some(path) => Some(parse_file::<IntrinsicsFile>(path)?),
            None => None,
        };
        let extr = parse_file::<ExtrinsicsFile>(extrinsics)?;
        let model = Self::from_parts(intr, extr)?;
        log::info!(
            "Loaded calibration (intrinsics: {}, extrinsics: {})",
            intrinsics.map_or_else(|| "-".to_string(), |p| p.display().to_string()),
            extrinsics.display()
        );
        Ok(model)
    }

    /// JSON 文字列から（テスト・埋め込み用）
    pub fn from_json(intrinsics: Option<&str>, extrinsics: &str) -> Result<Self> {
        let intr = match intrinsics {
            Some(text) => Some(parse_str::<IntrinsicsFile>(text, "intrinsics")?),
            None => None,
        };
        let extr = parse_str::<ExtrinsicsFile>(extrinsics, "extrinsics")?;
        Self::from_parts(intr, extr)
    }

    fn from_parts(intr: Option<IntrinsicsFile>, extr: ExtrinsicsFile) -> Result<Self> {
        let camera_matrix = match (&intr, &extr.camera_matrix) {
            (Some(i), _) => matrix3(&i.camera_matrix, "camera_matrix")?,
            (None, Some(k)) => matrix3(k, "camera_matrix")?,
            (None, None) => {
                return Err(OverlayError::Calibration(
                    "no camera_matrix in intrinsics or extrinsics".into(),
                ))
            }
        };

        let dist_coeffs = extr
            .dist_coeffs
            .or_else(|| intr.and_then(|i| i.dist_coeffs))
            .map(NumberList::into_vec)
            .unwrap_or_default();

        let (rotation, translation) = match (extr.best_extrinsic, extr.rvec, extr.tvec) {
            (Some(rt), _, _) => {
                let rt = matrix3x4(&rt)?;
                (
                    rt.fixed_view::<3, 3>(0, 0).into_owned(),
                    rt.column(3).into_owned(),
                )
            }
            (None, Some(rvec), Some(tvec)) => (
                rotation_from_rvec(&vector3(rvec.into_vec(), "rvec")?),
                vector3(tvec.into_vec(), "tvec")?,
            ),
            _ => {
                return Err(OverlayError::Calibration(
                    "extrinsics need best_extrinsic or rvec + tvec".into(),
                ))
            }
        };

        Self::new(camera_matrix, &dist_coeffs, rotation, translation)
    }

    fn validate(&self) -> Result<()> {
        let finite = self.camera_matrix.iter().all(|v| v.is_finite())
            && self.rotation.iter().all(|v| v.is_finite())
            && self.translation.iter().all(|v| v.is_finite())
            && self.dist_coeffs.iter().all(|v| v.is_finite());
        if !finite {
            return Err(OverlayError::Calibration("non-finite value".into()));
        }
        if self.camera_matrix[(0, 0)] == 0.0 || self.camera_matrix[(1, 1)] == 0.0 {
            return Err(OverlayError::Calibration("zero focal length".into()));
        }
        Ok(())
    }

    pub fn fx(&self) -> f64 {
        self.camera_matrix[(0, 0)]
    }

    pub fn fy(&self) -> f64 {
        self.camera_matrix[(1, 1)]
    }

    pub fn cx(&self) -> f64 {
        self.camera_matrix[(0, 2)]
    }

    pub fn cy(&self) -> f64 {
        self.camera_matrix[(1, 2)]
    }

    pub fn rvec(&self) -> Vector3<f64> {
        rvec_from_rotation(&self.rotation)
    }

    /// [R | t]
    pub fn extrinsic(&self) -> Matrix3x4<f64> {
        let mut rt = Matrix3x4::zeros();
        rt.fixed_view_mut::<3, 3>(0, 0).copy_from(&self.rotation);
        rt.set_column(3, &self.translation);
        rt
    }

    /// 外部パラメータファイル形式で保存
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let rt = self.extrinsic();
        let saved = SavedCalibration {
            camera_matrix: std::array::from_fn(|i| std::array::from_fn(|j| self.camera_matrix[(i, j)])),
            dist_coeffs: self.dist_coeffs.to_vec(),
            best_extrinsic: std::array::from_fn(|i| std::array::from_fn(|j| rt[(i, j)])),
        };
        let json = serde_json::to_string_pretty(&saved)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// `save` で書いたファイルを読む
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_files(None, path.as_ref())
    }
}

fn parse_file<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Err(OverlayError::Calibration(format!("{} is empty", path.display())));
    }
    serde_json::from_str(&content)
        .map_err(|e| OverlayError::Calibration(format!("{}: {}", path.display(), e)))
}

fn parse_str<T: for<'de> Deserialize<'de>>(text: &str, label: &str) -> Result<T> {
    if text.trim().is_empty() {
        return Err(OverlayError::Calibration(format!("{} is empty", label)));
    }
    serde_json::from_str(text).map_err(|e| OverlayError::Calibration(format!("{}: {}", label, e)))
}

fn pad_dist_coeffs(coeffs: &[f64]) -> Result<[f64; MAX_DIST_COEFFS]> {
    if coeffs.len() > MAX_DIST_COEFFS {
        return Err(OverlayError::Calibration(format!(
            "{} distortion coefficients (max {})",
            coeffs.len(),
            MAX_DIST_COEFFS
        )));
    }
    let mut out = [0.0; MAX_DIST_COEFFS];
    out[..coeffs.len()].copy_from_slice(coeffs);
    Ok(out)
}

fn matrix3(rows: &[Vec<f64>], label: &str) -> Result<Matrix3<f64>> {
    if rows.len() != 3 || rows.iter().any(|r| r.len() != 3) {
        return Err(OverlayError::Calibration(format!("{} must be 3x3", label)));
    }
    Ok(Matrix3::from_fn(|i, j| rows[i][j]))
}

fn matrix3x4(rows: &[Vec<f64>]) -> Result<Matrix3x4<f64>> {
    if rows.len() != 3 || rows.iter().any(|r| r.len() != 4) {
        return Err(OverlayError::Calibration("best_extrinsic must be 3x4".into()));
    }
    Ok(Matrix3x4::from_fn(|i, j| rows[i][j]))
}

fn vector3(values: Vec<f64>, label: &str) -> Result<Vector3<f64>> {
    if values.len() != 3 {
        return Err(OverlayError::Calibration(format!("{} must have 3 elements", label)));
    }
    Ok(Vector3::new(values[0], values[1], values[2]))
}

/// Rodrigues → 回転行列
pub fn rotation_from_rvec(rvec: &Vector3<f64>) -> Matrix3<f64> {
    let theta = rvec.norm();
    if theta < 1e-10 {
        return Matrix3::identity();
    }
    let k = rvec / theta;
    let (kx, ky, kz) = (k.x, k.y, k.z);
    let ct = theta.cos();
    let st = theta.sin();
    let vt = 1.0 - ct;

    Matrix3::new(
        ct + kx * kx * vt,      kx * ky * vt - kz * st, kx * kz * vt + ky * st,
        ky * kx * vt + kz * st, ct + ky * ky * vt,      ky * kz * vt - kx * st,
        kz * kx * vt - ky * st, kz * ky * vt + kx * st, ct + kz * kz * vt,
    )
}

/// 回転行列 → Rodrigues
pub fn rvec_from_rotation(r: &Matrix3<f64>) -> Vector3<f64> {
    let cos = ((r.trace() - 1.0) / 2.0).clamp(-1.0, 1.0);
    let theta = cos.acos();
    if theta < 1e-10 {
        return Vector3::zeros();
    }

    if std::f64::consts::PI - theta < 1e-6 {
        // θ ≈ π: R = 2kk^T - I
        let m = (r + Matrix3::identity()) * 0.5;
        let i = (0..3)
            .max_by(|&a, &b| m[(a, a)].total_cmp(&m[(b, b)]))
            .unwrap_or(0);
        let axis = m.column(i) / m[(i, i)].sqrt();
        return axis.normalize() * theta;
    }

    let axis = Vector3::new(
        r[(2, 1)] - r[(1, 2)],
        r[(0, 2)] - r[(2, 0)],
        r[(1, 0)] - r[(0, 1)],
    ) / (2.0 * theta.sin());
    axis * theta
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXTRINSICS: &str = r#"{
        "best_extrinsic": [[1, 0, 0, 0.5], [0, 1, 0, -0.25], [0, 0, 1, 3.0]],
        "camera_matrix": [[800, 0, 320], [0, 810, 240], [0, 0, 1]],
        "dist_coeffs": [[0.1, -0.05, 0.001, 0.002, 0.0]]
    }"#;

    const INTRINSICS: &str = r#"{
        "camera_matrix": [[1000, 0, 960], [0, 1000, 540], [0, 0, 1]],
        "dist_coeffs": [0.3, 0.2]
    }"#;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_extrinsics_only() {
        let cal = CalibrationModel::from_json(None, EXTRINSICS).unwrap();
        assert_eq!(cal.fx(), 800.0);
        assert_eq!(cal.fy(), 810.0);
        assert_eq!(cal.translation, Vector3::new(0.5, -0.25, 3.0));
        assert_eq!(cal.rotation, Matrix3::identity());
        assert_eq!(cal.dist_coeffs[0], 0.1);
        assert_eq!(cal.dist_coeffs[5], 0.0);
    }

    #[test]
    fn test_intrinsics_matrix_extrinsics_distortion() {
        let cal = CalibrationModel::from_json(Some(INTRINSICS), EXTRINSICS).unwrap();
        assert_eq!(cal.cx(), 960.0);
        assert_eq!(cal.dist_coeffs[0], 0.1);
    }

    #[test]
    fn test_rvec_tvec_form() {
        let text = r#"{"rvec": [[0], [0], [0]], "tvec": [1, 2, 3]}"#;
        let cal = CalibrationModel::from_json(Some(INTRINSICS), text).unwrap();
        assert_eq!(cal.translation, Vector3::new(1.0, 2.0, 3.0));
        // 内部パラメータ側の歪み係数にフォールバック
        assert_eq!(cal.dist_coeffs[1], 0.2);
    }

    #[test]
    fn test_garbled_is_calibration_error() {
        for text in ["", "   ", "{not json", r#"{"best_extrinsic": [[1, 0, 0]]}"#] {
            let err = CalibrationModel::from_json(Some(INTRINSICS), text).unwrap_err();
            assert!(matches!(err, OverlayError::Calibration(_)), "{}", text);
            assert!(err.is_fatal());
        }
        // K がどこにも無い
        let text = r#"{"best_extrinsic": [[1, 0, 0, 0], [0, 1, 0, 0], [0, 0, 1, 0]]}"#;
        assert!(CalibrationModel::from_json(None, text).is_err());
    }

    #[test]
    fn test_too_many_coefficients() {
        let coeffs = [0.0; 14];
        assert!(CalibrationModel::new(Matrix3::identity(), &coeffs, Matrix3::identity(), Vector3::zeros()).is_err());
    }

    #[test]
    fn test_rodrigues_roundtrip() {
        for rvec in [
            Vector3::new(0.1, -0.2, 0.3),
            Vector3::new(0.0, 0.0, 1.5),
            Vector3::new(std::f64::consts::PI, 0.0, 0.0),
        ] {
            let r = rotation_from_rvec(&rvec);
            // 直交行列
            let should_be_identity = r * r.transpose();
            for i in 0..3 {
                for j in 0..3 {
                    let expected = if i == j { 1.0 } else { 0.0 };
                    assert!(approx_eq(should_be_identity[(i, j)], expected));
                }
            }
            let back = rvec_from_rotation(&r);
            let r2 = rotation_from_rvec(&back);
            for (a, b) in r.iter().zip(r2.iter()) {
                assert!((a - b).abs() < 1e-6);
            }
        }
        assert_eq!(rvec_from_rotation(&Matrix3::identity()), Vector3::zeros());
    }

    #[test]
    fn test_rotation_about_z() {
        let r = rotation_from_rvec(&Vector3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2));
        let p = r * Vector3::new(1.0, 0.0, 0.0);
        assert!(approx_eq(p.x, 0.0));
        assert!(approx_eq(p.y, 1.0));
    }

    #[test]
    fn test_save_load() {
        let cal = CalibrationModel::from_rvec(
            Matrix3::new(900.0, 0.0, 640.0, 0.0, 900.0, 360.0, 0.0, 0.0, 1.0),
            &[0.01, 0.02],
            &Vector3::new(0.1, 0.2, 0.3),
            Vector3::new(0.0, 1.0, 4.0),
        )
        .unwrap();
        let file = tempfile::NamedTempFile::new().unwrap();
        cal.save(file.path()).unwrap();
        let loaded = CalibrationModel::load(file.path()).unwrap();
        assert_eq!(loaded.camera_matrix, cal.camera_matrix);
        assert_eq!(loaded.dist_coeffs, cal.dist_coeffs);
        for (a, b) in loaded.rotation.iter().zip(cal.rotation.iter()) {
            assert!(approx_eq(*a, *b));
        }
    }
}
