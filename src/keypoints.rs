use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use ndarray::{s, Array3, ArrayView2};
use ndarray_npy::{read_npy, ReadNpyError};

use crate::error::{OverlayError, Result};
use crate::mocap::raw_table::parse_cell;

/// 抽出済み 3D キーポイント (frames, joints, 3)
///
/// CSV は 1 行目がヘッダ (`0_x,0_y,0_z,1_x,...`)、以降 1 行 1 フレーム。
/// 数値にならないセルは NaN として保持し、描画時に除外する。
/// `.npy` は (frames, joints, 3) の配列をそのまま読む。
#[derive(Debug, Clone)]
pub struct KeypointSequence {
    name: String,
    data: Array3<f64>,
}

impl KeypointSequence {
    pub fn new(name: impl Into<String>, data: Array3<f64>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let seq = if is_npy(path) {
            let data = read_array(path)?;
            if data.dim().2 != 3 {
                return Err(OverlayError::Table(format!(
                    "{}: shape {:?}, expected (frames, joints, 3)",
                    path.display(),
                    data.shape()
                )));
            }
            Self::new(display_name(path), data)
        } else {
            Self::from_reader(display_name(path), File::open(path)?)?
        };
        log::info!(
            "Loaded {} ({} frames, {} joints)",
            path.display(),
            seq.total_frames(),
            seq.num_joints()
        );
        Ok(seq)
    }

    pub fn from_reader<R: Read>(name: impl Into<String>, reader: R) -> Result<Self> {
        let (headers, values) = read_numeric(reader)?;
        let width = headers.len();
        if width == 0 || width % 3 != 0 {
            return Err(OverlayError::Table(format!(
                "{} columns, expected a multiple of 3 (joints * XYZ)",
                width
            )));
        }
        let frames = values.len() / width;
        let data = Array3::from_shape_vec((frames, width / 3, 3), values)
            .map_err(|e| OverlayError::Table(e.to_string()))?;
        Ok(Self::new(name, data))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn total_frames(&self) -> usize {
        self.data.dim().0
    }

    pub fn num_joints(&self) -> usize {
        self.data.dim().1
    }

    pub fn frame(&self, frame: usize) -> Result<ArrayView2<'_, f64>> {
        if frame >= self.total_frames() {
            return Err(OverlayError::out_of_range(frame, self.total_frames()));
        }
        Ok(self.data.index_axis(ndarray::Axis(0), frame))
    }
}

/// 投影済みの 2D ピクセル座標 (frames, joints, 2)
#[derive(Debug, Clone)]
pub struct PixelTrack {
    name: String,
    data: Array3<f64>,
}

impl PixelTrack {
    pub fn new(name: impl Into<String>, data: Array3<f64>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// `.npy` は (frames, joints, 2) か (frames, joints, 3)。3 列目 (score) は捨てる
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let track = if is_npy(path) {
            let data = read_array(path)?;
            if !(2..=3).contains(&data.dim().2) {
                return Err(OverlayError::Table(format!(
                    "{}: shape {:?}, expected (frames, points, 2 or 3)",
                    path.display(),
                    data.shape()
                )));
            }
            Self::new(display_name(path), data.slice(s![.., .., ..2]).to_owned())
        } else {
            Self::from_reader(display_name(path), File::open(path)?)?
        };
        log::info!(
            "Loaded 2D track {} ({} frames, {} points)",
            path.display(),
            track.total_frames(),
            track.num_joints()
        );
        Ok(track)
    }

    /// 1 点の列数はヘッダで決まる（[`point_stride`]）。score 列は読み捨てる
    pub fn from_reader<R: Read>(name: impl Into<String>, reader: R) -> Result<Self> {
        let (headers, values) = read_numeric(reader)?;
        let width = headers.len();
        let stride = point_stride(&headers)?;

        let frames = values.len() / width;
        let joints = width / stride;
        let mut data = Array3::<f64>::zeros((frames, joints, 2));
        for f in 0..frames {
            for j in 0..joints {
                let base = f * width + j * stride;
                data[[f, j, 0]] = values[base];
                data[[f, j, 1]] = values[base + 1];
            }
        }
        Ok(Self::new(name, data))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn total_frames(&self) -> usize {
        self.data.dim().0
    }

    pub fn num_joints(&self) -> usize {
        self.data.dim().1
    }

    pub fn frame(&self, frame: usize) -> Result<ArrayView2<'_, f64>> {
        if frame >= self.total_frames() {
            return Err(OverlayError::out_of_range(frame, self.total_frames()));
        }
        Ok(self.data.index_axis(ndarray::Axis(0), frame))
    }
}

/// 表示用のファイル名
pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn is_npy(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("npy"))
}

/// f64 で読めなければ f32 として読み直す
fn read_array(path: &Path) -> Result<Array3<f64>> {
    match read_npy::<_, Array3<f64>>(path) {
        Ok(data) => Ok(data),
        Err(ReadNpyError::WrongDescriptor(_)) => {
            let data: Array3<f32> = read_npy(path)?;
            Ok(data.mapv(f64::from))
        }
        Err(e) => Err(e.into()),
    }
}

/// 2D トラック CSV の 1 点あたりの列数
///
/// 先頭 2 列の軸ラベルが x, y なら次の x 列までの幅（`0_x,0_y,1_x` なら 2、
/// `0_x,0_y,0_score,1_x` なら 3）。軸ラベルの無いヘッダは (x, y, score) の 3 列組。
pub fn point_stride(headers: &[String]) -> Result<usize> {
    let labels: Vec<String> = headers.iter().map(|h| axis_label(h)).collect();
    let stride = if labels.len() >= 2 && labels[0] == "x" && labels[1] == "y" {
        labels[1..]
            .iter()
            .position(|l| l == "x")
            .map_or(labels.len(), |p| p + 1)
    } else {
        3
    };
    if headers.is_empty() || !(2..=3).contains(&stride) || headers.len() % stride != 0 {
        return Err(OverlayError::Table(format!(
            "{} columns, expected (x, y, score) triplets or (x, y) pairs",
            headers.len()
        )));
    }
    Ok(stride)
}

/// "0_x" / "x0" / "Nose.X" -> "x"
fn axis_label(header: &str) -> String {
    header
        .split(|c: char| !c.is_alphanumeric())
        .map(|token| token.trim_matches(|c: char| c.is_ascii_digit()))
        .filter(|token| !token.is_empty())
        .last()
        .unwrap_or("")
        .to_lowercase()
}

/// ヘッダ 1 行 + 数値行。短い行は NaN で埋める
fn read_numeric<R: Read>(reader: R) -> Result<(Vec<String>, Vec<f64>)> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let width = headers.len();

    let mut values = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() > width {
            return Err(OverlayError::Table(format!(
                "row {} has {} columns, header has {}",
                i,
                record.len(),
                width
            )));
        }
        values.extend((0..width).map(|c| record.get(c).map_or(f64::NAN, parse_cell)));
    }
    Ok((headers, values))
}
