use std::path::Path;

use opencv::{
    core::{self, Mat, Scalar},
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureTrait},
};

use super::decoder::{Decoder, VideoFrameSource};
use super::frame::Frame;
use crate::error::{OverlayError, Result};

fn cv_err(e: opencv::Error) -> OverlayError {
    OverlayError::Decoder(e.to_string())
}

/// OpenCV の VideoCapture を使った動画デコーダ
pub struct OpenCvDecoder {
    capture: VideoCapture,
    frame_count: usize,
    fps: f64,
    width: usize,
    height: usize,
}

impl OpenCvDecoder {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let open_err = |reason: String| OverlayError::VideoOpen {
            path: path.to_path_buf(),
            reason,
        };
        let name = path.to_str().ok_or_else(|| open_err("non UTF-8 path".into()))?;

        let capture = VideoCapture::from_file(name, videoio::CAP_ANY).map_err(|e| open_err(e.to_string()))?;
        if !capture.is_opened().map_err(|e| open_err(e.to_string()))? {
            return Err(open_err("not a readable video".into()));
        }

        let prop = |id: i32| capture.get(id).map_err(|e| open_err(e.to_string()));
        let frame_count = prop(videoio::CAP_PROP_FRAME_COUNT)?.max(0.0) as usize;
        let fps = prop(videoio::CAP_PROP_FPS)?;
        let width = prop(videoio::CAP_PROP_FRAME_WIDTH)? as usize;
        let height = prop(videoio::CAP_PROP_FRAME_HEIGHT)? as usize;
        if frame_count == 0 || fps <= 0.0 {
            return Err(open_err(format!("{} frames at {} fps", frame_count, fps)));
        }

        log::info!(
            "Opened {} ({}x{}, {} frames, {:.3} fps)",
            path.display(),
            width,
            height,
            frame_count,
            fps
        );
        Ok(Self {
            capture,
            frame_count,
            fps,
            width,
            height,
        })
    }
}

impl Decoder for OpenCvDecoder {
    fn frame_count(&self) -> usize {
        self.frame_count
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn resolution(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn seek(&mut self, index: usize) -> Result<()> {
        self.capture
            .set(videoio::CAP_PROP_POS_FRAMES, index as f64)
            .map_err(cv_err)?;
        Ok(())
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        let mut mat = Mat::default();
        if !self.capture.read(&mut mat).map_err(cv_err)? || mat.empty() {
            return Ok(None);
        }
        mat_to_frame(&mat).map(Some)
    }
}

/// 動画ファイルを開いて `FrameSource` にする
pub fn open_video<P: AsRef<Path>>(path: P, prefetch: bool) -> Result<VideoFrameSource<OpenCvDecoder>> {
    VideoFrameSource::new(OpenCvDecoder::open(path)?, prefetch)
}

/// BGR 8bit 3ch の Mat を Frame へ
pub fn mat_to_frame(mat: &Mat) -> Result<Frame> {
    if mat.typ() != core::CV_8UC3 {
        return Err(OverlayError::Decoder(format!("unsupported Mat type {}", mat.typ())));
    }
    let continuous;
    let mat = if mat.is_continuous() {
        mat
    } else {
        continuous = mat.try_clone().map_err(cv_err)?;
        &continuous
    };
    let data = mat.data_bytes().map_err(cv_err)?.to_vec();
    Frame::new(mat.cols() as usize, mat.rows() as usize, data)
}

pub fn frame_to_mat(frame: &Frame) -> Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(
        frame.height() as i32,
        frame.width() as i32,
        core::CV_8UC3,
        Scalar::all(0.0),
    )
    .map_err(cv_err)?;
    mat.data_bytes_mut().map_err(cv_err)?.copy_from_slice(frame.data());
    Ok(mat)
}
