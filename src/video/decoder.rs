use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use super::frame::Frame;
use super::source::{Cursor, FrameSource};
use crate::error::{OverlayError, Result};

/// ストリーム順にフレームを読むデコーダ
///
/// 同じハンドルへの seek / read は同時に呼ばれない（`VideoFrameSource` が
/// Mutex で直列化する）。
pub trait Decoder: Send + 'static {
    fn frame_count(&self) -> usize;
    fn fps(&self) -> f64;
    fn resolution(&self) -> (usize, usize);
    /// 次の `read` が index 番目を返すよう位置を合わせる
    fn seek(&mut self, index: usize) -> Result<()>;
    /// 次のフレーム。ストリーム終端は `Ok(None)`
    fn read(&mut self) -> Result<Option<Frame>>;
}

/// デコーダと、次に `read` で返るフレーム番号
struct DecodeHandle<D> {
    decoder: D,
    next_index: Option<usize>,
}

impl<D: Decoder> DecodeHandle<D> {
    /// 連続なら読むだけ、そうでなければシークしてから読む
    fn read_at(&mut self, index: usize) -> Option<Frame> {
        if self.next_index != Some(index) {
            log::debug!("Seek to frame {}", index);
            if let Err(e) = self.decoder.seek(index) {
                log::warn!("Seek to frame {} failed: {}", index, e);
                self.next_index = None;
                return None;
            }
        }
        match self.decoder.read() {
            Ok(Some(frame)) => {
                self.next_index = Some(index + 1);
                Some(frame)
            }
            Ok(None) => {
                log::warn!("No frame at index {}", index);
                self.next_index = None;
                None
            }
            Err(e) => {
                log::warn!("Read of frame {} failed: {}", index, e);
                self.next_index = None;
                None
            }
        }
    }
}

fn lock<D>(shared: &Mutex<DecodeHandle<D>>) -> MutexGuard<'_, DecodeHandle<D>> {
    shared.lock().unwrap_or_else(|e| e.into_inner())
}

struct Request {
    index: usize,
    generation: u64,
}

struct Prefetched {
    index: usize,
    generation: u64,
    frame: Option<Frame>,
}

/// 次フレームを先読みするワーカー
///
/// 要求・結果ともに 1 スロットのチャネル。ワーカーはシークせず、
/// ハンドルの位置が要求と一致するときだけ読む。
struct Prefetcher {
    requests: Option<SyncSender<Request>>,
    results: Receiver<Prefetched>,
    worker: Option<thread::JoinHandle<()>>,
}

impl Prefetcher {
    fn spawn<D: Decoder>(shared: Arc<Mutex<DecodeHandle<D>>>) -> Self {
        let (request_tx, request_rx) = mpsc::sync_channel::<Request>(1);
        let (result_tx, result_rx) = mpsc::sync_channel::<Prefetched>(1);

        let worker = thread::spawn(move || {
            while let Ok(request) = request_rx.recv() {
                let mut handle = lock(&shared);
                if handle.next_index != Some(request.index) {
                    continue;
                }
                let frame = handle.read_at(request.index);
                // ロックを保持したまま結果を置く
                let result = Prefetched {
                    index: request.index,
                    generation: request.generation,
                    frame,
                };
                if let Err(TrySendError::Full(stale)) = result_tx.try_send(result) {
                    log::debug!("Prefetch slot full, dropping frame {}", stale.index);
                }
            }
        });

        Self {
            requests: Some(request_tx),
            results: result_rx,
            worker: Some(worker),
        }
    }

    fn request(&self, index: usize, generation: u64) {
        if let Some(tx) = &self.requests {
            // 前の要求が処理中なら諦める
            let _ = tx.try_send(Request { index, generation });
        }
    }

    /// スロットを空にし、一致する結果があれば返す
    fn take(&self, index: usize, generation: u64) -> Option<Option<Frame>> {
        let mut found = None;
        while let Ok(result) = self.results.try_recv() {
            if result.index == index && result.generation == generation {
                found = Some(result.frame);
            } else {
                log::debug!("Discarding stale prefetch of frame {}", result.index);
            }
        }
        found
    }
}

impl Drop for Prefetcher {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// デコーダを使った `FrameSource`
///
/// - 直前に返したフレームの次なら、シークせずに読む
/// - それ以外はシークしてから読む
/// - 同じフレームの再要求は 1 フレームキャッシュから返す
pub struct VideoFrameSource<D: Decoder> {
    shared: Arc<Mutex<DecodeHandle<D>>>,
    frame_count: usize,
    fps: f64,
    resolution: (usize, usize),
    cursor: Cursor,
    cache: Option<(usize, Frame)>,
    generation: u64,
    prefetcher: Option<Prefetcher>,
}

impl<D: Decoder> VideoFrameSource<D> {
    pub fn new(decoder: D, prefetch: bool) -> Result<Self> {
        let frame_count = decoder.frame_count();
        let fps = decoder.fps();
        let resolution = decoder.resolution();
        if frame_count == 0 {
            return Err(OverlayError::Decoder("video has no frames".into()));
        }
        if fps.is_nan() || fps <= 0.0 {
            return Err(OverlayError::Decoder(format!("invalid frame rate {}", fps)));
        }

        let shared = Arc::new(Mutex::new(DecodeHandle {
            decoder,
            next_index: Some(0),
        }));
        let prefetcher = if prefetch {
            Some(Prefetcher::spawn(Arc::clone(&shared)))
        } else {
            None
        };

        Ok(Self {
            shared,
            frame_count,
            fps,
            resolution,
            cursor: Cursor::new(frame_count),
            cache: None,
            generation: 0,
            prefetcher,
        })
    }

    /// キャッシュ済みのフレーム番号
    pub fn cached_index(&self) -> Option<usize> {
        self.cache.as_ref().map(|(i, _)| *i)
    }
}

impl<D: Decoder> FrameSource for VideoFrameSource<D> {
    fn frame_count(&self) -> usize {
        self.frame_count
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn resolution(&self) -> (usize, usize) {
        self.resolution
    }

    fn current_frame(&self) -> usize {
        self.cursor.get()
    }

    fn set_current_frame(&mut self, index: usize) {
        self.cursor.set(index);
    }

    fn get_frame(&mut self, index: usize) -> Result<Option<Frame>> {
        if index >= self.frame_count {
            return Err(OverlayError::out_of_range(index, self.frame_count));
        }
        if let Some((cached, frame)) = &self.cache {
            if *cached == index {
                return Ok(Some(frame.clone()));
            }
        }

        let frame = {
            let mut handle = lock(&self.shared);
            let prefetched = self
                .prefetcher
                .as_ref()
                .and_then(|p| p.take(index, self.generation));
            match prefetched {
                Some(frame) => frame,
                None => handle.read_at(index),
            }
        };

        let Some(frame) = frame else {
            self.cache = None;
            return Ok(None);
        };
        self.cache = Some((index, frame.clone()));

        if let Some(prefetcher) = &self.prefetcher {
            if index + 1 < self.frame_count {
                prefetcher.request(index + 1, self.generation);
            }
        }
        Ok(Some(frame))
    }

    fn invalidate(&mut self) {
        self.cache = None;
        self.cancel_prefetch();
    }

    fn cancel_prefetch(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}
