use crate::error::Result;
use crate::render::compose;
use crate::session::Session;
use crate::sync;
use crate::video::{Frame, FrameSource};

/// 再生状態とナビゲーション
///
/// 更新タイマーから `tick` を呼ぶ。フレームは 1 枚ずつ順に描画し、
/// 合成が終わってからカーソルを進める。手動操作はすべて再生を止めてから行う。
#[derive(Debug, Default)]
pub struct Playback {
    playing: bool,
}

impl Playback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// 再生/停止を切り替え、切り替え後の状態を返す
    pub fn toggle<S: FrameSource + ?Sized>(&mut self, source: &S) -> bool {
        self.playing = !self.playing && source.frame_count() > 0;
        log::info!("Playback {}", if self.playing { "started" } else { "paused" });
        self.playing
    }

    /// index 番目を読み、オーバーレイを合成する
    pub fn render<S: FrameSource + ?Sized>(
        source: &mut S,
        session: &mut Session,
        index: usize,
    ) -> Result<Option<Frame>> {
        let Some(mut frame) = source.get_frame(index)? else {
            return Ok(None);
        };
        let ctx = session.render_context(index)?;
        compose(&ctx, &mut frame);
        Ok(Some(frame))
    }

    /// 現在位置を描き直す
    pub fn refresh<S: FrameSource + ?Sized>(source: &mut S, session: &mut Session) -> Result<Option<Frame>> {
        let index = source.current_frame();
        Self::render(source, session, index)
    }

    /// 再生中なら次のフレームを描画してカーソルを進める
    ///
    /// 最終フレームに達するか読み込みに失敗したら停止する。
    /// 停止時のカーソルは最後に表示し終えたフレームのまま。
    pub fn tick<S: FrameSource + ?Sized>(&mut self, source: &mut S, session: &mut Session) -> Result<Option<Frame>> {
        if !self.playing {
            return Ok(None);
        }
        let next = source.current_frame() + 1;
        if next >= source.frame_count() {
            log::info!("Reached end of stream at frame {}", source.current_frame());
            self.pause();
            return Ok(None);
        }

        match Self::render(source, session, next) {
            Ok(Some(frame)) => {
                source.set_current_frame(next);
                if next + 1 >= source.frame_count() {
                    log::info!("Reached end of stream at frame {}", next);
                    self.pause();
                }
                Ok(Some(frame))
            }
            Ok(None) => {
                log::warn!("Failed to read frame {}, stopping playback", next);
                self.pause();
                Ok(None)
            }
            Err(e) => {
                self.pause();
                Err(e)
            }
        }
    }

    pub fn step_forward<S: FrameSource + ?Sized>(&mut self, source: &mut S, session: &mut Session) -> Result<Option<Frame>> {
        self.pause();
        source.next_frame();
        Self::refresh(source, session)
    }

    pub fn step_backward<S: FrameSource + ?Sized>(&mut self, source: &mut S, session: &mut Session) -> Result<Option<Frame>> {
        self.pause();
        source.prev_frame();
        Self::refresh(source, session)
    }

    pub fn jump<S: FrameSource + ?Sized>(
        &mut self,
        source: &mut S,
        session: &mut Session,
        seconds: f64,
    ) -> Result<Option<Frame>> {
        self.pause();
        source.jump_seconds(seconds);
        Self::refresh(source, session)
    }

    /// 指定フレームへ移動（範囲外はクランプ）
    pub fn locate_frame<S: FrameSource + ?Sized>(
        &mut self,
        source: &mut S,
        session: &mut Session,
        frame: usize,
    ) -> Result<Option<Frame>> {
        self.pause();
        source.invalidate();
        source.set_current_frame(frame);
        Self::refresh(source, session)
    }

    /// "HH:MM:SS" の位置へ移動。書式が不正ならカーソルは動かない
    pub fn locate_time<S: FrameSource + ?Sized>(
        &mut self,
        source: &mut S,
        session: &mut Session,
        text: &str,
    ) -> Result<Option<Frame>> {
        self.pause();
        let frame = sync::locate_by_time(text, source.fps(), source.frame_count())?;
        self.locate_frame(source, session, frame)
    }

    /// オフセットを変えて描き直す。処理中の先読みは捨てる
    pub fn adjust_offset<S: FrameSource + ?Sized>(
        source: &mut S,
        session: &mut Session,
        delta: i64,
    ) -> Result<Option<Frame>> {
        let offset = session.adjust_offset(delta);
        log::debug!("Offset: {}", offset);
        source.cancel_prefetch();
        Self::refresh(source, session)
    }

    pub fn status_lines<S: FrameSource + ?Sized>(source: &S) -> [String; 2] {
        sync::status_lines(source.current_frame(), source.frame_count(), source.fps())
    }
}
