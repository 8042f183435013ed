use anyhow::Result;
use minifb::{Key, KeyRepeat, Window, WindowOptions};

use super::letterbox::Letterbox;
use crate::video::Frame;

/// minifbを使用したビューアウィンドウ
///
/// 合成済みのフレームをレターボックスで縮小・拡大して表示する。
pub struct MinifbRenderer {
    window: Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
}

impl MinifbRenderer {
    /// ウィンドウを作成
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: true,
                ..WindowOptions::default()
            },
        )?;

        Ok(Self {
            window,
            buffer: vec![0u32; width * height],
            width,
            height,
        })
    }

    /// ウィンドウが開いているか
    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(Key::Escape)
    }

    /// 前回の呼び出し以降に押されたキー
    pub fn keys_pressed(&self) -> Vec<Key> {
        self.window.get_keys_pressed(KeyRepeat::Yes)
    }

    pub fn set_title(&mut self, title: &str) {
        self.window.set_title(title);
    }

    /// BGR フレームをウィンドウサイズに合わせてバッファへ
    pub fn draw_frame(&mut self, frame: &Frame) {
        let (w, h) = self.window.get_size();
        if w > 0 && h > 0 && (w, h) != (self.width, self.height) {
            self.width = w;
            self.height = h;
            self.buffer = vec![0u32; w * h];
        }

        let lb = Letterbox::fit(frame.width(), frame.height(), self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let color = lb
                    .source_pixel(x, y, frame.width(), frame.height())
                    .and_then(|(sx, sy)| frame.pixel(sx, sy))
                    // BGR -> RGB -> u32
                    .map_or(0, |[b, g, r]| ((r as u32) << 16) | ((g as u32) << 8) | b as u32);
                self.buffer[y * self.width + x] = color;
            }
        }
    }

    /// バッファをウィンドウに表示
    pub fn update(&mut self) -> Result<()> {
        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)?;
        Ok(())
    }

    /// イベントだけ処理する（描画なし）
    pub fn poll(&mut self) {
        self.window.update();
    }
}
