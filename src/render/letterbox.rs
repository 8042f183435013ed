/// 縦横比を保ったまま表示領域の中央に収める配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Letterbox {
    pub width: usize,
    pub height: usize,
    pub offset_x: usize,
    pub offset_y: usize,
}

impl Letterbox {
    pub fn fit(src_w: usize, src_h: usize, dst_w: usize, dst_h: usize) -> Self {
        if src_w == 0 || src_h == 0 || dst_w == 0 || dst_h == 0 {
            return Self {
                width: 0,
                height: 0,
                offset_x: dst_w / 2,
                offset_y: dst_h / 2,
            };
        }
        // src_w / src_h と dst_w / dst_h を整数で比較
        let (width, height) = if src_w * dst_h >= dst_w * src_h {
            (dst_w, (src_h * dst_w / src_w).max(1))
        } else {
            ((src_w * dst_h / src_h).max(1), dst_h)
        };
        Self {
            width,
            height,
            offset_x: (dst_w - width) / 2,
            offset_y: (dst_h - height) / 2,
        }
    }

    /// 表示領域の座標 → 元画像の座標（最近傍）。余白なら None
    pub fn source_pixel(&self, x: usize, y: usize, src_w: usize, src_h: usize) -> Option<(usize, usize)> {
        if x < self.offset_x || y < self.offset_y {
            return None;
        }
        let (lx, ly) = (x - self.offset_x, y - self.offset_y);
        if lx >= self.width || ly >= self.height {
            return None;
        }
        Some((lx * src_w / self.width, ly * src_h / self.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wide_source_in_tall_window() {
        let lb = Letterbox::fit(1920, 1080, 800, 800);
        assert_eq!((lb.width, lb.height), (800, 450));
        assert_eq!((lb.offset_x, lb.offset_y), (0, 175));
    }

    #[test]
    fn test_tall_source_in_wide_window() {
        let lb = Letterbox::fit(1000, 2000, 1000, 500);
        assert_eq!((lb.width, lb.height), (250, 500));
        assert_eq!(lb.offset_x, 375);
    }

    #[test]
    fn test_source_pixel_mapping() {
        let lb = Letterbox::fit(200, 100, 400, 400);
        assert_eq!(lb.source_pixel(0, 0, 200, 100), None);
        assert_eq!(lb.source_pixel(0, 100, 200, 100), Some((0, 0)));
        assert_eq!(lb.source_pixel(399, 299, 200, 100), Some((199, 99)));
        assert_eq!(lb.source_pixel(0, 300, 200, 100), None);
    }

    #[test]
    fn test_degenerate() {
        let lb = Letterbox::fit(0, 0, 100, 50);
        assert_eq!((lb.width, lb.height), (0, 0));
    }
}
