use crate::video::Frame;

/// Bresenham のアルゴリズムで線を描画
pub fn draw_line(frame: &mut Frame, x0: i32, y0: i32, x1: i32, y1: i32, color: [u8; 3]) {
    for_each_line_point(x0, y0, x1, y1, |x, y| frame.set_pixel(x, y, color));
}

/// 太さ付きの線。線上の各点に円を打つ
pub fn draw_thick_line(
    frame: &mut Frame,
    (x0, y0): (i32, i32),
    (x1, y1): (i32, i32),
    thickness: i32,
    color: [u8; 3],
) {
    if thickness <= 1 {
        draw_line(frame, x0, y0, x1, y1, color);
        return;
    }
    let radius = thickness / 2;
    for_each_line_point(x0, y0, x1, y1, |x, y| draw_circle(frame, x, y, radius, color));
}

/// 円を描画（塗りつぶし）
pub fn draw_circle(frame: &mut Frame, cx: i32, cy: i32, radius: i32, color: [u8; 3]) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                frame.set_pixel(cx + dx, cy + dy, color);
            }
        }
    }
}

fn for_each_line_point(x0: i32, y0: i32, x1: i32, y1: i32, mut plot: impl FnMut(i32, i32)) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut x = x0;
    let mut y = y0;

    loop {
        plot(x, y);

        if x == x1 && y == y1 {
            break;
        }

        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [u8; 3] = [0, 0, 255];

    #[test]
    fn test_line_endpoints() {
        let mut frame = Frame::black(10, 10);
        draw_line(&mut frame, 1, 1, 8, 5, RED);
        assert_eq!(frame.pixel(1, 1), Some(RED));
        assert_eq!(frame.pixel(8, 5), Some(RED));
        assert_eq!(frame.pixel(0, 9), Some([0, 0, 0]));
    }

    #[test]
    fn test_circle_is_filled_and_clipped() {
        let mut frame = Frame::black(10, 10);
        draw_circle(&mut frame, 0, 0, 2, RED);
        assert_eq!(frame.pixel(0, 0), Some(RED));
        assert_eq!(frame.pixel(2, 0), Some(RED));
        assert_eq!(frame.pixel(2, 2), Some([0, 0, 0]));
    }

    #[test]
    fn test_thick_line() {
        let mut frame = Frame::black(10, 10);
        draw_thick_line(&mut frame, (2, 5), (7, 5), 2, RED);
        assert_eq!(frame.pixel(4, 4), Some(RED));
        assert_eq!(frame.pixel(4, 6), Some(RED));
        assert_eq!(frame.pixel(4, 8), Some([0, 0, 0]));
    }
}
