use super::canvas::{draw_circle, draw_thick_line};
use super::skeleton::{joint_pairs, shade};
use crate::config::RenderConfig;
use crate::projection::{in_bounds, Projected};
use crate::video::Frame;

/// 点と線の描画パラメータ
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawStyle {
    pub point_radius: i32,
    pub line_thickness: i32,
    pub edge_shade: f32,
}

impl Default for DrawStyle {
    fn default() -> Self {
        Self::from(&RenderConfig::default())
    }
}

impl From<&RenderConfig> for DrawStyle {
    fn from(config: &RenderConfig) -> Self {
        Self {
            point_radius: config.point_radius,
            line_thickness: config.line_thickness,
            edge_shade: config.edge_shade,
        }
    }
}

/// 1 ソース分の描画内容（投影済み）
#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    pub points: Projected,
    /// BGR
    pub color: [u8; 3],
    pub skeleton: bool,
}

/// 1 フレームの描画に必要なものすべて。フレームごとに作り直す
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    pub display_frame: usize,
    /// display_frame + offset
    pub effective_index: i64,
    pub layers: Vec<Layer>,
    pub style: DrawStyle,
}

/// レイヤーを順に描画する
pub fn compose(ctx: &RenderContext, frame: &mut Frame) {
    for layer in &ctx.layers {
        draw_layer(frame, layer, &ctx.style);
    }
}

fn to_pixel(point: [f64; 2], frame: &Frame) -> Option<(i32, i32)> {
    if in_bounds(point, frame.width(), frame.height()) {
        Some((point[0] as i32, point[1] as i32))
    } else {
        None
    }
}

pub fn draw_layer(frame: &mut Frame, layer: &Layer, style: &DrawStyle) {
    let points = layer.points.expand();

    for p in points.iter().flatten() {
        if let Some((x, y)) = to_pixel(*p, frame) {
            draw_circle(frame, x, y, style.point_radius, layer.color);
        }
    }

    if !layer.skeleton {
        return;
    }
    let Some(pairs) = joint_pairs(points.len()) else {
        return;
    };
    let edge_color = shade(layer.color, style.edge_shade);
    for &(a, b) in pairs {
        let (Some(pa), Some(pb)) = (points[a], points[b]) else {
            continue;
        };
        if let (Some(p0), Some(p1)) = (to_pixel(pa, frame), to_pixel(pb, frame)) {
            draw_thick_line(frame, p0, p1, style.line_thickness, edge_color);
        }
    }
}
