/// 17 関節 (Human3.6M 順) の骨格接続
pub const JOINT_PAIRS_17: [(usize, usize); 16] = [
    (0, 1), (1, 2), (2, 3),
    (0, 4), (4, 5), (5, 6),
    (0, 7), (7, 8), (8, 9), (9, 10),
    (8, 11), (11, 12), (12, 13),
    (8, 14), (14, 15), (15, 16),
];

/// 24 関節 (SMPL 順) の骨格接続
pub const JOINT_PAIRS_24: [(usize, usize); 23] = [
    // 脚
    (0, 1), (0, 2), (0, 3),
    (1, 4), (4, 7), (7, 10),
    (2, 5), (5, 8), (8, 11),
    // 背骨・頭
    (3, 6), (6, 9), (9, 12), (12, 15),
    // 左腕
    (9, 13), (13, 16), (16, 18), (18, 20), (20, 22),
    // 右腕
    (9, 14), (14, 17), (17, 19), (19, 21), (21, 23),
];

/// 関節数に対応する骨格。未知の関節数は None（点だけ描く）
pub fn joint_pairs(num_joints: usize) -> Option<&'static [(usize, usize)]> {
    match num_joints {
        17 => Some(&JOINT_PAIRS_17),
        24 => Some(&JOINT_PAIRS_24),
        _ => None,
    }
}

/// 読み込み順に割り当てる色 (BGR)
pub const PALETTE: [[u8; 3]; 10] = [
    [0, 0, 255],   // 赤
    [0, 255, 0],   // 緑
    [255, 0, 0],   // 青
    [0, 255, 255], // 黄
    [255, 0, 255], // マゼンタ
    [255, 255, 0], // シアン
    [128, 0, 128], // 紫
    [0, 165, 255], // オレンジ
    [0, 128, 0],   // 濃い緑
    [0, 0, 128],   // 濃い赤
];

/// 全マーカー表示の色 (BGR)
pub const RAW_MOCAP_COLOR: [u8; 3] = [255, 255, 255];

pub fn palette_color(index: usize) -> [u8; 3] {
    PALETTE[index % PALETTE.len()]
}

/// 骨格線用の暗い色（小数部は切り捨て）
pub fn shade(color: [u8; 3], factor: f32) -> [u8; 3] {
    color.map(|c| (c as f32 * factor).clamp(0.0, 255.0) as u8)
}
