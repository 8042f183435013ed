//! CSV テキスト -> テーブル -> キャッシュ -> 投影 -> 合成 の通し

use std::fmt::Write as _;
use std::sync::Arc;

use approx::assert_relative_eq;
use nalgebra::{Matrix3, Vector3};
use ndarray::Array3;

use mocap_overlay::calibration::CalibrationModel;
use mocap_overlay::config::{MocapConfig, RenderConfig};
use mocap_overlay::keypoints::KeypointSequence;
use mocap_overlay::mocap::{GapFill, MarkerRef, MotiveExport, TargetJoint, TargetJointTable};
use mocap_overlay::render::compose;
use mocap_overlay::session::Session;
use mocap_overlay::video::Frame;
use mocap_overlay::OverlayError;

const RED: [u8; 3] = [0, 0, 255];

/// Hip (Bone) と BackLeft / BackRight (Bone Marker) の位置列だけを持つエクスポート
fn motive_export(frames: usize) -> String {
    let mut text = String::from("Format Version,1.23,Take Name,session,Capture Frame Rate,120\n\n");
    text.push_str(",,Bone,Bone,Bone,Bone Marker,Bone Marker,Bone Marker,Bone Marker,Bone Marker,Bone Marker\n");
    text.push_str(",,Skeleton 001:Hip,Skeleton 001:Hip,Skeleton 001:Hip,");
    text.push_str("Skeleton 001:BackLeft,Skeleton 001:BackLeft,Skeleton 001:BackLeft,");
    text.push_str("Skeleton 001:BackRight,Skeleton 001:BackRight,Skeleton 001:BackRight\n");
    text.push_str(",,1,1,1,2,2,2,3,3,3\n");
    text.push_str(",,Position,Position,Position,Position,Position,Position,Position,Position,Position\n");
    text.push_str("Frame,Time (Seconds),X,Y,Z,X,Y,Z,X,Y,Z\n");
    for f in 0..frames {
        writeln!(text, "{},{:.4},0,0,0,1,2,3,3,4,5", f, f as f64 / 120.0).unwrap();
    }
    text
}

fn targets() -> Arc<TargetJointTable> {
    Arc::new(TargetJointTable::new(vec![
        TargetJoint::Single(MarkerRef::new("Hip", "Bone")),
        TargetJoint::Midpoint(
            MarkerRef::new("BackLeft", "Bone Marker"),
            MarkerRef::new("BackRight", "Bone Marker"),
        ),
        TargetJoint::Single(MarkerRef::new("Missing", "Bone")),
    ]))
}

/// fx = fy = 100, 中心 (50, 50)、カメラは原点の 5 手前
fn camera() -> Arc<CalibrationModel> {
    let k = Matrix3::new(100.0, 0.0, 50.0, 0.0, 100.0, 50.0, 0.0, 0.0, 1.0);
    Arc::new(CalibrationModel::new(k, &[], Matrix3::identity(), Vector3::new(0.0, 0.0, 5.0)).unwrap())
}

#[test]
fn test_midpoint_and_unmatched_joint() {
    let config = MocapConfig::default();
    let export = MotiveExport::from_reader(motive_export(3).as_bytes(), &config).unwrap();
    let mut cache = export.joint_cache(&config, targets());

    assert!(cache.resolutions()[2].source.is_none());

    let frame = cache.get(0).unwrap();
    assert_relative_eq!(frame[[1, 0]], 2.0);
    assert_relative_eq!(frame[[1, 1]], 3.0);
    assert_relative_eq!(frame[[1, 2]], 4.0);
    assert!(frame.row(2).iter().all(|v| v.is_nan()));
}

#[test]
fn test_cache_projected_onto_frame() {
    let config = MocapConfig::default();
    let export = MotiveExport::from_reader(motive_export(3).as_bytes(), &config).unwrap();
    let cache = export.joint_cache(&config, targets());

    let mut session = Session::new(&RenderConfig::default());
    session.set_calibration(Some(camera()));
    session.add_target_joints("take", cache);

    let ctx = session.render_context(1).unwrap();
    assert_eq!(ctx.layers.len(), 1);
    let points = &ctx.layers[0].points;
    assert_eq!(points.valid_mask, vec![true, true, false]);

    // Hip (0,0,0) -> カメラ座標 (0,0,5) -> (50, 50)
    let hip = points.point(0).unwrap();
    assert_relative_eq!(hip[0], 50.0);
    assert_relative_eq!(hip[1], 50.0);
    // 中点 (2,3,4) -> (2,3,9)
    let mid = points.point(1).unwrap();
    assert_relative_eq!(mid[0], 50.0 + 200.0 / 9.0, epsilon = 1e-9);
    assert_relative_eq!(mid[1], 50.0 + 300.0 / 9.0, epsilon = 1e-9);

    let mut frame = Frame::black(100, 100);
    compose(&ctx, &mut frame);
    assert_eq!(frame.pixel(50, 50), Some(RED));
    assert_eq!(frame.pixel(72, 83), Some(RED));
    assert_eq!(frame.pixel(5, 5), Some([0, 0, 0]));
}

#[test]
fn test_offset_past_end_draws_nothing() {
    let config = MocapConfig::default();
    let export = MotiveExport::from_reader(motive_export(3).as_bytes(), &config).unwrap();

    let mut session = Session::new(&RenderConfig::default());
    session.set_calibration(Some(camera()));
    session.add_target_joints("take", export.joint_cache(&config, targets()));
    session.set_offset(5);

    let ctx = session.render_context(0).unwrap();
    assert_eq!(ctx.effective_index, 5);
    assert!(ctx.layers.is_empty());

    let mut frame = Frame::black(100, 100);
    compose(&ctx, &mut frame);
    assert!(frame.data().iter().all(|&b| b == 0));
}

#[test]
fn test_column_threshold_boundary() {
    // B は 1 行欠けて 599 セル
    let mut text = String::from("meta\n,,Marker,Marker,Marker,Marker,Marker,Marker\n");
    text.push_str(",,A,A,A,B,B,B\n,,1,1,1,2,2,2\n");
    text.push_str(",,Position,Position,Position,Position,Position,Position\n");
    text.push_str("Frame,Time,X,Y,Z,X,Y,Z\n");
    for f in 0..600 {
        if f == 0 {
            writeln!(text, "{},0,1,2,3,,,", f).unwrap();
        } else {
            writeln!(text, "{},0,1,2,3,4,5,6", f).unwrap();
        }
    }
    let export = MotiveExport::from_reader(text.as_bytes(), &MocapConfig::default()).unwrap();
    assert_eq!(export.total_frames(), 600);

    let parsed = export.parse_positions(600, GapFill::Zero).unwrap();
    assert_eq!(parsed.schema.names(), &["1:A(Marker)".to_string()]);
    assert_eq!(parsed.dropped_columns, 3);

    let parsed = export.parse_positions(599, GapFill::Zero).unwrap();
    assert_eq!(parsed.schema.len(), 2);
    assert_eq!(parsed.dropped_columns, 0);
    assert_eq!(parsed.data[[0, 1, 0]], 0.0);

    let err = export.parse_positions(601, GapFill::Zero).unwrap_err();
    assert!(matches!(err, OverlayError::NoUsableJoints { dropped_columns: 6 }));
}

/// 24 関節のうち 2, 5, 8 だけ画面内。フレーム 0 は 5 が欠損
fn leg_chain() -> KeypointSequence {
    let mut data = Array3::from_elem((2, 24, 3), f64::NAN);
    for f in 0..2 {
        for (j, x) in [(2, 10.0), (5, 20.0), (8, 30.0)] {
            data[[f, j, 0]] = x;
            data[[f, j, 1]] = 10.0;
            data[[f, j, 2]] = 1.0;
        }
    }
    data[[0, 5, 0]] = f64::NAN;
    KeypointSequence::new("legs", data)
}

#[test]
fn test_missing_joint_removes_its_edges() {
    let identity = CalibrationModel::new(Matrix3::identity(), &[], Matrix3::identity(), Vector3::zeros()).unwrap();
    let mut session = Session::new(&RenderConfig::default());
    session.set_calibration(Some(Arc::new(identity)));
    session.add_keypoints(leg_chain());

    // 欠損フレーム: 2-5, 5-8 の線は描かれない
    let ctx = session.render_context(0).unwrap();
    let points = &ctx.layers[0].points;
    assert_eq!(points.len(), 24);
    assert_eq!(points.points.len(), 2);
    assert!(!points.valid_mask[5]);

    let mut frame = Frame::black(64, 32);
    compose(&ctx, &mut frame);
    assert_eq!(frame.pixel(10, 10), Some(RED));
    assert_eq!(frame.pixel(30, 10), Some(RED));
    assert_eq!(frame.pixel(15, 10), Some([0, 0, 0]));
    assert_eq!(frame.pixel(25, 10), Some([0, 0, 0]));

    // 全関節あり: 線が引かれる
    let ctx = session.render_context(1).unwrap();
    let mut frame = Frame::black(64, 32);
    compose(&ctx, &mut frame);
    let edge = frame.pixel(15, 10).unwrap();
    assert_ne!(edge, [0, 0, 0]);
    assert_ne!(edge, RED);
    assert_eq!(&edge[..2], &[0, 0]);
}

#[test]
fn test_session_from_config_files() {
    use mocap_overlay::config::Config;

    let dir = tempfile::tempdir().unwrap();
    let mocap = dir.path().join("take.csv");
    let keypoints = dir.path().join("pred.csv");
    let extrinsics = dir.path().join("extrinsics.json");
    std::fs::write(&mocap, motive_export(4)).unwrap();
    std::fs::write(&keypoints, "0_x,0_y,0_z\n0,0,1\n0.1,0.1,1\n").unwrap();
    std::fs::write(
        &extrinsics,
        r#"{"camera_matrix": [[100, 0, 50], [0, 100, 50], [0, 0, 1]], "rvec": [0, 0, 0], "tvec": [0, 0, 5]}"#,
    )
    .unwrap();

    let mut config = Config::default();
    config.mocap.column_threshold = 4;
    config.paths.extrinsics = Some(extrinsics);
    config.paths.keypoints = vec![keypoints];
    config.paths.raw_mocap = Some(mocap);

    let mut session = Session::load(&config).unwrap();
    assert!(session.calibration().is_some());
    let names: Vec<&str> = session.sources().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["pred.csv", "take.csv (raw)"]);
    assert_eq!(session.max_frame_3d(), 4);

    let ctx = session.render_context(2).unwrap();
    assert_eq!(ctx.layers.len(), 1);
    // 全マーカー: Hip, BackLeft, BackRight
    assert_eq!(ctx.layers[0].points.len(), 3);
    assert!(!ctx.layers[0].skeleton);
    assert_eq!(ctx.layers[0].color, [255, 255, 255]);
}

#[test]
fn test_session_pixel_views_from_config() {
    use mocap_overlay::config::{Config, PixelViewPaths};
    use mocap_overlay::session::PixelView;

    let dir = tempfile::tempdir().unwrap();
    let center = dir.path().join("center.csv");
    let left = dir.path().join("left.npy");
    std::fs::write(&center, "0_x,0_y,1_x,1_y\n10,20,30,40\n11,21,31,41\n").unwrap();
    ndarray_npy::write_npy(&left, &Array3::<f64>::from_elem((2, 2, 3), 5.0)).unwrap();

    let mut config = Config::default();
    config.paths.pixel_views = vec![PixelViewPaths {
        name: None,
        center: Some(center),
        left: Some(left),
    }];

    let mut session = Session::load(&config).unwrap();
    assert_eq!(session.sources()[0].name, "center.csv");

    // キャリブレーションが無ければ 2D トラックも描かない
    assert!(session.render_context(1).unwrap().layers.is_empty());

    session.set_calibration(Some(camera()));
    let ctx = session.render_context(1).unwrap();
    assert_eq!(ctx.layers[0].points.point(1), Some([31.0, 41.0]));

    session.set_pixel_view(PixelView::Left);
    let ctx = session.render_context(1).unwrap();
    assert_eq!(ctx.layers[0].points.len(), 2);
    assert_eq!(ctx.layers[0].points.point(0), Some([5.0, 5.0]));
}
