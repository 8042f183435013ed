use anyhow::{Context, Result};
use std::sync::Arc;

use mocap_overlay::config::Config;
use mocap_overlay::mocap::{GapFill, JointSource, MarkerMatch, MotiveExport, TargetJointTable};

const CONFIG_PATH: &str = "config.toml";

/// 解析結果の先頭フレームに表示する関節数
const PREVIEW_JOINTS: usize = 24;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| CONFIG_PATH.to_string());
    let config = Config::load_or_default(&config_path);

    println!("=== Mocap Overlay Inspector ({}) ===", env!("GIT_VERSION"));
    println!("Config: {}", config_path);

    let Some(path) = config.paths.mocap.as_ref().or(config.paths.raw_mocap.as_ref()) else {
        println!("No mocap export configured ([paths] mocap / raw_mocap)");
        return Ok(());
    };
    println!("Mocap: {}", path.display());

    let export = MotiveExport::from_path(path, &config.mocap)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    println!("Frames: {}", export.total_frames());
    println!();

    // スキーマ
    let parsed = export.parse_positions(config.mocap.column_threshold, GapFill::Nan)?;
    println!("--- Schema ---");
    println!(
        "Kept joints: {} (threshold {} valid cells)",
        parsed.schema.len(),
        config.mocap.column_threshold
    );
    for (i, name) in parsed.schema.names().iter().enumerate() {
        println!("  [{:3}] {}", i, name);
    }
    println!("Dropped columns: {}", parsed.dropped_columns);
    if !parsed.incomplete_joints.is_empty() {
        println!("Incomplete joints: {}", parsed.incomplete_joints.join(", "));
    }
    println!();

    // ターゲット関節の解決
    let targets = Arc::new(TargetJointTable::smpl24());
    let mut cache = export.joint_cache(&config.mocap, Arc::clone(&targets));
    println!("--- Target joints ---");
    let mut counts = [0usize; 4];
    for (id, res) in cache.resolutions().iter().enumerate() {
        let state = match &res.source {
            Some(JointSource::Single(_)) => "single",
            Some(JointSource::Midpoint(..)) => "midpoint",
            None => "MISSING",
        };
        println!("  [{:2}] {}", id, state);
        for (marker, found) in &res.matches {
            let slot = match found {
                MarkerMatch::Exact(_) => 0,
                MarkerMatch::Duplicated { .. } => 1,
                MarkerMatch::Incomplete { .. } => 2,
                MarkerMatch::Unmatched => 3,
            };
            counts[slot] += 1;
            println!("       {} ({}): {}", marker.name, marker.kind, found);
        }
    }
    println!(
        "Resolved: {}, duplicated: {}, incomplete: {}, unmatched: {}",
        counts[0], counts[1], counts[2], counts[3]
    );
    println!();

    if cache.total_frames() == 0 {
        println!("No data rows");
        return Ok(());
    }

    println!("--- Frame 0 ---");
    let frame = cache.get(0)?;
    for (id, row) in frame.rows().into_iter().enumerate().take(PREVIEW_JOINTS) {
        println!("  [{:2}] {:10.4} {:10.4} {:10.4}", id, row[0], row[1], row[2]);
    }

    Ok(())
}
