use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Instant;

use opencv::{
    core::{Point, Scalar, Size},
    imgproc,
    prelude::*,
    videoio::VideoWriter,
};

use mocap_overlay::config::Config;
use mocap_overlay::playback::Playback;
use mocap_overlay::session::Session;
use mocap_overlay::sync;
use mocap_overlay::video::capture::{frame_to_mat, open_video};
use mocap_overlay::video::{BlankFrameSource, FrameSource};

const CONFIG_PATH: &str = "config.toml";
const DEFAULT_OUTPUT: &str = "overlay.mp4";

/// ステータス文字列の描画位置
const STATUS_POSITIONS: [(i32, i32); 2] = [(20, 40), (20, 80)];

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 引数: [config.toml] [output.mp4]
    let args: Vec<String> = std::env::args().collect();
    let config_path = args.get(1).map(String::as_str).unwrap_or(CONFIG_PATH);
    let config = Config::load_or_default(config_path);
    let output = args
        .get(2)
        .map(PathBuf::from)
        .or_else(|| config.paths.export.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

    println!("Overlay Export ({})", env!("GIT_VERSION"));

    let mut session = Session::load(&config)?;
    // 書き出しは順方向なので先読みを使う
    let mut source: Box<dyn FrameSource> = match &config.paths.video {
        Some(path) => Box::new(open_video(path, true)?),
        None => Box::new(BlankFrameSource::from_config(&config.video, session.max_frame_3d().max(1))),
    };

    let (width, height) = source.resolution();
    let frame_count = source.frame_count();
    let fps = source.fps();
    let output_str = output.to_str().context("Output path must be UTF-8")?;

    let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
    let mut writer = VideoWriter::new(
        output_str,
        fourcc,
        fps,
        Size::new(width as i32, height as i32),
        true,
    )?;
    if !writer.is_opened()? {
        anyhow::bail!("Failed to open {} for writing", output.display());
    }
    println!("Writing {} frames to {}", frame_count, output.display());

    let start = Instant::now();
    let mut written = 0usize;
    for index in 0..frame_count {
        let Some(frame) = Playback::render(source.as_mut(), &mut session, index)? else {
            log::warn!("Failed to read frame {}, stopping export", index);
            break;
        };
        let mut mat = frame_to_mat(&frame)?;

        for (text, (x, y)) in sync::status_lines(index, frame_count, fps).iter().zip(STATUS_POSITIONS) {
            imgproc::put_text(
                &mut mat,
                text,
                Point::new(x, y),
                imgproc::FONT_HERSHEY_SIMPLEX,
                1.0,
                Scalar::new(255.0, 255.0, 255.0, 0.0),
                2,
                imgproc::LINE_8,
                false,
            )?;
        }

        writer.write(&mat)?;
        written += 1;

        if written % 100 == 0 {
            log::info!("{} / {} frames", written, frame_count);
        }
    }

    writer.release()?;
    println!(
        "Wrote {} frames in {:.1}s",
        written,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
