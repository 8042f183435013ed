use anyhow::Result;
use std::io::{self, Write};
use std::time::{Duration, Instant};

use mocap_overlay::config::Config;
use mocap_overlay::playback::Playback;
use mocap_overlay::render::{Key, MinifbRenderer};
use mocap_overlay::session::Session;
use mocap_overlay::video::capture::open_video;
use mocap_overlay::video::{BlankFrameSource, Frame, FrameSource};

const CONFIG_PATH: &str = "config.toml";

/// ウィンドウの最大幅（これより大きい動画は縮小表示）
const MAX_WINDOW_WIDTH: usize = 1280;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| CONFIG_PATH.to_string());
    let config = Config::load_or_default(&config_path);

    println!("Overlay Viewer ({})", env!("GIT_VERSION"));
    println!("Space: play/pause  A/D: step  Q/E: -/+1 s  W/S: offset +/-1");
    println!("R: go to frame  F: go to time  K: skeleton  V: 2D view  Z: print offset  ESC: exit");

    let mut session = Session::load(&config)?;

    let mut source: Box<dyn FrameSource> = match &config.paths.video {
        Some(path) => Box::new(open_video(path, config.video.prefetch)?),
        None => {
            let frames = session.max_frame_3d().max(1);
            println!("No video configured, using {} blank frames", frames);
            Box::new(BlankFrameSource::from_config(&config.video, frames))
        }
    };

    let (width, height) = source.resolution();
    let scale = (MAX_WINDOW_WIDTH as f64 / width.max(1) as f64).min(1.0);
    let mut renderer = MinifbRenderer::new(
        "Overlay Viewer",
        ((width as f64 * scale) as usize).max(1),
        ((height as f64 * scale) as usize).max(1),
    )?;

    let frame_interval = Duration::from_secs_f64(1.0 / source.fps());
    let mut playback = Playback::new();
    let mut shown: Option<Frame> = None;
    show(Playback::refresh(source.as_mut(), &mut session), &mut shown)?;
    let mut last_tick = Instant::now();

    while renderer.is_open() {
        for key in renderer.keys_pressed() {
            let result = match key {
                Key::Space => {
                    playback.toggle(source.as_ref());
                    last_tick = Instant::now();
                    continue;
                }
                Key::A => playback.step_backward(source.as_mut(), &mut session),
                Key::D => playback.step_forward(source.as_mut(), &mut session),
                Key::Q => playback.jump(source.as_mut(), &mut session, -1.0),
                Key::E => playback.jump(source.as_mut(), &mut session, 1.0),
                Key::W => Playback::adjust_offset(source.as_mut(), &mut session, 1),
                Key::S => Playback::adjust_offset(source.as_mut(), &mut session, -1),
                Key::K => {
                    session.set_show_skeleton(!session.show_skeleton());
                    Playback::refresh(source.as_mut(), &mut session)
                }
                Key::V => {
                    session.set_pixel_view(session.pixel_view().toggled());
                    println!("2D view: {:?}", session.pixel_view());
                    Playback::refresh(source.as_mut(), &mut session)
                }
                Key::Z => {
                    println!("Offset: {}", session.offset());
                    continue;
                }
                Key::R => {
                    playback.pause();
                    let input = prompt(&format!("Frame (0-{}): ", source.frame_count() - 1))?;
                    match input.parse::<usize>() {
                        Ok(frame) => playback.locate_frame(source.as_mut(), &mut session, frame),
                        Err(_) => {
                            eprintln!("Invalid frame number: {:?}", input);
                            continue;
                        }
                    }
                }
                Key::F => {
                    let input = prompt("Time (HH:MM:SS): ")?;
                    playback.locate_time(source.as_mut(), &mut session, &input)
                }
                _ => continue,
            };
            show(result, &mut shown)?;
        }

        if playback.is_playing() && last_tick.elapsed() >= frame_interval {
            last_tick = Instant::now();
            if let Some(frame) = playback.tick(source.as_mut(), &mut session)? {
                shown = Some(frame);
            }
        }

        let [time, frame] = Playback::status_lines(source.as_ref());
        renderer.set_title(&format!(
            "Overlay Viewer - {} | {} | offset {}{}",
            time,
            frame,
            session.offset(),
            if playback.is_playing() { " | playing" } else { "" }
        ));

        match &shown {
            Some(frame) => {
                renderer.draw_frame(frame);
                renderer.update()?;
            }
            None => renderer.poll(),
        }
        std::thread::sleep(Duration::from_millis(1));
    }

    println!("Final offset: {}", session.offset());
    Ok(())
}

/// 描画結果を反映する。回復可能なエラーは表示だけして続行
fn show(result: mocap_overlay::Result<Option<Frame>>, shown: &mut Option<Frame>) -> Result<()> {
    match result {
        Ok(Some(frame)) => *shown = Some(frame),
        Ok(None) => log::warn!("Frame could not be read"),
        Err(e) if !e.is_fatal() => eprintln!("{}", e),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// 端末から 1 行読む
fn prompt(message: &str) -> Result<String> {
    print!("{}", message);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
