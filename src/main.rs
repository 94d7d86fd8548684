// What you SEE:
// • Live camera, letterboxed to the output size, with a dashed face oval and thirds grid.
// • LEFT / RIGHT pick a replacement background (list top-left); G toggles the guides.
// • SPACE takes a photo now; 3, 5 and 0 start a 3 / 5 / 10 second countdown.
// • After the shot: type a phone and/or email (TAB switches), ENTER sends, F5 retakes.
// • ESC quits.

mod api;
mod camera;
mod capture;
mod catalog;
mod classify;
mod compositor;
mod draw;
mod error;
mod guides;
mod hud;
mod kiosk;
mod scheduler;
mod submission;
mod types;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use minifb::Key;
use tracing_subscriber::EnvFilter;

use api::{HttpKioskService, KioskService, UrlLoader};
use camera::{CameraCapture, FrameSource};
use catalog::BackgroundCatalog;
use compositor::RenderOutcome;
use draw::Drawer;
use kiosk::{Command, Kiosk};
use scheduler::{RenderLoop, Tick};
use types::FrameBuffer;

#[derive(Parser, Debug)]
#[command(author, version, about = "Photo kiosk with live background replacement", long_about = None)]
struct Args {
    /// Camera device index
    #[arg(long, env = "KIOSK_CAMERA_INDEX", default_value_t = 0)]
    camera_index: u32,

    /// Requested capture width (the driver may pick the closest mode)
    #[arg(long, env = "KIOSK_CAPTURE_WIDTH", default_value_t = 1920)]
    capture_width: u32,

    /// Requested capture height
    #[arg(long, env = "KIOSK_CAPTURE_HEIGHT", default_value_t = 1080)]
    capture_height: u32,

    /// Render surface width (also the width of captured photos)
    #[arg(long, env = "KIOSK_OUTPUT_WIDTH", default_value_t = 1920)]
    output_width: u32,

    /// Render surface height
    #[arg(long, env = "KIOSK_OUTPUT_HEIGHT", default_value_t = 1080)]
    output_height: u32,

    /// Base URL of the kiosk service
    #[arg(long, env = "KIOSK_API_URL", default_value = "http://localhost:8000")]
    api_url: String,

    /// Target frames per second
    #[arg(long, env = "KIOSK_FPS", default_value_t = 30)]
    fps: u32,

    /// Start with the framing guides hidden
    #[arg(long, env = "KIOSK_NO_GUIDES")]
    no_guides: bool,

    /// Enable debug logging and the on-screen FPS counter
    #[arg(long, env = "KIOSK_DEBUG")]
    debug: bool,

    /// The window opens at output size divided by this
    #[arg(long, env = "KIOSK_WINDOW_SCALE", default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..=8))]
    window_scale: u32,
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

/// Turn this frame's key presses into kiosk commands.
/// Typed characters are always drained so nothing typed on the live view
/// leaks into the form later.
fn read_commands(drawer: &Drawer, reviewing: bool) -> Vec<Command> {
    let typed = drawer.take_typed();
    let mut commands = Vec::new();

    if reviewing {
        if !typed.is_empty() {
            commands.push(Command::Type(typed));
        }
        if drawer.backspace_pressed() {
            commands.push(Command::Backspace);
        }
        let keys = [
            (Key::Tab, Command::SwitchField),
            (Key::Enter, Command::Submit),
            (Key::NumPadEnter, Command::Submit),
            (Key::F5, Command::Retake),
        ];
        commands.extend(keys.into_iter().filter(|(k, _)| drawer.pressed_once(*k)).map(|(_, c)| c));
    } else {
        let keys = [
            (Key::Space, Command::Capture(0)),
            (Key::Key3, Command::Capture(3)),
            (Key::Key5, Command::Capture(5)),
            (Key::Key0, Command::Capture(10)),
            (Key::Right, Command::NextBackground),
            (Key::Left, Command::PreviousBackground),
            (Key::G, Command::ToggleGuides),
        ];
        commands.extend(keys.into_iter().filter(|(k, _)| drawer.pressed_once(*k)).map(|(_, c)| c));
    }
    commands
}

/// Camera could not be opened: show the message until the window is closed.
fn show_camera_error(drawer: &mut Drawer, display: &mut FrameBuffer, err: &error::Error) -> Result<()> {
    hud::draw_camera_error(display, &err.to_string());
    while drawer.is_open() && !drawer.esc_pressed() {
        drawer.present(display)?;
    }
    Ok(())
}

/// Frames-per-second over the last whole second.
struct FpsCounter {
    since: Instant,
    frames: u32,
    last: Option<f32>,
}

impl FpsCounter {
    fn new(now: Instant) -> Self {
        Self { since: now, frames: 0, last: None }
    }

    fn frame(&mut self, now: Instant) {
        self.frames += 1;
        let elapsed = now.duration_since(self.since);
        if elapsed >= Duration::from_secs(1) {
            let fps = self.frames as f32 / elapsed.as_secs_f32();
            tracing::debug!("FPS: {:.1}", fps);
            self.last = Some(fps);
            self.frames = 0;
            self.since = now;
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    tracing::info!("selfie kiosk starting");
    tracing::info!("Capture: {}x{}", args.capture_width, args.capture_height);
    tracing::info!("Output: {}x{}", args.output_width, args.output_height);
    tracing::info!("API: {}", args.api_url);

    let (w, h) = (args.output_width as usize, args.output_height as usize);
    let scale = args.window_scale as usize;

    /* --- Window ---
       Visual: a window at 1/scale of the output size; the buffer is stretched into it. */
    let mut drawer = Drawer::new("Selfie Kiosk", w / scale, h / scale, args.fps as usize)
        .context("Failed to open kiosk window")?;
    let mut display = FrameBuffer::new(w, h);

    /* --- Backgrounds ---
       Visual: the list shows "No background" right away; remote entries appear
       once the feed arrives and lose their ".." marker as each image decodes. */
    let http = Arc::new(HttpKioskService::new(&args.api_url));
    let loader = Arc::new(UrlLoader::new(http.agent()));
    let service: Arc<dyn KioskService> = http;
    let mut catalog = BackgroundCatalog::new(w, h, loader);
    catalog.start_fetch(Arc::clone(&service));

    /* --- Camera ---
       Visual: on failure the kiosk shows an error screen instead of the capture UI. */
    let mut camera = match CameraCapture::new(args.camera_index, args.capture_width, args.capture_height, args.fps) {
        Ok(camera) => camera,
        Err(e) => {
            tracing::error!(error = %e, "camera unavailable");
            return show_camera_error(&mut drawer, &mut display, &e);
        }
    };
    let (cw, ch) = camera.resolution();
    tracing::info!("Camera delivering {}x{}", cw, ch);

    let mut kiosk = Kiosk::new(w, h, catalog, service, !args.no_guides);
    let mut fps = FpsCounter::new(Instant::now());
    let mut render_loop = RenderLoop::new();

    /* ------------------------------ Main loop ------------------------------ */
    render_loop.run(|cancel| -> Result<Tick> {
        if !drawer.is_open() || drawer.esc_pressed() {
            cancel.cancel();
            return Ok(Tick::Idle);
        }
        let now = Instant::now();

        // 1) Operator input
        let reviewing = kiosk.session().still_image().is_some();
        for command in read_commands(&drawer, reviewing) {
            kiosk.handle(command, now)?;
        }

        // 2) Live frame; a dropped frame just means this tick re-shows the last surface.
        let frame = camera.next_frame().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "camera frame dropped");
            None
        });

        // 3) Render surface, countdown, background/submission results
        let outcome = kiosk.tick(frame.as_ref(), now)?;

        // 4) HUD on a display copy, then present
        hud::compose(&mut display, &kiosk, now, fps.last.filter(|_| args.debug));
        drawer.present(&display)?;

        fps.frame(now);
        Ok(match outcome {
            RenderOutcome::Skipped => Tick::Idle,
            _ => Tick::Rendered,
        })
    })?;

    tracing::info!(frames = render_loop.ticks(), "selfie kiosk stopped");
    Ok(())
}
