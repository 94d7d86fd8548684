// Display-only overlays. Everything here is drawn on a copy of the render
// surface so a snapshot never contains HUD text or the countdown number.
// Visual:
// - live view: background list top-left, key hints along the bottom
// - countdown: darkened frame with a huge number in the middle
// - review: the frozen photo, dimmed, with the contact form underneath
// - camera failure: a black screen with the error message

use std::time::Instant;

use crate::capture::CaptureSession;
use crate::catalog::{BackgroundCatalog, Origin, PreloadStatus};
use crate::compositor::stretch_into;
use crate::draw::{dim_rect, draw_text, draw_text_centered, fill_rect, text_width};
use crate::kiosk::Kiosk;
use crate::submission::{Field, SubmissionFlow, SubmissionStatus};
use crate::types::FrameBuffer;

const WHITE: u32 = 0x00FF_FFFF;
const GREY: u32 = 0x00A0_A0A0;
const ACCENT: u32 = 0x00FF_CC33;
const ERROR_RED: u32 = 0x00FF_5050;
const OK_GREEN: u32 = 0x0050_E070;

pub const LIVE_HINTS: &str = "SPACE PHOTO   3 / 5 / 0 TIMER   < > BACKGROUND   G GUIDES   ESC QUIT";
pub const REVIEW_HINTS: &str = "TAB SWITCH FIELD   ENTER SEND   F5 RETAKE";

/// Text sizes follow the display height (scale 3 / 4 / 24 at 1080p).
fn scales(fb: &FrameBuffer) -> (i32, i32, i32) {
    let h = fb.height as i32;
    ((h / 360).max(1), (h / 270).max(1), (h / 45).max(4))
}

/// Build the frame to show for this tick into `display`.
pub fn compose(display: &mut FrameBuffer, kiosk: &Kiosk, now: Instant, fps: Option<f32>) {
    let session = kiosk.session();
    match session.still_image() {
        Some(still) => {
            stretch_into(&still.preview, display);
            draw_review(display, kiosk.submission());
        }
        None => {
            stretch_into(kiosk.surface(), display);
            draw_background_list(display, kiosk.catalog());
            draw_countdown(display, session);
            draw_hints(display, LIVE_HINTS);
        }
    }

    if let Some(text) = kiosk.notice(now) {
        draw_banner(display, text, OK_GREEN);
    }
    if let Some(fps) = fps {
        let (small, _, _) = scales(display);
        let label = format!("FPS {fps:.1}");
        let x = display.width as i32 - text_width(&label, small) - 8 * small;
        draw_text(display, x, 4 * small, &label, small, GREY);
    }
}

pub const NO_CUSTOM_BACKGROUNDS: &str = "  NO CUSTOM BACKGROUNDS";

/// One text line per entry, with its color. Remote entries are tagged custom;
/// once the feed is done and gave nothing, a grey line says so.
pub fn background_lines(catalog: &BackgroundCatalog) -> Vec<(String, u32)> {
    let entries = catalog.list_backgrounds();
    let mut lines: Vec<(String, u32)> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let (marker, color) = if i == catalog.selected_index() { ("> ", ACCENT) } else { ("  ", WHITE) };
            let tag = match entry.origin {
                Origin::BuiltIn => "",
                Origin::Remote => " [CUSTOM]",
            };
            let suffix = match catalog.status(entry) {
                PreloadStatus::NotNeeded | PreloadStatus::Ready => "",
                PreloadStatus::Pending => " ..",
                PreloadStatus::Failed => " X",
            };
            (format!("{marker}{}{tag}{suffix}", entry.name), color)
        })
        .collect();

    let only_built_in = entries.iter().all(|e| e.origin == Origin::BuiltIn);
    if only_built_in && !catalog.is_fetching() {
        lines.push((NO_CUSTOM_BACKGROUNDS.to_string(), GREY));
    }
    lines
}

/// Entry names down the left edge; the selected one is highlighted.
pub fn draw_background_list(fb: &mut FrameBuffer, catalog: &BackgroundCatalog) {
    let (small, _, _) = scales(fb);
    let line = 10 * small;
    let lines = background_lines(catalog);
    let width = lines
        .iter()
        .map(|(text, _)| text_width(text, small))
        .chain(std::iter::once(text_width("BACKGROUND ...", small)))
        .max()
        .unwrap_or(0)
        + 8 * small;

    let top = 4 * small;
    dim_rect(fb, 0, 0, width, top * 2 + line * lines.len() as i32 + line, 0.45);
    draw_text(fb, 4 * small, top, "BACKGROUND", small, GREY);
    if catalog.is_fetching() {
        draw_text(fb, 4 * small + text_width("BACKGROUND ", small), top, "...", small, GREY);
    }

    for (i, (text, color)) in lines.iter().enumerate() {
        let y = top + line * (i as i32 + 1);
        draw_text(fb, 4 * small, y, text, small, *color);
    }
}

/// Darken the frame and show the remaining seconds, big and centered.
pub fn draw_countdown(fb: &mut FrameBuffer, session: &CaptureSession) {
    let Some(remaining) = session.countdown_remaining() else { return };
    let (_, _, huge) = scales(fb);
    dim_rect(fb, 0, 0, fb.width as i32, fb.height as i32, 0.6);
    let y = fb.height as i32 / 2 - 7 * huge / 2;
    draw_text_centered(fb, fb.width as i32 / 2, y, &remaining.to_string(), huge, WHITE);
}

/// Contact form under the frozen photo.
pub fn draw_review(fb: &mut FrameBuffer, flow: &SubmissionFlow) {
    let (_, medium, _) = scales(fb);
    let (w, h) = (fb.width as i32, fb.height as i32);
    let panel_h = 60 * medium;
    let top = h - panel_h;
    dim_rect(fb, 0, top, w, panel_h, 0.25);

    let line = 12 * medium;
    let field = |label: &str, value: &str, focused: bool| {
        let caret = if focused { "_" } else { "" };
        (format!("{label} {value}{caret}"), if focused { ACCENT } else { WHITE })
    };
    let (phone, phone_color) = field("PHONE:", &flow.form.phone, flow.focus() == Field::Phone);
    let (email, email_color) = field("EMAIL:", &flow.form.email, flow.focus() == Field::Email);

    let x = 12 * medium;
    draw_text(fb, x, top + 4 * medium, "SEND THIS PHOTO TO:", medium, GREY);
    draw_text(fb, x, top + 4 * medium + line, &phone, medium, phone_color);
    draw_text(fb, x, top + 4 * medium + line * 2, &email, medium, email_color);

    let (status, color) = match flow.status() {
        SubmissionStatus::Editing => (String::new(), WHITE),
        SubmissionStatus::Sending => ("SENDING...".to_string(), ACCENT),
        SubmissionStatus::Failed(msg) => (msg.clone(), ERROR_RED),
        SubmissionStatus::Sent(_) => ("SENT".to_string(), OK_GREEN),
    };
    if !status.is_empty() {
        draw_text(fb, x, top + 4 * medium + line * 3, &status, medium, color);
    }
    draw_hints(fb, REVIEW_HINTS);
}

fn draw_hints(fb: &mut FrameBuffer, hints: &str) {
    let (small, _, _) = scales(fb);
    let y = fb.height as i32 - 12 * small;
    draw_text_centered(fb, fb.width as i32 / 2, y, hints, small, GREY);
}

fn draw_banner(fb: &mut FrameBuffer, text: &str, color: u32) {
    let (_, medium, _) = scales(fb);
    let h = 14 * medium;
    let y = fb.height as i32 / 2 - h / 2;
    fill_rect(fb, 0, y, fb.width as i32, h, 0x0010_1010);
    draw_text_centered(fb, fb.width as i32 / 2, y + 3 * medium, text, medium, color);
}

/// Shown when the camera could not be opened. Nothing else is rendered.
pub fn draw_camera_error(fb: &mut FrameBuffer, message: &str) {
    let (small, medium, _) = scales(fb);
    fb.pixels.fill(0);
    let cy = fb.height as i32 / 2;
    draw_text_centered(fb, fb.width as i32 / 2, cy - 12 * medium, "CAMERA UNAVAILABLE", medium, ERROR_RED);
    draw_text_centered(fb, fb.width as i32 / 2, cy, message, small, WHITE);
    draw_text_centered(fb, fb.width as i32 / 2, cy + 12 * small, "CHECK THE CAMERA AND RESTART THE KIOSK", small, GREY);
}
