// Framing guides drawn on top of the rendered surface.
// Visual: a dashed oval where the face should go, a dashed rule-of-thirds grid,
// and (only while not counting down) a caption under the oval plus a center dot.

use crate::draw::{draw_dashed_ellipse, draw_dashed_line, draw_text_centered, fill_circle};
use crate::types::FrameBuffer;

pub const GUIDE_CAPTION: &str = "PLACE YOUR FACE IN THE OVAL";

const ELLIPSE_COLOR: u32 = 0x00FF_FFFF;
const GRID_COLOR: u32 = 0x00C8_C8C8;
const DOT_COLOR: u32 = 0x00FF_FFFF;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GuideOptions {
    pub show: bool,
    pub counting: bool,
}

/// Ellipse radii (12% of width, 18% of height) for a surface.
pub fn ellipse_radii(width: usize, height: usize) -> (i32, i32) {
    ((width as f32 * 0.12).round() as i32, (height as f32 * 0.18).round() as i32)
}

pub fn draw_guides(fb: &mut FrameBuffer, opts: GuideOptions) {
    if !opts.show || fb.width == 0 || fb.height == 0 {
        return;
    }
    let (w, h) = (fb.width as i32, fb.height as i32);
    // Stroke and text sizes track the surface height (3px / scale 4 at 1080p).
    let thickness = (h / 360).max(1);
    let dash = (h / 54).max(2) as u32;
    let gap = (h / 90).max(2) as u32;

    let (cx, cy) = (w / 2, h / 2);
    let (rx, ry) = ellipse_radii(fb.width, fb.height);

    // Rule of thirds
    for i in 1..3 {
        let x = w * i / 3;
        let y = h * i / 3;
        draw_dashed_line(fb, x, 0, x, h - 1, dash, gap, thickness.max(2) / 2, GRID_COLOR);
        draw_dashed_line(fb, 0, y, w - 1, y, dash, gap, thickness.max(2) / 2, GRID_COLOR);
    }

    draw_dashed_ellipse(fb, cx, cy, rx, ry, 24, thickness, ELLIPSE_COLOR);

    if !opts.counting {
        let scale = (h / 270).max(1);
        draw_text_centered(fb, cx, cy + ry + 4 * scale, GUIDE_CAPTION, scale, ELLIPSE_COLOR);
        fill_circle(fb, cx, cy, (h / 270).max(2), DOT_COLOR);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radii_follow_surface_size() {
        assert_eq!(ellipse_radii(1920, 1080), (230, 194));
        assert_eq!(ellipse_radii(100, 100), (12, 18));
    }

    #[test]
    fn hidden_guides_draw_nothing() {
        let mut fb = FrameBuffer::new(320, 180);
        draw_guides(&mut fb, GuideOptions { show: false, counting: false });
        assert!(fb.pixels.iter().all(|&p| p == 0));
    }

    #[test]
    fn center_dot_only_when_not_counting() {
        let mut idle = FrameBuffer::new(320, 180);
        draw_guides(&mut idle, GuideOptions { show: true, counting: false });
        assert_eq!(idle.get(160, 90), DOT_COLOR);

        let mut counting = FrameBuffer::new(320, 180);
        draw_guides(&mut counting, GuideOptions { show: true, counting: true });
        assert_eq!(counting.get(160, 90), 0);

        // Caption band below the oval is empty while counting.
        let (_, ry) = ellipse_radii(320, 180);
        let caption_y = 90 + ry as usize + 4;
        let row_has_ink = |fb: &FrameBuffer| {
            (caption_y..caption_y + 7).any(|y| (40..280).any(|x| fb.get(x, y) == ELLIPSE_COLOR))
        };
        assert!(row_has_ink(&idle));
        assert!(!row_has_ink(&counting));
    }
}
