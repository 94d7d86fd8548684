// Window + software drawing utilities.
// Visual effects provided here:
// 1) A window that shows the kiosk surface (scaled to fit).
// 2) Lines, dashed lines, dashed ellipses, dots and dimmed rectangles.
// 3) A tiny 5x7 bitmap font (integer-scaled) for captions, HUD and countdown.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::Error;
use crate::types::{FrameBuffer, pack_rgb, unpack_rgb};
use minifb::{InputCallback, Key, KeyRepeat, ScaleMode, Window, WindowOptions};

/// Collects characters typed into the window (contact form input).
struct TypedChars(Rc<RefCell<String>>);

impl InputCallback for TypedChars {
    fn add_char(&mut self, uni_char: u32) {
        if let Some(ch) = char::from_u32(uni_char) {
            if !ch.is_control() {
                self.0.borrow_mut().push(ch);
            }
        }
    }
}

pub struct Drawer {
    window: Window, // the on-screen window you see
    typed: Rc<RefCell<String>>,
}

impl Drawer {
    /// Create a window of `width` x `height`; any buffer presented later is
    /// stretched to it, keeping aspect ratio.
    /// Visual: a new empty window appears with your chosen title.
    pub fn new(title: &str, width: usize, height: usize, fps: usize) -> Result<Self, Error> {
        let options = WindowOptions {
            resize: true,
            scale_mode: ScaleMode::AspectRatioStretch,
            ..WindowOptions::default()
        };
        let mut window = Window::new(title, width, height, options)
            .map_err(|e| Error::WindowInit(e.to_string()))?;
        window.set_target_fps(fps);

        let typed = Rc::new(RefCell::new(String::new()));
        window.set_input_callback(Box::new(TypedChars(Rc::clone(&typed))));

        Ok(Self { window, typed })
    }

    /// Push the pixels for this frame to the screen.
    /// Visual: the window immediately displays the new image.
    pub fn present(&mut self, framebuffer: &FrameBuffer) -> Result<(), Error> {
        self.window
            .update_with_buffer(&framebuffer.pixels, framebuffer.width, framebuffer.height)
            .map_err(|e| Error::WindowUpdate(e.to_string()))?;
        Ok(())
    }

    /// Returns false when the user closes the window (so we can stop the loop).
    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    /// True while ESC is held down (we'll exit when this is pressed).
    pub fn esc_pressed(&self) -> bool {
        self.window.is_key_down(Key::Escape)
    }

    /// True on the frame a key goes down (no auto-repeat).
    pub fn pressed_once(&self, key: Key) -> bool {
        self.window.is_key_pressed(key, KeyRepeat::No)
    }

    /// Backspace repeats while held so the operator can wipe a field quickly.
    pub fn backspace_pressed(&self) -> bool {
        self.window.is_key_pressed(Key::Backspace, KeyRepeat::Yes)
    }

    /// Characters typed since the last call.
    pub fn take_typed(&self) -> String {
        std::mem::take(&mut *self.typed.borrow_mut())
    }
}

/* ---------- Software drawing: pixels, lines, shapes ---------- */

/// Put a pixel on the framebuffer if (x,y) is inside bounds.
/// Visual: the exact pixel at (x,y) changes color.
#[inline]
pub fn put_pixel(fb: &mut FrameBuffer, x: i32, y: i32, color: u32) {
    if x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as usize, y as usize);
    if x >= fb.width || y >= fb.height {
        return;
    }
    let idx = y * fb.width + x;
    fb.pixels[idx] = color;
}

/// Square brush of side `thickness` centered on (x,y).
#[inline]
fn plot(fb: &mut FrameBuffer, x: i32, y: i32, thickness: i32, color: u32) {
    let half = thickness / 2;
    for dy in 0..thickness.max(1) {
        for dx in 0..thickness.max(1) {
            put_pixel(fb, x + dx - half, y + dy - half, color);
        }
    }
}

/// Bresenham walk from (x0,y0) to (x1,y1), calling `f(x, y, step)` per pixel.
fn walk_line(x0: i32, y0: i32, x1: i32, y1: i32, mut f: impl FnMut(i32, i32, u32)) {
    let (mut x0, mut y0) = (x0, y0);
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let mut step = 0u32;
    loop {
        f(x0, y0, step);
        if x0 == x1 && y0 == y1 { break; }
        let e2 = 2 * err;
        if e2 >= dy { err += dy; x0 += sx; }
        if e2 <= dx { err += dx; y0 += sy; }
        step += 1;
    }
}

/// Draw a straight line `thickness` pixels wide.
pub fn draw_line(fb: &mut FrameBuffer, x0: i32, y0: i32, x1: i32, y1: i32, thickness: i32, color: u32) {
    walk_line(x0, y0, x1, y1, |x, y, _| plot(fb, x, y, thickness, color));
}

/// Dashed line: `dash` pixels on, `gap` pixels off, repeating from (x0,y0).
pub fn draw_dashed_line(
    fb: &mut FrameBuffer,
    x0: i32, y0: i32, x1: i32, y1: i32,
    dash: u32, gap: u32,
    thickness: i32,
    color: u32,
) {
    let period = (dash + gap).max(1);
    walk_line(x0, y0, x1, y1, |x, y, step| {
        if step % period < dash {
            plot(fb, x, y, thickness, color);
        }
    });
}

/// Dashed axis-aligned ellipse centered at (cx,cy).
/// The outline is split into `dashes` equal arcs; every other arc is drawn.
pub fn draw_dashed_ellipse(
    fb: &mut FrameBuffer,
    cx: i32, cy: i32,
    rx: i32, ry: i32,
    dashes: u32,
    thickness: i32,
    color: u32,
) {
    if rx <= 0 || ry <= 0 { return; }
    let segments = (dashes.max(2) * 2) as usize;
    // Enough samples per arc that neighbouring points touch on large radii.
    let samples_per_segment = ((rx.max(ry) as usize * 7) / segments).max(4);
    let total = segments * samples_per_segment;

    let point = |i: usize| {
        let t = i as f32 / total as f32 * std::f32::consts::TAU;
        (
            cx + (rx as f32 * t.cos()).round() as i32,
            cy + (ry as f32 * t.sin()).round() as i32,
        )
    };

    for seg in (0..segments).step_by(2) {
        let start = seg * samples_per_segment;
        for i in start..start + samples_per_segment {
            let (x0, y0) = point(i);
            let (x1, y1) = point(i + 1);
            draw_line(fb, x0, y0, x1, y1, thickness, color);
        }
    }
}

/// Filled disc. Visual: a solid round dot.
pub fn fill_circle(fb: &mut FrameBuffer, cx: i32, cy: i32, radius: i32, color: u32) {
    let r2 = radius * radius;
    for y in -radius..=radius {
        for x in -radius..=radius {
            if x * x + y * y <= r2 {
                put_pixel(fb, cx + x, cy + y, color);
            }
        }
    }
}

/// Clip a rectangle to the framebuffer, returning (x0, y0, x1, y1) exclusive.
fn clip_rect(fb: &FrameBuffer, x: i32, y: i32, w: i32, h: i32) -> Option<(usize, usize, usize, usize)> {
    let x0 = x.max(0) as usize;
    let y0 = y.max(0) as usize;
    let x1 = ((x + w).max(0) as usize).min(fb.width);
    let y1 = ((y + h).max(0) as usize).min(fb.height);
    (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
}

pub fn fill_rect(fb: &mut FrameBuffer, x: i32, y: i32, w: i32, h: i32, color: u32) {
    if let Some((x0, y0, x1, y1)) = clip_rect(fb, x, y, w, h) {
        for row in y0..y1 {
            let ofs = row * fb.width;
            fb.pixels[ofs + x0..ofs + x1].fill(color);
        }
    }
}

/// Multiply every channel inside the rectangle by `keep` (0..1).
/// Visual: a translucent black panel; the image underneath is still faintly visible.
pub fn dim_rect(fb: &mut FrameBuffer, x: i32, y: i32, w: i32, h: i32, keep: f32) {
    let keep = keep.clamp(0.0, 1.0);
    if let Some((x0, y0, x1, y1)) = clip_rect(fb, x, y, w, h) {
        for row in y0..y1 {
            let ofs = row * fb.width;
            for px in &mut fb.pixels[ofs + x0..ofs + x1] {
                let (r, g, b) = unpack_rgb(*px);
                *px = pack_rgb(
                    (r as f32 * keep) as u8,
                    (g as f32 * keep) as u8,
                    (b as f32 * keep) as u8,
                );
            }
        }
    }
}

/* ---------- 5x7 bitmap font ---------- */

/// Return a 5x7 glyph bitmap. Lowercase letters render as uppercase.
/// Each u8 is a row; the low 5 bits are the pixels (bit 4 = leftmost).
fn glyph5x7(ch: char) -> Option<[u8; 7]> {
    // Helper macro to define a glyph quickly
    macro_rules! g { ($a:expr,$b:expr,$c:expr,$d:expr,$e:expr,$f:expr,$g:expr) => {
        Some([$a,$b,$c,$d,$e,$f,$g])
    }; }

    match ch.to_ascii_uppercase() {
        // Digits 0..9
        '0' => g!(0b01110,0b10001,0b10011,0b10101,0b11001,0b10001,0b01110),
        '1' => g!(0b00100,0b01100,0b00100,0b00100,0b00100,0b00100,0b01110),
        '2' => g!(0b01110,0b10001,0b00001,0b00010,0b00100,0b01000,0b11111),
        '3' => g!(0b11110,0b00001,0b00001,0b01110,0b00001,0b00001,0b11110),
        '4' => g!(0b00010,0b00110,0b01010,0b10010,0b11111,0b00010,0b00010),
        '5' => g!(0b11111,0b10000,0b11110,0b00001,0b00001,0b10001,0b01110),
        '6' => g!(0b00110,0b01000,0b10000,0b11110,0b10001,0b10001,0b01110),
        '7' => g!(0b11111,0b00001,0b00010,0b00100,0b01000,0b01000,0b01000),
        '8' => g!(0b01110,0b10001,0b10001,0b01110,0b10001,0b10001,0b01110),
        '9' => g!(0b01110,0b10001,0b10001,0b01111,0b00001,0b00010,0b01100),

        'A' => g!(0b01110,0b10001,0b10001,0b11111,0b10001,0b10001,0b10001),
        'B' => g!(0b11110,0b10001,0b10001,0b11110,0b10001,0b10001,0b11110),
        'C' => g!(0b01110,0b10001,0b10000,0b10000,0b10000,0b10001,0b01110),
        'D' => g!(0b11100,0b10010,0b10001,0b10001,0b10001,0b10010,0b11100),
        'E' => g!(0b11111,0b10000,0b10000,0b11110,0b10000,0b10000,0b11111),
        'F' => g!(0b11111,0b10000,0b10000,0b11110,0b10000,0b10000,0b10000),
        'G' => g!(0b01110,0b10001,0b10000,0b10111,0b10001,0b10001,0b01111),
        'H' => g!(0b10001,0b10001,0b10001,0b11111,0b10001,0b10001,0b10001),
        'I' => g!(0b01110,0b00100,0b00100,0b00100,0b00100,0b00100,0b01110),
        'J' => g!(0b00111,0b00010,0b00010,0b00010,0b00010,0b10010,0b01100),
        'K' => g!(0b10001,0b10010,0b10100,0b11000,0b10100,0b10010,0b10001),
        'L' => g!(0b10000,0b10000,0b10000,0b10000,0b10000,0b10000,0b11111),
        'M' => g!(0b10001,0b11011,0b10101,0b10101,0b10001,0b10001,0b10001),
        'N' => g!(0b10001,0b10001,0b11001,0b10101,0b10011,0b10001,0b10001),
        'O' => g!(0b01110,0b10001,0b10001,0b10001,0b10001,0b10001,0b01110),
        'P' => g!(0b11110,0b10001,0b10001,0b11110,0b10000,0b10000,0b10000),
        'Q' => g!(0b01110,0b10001,0b10001,0b10001,0b10101,0b10010,0b01101),
        'R' => g!(0b11110,0b10001,0b10001,0b11110,0b10100,0b10010,0b10001),
        'S' => g!(0b01111,0b10000,0b10000,0b01110,0b00001,0b00001,0b11110),
        'T' => g!(0b11111,0b00100,0b00100,0b00100,0b00100,0b00100,0b00100),
        'U' => g!(0b10001,0b10001,0b10001,0b10001,0b10001,0b10001,0b01110),
        'V' => g!(0b10001,0b10001,0b10001,0b10001,0b10001,0b01010,0b00100),
        'W' => g!(0b10001,0b10001,0b10001,0b10101,0b10101,0b10101,0b01010),
        'X' => g!(0b10001,0b10001,0b01010,0b00100,0b01010,0b10001,0b10001),
        'Y' => g!(0b10001,0b10001,0b10001,0b01010,0b00100,0b00100,0b00100),
        'Z' => g!(0b11111,0b00001,0b00010,0b00100,0b01000,0b10000,0b11111),

        // Punctuation used by the HUD, captions and contact fields
        ' ' => g!(0b00000,0b00000,0b00000,0b00000,0b00000,0b00000,0b00000),
        '|' => g!(0b00100,0b00100,0b00100,0b00100,0b00100,0b00100,0b00100),
        ':' => g!(0b00000,0b00100,0b00000,0b00000,0b00100,0b00000,0b00000),
        '.' => g!(0b00000,0b00000,0b00000,0b00000,0b00000,0b00100,0b00000),
        ',' => g!(0b00000,0b00000,0b00000,0b00000,0b00110,0b00100,0b01000),
        '-' => g!(0b00000,0b00000,0b00000,0b11111,0b00000,0b00000,0b00000),
        '+' => g!(0b00000,0b00100,0b00100,0b11111,0b00100,0b00100,0b00000),
        '_' => g!(0b00000,0b00000,0b00000,0b00000,0b00000,0b00000,0b11111),
        '@' => g!(0b01110,0b10001,0b00001,0b01101,0b10101,0b10101,0b01110),
        '/' => g!(0b00000,0b00001,0b00010,0b00100,0b01000,0b10000,0b00000),
        '(' => g!(0b00010,0b00100,0b01000,0b01000,0b01000,0b00100,0b00010),
        ')' => g!(0b01000,0b00100,0b00010,0b00010,0b00010,0b00100,0b01000),
        '[' => g!(0b01110,0b01000,0b01000,0b01000,0b01000,0b01000,0b01110),
        ']' => g!(0b01110,0b00010,0b00010,0b00010,0b00010,0b00010,0b01110),
        '<' => g!(0b00010,0b00100,0b01000,0b10000,0b01000,0b00100,0b00010),
        '>' => g!(0b01000,0b00100,0b00010,0b00001,0b00010,0b00100,0b01000),
        '!' => g!(0b00100,0b00100,0b00100,0b00100,0b00100,0b00000,0b00100),
        '*' => g!(0b00000,0b00100,0b10101,0b01110,0b10101,0b00100,0b00000),
        '\'' => g!(0b00100,0b00100,0b01000,0b00000,0b00000,0b00000,0b00000),

        _ => None,
    }
}

/// Width in pixels of `text` drawn at `scale`.
pub fn text_width(text: &str, scale: i32) -> i32 {
    text.chars().count() as i32 * 6 * scale
}

/// Draw a single glyph at (x,y), each font pixel becoming a `scale` x `scale` block.
/// Visual: a glyph with a 1-block black shadow for contrast on live video.
fn draw_char_5x7(fb: &mut FrameBuffer, x: i32, y: i32, ch: char, scale: i32, color: u32) {
    let Some(rows) = glyph5x7(ch) else { return };

    // Shadow pass first, then the glyph itself on top.
    for (ofs, c) in [(scale, 0x00000000), (0, color)] {
        for (ry, rowbits) in rows.iter().enumerate() {
            for rx in 0..5 {
                if (rowbits & (1 << (4 - rx))) != 0 {
                    fill_rect(
                        fb,
                        x + rx * scale + ofs,
                        y + ry as i32 * scale + ofs,
                        scale,
                        scale,
                        c,
                    );
                }
            }
        }
    }
}

/// Draw a text string using 5x7 glyphs at `scale`.
/// Visual: each glyph is 5x7 blocks with 1 block of spacing.
pub fn draw_text(fb: &mut FrameBuffer, mut x: i32, y: i32, text: &str, scale: i32, color: u32) {
    let scale = scale.max(1);
    for ch in text.chars() {
        draw_char_5x7(fb, x, y, ch, scale, color);
        x += 6 * scale; // 5 blocks glyph width + 1 block spacing
    }
}

/// Draw text horizontally centered on `cx`.
pub fn draw_text_centered(fb: &mut FrameBuffer, cx: i32, y: i32, text: &str, scale: i32, color: u32) {
    let w = text_width(text, scale.max(1));
    draw_text(fb, cx - w / 2, y, text, scale, color);
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: u32 = 0x00FF_FFFF;

    #[test]
    fn put_pixel_ignores_out_of_bounds() {
        let mut fb = FrameBuffer::new(4, 4);
        put_pixel(&mut fb, -1, 0, WHITE);
        put_pixel(&mut fb, 4, 0, WHITE);
        put_pixel(&mut fb, 0, 4, WHITE);
        assert!(fb.pixels.iter().all(|&p| p == 0));
        put_pixel(&mut fb, 3, 3, WHITE);
        assert_eq!(fb.get(3, 3), WHITE);
    }

    #[test]
    fn dashed_line_leaves_gaps() {
        let mut fb = FrameBuffer::new(20, 1);
        draw_dashed_line(&mut fb, 0, 0, 19, 0, 4, 4, 1, WHITE);
        let lit: Vec<bool> = fb.pixels.iter().map(|&p| p == WHITE).collect();
        assert!(lit[0..4].iter().all(|&b| b));
        assert!(lit[4..8].iter().all(|&b| !b));
        assert!(lit[8..12].iter().all(|&b| b));
    }

    #[test]
    fn dashed_ellipse_stays_on_its_outline() {
        let mut fb = FrameBuffer::new(200, 200);
        draw_dashed_ellipse(&mut fb, 100, 100, 40, 60, 12, 1, WHITE);
        assert!(fb.pixels.iter().any(|&p| p == WHITE));
        for y in 0..200 {
            for x in 0..200 {
                if fb.get(x, y) == WHITE {
                    let nx = (x as f32 - 100.0) / 40.0;
                    let ny = (y as f32 - 100.0) / 60.0;
                    let d = (nx * nx + ny * ny).sqrt();
                    assert!((0.9..=1.1).contains(&d), "pixel ({x},{y}) off the outline");
                }
            }
        }
        // the center is never painted
        assert_eq!(fb.get(100, 100), 0);
    }

    #[test]
    fn dim_rect_scales_channels() {
        let mut fb = FrameBuffer::filled(2, 2, 0x00C8_6432);
        dim_rect(&mut fb, 0, 0, 1, 1, 0.5);
        assert_eq!(fb.get(0, 0), 0x0064_3219);
        assert_eq!(fb.get(1, 1), 0x00C8_6432);
    }

    #[test]
    fn text_width_counts_spacing() {
        assert_eq!(text_width("AB", 1), 12);
        assert_eq!(text_width("AB", 3), 36);
    }

    #[test]
    fn lowercase_renders_like_uppercase() {
        let mut lower = FrameBuffer::new(20, 20);
        let mut upper = FrameBuffer::new(20, 20);
        draw_text(&mut lower, 1, 1, "ok@", 1, WHITE);
        draw_text(&mut upper, 1, 1, "OK@", 1, WHITE);
        assert_eq!(lower, upper);
    }
}
