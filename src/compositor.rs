// Per-tick frame compositor.
// Visual expectation: the render surface always has the fixed output size.
// Without a ready background you see the camera letterboxed on black; with one,
// you see yourself cut out (by the color heuristic) in front of the chosen image.

use crate::classify::classify;
use crate::error::Error;
use crate::guides::{GuideOptions, draw_guides};
use crate::types::{FrameBuffer, Layer, OPAQUE, alpha, unpack_rgb};

/// Where a letterboxed source lands on the output surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

/// Fit `src` inside `dst` preserving aspect ratio, centered on the shorter axis.
/// One axis is filled exactly; the other gets `offset = (dst - scaled) / 2`.
pub fn letterbox(src_w: usize, src_h: usize, dst_w: usize, dst_h: usize) -> Placement {
    if src_w == 0 || src_h == 0 || dst_w == 0 || dst_h == 0 {
        return Placement { x: 0, y: 0, width: 0, height: 0 };
    }

    let scale = f64::min(dst_w as f64 / src_w as f64, dst_h as f64 / src_h as f64);
    let width = ((src_w as f64 * scale).round() as usize).clamp(1, dst_w);
    let height = ((src_h as f64 * scale).round() as usize).clamp(1, dst_h);

    Placement {
        x: (dst_w - width) / 2,
        y: (dst_h - height) / 2,
        width,
        height,
    }
}

/// Nearest-neighbour source column/row for every destination column/row.
fn sample_map(src_len: usize, dst_len: usize) -> Vec<usize> {
    (0..dst_len)
        .map(|d| ((d * src_len) / dst_len.max(1)).min(src_len.saturating_sub(1)))
        .collect()
}

/// Stretch `src` over all of `dst` (no aspect preservation).
pub fn stretch_into(src: &FrameBuffer, dst: &mut FrameBuffer) {
    if src.width == dst.width && src.height == dst.height {
        dst.pixels.copy_from_slice(&src.pixels);
        return;
    }
    if src.width == 0 || src.height == 0 {
        dst.pixels.fill(0);
        return;
    }
    let xs = sample_map(src.width, dst.width);
    let ys = sample_map(src.height, dst.height);
    for (dy, &sy) in ys.iter().enumerate() {
        let src_row = &src.pixels[sy * src.width..(sy + 1) * src.width];
        let dst_row = &mut dst.pixels[dy * dst.width..(dy + 1) * dst.width];
        for (d, &sx) in dst_row.iter_mut().zip(xs.iter()) {
            *d = src_row[sx];
        }
    }
}

/// Scale `src` into the `place` rectangle of a `dst_width`-wide pixel slice,
/// OR-ing `mask` into every written pixel (OPAQUE for layers, 0 for surfaces).
fn blit_scaled(src: &FrameBuffer, dst: &mut [u32], dst_width: usize, place: Placement, mask: u32) {
    if place.width == 0 || place.height == 0 || src.width == 0 || src.height == 0 {
        return;
    }
    let xs = sample_map(src.width, place.width);
    let ys = sample_map(src.height, place.height);
    for (row, &sy) in ys.iter().enumerate() {
        let src_row = &src.pixels[sy * src.width..(sy + 1) * src.width];
        let start = (place.y + row) * dst_width + place.x;
        let dst_row = &mut dst[start..start + place.width];
        for (d, &sx) in dst_row.iter_mut().zip(xs.iter()) {
            *d = (src_row[sx] & 0x00FF_FFFF) | mask;
        }
    }
}

/// What a call to `Compositor::render` did to the surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderOutcome {
    /// No camera frame yet; the surface keeps its previous content.
    Skipped,
    /// Letterboxed camera on black.
    Plain,
    /// Camera cut out over the replacement background.
    Composited,
}

pub struct Compositor {
    width: usize,
    height: usize,
    layer: Layer, // off-screen ARGB scratch, reused every tick
}

impl Compositor {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, layer: Layer::new(width, height) }
    }

    /// Fresh black surface of the output size.
    pub fn new_surface(&self) -> FrameBuffer {
        FrameBuffer::new(self.width, self.height)
    }

    /// Produce one frame on `surface`.
    /// `frame` is the latest camera frame (None until the camera delivers);
    /// `background` is the preloaded image of the selected entry, if any.
    pub fn render(
        &mut self,
        surface: &mut FrameBuffer,
        frame: Option<&FrameBuffer>,
        background: Option<&FrameBuffer>,
        guides: GuideOptions,
    ) -> Result<RenderOutcome, Error> {
        if surface.width != self.width || surface.height != self.height {
            return Err(Error::Surface(format!(
                "render: surface is {}x{}, compositor is {}x{}",
                surface.width, surface.height, self.width, self.height
            )));
        }

        let Some(frame) = frame else {
            return Ok(RenderOutcome::Skipped);
        };
        let place = letterbox(frame.width, frame.height, self.width, self.height);

        let outcome = match background {
            None => {
                // 1) Plain letterboxed video on black.
                surface.pixels.fill(0);
                blit_scaled(frame, &mut surface.pixels, self.width, place, 0);
                RenderOutcome::Plain
            }
            Some(bg) => {
                // 2) Background stretched to the whole surface.
                stretch_into(bg, surface);

                // 3) Video letterboxed into the transparent off-screen layer.
                self.layer.clear();
                blit_scaled(frame, &mut self.layer.pixels, self.width, place, OPAQUE);

                // 4) Punch out background-looking pixels, 5) composite.
                punch_background(&mut self.layer);
                composite_over(surface, &self.layer);
                RenderOutcome::Composited
            }
        };

        // 6) Guides last so the classifier never eats them.
        draw_guides(surface, guides);

        Ok(outcome)
    }
}

/// Set alpha to zero on every layer pixel the classifier calls background.
/// Coordinates are surface coordinates so the edge band matches the output frame.
pub fn punch_background(layer: &mut Layer) {
    let (w, h) = (layer.width, layer.height);
    for y in 0..h {
        let row = &mut layer.pixels[y * w..(y + 1) * w];
        for (x, px) in row.iter_mut().enumerate() {
            if alpha(*px) == 0 { continue; } // already transparent (letterbox bars)
            let (r, g, b) = unpack_rgb(*px);
            if classify(r, g, b, x, y, w, h).is_background() {
                *px &= 0x00FF_FFFF;
            }
        }
    }
}

/// Copy opaque layer pixels onto the surface; transparent ones leave it as is.
pub fn composite_over(surface: &mut FrameBuffer, layer: &Layer) {
    for (dst, &src) in surface.pixels.iter_mut().zip(layer.pixels.iter()) {
        if alpha(src) != 0 {
            *dst = src & 0x00FF_FFFF;
        }
    }
}
