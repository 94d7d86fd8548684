// Core pixel containers shared by the camera, compositor, catalog and window.

/// Opaque frame: each entry is 0x00RRGGBB, ready for minifb.
/// Used for camera frames, decoded backgrounds and the render surface.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameBuffer {
    pub width: usize,      // how wide the frame is (pixels)
    pub height: usize,     // how tall the frame is (pixels)
    pub pixels: Vec<u32>,  // 0x00RRGGBB, row-major, len = width * height
}

impl FrameBuffer {
    /// All-black buffer. Visual: an empty (black) surface before the first frame.
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, pixels: vec![0u32; width * height] }
    }

    pub fn filled(width: usize, height: usize, color: u32) -> Self {
        Self { width, height, pixels: vec![color & 0x00FF_FFFF; width * height] }
    }

    /// Wrap an `image` RGB buffer (camera frame or decoded background).
    pub fn from_rgb_image(img: &image::RgbImage) -> Self {
        let (w, h) = img.dimensions();
        let pixels = img
            .pixels()
            .map(|p| pack_rgb(p[0], p[1], p[2]))
            .collect();
        Self { width: w as usize, height: h as usize, pixels }
    }

    /// Unpack to an `image` RGB buffer (used by the JPEG encoder).
    pub fn to_rgb_image(&self) -> image::RgbImage {
        let mut raw = Vec::with_capacity(self.pixels.len() * 3);
        for &px in &self.pixels {
            let (r, g, b) = unpack_rgb(px);
            raw.extend_from_slice(&[r, g, b]);
        }
        image::RgbImage::from_raw(self.width as u32, self.height as u32, raw)
            .unwrap_or_else(|| image::RgbImage::new(self.width as u32, self.height as u32))
    }

    #[cfg(test)]
    pub fn get(&self, x: usize, y: usize) -> u32 {
        self.pixels[y * self.width + x]
    }
}

/// Off-screen ARGB layer: 0xAARRGGBB. Alpha is binary here,
/// 0xFF = subject pixel kept, 0x00 = punched through (background shows).
#[derive(Clone, Debug)]
pub struct Layer {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u32>,
}

impl Layer {
    /// Fully transparent layer.
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, pixels: vec![0u32; width * height] }
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }
}

pub const OPAQUE: u32 = 0xFF00_0000;

#[inline]
pub fn pack_rgb(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

#[inline]
pub fn unpack_rgb(px: u32) -> (u8, u8, u8) {
    (((px >> 16) & 0xFF) as u8, ((px >> 8) & 0xFF) as u8, (px & 0xFF) as u8)
}

#[inline]
pub fn alpha(px: u32) -> u8 {
    (px >> 24) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_image_conversion_keeps_channel_order() {
        let mut img = image::RgbImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgb([10, 20, 30]));
        img.put_pixel(1, 0, image::Rgb([255, 0, 128]));

        let fb = FrameBuffer::from_rgb_image(&img);
        assert_eq!(fb.pixels, vec![0x000A141E, 0x00FF0080]);
        assert_eq!(fb.to_rgb_image(), img);
    }

    #[test]
    fn filled_strips_alpha_byte() {
        let fb = FrameBuffer::filled(1, 1, 0xFF12_3456);
        assert_eq!(fb.pixels[0], 0x0012_3456);
    }
}
