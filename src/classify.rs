// Naive color-threshold background detector.
// Visual: pixels that look like a plain wall (very bright, very dark, grey,
// or strongly green/blue) get punched out so the chosen background shows through.
// Same RGB + position always gives the same answer.

/// Result of classifying a single pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelClass {
    Background,
    Subject,
}

impl PixelClass {
    #[inline]
    pub fn is_background(self) -> bool {
        self == PixelClass::Background
    }
}

/// True when (x,y) lies in the outer 10% band on any side of a `width` x `height` surface.
#[inline]
pub fn in_edge_zone(x: usize, y: usize, width: usize, height: usize) -> bool {
    let (x, y) = (x as f64, y as f64);
    let (w, h) = (width as f64, height as f64);
    x < 0.1 * w || x > 0.9 * w || y < 0.1 * h || y > 0.9 * h
}

/// Classify one pixel from its color and its position on the surface.
pub fn classify(r: u8, g: u8, b: u8, x: usize, y: usize, width: usize, height: usize) -> PixelClass {
    let background = if in_edge_zone(x, y, width, height) {
        edge_rule(r as i32, g as i32, b as i32)
    } else {
        interior_rule(r as i32, g as i32, b as i32)
    };

    if background { PixelClass::Background } else { PixelClass::Subject }
}

#[inline]
fn edge_rule(r: i32, g: i32, b: i32) -> bool {
    let bright = r > 180 && g > 180 && b > 180;
    let dark = r < 60 && g < 60 && b < 60;
    let grey = (r - g).abs() < 40 && (g - b).abs() < 40 && (r - b).abs() < 40;
    bright || dark || grey
}

#[inline]
fn interior_rule(r: i32, g: i32, b: i32) -> bool {
    let bright = r > 200 && g > 200 && b > 200;
    let dark = r < 40 && g < 40 && b < 40;
    let light_grey = (r - g).abs() < 25 && (g - b).abs() < 25 && (r - b).abs() < 25 && r > 160;
    let green = g > r + 50 && g > b + 50 && g > 100;
    let blue = b > r + 50 && b > g + 50 && b > 100;
    bright || dark || light_grey || green || blue
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: usize = 100;
    const H: usize = 100;

    // (50,50) is interior, (5,50) is in the left edge band.
    fn interior(r: u8, g: u8, b: u8) -> bool {
        classify(r, g, b, 50, 50, W, H).is_background()
    }

    fn edge(r: u8, g: u8, b: u8) -> bool {
        classify(r, g, b, 5, 50, W, H).is_background()
    }

    #[test]
    fn edge_zone_covers_outer_ten_percent_on_every_side() {
        assert!(in_edge_zone(9, 50, W, H));
        assert!(!in_edge_zone(10, 50, W, H));
        assert!(!in_edge_zone(90, 50, W, H));
        assert!(in_edge_zone(91, 50, W, H));
        assert!(in_edge_zone(50, 9, W, H));
        assert!(!in_edge_zone(50, 10, W, H));
        assert!(!in_edge_zone(50, 90, W, H));
        assert!(in_edge_zone(50, 91, W, H));
    }

    #[test]
    fn edge_zone_uses_fractional_bounds_on_odd_sizes() {
        // 0.1 * 1080 = 108, 0.9 * 1920 = 1728
        assert!(in_edge_zone(500, 107, 1920, 1080));
        assert!(!in_edge_zone(500, 108, 1920, 1080));
        assert!(!in_edge_zone(1728, 500, 1920, 1080));
        assert!(in_edge_zone(1729, 500, 1920, 1080));
    }

    #[test]
    fn interior_white_and_black_are_background() {
        assert!(interior(255, 255, 255));
        assert!(interior(0, 0, 0));
        assert!(interior(201, 201, 201));
        assert!(interior(39, 39, 39));
    }

    #[test]
    fn interior_mid_grey_is_subject() {
        assert!(!interior(128, 128, 128));
    }

    #[test]
    fn interior_light_grey_boundary_is_exclusive_at_160() {
        assert!(!interior(160, 160, 160));
        assert!(interior(161, 161, 161));
    }

    #[test]
    fn interior_grey_spread_boundary_is_exclusive_at_25() {
        assert!(interior(170, 170, 194)); // |g-b| = 24
        assert!(!interior(170, 170, 195)); // |g-b| = 25
    }

    #[test]
    fn interior_dark_and_bright_bounds_are_strict() {
        assert!(!interior(40, 0, 0));
        assert!(!interior(40, 39, 39));
        // fails "bright" (r>200) and "light grey" (|r-g|=55)
        assert!(!interior(200, 255, 255));
    }

    #[test]
    fn interior_green_and_blue_screens_are_background() {
        assert!(interior(20, 200, 30));
        assert!(interior(30, 40, 200));
        // Green must beat red by more than 50
        assert!(!interior(100, 150, 20));
        assert!(interior(99, 150, 20));
        // and exceed 100
        assert!(!interior(45, 100, 45));
        assert!(interior(45, 101, 45));
    }

    #[test]
    fn skin_tone_is_subject_everywhere() {
        assert!(!interior(224, 172, 105));
        assert!(!edge(224, 172, 105));
    }

    #[test]
    fn edge_thresholds_are_wider() {
        // bright threshold is 180 at the edge, 200 inside
        assert!(edge(181, 181, 230));
        assert!(!edge(180, 230, 250));
        // dark threshold is 60 at the edge
        assert!(edge(59, 10, 0));
        // any low-saturation color counts at the edge, regardless of brightness
        assert!(edge(128, 128, 128));
        assert!(edge(100, 139, 120));
        assert!(!edge(100, 140, 120));
    }

    #[test]
    fn edge_ignores_green_screen_rule() {
        // Saturated green is only handled by the interior rule.
        assert!(interior(20, 200, 30));
        assert!(!edge(20, 200, 30));
    }
}
