//! The fixed 16x16 RGBA raster every pane renders into, plus the small set of
//! pixel operations the compositor needs: offset drawing for pans, RGB scaling
//! for fades, and alpha-over blending for animation scrubbing.

use image::RgbaImage;

pub const WIDTH: u32 = 16;
pub const HEIGHT: u32 = 16;

/// One 16x16 RGBA raster, row-major, 4 bytes per pixel.
pub type Frame = RgbaImage;

/// A fully transparent black frame.
pub fn blank() -> Frame {
    RgbaImage::new(WIDTH, HEIGHT)
}

/// Draws `src` into `dst`, sampling `src` at `x + offset` for each destination
/// column `x`. Destination pixels whose source column falls outside the frame
/// are left untouched, so two calls with complementary offsets produce the
/// sliding-pane composite.
pub fn draw_shifted(dst: &mut Frame, src: &Frame, offset: i32) {
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            let sx = x as i32 + offset;
            if (0..WIDTH as i32).contains(&sx) {
                dst.put_pixel(x, y, *src.get_pixel(sx as u32, y));
            }
        }
    }
}

/// Scales the RGB channels of every pixel by `factor` in `[0, 1]`.
/// Alpha is never touched.
pub fn scale_rgb(frame: &mut Frame, factor: f64) {
    let factor = factor.clamp(0.0, 1.0);
    for px in frame.pixels_mut() {
        px[0] = (f64::from(px[0]) * factor) as u8;
        px[1] = (f64::from(px[1]) * factor) as u8;
        px[2] = (f64::from(px[2]) * factor) as u8;
    }
}

/// Straight-alpha "over" composite of `next` onto `under`, with the source
/// alpha additionally scaled by `weight` in `[0, 1]`. Weight 0 returns
/// `under` unchanged; weight 1 is a plain over-composite.
pub fn blend_over(under: &Frame, next: &Frame, weight: f64) -> Frame {
    let weight = weight.clamp(0.0, 1.0);
    let mut out = under.clone();
    for (dst, src) in out.pixels_mut().zip(next.pixels()) {
        let sa = f64::from(src[3]) / 255.0 * weight;
        for c in 0..3 {
            dst[c] = (f64::from(src[c]) * sa + f64::from(dst[c]) * (1.0 - sa)).round() as u8;
        }
        dst[3] = (f64::from(src[3]) * weight + f64::from(dst[3]) * (1.0 - sa)).round() as u8;
    }
    out
}
