use crate::types::PixelCoord;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;

pub const PUPIL_MARKER_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const PUPIL_MARKER_RADIUS: f32 = 5.0;

/// Draws a cross-hair centred on `at`.
pub fn draw_pupil_marker(frame: &mut RgbImage, at: PixelCoord, color: Rgb<u8>) {
    let (x, y) = (at.x as f32, at.y as f32);
    let r = PUPIL_MARKER_RADIUS;
    draw_line_segment_mut(frame, (x - r, y), (x + r, y), color);
    draw_line_segment_mut(frame, (x, y - r), (x, y + r), color);
}

/// Copy of `frame` with a marker on every given pupil.
pub fn annotate_pupils(frame: &RgbImage, pupils: &[PixelCoord]) -> RgbImage {
    let mut out = frame.clone();
    for &pupil in pupils {
        draw_pupil_marker(&mut out, pupil, PUPIL_MARKER_COLOR);
    }
    out
}
