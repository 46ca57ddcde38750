//! Eye region isolation.
//!
//! Landmark indices follow the 68-point layout:
//! - 36-41: left eye (outer corner, two upper lid points, inner corner, two lower lid points)
//! - 42-47: right eye, same ordering

use crate::config::EyeConfig;
use crate::error::{GazeError, GazeResult};
use crate::types::{EyeSide, Landmarks, PixelCoord, Point};
use image::{imageops, GrayImage, Luma};
use imageproc::drawing::draw_polygon_mut;

pub const LEFT_EYE_POINTS: [usize; 6] = [36, 37, 38, 39, 40, 41];
pub const RIGHT_EYE_POINTS: [usize; 6] = [42, 43, 44, 45, 46, 47];

/// Lid heights below this are treated as collapsed landmarks.
const MIN_EYE_HEIGHT: f32 = 1e-3;

pub fn eye_indices(side: EyeSide) -> &'static [usize; 6] {
    match side {
        EyeSide::Left => &LEFT_EYE_POINTS,
        EyeSide::Right => &RIGHT_EYE_POINTS,
    }
}

/// An eye cropped out of the grayscale frame, with everything outside the
/// landmark polygon painted over.
#[derive(Debug, Clone)]
pub struct EyeRegion {
    pub side: EyeSide,
    pub image: GrayImage,
    /// Top-left corner of `image` in frame coordinates.
    pub origin: PixelCoord,
    /// Eye width over lid height; grows as the eye closes.
    pub blink_ratio: f32,
}

impl EyeRegion {
    pub fn extract(
        frame: &GrayImage,
        landmarks: &Landmarks,
        side: EyeSide,
        config: &EyeConfig,
    ) -> GazeResult<Self> {
        let points = eye_points(landmarks, side)?;
        let (frame_w, frame_h) = frame.dimensions();

        for p in &points {
            if !p.x.is_finite() || !p.y.is_finite() {
                return Err(GazeError::degenerate(format!("{side} eye has non-finite landmark")));
            }
            if p.x < 0.0 || p.y < 0.0 || p.x >= frame_w as f32 || p.y >= frame_h as f32 {
                return Err(GazeError::degenerate(format!(
                    "{side} eye landmark ({:.1}, {:.1}) outside {}x{} frame",
                    p.x, p.y, frame_w, frame_h
                )));
            }
        }

        let blink_ratio = blink_ratio(&points)?;

        let margin = config.region_margin as f32;
        let min_x = points.iter().map(|p| p.x).fold(f32::MAX, f32::min);
        let min_y = points.iter().map(|p| p.y).fold(f32::MAX, f32::min);
        let max_x = points.iter().map(|p| p.x).fold(f32::MIN, f32::max);
        let max_y = points.iter().map(|p| p.y).fold(f32::MIN, f32::max);

        let x0 = (min_x.floor() - margin).max(0.0) as u32;
        let y0 = (min_y.floor() - margin).max(0.0) as u32;
        let x1 = ((max_x.ceil() + margin) as u32).min(frame_w);
        let y1 = ((max_y.ceil() + margin) as u32).min(frame_h);
        if x1 <= x0 || y1 <= y0 {
            return Err(GazeError::degenerate(format!("{side} eye crop is empty")));
        }

        let origin = PixelCoord::new(x0, y0);
        let mut image = imageops::crop_imm(frame, x0, y0, x1 - x0, y1 - y0).to_image();
        mask_outside_polygon(&mut image, &points, origin, config.mask_value)?;

        Ok(Self {
            side,
            image,
            origin,
            blink_ratio,
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Pupil position normalized to [0, 1] along each axis of the region.
    ///
    /// The usable extent is the region size minus the crop margin on both sides.
    pub fn gaze_ratios(&self, pupil: PixelCoord, margin: u32) -> GazeResult<(f32, f32)> {
        let span_x = self.width() as f32 - 2.0 * margin as f32;
        let span_y = self.height() as f32 - 2.0 * margin as f32;
        if span_x <= 0.0 || span_y <= 0.0 {
            return Err(GazeError::degenerate(format!(
                "{} eye region {}x{} too small for margin {}",
                self.side,
                self.width(),
                self.height(),
                margin
            )));
        }
        let horizontal = (pupil.x as f32 / span_x).clamp(0.0, 1.0);
        let vertical = (pupil.y as f32 / span_y).clamp(0.0, 1.0);
        Ok((horizontal, vertical))
    }
}

fn eye_points(landmarks: &Landmarks, side: EyeSide) -> GazeResult<[Point; 6]> {
    let indices = eye_indices(side);
    let mut points = [Point::default(); 6];
    for (slot, &i) in points.iter_mut().zip(indices.iter()) {
        *slot = *landmarks.points.get(i).ok_or_else(|| {
            GazeError::degenerate(format!(
                "{side} eye needs landmark {i}, detector gave {}",
                landmarks.points.len()
            ))
        })?;
    }
    Ok(points)
}

/// Horizontal corner distance over the distance between the lid midpoints.
pub fn blink_ratio(points: &[Point; 6]) -> GazeResult<f32> {
    let left = points[0];
    let right = points[3];
    let top = points[1].midpoint(&points[2]);
    let bottom = points[5].midpoint(&points[4]);

    let width = left.distance(&right);
    let height = top.distance(&bottom);
    if !height.is_finite() || height < MIN_EYE_HEIGHT {
        return Err(GazeError::degenerate("eye lids collapsed onto each other"));
    }
    Ok(width / height)
}

fn mask_outside_polygon(
    image: &mut GrayImage,
    points: &[Point; 6],
    origin: PixelCoord,
    mask_value: u8,
) -> GazeResult<()> {
    let poly: Vec<imageproc::point::Point<i32>> = points
        .iter()
        .map(|p| {
            imageproc::point::Point::new(
                (p.x - origin.x as f32).round() as i32,
                (p.y - origin.y as f32).round() as i32,
            )
        })
        .collect();
    if poly.first() == poly.last() {
        return Err(GazeError::degenerate("eye polygon starts and ends on the same point"));
    }

    let mut mask = GrayImage::new(image.width(), image.height());
    draw_polygon_mut(&mut mask, &poly, Luma([255u8]));

    for (pixel, inside) in image.pixels_mut().zip(mask.pixels()) {
        if inside[0] == 0 {
            *pixel = Luma([mask_value]);
        }
    }
    Ok(())
}
