use crate::config::PupilConfig;
use crate::error::{GazeError, GazeResult};
use crate::types::{EyeSide, PixelCoord};
use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{dilate, erode};
use imageproc::region_labelling::{connected_components, Connectivity};
use tracing::debug;

/// Foreground (255) where the eye is darker than `threshold`, background (0) elsewhere.
pub fn binarize(eye: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(eye.width(), eye.height(), |x, y| {
        if eye.get_pixel(x, y)[0] < threshold {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Morphological opening with a 3x3 square kernel applied `iterations` times.
///
/// An L-infinity radius of k equals k passes of the 3x3 kernel.
pub fn denoise(mask: &GrayImage, iterations: u8) -> GrayImage {
    if iterations == 0 {
        return mask.clone();
    }
    let eroded = erode(mask, Norm::LInf, iterations);
    dilate(&eroded, Norm::LInf, iterations)
}

#[derive(Debug, Clone, Copy, Default)]
struct BlobStats {
    area: u64,
    sum_x: u64,
    sum_y: u64,
}

/// Centroid (zeroth/first order moments) of the largest 8-connected foreground blob.
///
/// Equal areas resolve to the blob met first in raster order.
pub fn largest_blob_centroid(mask: &GrayImage) -> Option<PixelCoord> {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

    let mut blobs: Vec<BlobStats> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0] as usize;
        if label == 0 {
            continue;
        }
        if blobs.len() <= label {
            blobs.resize(label + 1, BlobStats::default());
        }
        let blob = &mut blobs[label];
        blob.area += 1;
        blob.sum_x += u64::from(x);
        blob.sum_y += u64::from(y);
    }

    let mut best: Option<&BlobStats> = None;
    for blob in blobs.iter().filter(|b| b.area > 0) {
        if best.map_or(true, |b| blob.area > b.area) {
            best = Some(blob);
        }
    }

    best.map(|b| PixelCoord::new((b.sum_x / b.area) as u32, (b.sum_y / b.area) as u32))
}

/// Pupil centre relative to its eye region's origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pupil {
    pub position: PixelCoord,
}

impl Pupil {
    pub fn locate(
        eye: &GrayImage,
        threshold: u8,
        side: EyeSide,
        config: &PupilConfig,
    ) -> GazeResult<Self> {
        let mask = denoise(&binarize(eye, threshold), config.kernel_iterations);
        match largest_blob_centroid(&mask) {
            Some(position) => Ok(Self { position }),
            None => {
                debug!(%side, threshold, "no pupil blob after binarization");
                Err(GazeError::LocalizationFailure(side))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
    use imageproc::rect::Rect;

    fn eye_with_disc(w: u32, h: u32, center: (i32, i32), radius: i32) -> GrayImage {
        let mut img = GrayImage::from_pixel(w, h, Luma([210]));
        draw_filled_circle_mut(&mut img, center, radius, Luma([25]));
        img
    }

    #[test]
    fn binarize_marks_strictly_darker_pixels() {
        let img = GrayImage::from_fn(3, 1, |x, _| Luma([[10, 20, 30][x as usize]]));
        let mask = binarize(&img, 20);
        assert_eq!(mask.get_pixel(0, 0)[0], 255);
        assert_eq!(mask.get_pixel(1, 0)[0], 0);
        assert_eq!(mask.get_pixel(2, 0)[0], 0);
    }

    #[test]
    fn centroid_of_symmetric_disc_is_its_center() {
        for (center, radius) in [((20, 12), 5), ((31, 17), 7), ((12, 9), 4)] {
            let img = eye_with_disc(48, 30, center, radius);
            let pupil = Pupil::locate(&img, 60, EyeSide::Left, &PupilConfig::default()).unwrap();
            assert_eq!(pupil.position, PixelCoord::new(center.0 as u32, center.1 as u32));
        }
    }

    #[test]
    fn opening_removes_speckles() {
        let mut img = eye_with_disc(48, 30, (30, 15), 6);
        img.put_pixel(3, 3, Luma([0]));
        img.put_pixel(4, 3, Luma([0]));
        img.put_pixel(44, 26, Luma([0]));

        let mask = denoise(&binarize(&img, 60), 2);
        assert_eq!(mask.get_pixel(3, 3)[0], 0);
        assert_eq!(mask.get_pixel(44, 26)[0], 0);
        assert_eq!(mask.get_pixel(30, 15)[0], 255);
    }

    #[test]
    fn largest_blob_wins_over_smaller_one() {
        let mut img = GrayImage::from_pixel(60, 30, Luma([200]));
        draw_filled_rect_mut(&mut img, Rect::at(2, 2).of_size(8, 8), Luma([10]));
        draw_filled_rect_mut(&mut img, Rect::at(30, 10).of_size(13, 13), Luma([10]));

        let pupil = Pupil::locate(&img, 50, EyeSide::Right, &PupilConfig::default()).unwrap();
        assert_eq!(pupil.position, PixelCoord::new(36, 16));
    }

    #[test]
    fn no_foreground_is_a_localization_failure() {
        let img = GrayImage::from_pixel(40, 20, Luma([180]));
        let err = Pupil::locate(&img, 50, EyeSide::Left, &PupilConfig::default()).unwrap_err();
        assert!(matches!(err, GazeError::LocalizationFailure(EyeSide::Left)));
    }

    #[test]
    fn blob_smaller_than_kernel_is_a_localization_failure() {
        let img = eye_with_disc(40, 20, (20, 10), 1);
        assert!(Pupil::locate(&img, 50, EyeSide::Left, &PupilConfig::default()).is_err());
    }
}
