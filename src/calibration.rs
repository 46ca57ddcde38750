//! Per-eye binarization threshold calibration.
//!
//! Every processed frame contributes one sample per eye: the candidate
//! threshold whose dark-pixel share is closest to the expected iris share.
//! The threshold handed to pupil localization is the truncated mean of the
//! samples collected so far.

use crate::config::CalibrationConfig;
use crate::error::{GazeError, GazeResult};
use crate::pupil::binarize;
use crate::types::EyeSide;
use image::{imageops, GrayImage};
use std::collections::VecDeque;
use tracing::{debug, info};

/// Share of pixels darker than `threshold`, ignoring `border` pixels on each side.
///
/// Images too small to keep an interior after removing the border are measured whole.
pub fn dark_pixel_fraction(eye: &GrayImage, threshold: u8, border: u32) -> f32 {
    let (w, h) = eye.dimensions();
    let inner = if w > 2 * border && h > 2 * border {
        imageops::crop_imm(eye, border, border, w - 2 * border, h - 2 * border).to_image()
    } else {
        eye.clone()
    };

    let total = inner.width() as usize * inner.height() as usize;
    if total == 0 {
        return 0.0;
    }
    let dark = binarize(&inner, threshold)
        .pixels()
        .filter(|p| p[0] != 0)
        .count();
    dark as f32 / total as f32
}

/// Candidate whose dark fraction lands closest to the target iris ratio.
///
/// Candidates are scanned in ascending order and only a strictly better
/// fit replaces the current pick, so ties go to the smaller threshold.
pub fn find_best_threshold(eye: &GrayImage, config: &CalibrationConfig) -> u8 {
    let mut best = config.candidate_min;
    let mut best_error = f32::INFINITY;
    for candidate in config.candidates() {
        let fraction = dark_pixel_fraction(eye, candidate, config.border_margin);
        let error = (fraction - config.target_iris_ratio).abs();
        if error < best_error {
            best = candidate;
            best_error = error;
        }
    }
    best
}

#[derive(Debug, Clone, Default)]
struct ThresholdHistory {
    samples: VecDeque<u8>,
    sum: u64,
}

impl ThresholdHistory {
    fn push(&mut self, threshold: u8, window: Option<usize>) {
        self.samples.push_back(threshold);
        self.sum += u64::from(threshold);
        if let Some(window) = window {
            while self.samples.len() > window {
                if let Some(old) = self.samples.pop_front() {
                    self.sum -= u64::from(old);
                }
            }
        }
    }

    fn mean(&self) -> Option<u8> {
        if self.samples.is_empty() {
            return None;
        }
        Some((self.sum / self.samples.len() as u64) as u8)
    }
}

/// Calibration state for both eyes.
#[derive(Debug, Clone)]
pub struct Calibration {
    config: CalibrationConfig,
    left: ThresholdHistory,
    right: ThresholdHistory,
    total_left: usize,
    total_right: usize,
    complete: bool,
}

impl Calibration {
    pub fn new(config: CalibrationConfig) -> Self {
        Self {
            config,
            left: ThresholdHistory::default(),
            right: ThresholdHistory::default(),
            total_left: 0,
            total_right: 0,
            complete: false,
        }
    }

    /// True once both sides reached `min_samples`. Stays true afterwards.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Finds this frame's best threshold for `side` and records it.
    pub fn evaluate(&mut self, eye: &GrayImage, side: EyeSide) -> u8 {
        let best = find_best_threshold(eye, &self.config);
        let window = self.config.history_window;
        match side {
            EyeSide::Left => {
                self.left.push(best, window);
                self.total_left += 1;
            }
            EyeSide::Right => {
                self.right.push(best, window);
                self.total_right += 1;
            }
        }
        debug!(%side, threshold = best, "calibration sample");

        if !self.complete
            && self.total_left >= self.config.min_samples
            && self.total_right >= self.config.min_samples
        {
            self.complete = true;
            info!(
                left = self.left.mean().unwrap_or_default(),
                right = self.right.mean().unwrap_or_default(),
                "pupil threshold calibration complete"
            );
        }
        best
    }

    /// Truncated mean of the recorded samples for `side`.
    pub fn threshold(&self, side: EyeSide) -> GazeResult<u8> {
        self.history(side)
            .mean()
            .ok_or(GazeError::EmptyCalibrationHistory(side))
    }

    /// Samples currently contributing to the mean for `side`.
    pub fn samples(&self, side: EyeSide) -> usize {
        self.history(side).samples.len()
    }

    fn history(&self, side: EyeSide) -> &ThresholdHistory {
        match side {
            EyeSide::Left => &self.left,
            EyeSide::Right => &self.right,
        }
    }
}
