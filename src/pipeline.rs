use crate::types::GazeSnapshot;
use anyhow::Result;
use image::{ImageBuffer, Rgb};

/// A per-frame processing stage fed by a capture loop.
///
/// `Ok(None)` means the frame produced nothing usable; it is not an error.
pub trait Pipeline {
    fn name(&self) -> String;
    fn process(&mut self, frame: &ImageBuffer<Rgb<u8>, Vec<u8>>) -> Result<Option<GazeSnapshot>>;
}
