use serde::{Deserialize, Serialize};

/// A landmark position in frame pixel coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    pub fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Integer pixel position, either relative to an eye region or in frame space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelCoord {
    pub x: u32,
    pub y: u32,
}

impl PixelCoord {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    pub fn offset(&self, origin: PixelCoord) -> PixelCoord {
        PixelCoord::new(origin.x + self.x, origin.y + self.y)
    }
}

/// Facial landmarks for one face in one frame (68-point layout).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Landmarks {
    pub points: Vec<Point>,
}

impl Landmarks {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EyeSide {
    Left,
    Right,
}

impl EyeSide {
    pub const BOTH: [EyeSide; 2] = [EyeSide::Left, EyeSide::Right];
}

impl std::fmt::Display for EyeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EyeSide::Left => write!(f, "left"),
            EyeSide::Right => write!(f, "right"),
        }
    }
}

/// Coarse horizontal gaze classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GazeDirection {
    Left,
    Right,
    Center,
}

/// Everything derived from one successfully processed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GazeSnapshot {
    /// Left pupil in frame coordinates.
    pub left_pupil: PixelCoord,
    /// Right pupil in frame coordinates.
    pub right_pupil: PixelCoord,
    pub horizontal_ratio: f32,
    pub vertical_ratio: f32,
    pub blink_ratio: f32,
    pub direction: GazeDirection,
    pub blinking: bool,
}
