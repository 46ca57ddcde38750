use clap::Parser;

mod args;

use anyhow::{Context, Result};
use args::Args;
use chrono::Utc;
use rusty_gaze::focus::{EyeBoundary, FocusSession};
use rusty_gaze::pipeline::Pipeline;
use rusty_gaze::sessions::{week_start_of, SessionStore};
use rusty_gaze::{EyeSide, GazeTracker, Landmarks, ScriptedDetector, TrackerConfig};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rusty_gaze=info"));
    fmt().with_env_filter(filter).init();
}

fn list_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut frames = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading frame dir {}", dir.display()))? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
            .unwrap_or(false);
        if is_image {
            frames.push(path);
        }
    }
    frames.sort();
    Ok(frames)
}

/// `frame_001.png` -> `frame_001.landmarks.json`. A missing sidecar means no face.
fn load_landmarks(frame: &Path) -> Result<Option<Landmarks>> {
    let sidecar = frame.with_extension("landmarks.json");
    if !sidecar.exists() {
        return Ok(None);
    }
    let file = File::open(&sidecar).with_context(|| format!("opening {}", sidecar.display()))?;
    let landmarks = serde_json::from_reader(file)
        .with_context(|| format!("parsing landmarks {}", sidecar.display()))?;
    Ok(Some(landmarks))
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let config = TrackerConfig::load(&args.config)?;
    if args.save_config {
        config.save(&args.config)?;
        info!("Wrote configuration to {}", args.config.display());
    }

    let frames = list_frames(&args.frames)?;
    if frames.is_empty() {
        warn!("No frames found in {}", args.frames.display());
        return Ok(());
    }
    if let Some(dir) = &args.annotate {
        fs::create_dir_all(dir)?;
    }

    let mut tracker = GazeTracker::new(ScriptedDetector::new(), config.clone());
    info!("Active Pipeline: {}", tracker.name());

    let mut boundary = EyeBoundary::new(config.focus.boundary_tolerance);
    let mut boundary_samples = 0usize;
    let mut session = FocusSession::start(Utc::now().timestamp());

    for path in &frames {
        let frame = image::open(path)
            .with_context(|| format!("decoding {}", path.display()))?
            .to_rgb8();
        tracker.detector_mut().push(load_landmarks(path)?);

        match tracker.process(&frame)? {
            Some(s) => info!(
                frame = %path.display(),
                horizontal = s.horizontal_ratio,
                vertical = s.vertical_ratio,
                direction = ?s.direction,
                blinking = s.blinking,
                "gaze"
            ),
            None => info!(
                frame = %path.display(),
                reason = %tracker.failure().map(|e| e.to_string()).unwrap_or_default(),
                "gaze unavailable"
            ),
        }

        // Learn where the pupil sits while the user looks at the screen, then score focus.
        let left = tracker.pupil_left_coords();
        if boundary_samples < config.focus.calibration_frames {
            if left.is_some() {
                boundary.adjust(left);
                boundary_samples += 1;
            }
        } else {
            session.record(!boundary.is_outside(left));
        }

        if let Some(dir) = &args.annotate {
            if let (Some(img), Some(name)) = (tracker.annotated_frame(), path.file_name()) {
                img.save(dir.join(name))
                    .with_context(|| format!("writing annotated {}", path.display()))?;
            }
        }
    }

    let calibration = tracker.calibration();
    info!(
        complete = calibration.is_complete(),
        left = ?calibration.threshold(EyeSide::Left).ok(),
        right = ?calibration.threshold(EyeSide::Right).ok(),
        "calibration summary"
    );
    info!(
        frames = session.timeline().len(),
        focus = session.focus_percentage(),
        "focus summary"
    );

    if let Some(dir) = &args.sessions {
        let store = SessionStore::open(dir)?;
        let now = Utc::now().timestamp();
        store.save(session.finish(now))?;
        if let Some(week_start) = week_start_of(now) {
            let stats = store.weekly_stats(week_start)?;
            info!(?stats, "tracked seconds per day this week");
        }
    }

    Ok(())
}
