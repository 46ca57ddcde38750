use anyhow::{Context, Result};
use chrono::{Datelike, Duration, Local, NaiveDate, TimeZone};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Holds the smallest id never handed out, so deleted ids are not reused.
const NEXT_ID_FILE: &str = "next_id";

/// A finished focus session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: u64,
    pub start_time: i64,
    pub end_time: i64,
    pub focus_percentage: f32,
    #[serde(default, deserialize_with = "lenient_timeline")]
    pub timeline: Vec<bool>,
}

impl SessionRecord {
    pub fn duration_secs(&self) -> i64 {
        self.end_time - self.start_time
    }
}

/// A corrupt timeline costs the timeline, not the session.
///
/// Accepts the array itself or the array encoded as a JSON string.
fn lenient_timeline<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<bool>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let parsed: serde_json::Result<Vec<bool>> = match value {
        Value::String(s) => serde_json::from_str(&s),
        other => serde_json::from_value(other),
    };
    Ok(parsed.unwrap_or_else(|e| {
        warn!("Discarding unreadable session timeline: {}", e);
        Vec::new()
    }))
}

fn session_id_from_name(name: &str) -> Option<u64> {
    name.strip_prefix("session_")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

/// Stores one `session_<id>.json` file per session in `data_dir`.
pub struct SessionStore {
    data_dir: PathBuf,
}

impl SessionStore {
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        if !data_dir.exists() {
            fs::create_dir_all(&data_dir)
                .with_context(|| format!("creating session dir {}", data_dir.display()))?;
        }
        Ok(Self { data_dir })
    }

    fn path_for(&self, session_id: u64) -> PathBuf {
        self.data_dir.join(format!("session_{}.json", session_id))
    }

    /// Every `session_<id>.json` in the directory, readable or not.
    fn session_files(&self) -> Result<Vec<(u64, PathBuf)>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.data_dir)? {
            let path = entry?.path();
            let id = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(session_id_from_name);
            if let Some(id) = id {
                files.push((id, path));
            }
        }
        Ok(files)
    }

    fn read_next_id(&self) -> Result<u64> {
        let path = self.data_dir.join(NEXT_ID_FILE);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(text.trim().parse().unwrap_or_else(|e| {
                warn!("Ignoring corrupt {}: {}", path.display(), e);
                1
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(1),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    /// Writes `record` under a fresh id and returns that id.
    ///
    /// Ids only grow: the next one is past both the stored high-water mark
    /// and every session file name. Existing files are never overwritten.
    pub fn save(&self, mut record: SessionRecord) -> Result<u64> {
        let past_files = self
            .session_files()?
            .iter()
            .map(|(id, _)| id + 1)
            .max()
            .unwrap_or(1);
        let mut id = self.read_next_id()?.max(past_files);

        let file = loop {
            let path = self.path_for(id);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => break file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => id += 1,
                Err(e) => return Err(e).with_context(|| format!("creating {}", path.display())),
            }
        };
        record.session_id = id;
        serde_json::to_writer_pretty(file, &record)?;

        let marker = self.data_dir.join(NEXT_ID_FILE);
        fs::write(&marker, (id + 1).to_string())
            .with_context(|| format!("writing {}", marker.display()))?;
        info!(
            session_id = id,
            focus = record.focus_percentage,
            "saved focus session"
        );
        Ok(id)
    }

    /// All readable sessions, newest start first.
    pub fn load_all(&self) -> Result<Vec<SessionRecord>> {
        let mut sessions = Vec::new();
        for (_, path) in self.session_files()? {
            match read_record(&path) {
                Ok(record) => sessions.push(record),
                Err(e) => warn!("Skipping unreadable session {}: {:#}", path.display(), e),
            }
        }
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(sessions)
    }

    pub fn get(&self, session_id: u64) -> Result<Option<SessionRecord>> {
        let path = self.path_for(session_id);
        if !path.exists() {
            return Ok(None);
        }
        read_record(&path).map(Some)
    }

    /// Removes a session. Unknown ids are not an error.
    pub fn delete(&self, session_id: u64) -> Result<()> {
        let path = self.path_for(session_id);
        if path.exists() {
            fs::remove_file(&path).with_context(|| format!("deleting {}", path.display()))?;
        }
        Ok(())
    }

    /// Seconds of tracked sessions per day, Monday first, for the week starting at `week_start`.
    pub fn weekly_stats(&self, week_start: i64) -> Result<[i64; 7]> {
        Ok(weekly_totals(&self.load_all()?, week_start))
    }
}

fn read_record(path: &Path) -> Result<SessionRecord> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(serde_json::from_reader(file)?)
}

fn local_date(timestamp: i64) -> Option<NaiveDate> {
    Local
        .timestamp_opt(timestamp, 0)
        .single()
        .map(|t| t.date_naive())
}

/// Buckets session durations by the local calendar day of their start time.
pub fn weekly_totals(sessions: &[SessionRecord], week_start: i64) -> [i64; 7] {
    totals_by_day(sessions, week_start, local_date)
}

/// Days are calendar dates from `date_of`, so a 23 or 25 hour day still maps to one bucket.
fn totals_by_day(
    sessions: &[SessionRecord],
    week_start: i64,
    date_of: impl Fn(i64) -> Option<NaiveDate>,
) -> [i64; 7] {
    let mut days = [0i64; 7];
    let Some(first_day) = date_of(week_start) else {
        return days;
    };
    for s in sessions.iter().filter(|s| s.start_time >= week_start) {
        let Some(day) = date_of(s.start_time) else { continue };
        let offset = (day - first_day).num_days();
        if (0..7).contains(&offset) {
            days[offset as usize] += s.duration_secs();
        }
    }
    days
}

/// Local midnight of the Monday on or before `timestamp`.
pub fn week_start_of(timestamp: i64) -> Option<i64> {
    let now = Local.timestamp_opt(timestamp, 0).single()?;
    let monday = now.date_naive() - Duration::days(i64::from(now.weekday().num_days_from_monday()));
    let midnight = monday.and_hms_opt(0, 0, 0)?;
    Some(midnight.and_local_timezone(Local).earliest()?.timestamp())
}
