use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory of frames (png/jpg), processed in file name order
    #[arg(short, long)]
    pub frames: PathBuf,

    /// Tracker configuration (JSON); defaults are used when missing
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Write frames with pupil cross-hairs into this directory
    #[arg(long)]
    pub annotate: Option<PathBuf>,

    /// Store the resulting focus session in this directory
    #[arg(long)]
    pub sessions: Option<PathBuf>,

    /// Write the effective configuration back to --config
    #[arg(long, default_value_t = false)]
    pub save_config: bool,
}
