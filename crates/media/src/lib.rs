//! External tool adapters: `yt-dlp` for probing and downloading, `ffmpeg` for
//! conversion. Both run as child processes so a slow download only holds up
//! its own job.

pub mod error;
pub mod ffmpeg;
pub mod process;
pub mod ytdlp;

pub use {
    error::{Error, Result},
    ffmpeg::Ffmpeg,
    ytdlp::YtDlp,
};
