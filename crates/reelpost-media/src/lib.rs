#![deny(unreachable_patterns)]
//! yt-dlp and FFmpeg CLI adapters.
//!
//! This crate provides:
//! - The `Fetcher` capability and its yt-dlp implementation
//! - The `Compositor` capability and its FFmpeg implementation
//! - Type-safe FFmpeg command building with timeouts
//! - FFprobe stream inspection

pub mod command;
pub mod compose;
pub mod download;
pub mod error;
pub mod overlay;
pub mod probe;

pub use command::{check_ffmpeg, check_ffprobe, check_ytdlp, FfmpegCommand, FfmpegRunner};
pub use compose::{Compositor, FfmpegCompositor};
pub use download::{FormatStrategy, Fetcher, YtDlpFetcher, FETCH_CONTAINER};
pub use error::{MediaError, MediaResult};
pub use overlay::{build_overlay_filter, logo_height_for, OverlayStyle};
pub use probe::{probe_video, VideoInfo};
