//! Logo and caption compositing with FFmpeg.

use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use reelpost_models::EncodingConfig;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::overlay::{build_overlay_filter, OverlayStyle, OUTPUT_LABEL};
use crate::probe::probe_video;

/// Overlays a logo and caption onto a video, producing a new encoded file.
#[async_trait]
pub trait Compositor: Send + Sync {
    /// Composite `source` + `logo` + `caption` into `output` and return the
    /// output path. Partial output is removed on failure.
    async fn compose(
        &self,
        source: &Path,
        logo: &Path,
        caption: &str,
        output: &Path,
    ) -> MediaResult<PathBuf>;
}

/// `Compositor` backed by the ffmpeg CLI.
#[derive(Debug, Clone, Default)]
pub struct FfmpegCompositor {
    style: OverlayStyle,
    encoding: EncodingConfig,
    runner: FfmpegRunner,
}

impl FfmpegCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_style(mut self, style: OverlayStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_encoding(mut self, encoding: EncodingConfig) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.runner = FfmpegRunner::new().with_timeout(timeout);
        self
    }

    fn build_command(&self, source: &Path, logo: &Path, filter: String, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(output)
            .input(source)
            .input_with_args(["-loop", "1"], logo)
            .filter_complex(filter)
            .map(format!("[{}]", OUTPUT_LABEL))
            .map("0:a?")
            .video_codec(&self.encoding.codec)
            .preset(&self.encoding.preset)
            .crf(self.encoding.crf)
            .audio_codec(&self.encoding.audio_codec)
            .audio_bitrate(&self.encoding.audio_bitrate)
            .faststart()
    }
}

#[async_trait]
impl Compositor for FfmpegCompositor {
    async fn compose(
        &self,
        source: &Path,
        logo: &Path,
        caption: &str,
        output: &Path,
    ) -> MediaResult<PathBuf> {
        if !source.exists() {
            return Err(MediaError::FileNotFound(source.to_path_buf()));
        }
        validate_logo(logo).await?;

        let info = probe_video(source).await?;
        debug!(
            width = info.width,
            height = info.height,
            duration = info.duration,
            "Probed source video"
        );

        let work_dir = output.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(work_dir).await?;

        // Removed when dropped, on every exit path.
        let mut caption_file = tempfile::Builder::new()
            .prefix("caption")
            .suffix(".txt")
            .tempfile_in(work_dir)?;
        caption_file.write_all(caption.as_bytes())?;
        caption_file.flush()?;

        let filter = build_overlay_filter(&self.style, info.height, caption_file.path());
        let cmd = self.build_command(source, logo, filter, output);

        info!(
            source = %source.display(),
            logo = %logo.display(),
            output = %output.display(),
            "Compositing logo and caption overlay"
        );

        if let Err(e) = self.runner.run(&cmd).await {
            remove_partial_output(output).await;
            return Err(e);
        }

        if !output.exists() {
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg reported success but produced no output",
                None,
                None,
            ));
        }

        info!(output = %output.display(), "Composited video written");
        Ok(output.to_path_buf())
    }
}

/// Known image signatures accepted as logos.
const IMAGE_SIGNATURES: &[&[u8]] = &[
    b"\x89PNG\r\n\x1a\n",
    b"\xff\xd8\xff",
    b"GIF87a",
    b"GIF89a",
    b"BM",
];

/// Check the logo exists and looks like an image.
async fn validate_logo(logo: &Path) -> MediaResult<()> {
    let mut file = tokio::fs::File::open(logo)
        .await
        .map_err(|_| MediaError::invalid_image(format!("Logo not found: {}", logo.display())))?;

    let mut header = [0u8; 12];
    let read = file.read(&mut header).await?;
    let header = &header[..read];

    let is_webp = header.len() >= 12 && &header[..4] == b"RIFF" && &header[8..12] == b"WEBP";
    if is_webp || IMAGE_SIGNATURES.iter().any(|sig| header.starts_with(sig)) {
        Ok(())
    } else {
        Err(MediaError::invalid_image(format!(
            "Unrecognized logo image format: {}",
            logo.display()
        )))
    }
}

async fn remove_partial_output(output: &Path) {
    match tokio::fs::remove_file(output).await {
        Ok(()) => debug!(output = %output.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(output = %output.display(), "Failed to remove partial output: {}", e),
    }
}
