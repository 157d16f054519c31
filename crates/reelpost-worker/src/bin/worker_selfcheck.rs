use anyhow::Context;
use tracing::info;

use reelpost_media::{check_ffmpeg, check_ffprobe, check_ytdlp};
use reelpost_worker::{init_tracing, JobService, ScratchSpace, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::from_env();
    info!("worker-selfcheck: starting with {:?}", config);

    ScratchSpace::new(&config.scratch_dir)
        .ensure_root()
        .await
        .with_context(|| format!("scratch dir {} not creatable", config.scratch_dir.display()))?;

    for (tool, found) in [
        ("ffmpeg", check_ffmpeg()),
        ("ffprobe", check_ffprobe()),
        ("yt-dlp", check_ytdlp()),
    ] {
        let path = found.with_context(|| format!("{} not available", tool))?;
        info!("{} found at {}", tool, path.display());
    }

    let service = JobService::from_config(config);
    let destinations = service.list_destinations().await?;
    info!("{} destination(s) in directory", destinations.len());

    info!("worker-selfcheck: ok");
    Ok(())
}
