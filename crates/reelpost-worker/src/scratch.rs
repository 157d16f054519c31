//! Per-job scratch storage.
//!
//! Every job gets its own directory under the scratch root, named by its
//! id, so concurrent jobs never share a path. [`JobScratch`] owns the files
//! of one job and deletes them exactly when the job ends, including on
//! panic via `Drop`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use reelpost_media::FETCH_CONTAINER;
use reelpost_models::{Job, JobId, LogoUpload};

use crate::error::WorkerResult;

const LOGO_STEM: &str = "logo";
const SOURCE_STEM: &str = "source";
const COMPOSITED_FILE: &str = "composited.mp4";

/// Root of all job scratch directories.
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    root: PathBuf,
}

impl ScratchSpace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the scratch root if it does not exist.
    pub async fn ensure_root(&self) -> WorkerResult<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Directory owned by a single job.
    pub fn job_dir(&self, id: &JobId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Stem handed to the fetcher; it appends the container extension.
    pub fn source_stem(&self, id: &JobId) -> PathBuf {
        self.job_dir(id).join(SOURCE_STEM)
    }

    pub fn source_path(&self, id: &JobId) -> PathBuf {
        self.job_dir(id)
            .join(format!("{}.{}", SOURCE_STEM, FETCH_CONTAINER))
    }

    pub fn composited_path(&self, id: &JobId) -> PathBuf {
        self.job_dir(id).join(COMPOSITED_FILE)
    }

    /// Write an uploaded logo to `<root>/<job_id>/logo<ext>`.
    pub async fn stage_logo(&self, id: &JobId, logo: &LogoUpload) -> WorkerResult<PathBuf> {
        let dir = self.job_dir(id);
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(format!("{}{}", LOGO_STEM, logo.extension()));
        tokio::fs::write(&path, &logo.bytes).await?;

        debug!(job_id = %id, path = %path.display(), "Staged logo");
        Ok(path)
    }

    /// Remove a job directory that never got a guard, e.g. after a failed
    /// logo write.
    pub async fn discard_job_dir(&self, id: &JobId) -> WorkerResult<()> {
        match tokio::fs::remove_dir_all(self.job_dir(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Guard over every scratch file the job may own.
    pub fn scratch_for(&self, job: &Job) -> JobScratch {
        JobScratch {
            job_id: job.id.clone(),
            dir: self.job_dir(&job.id),
            files: vec![
                job.overlay.logo_path.clone(),
                self.source_path(&job.id),
                self.composited_path(&job.id),
            ],
            released: false,
        }
    }
}

/// Scratch files owned by one job.
///
/// Call [`JobScratch::release`] on the terminal transition. If the guard is
/// dropped first (panic in a stage) it removes the files synchronously.
#[derive(Debug)]
pub struct JobScratch {
    job_id: JobId,
    dir: PathBuf,
    files: Vec<PathBuf>,
    released: bool,
}

impl JobScratch {
    #[cfg(test)]
    fn files(&self) -> &[PathBuf] {
        &self.files
    }

    #[cfg(test)]
    fn is_released(&self) -> bool {
        self.released
    }

    /// Take ownership of an extra file, e.g. a path returned by a collaborator.
    pub fn track(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.files.contains(&path) {
            self.files.push(path);
        }
    }

    /// Delete a single owned file ahead of the final release.
    pub async fn release_file(&self, path: &Path) -> WorkerResult<()> {
        remove_file_if_present(path).await
    }

    /// Delete every owned file and the job directory.
    ///
    /// Missing files are not errors, so calling this again is a no-op.
    pub async fn release(&mut self) -> WorkerResult<()> {
        for file in &self.files {
            remove_file_if_present(file).await?;
        }

        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        if !self.released {
            info!(job_id = %self.job_id, "Released scratch resources");
        }
        self.released = true;
        Ok(())
    }
}

impl Drop for JobScratch {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        warn!(
            job_id = %self.job_id,
            "JobScratch dropped without release() - removing files synchronously"
        );
        for file in &self.files {
            if let Err(e) = std::fs::remove_file(file) {
                if e.kind() != ErrorKind::NotFound {
                    warn!("Failed to remove {}: {}", file.display(), e);
                }
            }
        }
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != ErrorKind::NotFound {
                warn!("Failed to remove {}: {}", self.dir.display(), e);
            }
        }
    }
}

async fn remove_file_if_present(path: &Path) -> WorkerResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
