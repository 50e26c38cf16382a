//! Failure-time page captures.
//!
//! On a failed or undeterminable check we keep a screenshot and the full
//! markup, named by UTC timestamp and item identifier. The directory is
//! capped; oldest files go first.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// 20 screenshots plus 20 markup dumps.
pub const MAX_DEBUG_FILES: usize = 40;

#[derive(Debug, Error)]
pub enum DebugError {
    #[error("debug file io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("page capture failed: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
}

#[derive(Debug, Clone)]
pub struct DebugCapture {
    dir: PathBuf,
}

impl DebugCapture {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Best-effort capture; failures are logged, never propagated, so a
    /// broken capture can't make a bad check worse.
    pub async fn capture(&self, page: &Page, id: &str, error: &str) {
        if let Err(err) = self.capture_inner(page, id, error).await {
            warn!(error = %err, id, "debug capture failed");
        }
    }

    async fn capture_inner(&self, page: &Page, id: &str, error: &str) -> Result<(), DebugError> {
        fs::create_dir_all(&self.dir)?;

        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let prefix = format!("{stamp}_{id}");

        let screenshot = page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .full_page(false)
                    .build(),
            )
            .await?;
        fs::write(self.dir.join(format!("{prefix}.png")), screenshot)?;

        let html = page.content().await?;
        fs::write(self.dir.join(format!("{prefix}.html")), html)?;

        info!(id, error, prefix = %prefix, "captured debug artifacts");
        prune_oldest(&self.dir, MAX_DEBUG_FILES);
        Ok(())
    }
}

/// Keeps at most `cap` files in `dir`, deleting the least recently modified.
fn prune_oldest(dir: &Path, cap: usize) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(error = %err, "could not scan debug directory for pruning");
            return;
        }
    };

    let mut files: Vec<(PathBuf, SystemTime)> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .map(|entry| {
            let modified = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (entry.path(), modified)
        })
        .collect();

    if files.len() <= cap {
        return;
    }

    files.sort_by_key(|(_, modified)| *modified);
    let excess = files.len() - cap;
    for (path, _) in files.into_iter().take(excess) {
        if let Err(err) = fs::remove_file(&path) {
            debug!(error = %err, path = %path.display(), "failed to prune debug file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prunes_down_to_the_cap() {
        let dir = tempfile::tempdir().expect("tempdir");
        for i in 0..50 {
            fs::write(dir.path().join(format!("capture_{i:02}.html")), "x").expect("write");
        }

        prune_oldest(dir.path(), MAX_DEBUG_FILES);

        let remaining = fs::read_dir(dir.path()).expect("read dir").count();
        assert_eq!(remaining, MAX_DEBUG_FILES);
    }

    #[test]
    fn under_the_cap_nothing_is_deleted() {
        let dir = tempfile::tempdir().expect("tempdir");
        for i in 0..5 {
            fs::write(dir.path().join(format!("capture_{i}.png")), "x").expect("write");
        }

        prune_oldest(dir.path(), MAX_DEBUG_FILES);

        assert_eq!(fs::read_dir(dir.path()).expect("read dir").count(), 5);
    }

    #[test]
    fn missing_directory_is_tolerated() {
        prune_oldest(Path::new("/definitely/not/a/real/dir"), MAX_DEBUG_FILES);
    }
}
