//! File-backed watermark: the last month already accounted for.
//!
//! The file holds a single `YYYYMM` token. Reads never fail; anything
//! unusable falls back to a computed default. Writes go through a temp file
//! and a rename so a crash mid-write leaves either the old or the new value.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::WatermarkConfig;
use crate::month::{fallback_watermark, YearMonth};

#[derive(Error, Debug)]
pub enum WatermarkError {
    #[error("failed to write watermark {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("another run holds {0}")]
    Locked(PathBuf),
    #[error("failed to take lock {path}: {source}")]
    Lock { path: PathBuf, source: io::Error },
}

/// Why the stored value was not used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    Missing,
    Unreadable(String),
    Empty,
    Corrupt(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatermarkSource {
    Stored,
    Fallback(FallbackReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    pub value: YearMonth,
    pub source: WatermarkSource,
}

#[derive(Debug, Clone)]
pub struct WatermarkStore {
    path: PathBuf,
    fallback_months: u32,
}

impl WatermarkStore {
    pub fn new(path: impl Into<PathBuf>, fallback_months: u32) -> Self {
        Self {
            path: path.into(),
            fallback_months,
        }
    }

    pub fn from_config(config: &WatermarkConfig) -> Self {
        Self::new(config.path.clone(), config.fallback_months)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored watermark, or the fallback relative to `current`.
    pub fn load(&self, current: YearMonth) -> Watermark {
        let reason = match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                if token.is_empty() {
                    FallbackReason::Empty
                } else {
                    match token.parse::<YearMonth>() {
                        Ok(value) => {
                            debug!(path = %self.path.display(), watermark = %value, "loaded watermark");
                            return Watermark {
                                value,
                                source: WatermarkSource::Stored,
                            };
                        }
                        Err(e) => FallbackReason::Corrupt(e.to_string()),
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => FallbackReason::Missing,
            Err(e) => FallbackReason::Unreadable(e.to_string()),
        };

        let value = fallback_watermark(current, self.fallback_months);
        match &reason {
            FallbackReason::Missing => info!(
                path = %self.path.display(),
                fallback = %value,
                "no watermark stored yet, using fallback"
            ),
            other => warn!(
                path = %self.path.display(),
                reason = ?other,
                fallback = %value,
                "stored watermark unusable, using fallback"
            ),
        }
        Watermark {
            value,
            source: WatermarkSource::Fallback(reason),
        }
    }

    /// Atomically replace the stored watermark.
    pub fn save(&self, value: YearMonth) -> Result<(), WatermarkError> {
        write_atomic(&self.path, value.to_string().as_bytes()).map_err(|source| {
            WatermarkError::Write {
                path: self.path.clone(),
                source,
            }
        })?;
        info!(path = %self.path.display(), watermark = %value, "saved watermark");
        Ok(())
    }

    /// Take the single-run lock next to the watermark file.
    ///
    /// An OS advisory lock on `<path>.lock`, held by the open file for as
    /// long as the returned guard lives. The kernel drops it when the process
    /// exits, so a killed run never leaves the next one locked out.
    /// Fails with `Locked` if another run holds it; does not wait.
    pub fn lock(&self) -> Result<RunLock, WatermarkError> {
        let path = lock_path(&self.path);
        if let Some(parent) = non_empty_parent(&path) {
            fs::create_dir_all(parent).map_err(|source| WatermarkError::Lock {
                path: path.clone(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|source| WatermarkError::Lock {
                path: path.clone(),
                source,
            })?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(lock = %path.display(), "run lock acquired");
                Ok(RunLock { file, path })
            }
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                Err(WatermarkError::Locked(path))
            }
            Err(source) => Err(WatermarkError::Lock { path, source }),
        }
    }
}

/// Held for the duration of a run; the lock goes with the file handle.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!(path = %self.path.display(), error = %e, "failed to release run lock");
        }
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "watermark".into());
    name.push(".lock");
    path.with_file_name(name)
}

fn non_empty_parent(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = non_empty_parent(path);
    if let Some(dir) = parent {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_file_name(format!(
        ".{}.tmp.{}",
        path.file_name().and_then(|s| s.to_str()).unwrap_or("watermark"),
        std::process::id()
    ));
    {
        let mut f = File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    if let Some(dir) = parent {
        if let Ok(d) = File::open(dir) {
            let _ = d.sync_all();
        }
    }
    Ok(())
}
