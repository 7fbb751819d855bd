//! Archive sources: where candidate archives come from.
//!
//! A remote object store implements [`ArchiveSource`] behind its own
//! authentication; this crate ships the filesystem sources used for local
//! spools and direct file input.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::IngestResult;

/// One candidate archive: its listed name and a reader over the ciphertext.
/// Reading the stream is what downloads the archive; sources must not fetch
/// payload bytes before the reader is consumed.
pub struct ArchiveEntry {
    /// Name as listed by the source, possibly carrying a folder prefix.
    pub name: String,
    /// Ciphertext stream.
    pub reader: Box<dyn Read + Send>,
}

impl std::fmt::Debug for ArchiveEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveEntry")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Yields candidate archives in store order.
pub trait ArchiveSource {
    /// The next candidate, or `None` when the listing is exhausted.
    fn next_entry(&mut self) -> IngestResult<Option<ArchiveEntry>>;
}

/// Lists regular files in a spool directory, sorted by name.
pub struct DirSource {
    paths: std::vec::IntoIter<PathBuf>,
}

impl DirSource {
    /// Lists `dir` eagerly; candidate selection happens downstream.
    pub fn new(dir: &Path) -> IngestResult<Self> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        paths.sort();
        debug!(dir = %dir.display(), candidates = paths.len(), "listed spool directory");
        Ok(Self {
            paths: paths.into_iter(),
        })
    }
}

impl ArchiveSource for DirSource {
    fn next_entry(&mut self) -> IngestResult<Option<ArchiveEntry>> {
        let Some(path) = self.paths.next() else {
            return Ok(None);
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let reader = File::open(&path)?;
        Ok(Some(ArchiveEntry {
            name,
            reader: Box::new(reader),
        }))
    }
}

/// Yields the single archive given directly on the command line.
pub struct FileSource {
    path: Option<PathBuf>,
}

impl FileSource {
    /// Wraps one archive path.
    pub fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }
}

impl ArchiveSource for FileSource {
    fn next_entry(&mut self) -> IngestResult<Option<ArchiveEntry>> {
        let Some(path) = self.path.take() else {
            return Ok(None);
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let reader = File::open(&path)?;
        Ok(Some(ArchiveEntry {
            name,
            reader: Box::new(reader),
        }))
    }
}
