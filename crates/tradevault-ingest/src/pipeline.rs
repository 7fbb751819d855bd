//! Archive orchestration: drive each candidate through decrypt → extract →
//! classify → persist, with pre-filtering and scoped temporary artifacts.
//!
//! One archive's failure never aborts the batch; the failed archive's
//! decrypted artifact is retained on disk for inspection.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use regex::Regex;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::classify::ClassifiedBuffers;
use crate::container::extract_log_member;
use crate::decrypt;
use crate::error::{IngestError, IngestResult};
use crate::sink::PartitionStore;
use crate::source::{ArchiveEntry, ArchiveSource};

/// Name marker excluding maintenance archives from ingestion.
pub const DEFAULT_EXCLUSION: &str = "housekeeping";
/// Default archive selection pattern, matched at the start of the name.
pub const DEFAULT_PATTERN: &str = r".*\.zst";
/// Subdirectory of the destination holding decrypted interim artifacts.
const ARCHIVES_DIR: &str = "archives";

/// Settings for one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Password for archive decryption.
    pub password: String,
    /// Regular expression an archive name must match, anchored at the start.
    pub pattern: String,
    /// Archives whose name contains this marker are never downloaded.
    pub exclusion: String,
    /// Destination directory for partitions and interim artifacts.
    pub destination: PathBuf,
    /// Keep decrypted artifacts after successful extraction.
    pub keep: bool,
}

impl IngestConfig {
    /// Config with default selection settings for the given password and
    /// destination.
    pub fn new(password: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            password: password.into(),
            pattern: DEFAULT_PATTERN.to_string(),
            exclusion: DEFAULT_EXCLUSION.to_string(),
            destination: destination.into(),
            keep: false,
        }
    }
}

/// Why an archive was skipped without being downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Name contains the exclusion marker.
    Excluded,
    /// Name does not match the selection pattern.
    PatternMismatch,
    /// A partition already exists for the archive's stem.
    AlreadyProcessed,
}

/// Terminal state of one archive's run through the pipeline.
#[derive(Debug)]
pub enum ArchiveOutcome {
    /// Pre-filtered before any payload bytes were read.
    Skipped(SkipReason),
    /// Fully processed; lists the written partition paths.
    Done(Vec<PathBuf>),
    /// Failed after download; the decrypted artifact is retained when one
    /// was produced.
    Failed(IngestError),
}

/// Counters for a whole ingestion run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestStats {
    /// Archives fully processed.
    pub processed: u64,
    /// Archives skipped by the pre-filter.
    pub skipped: u64,
    /// Archives that failed after download.
    pub failed: u64,
    /// Partitions written across all archives.
    pub partitions: u64,
}

/// Drives candidate archives through the ingestion pipeline.
pub struct ArchiveOrchestrator {
    config: IngestConfig,
    pattern: Regex,
    store: PartitionStore,
}

impl ArchiveOrchestrator {
    /// Builds an orchestrator, compiling the selection pattern.
    pub fn new(config: IngestConfig) -> IngestResult<Self> {
        // selection matches at the start of the name, not anywhere inside it
        let pattern = Regex::new(&format!("^(?:{})", config.pattern))?;
        let store = PartitionStore::new(config.destination.clone());
        Ok(Self {
            config,
            pattern,
            store,
        })
    }

    /// The partition store this orchestrator writes into.
    pub fn store(&self) -> &PartitionStore {
        &self.store
    }

    /// Pre-filter: decides whether an archive should be downloaded at all.
    pub fn check(&self, name: &str) -> Option<SkipReason> {
        if name.contains(&self.config.exclusion) {
            return Some(SkipReason::Excluded);
        }
        if !self.pattern.is_match(name) {
            return Some(SkipReason::PatternMismatch);
        }
        if let Some(existing) = self.store.existing_partition(archive_stem(name)) {
            info!(archive = name, existing = %existing.display(), "already processed");
            return Some(SkipReason::AlreadyProcessed);
        }
        None
    }

    /// Runs one candidate through the pipeline.
    pub fn process(&self, mut entry: ArchiveEntry) -> ArchiveOutcome {
        if let Some(reason) = self.check(&entry.name) {
            debug!(archive = %entry.name, ?reason, "skipping archive");
            return ArchiveOutcome::Skipped(reason);
        }
        info!(archive = %entry.name, "processing archive");
        match self.ingest(&mut entry) {
            Ok(paths) => {
                info!(archive = %entry.name, partitions = paths.len(), "archive processed");
                ArchiveOutcome::Done(paths)
            }
            Err(err) => {
                warn!(archive = %entry.name, error = %err, "archive failed");
                ArchiveOutcome::Failed(err)
            }
        }
    }

    /// Processes every candidate from a source. Individual failures never
    /// abort the batch; only listing errors propagate.
    pub fn run(&self, source: &mut dyn ArchiveSource) -> IngestResult<IngestStats> {
        let mut stats = IngestStats::default();
        while let Some(entry) = source.next_entry()? {
            match self.process(entry) {
                ArchiveOutcome::Skipped(_) => stats.skipped += 1,
                ArchiveOutcome::Done(paths) => {
                    stats.processed += 1;
                    stats.partitions += paths.len() as u64;
                }
                ArchiveOutcome::Failed(_) => stats.failed += 1,
            }
        }
        info!(
            processed = stats.processed,
            skipped = stats.skipped,
            failed = stats.failed,
            partitions = stats.partitions,
            "ingestion run complete"
        );
        Ok(stats)
    }

    fn ingest(&self, entry: &mut ArchiveEntry) -> IngestResult<Vec<PathBuf>> {
        // spool the ciphertext to a scoped temporary file, then decrypt the
        // whole payload in memory
        let mut spool = NamedTempFile::new_in(&self.config.destination)?;
        std::io::copy(&mut entry.reader, &mut spool)?;
        spool.flush()?;
        debug!(archive = %entry.name, spool = %spool.path().display(), "archive downloaded");

        let mut ciphertext = Vec::new();
        spool.reopen()?.read_to_end(&mut ciphertext)?;
        let plaintext = decrypt::decrypt(&ciphertext, &self.config.password)?;
        drop(spool);

        let archives_dir = self.config.destination.join(ARCHIVES_DIR);
        fs::create_dir_all(&archives_dir)?;
        let local_name = entry.name.rsplit('/').next().unwrap_or(&entry.name);
        let mut decrypted = tempfile::Builder::new()
            .prefix(&format!("{local_name}."))
            .tempfile_in(&archives_dir)?;
        decrypted.write_all(&plaintext)?;
        decrypted.flush()?;
        drop(plaintext);

        match self.extract_and_write(decrypted.path()) {
            Ok(paths) => {
                if self.config.keep {
                    self.retain(decrypted, &entry.name);
                }
                Ok(paths)
            }
            Err(err) => {
                self.retain(decrypted, &entry.name);
                Err(err)
            }
        }
    }

    fn extract_and_write(&self, decrypted: &Path) -> IngestResult<Vec<PathBuf>> {
        let file = fs::File::open(decrypted)?;
        let member = extract_log_member(file)?;

        let mut buffers = ClassifiedBuffers::new();
        for line in member.lines() {
            buffers.push(line);
        }
        for category in buffers.empty_categories() {
            debug!(
                category = category.dir_name(),
                stem = %member.stem,
                "no data for category"
            );
        }

        let mut written = Vec::new();
        for (category, buffer) in buffers.non_empty() {
            written.push(self.store.write(category, &member.stem, buffer)?);
        }
        Ok(written)
    }

    fn retain(&self, decrypted: NamedTempFile, name: &str) {
        match decrypted.keep() {
            Ok((_, path)) => info!(
                archive = name,
                path = %path.display(),
                "retained decrypted artifact for inspection"
            ),
            Err(err) => warn!(
                archive = name,
                error = %err,
                "could not retain decrypted artifact"
            ),
        }
    }
}

/// Archive stem used for partition bookkeeping: the final name component,
/// up to the container suffix.
fn archive_stem(name: &str) -> &str {
    let local = name.rsplit('/').next().unwrap_or(name);
    local.split(".tar.zst").next().unwrap_or(local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Category;
    use crate::source::{DirSource, FileSource};

    const PASSWORD: &str = "pw";

    /// Packs lines into host-1's network log inside an encrypted container.
    fn make_archive(lines: &[&str]) -> Vec<u8> {
        make_archive_for_stem("host-1", lines)
    }

    fn make_archive_for_stem(stem: &str, lines: &[&str]) -> Vec<u8> {
        let body = lines.concat();
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(
                &mut header,
                format!("{stem}/logs/application-network.json.1"),
                body.as_bytes(),
            )
            .unwrap();
        let tarball = builder.into_inner().unwrap();
        let compressed = zstd::encode_all(&tarball[..], 3).unwrap();
        decrypt::encrypt(&compressed, PASSWORD)
    }

    fn orchestrator(destination: &Path) -> ArchiveOrchestrator {
        ArchiveOrchestrator::new(IngestConfig::new(PASSWORD, destination)).unwrap()
    }

    fn spool_archive(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn full_pipeline_writes_category_partitions() {
        let dest = tempfile::tempdir().unwrap();
        let spool = tempfile::tempdir().unwrap();
        let archive = make_archive(&[
            "{\"method\":\"listMarketCatalogue\"}\n",
            "{\"marketDefinition\":{\"status\":\"OPEN\"}}\n",
            "{\"method\":\"placeOrders\"}\n",
            "{\"method\":\"cancelOrders\"}\n",
            "{\"raw\":\"{\\\"op\\\":\\\"ocm\\\"}\"}\n",
            "{\"op\":\"heartbeat\"}\n",
        ]);
        let path = spool_archive(spool.path(), "host-1.tar.zst", &archive);

        let orchestrator = orchestrator(dest.path());
        let stats = orchestrator
            .run(&mut FileSource::new(path))
            .unwrap();
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.partitions, 5);
        for category in Category::ALL {
            assert!(orchestrator
                .store()
                .partition_path(category, "host-1")
                .exists());
        }
        // interim artifacts are cleaned up on success
        let archives_dir = dest.path().join("archives");
        assert_eq!(fs::read_dir(&archives_dir).unwrap().count(), 0);
    }

    #[test]
    fn second_run_skips_processed_archive() {
        let dest = tempfile::tempdir().unwrap();
        let spool = tempfile::tempdir().unwrap();
        let archive = make_archive(&["{\"method\":\"placeOrders\",\"id\":1}\n"]);
        spool_archive(spool.path(), "host-1.tar.zst", &archive);

        let orchestrator = orchestrator(dest.path());
        let first = orchestrator
            .run(&mut DirSource::new(spool.path()).unwrap())
            .unwrap();
        assert_eq!(first.processed, 1);

        let second = orchestrator
            .run(&mut DirSource::new(spool.path()).unwrap())
            .unwrap();
        assert_eq!(second.processed, 0);
        assert_eq!(second.skipped, 1);
    }

    #[test]
    fn housekeeping_archives_are_excluded() {
        let dest = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dest.path());
        assert_eq!(
            orchestrator.check("2025-housekeeping.tar.zst"),
            Some(SkipReason::Excluded)
        );
    }

    #[test]
    fn pattern_mismatch_is_skipped() {
        let dest = tempfile::tempdir().unwrap();
        let mut config = IngestConfig::new(PASSWORD, dest.path());
        config.pattern = r"2025.*\.zst".to_string();
        let orchestrator = ArchiveOrchestrator::new(config).unwrap();
        assert_eq!(
            orchestrator.check("2024-host.tar.zst"),
            Some(SkipReason::PatternMismatch)
        );
        assert_eq!(orchestrator.check("2025-host.tar.zst"), None);
    }

    #[test]
    fn exclusion_wins_over_matching_pattern() {
        let dest = tempfile::tempdir().unwrap();
        let mut config = IngestConfig::new(PASSWORD, dest.path());
        config.pattern = r"2025.*\.zst".to_string();
        let orchestrator = ArchiveOrchestrator::new(config).unwrap();
        assert_eq!(
            orchestrator.check("2025-housekeeping.tar.zst"),
            Some(SkipReason::Excluded)
        );
    }

    #[test]
    fn selection_anchors_at_name_start() {
        let dest = tempfile::tempdir().unwrap();
        let mut config = IngestConfig::new(PASSWORD, dest.path());
        config.pattern = r"2025.*\.zst".to_string();
        let orchestrator = ArchiveOrchestrator::new(config).unwrap();
        assert_eq!(
            orchestrator.check("backup-2025-host.tar.zst"),
            Some(SkipReason::PatternMismatch)
        );
    }

    #[test]
    fn bad_structure_fails_archive_and_retains_artifact() {
        let dest = tempfile::tempdir().unwrap();
        let spool = tempfile::tempdir().unwrap();
        // no qualifying member inside the container
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(6);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "host-1/logs/other.log", &b"noise\n"[..])
            .unwrap();
        let tarball = builder.into_inner().unwrap();
        let compressed = zstd::encode_all(&tarball[..], 3).unwrap();
        let archive = decrypt::encrypt(&compressed, PASSWORD);
        let path = spool_archive(spool.path(), "host-1.tar.zst", &archive);

        let orchestrator = orchestrator(dest.path());
        let stats = orchestrator.run(&mut FileSource::new(path)).unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.processed, 0);
        // the decrypted artifact stays behind for inspection
        let archives_dir = dest.path().join("archives");
        assert_eq!(fs::read_dir(&archives_dir).unwrap().count(), 1);
    }

    #[test]
    fn wrong_password_fails_without_partitions() {
        let dest = tempfile::tempdir().unwrap();
        let spool = tempfile::tempdir().unwrap();
        let archive = make_archive(&["{\"method\":\"placeOrders\"}\n"]);
        let path = spool_archive(spool.path(), "host-1.tar.zst", &archive);

        let mut config = IngestConfig::new("not-the-password", dest.path());
        config.pattern = DEFAULT_PATTERN.to_string();
        let orchestrator = ArchiveOrchestrator::new(config).unwrap();
        let stats = orchestrator.run(&mut FileSource::new(path)).unwrap();
        assert_eq!(stats.failed, 1);
        assert!(orchestrator.store().existing_partition("host-1").is_none());
    }

    #[test]
    fn keep_flag_retains_decrypted_artifact_on_success() {
        let dest = tempfile::tempdir().unwrap();
        let spool = tempfile::tempdir().unwrap();
        let archive = make_archive(&["{\"method\":\"placeOrders\"}\n"]);
        let path = spool_archive(spool.path(), "host-1.tar.zst", &archive);

        let mut config = IngestConfig::new(PASSWORD, dest.path());
        config.keep = true;
        let orchestrator = ArchiveOrchestrator::new(config).unwrap();
        let stats = orchestrator.run(&mut FileSource::new(path)).unwrap();
        assert_eq!(stats.processed, 1);
        let archives_dir = dest.path().join("archives");
        assert_eq!(fs::read_dir(&archives_dir).unwrap().count(), 1);
    }

    #[test]
    fn conflicting_partition_fails_archive_but_keeps_existing() {
        let dest = tempfile::tempdir().unwrap();
        let spool = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dest.path());

        // a partition claimed under a different stem than the archive name,
        // so the pre-filter does not skip
        orchestrator
            .store()
            .write(Category::Postings, "host-1", b"{\"id\":1}\n")
            .unwrap();
        let original = fs::read(
            orchestrator
                .store()
                .partition_path(Category::Postings, "host-1"),
        )
        .unwrap();

        let archive = make_archive_for_stem("host-1", &["{\"method\":\"placeOrders\",\"id\":2}\n"]);
        let path = spool_archive(spool.path(), "other-name.tar.zst", &archive);
        let stats = orchestrator.run(&mut FileSource::new(path)).unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(
            fs::read(
                orchestrator
                    .store()
                    .partition_path(Category::Postings, "host-1")
            )
            .unwrap(),
            original
        );
    }

    #[test]
    fn archive_stem_strips_prefix_and_suffix() {
        assert_eq!(archive_stem("folder/host-1.tar.zst"), "host-1");
        assert_eq!(archive_stem("host-1.tar.zst"), "host-1");
        assert_eq!(archive_stem("host-1"), "host-1");
    }
}
