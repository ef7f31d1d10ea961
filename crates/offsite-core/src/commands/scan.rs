use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use ignore::WalkBuilder;
use tracing::{debug, info, warn};

use crate::crypto::FileKey;
use crate::digest::ContentDigest;
use crate::error::{OffsiteError, Result};
use crate::index::Index;

/// What happened to one candidate file during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// New content: record inserted with a fresh key, pending upload.
    Registered,
    /// Content digest already known to the index; no record created.
    DuplicateContent,
    /// File could not be opened or read for hashing; skipped.
    HashFailed,
    /// Key generation failed; file skipped, nothing persisted.
    KeyFailed,
}

/// Per-scan counters, one bump per file visited.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanStats {
    pub files_seen: u64,
    pub registered: u64,
    pub duplicates: u64,
    pub hash_errors: u64,
    pub key_errors: u64,
}

impl ScanStats {
    fn record(&mut self, outcome: FileOutcome) {
        self.files_seen += 1;
        match outcome {
            FileOutcome::Registered => self.registered += 1,
            FileOutcome::DuplicateContent => self.duplicates += 1,
            FileOutcome::HashFailed => self.hash_errors += 1,
            FileOutcome::KeyFailed => self.key_errors += 1,
        }
    }
}

/// Walk `source` and register every regular file whose content the index
/// has not seen before.
///
/// Per-file failures (unreadable file, key generation) are logged and
/// skipped; a walk that cannot enumerate the tree at all is fatal. Checks
/// `cancel` between files and returns early with partial stats when set.
pub fn run(
    index: &Index,
    source: &Path,
    exclude_patterns: &[String],
    cancel: &AtomicBool,
) -> Result<ScanStats> {
    let meta = std::fs::metadata(source).map_err(|e| {
        OffsiteError::Walk(format!(
            "source directory does not exist: {}: {e}",
            source.display()
        ))
    })?;
    if !meta.is_dir() {
        return Err(OffsiteError::Walk(format!(
            "source is not a directory: {}",
            source.display()
        )));
    }

    let walker = build_configured_walker(source, exclude_patterns)?;
    let mut stats = ScanStats::default();

    for entry_result in walker.build() {
        if cancel.load(Ordering::SeqCst) {
            info!("scan interrupted, stopping after {} files", stats.files_seen);
            return Ok(stats);
        }

        let entry = entry_result.map_err(|e| OffsiteError::Walk(format!("walk error: {e}")))?;
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let outcome = process_file(index, entry.path())?;
        stats.record(outcome);
    }

    info!(
        files_seen = stats.files_seen,
        registered = stats.registered,
        duplicates = stats.duplicates,
        hash_errors = stats.hash_errors,
        key_errors = stats.key_errors,
        "scan complete"
    );
    Ok(stats)
}

/// Hash, dedup-check, and register a single file.
///
/// Only index failures other than the digest uniqueness constraint
/// propagate as errors; everything else resolves to a [`FileOutcome`].
pub fn process_file(index: &Index, path: &Path) -> Result<FileOutcome> {
    let (digest, size) = match ContentDigest::of_file(path) {
        Ok(pair) => pair,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping unreadable file");
            return Ok(FileOutcome::HashFailed);
        }
    };

    if index.exists_by_digest(&digest)? {
        debug!(path = %path.display(), digest = %digest, "duplicate content, skipping");
        return Ok(FileOutcome::DuplicateContent);
    }

    let key = match FileKey::generate() {
        Ok(key) => key,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "key generation failed, skipping file");
            return Ok(FileOutcome::KeyFailed);
        }
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let path_str = path.to_string_lossy();

    match index.register(&path_str, &name, size, &digest, &key) {
        Ok(id) => {
            debug!(id, path = %path.display(), "registered for upload");
            Ok(FileOutcome::Registered)
        }
        // Lost the race to another registrar for the same content; the
        // record that won is equivalent for our purposes.
        Err(OffsiteError::DigestConflict(_)) => Ok(FileOutcome::DuplicateContent),
        Err(e) => Err(e),
    }
}

fn build_configured_walker(source: &Path, exclude_patterns: &[String]) -> Result<WalkBuilder> {
    let mut builder = ignore::gitignore::GitignoreBuilder::new(source);
    for pat in exclude_patterns {
        builder
            .add_line(None, pat)
            .map_err(|e| OffsiteError::Config(format!("invalid exclude pattern '{pat}': {e}")))?;
    }
    let excludes = builder
        .build()
        .map_err(|e| OffsiteError::Config(format!("exclude matcher build failed: {e}")))?;

    let mut walk_builder = WalkBuilder::new(source);
    walk_builder.follow_links(false);
    walk_builder.hidden(false);
    walk_builder.ignore(false);
    walk_builder.git_global(false);
    walk_builder.git_exclude(false);
    walk_builder.git_ignore(false);
    walk_builder.parents(false);
    walk_builder.require_git(false);
    walk_builder.sort_by_file_name(std::ffi::OsStr::cmp);

    let source_path_buf = source.to_path_buf();
    walk_builder.filter_entry(move |entry| {
        let path = entry.path();
        if path == source_path_buf {
            return true;
        }
        let rel = path.strip_prefix(&source_path_buf).unwrap_or(path);
        let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
        !excludes.matched_path_or_any_parents(rel, is_dir).is_ignore()
    });

    Ok(walk_builder)
}
