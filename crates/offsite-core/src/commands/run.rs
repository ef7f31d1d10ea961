use std::path::Path;
use std::sync::atomic::AtomicBool;

use tracing::info;

use crate::commands::scan::{self, ScanStats};
use crate::commands::upload::{self, UploadStats};
use crate::config::OffsiteConfig;
use crate::error::Result;
use crate::index::Index;
use crate::storage;

/// Combined outcome of a scan-then-upload cycle.
#[derive(Debug, Clone, Copy)]
pub struct RunReport {
    pub scan: ScanStats,
    pub upload: UploadStats,
}

/// One full cycle: open the index, scan the source tree, then drain the
/// upload backlog. Each run is independent; whatever an interrupted run
/// left pending is picked up here.
pub fn run(config: &OffsiteConfig, cancel: &AtomicBool) -> Result<RunReport> {
    let index = Index::open(Path::new(&config.index.path))?;
    let backend = storage::backend_from_config(&config.remote)?;

    info!(source = %config.source.path, "starting run");
    let scan_stats = scan::run(
        &index,
        Path::new(&config.source.path),
        &config.source.exclude_patterns,
        cancel,
    )?;
    let upload_stats = upload::run(&index, backend.as_ref(), cancel)?;

    Ok(RunReport {
        scan: scan_stats,
        upload: upload_stats,
    })
}

/// Scan only: register new content without touching the remote.
pub fn scan_only(config: &OffsiteConfig, cancel: &AtomicBool) -> Result<ScanStats> {
    let index = Index::open(Path::new(&config.index.path))?;
    scan::run(
        &index,
        Path::new(&config.source.path),
        &config.source.exclude_patterns,
        cancel,
    )
}

/// Upload only: drain the existing backlog without rescanning.
pub fn upload_only(config: &OffsiteConfig, cancel: &AtomicBool) -> Result<UploadStats> {
    let index = Index::open(Path::new(&config.index.path))?;
    let backend = storage::backend_from_config(&config.remote)?;
    upload::run(&index, backend.as_ref(), cancel)
}
