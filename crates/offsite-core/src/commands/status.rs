use std::path::Path;

use crate::config::OffsiteConfig;
use crate::error::Result;
use crate::index::Index;

/// Index totals for the status command.
#[derive(Debug, Clone, Copy)]
pub struct StatusReport {
    pub total: u64,
    pub pending: u64,
    pub uploaded: u64,
}

pub fn run(config: &OffsiteConfig) -> Result<StatusReport> {
    let index = Index::open(Path::new(&config.index.path))?;
    let summary = index.summary()?;
    Ok(StatusReport {
        total: summary.total,
        pending: summary.pending,
        uploaded: summary.total - summary.pending,
    })
}
