use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, info, warn};

use crate::crypto::stream::{EncryptReader, FileCipher};
use crate::error::{OffsiteError, Result};
use crate::index::{FileRecord, Index};
use crate::storage::{object_key, StorageBackend};

/// Per-batch upload counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct UploadStats {
    /// Records whose object was transmitted this run.
    pub uploaded: u64,
    /// Records found already present remotely and marked uploaded.
    pub reconciled: u64,
    /// Encrypted bytes sent over the wire.
    pub bytes_sent: u64,
}

/// Drain the upload backlog: encrypt and transmit every pending record,
/// then flip it to uploaded.
///
/// Works from a single `list_pending` snapshot. A remote that already has
/// the object (existence precondition) means an earlier run got the bytes
/// there before losing the status update, so the record is marked uploaded
/// without retransmitting. Transport failures abort the batch; everything
/// unfinished stays pending for the next run.
pub fn run(index: &Index, backend: &dyn StorageBackend, cancel: &AtomicBool) -> Result<UploadStats> {
    let pending = index.list_pending()?;
    let mut stats = UploadStats::default();
    if pending.is_empty() {
        info!("no pending uploads");
        return Ok(stats);
    }
    info!(pending = pending.len(), "starting upload batch");

    for record in &pending {
        if cancel.load(Ordering::SeqCst) {
            info!(
                uploaded = stats.uploaded,
                "upload interrupted, remaining records stay pending"
            );
            return Ok(stats);
        }
        upload_record(index, backend, record, &mut stats)?;
    }

    info!(
        uploaded = stats.uploaded,
        reconciled = stats.reconciled,
        bytes_sent = stats.bytes_sent,
        "upload batch complete"
    );
    Ok(stats)
}

fn upload_record(
    index: &Index,
    backend: &dyn StorageBackend,
    record: &FileRecord,
    stats: &mut UploadStats,
) -> Result<()> {
    let path = Path::new(&record.path);
    let key = object_key(path);

    let file = File::open(path).map_err(|e| {
        error!(id = record.id, path = %record.path, error = %e, "source file unreadable, aborting batch");
        OffsiteError::Io(e)
    })?;

    let cipher = FileCipher::new(&record.encryption_key);
    let mut reader = EncryptReader::new(file, cipher);

    match backend.put_if_absent(&key, &mut reader) {
        Ok(bytes) => {
            mark_uploaded_logged(index, record)?;
            stats.uploaded += 1;
            stats.bytes_sent += bytes;
            info!(id = record.id, key = %key, bytes, "uploaded");
            Ok(())
        }
        Err(OffsiteError::PreconditionFailed(_)) => {
            // Object landed in a previous run whose status update was lost.
            warn!(
                id = record.id,
                key = %key,
                "object already present remotely, reconciling status"
            );
            mark_uploaded_logged(index, record)?;
            stats.reconciled += 1;
            Ok(())
        }
        Err(e) => {
            error!(id = record.id, key = %key, error = %e, "upload failed, aborting batch");
            Err(e)
        }
    }
}

fn mark_uploaded_logged(index: &Index, record: &FileRecord) -> Result<()> {
    index.mark_uploaded(record.id).map_err(|e| {
        // The object is safely remote; the next run reconciles via the
        // existence precondition.
        error!(
            id = record.id,
            error = %e,
            "upload succeeded but status update failed; will reconcile on next run"
        );
        e
    })
}
