//! End-to-end tests through the public API with a filesystem-backed remote.

use std::path::Path;
use std::sync::atomic::AtomicBool;

use offsite_core::commands::{run, status};
use offsite_core::config::{IndexConfig, OffsiteConfig, RemoteConfig, SourceConfig};
use offsite_core::crypto::stream::open_stream;
use offsite_core::index::Index;
use offsite_core::storage::object_key;

fn write_file(dir: &Path, rel: &str, contents: &[u8]) -> std::path::PathBuf {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}

fn test_config(source: &Path, index: &Path, remote: &Path) -> OffsiteConfig {
    OffsiteConfig {
        source: SourceConfig {
            path: source.to_string_lossy().to_string(),
            exclude_patterns: Vec::new(),
        },
        index: IndexConfig {
            path: index.to_string_lossy().to_string(),
        },
        remote: RemoteConfig {
            url: remote.to_string_lossy().to_string(),
            region: None,
            access_key_id: None,
            secret_access_key: None,
            endpoint: None,
            upload_timeout_secs: 50,
            retry: Default::default(),
        },
    }
}

fn no_cancel() -> AtomicBool {
    AtomicBool::new(false)
}

#[test]
fn full_run_mirrors_distinct_content() {
    let workspace = tempfile::tempdir().unwrap();
    let source = workspace.path().join("source");
    let remote = workspace.path().join("remote");
    let db = workspace.path().join("state/index.db");

    write_file(&source, "docs/report.txt", b"quarterly numbers");
    write_file(&source, "archive/report-copy.txt", b"quarterly numbers");
    write_file(&source, "notes.txt", b"unrelated");

    let config = test_config(&source, &db, &remote);
    let report = run::run(&config, &no_cancel()).unwrap();

    assert_eq!(report.scan.files_seen, 3);
    assert_eq!(report.scan.registered, 2);
    assert_eq!(report.scan.duplicates, 1);
    assert_eq!(report.upload.uploaded, 2);

    let st = status::run(&config).unwrap();
    assert_eq!(st.total, 2);
    assert_eq!(st.pending, 0);
    assert_eq!(st.uploaded, 2);
}

#[test]
fn repeated_runs_do_no_extra_work() {
    let workspace = tempfile::tempdir().unwrap();
    let source = workspace.path().join("source");
    let remote = workspace.path().join("remote");
    let db = workspace.path().join("index.db");
    write_file(&source, "a.txt", b"content");

    let config = test_config(&source, &db, &remote);
    run::run(&config, &no_cancel()).unwrap();
    let second = run::run(&config, &no_cancel()).unwrap();

    assert_eq!(second.scan.registered, 0);
    assert_eq!(second.upload.uploaded, 0);
    assert_eq!(second.upload.reconciled, 0);
}

#[test]
fn interrupted_scan_resumes_on_next_run() {
    let workspace = tempfile::tempdir().unwrap();
    let source = workspace.path().join("source");
    let remote = workspace.path().join("remote");
    let db = workspace.path().join("index.db");
    write_file(&source, "a.txt", b"alpha");
    write_file(&source, "b.txt", b"beta");

    let config = test_config(&source, &db, &remote);

    // First run only scans, as if the process died before uploading.
    let scan_stats = run::scan_only(&config, &no_cancel()).unwrap();
    assert_eq!(scan_stats.registered, 2);
    let st = status::run(&config).unwrap();
    assert_eq!(st.pending, 2);

    // A later full run drains the backlog without re-registering.
    let report = run::run(&config, &no_cancel()).unwrap();
    assert_eq!(report.scan.registered, 0);
    assert_eq!(report.upload.uploaded, 2);
    assert_eq!(status::run(&config).unwrap().pending, 0);
}

#[test]
fn remote_objects_decrypt_to_source_bytes() {
    let workspace = tempfile::tempdir().unwrap();
    let source = workspace.path().join("source");
    let remote = workspace.path().join("remote");
    let db = workspace.path().join("index.db");
    let file = write_file(&source, "payroll.db", b"very private bytes");

    let config = test_config(&source, &db, &remote);
    run::run(&config, &no_cancel()).unwrap();

    let index = Index::open(&db).unwrap();
    let record = index.get(1).unwrap().unwrap();

    // The remote directory was canonicalized by the backend; resolve the
    // object path the same way.
    let object_path = std::fs::canonicalize(&remote)
        .unwrap()
        .join(object_key(&file));
    let ciphertext = std::fs::read(object_path).unwrap();
    assert_ne!(ciphertext, b"very private bytes");
    let plaintext = open_stream(&ciphertext, &record.encryption_key).unwrap();
    assert_eq!(plaintext, b"very private bytes");
}

#[test]
fn upload_only_with_empty_backlog_is_a_noop() {
    let workspace = tempfile::tempdir().unwrap();
    let source = workspace.path().join("source");
    std::fs::create_dir_all(&source).unwrap();
    let remote = workspace.path().join("remote");
    let db = workspace.path().join("index.db");

    let config = test_config(&source, &db, &remote);
    let stats = run::upload_only(&config, &no_cancel()).unwrap();
    assert_eq!(stats.uploaded, 0);
    assert_eq!(stats.bytes_sent, 0);
}
