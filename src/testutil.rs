//! Scratch-directory helpers shared by the unit tests.

use std::env as stdenv;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Fresh, empty directory under the system temp dir, unique per call.
pub(crate) fn make_unique_temp_dir(tag: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut p = stdenv::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    p.push(format!("minish_{}_{}_{}_{}", tag, std::process::id(), nanos, seq));
    fs::create_dir_all(&p).expect("failed to create temp dir");
    fs::canonicalize(&p).expect("canonicalize failed")
}

/// Write `content` to `dir/rel`, creating parent directories.
pub(crate) fn write_file(dir: &Path, rel: &str, content: &str) -> PathBuf {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create parent dir");
    }
    fs::write(&path, content).expect("failed to write file");
    path
}
