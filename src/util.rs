use anyhow::{Context, Result};
use std::fs;
use std::fs::File;
use std::io;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

static INIT_ONCE: std::sync::Once = std::sync::Once::new();
pub fn init_tracing_once() {
    INIT_ONCE.call_once(|| {
        let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();
    });
}

/// Show only the head of a credential in logs.
pub fn mask_credential(key: &str) -> String {
    let head: String = key.chars().take(12).collect();
    format!("{}******", head)
}

/// Identifier for a per-identifier stage file: `<dir>/abc.txt` -> `abc`.
pub fn identifier_of(path: &Path) -> Option<String> {
    path.file_stem().and_then(|s| s.to_str()).map(|s| s.to_string())
}

// Stage files can be briefly locked by scanners or sync tools; open/create/rename
// retry on those codes (Windows: access denied, sharing/lock violation,
// mapped section, device not ready) before giving up.
fn is_retriable_io_error(e: &io::Error) -> bool {
    match e.raw_os_error() {
        Some(5) | Some(32) | Some(33) | Some(1224) | Some(21) => true,
        _ => matches!(e.kind(), io::ErrorKind::Interrupted),
    }
}

fn with_backoff<T>(tries: usize, delay_ms: u64, mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    let mut last_err: Option<io::Error> = None;
    for i in 0..tries.max(1) {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if is_retriable_io_error(&e) => {
                last_err = Some(e);
                sleep(Duration::from_millis(delay_ms.saturating_mul((i + 1) as u64)));
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "retries exhausted")))
}

/// Open a file with retries/backoff for transient errors.
pub fn open_with_backoff(path: &Path, tries: usize, delay_ms: u64) -> io::Result<File> {
    with_backoff(tries, delay_ms, || File::open(path))
}

/// Create a file with retries/backoff for transient errors.
pub fn create_with_backoff(path: &Path, tries: usize, delay_ms: u64) -> io::Result<File> {
    with_backoff(tries, delay_ms, || File::create(path))
}

/// Remove a file with retries/backoff for transient errors.
/// Succeeds if the file doesn't exist.
pub fn remove_with_backoff(path: &Path, tries: usize, delay_ms: u64) -> Result<()> {
    let res = with_backoff(tries, delay_ms, || match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    });
    res.with_context(|| format!("remove {}", path.display()))
}

/// Atomically replace `dest` with `tmp`.
/// If rename fails (e.g., across volumes), fall back to copy+remove.
pub fn replace_file_atomic_backoff(tmp: &Path, dest: &Path) -> Result<()> {
    let tries = 20usize;
    let delay_ms = 50u64;
    match with_backoff(tries, delay_ms, || fs::rename(tmp, dest)) {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::debug!("rename {} -> {} failed ({}), copying", tmp.display(), dest.display(), e);
            with_backoff(tries, delay_ms, || fs::copy(tmp, dest))
                .with_context(|| format!("copy {} -> {}", tmp.display(), dest.display()))?;
            remove_with_backoff(tmp, tries, delay_ms)
        }
    }
}
