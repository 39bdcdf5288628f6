//! Plain-text line files: every stage reads and writes one record per line.

use crate::util::{create_with_backoff, open_with_backoff, replace_file_atomic_backoff};
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const BUF_BYTES: usize = 64 * 1024;

/// Read all trimmed, non-empty lines of a UTF-8 text file.
/// Invalid UTF-8 sequences are replaced rather than failing the file.
pub fn read_trimmed_lines(path: &Path) -> io::Result<Vec<String>> {
    let f = open_with_backoff(path, 16, 50)?;
    let mut rdr = BufReader::with_capacity(BUF_BYTES, f);
    let mut out = Vec::new();
    let mut raw = Vec::with_capacity(1024);
    loop {
        raw.clear();
        let n = rdr.read_until(b'\n', &mut raw)?;
        if n == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&raw);
        let t = line.trim();
        if !t.is_empty() {
            out.push(t.to_string());
        }
    }
    Ok(out)
}

/// Count newline-terminated lines; a trailing line without `\n` counts too.
pub fn count_file_lines(path: &Path) -> io::Result<u64> {
    let f = open_with_backoff(path, 16, 50)?;
    let mut rdr = BufReader::with_capacity(BUF_BYTES, f);
    let mut n = 0u64;
    let mut raw = Vec::with_capacity(1024);
    loop {
        raw.clear();
        if rdr.read_until(b'\n', &mut raw)? == 0 {
            break;
        }
        n += 1;
    }
    Ok(n)
}

/// Line writer that stages into `<dir>/_staging/<name>.inprogress` and is only
/// promoted to its final name by `finish()`. A crash mid-write therefore never
/// leaves a final file behind, which matters because a final file means "done".
pub struct StagedLineWriter {
    tmp: PathBuf,
    dest: PathBuf,
    w: Option<BufWriter<File>>,
}

impl StagedLineWriter {
    pub fn create(dest: &Path) -> Result<Self> {
        let dir = dest.parent().unwrap_or_else(|| Path::new("."));
        let staging = dir.join("_staging");
        fs::create_dir_all(&staging).with_context(|| format!("create {}", staging.display()))?;
        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "part".to_string());
        let tmp = staging.join(format!("{}.inprogress", name));
        let f = create_with_backoff(&tmp, 16, 50).with_context(|| format!("create {}", tmp.display()))?;
        Ok(Self { tmp, dest: dest.to_path_buf(), w: Some(BufWriter::with_capacity(BUF_BYTES, f)) })
    }

    #[inline]
    pub fn write_line(&mut self, s: &str) -> io::Result<()> {
        if let Some(w) = &mut self.w {
            w.write_all(s.as_bytes())?;
            w.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Flush and atomically promote the staged file to its destination.
    pub fn finish(mut self) -> Result<()> {
        if let Some(mut w) = self.w.take() {
            w.flush().with_context(|| format!("flush {}", self.tmp.display()))?;
        }
        replace_file_atomic_backoff(&self.tmp, &self.dest)
    }
}

/// Write `lines` to `dest` through a staged writer.
pub fn write_lines_atomic<I, S>(dest: &Path, lines: I) -> Result<usize>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut w = StagedLineWriter::create(dest)?;
    let mut n = 0usize;
    for l in lines {
        w.write_line(l.as_ref()).with_context(|| format!("write {}", dest.display()))?;
        n += 1;
    }
    w.finish()?;
    Ok(n)
}
