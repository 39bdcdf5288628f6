//! Per-identifier counts across stage directories, merged into one table.
//! Counts are recomputed from the files on every run.

use crate::lines::count_file_lines;
use crate::paths::discover_stage_files;
use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

pub const TOTAL_ROW: &str = "TOTAL";

/// Column names for the two count metrics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CountLabels {
    pub raw: String,
    pub filtered: String,
}

impl Default for CountLabels {
    fn default() -> Self {
        Self { raw: "video_comment".to_string(), filtered: "video_comment_final".to_string() }
    }
}

impl CountLabels {
    pub fn new(raw: impl Into<String>, filtered: impl Into<String>) -> Self {
        Self { raw: raw.into(), filtered: filtered.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CountRow {
    pub identifier: String,
    pub raw: u64,
    pub filtered: u64,
}

impl CountRow {
    /// filtered / raw; undefined without raw comments.
    pub fn ratio(&self) -> Option<f64> {
        if self.raw > 0 { Some(self.filtered as f64 / self.raw as f64) } else { None }
    }
}

/// Six-decimal ratio cell; empty when undefined.
pub fn format_ratio(ratio: Option<f64>) -> String {
    ratio.map(|r| format!("{:.6}", r)).unwrap_or_default()
}

/// Line count of every `<id>.txt` under `folder`, keyed by identifier.
/// A missing folder yields an empty map; unreadable files are logged and left out.
pub fn count_lines(folder: &Path) -> BTreeMap<String, u64> {
    if !folder.is_dir() {
        tracing::warn!("Missing folder: {}", folder.display());
        return BTreeMap::new();
    }
    discover_stage_files(folder)
        .par_iter()
        .filter_map(|f| match count_file_lines(&f.path) {
            Ok(n) => Some((f.identifier.clone(), n)),
            Err(e) => {
                tracing::warn!("Read error {}: {}", f.path.display(), e);
                None
            }
        })
        .collect()
}

/// Outer join on identifier; a side without the identifier counts 0.
pub fn merge_counts(raw: &BTreeMap<String, u64>, filtered: &BTreeMap<String, u64>) -> Vec<CountRow> {
    let keys: BTreeSet<&String> = raw.keys().chain(filtered.keys()).collect();
    keys.into_iter()
        .map(|k| CountRow {
            identifier: k.clone(),
            raw: raw.get(k).copied().unwrap_or(0),
            filtered: filtered.get(k).copied().unwrap_or(0),
        })
        .collect()
}

/// `video_id,<raw>,<filtered>,ratio`, optionally closed by a `TOTAL` row.
pub fn write_count_table(path: &Path, rows: &[CountRow], labels: &CountLabels, total_row: bool) -> Result<()> {
    let mut w = csv::Writer::from_path(path).with_context(|| format!("create {}", path.display()))?;
    w.write_record(["video_id", labels.raw.as_str(), labels.filtered.as_str(), "ratio"])?;
    for r in rows {
        w.write_record([r.identifier.clone(), r.raw.to_string(), r.filtered.to_string(), format_ratio(r.ratio())])?;
    }
    if total_row {
        let total = CountRow {
            identifier: TOTAL_ROW.to_string(),
            raw: rows.iter().map(|r| r.raw).sum(),
            filtered: rows.iter().map(|r| r.filtered).sum(),
        };
        w.write_record([total.identifier.clone(), total.raw.to_string(), total.filtered.to_string(), format_ratio(total.ratio())])?;
    }
    w.flush().with_context(|| format!("flush {}", path.display()))?;
    Ok(())
}

/// Load a count table by column name. The `TOTAL` row and rows whose counts do
/// not parse are skipped.
pub fn read_count_table(path: &Path, labels: &CountLabels) -> Result<Vec<CountRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("open {}", path.display()))?;
    let headers = rdr.headers()?.clone();
    let col = |name: &str| headers.iter().position(|h| h.trim().trim_start_matches('\u{feff}') == name);
    let (Some(id_col), Some(raw_col), Some(filt_col)) = (col("video_id"), col(&labels.raw), col(&labels.filtered)) else {
        bail!(
            "{}: expected columns video_id, {}, {}; found {:?}",
            path.display(),
            labels.raw,
            labels.filtered,
            headers.iter().collect::<Vec<_>>()
        );
    };

    let mut rows = Vec::new();
    for (n, rec) in rdr.records().enumerate() {
        let rec = match rec {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("{}: skipping row {}: {}", path.display(), n + 2, e);
                continue;
            }
        };
        let id = rec.get(id_col).unwrap_or("").trim();
        if id.is_empty() || id == TOTAL_ROW {
            continue;
        }
        let parse = |c: usize| rec.get(c).and_then(|v| v.trim().parse::<u64>().ok());
        match (parse(raw_col), parse(filt_col)) {
            (Some(raw), Some(filtered)) => rows.push(CountRow { identifier: id.to_string(), raw, filtered }),
            _ => tracing::warn!("{}: skipping malformed row for {}", path.display(), id),
        }
    }
    Ok(rows)
}
