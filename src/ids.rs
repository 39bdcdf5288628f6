//! Identifier extraction: pull video ids out of source tables and assemble the
//! de-duplicated working set from newline-delimited id lists.

use crate::lines::{read_trimmed_lines, write_lines_atomic};
use crate::paths::list_files_with_ext;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const COMBINED_IDS_FILE: &str = "all_video_ids.txt";

#[derive(Clone, Debug, Default)]
pub struct IdExtractReport {
    /// (per-table output file, ids written)
    pub per_table: Vec<(PathBuf, usize)>,
    pub unique: usize,
    pub combined: Option<PathBuf>,
}

/// Choose the identifier column of a header row.
/// Prefers a header mentioning both "video" and "id", then an exact `video_id`,
/// then falls back to the first column.
pub fn pick_id_column(header: &[String]) -> usize {
    let lowered: Vec<String> = header.iter().map(|h| h.trim().to_lowercase()).collect();
    if let Some(i) = lowered.iter().position(|h| h.contains("video") && h.contains("id")) {
        return i;
    }
    if let Some(i) = lowered.iter().position(|h| h == "video_id") {
        return i;
    }
    0
}

/// Identifiers from one CSV table, in source order (duplicates kept).
/// Short rows and blank cells are skipped.
pub fn extract_ids_from_csv(path: &Path) -> Result<Vec<String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("open {}", path.display()))?;

    let mut rows = rdr.byte_records();
    let header: Vec<String> = match rows.next() {
        Some(rec) => rec
            .with_context(|| format!("read header of {}", path.display()))?
            .iter()
            .map(|f| String::from_utf8_lossy(f).trim_start_matches('\u{feff}').to_string())
            .collect(),
        None => return Ok(Vec::new()),
    };
    let col = pick_id_column(&header);

    let mut ids = Vec::new();
    for (n, rec) in rows.enumerate() {
        let rec = match rec {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("{}: skipping unreadable row {}: {}", path.display(), n + 2, e);
                continue;
            }
        };
        let Some(cell) = rec.get(col) else { continue };
        let v = String::from_utf8_lossy(cell).trim().to_string();
        if !v.is_empty() && !v.eq_ignore_ascii_case("video_id") {
            ids.push(v);
        }
    }
    Ok(ids)
}

/// For each `*.csv` in `csv_dir`, write `<stem>_video_ids.txt` into `out_dir`,
/// then the sorted union as `all_video_ids.txt`.
pub fn extract_id_tables(csv_dir: &Path, out_dir: &Path) -> Result<IdExtractReport> {
    let tables = list_files_with_ext(csv_dir, "csv");
    let mut report = IdExtractReport::default();
    if tables.is_empty() {
        tracing::warn!("No CSV files found in {}", csv_dir.display());
        return Ok(report);
    }
    fs::create_dir_all(out_dir).with_context(|| format!("create {}", out_dir.display()))?;

    let mut all = BTreeSet::new();
    for table in &tables {
        let ids = match extract_ids_from_csv(table) {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!("skipping {}: {:#}", table.display(), e);
                continue;
            }
        };
        if ids.is_empty() {
            tracing::info!("no ids extracted from {}", table.display());
            continue;
        }
        let stem = table.file_stem().and_then(|s| s.to_str()).unwrap_or("table");
        let out = out_dir.join(format!("{}_video_ids.txt", stem));
        let n = write_lines_atomic(&out, &ids)?;
        tracing::info!("wrote {} ids to {}", n, out.display());
        all.extend(ids);
        report.per_table.push((out, n));
    }

    let combined = out_dir.join(COMBINED_IDS_FILE);
    write_lines_atomic(&combined, &all)?;
    tracing::info!("wrote {} unique ids to {}", all.len(), combined.display());
    report.unique = all.len();
    report.combined = Some(combined);
    Ok(report)
}

/// The identifier universe: every trimmed non-empty line of every `*.txt`
/// under `id_dir`, de-duplicated and sorted.
pub fn read_identifiers(id_dir: &Path) -> Result<Vec<String>> {
    if !id_dir.is_dir() {
        tracing::warn!("Input dir {} missing.", id_dir.display());
        return Ok(Vec::new());
    }
    let mut ids: Vec<String> = Vec::new();
    for path in list_files_with_ext(id_dir, "txt") {
        match read_trimmed_lines(&path) {
            Ok(lines) => ids.extend(lines),
            Err(e) => tracing::warn!("Read error {}: {}", path.display(), e),
        }
    }
    ids.sort();
    ids.dedup();
    Ok(ids)
}

/// First column of every data row of `input` (header skipped, lossy UTF-8),
/// one value per line in `output`. Empty rows are skipped.
pub fn extract_first_column(input: &Path, output: &Path) -> Result<usize> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(input)
        .with_context(|| format!("open {}", input.display()))?;
    let mut values = Vec::new();
    for rec in rdr.byte_records() {
        let rec = rec.with_context(|| format!("read {}", input.display()))?;
        if let Some(cell) = rec.get(0) {
            values.push(String::from_utf8_lossy(cell).into_owned());
        }
    }
    let n = write_lines_atomic(output, &values)?;
    tracing::info!("extracted {} values (first column) -> {}", n, output.display());
    Ok(n)
}
