//! Subsets of the merged count table: ratio threshold and rank-percentile overlap.

use crate::aggregate::{format_ratio, CountLabels, CountRow};
use anyhow::{bail, Context, Result};
use std::cmp::Ordering;
use std::path::Path;

/// Rows whose filtered/raw ratio reaches `threshold`, highest ratio first.
/// Rows without raw comments are dropped.
pub fn ratio_filter(rows: &[CountRow], threshold: f64) -> Vec<CountRow> {
    let mut out: Vec<CountRow> = rows
        .iter()
        .filter(|r| r.ratio().is_some_and(|x| x >= threshold))
        .cloned()
        .collect();
    out.sort_by(|a, b| desc_ratio(a, b));
    out
}

fn desc_ratio(a: &CountRow, b: &CountRow) -> Ordering {
    let ra = a.ratio().unwrap_or(0.0);
    let rb = b.ratio().unwrap_or(0.0);
    rb.partial_cmp(&ra).unwrap_or(Ordering::Equal)
}

/// 1-based rank of each row after a stable descending sort on `key`.
/// Ties keep input order; that order carries no meaning.
pub fn rank_positions(rows: &[CountRow], key: impl Fn(&CountRow) -> u64) -> Vec<usize> {
    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_by(|&a, &b| key(&rows[b]).cmp(&key(&rows[a])));
    let mut ranks = vec![0usize; rows.len()];
    for (pos, idx) in order.into_iter().enumerate() {
        ranks[idx] = pos + 1;
    }
    ranks
}

#[derive(Clone, Debug, PartialEq)]
pub struct RankedRow {
    pub row: CountRow,
    pub rank_raw: usize,
    pub rank_filtered: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RankOverlap {
    pub cutoff: usize,
    pub rows: Vec<RankedRow>,
}

/// Rows ranked within the top `percent` on both metrics.
/// `cutoff = floor(n * percent)`; output sorted by ratio, highest first.
pub fn rank_overlap(rows: &[CountRow], percent: f64) -> RankOverlap {
    let cutoff = (rows.len() as f64 * percent).floor() as usize;
    let rank_raw = rank_positions(rows, |r| r.raw);
    let rank_filtered = rank_positions(rows, |r| r.filtered);

    let mut kept: Vec<RankedRow> = rows
        .iter()
        .enumerate()
        .filter(|(i, _)| rank_raw[*i] <= cutoff && rank_filtered[*i] <= cutoff)
        .map(|(i, r)| RankedRow { row: r.clone(), rank_raw: rank_raw[i], rank_filtered: rank_filtered[i] })
        .collect();
    kept.sort_by(|a, b| desc_ratio(&a.row, &b.row));
    RankOverlap { cutoff, rows: kept }
}

pub fn write_ratio_table(path: &Path, rows: &[CountRow], labels: &CountLabels) -> Result<()> {
    let mut w = csv::Writer::from_path(path).with_context(|| format!("create {}", path.display()))?;
    w.write_record(["video_id", labels.raw.as_str(), labels.filtered.as_str(), "ratio"])?;
    for r in rows {
        w.write_record([r.identifier.clone(), r.raw.to_string(), r.filtered.to_string(), format_ratio(r.ratio())])?;
    }
    w.flush()?;
    Ok(())
}

pub fn write_overlap_table(path: &Path, overlap: &RankOverlap, labels: &CountLabels) -> Result<()> {
    let mut w = csv::Writer::from_path(path).with_context(|| format!("create {}", path.display()))?;
    w.write_record([
        "video_id",
        labels.raw.as_str(),
        labels.filtered.as_str(),
        "ratio",
        "rank_vc",
        "rank_vf",
        "cutoff_rank",
    ])?;
    for r in &overlap.rows {
        w.write_record([
            r.row.identifier.clone(),
            r.row.raw.to_string(),
            r.row.filtered.to_string(),
            format!("{:.6}", r.row.ratio().unwrap_or(0.0)),
            r.rank_raw.to_string(),
            r.rank_filtered.to_string(),
            overlap.cutoff.to_string(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

/// Column and divisor of the usual rescale: percentages to fractions.
pub const DEFAULT_SCALE_COLUMN: &str = "ratio";
pub const DEFAULT_SCALE_DIVISOR: f64 = 100.0;

/// Divide one numeric column by `divisor`, printing up to nine decimals with
/// trailing zeros trimmed. Empty and non-numeric cells pass through; rows too
/// short to hold the column are dropped.
pub fn scale_column(input: &Path, output: &Path, column: &str, divisor: f64) -> Result<usize> {
    if divisor == 0.0 {
        bail!("divisor must be non-zero");
    }
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(input)
        .with_context(|| format!("open {}", input.display()))?;
    let mut records = rdr.records();
    let header = match records.next() {
        Some(h) => h?,
        None => bail!("{} is empty", input.display()),
    };
    let Some(idx) = header.iter().position(|h| h == column) else {
        bail!("column '{}' not found in header: {:?}", column, header.iter().collect::<Vec<_>>());
    };

    let mut w = csv::Writer::from_path(output).with_context(|| format!("create {}", output.display()))?;
    w.write_record(&header)?;
    let mut n = 0usize;
    for rec in records {
        let rec = rec?;
        if rec.len() <= idx {
            continue;
        }
        let cells: Vec<String> = rec
            .iter()
            .enumerate()
            .map(|(i, v)| if i == idx { scale_cell(v, divisor) } else { v.to_string() })
            .collect();
        w.write_record(&cells)?;
        n += 1;
    }
    w.flush()?;
    Ok(n)
}

fn scale_cell(v: &str, divisor: f64) -> String {
    let t = v.trim();
    if t.is_empty() {
        return String::new();
    }
    match t.parse::<f64>() {
        Ok(x) => {
            let s = format!("{:.9}", x / divisor);
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        }
        Err(_) => t.to_string(),
    }
}
