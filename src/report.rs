//! Numbers behind the summary plots. Rendering is left to whatever reads the
//! JSON; this module only fixes the binning and clipping rules.

use crate::aggregate::CountRow;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Percentile with linear interpolation between closest ranks.
/// `p` in [0, 100]; `None` for an empty sample.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut v: Vec<f64> = values.to_vec();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let pos = (p.clamp(0.0, 100.0) / 100.0) * (v.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(v[lo] + (v[hi] - v[lo]) * frac)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Histogram {
    /// `bins + 1` edges.
    pub edges: Vec<f64>,
    pub counts: Vec<u64>,
}

/// Equal-width histogram over `[lo, hi]`; values outside are ignored and the
/// last bin is closed on the right.
pub fn histogram(values: &[f64], bins: usize, lo: f64, hi: f64) -> Histogram {
    let bins = bins.max(1);
    let (lo, hi) = if hi > lo { (lo, hi) } else { (lo - 0.5, lo + 0.5) };
    let width = (hi - lo) / bins as f64;
    let edges = (0..=bins).map(|i| lo + width * i as f64).collect();
    let mut counts = vec![0u64; bins];
    for &x in values {
        if x < lo || x > hi {
            continue;
        }
        let i = (((x - lo) / width) as usize).min(bins - 1);
        counts[i] += 1;
    }
    Histogram { edges, counts }
}

#[derive(Clone, Debug, Serialize)]
pub struct RatioSummary {
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub mean: f64,
    pub histogram: Histogram,
}

#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub identifiers: usize,
    /// Raw counts at or below their 95th percentile, 30 bins.
    pub raw_hist: Option<Histogram>,
    /// Positive filtered counts at or below their 95th percentile, 30 bins.
    pub filtered_hist: Option<Histogram>,
    /// Ratios within [0, 0.2], 40 bins, with quartiles and mean of all ratios.
    pub ratio: Option<RatioSummary>,
}

fn clipped_hist(values: &[f64], bins: usize) -> Option<Histogram> {
    let p95 = percentile(values, 95.0)?;
    let kept: Vec<f64> = values.iter().copied().filter(|x| *x <= p95).collect();
    let lo = kept.iter().copied().fold(f64::INFINITY, f64::min);
    Some(histogram(&kept, bins, lo, p95))
}

pub fn build_report(rows: &[CountRow]) -> Report {
    let raw: Vec<f64> = rows.iter().map(|r| r.raw as f64).collect();
    let filtered_pos: Vec<f64> = rows.iter().filter(|r| r.filtered > 0).map(|r| r.filtered as f64).collect();
    let ratios: Vec<f64> = rows.iter().map(|r| r.ratio().unwrap_or(0.0)).collect();

    let ratio = match (
        percentile(&ratios, 25.0),
        percentile(&ratios, 50.0),
        percentile(&ratios, 75.0),
        mean(&ratios),
    ) {
        (Some(q25), Some(median), Some(q75), Some(mean)) => Some(RatioSummary {
            q25,
            median,
            q75,
            mean,
            histogram: histogram(&ratios, 40, 0.0, 0.2),
        }),
        _ => None,
    };

    Report {
        identifiers: rows.len(),
        raw_hist: clipped_hist(&raw, 30),
        filtered_hist: clipped_hist(&filtered_pos, 30),
        ratio,
    }
}

pub fn write_report(path: &Path, report: &Report) -> Result<()> {
    let out = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = BufWriter::new(out);
    serde_json::to_writer_pretty(&mut w, report)?;
    w.flush()?;
    Ok(())
}
