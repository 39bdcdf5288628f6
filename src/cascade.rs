//! Composable filter cascade and the per-identifier filter job.

use crate::filters::{is_question_shape, word_count, LexicalEnglish, StatisticalEnglish, TextClassifier};
use crate::lines::{read_trimmed_lines, write_lines_atomic};
use crate::models::{LanguageDetector, NeuralQuestion, QuestionModel, WhatlangDetector};
use crate::paths::{discover_stage_files, StageFile};
use crate::progress::maybe_count_progress;
use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// How the individual signals are combined. Every policy first requires
/// `min_words` words.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CascadePolicy {
    /// lexical English AND question shape
    HeuristicOnly,
    /// detector English (lexical when the detector abstains) AND question shape
    LexicalStatistical,
    /// lexical English AND neural question
    LexicalNeural,
    /// detector English AND neural question AND question shape
    StrictAnd,
    /// detector English AND (neural question OR question shape)
    LenientOr,
}

impl CascadePolicy {
    pub fn needs_model(self) -> bool {
        matches!(self, CascadePolicy::LexicalNeural | CascadePolicy::StrictAnd | CascadePolicy::LenientOr)
    }

    fn uses_detector(self) -> bool {
        matches!(self, CascadePolicy::LexicalStatistical | CascadePolicy::StrictAnd | CascadePolicy::LenientOr)
    }
}

impl fmt::Display for CascadePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CascadePolicy::HeuristicOnly => "heuristic-only",
            CascadePolicy::LexicalStatistical => "lexical-statistical",
            CascadePolicy::LexicalNeural => "lexical-neural",
            CascadePolicy::StrictAnd => "strict-and",
            CascadePolicy::LenientOr => "lenient-or",
        };
        f.write_str(s)
    }
}

impl FromStr for CascadePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "heuristic-only" | "heuristic" => Ok(CascadePolicy::HeuristicOnly),
            "lexical-statistical" | "statistical" => Ok(CascadePolicy::LexicalStatistical),
            "lexical-neural" => Ok(CascadePolicy::LexicalNeural),
            "strict-and" | "strict" => Ok(CascadePolicy::StrictAnd),
            "lenient-or" | "lenient" => Ok(CascadePolicy::LenientOr),
            other => Err(format!("unknown cascade policy: {}", other)),
        }
    }
}

/// The configured cascade. When the neural model cannot decide for a text,
/// the question-shape heuristic decides instead.
pub struct Cascade {
    policy: CascadePolicy,
    min_words: usize,
    lexical: LexicalEnglish,
    statistical: StatisticalEnglish<Box<dyn LanguageDetector>>,
    neural: Option<NeuralQuestion<Box<dyn QuestionModel>>>,
}

impl Cascade {
    pub fn new(policy: CascadePolicy) -> Self {
        Self {
            policy,
            min_words: 3,
            lexical: LexicalEnglish::default(),
            statistical: StatisticalEnglish::new(Box::new(WhatlangDetector) as Box<dyn LanguageDetector>),
            neural: None,
        }
    }

    pub fn min_words(mut self, n: usize) -> Self { self.min_words = n; self }
    pub fn lexical(mut self, lexical: LexicalEnglish) -> Self { self.lexical = lexical; self }

    pub fn detector(mut self, detector: impl LanguageDetector + 'static) -> Self {
        self.statistical = StatisticalEnglish::new(Box::new(detector) as Box<dyn LanguageDetector>);
        self
    }

    pub fn model(mut self, model: impl QuestionModel + 'static, threshold: f64) -> Self {
        self.neural = Some(NeuralQuestion::new(Box::new(model) as Box<dyn QuestionModel>).threshold(threshold));
        self
    }

    pub fn policy(&self) -> CascadePolicy {
        self.policy
    }

    /// Fail early when the policy needs a model that was not configured.
    pub fn ensure_ready(&self) -> Result<()> {
        if self.policy.needs_model() && self.neural.is_none() {
            bail!("policy {} needs a question model", self.policy);
        }
        Ok(())
    }

    fn is_english(&self, text: &str) -> bool {
        if self.policy.uses_detector() {
            self.statistical.verdict(text).unwrap_or_else(|| self.lexical.accepts(text))
        } else {
            self.lexical.accepts(text)
        }
    }

    fn neural_or_shape(&self, texts: &[String]) -> Result<Vec<bool>> {
        let Some(neural) = &self.neural else {
            bail!("policy {} needs a question model", self.policy);
        };
        let decisions = neural.decide_batch(texts);
        Ok(texts
            .iter()
            .zip(decisions)
            .map(|(t, d)| d.unwrap_or_else(|| is_question_shape(t)))
            .collect())
    }

    /// Lines that pass the policy, de-duplicated in first-occurrence order.
    pub fn select(&self, lines: &[String]) -> Result<Vec<String>> {
        let gated: Vec<&String> = lines
            .iter()
            .filter(|l| word_count(l) >= self.min_words && self.is_english(l))
            .collect();

        let kept: Vec<String> = match self.policy {
            CascadePolicy::HeuristicOnly | CascadePolicy::LexicalStatistical => {
                gated.into_iter().filter(|l| is_question_shape(l)).cloned().collect()
            }
            CascadePolicy::LexicalNeural => {
                let cands: Vec<String> = gated.into_iter().cloned().collect();
                let flags = self.neural_or_shape(&cands)?;
                cands.into_iter().zip(flags).filter(|(_, ok)| *ok).map(|(t, _)| t).collect()
            }
            CascadePolicy::StrictAnd => {
                // shape first: it is required anyway and saves model calls
                let cands: Vec<String> = gated.into_iter().filter(|l| is_question_shape(l)).cloned().collect();
                let flags = self.neural_or_shape(&cands)?;
                cands.into_iter().zip(flags).filter(|(_, ok)| *ok).map(|(t, _)| t).collect()
            }
            CascadePolicy::LenientOr => {
                let needs_model: Vec<String> =
                    gated.iter().filter(|l| !is_question_shape(l)).map(|l| (*l).clone()).collect();
                let flags = self.neural_or_shape(&needs_model)?;
                let mut accepted_by_model = ahash::AHashSet::new();
                for (t, ok) in needs_model.iter().zip(flags) {
                    if ok {
                        accepted_by_model.insert(t.as_str());
                    }
                }
                gated
                    .into_iter()
                    .filter(|l| is_question_shape(l) || accepted_by_model.contains(l.as_str()))
                    .cloned()
                    .collect()
            }
        };
        Ok(dedup_preserving_order(kept))
    }
}

/// Drop repeated lines, keeping the first occurrence.
pub fn dedup_preserving_order(lines: Vec<String>) -> Vec<String> {
    let mut seen = ahash::AHashSet::with_capacity(lines.len());
    lines.into_iter().filter(|l| seen.insert(l.clone())).collect()
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterReport {
    pub files: usize,
    /// Output already present.
    pub skipped: usize,
    pub written: usize,
    /// Processed, nothing qualified (no output file).
    pub empty: usize,
    pub failed: usize,
    pub kept_lines: usize,
}

enum FileResult {
    Skipped,
    Written(usize),
    Empty,
}

fn filter_one(file: &StageFile, out_dir: &Path, cascade: &Cascade) -> Result<FileResult> {
    let name = file.path.file_name().context("stage file without name")?;
    let out = out_dir.join(name);
    if out.exists() {
        tracing::debug!("{} exists, skipping", out.display());
        return Ok(FileResult::Skipped);
    }
    let lines = read_trimmed_lines(&file.path).with_context(|| format!("read {}", file.path.display()))?;
    let kept = cascade.select(&lines)?;
    if kept.is_empty() {
        tracing::info!(video_id = file.identifier.as_str(), "no qualified comments");
        return Ok(FileResult::Empty);
    }
    let n = write_lines_atomic(&out, &kept)?;
    tracing::info!(video_id = file.identifier.as_str(), "kept {}/{} comments", n, lines.len());
    Ok(FileResult::Written(n))
}

/// Run `cascade` over every per-identifier file of `in_dir`, writing survivors
/// to the same file name under `out_dir`. Existing outputs are skipped; one
/// file's failure is logged and counted without stopping the rest.
pub fn filter_stage(in_dir: &Path, out_dir: &Path, cascade: &Cascade, progress: bool) -> Result<FilterReport> {
    cascade.ensure_ready()?;
    if !in_dir.is_dir() {
        bail!("input dir missing: {}", in_dir.display());
    }
    fs::create_dir_all(out_dir).with_context(|| format!("create {}", out_dir.display()))?;

    let files = discover_stage_files(in_dir);
    tracing::info!("{} files to filter with policy {}", files.len(), cascade.policy());
    let report = Mutex::new(FilterReport { files: files.len(), ..Default::default() });
    let pb = maybe_count_progress(progress, files.len() as u64, "Filtering comments");

    files.par_iter().for_each(|file| {
        let res = filter_one(file, out_dir, cascade);
        let mut r = report.lock();
        match res {
            Ok(FileResult::Skipped) => r.skipped += 1,
            Ok(FileResult::Written(n)) => {
                r.written += 1;
                r.kept_lines += n;
            }
            Ok(FileResult::Empty) => r.empty += 1,
            Err(e) => {
                tracing::error!("{}: {:#}", file.path.display(), e);
                r.failed += 1;
            }
        }
        drop(r);
        if let Some(pb) = &pb { pb.inc(1); }
    });

    if let Some(pb) = pb { pb.finish_with_message("Filter done"); }
    Ok(report.into_inner())
}

/// Per-identifier language summary row.
#[derive(Clone, Debug, PartialEq)]
pub struct LanguageRow {
    pub identifier: String,
    pub total: u64,
    pub english: u64,
}

impl LanguageRow {
    pub fn ratio(&self) -> f64 {
        if self.total > 0 { self.english as f64 / self.total as f64 } else { 0.0 }
    }
}

/// English-only pass that also tabulates per-identifier totals:
/// writes English lines to `out_dir` (when any, and not already present) and
/// `video_id,total_comments,english_comments,english_ratio` to `summary_csv`.
pub fn language_summary(
    in_dir: &Path,
    out_dir: &Path,
    classifier: &dyn TextClassifier,
    summary_csv: &Path,
) -> Result<Vec<LanguageRow>> {
    fs::create_dir_all(out_dir).with_context(|| format!("create {}", out_dir.display()))?;
    let files = discover_stage_files(in_dir);

    let mut rows: Vec<LanguageRow> = files
        .par_iter()
        .filter_map(|file| {
            let lines = match read_trimmed_lines(&file.path) {
                Ok(l) => l,
                Err(e) => {
                    tracing::warn!("Read error {}: {}", file.path.display(), e);
                    return None;
                }
            };
            let english: Vec<&String> = lines.iter().filter(|l| classifier.accepts(l)).collect();
            let out = out_dir.join(format!("{}.txt", file.identifier));
            if !english.is_empty() && !out.exists() {
                if let Err(e) = write_lines_atomic(&out, &english) {
                    tracing::error!("{}: {:#}", out.display(), e);
                }
            }
            let row = LanguageRow { identifier: file.identifier.clone(), total: lines.len() as u64, english: english.len() as u64 };
            tracing::info!(video_id = row.identifier.as_str(), "total={} english={} ratio={:.3}", row.total, row.english, row.ratio());
            Some(row)
        })
        .collect();
    rows.sort_by(|a, b| a.identifier.cmp(&b.identifier));

    let mut w = csv::Writer::from_path(summary_csv).with_context(|| format!("create {}", summary_csv.display()))?;
    w.write_record(["video_id", "total_comments", "english_comments", "english_ratio"])?;
    for r in &rows {
        w.write_record([r.identifier.clone(), r.total.to_string(), r.english.to_string(), format!("{:.6}", r.ratio())])?;
    }
    w.flush()?;
    Ok(rows)
}

/// Flatten a stage directory into one `video_id,comment` table, one row per
/// trimmed non-empty line, identifiers in sorted order. Nothing is written
/// when there are no rows.
pub fn export_comments(in_dir: &Path, out_csv: &Path) -> Result<usize> {
    if !in_dir.is_dir() {
        tracing::warn!("Directory missing: {}", in_dir.display());
        return Ok(0);
    }
    let mut rows: Vec<(String, String)> = Vec::new();
    for file in discover_stage_files(in_dir) {
        match read_trimmed_lines(&file.path) {
            Ok(lines) => rows.extend(lines.into_iter().map(|c| (file.identifier.clone(), c))),
            Err(e) => tracing::warn!("Read error {}: {}", file.path.display(), e),
        }
    }
    if rows.is_empty() {
        tracing::info!("No comments to export from {}", in_dir.display());
        return Ok(0);
    }

    let mut w = csv::Writer::from_path(out_csv).with_context(|| format!("create {}", out_csv.display()))?;
    w.write_record(["video_id", "comment"])?;
    for (id, comment) in &rows {
        w.write_record([id, comment])?;
    }
    w.flush()?;
    tracing::info!("Saved {} rows -> {}", rows.len(), out_csv.display());
    Ok(rows.len())
}
