use crate::aggregate::{count_lines, merge_counts, read_count_table, write_count_table, CountLabels, CountRow};
use crate::bulk::{BulkFetch, BulkReport};
use crate::cascade::{export_comments, filter_stage, language_summary, Cascade, CascadePolicy, FilterReport, LanguageRow};
use crate::config::EtlOptions;
use crate::credentials::{load_credentials, CredentialPool};
use crate::fetch::FetchPolicy;
use crate::filters::StatisticalEnglish;
use crate::ids::{extract_id_tables, read_identifiers, IdExtractReport};
use crate::metadata::{enrich_table, EnrichOptions, EnrichReport};
use crate::models::{HfInferenceModel, WhatlangDetector};
use crate::report::{build_report, write_report, Report};
use crate::stats::{rank_overlap, ratio_filter, write_overlap_table, write_ratio_table, RankOverlap};
use crate::util::init_tracing_once;
use crate::youtube::YouTubeConnector;
use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

/// Entry point for the batch jobs. Each job reads its stage inputs from disk
/// and writes its outputs; jobs can be run in any order once their inputs exist.
#[derive(Clone, Default)]
pub struct Cetl {
    pub(crate) opts: EtlOptions,
}

impl Cetl {
    pub fn new() -> Self {
        Self { opts: EtlOptions::default() }
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Self {
        Self { opts: EtlOptions::from_env() }
    }

    pub fn with_options(opts: EtlOptions) -> Self {
        Self { opts }
    }

    pub fn options(&self) -> &EtlOptions {
        &self.opts
    }

    // -------- Builder methods --------
    pub fn base_dir(mut self, base: impl AsRef<Path>) -> Self { self.opts = self.opts.with_base_dir(base); self }
    pub fn csv_dir(mut self, dir: impl AsRef<Path>) -> Self { self.opts = self.opts.with_csv_dir(dir); self }
    pub fn id_dir(mut self, dir: impl AsRef<Path>) -> Self { self.opts = self.opts.with_id_dir(dir); self }
    pub fn comment_dir(mut self, dir: impl AsRef<Path>) -> Self { self.opts = self.opts.with_comment_dir(dir); self }
    pub fn filtered_dir(mut self, dir: impl AsRef<Path>) -> Self { self.opts = self.opts.with_filtered_dir(dir); self }
    pub fn key_file(mut self, path: impl AsRef<Path>) -> Self { self.opts = self.opts.with_key_file(path); self }
    pub fn api_base(mut self, base: impl Into<String>) -> Self { self.opts = self.opts.with_api_base(base); self }
    pub fn workers(mut self, n: usize) -> Self { self.opts = self.opts.with_workers(n); self }
    pub fn max_retries(mut self, n: u32) -> Self { self.opts = self.opts.with_max_retries(n); self }
    pub fn quota_cooldown(mut self, d: Duration) -> Self { self.opts = self.opts.with_quota_cooldown(d); self }
    pub fn record_empty(mut self, yes: bool) -> Self { self.opts = self.opts.with_record_empty(yes); self }
    pub fn policy(mut self, policy: CascadePolicy) -> Self { self.opts = self.opts.with_policy(policy); self }
    pub fn min_words(mut self, n: usize) -> Self { self.opts = self.opts.with_min_words(n); self }
    pub fn question_threshold(mut self, t: f64) -> Self { self.opts = self.opts.with_question_threshold(t); self }
    pub fn parallelism(mut self, threads: usize) -> Self { self.opts = self.opts.with_parallelism(threads); self }
    pub fn progress(mut self, yes: bool) -> Self { self.opts = self.opts.with_progress(yes); self }

    fn init(&self) {
        init_tracing_once();
        if let Some(n) = self.opts.parallelism {
            if n > 0 {
                rayon::ThreadPoolBuilder::new().num_threads(n).build_global().ok();
            }
        }
    }

    // -------- Jobs --------

    /// Source tables -> identifier lists.
    pub fn extract_ids(&self) -> Result<IdExtractReport> {
        self.init();
        extract_id_tables(&self.opts.csv_dir, &self.opts.id_dir)
    }

    /// Fetch comments for every identifier under `id_dir` not yet processed.
    pub fn fetch_comments(&self) -> Result<BulkReport> {
        self.init();
        let ids = read_identifiers(&self.opts.id_dir)?;
        tracing::info!("{} identifiers in {}", ids.len(), self.opts.id_dir.display());
        let keys = load_credentials(&self.opts.key_file)?;
        let connector = YouTubeConnector::new(&self.opts.api_base, self.opts.request_timeout)?;
        let pool = CredentialPool::new(keys, connector)?;
        BulkFetch::new(&pool, &self.opts.comment_dir)
            .policy(FetchPolicy::from(&self.opts))
            .workers(self.opts.workers)
            .record_empty(self.opts.record_empty)
            .progress(self.opts.progress)
            .run(&ids)
    }

    /// The cascade described by the options, with the inference model
    /// attached when the policy needs one.
    pub fn build_cascade(&self) -> Result<Cascade> {
        let mut cascade = Cascade::new(self.opts.policy).min_words(self.opts.min_words);
        if self.opts.policy.needs_model() {
            let model = HfInferenceModel::new(
                &self.opts.hf_model_url,
                self.opts.hf_token.clone(),
                self.opts.request_timeout,
            )
            .context("build question model")?;
            cascade = cascade.model(model, self.opts.question_threshold);
        }
        Ok(cascade)
    }

    /// Raw comments -> filtered comments under `filtered_dir`.
    pub fn filter_comments(&self) -> Result<FilterReport> {
        self.init();
        let cascade = self.build_cascade()?;
        filter_stage(&self.opts.comment_dir, &self.opts.filtered_dir, &cascade, self.opts.progress)
    }

    /// English-only pass over the raw comments with a per-identifier summary.
    pub fn language_summary(&self, out_dir: &Path, summary_csv: &Path) -> Result<Vec<LanguageRow>> {
        self.init();
        let classifier = StatisticalEnglish::new(WhatlangDetector);
        language_summary(&self.opts.comment_dir, out_dir, &classifier, summary_csv)
    }

    /// Filtered comments as one `video_id,comment` table.
    pub fn export_comments(&self, out_csv: &Path) -> Result<usize> {
        self.init();
        export_comments(&self.opts.filtered_dir, out_csv)
    }

    /// Count both stages and write the merged table (with a TOTAL row).
    pub fn merge_counts(&self, out_csv: &Path, labels: &CountLabels) -> Result<Vec<CountRow>> {
        self.init();
        let raw = count_lines(&self.opts.comment_dir);
        let filtered = count_lines(&self.opts.filtered_dir);
        let rows = merge_counts(&raw, &filtered);
        write_count_table(out_csv, &rows, labels, true)?;
        tracing::info!("Merged {} identifiers -> {}", rows.len(), out_csv.display());
        Ok(rows)
    }

    pub fn select_ratio(&self, counts_csv: &Path, out_csv: &Path, threshold: f64, labels: &CountLabels) -> Result<Vec<CountRow>> {
        let rows = read_count_table(counts_csv, labels)?;
        let kept = ratio_filter(&rows, threshold);
        write_ratio_table(out_csv, &kept, labels)?;
        tracing::info!("ratio >= {}: {}/{} identifiers -> {}", threshold, kept.len(), rows.len(), out_csv.display());
        Ok(kept)
    }

    pub fn select_overlap(&self, counts_csv: &Path, out_csv: &Path, percent: f64, labels: &CountLabels) -> Result<RankOverlap> {
        let rows = read_count_table(counts_csv, labels)?;
        let overlap = rank_overlap(&rows, percent);
        write_overlap_table(out_csv, &overlap, labels)?;
        tracing::info!(
            "top {:.0}% overlap (cutoff rank {}): {}/{} identifiers -> {}",
            percent * 100.0,
            overlap.cutoff,
            overlap.rows.len(),
            rows.len(),
            out_csv.display()
        );
        Ok(overlap)
    }

    /// Metadata enrichment with the first configured credential.
    pub fn enrich(&self, input: &Path, output: &Path) -> Result<EnrichReport> {
        self.init();
        let keys = load_credentials(&self.opts.key_file)?;
        let connector = YouTubeConnector::new(&self.opts.api_base, self.opts.request_timeout)?;
        let pool = CredentialPool::new(keys, connector)?;
        let client = pool.next_client()?;
        enrich_table(input, output, &client, &EnrichOptions::default())
    }

    pub fn report(&self, counts_csv: &Path, out_json: &Path, labels: &CountLabels) -> Result<Report> {
        let rows = read_count_table(counts_csv, labels)?;
        let report = build_report(&rows);
        write_report(out_json, &report)?;
        Ok(report)
    }
}
