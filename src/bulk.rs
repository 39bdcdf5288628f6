//! Bulk acquisition: fan `fetch_all` out over the pending identifiers on a
//! bounded worker pool and persist each result as soon as it lands.

use crate::api::ApiConnector;
use crate::credentials::CredentialPool;
use crate::fetch::{FetchEnd, FetchPolicy, Fetcher};
use crate::lines::write_lines_atomic;
use crate::paths::{empty_marker_path, output_path};
use crate::progress::maybe_count_progress;
use crate::state::partition_pending;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BulkReport {
    pub total: usize,
    /// Already processed on an earlier run.
    pub skipped: usize,
    /// Output files written this run.
    pub saved: usize,
    /// Settled with no comments (no output file).
    pub empty: usize,
    /// Task-level errors (write failures and the like).
    pub failed: usize,
    /// Comments written across all saved files.
    pub comments: usize,
}

enum TaskResult {
    Saved(usize),
    Empty,
}

pub struct BulkFetch<'a, C: ApiConnector> {
    pool: &'a CredentialPool<C>,
    policy: FetchPolicy,
    out_dir: PathBuf,
    workers: usize,
    record_empty: bool,
    progress: bool,
}

impl<'a, C: ApiConnector> BulkFetch<'a, C> {
    pub fn new(pool: &'a CredentialPool<C>, out_dir: impl AsRef<Path>) -> Self {
        Self {
            pool,
            policy: FetchPolicy::default(),
            out_dir: out_dir.as_ref().to_path_buf(),
            workers: 3,
            record_empty: false,
            progress: false,
        }
    }

    pub fn policy(mut self, policy: FetchPolicy) -> Self { self.policy = policy; self }
    pub fn workers(mut self, n: usize) -> Self { self.workers = n.max(1); self }
    pub fn record_empty(mut self, yes: bool) -> Self { self.record_empty = yes; self }
    pub fn progress(mut self, yes: bool) -> Self { self.progress = yes; self }

    /// Fetch every identifier in `ids` whose output does not exist yet.
    ///
    /// Returns once every submitted task has settled. A failing identifier is
    /// logged and counted; it never cancels the others. Nothing is retried
    /// across runs except through the skip check on the next invocation.
    pub fn run(&self, ids: &[String]) -> Result<BulkReport> {
        fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("create {}", self.out_dir.display()))?;

        let (done, pending) = partition_pending(&self.out_dir, ids);
        tracing::info!("Found {} videos to fetch ({} already done)", pending.len(), done.len());

        let report = Mutex::new(BulkReport { total: ids.len(), skipped: done.len(), ..Default::default() });
        if pending.is_empty() {
            return Ok(report.into_inner());
        }

        let workers = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("fetch-{}", i))
            .build()
            .context("build fetch worker pool")?;

        let fetcher = Fetcher::new(self.pool, self.policy.clone());
        let pb = maybe_count_progress(self.progress, pending.len() as u64, "Fetching comments");

        workers.install(|| {
            pending.par_iter().with_max_len(1).for_each(|id| {
                let res = self.process_one(&fetcher, id);
                let mut r = report.lock();
                match res {
                    Ok(TaskResult::Saved(n)) => {
                        r.saved += 1;
                        r.comments += n;
                    }
                    Ok(TaskResult::Empty) => r.empty += 1,
                    Err(e) => {
                        tracing::error!(video_id = id.as_str(), "task failed: {:#}", e);
                        r.failed += 1;
                    }
                }
                drop(r);
                if let Some(pb) = &pb { pb.inc(1); }
            });
        });

        if let Some(pb) = pb { pb.finish_with_message("Fetch done"); }
        Ok(report.into_inner())
    }

    fn process_one(&self, fetcher: &Fetcher<'_, C>, id: &str) -> Result<TaskResult> {
        let outcome = fetcher.fetch_all(id);
        if outcome.comments.is_empty() {
            tracing::info!(video_id = id, "no comments ({:?})", outcome.end);
            // Only settled answers earn a marker; a run cut short by errors stays pending.
            if self.record_empty && matches!(outcome.end, FetchEnd::Complete | FetchEnd::Rejected) {
                let marker = empty_marker_path(&self.out_dir, id);
                fs::write(&marker, b"").with_context(|| format!("write {}", marker.display()))?;
            }
            return Ok(TaskResult::Empty);
        }
        let out = output_path(&self.out_dir, id);
        let n = write_lines_atomic(&out, &outcome.comments)?;
        if outcome.end == FetchEnd::Complete {
            tracing::info!(video_id = id, "saved {} comments", n);
        } else {
            tracing::warn!(video_id = id, "saved {} comments (partial: {:?})", n, outcome.end);
        }
        Ok(TaskResult::Saved(n))
    }
}
