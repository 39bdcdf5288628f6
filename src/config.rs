use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cascade::CascadePolicy;

/// User-facing options with sensible defaults and builder chaining.
#[derive(Clone, Debug)]
pub struct EtlOptions {
    pub base_dir: PathBuf,
    pub csv_dir: PathBuf,             // source tables holding identifier columns
    pub id_dir: PathBuf,              // newline-delimited identifier lists
    pub comment_dir: PathBuf,         // raw comments, one file per identifier
    pub filtered_dir: PathBuf,        // output of the filter cascade
    pub key_file: PathBuf,            // one API key per line

    // acquisition
    pub api_base: String,
    pub workers: usize,               // concurrent fetch tasks
    pub page_size: u32,
    pub max_retries: u32,             // attempts per page for transient errors
    pub base_delay: Duration,         // doubles per attempt
    pub quota_cooldown: Duration,     // wait before swapping credentials
    pub quota_retry_limit: Option<u32>, // None = wait forever
    pub request_timeout: Duration,
    pub record_empty: bool,           // write <id>.empty markers for empty results

    // filtering
    pub policy: CascadePolicy,
    pub min_words: usize,
    pub question_threshold: f64,
    pub hf_token: Option<String>,
    pub hf_model_url: String,

    pub progress: bool,               // show progress bar
    pub parallelism: Option<usize>,   // Some(N) to size rayon pools for filter jobs
}

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
pub const DEFAULT_HF_MODEL_URL: &str =
    "https://api-inference.huggingface.co/models/facebook/bart-large-mnli";

impl Default for EtlOptions {
    fn default() -> Self {
        let base = PathBuf::from(".");
        Self {
            csv_dir: base.join("video_csv"),
            id_dir: base.join("video_id"),
            comment_dir: base.join("video_comment"),
            filtered_dir: base.join("video_comment_final"),
            key_file: base.join("api_keys").join("api_keys.txt"),
            base_dir: base,

            api_base: DEFAULT_API_BASE.to_string(),
            workers: 3,
            page_size: 100,
            max_retries: 5,
            base_delay: Duration::from_secs(2),
            quota_cooldown: Duration::from_secs(60),
            quota_retry_limit: None,
            request_timeout: Duration::from_secs(30),
            record_empty: false,

            policy: CascadePolicy::HeuristicOnly,
            min_words: 3,
            question_threshold: 0.8,
            hf_token: None,
            hf_model_url: DEFAULT_HF_MODEL_URL.to_string(),

            progress: true,
            parallelism: None,
        }
    }
}

impl EtlOptions {
    /// Defaults, then overrides from the process environment:
    /// - CETL_WORKERS, CETL_MAX_RETRIES, CETL_QUOTA_COOLDOWN_SECS
    /// - YOUTUBE_API_BASE
    /// - HUGGING_FACE_HUB_TOKEN, QUESTION_THRESHOLD
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(n) = env_parse::<usize>("CETL_WORKERS") {
            self = self.with_workers(n);
        }
        if let Some(n) = env_parse::<u32>("CETL_MAX_RETRIES") {
            self = self.with_max_retries(n);
        }
        if let Some(secs) = env_parse::<u64>("CETL_QUOTA_COOLDOWN_SECS") {
            self.quota_cooldown = Duration::from_secs(secs);
        }
        if let Ok(base) = std::env::var("YOUTUBE_API_BASE") {
            if !base.trim().is_empty() {
                self.api_base = base.trim().trim_end_matches('/').to_string();
            }
        }
        if let Ok(tok) = std::env::var("HUGGING_FACE_HUB_TOKEN") {
            if !tok.trim().is_empty() {
                self.hf_token = Some(tok.trim().to_string());
            }
        }
        if let Some(t) = env_parse::<f64>("QUESTION_THRESHOLD") {
            self = self.with_question_threshold(t);
        }
        self
    }

    /// Re-root every stage directory under `base_dir`.
    pub fn with_base_dir(mut self, base_dir: impl AsRef<Path>) -> Self {
        let base = base_dir.as_ref().to_path_buf();
        self.csv_dir = base.join("video_csv");
        self.id_dir = base.join("video_id");
        self.comment_dir = base.join("video_comment");
        self.filtered_dir = base.join("video_comment_final");
        self.key_file = base.join("api_keys").join("api_keys.txt");
        self.base_dir = base;
        self
    }
    pub fn with_csv_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.csv_dir = dir.as_ref().to_path_buf();
        self
    }
    pub fn with_id_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.id_dir = dir.as_ref().to_path_buf();
        self
    }
    pub fn with_comment_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.comment_dir = dir.as_ref().to_path_buf();
        self
    }
    pub fn with_filtered_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.filtered_dir = dir.as_ref().to_path_buf();
        self
    }
    pub fn with_key_file(mut self, path: impl AsRef<Path>) -> Self {
        self.key_file = path.as_ref().to_path_buf();
        self
    }
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }
    pub fn with_workers(mut self, n: usize) -> Self {
        self.workers = n.max(1);
        self
    }
    pub fn with_page_size(mut self, n: u32) -> Self {
        self.page_size = n.clamp(1, 100);
        self
    }
    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n.max(1);
        self
    }
    pub fn with_base_delay(mut self, d: Duration) -> Self {
        self.base_delay = d;
        self
    }
    pub fn with_quota_cooldown(mut self, d: Duration) -> Self {
        self.quota_cooldown = d;
        self
    }
    pub fn with_quota_retry_limit(mut self, limit: Option<u32>) -> Self {
        self.quota_retry_limit = limit;
        self
    }
    pub fn with_request_timeout(mut self, d: Duration) -> Self {
        self.request_timeout = d;
        self
    }
    pub fn with_record_empty(mut self, yes: bool) -> Self {
        self.record_empty = yes;
        self
    }
    pub fn with_policy(mut self, policy: CascadePolicy) -> Self {
        self.policy = policy;
        self
    }
    pub fn with_min_words(mut self, n: usize) -> Self {
        self.min_words = n;
        self
    }
    pub fn with_question_threshold(mut self, t: f64) -> Self {
        self.question_threshold = t.clamp(0.0, 1.0);
        self
    }
    pub fn with_hf_token(mut self, token: impl Into<String>) -> Self {
        self.hf_token = Some(token.into());
        self
    }
    pub fn with_hf_model_url(mut self, url: impl Into<String>) -> Self {
        self.hf_model_url = url.into();
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_parallelism(mut self, threads: usize) -> Self {
        self.parallelism = Some(threads);
        self
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("{} is set but cannot be parsed: {:?}", name, raw);
            None
        }
    }
}
