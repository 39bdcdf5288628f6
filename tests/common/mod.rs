#![allow(dead_code)]

use cetl::{
    ApiConnector, ApiError, CommentApi, CommentPage, Detection, FetchPolicy, LabelScore, LanguageDetector,
    ModelError, QuestionModel,
};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Write `lines` (newline-terminated) to `path`, creating parent dirs.
pub fn write_lines(path: &Path, lines: &[&str]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut s = String::new();
    for l in lines {
        s.push_str(l);
        s.push('\n');
    }
    fs::write(path, s).unwrap();
}

/// Read a text file into its non-empty lines.
pub fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter(|l| !l.is_empty())
        .map(|l| l.to_string())
        .collect()
}

pub fn temp_base() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().to_path_buf();
    (dir, base)
}

/// Retry policy with millisecond delays so tests stay fast.
pub fn fast_policy() -> FetchPolicy {
    FetchPolicy {
        page_size: 100,
        max_retries: 5,
        base_delay: Duration::from_millis(1),
        quota_cooldown: Duration::from_millis(1),
        quota_retry_limit: None,
    }
}

pub fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// -------- scripted comment API --------

pub type Reply = Result<CommentPage, ApiError>;

pub fn page(texts: &[&str], next: Option<&str>) -> Reply {
    Ok(CommentPage { texts: texts.iter().map(|s| s.to_string()).collect(), next_page_token: next.map(|s| s.to_string()) })
}

pub fn transient() -> Reply {
    Err(ApiError::Transient("connection reset".to_string()))
}

pub fn quota() -> Reply {
    Err(ApiError::Quota { status: 403, message: "quotaExceeded".to_string() })
}

pub fn rejected() -> Reply {
    Err(ApiError::Rejected { status: 403, message: "commentsDisabled".to_string() })
}

/// One recorded `list_page` call.
#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    pub identifier: String,
    pub page_token: Option<String>,
    pub key: String,
}

#[derive(Default)]
struct Shared {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<Call>>,
    connects: Mutex<Vec<String>>,
}

/// Connector whose clients replay per-identifier scripts shared across every
/// client it hands out. An identifier without a script (or with an exhausted
/// one) answers with a single empty final page.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    shared: Arc<Shared>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, identifier: &str, replies: Vec<Reply>) -> Self {
        self.shared.scripts.lock().unwrap().insert(identifier.to_string(), replies.into());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.shared.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, identifier: &str) -> usize {
        self.calls().iter().filter(|c| c.identifier == identifier).count()
    }

    /// Credentials passed to `connect`, in order.
    pub fn connects(&self) -> Vec<String> {
        self.shared.connects.lock().unwrap().clone()
    }
}

pub struct ScriptedClient {
    shared: Arc<Shared>,
    key: String,
}

impl CommentApi for ScriptedClient {
    fn list_page(&self, identifier: &str, page_token: Option<&str>, _page_size: u32) -> Result<CommentPage, ApiError> {
        self.shared.calls.lock().unwrap().push(Call {
            identifier: identifier.to_string(),
            page_token: page_token.map(|s| s.to_string()),
            key: self.key.clone(),
        });
        let next = self.shared.scripts.lock().unwrap().get_mut(identifier).and_then(|q| q.pop_front());
        next.unwrap_or_else(|| page(&[], None))
    }
}

impl ApiConnector for ScriptedConnector {
    type Client = ScriptedClient;

    fn connect(&self, credential: &str) -> Result<ScriptedClient, ApiError> {
        self.shared.connects.lock().unwrap().push(credential.to_string());
        Ok(ScriptedClient { shared: self.shared.clone(), key: credential.to_string() })
    }
}

// -------- model doubles --------

/// Detector driven by a closure.
pub struct FnDetector<F>(pub F);

impl<F> LanguageDetector for FnDetector<F>
where
    F: Fn(&str) -> Option<Detection> + Send + Sync,
{
    fn detect(&self, text: &str) -> Option<Detection> {
        (self.0)(text)
    }
}

pub fn detection(lang: &str, confidence: f64, reliable: bool) -> Option<Detection> {
    Some(Detection { lang: lang.to_string(), confidence, reliable })
}

/// Always answers English with high confidence.
pub fn always_english() -> FnDetector<impl Fn(&str) -> Option<Detection> + Send + Sync> {
    FnDetector(|_: &str| detection("en", 0.99, true))
}

/// Question model driven by a closure; counts the texts it was asked about.
pub struct FnModel<F> {
    f: F,
    pub seen: Arc<AtomicUsize>,
}

impl<F> FnModel<F>
where
    F: Fn(&str) -> Option<LabelScore> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f, seen: Arc::new(AtomicUsize::new(0)) }
    }
}

impl<F> QuestionModel for FnModel<F>
where
    F: Fn(&str) -> Option<LabelScore> + Send + Sync,
{
    fn classify_batch(&self, texts: &[String]) -> Result<Vec<Option<LabelScore>>, ModelError> {
        self.seen.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| (self.f)(t)).collect())
    }
}

pub fn label(l: &str, score: f64) -> Option<LabelScore> {
    Some(LabelScore { label: l.to_string(), score })
}

/// A model whose endpoint is always down.
pub struct DownModel;

impl QuestionModel for DownModel {
    fn classify_batch(&self, _texts: &[String]) -> Result<Vec<Option<LabelScore>>, ModelError> {
        Err(ModelError::Status { status: 503, body: "loading".to_string() })
    }
}
