//! Model seams used by the cascade: language identification and question
//! classification. Both are black boxes behind a trait; the bundled
//! implementations are `whatlang` and the Hugging Face inference API.

use serde_json::{json, Value};
use std::thread::sleep;
use std::time::Duration;
use thiserror::Error;

/// Result of language identification.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    /// ISO 639 code ("en" or "eng" both count as English).
    pub lang: String,
    pub confidence: f64,
    pub reliable: bool,
}

pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> Option<Detection>;
}

impl<T: LanguageDetector + ?Sized> LanguageDetector for Box<T> {
    fn detect(&self, text: &str) -> Option<Detection> {
        (**self).detect(text)
    }
}

/// Trigram-based detector from the `whatlang` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct WhatlangDetector;

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> Option<Detection> {
        let info = whatlang::detect(text)?;
        Some(Detection {
            lang: info.lang().code().to_string(),
            confidence: info.confidence(),
            reliable: info.is_reliable(),
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model endpoint unreachable: {0}")]
    Http(String),

    #[error("model endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("cannot parse model response: {0}")]
    Parse(String),
}

/// Scores texts against candidate labels. One entry per input; `None` when
/// the model produced nothing usable for that text.
pub trait QuestionModel: Send + Sync {
    fn classify_batch(&self, texts: &[String]) -> Result<Vec<Option<LabelScore>>, ModelError>;
}

impl<T: QuestionModel + ?Sized> QuestionModel for Box<T> {
    fn classify_batch(&self, texts: &[String]) -> Result<Vec<Option<LabelScore>>, ModelError> {
        (**self).classify_batch(texts)
    }
}

/// Top label of one prediction. Accepts the text-classification shape
/// (`[{label, score}, ..]` or `{label, score}`) and the zero-shot shape
/// (`{labels: [..], scores: [..]}`).
pub fn extract_label_score(v: &Value) -> Option<LabelScore> {
    match v {
        Value::Array(items) => items.first().and_then(extract_label_score),
        Value::Object(map) => {
            if let (Some(label), Some(score)) = (map.get("label"), map.get("score")) {
                return Some(LabelScore { label: label.as_str()?.to_string(), score: score.as_f64()? });
            }
            let label = map.get("labels")?.as_array()?.first()?.as_str()?;
            let score = map.get("scores")?.as_array()?.first()?.as_f64()?;
            Some(LabelScore { label: label.to_string(), score })
        }
        _ => None,
    }
}

/// Spread a response body over `n` inputs.
pub fn predictions_for(body: &Value, n: usize) -> Vec<Option<LabelScore>> {
    match body {
        Value::Array(items)
            if items.len() == n && items.iter().all(|x| x.is_array() || x.is_object()) =>
        {
            items.iter().map(extract_label_score).collect()
        }
        _ if n == 1 => vec![extract_label_score(body)],
        _ => vec![None; n],
    }
}

/// Zero-shot classification through the Hugging Face inference API.
pub struct HfInferenceModel {
    url: String,
    token: Option<String>,
    http: reqwest::blocking::Client,
    candidate_labels: Vec<String>,
    max_retries: u32,
    base_delay: Duration,
}

impl HfInferenceModel {
    pub fn new(url: &str, token: Option<String>, timeout: Duration) -> Result<Self, ModelError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ModelError::Http(e.to_string()))?;
        Ok(Self {
            url: url.to_string(),
            token,
            http,
            candidate_labels: vec!["question".to_string(), "statement".to_string()],
            max_retries: 3,
            base_delay: Duration::from_secs(2),
        })
    }

    pub fn with_retry(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.base_delay = base_delay;
        self
    }

    fn post(&self, payload: &Value) -> Result<Value, ModelError> {
        let mut last = ModelError::Http("no attempt made".to_string());
        for attempt in 0..self.max_retries {
            let last_attempt = attempt + 1 == self.max_retries;
            let mut req = self.http.post(&self.url).header("Accept", "application/json").json(payload);
            if let Some(tok) = &self.token {
                req = req.bearer_auth(tok);
            }
            match req.send() {
                Err(e) => {
                    tracing::warn!("model request attempt {} failed: {}", attempt + 1, e);
                    last = ModelError::Http(e.to_string());
                }
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if resp.status().is_success() {
                        return resp.json::<Value>().map_err(|e| ModelError::Parse(e.to_string()));
                    }
                    let body: String = resp.text().unwrap_or_default().chars().take(200).collect();
                    if !matches!(status, 429 | 503) {
                        return Err(ModelError::Status { status, body });
                    }
                    tracing::warn!("model endpoint busy ({}), attempt {}", status, attempt + 1);
                    last = ModelError::Status { status, body };
                }
            }
            if !last_attempt {
                sleep(crate::fetch::backoff_delay(self.base_delay, attempt));
            }
        }
        Err(last)
    }
}

impl QuestionModel for HfInferenceModel {
    fn classify_batch(&self, texts: &[String]) -> Result<Vec<Option<LabelScore>>, ModelError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let payload = json!({
            "inputs": texts,
            "parameters": { "candidate_labels": self.candidate_labels, "multi_label": false },
        });
        let body = self.post(&payload)?;
        Ok(predictions_for(&body, texts.len()))
    }
}

/// Stage C: accept when the model's top label is the target label with
/// enough confidence.
pub struct NeuralQuestion<M> {
    model: M,
    pub target_label: String,
    pub threshold: f64,
    pub batch_size: usize,
}

impl<M: QuestionModel> NeuralQuestion<M> {
    pub fn new(model: M) -> Self {
        Self { model, target_label: "question".to_string(), threshold: 0.8, batch_size: 8 }
    }

    pub fn threshold(mut self, t: f64) -> Self {
        self.threshold = t;
        self
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.batch_size = n.max(1);
        self
    }

    /// One decision per text; `None` when the model could not decide.
    pub fn decide_batch(&self, texts: &[String]) -> Vec<Option<bool>> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            match self.model.classify_batch(chunk) {
                Ok(preds) => {
                    for i in 0..chunk.len() {
                        let decision = preds.get(i).cloned().flatten().map(|p| {
                            p.label.eq_ignore_ascii_case(&self.target_label) && p.score >= self.threshold
                        });
                        out.push(decision);
                    }
                }
                Err(e) => {
                    tracing::warn!("question model failed for {} texts: {}", chunk.len(), e);
                    out.extend(std::iter::repeat(None).take(chunk.len()));
                }
            }
        }
        out
    }
}
