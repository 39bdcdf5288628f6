//! YouTube Data API v3 client over `reqwest::blocking`.

use crate::api::{ApiConnector, ApiError, CommentApi, CommentPage};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Shares one HTTP connection pool; hands out key-bound clients.
pub struct YouTubeConnector {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl YouTubeConnector {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;
        Ok(Self { base_url: base_url.trim_end_matches('/').to_string(), http })
    }
}

impl ApiConnector for YouTubeConnector {
    type Client = YouTubeClient;

    fn connect(&self, credential: &str) -> Result<YouTubeClient, ApiError> {
        if credential.trim().is_empty() {
            return Err(ApiError::Client("empty API key".to_string()));
        }
        Ok(YouTubeClient {
            base_url: self.base_url.clone(),
            http: self.http.clone(),
            key: credential.trim().to_string(),
        })
    }
}

/// Client bound to one API key.
pub struct YouTubeClient {
    base_url: String,
    http: reqwest::blocking::Client,
    key: String,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct ThreadListResponse {
    items: Vec<ThreadItem>,
    next_page_token: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct ThreadItem {
    snippet: ThreadSnippet,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct ThreadSnippet {
    top_level_comment: TopLevelComment,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct TopLevelComment {
    snippet: CommentSnippet,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct CommentSnippet {
    text_display: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ErrorBody {
    code: Option<u16>,
    message: String,
    errors: Vec<ErrorDetail>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ErrorDetail {
    reason: String,
}

const QUOTA_REASONS: &[&str] = &[
    "quotaExceeded",
    "dailyLimitExceeded",
    "rateLimitExceeded",
    "userRateLimitExceeded",
    "keyInvalid",
    "keyExpired",
    "accessNotConfigured",
];

const REJECTED_REASONS: &[&str] = &[
    "commentsDisabled",
    "forbidden",
    "videoNotFound",
    "channelNotFound",
    "commentThreadNotFound",
];

/// Map a non-success HTTP status and its body onto the fetch error taxonomy.
///
/// 404 and the "comments disabled / not found" reasons are final; 429, 401 and
/// 403s carrying a quota or key reason swap credentials. A bare 403 with no
/// recognisable reason is treated as quota, which only costs a cooldown.
pub fn classify_status(status: u16, body: &str) -> ApiError {
    let env: ErrorEnvelope = serde_json::from_str(body).unwrap_or_default();
    let code = env.error.code.unwrap_or(status);
    let message = if env.error.message.is_empty() {
        body.chars().take(200).collect()
    } else {
        env.error.message
    };
    let reasons: Vec<&str> = env.error.errors.iter().map(|e| e.reason.as_str()).collect();
    let has = |set: &[&str]| reasons.iter().any(|r| set.contains(r));

    if has(REJECTED_REASONS) {
        return ApiError::Rejected { status: code, message };
    }
    if has(QUOTA_REASONS) {
        return ApiError::Quota { status: code, message };
    }
    match code {
        404 => ApiError::Rejected { status: code, message },
        401 | 403 | 429 => ApiError::Quota { status: code, message },
        500..=599 => ApiError::Transient(format!("status {}: {}", code, message)),
        _ => ApiError::Unexpected { status: code, message },
    }
}

fn map_transport(e: reqwest::Error) -> ApiError {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        ApiError::Transient(e.to_string())
    } else {
        ApiError::Client(e.to_string())
    }
}

fn map_body(e: reqwest::Error) -> ApiError {
    if e.is_timeout() || e.is_body() {
        ApiError::Transient(e.to_string())
    } else {
        map_transport(e)
    }
}

impl YouTubeClient {
    /// GET `{base}/{resource}` with the key appended, decoding a JSON body.
    pub(crate) fn get_json<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = format!("{}/{}", self.base_url, resource);
        let response = self
            .http
            .get(&url)
            .query(query)
            .query(&[("key", self.key.as_str())])
            .send()
            .map_err(map_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }
        // a stalled or cut-off body is worth another attempt; a complete but
        // undecodable one is not
        let body = response.bytes().map_err(map_body)?;
        serde_json::from_slice(&body).map_err(|e| ApiError::Malformed(e.to_string()))
    }
}

impl CommentApi for YouTubeClient {
    fn list_page(
        &self,
        identifier: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<CommentPage, ApiError> {
        let mut query = vec![
            ("part", "snippet".to_string()),
            ("videoId", identifier.to_string()),
            ("maxResults", page_size.to_string()),
            ("textFormat", "plainText".to_string()),
        ];
        if let Some(tok) = page_token {
            query.push(("pageToken", tok.to_string()));
        }
        let resp: ThreadListResponse = self.get_json("commentThreads", &query)?;
        Ok(CommentPage {
            texts: resp
                .items
                .into_iter()
                .map(|it| it.snippet.top_level_comment.snippet.text_display)
                .collect(),
            next_page_token: resp.next_page_token.filter(|t| !t.is_empty()),
        })
    }
}
