//! Paginated fetch with a two-tier retry policy:
//! bounded exponential backoff for transient failures, and an unbounded
//! cooldown-then-swap-credentials loop for quota errors.

use crate::api::{ApiConnector, CommentApi, ErrorClass};
use crate::config::EtlOptions;
use crate::credentials::CredentialPool;
use std::thread::sleep;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct FetchPolicy {
    pub page_size: u32,
    pub max_retries: u32,
    pub base_delay: Duration,
    pub quota_cooldown: Duration,
    pub quota_retry_limit: Option<u32>,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_retries: 5,
            base_delay: Duration::from_secs(2),
            quota_cooldown: Duration::from_secs(60),
            quota_retry_limit: None,
        }
    }
}

impl From<&EtlOptions> for FetchPolicy {
    fn from(o: &EtlOptions) -> Self {
        Self {
            page_size: o.page_size,
            max_retries: o.max_retries.max(1),
            base_delay: o.base_delay,
            quota_cooldown: o.quota_cooldown,
            quota_retry_limit: o.quota_retry_limit,
        }
    }
}

/// Why a fetch stopped. Everything except `Complete` means the comment list
/// may be partial.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchEnd {
    Complete,
    RetriesExhausted,
    Rejected,
    QuotaLimit,
    Unexpected,
}

#[derive(Clone, Debug)]
pub struct FetchOutcome {
    pub comments: Vec<String>,
    pub end: FetchEnd,
}

impl FetchOutcome {
    fn stop(comments: Vec<String>, end: FetchEnd) -> Self {
        Self { comments, end }
    }
}

/// `base * 2^attempt`, attempt counted from zero.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.min(20))
}

/// Flatten embedded line breaks so one comment stays one line.
pub fn normalize_comment(text: &str) -> String {
    text.replace(['\r', '\n'], " ").trim().to_string()
}

pub struct Fetcher<'a, C: ApiConnector> {
    pool: &'a CredentialPool<C>,
    policy: FetchPolicy,
}

impl<'a, C: ApiConnector> Fetcher<'a, C> {
    pub fn new(pool: &'a CredentialPool<C>, policy: FetchPolicy) -> Self {
        Self { pool, policy }
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// Fetch every page for `identifier` with a fresh client from the pool.
    /// Never fails: errors end the loop and whatever was gathered is returned.
    pub fn fetch_all(&self, identifier: &str) -> FetchOutcome {
        match self.pool.next_client() {
            Ok(client) => self.fetch_all_with(client, identifier),
            Err(e) => {
                tracing::error!(video_id = identifier, "cannot build API client: {}", e);
                FetchOutcome::stop(Vec::new(), FetchEnd::Unexpected)
            }
        }
    }

    /// Same as `fetch_all`, starting from an existing client.
    pub fn fetch_all_with(&self, mut client: C::Client, identifier: &str) -> FetchOutcome {
        let p = &self.policy;
        let mut comments: Vec<String> = Vec::new();
        let mut page_token: Option<String> = None;
        let mut quota_waits = 0u32;

        loop {
            let mut attempt = 0u32;
            let page = loop {
                let err = match client.list_page(identifier, page_token.as_deref(), p.page_size) {
                    Ok(page) => break page,
                    Err(e) => e,
                };
                match err.class() {
                    ErrorClass::Transient => {
                        attempt += 1;
                        if attempt >= p.max_retries {
                            tracing::warn!(
                                video_id = identifier,
                                "giving up after {} attempts: {}",
                                p.max_retries,
                                err
                            );
                            return FetchOutcome::stop(comments, FetchEnd::RetriesExhausted);
                        }
                        let delay = backoff_delay(p.base_delay, attempt - 1);
                        tracing::warn!(
                            video_id = identifier,
                            "attempt {}/{} failed ({}), retrying in {:?}",
                            attempt,
                            p.max_retries,
                            err,
                            delay
                        );
                        sleep(delay);
                    }
                    ErrorClass::Quota => {
                        if let Some(limit) = p.quota_retry_limit {
                            if quota_waits >= limit {
                                tracing::warn!(
                                    video_id = identifier,
                                    "quota still exhausted after {} key swaps: {}",
                                    quota_waits,
                                    err
                                );
                                return FetchOutcome::stop(comments, FetchEnd::QuotaLimit);
                            }
                        }
                        quota_waits += 1;
                        tracing::warn!(
                            video_id = identifier,
                            "{}; waiting {:?} before switching key",
                            err,
                            p.quota_cooldown
                        );
                        sleep(p.quota_cooldown);
                        client = match self.pool.next_client() {
                            Ok(c) => c,
                            Err(e) => {
                                tracing::error!(video_id = identifier, "cannot rebuild API client: {}", e);
                                return FetchOutcome::stop(comments, FetchEnd::Unexpected);
                            }
                        };
                    }
                    ErrorClass::Rejected => {
                        tracing::info!(video_id = identifier, "not retrievable: {}", err);
                        return FetchOutcome::stop(comments, FetchEnd::Rejected);
                    }
                    ErrorClass::Unexpected => {
                        tracing::error!(video_id = identifier, "unexpected error: {}", err);
                        return FetchOutcome::stop(comments, FetchEnd::Unexpected);
                    }
                }
            };

            comments.extend(
                page.texts
                    .iter()
                    .map(|t| normalize_comment(t))
                    .filter(|t| !t.is_empty()),
            );

            match page.next_page_token {
                Some(tok) => page_token = Some(tok),
                None => return FetchOutcome::stop(comments, FetchEnd::Complete),
            }
        }
    }
}
