//! Video metadata enrichment for count tables, plus the strict English-region
//! filter applied to the enriched table.

use crate::api::ApiError;
use crate::filters::is_english_code;
use crate::ids::pick_id_column;
use crate::youtube::YouTubeClient;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

/// Columns appended by [`enrich_table`], in order.
pub const ENRICHED_COLUMNS: [&str; 9] = [
    "duration_seconds",
    "view_count",
    "category_id",
    "category_title",
    "topic_categories",
    "default_language",
    "default_audio_language",
    "channel_id",
    "channel_country",
];

/// Channel countries accepted by [`english_region_filter`].
pub const ENGLISH_COUNTRIES: [&str; 17] = [
    "US", "GB", "CA", "AU", "NZ", "IE", "SG", "PH", "ZA", "NG", "JM", "TT", "BB", "BZ", "LR", "GH", "KE",
];

#[derive(Clone, Debug, Default, PartialEq)]
pub struct VideoMetadata {
    pub video_id: String,
    pub duration_seconds: u64,
    pub view_count: u64,
    pub category_id: String,
    /// Last path segment of each topic URL.
    pub topic_categories: Vec<String>,
    pub default_language: String,
    pub default_audio_language: String,
    pub channel_id: String,
}

/// `PT#H#M#S` (optionally with a leading `#D` day part) to seconds.
/// Anything unparseable or out of range is 0.
pub fn parse_iso_duration(s: &str) -> u64 {
    let Some(rest) = s.trim().strip_prefix('P') else { return 0 };
    let (days, time) = match rest.split_once('T') {
        Some((d, t)) => (d, t),
        None => (rest, ""),
    };
    let mut total = 0u64;
    let mut num = String::new();
    for (part, is_time) in [(days, false), (time, true)] {
        for c in part.chars() {
            if c.is_ascii_digit() {
                num.push(c);
                continue;
            }
            let n: u64 = match num.parse() {
                Ok(n) => n,
                Err(_) => return 0,
            };
            num.clear();
            let secs = match (c, is_time) {
                ('D', false) => n.checked_mul(86_400),
                ('H', true) => n.checked_mul(3_600),
                ('M', true) => n.checked_mul(60),
                ('S', true) => Some(n),
                _ => None,
            };
            total = match secs.and_then(|x| total.checked_add(x)) {
                Some(t) => t,
                None => return 0,
            };
        }
        if !num.is_empty() {
            return 0;
        }
    }
    total
}

/// Lookups needed to enrich a table.
pub trait VideoCatalog {
    fn videos(&self, ids: &[String]) -> Result<Vec<VideoMetadata>, ApiError>;
    /// category id -> title
    fn categories(&self, region: &str) -> Result<HashMap<String, String>, ApiError>;
    /// channel id -> country code (channels without one are absent)
    fn channel_countries(&self, channel_ids: &[String]) -> Result<HashMap<String, String>, ApiError>;
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ListResponse<T> {
    items: Vec<T>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: VideoSnippet,
    content_details: ContentDetails,
    statistics: Statistics,
    topic_details: TopicDetails,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct VideoSnippet {
    category_id: String,
    default_language: String,
    default_audio_language: String,
    channel_id: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ContentDetails {
    duration: String,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct Statistics {
    view_count: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct TopicDetails {
    topic_categories: Vec<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct CategoryItem {
    id: String,
    snippet: TitleSnippet,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct TitleSnippet {
    title: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ChannelItem {
    id: String,
    snippet: ChannelSnippet,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ChannelSnippet {
    country: Option<String>,
}

impl From<VideoItem> for VideoMetadata {
    fn from(it: VideoItem) -> Self {
        VideoMetadata {
            video_id: it.id,
            duration_seconds: parse_iso_duration(&it.content_details.duration),
            view_count: it.statistics.view_count.and_then(|v| v.parse().ok()).unwrap_or(0),
            category_id: it.snippet.category_id,
            topic_categories: it
                .topic_details
                .topic_categories
                .iter()
                .map(|u| u.rsplit('/').next().unwrap_or(u).to_string())
                .collect(),
            default_language: it.snippet.default_language,
            default_audio_language: it.snippet.default_audio_language,
            channel_id: it.snippet.channel_id,
        }
    }
}

impl VideoCatalog for YouTubeClient {
    fn videos(&self, ids: &[String]) -> Result<Vec<VideoMetadata>, ApiError> {
        let query = [
            ("part", "snippet,contentDetails,statistics,topicDetails".to_string()),
            ("id", ids.join(",")),
        ];
        let resp: ListResponse<VideoItem> = self.get_json("videos", &query)?;
        Ok(resp.items.into_iter().map(VideoMetadata::from).collect())
    }

    fn categories(&self, region: &str) -> Result<HashMap<String, String>, ApiError> {
        let query = [("part", "snippet".to_string()), ("regionCode", region.to_string())];
        let resp: ListResponse<CategoryItem> = self.get_json("videoCategories", &query)?;
        Ok(resp.items.into_iter().filter(|c| !c.id.is_empty()).map(|c| (c.id, c.snippet.title)).collect())
    }

    fn channel_countries(&self, channel_ids: &[String]) -> Result<HashMap<String, String>, ApiError> {
        let query = [("part", "snippet".to_string()), ("id", channel_ids.join(","))];
        let resp: ListResponse<ChannelItem> = self.get_json("channels", &query)?;
        Ok(resp
            .items
            .into_iter()
            .filter_map(|c| c.snippet.country.filter(|x| !x.is_empty()).map(|country| (c.id, country)))
            .collect())
    }
}

#[derive(Clone, Debug)]
pub struct EnrichOptions {
    pub batch_size: usize,
    pub attempts: u32,
    /// Sleep after failed attempt `n` (0-based) is `retry_delay * (n + 1)`.
    pub retry_delay: Duration,
    /// Pause between consecutive video batches.
    pub batch_pause: Duration,
    /// Pause between consecutive channel batches.
    pub channel_pause: Duration,
    pub region: String,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            batch_size: 50,
            attempts: 3,
            retry_delay: Duration::from_millis(1200),
            batch_pause: Duration::from_millis(800),
            channel_pause: Duration::from_millis(500),
            region: "US".to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnrichReport {
    pub rows: usize,
    pub identifiers: usize,
    /// Identifiers the catalog returned metadata for.
    pub found: usize,
    pub failed_batches: usize,
}

fn with_retries<T>(opts: &EnrichOptions, what: &str, mut op: impl FnMut() -> Result<T, ApiError>) -> Option<T> {
    let attempts = opts.attempts.max(1);
    for attempt in 0..attempts {
        match op() {
            Ok(v) => return Some(v),
            Err(e) => {
                tracing::warn!("{} attempt {}/{} failed: {}", what, attempt + 1, attempts, e);
                if attempt + 1 < attempts {
                    sleep(opts.retry_delay.saturating_mul(attempt + 1));
                }
            }
        }
    }
    None
}

/// Append [`ENRICHED_COLUMNS`] to every row of `input`, writing `output`.
/// Lookups are batched; a batch that keeps failing leaves its rows with empty
/// metadata cells rather than failing the table.
pub fn enrich_table(
    input: &Path,
    output: &Path,
    catalog: &impl VideoCatalog,
    opts: &EnrichOptions,
) -> Result<EnrichReport> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(input)
        .with_context(|| format!("open {}", input.display()))?;
    let header: Vec<String> =
        rdr.headers()?.iter().map(|h| h.trim_start_matches('\u{feff}').to_string()).collect();
    let id_col = pick_id_column(&header);
    let rows: Vec<csv::StringRecord> = rdr.records().collect::<Result<_, _>>()?;

    let mut ids: Vec<String> = Vec::new();
    let mut seen = ahash::AHashSet::new();
    for r in &rows {
        if let Some(id) = r.get(id_col).map(str::trim).filter(|s| !s.is_empty()) {
            if seen.insert(id.to_string()) {
                ids.push(id.to_string());
            }
        }
    }
    tracing::info!("{}: {} rows, {} identifiers", input.display(), rows.len(), ids.len());

    let mut report = EnrichReport { rows: rows.len(), identifiers: ids.len(), ..Default::default() };
    let categories = with_retries(opts, "videoCategories", || catalog.categories(&opts.region)).unwrap_or_default();

    let mut meta: HashMap<String, VideoMetadata> = HashMap::new();
    for (i, batch) in ids.chunks(opts.batch_size.max(1)).enumerate() {
        if i > 0 {
            sleep(opts.batch_pause);
        }
        match with_retries(opts, "videos", || catalog.videos(batch)) {
            Some(items) => meta.extend(items.into_iter().map(|m| (m.video_id.clone(), m))),
            None => report.failed_batches += 1,
        }
    }
    report.found = meta.len();

    let mut channels: Vec<String> = Vec::new();
    let mut seen_ch = ahash::AHashSet::new();
    for id in &ids {
        if let Some(m) = meta.get(id) {
            if !m.channel_id.is_empty() && seen_ch.insert(m.channel_id.clone()) {
                channels.push(m.channel_id.clone());
            }
        }
    }
    let mut countries: HashMap<String, String> = HashMap::new();
    for (i, batch) in channels.chunks(opts.batch_size.max(1)).enumerate() {
        if i > 0 {
            sleep(opts.channel_pause);
        }
        match with_retries(opts, "channels", || catalog.channel_countries(batch)) {
            Some(map) => countries.extend(map),
            None => report.failed_batches += 1,
        }
    }

    let mut w = csv::Writer::from_path(output).with_context(|| format!("create {}", output.display()))?;
    let extra: Vec<&str> = ENRICHED_COLUMNS.iter().copied().filter(|c| !header.iter().any(|h| h == c)).collect();
    w.write_record(header.iter().map(String::as_str).chain(extra.iter().copied()))?;
    for r in &rows {
        let m = r.get(id_col).map(str::trim).and_then(|id| meta.get(id));
        let cell = |col: &str| -> String {
            let Some(m) = m else { return String::new() };
            match col {
                "duration_seconds" => m.duration_seconds.to_string(),
                "view_count" => m.view_count.to_string(),
                "category_id" => m.category_id.clone(),
                "category_title" => categories.get(&m.category_id).cloned().unwrap_or_default(),
                "topic_categories" => m.topic_categories.join("|"),
                "default_language" => m.default_language.clone(),
                "default_audio_language" => m.default_audio_language.clone(),
                "channel_id" => m.channel_id.clone(),
                "channel_country" => countries.get(&m.channel_id).cloned().unwrap_or_default(),
                _ => String::new(),
            }
        };
        // columns already present in the input are overwritten in place
        let mut out: Vec<String> = header
            .iter()
            .enumerate()
            .map(|(i, h)| {
                if ENRICHED_COLUMNS.contains(&h.as_str()) && m.is_some() {
                    cell(h.as_str())
                } else {
                    r.get(i).unwrap_or("").to_string()
                }
            })
            .collect();
        out.extend(extra.iter().map(|c| cell(*c)));
        w.write_record(&out)?;
    }
    w.flush()?;
    tracing::info!("enriched {}/{} identifiers -> {}", report.found, report.identifiers, output.display());
    Ok(report)
}

/// Keep rows whose channel country is an English-speaking one and whose
/// default and default-audio languages are both English. Returns (read, kept).
pub fn english_region_filter(input: &Path, output: &Path) -> Result<(usize, usize)> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(input)
        .with_context(|| format!("open {}", input.display()))?;
    let header = rdr.headers()?.clone();
    let col = |name: &str| header.iter().position(|h| h.trim_start_matches('\u{feff}') == name);
    let (Some(country), Some(lang), Some(audio)) =
        (col("channel_country"), col("default_language"), col("default_audio_language"))
    else {
        bail!("{} lacks enriched columns; run enrichment first", input.display());
    };

    let mut w = csv::Writer::from_path(output).with_context(|| format!("create {}", output.display()))?;
    w.write_record(&header)?;
    let (mut read, mut kept) = (0usize, 0usize);
    for rec in rdr.records() {
        let rec = rec?;
        read += 1;
        let c = rec.get(country).unwrap_or("").trim().to_ascii_uppercase();
        let ok = ENGLISH_COUNTRIES.contains(&c.as_str())
            && is_english_code(rec.get(lang).unwrap_or(""))
            && is_english_code(rec.get(audio).unwrap_or(""));
        if ok {
            w.write_record(&rec)?;
            kept += 1;
        }
    }
    w.flush()?;
    tracing::info!("Filtered {} -> {} rows written to {}", read, kept, output.display());
    Ok((read, kept))
}
