mod config;
mod paths;
mod lines;
mod state;
mod util;
mod progress;

mod ids;
mod api;
mod youtube;
mod credentials;
mod fetch;
mod bulk;

mod filters;
mod models;
mod cascade;

mod aggregate;
mod stats;
mod metadata;
mod report;
mod pipeline;

pub use crate::config::{EtlOptions, DEFAULT_API_BASE, DEFAULT_HF_MODEL_URL};
pub use crate::pipeline::Cetl;

// Stage files and their on-disk state.
pub use crate::lines::{count_file_lines, read_trimmed_lines, write_lines_atomic, StagedLineWriter};
pub use crate::paths::{discover_stage_files, empty_marker_path, list_files_with_ext, output_path, StageFile};
pub use crate::state::{partition_pending, stage_state, StageState};
pub use crate::util::{init_tracing_once, mask_credential};
pub use crate::progress::make_count_progress;

// Acquisition.
pub use crate::ids::{extract_first_column, extract_id_tables, extract_ids_from_csv, pick_id_column, read_identifiers, IdExtractReport, COMBINED_IDS_FILE};
pub use crate::api::{ApiConnector, ApiError, CommentApi, CommentPage, ErrorClass};
pub use crate::youtube::{classify_status, YouTubeClient, YouTubeConnector};
pub use crate::credentials::{load_credentials, CredentialPool, PoolError};
pub use crate::fetch::{backoff_delay, normalize_comment, FetchEnd, FetchOutcome, FetchPolicy, Fetcher};
pub use crate::bulk::{BulkFetch, BulkReport};

// Filtering.
pub use crate::filters::{
    clean_text, is_english_code, is_question_shape, word_count, LexicalEnglish, QuestionShape, StatisticalEnglish,
    TextClassifier,
};
pub use crate::models::{
    extract_label_score, predictions_for, Detection, HfInferenceModel, LabelScore, LanguageDetector, ModelError,
    NeuralQuestion, QuestionModel, WhatlangDetector,
};
pub use crate::cascade::{
    dedup_preserving_order, export_comments, filter_stage, language_summary, Cascade, CascadePolicy, FilterReport, LanguageRow,
};

// Counting, subsets and reporting.
pub use crate::aggregate::{
    count_lines, format_ratio, merge_counts, read_count_table, write_count_table, CountLabels, CountRow, TOTAL_ROW,
};
pub use crate::stats::{
    rank_overlap, rank_positions, ratio_filter, scale_column, write_overlap_table, write_ratio_table, RankOverlap,
    RankedRow, DEFAULT_SCALE_COLUMN, DEFAULT_SCALE_DIVISOR,
};
pub use crate::metadata::{
    english_region_filter, enrich_table, parse_iso_duration, EnrichOptions, EnrichReport, VideoCatalog, VideoMetadata,
    ENGLISH_COUNTRIES, ENRICHED_COLUMNS,
};
pub use crate::report::{build_report, histogram, mean, percentile, write_report, Histogram, RatioSummary, Report};
