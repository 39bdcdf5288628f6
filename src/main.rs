use anyhow::Result;
use cetl::{
    english_region_filter, export_comments, extract_first_column, init_tracing_once, scale_column, CascadePolicy, Cetl,
    CountLabels, EtlOptions, DEFAULT_SCALE_COLUMN, DEFAULT_SCALE_DIVISOR,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "cetl", version, about = "Comment acquisition, question filtering and count aggregation")]
struct Cli {
    /// Root holding the stage directories.
    #[arg(long, global = true, default_value = ".")]
    base_dir: PathBuf,

    /// Key file (default: <base-dir>/api_keys/api_keys.txt).
    #[arg(long, global = true)]
    keys: Option<PathBuf>,

    /// Filtered comment directory written by `filter` and counted by `merge`
    /// (default: <base-dir>/video_comment_final).
    #[arg(long, global = true)]
    filtered_dir: Option<PathBuf>,

    /// Concurrent fetch workers.
    #[arg(long, global = true, env = "CETL_WORKERS")]
    workers: Option<usize>,

    /// Threads for the local filter/count jobs.
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[arg(long, global = true)]
    no_progress: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract video ids from every CSV under video_csv/.
    ExtractIds,
    /// Fetch comments for every pending id.
    Fetch {
        #[arg(long, env = "CETL_MAX_RETRIES")]
        max_retries: Option<u32>,
        #[arg(long, env = "CETL_QUOTA_COOLDOWN_SECS")]
        quota_cooldown_secs: Option<u64>,
        /// Write `<id>.empty` markers for ids that settle with no comments.
        #[arg(long)]
        record_empty: bool,
    },
    /// Run the filter cascade over the raw comments.
    Filter {
        #[arg(long, default_value = "heuristic-only")]
        policy: CascadePolicy,
        #[arg(long)]
        min_words: Option<usize>,
        #[arg(long, env = "QUESTION_THRESHOLD")]
        threshold: Option<f64>,
    },
    /// English-only pass with a per-video summary table.
    Language {
        #[arg(long, default_value = "video_comment_english")]
        out_dir: PathBuf,
        #[arg(long, default_value = "video_comment_english_summary.csv")]
        summary: PathBuf,
    },
    /// Count both stages and write the merged table.
    Merge {
        #[arg(long, default_value = "video_comment_merged_counts.csv")]
        out: PathBuf,
    },
    /// Keep rows whose filtered/raw ratio reaches the threshold.
    Ratio {
        #[arg(long, default_value = "video_comment_merged_counts.csv")]
        counts: PathBuf,
        #[arg(long, default_value_t = 0.8)]
        threshold: f64,
        #[arg(long, default_value = "video_comment_ratio_ge_0.8.csv")]
        out: PathBuf,
    },
    /// Keep rows in the top fraction of both counts.
    Overlap {
        #[arg(long, default_value = "video_comment_merged_counts.csv")]
        counts: PathBuf,
        #[arg(long, default_value_t = 0.8)]
        percent: f64,
        #[arg(long, default_value = "video_comment_top80_percent_overlap.csv")]
        out: PathBuf,
    },
    /// Divide one numeric column by a constant.
    Scale {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, default_value = DEFAULT_SCALE_COLUMN)]
        column: String,
        #[arg(long, default_value_t = DEFAULT_SCALE_DIVISOR)]
        divisor: f64,
    },
    /// Flatten a comment directory into one `video_id,comment` CSV.
    Export {
        /// Directory to export (default: the filtered directory).
        #[arg(long)]
        from: Option<PathBuf>,
        #[arg(long, default_value = "comments_export.csv")]
        out: PathBuf,
    },
    /// Write the first column of a CSV (header skipped) one value per line.
    FirstColumn {
        input: PathBuf,
        output: PathBuf,
    },
    /// Append video metadata columns to a table.
    Enrich {
        #[arg(long, default_value = "video_comment_top80_percent_overlap.csv")]
        input: PathBuf,
        #[arg(long, default_value = "video_comment_top80_percent_overlap_enriched.csv")]
        output: PathBuf,
    },
    /// Keep enriched rows from English-speaking channels with English metadata.
    RegionFilter {
        #[arg(long, default_value = "video_comment_top80_percent_overlap_enriched.csv")]
        input: PathBuf,
        #[arg(long, default_value = "video_comment_top80_percent_overlap_enriched_english_country_strict.csv")]
        output: PathBuf,
    },
    /// Numeric content of the summary plots, as JSON.
    Report {
        #[arg(long, default_value = "video_comment_merged_counts.csv")]
        counts: PathBuf,
        #[arg(long, default_value = "video_comment_report.json")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    init_tracing_once();
    let cli = Cli::parse();
    let base = cli.base_dir.clone();

    let mut opts = EtlOptions::from_env().with_base_dir(&base).with_progress(!cli.no_progress);
    if let Some(k) = &cli.keys {
        opts = opts.with_key_file(k);
    }
    if let Some(n) = cli.workers {
        opts = opts.with_workers(n);
    }
    if let Some(n) = cli.threads {
        opts = opts.with_parallelism(n);
    }
    if let Some(d) = &cli.filtered_dir {
        opts = opts.with_filtered_dir(base.join(d));
    }
    let labels = CountLabels::default();

    match cli.cmd {
        Command::ExtractIds => {
            let r = Cetl::with_options(opts).extract_ids()?;
            println!("Extracted {} unique ids from {} tables", r.unique, r.per_table.len());
        }
        Command::Fetch { max_retries, quota_cooldown_secs, record_empty } => {
            if let Some(n) = max_retries {
                opts = opts.with_max_retries(n);
            }
            if let Some(s) = quota_cooldown_secs {
                opts = opts.with_quota_cooldown(Duration::from_secs(s));
            }
            let r = Cetl::with_options(opts.with_record_empty(record_empty)).fetch_comments()?;
            println!(
                "Fetched {} ids: {} saved ({} comments), {} empty, {} failed, {} skipped",
                r.total, r.saved, r.comments, r.empty, r.failed, r.skipped
            );
        }
        Command::Filter { policy, min_words, threshold } => {
            opts = opts.with_policy(policy);
            if let Some(n) = min_words {
                opts = opts.with_min_words(n);
            }
            if let Some(t) = threshold {
                opts = opts.with_question_threshold(t);
            }
            let r = Cetl::with_options(opts).filter_comments()?;
            println!(
                "Filtered {} files: {} written ({} lines), {} empty, {} failed, {} skipped",
                r.files, r.written, r.kept_lines, r.empty, r.failed, r.skipped
            );
        }
        Command::Language { out_dir, summary } => {
            let rows = Cetl::with_options(opts).language_summary(&base.join(out_dir), &base.join(&summary))?;
            println!("Summarised {} videos -> {}", rows.len(), summary.display());
        }
        Command::Merge { out } => {
            let rows = Cetl::with_options(opts).merge_counts(&base.join(&out), &labels)?;
            println!("Merged {} videos -> {}", rows.len(), out.display());
        }
        Command::Ratio { counts, threshold, out } => {
            let kept = Cetl::with_options(opts).select_ratio(&base.join(counts), &base.join(&out), threshold, &labels)?;
            println!("{} videos with ratio >= {} -> {}", kept.len(), threshold, out.display());
        }
        Command::Overlap { counts, percent, out } => {
            let o = Cetl::with_options(opts).select_overlap(&base.join(counts), &base.join(&out), percent, &labels)?;
            println!("{} videos within rank {} on both counts -> {}", o.rows.len(), o.cutoff, out.display());
        }
        Command::Scale { input, output, column, divisor } => {
            let n = scale_column(&base.join(input), &base.join(&output), &column, divisor)?;
            println!("Scaled {} rows -> {}", n, output.display());
        }
        Command::Export { from, out } => {
            let n = match from {
                Some(dir) => export_comments(&base.join(dir), &base.join(&out))?,
                None => Cetl::with_options(opts).export_comments(&base.join(&out))?,
            };
            println!("Exported {} comments -> {}", n, out.display());
        }
        Command::FirstColumn { input, output } => {
            let n = extract_first_column(&base.join(input), &base.join(&output))?;
            println!("Extracted {} values -> {}", n, output.display());
        }
        Command::Enrich { input, output } => {
            let r = Cetl::with_options(opts).enrich(&base.join(input), &base.join(&output))?;
            println!("Enriched {}/{} videos -> {}", r.found, r.identifiers, output.display());
        }
        Command::RegionFilter { input, output } => {
            let (read, kept) = english_region_filter(&base.join(input), &base.join(&output))?;
            println!("Filtered {} -> {} rows written to {}", read, kept, output.display());
        }
        Command::Report { counts, out } => {
            let r = Cetl::with_options(opts).report(&base.join(counts), &base.join(&out), &labels)?;
            println!("Report over {} videos -> {}", r.identifiers, out.display());
        }
    }
    Ok(())
}
