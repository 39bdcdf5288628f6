#[path = "common/mod.rs"]
mod common;

use cetl::{export_comments, language_summary, Cetl, StatisticalEnglish};
use common::*;
use std::fs;

/// English lines are written per identifier and tabulated; an identifier with
/// no English lines gets a summary row but no output file.
#[test]
fn summarises_english_share() {
    let (_tmp, base) = temp_base();
    let raw = base.join("video_comment");
    let out = base.join("video_comment_english");
    let summary = base.join("summary.csv");
    write_lines(
        &raw.join("v1.txt"),
        &["the song is really good today", "das Lied ist heute wirklich gut", "the drums are great in this one"],
    );
    write_lines(&raw.join("v2.txt"), &["das Lied ist heute wirklich gut"]);

    let detector = FnDetector(|t: &str| {
        if t.starts_with("das") { detection("de", 0.99, true) } else { detection("en", 0.99, true) }
    });
    let classifier = StatisticalEnglish::new(detector);
    let rows = language_summary(&raw, &out, &classifier, &summary).unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!((rows[0].total, rows[0].english), (3, 2));
    assert_eq!((rows[1].total, rows[1].english), (1, 0));
    assert_eq!(read_lines(&out.join("v1.txt")).len(), 2);
    assert!(!out.join("v2.txt").exists());

    let text = fs::read_to_string(&summary).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "video_id,total_comments,english_comments,english_ratio");
    assert_eq!(lines[1], "v1,3,2,0.666667");
    assert_eq!(lines[2], "v2,1,0,0.000000");
}

/// Every trimmed non-empty line becomes one `video_id,comment` row, files in
/// identifier order; commas inside a comment are quoted.
#[test]
fn exports_comment_table() {
    let (_tmp, base) = temp_base();
    let dir = base.join("video_comment_final");
    write_lines(&dir.join("v2.txt"), &["  why is this so good?  ", "", "how, exactly?"]);
    write_lines(&dir.join("v1.txt"), &["what key is this in"]);

    let out = base.join("comments_export.csv");
    assert_eq!(Cetl::new().base_dir(&base).progress(false).export_comments(&out).unwrap(), 3);

    let mut rdr = csv::Reader::from_path(&out).unwrap();
    let header: Vec<String> = rdr.headers().unwrap().iter().map(str::to_string).collect();
    assert_eq!(header, vec!["video_id", "comment"]);
    let rows: Vec<(String, String)> =
        rdr.records().map(|r| r.unwrap()).map(|r| (r[0].to_string(), r[1].to_string())).collect();
    assert_eq!(
        rows,
        vec![
            ("v1".to_string(), "what key is this in".to_string()),
            ("v2".to_string(), "why is this so good?".to_string()),
            ("v2".to_string(), "how, exactly?".to_string()),
        ]
    );
    assert!(fs::read_to_string(&out).unwrap().contains("\"how, exactly?\""));
}

/// Nothing to export: no file is created.
#[test]
fn empty_export_writes_nothing() {
    let (_tmp, base) = temp_base();
    let dir = base.join("empty");
    fs::create_dir_all(&dir).unwrap();
    let out = base.join("comments_export.csv");
    assert_eq!(export_comments(&dir, &out).unwrap(), 0);
    assert_eq!(export_comments(&base.join("missing"), &out).unwrap(), 0);
    assert!(!out.exists());
}
