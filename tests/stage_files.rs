#[path = "common/mod.rs"]
mod common;

use cetl::{
    count_file_lines, discover_stage_files, make_count_progress, partition_pending, read_trimmed_lines, stage_state, write_lines_atomic,
    StageState, StagedLineWriter,
};
use common::*;
use std::fs;

/// The final file appears only after `finish`; nothing is left in staging.
#[test]
fn staged_writer_promotes_on_finish() {
    let (_tmp, base) = temp_base();
    let dest = base.join("abc.txt");

    let mut w = StagedLineWriter::create(&dest).unwrap();
    w.write_line("one").unwrap();
    assert!(!dest.exists());
    w.finish().unwrap();

    assert_eq!(read_lines(&dest), vec!["one"]);
    let leftovers = fs::read_dir(base.join("_staging")).unwrap().count();
    assert_eq!(leftovers, 0);
}

/// A writer dropped before `finish` never produces the final file, so the id
/// still counts as pending.
#[test]
fn abandoned_write_leaves_id_pending() {
    let (_tmp, base) = temp_base();
    {
        let mut w = StagedLineWriter::create(&base.join("abc.txt")).unwrap();
        w.write_line("partial").unwrap();
    }
    assert_eq!(stage_state(&base, "abc"), StageState::Pending);
}

#[test]
fn stage_state_from_disk() {
    let (_tmp, base) = temp_base();
    write_lines_atomic(&base.join("done.txt"), ["x"]).unwrap();
    fs::write(base.join("quiet.empty"), b"").unwrap();

    assert_eq!(stage_state(&base, "done"), StageState::Done);
    assert_eq!(stage_state(&base, "quiet"), StageState::DoneEmpty);
    assert_eq!(stage_state(&base, "todo"), StageState::Pending);

    let (done, pending) = partition_pending(&base, &ids(&["done", "todo", "quiet"]));
    assert_eq!(done, vec!["done", "quiet"]);
    assert_eq!(pending, vec!["todo"]);
}

/// Lines are trimmed, blanks dropped and bad UTF-8 replaced.
#[test]
fn read_lines_is_lenient() {
    let (_tmp, base) = temp_base();
    let p = base.join("v.txt");
    fs::write(&p, b"  hi there \n\n\xff\xfebroken\r\nlast").unwrap();
    let lines = read_trimmed_lines(&p).unwrap();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "hi there");
    assert!(lines[1].ends_with("broken"));
    assert_eq!(lines[2], "last");
    assert_eq!(count_file_lines(&p).unwrap(), 4);
}

/// Only `.txt` files directly in the directory are stage files.
#[test]
fn discovers_txt_files_only() {
    let (_tmp, base) = temp_base();
    write_lines(&base.join("b.txt"), &["1"]);
    write_lines(&base.join("a.txt"), &["1"]);
    write_lines(&base.join("c.csv"), &["1"]);
    write_lines(&base.join("sub").join("d.txt"), &["1"]);

    let found: Vec<String> = discover_stage_files(&base).into_iter().map(|f| f.identifier).collect();
    assert_eq!(found, vec!["a", "b"]);
    assert!(discover_stage_files(&base.join("missing")).is_empty());
}

/// Bars stand alone and count settled identifiers against the job total.
#[test]
fn count_progress_tracks_position() {
    let pb = make_count_progress(3, "Fetching comments");
    pb.inc(2);
    assert_eq!(pb.position(), 2);
    assert_eq!(pb.message(), "Fetching comments");
    pb.finish();
}
