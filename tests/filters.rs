#[path = "common/mod.rs"]
mod common;

use cetl::{
    dedup_preserving_order, filter_stage, is_english_code, is_question_shape, word_count, Cascade, CascadePolicy,
    LexicalEnglish, StatisticalEnglish, TextClassifier,
};
use common::*;
use std::sync::atomic::Ordering;

fn lines(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

#[test]
fn question_shape() {
    assert!(is_question_shape("Why is the sky blue?"));
    assert!(is_question_shape("how do you get that sound"));
    assert!(is_question_shape("Can you explain the second part"));
    assert!(is_question_shape("i wonder who wrote this"));
    assert!(!is_question_shape("I love this song"));
    assert!(!is_question_shape("   "));
}

#[test]
fn counts_words() {
    assert_eq!(word_count("Why is the sky blue?"), 5);
    assert_eq!(word_count("  "), 0);
}

#[test]
fn english_codes() {
    assert!(is_english_code("en"));
    assert!(is_english_code("EN-gb"));
    assert!(is_english_code("eng"));
    assert!(!is_english_code("es"));
    assert!(!is_english_code(""));
}

/// Stage A: common-word overlap accepts plain English and rejects text with
/// many non-ASCII characters or no English vocabulary.
#[test]
fn lexical_english() {
    let lex = LexicalEnglish::default();
    assert!(lex.accepts("Why is the sky blue?"));
    assert!(lex.accepts("what do you think about the new album"));
    assert!(!lex.accepts("¿Por qué el cielo es azul?"));
    assert!(!lex.accepts("xyzzy plugh frobozz"));
    assert!(!lex.accepts("the"));
}

/// Stage B: detector verdict with a hint-word rescue band.
#[test]
fn statistical_english() {
    let confident = StatisticalEnglish::new(always_english());
    assert!(confident.accepts("this is a perfectly normal sentence"));
    assert!(!confident.accepts("too short here"));

    let french = StatisticalEnglish::new(FnDetector(|_: &str| detection("fr", 0.99, true)));
    assert!(!french.accepts("this is a perfectly normal sentence"));

    let unsure = StatisticalEnglish::new(FnDetector(|_: &str| detection("en", 0.75, false)));
    assert!(unsure.accepts("what is this song and how"));
    assert!(!unsure.accepts("lorem ipsum dolor sit amet"));

    let silent = StatisticalEnglish::new(FnDetector(|_: &str| None));
    assert!(!silent.accepts("this is a perfectly normal sentence"));
}

#[test]
fn dedup_keeps_first_occurrence() {
    let out = dedup_preserving_order(lines(&["b", "a", "b", "c", "a"]));
    assert_eq!(out, vec!["b", "a", "c"]);
}

#[test]
fn policy_names_parse() {
    assert_eq!("strict".parse::<CascadePolicy>().unwrap(), CascadePolicy::StrictAnd);
    assert_eq!("lenient_or".parse::<CascadePolicy>().unwrap(), CascadePolicy::LenientOr);
    assert_eq!(CascadePolicy::LexicalNeural.to_string().parse::<CascadePolicy>().unwrap(), CascadePolicy::LexicalNeural);
    assert!("sometimes".parse::<CascadePolicy>().is_err());
}

/// Heuristic cascade: word gate, lexical English, question shape, dedup.
#[test]
fn heuristic_only_selects_english_questions() {
    let input = lines(&[
        "Why is the sky blue?",
        "Hi?",
        "I love this song so much",
        "Why is the sky blue?",
        "¿Por qué el cielo es azul?",
        "how do you play the intro",
    ]);
    let kept = Cascade::new(CascadePolicy::HeuristicOnly).select(&input).unwrap();
    assert_eq!(kept, vec!["Why is the sky blue?", "how do you play the intro"]);
}

/// Detector English AND question shape; statements are dropped even when
/// the detector is sure they are English.
#[test]
fn lexical_statistical_requires_question_shape() {
    let detector = FnDetector(|t: &str| {
        if t.contains("der") { detection("de", 0.95, true) } else { detection("en", 0.95, true) }
    });
    let input = lines(&[
        "this is the best song of the whole year",
        "what do you think about the new album",
        "wer der schnelle braune Fuchs springt",
        "the end",
    ]);
    let kept = Cascade::new(CascadePolicy::LexicalStatistical).detector(detector).select(&input).unwrap();
    assert_eq!(kept, vec!["what do you think about the new album"]);
}

/// A detector with no verdict hands the decision to the lexical check.
#[test]
fn silent_detector_falls_back_to_lexical() {
    let input = lines(&[
        "what do you think about the new album",
        "was ist das für ein schönes Lied?",
        "this is the best song of the whole year",
    ]);
    let kept = Cascade::new(CascadePolicy::LexicalStatistical)
        .detector(FnDetector(|_: &str| None))
        .select(&input)
        .unwrap();
    assert_eq!(kept, vec!["what do you think about the new album"]);

    let silent = StatisticalEnglish::new(FnDetector(|_: &str| None));
    assert_eq!(silent.verdict("what do you think about the new album"), None);
    assert_eq!(silent.verdict("too short"), Some(false));
}

/// Neural policy: the model decides; where it cannot, question shape does.
#[test]
fn lexical_neural_falls_back_to_shape() {
    let model = FnModel::new(|t: &str| {
        if t.contains("please") {
            label("question", 0.9)
        } else if t.contains("sky") {
            label("statement", 0.9)
        } else {
            None
        }
    });
    let input = lines(&[
        "Why is the sky blue?",
        "please tell me the name of this song",
        "what do you think about the new album",
        "this is the best song of the year",
    ]);
    let kept = Cascade::new(CascadePolicy::LexicalNeural).model(model, 0.8).select(&input).unwrap();
    assert_eq!(kept, vec!["please tell me the name of this song", "what do you think about the new album"]);
}

/// Low model confidence is a "no".
#[test]
fn neural_threshold_applies() {
    let model = FnModel::new(|_: &str| label("question", 0.6));
    let input = lines(&["please tell me the name of this song"]);
    let kept = Cascade::new(CascadePolicy::LexicalNeural).model(model, 0.8).select(&input).unwrap();
    assert!(kept.is_empty());
}

/// A model that is down decides nothing, so shape decides everything.
#[test]
fn model_outage_degrades_to_shape() {
    let input = lines(&["what do you think about the new album", "this is the best song of the year"]);
    let kept = Cascade::new(CascadePolicy::LexicalNeural).model(DownModel, 0.8).select(&input).unwrap();
    assert_eq!(kept, vec!["what do you think about the new album"]);
}

/// Lenient: question-shaped lines pass without a model call; others need the
/// model's "question".
#[test]
fn lenient_or_consults_model_only_when_needed() {
    let model = FnModel::new(|t: &str| {
        if t.starts_with("tell me") { label("question", 0.95) } else { label("statement", 0.95) }
    });
    let seen = model.seen.clone();
    let input = lines(&[
        "Why is the sky so blue today?",
        "tell me the name of this song",
        "this is the best song ever made",
    ]);
    let kept = Cascade::new(CascadePolicy::LenientOr)
        .detector(always_english())
        .model(model, 0.8)
        .select(&input)
        .unwrap();
    assert_eq!(kept, vec!["Why is the sky so blue today?", "tell me the name of this song"]);
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

/// Strict: shape and model must both agree.
#[test]
fn strict_and_requires_both() {
    let model = FnModel::new(|t: &str| if t.contains("sky") { label("statement", 0.9) } else { None });
    let input = lines(&[
        "Why is the sky so blue today?",
        "how do you play this chord on guitar",
        "tell me the name of this song",
    ]);
    let kept = Cascade::new(CascadePolicy::StrictAnd)
        .detector(always_english())
        .model(model, 0.8)
        .select(&input)
        .unwrap();
    assert_eq!(kept, vec!["how do you play this chord on guitar"]);
}

#[test]
fn neural_policies_need_a_model() {
    assert!(Cascade::new(CascadePolicy::LexicalNeural).ensure_ready().is_err());
    assert!(Cascade::new(CascadePolicy::HeuristicOnly).ensure_ready().is_ok());
}

/// Per-identifier filter job: survivors written under the same name, empty
/// results leave no file, existing outputs are skipped on rerun.
#[test]
fn filter_stage_writes_and_skips() {
    let (_tmp, base) = temp_base();
    let raw = base.join("video_comment");
    let out = base.join("video_comment_final");
    write_lines(&raw.join("v1.txt"), &["Why is the sky blue?", "great video", "Why is the sky blue?"]);
    write_lines(&raw.join("v2.txt"), &["nice", "this is the best song of the year"]);

    let cascade = Cascade::new(CascadePolicy::HeuristicOnly);
    let r = filter_stage(&raw, &out, &cascade, false).unwrap();
    assert_eq!((r.files, r.written, r.empty, r.skipped, r.failed, r.kept_lines), (2, 1, 1, 0, 0, 1));
    assert_eq!(read_lines(&out.join("v1.txt")), vec!["Why is the sky blue?"]);
    assert!(!out.join("v2.txt").exists());

    let again = filter_stage(&raw, &out, &cascade, false).unwrap();
    assert_eq!(again.skipped, 1);
    assert_eq!(again.empty, 1);
}

#[test]
fn filter_stage_needs_input_dir() {
    let (_tmp, base) = temp_base();
    let cascade = Cascade::new(CascadePolicy::HeuristicOnly);
    assert!(filter_stage(&base.join("missing"), &base.join("out"), &cascade, false).is_err());
}
