#[path = "common/mod.rs"]
mod common;

use cetl::{extract_label_score, predictions_for, LabelScore, NeuralQuestion};
use common::*;
use serde_json::json;

fn ls(label: &str, score: f64) -> LabelScore {
    LabelScore { label: label.to_string(), score }
}

/// Text-classification and zero-shot response shapes both yield the top label.
#[test]
fn reads_label_and_score() {
    assert_eq!(extract_label_score(&json!({"label": "question", "score": 0.91})), Some(ls("question", 0.91)));
    assert_eq!(
        extract_label_score(&json!([{"label": "statement", "score": 0.7}, {"label": "question", "score": 0.3}])),
        Some(ls("statement", 0.7))
    );
    assert_eq!(
        extract_label_score(&json!({"sequence": "why?", "labels": ["question", "statement"], "scores": [0.8, 0.2]})),
        Some(ls("question", 0.8))
    );
    assert_eq!(extract_label_score(&json!({"error": "loading"})), None);
    assert_eq!(extract_label_score(&json!("question")), None);
}

/// One prediction per input when the batch shape matches; otherwise nothing.
#[test]
fn spreads_batch_predictions() {
    let body = json!([
        {"labels": ["question", "statement"], "scores": [0.9, 0.1]},
        {"labels": ["statement", "question"], "scores": [0.6, 0.4]},
    ]);
    assert_eq!(predictions_for(&body, 2), vec![Some(ls("question", 0.9)), Some(ls("statement", 0.6))]);
    assert_eq!(predictions_for(&body, 3), vec![None, None, None]);

    let single = json!({"labels": ["question"], "scores": [0.99]});
    assert_eq!(predictions_for(&single, 1), vec![Some(ls("question", 0.99))]);
}

/// Decisions are batched; outages and missing predictions become `None`.
#[test]
fn neural_decisions() {
    let model = FnModel::new(|t: &str| match t {
        "q" => label("Question", 0.85),
        "low" => label("question", 0.5),
        "s" => label("statement", 0.99),
        _ => None,
    });
    let seen = model.seen.clone();
    let texts: Vec<String> = ["q", "low", "s", "other"].iter().map(|s| s.to_string()).collect();
    let n = NeuralQuestion::new(model).threshold(0.8).batch_size(3);
    assert_eq!(n.decide_batch(&texts), vec![Some(true), Some(false), Some(false), None]);
    assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), 4);

    let down = NeuralQuestion::new(DownModel);
    assert_eq!(down.decide_batch(&texts), vec![None; 4]);
}
