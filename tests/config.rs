use cetl::{CascadePolicy, Cetl, EtlOptions, FetchPolicy, DEFAULT_API_BASE};
use std::path::Path;
use std::time::Duration;

#[test]
fn defaults_match_pipeline_layout() {
    let o = EtlOptions::default();
    assert_eq!(o.workers, 3);
    assert_eq!(o.max_retries, 5);
    assert_eq!(o.page_size, 100);
    assert_eq!(o.base_delay, Duration::from_secs(2));
    assert_eq!(o.quota_cooldown, Duration::from_secs(60));
    assert_eq!(o.quota_retry_limit, None);
    assert_eq!(o.policy, CascadePolicy::HeuristicOnly);
    assert_eq!(o.api_base, DEFAULT_API_BASE);
    assert_eq!(o.comment_dir, Path::new(".").join("video_comment"));
    assert_eq!(o.key_file, Path::new(".").join("api_keys").join("api_keys.txt"));
}

/// Re-rooting moves every stage directory; setters clamp out-of-range values.
#[test]
fn builder_overrides() {
    let o = EtlOptions::default()
        .with_base_dir("/data/run1")
        .with_page_size(500)
        .with_workers(0)
        .with_question_threshold(1.7)
        .with_api_base("http://localhost:8080/yt/");
    assert_eq!(o.id_dir, Path::new("/data/run1/video_id"));
    assert_eq!(o.filtered_dir, Path::new("/data/run1/video_comment_final"));
    assert_eq!(o.page_size, 100);
    assert_eq!(o.workers, 1);
    assert_eq!(o.question_threshold, 1.0);
    assert_eq!(o.api_base, "http://localhost:8080/yt");
}

#[test]
fn fetch_policy_follows_options() {
    let o = EtlOptions::default().with_max_retries(7).with_quota_cooldown(Duration::from_millis(5));
    let p = FetchPolicy::from(&o);
    assert_eq!(p.max_retries, 7);
    assert_eq!(p.quota_cooldown, Duration::from_millis(5));
}

#[test]
fn facade_carries_options() {
    let c = Cetl::new().base_dir("work").workers(8).policy(CascadePolicy::LenientOr).progress(false);
    assert_eq!(c.options().workers, 8);
    assert_eq!(c.options().comment_dir, Path::new("work").join("video_comment"));
    assert_eq!(c.options().policy, CascadePolicy::LenientOr);
    assert!(!c.options().progress);
}

/// Environment overrides; garbage values are ignored. The only test in this
/// binary that touches the environment.
#[test]
fn environment_overrides() {
    std::env::set_var("CETL_WORKERS", "6");
    std::env::set_var("CETL_MAX_RETRIES", "lots");
    std::env::set_var("CETL_QUOTA_COOLDOWN_SECS", "5");
    std::env::set_var("QUESTION_THRESHOLD", "0.65");
    let o = EtlOptions::from_env();
    assert_eq!(o.workers, 6);
    assert_eq!(o.max_retries, 5);
    assert_eq!(o.quota_cooldown, Duration::from_secs(5));
    assert_eq!(o.question_threshold, 0.65);
}
