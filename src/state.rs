//! Per-identifier stage state, derived from what exists on disk.
//!
//! A finished output file is the "done" marker. Empty results leave no output
//! file unless the job opts into `.empty` markers, in which case the identifier
//! is reported as `DoneEmpty` and skipped like any other finished one.
//! In-progress work lives only in the `_staging` directory and is invisible here.

use crate::paths::{empty_marker_path, output_path};
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageState {
    Pending,
    Done,
    DoneEmpty,
}

impl StageState {
    pub fn is_done(self) -> bool {
        !matches!(self, StageState::Pending)
    }
}

pub fn stage_state(dir: &Path, identifier: &str) -> StageState {
    if output_path(dir, identifier).exists() {
        StageState::Done
    } else if empty_marker_path(dir, identifier).exists() {
        StageState::DoneEmpty
    } else {
        StageState::Pending
    }
}

/// Split `ids` into (already processed, pending) for the stage at `dir`.
pub fn partition_pending(dir: &Path, ids: &[String]) -> (Vec<String>, Vec<String>) {
    ids.iter().cloned().partition(|id| stage_state(dir, id).is_done())
}
