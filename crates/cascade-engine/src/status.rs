//! Node and job status codes.

use std::fmt;

use serde_json::{json, Value};

/// Terminal status of a single node for one run.
///
/// Only `Done` and `IfConditionFailed` leave the run healthy; every other
/// post-run status marks the run as failed. `None` means the node has not
/// been processed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NodeStatus {
  /// Not processed yet.
  #[default]
  None,
  /// Exited without any errors.
  Done,
  /// Skipped because an earlier node failed and this one is not forced.
  Skipped,
  /// Any uncaught block or resolution failure.
  UnhandledException,
  /// The action does not name a registered block.
  BlockNotFound,
  /// The block rejected an argument as semantically invalid.
  InvalidArgument,
  /// The node's explicit id collides with a sibling's.
  DuplicateStepIds,
  /// The block's tags are not all present on the job.
  ForbiddenBlock,
  /// The block's per-job usage ceiling was exceeded.
  BlockLimitExceed,
  /// Argument-schema validation failed.
  InvalidType,
  /// The job-wide step-count ceiling was exceeded.
  StepLimitExceed,
  /// The if-condition resolved false; not a failure.
  IfConditionFailed,
  /// A block aborted the whole run.
  KilledManually,
}

impl NodeStatus {
  /// Numeric code, stable across releases (exposed in context snapshots).
  pub fn code(&self) -> i16 {
    match self {
      NodeStatus::None => -1,
      NodeStatus::Done => 0,
      NodeStatus::Skipped => 100,
      NodeStatus::UnhandledException => 101,
      NodeStatus::BlockNotFound => 102,
      NodeStatus::InvalidArgument => 103,
      NodeStatus::DuplicateStepIds => 104,
      NodeStatus::ForbiddenBlock => 105,
      NodeStatus::BlockLimitExceed => 106,
      NodeStatus::InvalidType => 107,
      NodeStatus::StepLimitExceed => 108,
      NodeStatus::IfConditionFailed => 110,
      NodeStatus::KilledManually => 111,
    }
  }

  pub fn name(&self) -> &'static str {
    match self {
      NodeStatus::None => "NONE",
      NodeStatus::Done => "DONE",
      NodeStatus::Skipped => "SKIPPED",
      NodeStatus::UnhandledException => "UNHANDLED_EXCEPTION",
      NodeStatus::BlockNotFound => "BLOCK_NOT_FOUND",
      NodeStatus::InvalidArgument => "INVALID_ARGUMENT",
      NodeStatus::DuplicateStepIds => "DUPLICATE_STEP_IDS",
      NodeStatus::ForbiddenBlock => "FORBIDDEN_BLOCK",
      NodeStatus::BlockLimitExceed => "BLOCK_LIMIT_EXCEED",
      NodeStatus::InvalidType => "INVALID_TYPE",
      NodeStatus::StepLimitExceed => "STEP_LIMIT_EXCEED",
      NodeStatus::IfConditionFailed => "IF_CONDITION_FAILED",
      NodeStatus::KilledManually => "KILLED_MANUALLY",
    }
  }

  /// Whether this status fails the run it occurs in.
  pub fn is_failure(&self) -> bool {
    !matches!(
      self,
      NodeStatus::None | NodeStatus::Done | NodeStatus::IfConditionFailed
    )
  }

  /// The `{ name, value }` form used in context snapshots.
  pub fn context_value(&self) -> Value {
    json!({ "name": self.name(), "value": self.code() })
  }
}

impl fmt::Display for NodeStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.name(), self.code())
  }
}

/// Lifecycle of a job object across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
  /// Never run.
  #[default]
  Idle,
  Running,
  Succeeded,
  Failed,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_failure_classification() {
    assert!(!NodeStatus::Done.is_failure());
    assert!(!NodeStatus::IfConditionFailed.is_failure());
    assert!(!NodeStatus::None.is_failure());
    assert!(NodeStatus::Skipped.is_failure());
    assert!(NodeStatus::BlockNotFound.is_failure());
    assert!(NodeStatus::KilledManually.is_failure());
  }

  #[test]
  fn test_context_value_shape() {
    let value = NodeStatus::IfConditionFailed.context_value();
    assert_eq!(value["name"], "IF_CONDITION_FAILED");
    assert_eq!(value["value"], 110);
  }
}
