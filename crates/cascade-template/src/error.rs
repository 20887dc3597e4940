//! Template resolution errors.
//!
//! These are ordinary node-level failures: the scheduler records them against
//! the node and moves on, they never escape a run.

/// Errors raised while resolving reference expressions.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
  /// A path segment did not exist in the addressed map.
  #[error("key '{key}' not found")]
  KeyNotFound { key: String },

  /// A numeric segment pointed past the end of a list or string.
  #[error("index {index} out of range (length {len})")]
  IndexOutOfRange { index: usize, len: usize },

  /// Segments touching underscores are rejected to keep references away from
  /// anything internal.
  #[error("forbidden key '{key}'")]
  ForbiddenKey { key: String },

  /// Tried to navigate into a value that has no members.
  #[error("'{segment}' cannot be looked up in a scalar value")]
  NotIndexable { segment: String },

  /// A `{# #}` reference named a variable the job does not have.
  #[error("unknown variable '{name}'")]
  UnknownVariable { name: String },
}
