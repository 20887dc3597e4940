//! Engine error types.

/// Errors raised by tree-mutation entry points.
///
/// Note that admission failures (duplicate ids, missing blocks, limits) are
/// not errors: they are recorded as the node's status so malformed jobs can
/// be inspected before running. Only API misuse surfaces here.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
  /// The parent path given to a nested attach does not exist.
  #[error("no node at path '{path}'")]
  UnknownPath { path: String },
}
