//! Registry and block error types.

/// Errors raised while registering blocks.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
  /// A block with the same display name is already registered.
  #[error("the block named '{display_name}' already exists")]
  DuplicateBlock { display_name: String },

  /// Block and category names must not contain dots.
  #[error("invalid block name '{name}': names and categories can't contain dots")]
  InvalidName { name: String },
}

/// Argument-schema validation failures; the scheduler maps these to the
/// INVALID_TYPE node status.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
  #[error("missing required parameter '{name}'")]
  MissingParameter { name: String },

  #[error("unexpected parameter '{name}'")]
  UnknownParameter { name: String },

  #[error("parameter '{name}' expected {expected}, got {got}")]
  TypeMismatch {
    name: String,
    expected: &'static str,
    got: String,
  },
}

/// Failures signalled by a block function itself.
///
/// These are values, not panics: the scheduler classifies each variant into a
/// node status and the run carries on (or stops) accordingly.
#[derive(Debug, thiserror::Error)]
pub enum BlockError {
  /// The arguments were well-typed but semantically unusable.
  #[error("invalid argument: {message}")]
  InvalidArgument { message: String },

  /// Abort the whole run, recorded as KILLED_MANUALLY.
  #[error("aborted: {message}")]
  Abort { message: String },

  /// Any other block failure, recorded as UNHANDLED_EXCEPTION.
  #[error("{message}")]
  Failed { message: String },
}

impl BlockError {
  pub fn invalid_argument(message: impl Into<String>) -> Self {
    Self::InvalidArgument {
      message: message.into(),
    }
  }

  pub fn abort(message: impl Into<String>) -> Self {
    Self::Abort {
      message: message.into(),
    }
  }

  pub fn failed(message: impl Into<String>) -> Self {
    Self::Failed {
      message: message.into(),
    }
  }
}
