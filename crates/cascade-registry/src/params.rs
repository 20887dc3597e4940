//! Parameter schemas and argument validation.
//!
//! Every block declares its parameters once at registration time; the
//! scheduler validates resolved arguments against that schema before the
//! block function runs. Validation failures surface as the INVALID_TYPE node
//! status.

use std::collections::HashMap;

use serde_json::Value;

use crate::args::Argument;
use crate::error::ValidationError;

/// Expected shape of a parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Anything goes.
  Any,
  String,
  Number,
  Integer,
  Bool,
  List,
  Map,
  /// The parameter receives the variable cell itself rather than the
  /// unwrapped value, so the block can mutate it in place.
  Variable,
}

impl ParamType {
  fn expected(&self) -> &'static str {
    match self {
      ParamType::Any => "any value",
      ParamType::String => "a string",
      ParamType::Number => "a number",
      ParamType::Integer => "an integer",
      ParamType::Bool => "a boolean",
      ParamType::List => "a list",
      ParamType::Map => "a map",
      ParamType::Variable => "a variable",
    }
  }

  fn accepts(&self, argument: &Argument) -> bool {
    if matches!(self, ParamType::Variable) {
      return matches!(argument, Argument::Variable(_));
    }
    let value = argument.to_value();
    match self {
      ParamType::Any => true,
      ParamType::String => value.is_string(),
      ParamType::Number => value.is_number(),
      ParamType::Integer => value.is_i64() || value.is_u64(),
      ParamType::Bool => value.is_boolean(),
      ParamType::List => value.is_array(),
      ParamType::Map => value.is_object(),
      ParamType::Variable => unreachable!(),
    }
  }
}

/// How a parameter is filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamMode {
  /// Supplied by the node's (templated) parameters.
  Keyword,
  /// Auto-filled by the scheduler from the job's global values, addressed by
  /// the parameter name.
  Injected,
}

/// One entry of a block's parameter schema.
#[derive(Debug, Clone)]
pub struct ParamSpec {
  pub name: String,
  pub mode: ParamMode,
  pub required: bool,
  pub default: Option<Value>,
  pub ty: ParamType,
}

impl ParamSpec {
  pub fn keyword(name: impl Into<String>, ty: ParamType) -> Self {
    Self {
      name: name.into(),
      mode: ParamMode::Keyword,
      required: true,
      default: None,
      ty,
    }
  }

  pub fn injected(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      mode: ParamMode::Injected,
      required: false,
      default: None,
      ty: ParamType::Any,
    }
  }

  pub fn optional(mut self) -> Self {
    self.required = false;
    self
  }

  pub fn with_default(mut self, default: impl Into<Value>) -> Self {
    self.default = Some(default.into());
    self.required = false;
    self
  }
}

/// Validate resolved arguments against a schema, filling in defaults.
///
/// Injected parameters are the scheduler's responsibility and are ignored
/// here; only keyword parameters are checked. Unknown arguments are rejected
/// so typos in job definitions fail loudly instead of being dropped.
pub fn validate_args(
  specs: &[ParamSpec],
  args: &mut HashMap<String, Argument>,
) -> Result<(), ValidationError> {
  for spec in specs.iter().filter(|s| s.mode == ParamMode::Keyword) {
    match args.get(&spec.name) {
      Some(argument) => {
        if !spec.ty.accepts(argument) {
          return Err(ValidationError::TypeMismatch {
            name: spec.name.clone(),
            expected: spec.ty.expected(),
            got: argument.to_value().to_string(),
          });
        }
      }
      None => {
        if let Some(default) = &spec.default {
          args.insert(spec.name.clone(), Argument::Value(default.clone()));
        } else if spec.required {
          return Err(ValidationError::MissingParameter {
            name: spec.name.clone(),
          });
        }
      }
    }
  }
  let known = |name: &str| {
    specs
      .iter()
      .any(|s| s.mode == ParamMode::Keyword && s.name == name)
  };
  if let Some(unknown) = args.keys().find(|name| !known(name)) {
    return Err(ValidationError::UnknownParameter {
      name: unknown.clone(),
    });
  }
  Ok(())
}
