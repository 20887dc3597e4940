//! Resolved block arguments.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::BlockError;
use crate::variable::Variable;

/// A single resolved argument: either a plain value or a variable cell.
///
/// The scheduler unwraps cells into plain values for parameters that are not
/// declared with the `Variable` type tag, so blocks only ever see a cell when
/// they asked for one.
#[derive(Debug, Clone)]
pub enum Argument {
  Value(Value),
  Variable(Variable),
}

impl Argument {
  /// The plain value, unwrapping a cell if necessary.
  pub fn to_value(&self) -> Value {
    match self {
      Argument::Value(value) => value.clone(),
      Argument::Variable(cell) => cell.get(),
    }
  }

  pub fn as_variable(&self) -> Option<&Variable> {
    match self {
      Argument::Variable(cell) => Some(cell),
      Argument::Value(_) => None,
    }
  }
}

impl From<Value> for Argument {
  fn from(value: Value) -> Self {
    Argument::Value(value)
  }
}

/// The keyword arguments handed to a block function, after reference
/// resolution and schema validation.
#[derive(Debug, Clone, Default)]
pub struct BlockArgs {
  args: HashMap<String, Argument>,
}

impl BlockArgs {
  pub fn new(args: HashMap<String, Argument>) -> Self {
    Self { args }
  }

  pub fn get(&self, name: &str) -> Option<&Argument> {
    self.args.get(name)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.args.contains_key(name)
  }

  pub fn len(&self) -> usize {
    self.args.len()
  }

  pub fn is_empty(&self) -> bool {
    self.args.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &Argument)> {
    self.args.iter()
  }

  /// A required argument as a plain value.
  pub fn value(&self, name: &str) -> Result<Value, BlockError> {
    self
      .args
      .get(name)
      .map(Argument::to_value)
      .ok_or_else(|| BlockError::invalid_argument(format!("missing parameter '{}'", name)))
  }

  /// A required argument as a variable cell.
  pub fn variable(&self, name: &str) -> Result<Variable, BlockError> {
    match self.args.get(name) {
      Some(Argument::Variable(cell)) => Ok(cell.clone()),
      Some(Argument::Value(_)) => Err(BlockError::invalid_argument(format!(
        "parameter '{}' is not a variable",
        name
      ))),
      None => Err(BlockError::invalid_argument(format!(
        "missing parameter '{}'",
        name
      ))),
    }
  }

  pub fn string(&self, name: &str) -> Result<String, BlockError> {
    match self.value(name)? {
      Value::String(text) => Ok(text),
      other => Err(BlockError::invalid_argument(format!(
        "parameter '{}' expected a string, got {}",
        name, other
      ))),
    }
  }

  pub fn i64(&self, name: &str) -> Result<i64, BlockError> {
    self.value(name)?.as_i64().ok_or_else(|| {
      BlockError::invalid_argument(format!("parameter '{}' expected an integer", name))
    })
  }

  pub fn f64(&self, name: &str) -> Result<f64, BlockError> {
    self.value(name)?.as_f64().ok_or_else(|| {
      BlockError::invalid_argument(format!("parameter '{}' expected a number", name))
    })
  }

  pub fn bool(&self, name: &str) -> Result<bool, BlockError> {
    self.value(name)?.as_bool().ok_or_else(|| {
      BlockError::invalid_argument(format!("parameter '{}' expected a boolean", name))
    })
  }
}

impl FromIterator<(String, Argument)> for BlockArgs {
  fn from_iter<T: IntoIterator<Item = (String, Argument)>>(iter: T) -> Self {
    Self {
      args: iter.into_iter().collect(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn args() -> BlockArgs {
    [
      ("count".to_string(), Argument::Value(json!(3))),
      ("name".to_string(), Argument::Value(json!("alice"))),
      (
        "items".to_string(),
        Argument::Variable(Variable::new(json!([1]))),
      ),
    ]
    .into_iter()
    .collect()
  }

  #[test]
  fn test_typed_getters() {
    let args = args();
    assert_eq!(args.i64("count").unwrap(), 3);
    assert_eq!(args.string("name").unwrap(), "alice");
    assert!(args.i64("name").is_err());
    assert!(args.value("missing").is_err());
  }

  #[test]
  fn test_variable_getter() {
    let args = args();
    let cell = args.variable("items").unwrap();
    cell.update(|v| v.as_array_mut().unwrap().push(json!(2)));
    assert_eq!(args.value("items").unwrap(), json!([1, 2]));
    assert!(args.variable("count").is_err());
  }
}
