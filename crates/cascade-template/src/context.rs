//! The read-only context snapshot reference expressions resolve against.

use std::collections::HashMap;

use cascade_registry::Variable;
use serde_json::Value;

/// Snapshot of everything visible to the templating language during a run.
///
/// `data` is the JSON tree (`job` metadata with unwrapped variables, plus a
/// `steps` map keyed by node path); `variables` carries the live cells so a
/// sole `{# name #}` reference can hand the cell itself to a block.
#[derive(Debug, Clone)]
pub struct ContextSnapshot {
  data: Value,
  variables: HashMap<String, Variable>,
}

impl ContextSnapshot {
  pub fn new(data: Value, variables: HashMap<String, Variable>) -> Self {
    Self { data, variables }
  }

  /// An empty snapshot, mostly useful in tests.
  pub fn empty() -> Self {
    Self {
      data: serde_json::json!({ "job": { "variables": {}, "parameters": {} }, "steps": {} }),
      variables: HashMap::new(),
    }
  }

  pub fn data(&self) -> &Value {
    &self.data
  }

  /// The `steps` subtree (`{: :}` root).
  pub fn steps(&self) -> &Value {
    self.data.get("steps").unwrap_or(&Value::Null)
  }

  /// The job parameters subtree (`{< >}` root).
  pub fn job_parameters(&self) -> &Value {
    self
      .data
      .get("job")
      .and_then(|job| job.get("parameters"))
      .unwrap_or(&Value::Null)
  }

  /// The live cell behind a job variable (`{# #}` root).
  pub fn variable(&self, name: &str) -> Option<&Variable> {
    self.variables.get(name)
  }
}
