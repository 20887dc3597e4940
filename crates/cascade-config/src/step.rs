use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single step definition inside a job.
///
/// `action` names the block to execute (`CATEGORY.NAME`, case-insensitive).
/// Parameter values may contain reference expressions that are resolved
/// against the run context right before the block is invoked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDef {
  pub action: String,
  /// Raw, pre-resolution keyword parameters for the block.
  #[serde(default)]
  pub parameters: Map<String, Value>,
  /// Identifier unique among siblings. Defaults to the 1-based sibling
  /// position when absent.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  /// Forced steps execute even after an earlier step has failed.
  #[serde(default)]
  pub forced: bool,
  /// An if-expression (string) or list of them (implicit AND). The step only
  /// executes when the condition resolves truthy.
  #[serde(default, rename = "if", skip_serializing_if = "Option::is_none")]
  pub condition: Option<Value>,
  /// Nested child steps, executed depth-first after this step.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub steps: Vec<StepDef>,
}

impl StepDef {
  /// Create a definition with just an action; everything else defaulted.
  pub fn new(action: impl Into<String>) -> Self {
    Self {
      action: action.into(),
      parameters: Map::new(),
      id: None,
      forced: false,
      condition: None,
      steps: Vec::new(),
    }
  }

  pub fn with_id(mut self, id: impl Into<String>) -> Self {
    self.id = Some(id.into());
    self
  }

  pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
    self.parameters.insert(name.into(), value.into());
    self
  }

  pub fn with_condition(mut self, condition: impl Into<Value>) -> Self {
    self.condition = Some(condition.into());
    self
  }

  pub fn forced(mut self) -> Self {
    self.forced = true;
    self
  }

  pub fn with_step(mut self, step: StepDef) -> Self {
    self.steps.push(step);
    self
  }
}
