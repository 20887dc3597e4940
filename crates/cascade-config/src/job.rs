use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::step::StepDef;

/// A per-job override of a block's `max_uses` ceiling.
///
/// The pattern is a glob (`*` and `?`) matched against block display names;
/// the first matching override wins. `limit: None` lifts the cap entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitOverride {
  pub pattern: String,
  pub limit: Option<u32>,
}

/// A complete serializable job definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDef {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  /// Capability tags; a block whose tags are not all present here is
  /// forbidden for this job.
  #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
  pub tags: BTreeSet<String>,
  /// Initial job variables, wrapped into mutable cells on load.
  #[serde(default, skip_serializing_if = "Map::is_empty")]
  pub variables: Map<String, Value>,
  /// Read-only job parameters supplied by the host.
  #[serde(default, skip_serializing_if = "Map::is_empty")]
  pub local_values: Map<String, Value>,
  /// Job-wide ceiling on the total step count.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub step_limit: Option<usize>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub block_limit_overrides: Vec<LimitOverride>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub steps: Vec<StepDef>,
}

impl JobDef {
  pub fn new() -> Self {
    Self::default()
  }
}

impl Default for JobDef {
  fn default() -> Self {
    Self {
      id: None,
      name: None,
      tags: BTreeSet::new(),
      variables: Map::new(),
      local_values: Map::new(),
      step_limit: None,
      block_limit_overrides: Vec::new(),
      steps: Vec::new(),
    }
  }
}
