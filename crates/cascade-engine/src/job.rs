//! The job: root of the node tree plus per-run state.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use cascade_config::{JobDef, LimitOverride, StepDef};
use cascade_registry::{pattern_match, BlockRegistry, Globals, JobView, Variables};
use cascade_template::ContextSnapshot;
use serde_json::{json, Map, Value};

use crate::error::EngineError;
use crate::events::{JobHooks, NoopHooks};
use crate::node::{Node, Nodes};
use crate::status::{JobState, NodeStatus};

/// Per-run transient state, cleared at the start of every `run()`.
#[derive(Debug, Clone, Default)]
pub(crate) struct RunState {
  pub run_id: String,
  /// Return value (or error payload) per node path.
  pub results: HashMap<String, Value>,
  /// Status per node path.
  pub statuses: HashMap<String, NodeStatus>,
  /// Declared-field snapshot per node path, captured before execution.
  pub contexts: HashMap<String, Value>,
  /// Path of the first failed node.
  pub failed_path: Option<String>,
  /// Paths of nodes attached by blocks during this run; removed again before
  /// the next run so `run()` stays repeatable.
  pub injected: Vec<String>,
}

/// A job owns a tree of nodes and executes them strictly in order.
///
/// Jobs are built against a shared, read-only [`BlockRegistry`]; admission
/// checks (missing blocks, duplicate ids, tags, usage and step ceilings) run
/// eagerly when a step is attached and are recorded as the node's status, so
/// a malformed job can be inspected before it ever runs.
pub struct Job {
  pub(crate) registry: Arc<BlockRegistry>,
  id: Option<String>,
  name: Option<String>,
  tags: BTreeSet<String>,
  pub(crate) variables: Variables,
  local_values: Map<String, Value>,
  pub(crate) globals: Globals,
  pub(crate) hooks: Arc<dyn JobHooks>,
  step_limit: Option<usize>,
  block_limit_overrides: Vec<LimitOverride>,
  debug: bool,
  pub(crate) nodes: Nodes,
  pub(crate) state: JobState,
  pub(crate) run: RunState,
}

impl Job {
  pub fn new(registry: Arc<BlockRegistry>) -> Self {
    Self {
      registry,
      id: None,
      name: None,
      tags: BTreeSet::new(),
      variables: Variables::new(),
      local_values: Map::new(),
      globals: Globals::new(),
      hooks: Arc::new(NoopHooks),
      step_limit: None,
      block_limit_overrides: Vec::new(),
      debug: false,
      nodes: Nodes::new(),
      state: JobState::Idle,
      run: RunState::default(),
    }
  }

  /// Build a job from a serializable definition, loading its steps in order.
  pub fn from_def(registry: Arc<BlockRegistry>, def: JobDef) -> Self {
    let mut job = Self::new(registry);
    job.id = def.id;
    job.name = def.name;
    job.tags = def.tags;
    job.variables = Variables::from_values(def.variables);
    job.local_values = def.local_values;
    job.step_limit = def.step_limit;
    job.block_limit_overrides = def.block_limit_overrides;
    job.load_steps(def.steps);
    job
  }

  pub fn with_id(mut self, id: impl Into<String>) -> Self {
    self.id = Some(id.into());
    self
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  pub fn with_tags<I, S>(mut self, tags: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.tags = tags.into_iter().map(Into::into).collect();
    self
  }

  /// Initial job variables; plain values are wrapped into mutable cells.
  pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
    self.variables = Variables::from_values(variables);
    self
  }

  /// Read-only job parameters, visible to `{< >}` references.
  pub fn with_local_values(mut self, local_values: Map<String, Value>) -> Self {
    self.local_values = local_values;
    self
  }

  /// Host objects injected into blocks by name, invisible to templates.
  pub fn with_globals(mut self, globals: Globals) -> Self {
    self.globals = globals;
    self
  }

  pub fn with_hooks(mut self, hooks: impl JobHooks + 'static) -> Self {
    self.hooks = Arc::new(hooks);
    self
  }

  pub fn with_step_limit(mut self, step_limit: usize) -> Self {
    self.step_limit = Some(step_limit);
    self
  }

  pub fn with_block_limit_overrides(mut self, overrides: Vec<LimitOverride>) -> Self {
    self.block_limit_overrides = overrides;
    self
  }

  /// In debug mode a missing block does not fail the node; it executes as a
  /// stub that logs its parameters instead.
  pub fn with_debug(mut self, debug: bool) -> Self {
    self.debug = debug;
    self
  }

  // ── Tree mutation ─────────────────────────────────────────

  /// Attach the steps one by one, in order.
  pub fn load_steps(&mut self, steps: Vec<StepDef>) {
    for step in steps {
      self.create_step(step);
    }
  }

  /// Attach a step at the top level; returns the new node's path.
  pub fn create_step(&mut self, def: StepDef) -> String {
    self
      .attach(None, def)
      .expect("attaching at the root cannot fail")
  }

  /// Attach a step as a child of the node at `parent`.
  pub fn create_step_in(&mut self, parent: &str, def: StepDef) -> Result<String, EngineError> {
    if self.node(parent).is_none() {
      return Err(EngineError::UnknownPath {
        path: parent.to_string(),
      });
    }
    self.attach(Some(parent), def)
  }

  pub(crate) fn attach(&mut self, parent: Option<&str>, def: StepDef) -> Result<String, EngineError> {
    let StepDef {
      action,
      parameters,
      id,
      forced,
      condition,
      steps,
    } = def;
    let action = action.to_uppercase();

    let (position, duplicate, id) = {
      let siblings = match parent {
        None => &self.nodes,
        Some(parent) => {
          &self
            .node(parent)
            .ok_or_else(|| EngineError::UnknownPath {
              path: parent.to_string(),
            })?
            .nodes
        }
      };
      let position = siblings.len() + 1;
      let id = id.unwrap_or_else(|| position.to_string());
      let duplicate = siblings.iter().any(|sibling| sibling.id == id);
      (position, duplicate, id)
    };
    let path = match parent {
      None => id.clone(),
      Some(parent) => format!("{}/{}", parent, id),
    };

    let handle = self.registry.get(&action);
    let mut debug_stub = false;
    let admission = if !handle.exists() {
      if self.debug {
        debug_stub = true;
        None
      } else {
        Some(NodeStatus::BlockNotFound)
      }
    } else if duplicate {
      Some(NodeStatus::DuplicateStepIds)
    } else {
      let descriptor = handle.block().expect("handle exists").descriptor();
      if !descriptor.exists_tags(&self.tags) {
        Some(NodeStatus::ForbiddenBlock)
      } else if self.block_limit_exceeded(&action, descriptor.max_uses()) {
        Some(NodeStatus::BlockLimitExceed)
      } else if self.step_limit.is_some_and(|limit| self.nodes.count() + 1 > limit) {
        Some(NodeStatus::StepLimitExceed)
      } else {
        None
      }
    };

    let node = Node {
      action,
      id,
      position,
      path: path.clone(),
      forced,
      parameters,
      condition,
      admission,
      debug_stub,
      nodes: Nodes::new(),
    };
    match parent {
      None => self.nodes.0.push(node),
      Some(parent) => {
        self
          .node_mut(parent)
          .expect("parent checked above")
          .nodes
          .0
          .push(node)
      }
    }
    for child in steps {
      self.attach(Some(&path), child)?;
    }
    Ok(path)
  }

  /// Remove the node at `path` (and its whole subtree).
  pub fn remove_step(&mut self, path: &str) -> bool {
    match path.rsplit_once('/') {
      None => self.nodes.remove_node(path),
      Some((parent, id)) => match self.node_mut(parent) {
        Some(parent) => parent.nodes.remove_node(id),
        None => false,
      },
    }
  }

  /// Whether attaching one more use of `action` would exceed its ceiling.
  fn block_limit_exceeded(&self, action: &str, block_max: Option<u32>) -> bool {
    let mut limit = block_max;
    for entry in &self.block_limit_overrides {
      if pattern_match(action, &entry.pattern, true) {
        limit = entry.limit;
        break;
      }
    }
    match limit {
      None => false,
      Some(limit) => self.nodes.count_action(action) as u32 + 1 > limit,
    }
  }

  // ── Addressing ────────────────────────────────────────────

  /// The node at a `/`-joined id path.
  pub fn node(&self, path: &str) -> Option<&Node> {
    let mut nodes = &self.nodes;
    let mut found = None;
    for segment in path.split('/') {
      let node = nodes.iter().find(|node| node.id == segment)?;
      nodes = &node.nodes;
      found = Some(node);
    }
    found
  }

  pub(crate) fn node_mut(&mut self, path: &str) -> Option<&mut Node> {
    let mut nodes = &mut self.nodes;
    let mut segments = path.split('/').peekable();
    while let Some(segment) = segments.next() {
      let index = nodes.0.iter().position(|node| node.id == segment)?;
      if segments.peek().is_none() {
        return Some(&mut nodes.0[index]);
      }
      nodes = &mut nodes.0[index].nodes;
    }
    None
  }

  pub(crate) fn node_at_index(&self, index: &[usize]) -> Option<&Node> {
    let (&first, rest) = index.split_first()?;
    let mut node = self.nodes.get(first)?;
    for &next in rest {
      node = node.nodes.get(next)?;
    }
    Some(node)
  }

  pub fn nodes(&self) -> &Nodes {
    &self.nodes
  }

  pub fn get_node_by_id(&self, id: &str, recursive: bool) -> Option<&Node> {
    self.nodes.get_node_by_id(id, recursive)
  }

  pub fn get_nodes_by_action(&self, action: &str, recursive: bool) -> Vec<&Node> {
    self.nodes.get_nodes_by_action(action, recursive)
  }

  // ── Introspection ─────────────────────────────────────────

  pub fn id(&self) -> Option<&str> {
    self.id.as_deref()
  }

  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  pub fn tags(&self) -> &BTreeSet<String> {
    &self.tags
  }

  pub fn registry(&self) -> &Arc<BlockRegistry> {
    &self.registry
  }

  pub fn variables(&self) -> &Variables {
    &self.variables
  }

  pub fn local_values(&self) -> &Map<String, Value> {
    &self.local_values
  }

  pub fn state(&self) -> JobState {
    self.state
  }

  /// `Some(true)` after a clean run, `Some(false)` once any node has failed,
  /// `None` before the first run reaches a verdict.
  pub fn succeeded(&self) -> Option<bool> {
    match self.state {
      JobState::Idle => None,
      JobState::Running => self.run.failed_path.as_ref().map(|_| false),
      JobState::Succeeded => Some(true),
      JobState::Failed => Some(false),
    }
  }

  /// The status of the node at `path` for the current (or last) run,
  /// falling back to its attach-time admission status.
  pub fn status_of(&self, path: &str) -> NodeStatus {
    if let Some(&status) = self.run.statuses.get(path) {
      return status;
    }
    self
      .node(path)
      .and_then(|node| node.admission)
      .unwrap_or(NodeStatus::None)
  }

  /// The recorded return value (or error payload) of the node at `path`.
  pub fn result_of(&self, path: &str) -> Option<&Value> {
    self.run.results.get(path)
  }

  pub fn results(&self) -> &HashMap<String, Value> {
    &self.run.results
  }

  pub fn statuses(&self) -> &HashMap<String, NodeStatus> {
    &self.run.statuses
  }

  /// Declared-field snapshots captured during the current (or last) run.
  pub fn contexts(&self) -> &HashMap<String, Value> {
    &self.run.contexts
  }

  /// Path of the first node that failed in the current (or last) run.
  pub fn failed_path(&self) -> Option<&str> {
    self.run.failed_path.as_deref()
  }

  pub(crate) fn job_view(&self) -> JobView {
    JobView {
      id: self.id.clone(),
      name: self.name.clone(),
      tags: self.tags.clone(),
      run_id: self.run.run_id.clone(),
    }
  }

  /// Build the read-only snapshot reference expressions resolve against.
  pub fn build_contexts(&self) -> ContextSnapshot {
    let mut steps = Map::new();
    self.collect_step_contexts(&self.nodes, &mut steps);
    let data = json!({
      "job": {
        "id": self.id,
        "name": self.name,
        "variables": self.variables.snapshot(),
        "parameters": self.local_values,
        "status": self.succeeded(),
      },
      "steps": steps,
    });
    ContextSnapshot::new(data, self.variables.cells())
  }

  fn collect_step_contexts(&self, nodes: &Nodes, out: &mut Map<String, Value>) {
    for node in nodes {
      let mut fields = node.declared_fields();
      fields["status"] = self.status_of(&node.path).context_value();
      fields["result"] = self
        .run
        .results
        .get(&node.path)
        .cloned()
        .unwrap_or(Value::Null);
      out.insert(node.path.clone(), fields);
      self.collect_step_contexts(&node.nodes, out);
    }
  }

  /// An indented textual rendering of the tree, for diagnostics.
  pub fn tree(&self) -> Vec<String> {
    let mut lines = vec![self.name.clone().unwrap_or_else(|| "Unnamed Job".to_string())];
    for node in &self.nodes {
      lines.extend(node.tree_lines(2));
    }
    lines
  }
}

// The tree can be large and the hooks are opaque, so Debug stays shallow.
impl fmt::Debug for Job {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Job")
      .field("id", &self.id)
      .field("name", &self.name)
      .field("nodes", &self.nodes.len())
      .field("state", &self.state)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use cascade_registry::{BlockDescriptor, BlockFn};
  use serde_json::json;

  fn registry() -> Arc<BlockRegistry> {
    let mut registry = BlockRegistry::new();
    registry
      .register(
        BlockDescriptor::new("logic", "noop").no_validate(),
        BlockFn::sync(|_, _| Ok(Value::Null)),
      )
      .unwrap();
    registry
      .register(
        BlockDescriptor::new("net", "send").tag("messaging").no_validate(),
        BlockFn::sync(|_, _| Ok(Value::Null)),
      )
      .unwrap();
    registry
      .register(
        BlockDescriptor::new("once", "only").with_max_uses(1).no_validate(),
        BlockFn::sync(|_, _| Ok(Value::Null)),
      )
      .unwrap();
    Arc::new(registry)
  }

  #[test]
  fn test_default_ids_and_paths() {
    let mut job = Job::new(registry());
    let first = job.create_step(StepDef::new("logic.noop"));
    let second = job.create_step(StepDef::new("logic.noop").with_id("named"));
    let child = job
      .create_step_in(&second, StepDef::new("logic.noop"))
      .unwrap();
    assert_eq!(first, "1");
    assert_eq!(second, "named");
    assert_eq!(child, "named/1");
    assert_eq!(job.node("named/1").unwrap().position(), 1);
  }

  #[test]
  fn test_duplicate_sibling_id() {
    let mut job = Job::new(registry());
    job.create_step(StepDef::new("logic.noop").with_id("x"));
    let dup = job.create_step(StepDef::new("logic.noop").with_id("x"));
    // Both land at the same path; the collision is recorded on the second.
    assert_eq!(dup, "x");
    assert_eq!(
      job.nodes().get(1).unwrap().admission(),
      Some(NodeStatus::DuplicateStepIds)
    );
  }

  #[test]
  fn test_missing_block_admission() {
    let mut job = Job::new(registry());
    let path = job.create_step(StepDef::new("no.such"));
    assert_eq!(job.status_of(&path), NodeStatus::BlockNotFound);
  }

  #[test]
  fn test_tag_admission() {
    let mut job = Job::new(registry());
    let denied = job.create_step(StepDef::new("net.send"));
    assert_eq!(job.status_of(&denied), NodeStatus::ForbiddenBlock);

    let mut tagged = Job::new(registry()).with_tags(["messaging"]);
    let allowed = tagged.create_step(StepDef::new("net.send"));
    assert_eq!(tagged.status_of(&allowed), NodeStatus::None);
  }

  #[test]
  fn test_block_usage_ceiling() {
    let mut job = Job::new(registry());
    let first = job.create_step(StepDef::new("once.only"));
    let second = job.create_step(StepDef::new("once.only"));
    assert_eq!(job.status_of(&first), NodeStatus::None);
    assert_eq!(job.status_of(&second), NodeStatus::BlockLimitExceed);
  }

  #[test]
  fn test_block_limit_override() {
    let mut job = Job::new(registry()).with_block_limit_overrides(vec![LimitOverride {
      pattern: "ONCE.*".to_string(),
      limit: None,
    }]);
    let first = job.create_step(StepDef::new("once.only"));
    let second = job.create_step(StepDef::new("once.only"));
    assert_eq!(job.status_of(&first), NodeStatus::None);
    assert_eq!(job.status_of(&second), NodeStatus::None);
  }

  #[test]
  fn test_step_limit() {
    let mut job = Job::new(registry()).with_step_limit(2);
    job.create_step(StepDef::new("logic.noop"));
    job.create_step(StepDef::new("logic.noop"));
    let third = job.create_step(StepDef::new("logic.noop"));
    assert_eq!(job.status_of(&third), NodeStatus::StepLimitExceed);
  }

  #[test]
  fn test_from_def_loads_nested_steps() {
    let def: JobDef = serde_json::from_value(json!({
      "name": "nested",
      "steps": [
        { "action": "logic.noop", "id": "outer", "steps": [{ "action": "logic.noop" }] }
      ]
    }))
    .unwrap();
    let job = Job::from_def(registry(), def);
    assert!(job.node("outer/1").is_some());
    assert_eq!(job.tree(), vec!["nested", "  LOGIC.NOOP #1", "    LOGIC.NOOP #1"]);
  }

  #[test]
  fn test_remove_step() {
    let mut job = Job::new(registry());
    let outer = job.create_step(StepDef::new("logic.noop").with_id("outer"));
    let inner = job.create_step_in(&outer, StepDef::new("logic.noop")).unwrap();
    assert!(job.remove_step(&inner));
    assert!(job.node("outer").unwrap().nodes().is_empty());
    assert!(job.remove_step(&outer));
    assert!(job.nodes().is_empty());
  }
}
