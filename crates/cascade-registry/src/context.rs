//! The invocation context handed to every block function.

use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use cascade_config::StepDef;
use serde_json::{Map, Value};

use crate::variable::Variable;

/// Handle to the job's mutable variable cells.
///
/// Cloning the handle shares the underlying map, so a block creating or
/// replacing a variable makes it visible to every later node in the run.
#[derive(Debug, Clone, Default)]
pub struct Variables(Arc<Mutex<HashMap<String, Variable>>>);

impl Variables {
  pub fn new() -> Self {
    Self::default()
  }

  /// Wrap plain values into cells, e.g. from a job definition.
  pub fn from_values(values: Map<String, Value>) -> Self {
    let cells = values
      .into_iter()
      .map(|(name, value)| (name, Variable::new(value)))
      .collect();
    Self(Arc::new(Mutex::new(cells)))
  }

  pub fn get(&self, name: &str) -> Option<Variable> {
    self.0.lock().expect("variables lock poisoned").get(name).cloned()
  }

  /// Create a variable (or replace an existing cell) with a fresh cell.
  pub fn define(&self, name: impl Into<String>, value: impl Into<Value>) {
    self
      .0
      .lock()
      .expect("variables lock poisoned")
      .insert(name.into(), Variable::new(value));
  }

  pub fn remove(&self, name: &str) -> Option<Variable> {
    self.0.lock().expect("variables lock poisoned").remove(name)
  }

  pub fn names(&self) -> Vec<String> {
    let mut names: Vec<String> = self
      .0
      .lock()
      .expect("variables lock poisoned")
      .keys()
      .cloned()
      .collect();
    names.sort();
    names
  }

  /// All cells, cloned out of the lock.
  pub fn cells(&self) -> HashMap<String, Variable> {
    self.0.lock().expect("variables lock poisoned").clone()
  }

  /// A plain-value snapshot of every variable, for context building.
  pub fn snapshot(&self) -> Map<String, Value> {
    self
      .0
      .lock()
      .expect("variables lock poisoned")
      .iter()
      .map(|(name, cell)| (name.clone(), cell.get()))
      .collect()
  }
}

/// Named host objects injected into blocks by parameter name.
///
/// Globals never appear in the templating language; they exist so a block can
/// receive things a user could never write down, like a database handle.
#[derive(Clone, Default)]
pub struct Globals(HashMap<String, Arc<dyn Any + Send + Sync>>);

impl Globals {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) {
    self.0.insert(name.into(), Arc::new(value));
  }

  pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
    self.0.get(name).cloned().and_then(|any| any.downcast().ok())
  }

  pub fn contains(&self, name: &str) -> bool {
    self.0.contains_key(name)
  }
}

impl std::fmt::Debug for Globals {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Globals").field("names", &self.0.keys()).finish()
  }
}

/// Steps queued by a running block, to be attached as children of the
/// executing node once the block returns.
#[derive(Debug, Clone, Default)]
pub struct StepQueue(Arc<Mutex<Vec<StepDef>>>);

impl StepQueue {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&self, step: StepDef) {
    self.0.lock().expect("step queue lock poisoned").push(step);
  }

  pub fn drain(&self) -> Vec<StepDef> {
    std::mem::take(&mut self.0.lock().expect("step queue lock poisoned"))
  }
}

/// Read-only job metadata visible to a block.
#[derive(Debug, Clone, Default)]
pub struct JobView {
  pub id: Option<String>,
  pub name: Option<String>,
  pub tags: BTreeSet<String>,
  /// Identifier of the current run.
  pub run_id: String,
}

/// Read-only metadata of the node being executed.
#[derive(Debug, Clone, Default)]
pub struct NodeView {
  pub path: String,
  pub id: String,
  pub action: String,
  pub position: usize,
  pub forced: bool,
  /// The node's raw, pre-resolution parameters.
  pub parameters: Map<String, Value>,
}

/// Everything a block function can reach besides its own arguments.
#[derive(Debug, Clone)]
pub struct BlockContext {
  pub job: JobView,
  pub node: NodeView,
  pub variables: Variables,
  pub globals: Globals,
  /// Queue child steps here to have them executed right after this node.
  pub queue: StepQueue,
}
