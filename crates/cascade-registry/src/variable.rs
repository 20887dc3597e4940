//! Mutable job-variable cells.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde_json::Value;

/// A shared mutable value cell.
///
/// Variables are handed to blocks by cell so a block can mutate the value in
/// place (append to a list, set a map key) and the mutation is visible to
/// every later node in the same run. Callers that need the plain value call
/// [`Variable::get`] explicitly; there is no implicit unwrapping.
#[derive(Clone)]
pub struct Variable(Arc<Mutex<Value>>);

impl Variable {
  pub fn new(value: impl Into<Value>) -> Self {
    Self(Arc::new(Mutex::new(value.into())))
  }

  /// A clone of the wrapped value.
  pub fn get(&self) -> Value {
    self.0.lock().expect("variable lock poisoned").clone()
  }

  /// Replace the wrapped value.
  pub fn set(&self, value: impl Into<Value>) {
    *self.0.lock().expect("variable lock poisoned") = value.into();
  }

  /// Mutate the wrapped value in place.
  pub fn update(&self, f: impl FnOnce(&mut Value)) {
    f(&mut self.0.lock().expect("variable lock poisoned"));
  }

  /// Whether two handles point at the same cell.
  pub fn same_cell(&self, other: &Variable) -> bool {
    Arc::ptr_eq(&self.0, &other.0)
  }
}

impl From<Value> for Variable {
  fn from(value: Value) -> Self {
    Self::new(value)
  }
}

impl fmt::Debug for Variable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Variable({:?})", self.get())
  }
}

impl PartialEq for Variable {
  fn eq(&self, other: &Self) -> bool {
    self.get() == other.get()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_mutation_visible_through_clones() {
    let cell = Variable::new(json!([1, 2]));
    let alias = cell.clone();
    alias.update(|v| v.as_array_mut().unwrap().push(json!(3)));
    assert_eq!(cell.get(), json!([1, 2, 3]));
    assert!(cell.same_cell(&alias));
  }

  #[test]
  fn test_set_replaces_value() {
    let cell = Variable::new(json!(1));
    cell.set(json!("one"));
    assert_eq!(cell.get(), json!("one"));
  }
}
