//! Depth-first traversal with admission results.

use cascade_template::{resolve_condition, ContextSnapshot};

use crate::job::Job;
use crate::node::Node;
use crate::status::NodeStatus;

impl Job {
  /// Walk the tree depth-first, yielding each node together with its
  /// admission result: `BLOCK_NOT_FOUND` if the action is unknown,
  /// `IF_CONDITION_FAILED` if its condition resolves false against the
  /// current context snapshot, `None` if the node would execute. Children
  /// are only visited under admitted nodes.
  pub fn walk(&self) -> Walk<'_> {
    Walk {
      job: self,
      ctx: self.build_contexts(),
      stack: vec![self.nodes().iter()],
    }
  }

  pub(crate) fn admission_of(&self, ctx: &ContextSnapshot, node: &Node) -> Option<NodeStatus> {
    if !self.registry.get(node.action()).exists() && !node.debug_stub {
      return Some(NodeStatus::BlockNotFound);
    }
    // A condition that cannot be resolved counts as a failed condition here;
    // the scheduler reports the underlying error when it processes the node.
    match resolve_condition(ctx, node.condition()) {
      Ok(true) => None,
      _ => Some(NodeStatus::IfConditionFailed),
    }
  }
}

/// Lazy pre-order iterator created by [`Job::walk`].
pub struct Walk<'a> {
  job: &'a Job,
  ctx: ContextSnapshot,
  stack: Vec<std::slice::Iter<'a, Node>>,
}

impl<'a> Iterator for Walk<'a> {
  type Item = (&'a Node, Option<NodeStatus>);

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      let current = self.stack.last_mut()?;
      match current.next() {
        Some(node) => {
          let admission = self.job.admission_of(&self.ctx, node);
          if admission.is_none() {
            self.stack.push(node.nodes().iter());
          }
          return Some((node, admission));
        }
        None => {
          self.stack.pop();
        }
      }
    }
  }
}
