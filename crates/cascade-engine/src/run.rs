//! The per-run scheduler loop.
//!
//! Execution is strictly sequential: one node fully completes (including any
//! awaited async block) before the next begins, because a later node's
//! parameter resolution may read an earlier node's result.

use std::collections::HashMap;
use std::sync::Arc;

use cascade_registry::{
  validate_args, Argument, BlockArgs, BlockContext, BlockError, BlockFn, NodeView, ParamType,
  StepQueue,
};
use cascade_template::{resolve, resolve_condition, ContextSnapshot};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::job::{Job, RunState};
use crate::status::{JobState, NodeStatus};

/// The node fields the loop needs, copied out so the tree can be mutated
/// (steps queued by the running block) while the node is in flight.
struct NodeSnapshot {
  action: String,
  id: String,
  position: usize,
  path: String,
  forced: bool,
  parameters: Map<String, Value>,
  condition: Option<Value>,
  admission: Option<NodeStatus>,
  debug_stub: bool,
}

impl NodeSnapshot {
  fn of(node: &crate::node::Node) -> Self {
    Self {
      action: node.action.clone(),
      id: node.id.clone(),
      position: node.position,
      path: node.path.clone(),
      forced: node.forced,
      parameters: node.parameters.clone(),
      condition: node.condition.clone(),
      admission: node.admission,
      debug_stub: node.debug_stub,
    }
  }
}

/// The synthetic payload recorded for nodes that never produced a value.
fn status_text(status: NodeStatus, snapshot: &NodeSnapshot) -> Value {
  Value::String(format!(
    "{}\nStep: {} (#{})\nBlock: {}",
    status, snapshot.id, snapshot.position, snapshot.action
  ))
}

impl Job {
  /// Execute every node in order.
  ///
  /// All per-run state is cleared first, so calling `run()` again on an
  /// unchanged job (with pure blocks) reproduces the same outcome. The run
  /// itself never errors: the verdict is carried by [`Job::state`] and the
  /// per-node result/status maps.
  pub async fn run(&mut self) {
    // Nodes injected by blocks belong to the run that created them.
    for path in std::mem::take(&mut self.run.injected) {
      self.remove_step(&path);
    }
    self.run = RunState {
      run_id: Uuid::new_v4().to_string(),
      ..RunState::default()
    };
    self.state = JobState::Running;
    info!(
      run_id = %self.run.run_id,
      job_id = ?self.id(),
      job_name = ?self.name(),
      nodes = self.nodes.len(),
      "job run started"
    );

    // Depth-first pre-order by index path; re-reading child counts on every
    // step means nodes attached mid-run are picked up in place.
    let mut cursor: Vec<usize> = vec![0];
    while !cursor.is_empty() {
      let snapshot = match self.node_at_index(&cursor) {
        Some(node) => NodeSnapshot::of(node),
        None => {
          cursor.pop();
          if let Some(last) = cursor.last_mut() {
            *last += 1;
          }
          continue;
        }
      };
      let descend = self.process_node(&snapshot).await;
      let has_children = self
        .node_at_index(&cursor)
        .is_some_and(|node| !node.nodes.is_empty());
      if descend && has_children {
        cursor.push(0);
      } else if let Some(last) = cursor.last_mut() {
        *last += 1;
      }
    }

    let failed = self.run.failed_path.clone();
    self.state = match failed {
      None => JobState::Succeeded,
      Some(_) => JobState::Failed,
    };
    info!(
      run_id = %self.run.run_id,
      succeeded = failed.is_none(),
      failed_path = ?failed,
      "job run finished"
    );
    let hooks = Arc::clone(&self.hooks);
    hooks.on_job_finish(&*self, failed.as_deref()).await;
  }

  /// Process one node; returns whether traversal should descend into its
  /// children.
  async fn process_node(&mut self, snapshot: &NodeSnapshot) -> bool {
    let ctx = self.build_contexts();
    // The declared fields are captured even for nodes that never execute, so
    // templates can introspect skipped steps.
    let declared = self
      .node(&snapshot.path)
      .map(|node| node.declared_fields())
      .unwrap_or(Value::Null);
    self.run.contexts.insert(snapshot.path.clone(), declared);

    let executing = self.run.failed_path.is_none() || snapshot.forced;
    let (status, payload, descend) = if executing {
      self.execute_node(&ctx, snapshot).await
    } else {
      (
        NodeStatus::Skipped,
        status_text(NodeStatus::Skipped, snapshot),
        true,
      )
    };

    match status {
      NodeStatus::Done => debug!(path = %snapshot.path, action = %snapshot.action, "node done"),
      NodeStatus::IfConditionFailed | NodeStatus::Skipped => {
        debug!(path = %snapshot.path, status = %status, "node not executed")
      }
      other => warn!(path = %snapshot.path, action = %snapshot.action, status = %other, "node failed"),
    }

    self.run.statuses.insert(snapshot.path.clone(), status);
    self.run.results.insert(snapshot.path.clone(), payload);
    if status.is_failure() && self.run.failed_path.is_none() {
      self.run.failed_path = Some(snapshot.path.clone());
    }

    let hooks = Arc::clone(&self.hooks);
    hooks.on_step_update(&*self, &snapshot.path).await;
    descend
  }

  /// Admission, resolution, validation, and the block call itself.
  async fn execute_node(
    &mut self,
    ctx: &ContextSnapshot,
    snapshot: &NodeSnapshot,
  ) -> (NodeStatus, Value, bool) {
    // Attach-time admission errors surface here without invoking anything.
    if let Some(status) = snapshot.admission {
      return (status, status_text(status, snapshot), false);
    }

    let handle = self.registry.get(&snapshot.action);
    let block = match handle.block() {
      Some(block) => Some(block.clone()),
      None if snapshot.debug_stub => None,
      None => {
        return (
          NodeStatus::BlockNotFound,
          status_text(NodeStatus::BlockNotFound, snapshot),
          false,
        );
      }
    };

    match resolve_condition(ctx, snapshot.condition.as_ref()) {
      Ok(true) => {}
      Ok(false) => {
        return (
          NodeStatus::IfConditionFailed,
          status_text(NodeStatus::IfConditionFailed, snapshot),
          false,
        );
      }
      Err(err) => {
        return (
          NodeStatus::UnhandledException,
          Value::String(err.to_string()),
          true,
        );
      }
    }

    let Some(block) = block else {
      // Debug mode: the missing block becomes a logging stub.
      let parameters = Value::Object(snapshot.parameters.clone());
      debug!(
        action = %snapshot.action,
        parameters = %parameters,
        "debug stub executed for missing block"
      );
      return (NodeStatus::Done, Value::Null, true);
    };

    let mut args: HashMap<String, Argument> = HashMap::new();
    for (key, raw) in &snapshot.parameters {
      match resolve(ctx, raw) {
        Ok(argument) => {
          // Cells stay cells only for parameters declared `Variable`.
          let argument = match argument {
            Argument::Variable(cell) => {
              let keeps_cell = block
                .descriptor()
                .param(key)
                .is_some_and(|param| param.ty == ParamType::Variable);
              if keeps_cell {
                Argument::Variable(cell)
              } else {
                Argument::Value(cell.get())
              }
            }
            other => other,
          };
          args.insert(key.clone(), argument);
        }
        Err(err) => {
          return (
            NodeStatus::UnhandledException,
            Value::String(err.to_string()),
            true,
          );
        }
      }
    }

    if block.descriptor().validates() {
      if let Err(err) = validate_args(block.descriptor().params(), &mut args) {
        return (NodeStatus::InvalidType, Value::String(err.to_string()), true);
      }
    }

    let queue = StepQueue::new();
    let block_ctx = BlockContext {
      job: self.job_view(),
      node: NodeView {
        path: snapshot.path.clone(),
        id: snapshot.id.clone(),
        action: snapshot.action.clone(),
        position: snapshot.position,
        forced: snapshot.forced,
        parameters: snapshot.parameters.clone(),
      },
      variables: self.variables.clone(),
      globals: self.globals.clone(),
      queue: queue.clone(),
    };

    let outcome = match block.func() {
      BlockFn::Sync(func) => (**func)(BlockArgs::new(args), block_ctx),
      // The run's own task suspends here; no other node is in flight.
      BlockFn::Async(func) => (**func)(BlockArgs::new(args), block_ctx).await,
    };

    // Steps queued by the block become its children and run next.
    for def in queue.drain() {
      if let Ok(path) = self.attach(Some(&snapshot.path), def) {
        self.run.injected.push(path);
      }
    }

    match outcome {
      Ok(value) => (NodeStatus::Done, value, true),
      Err(err @ BlockError::InvalidArgument { .. }) => (
        NodeStatus::InvalidArgument,
        Value::String(err.to_string()),
        true,
      ),
      Err(err @ BlockError::Abort { .. }) => (
        NodeStatus::KilledManually,
        Value::String(err.to_string()),
        true,
      ),
      Err(err @ BlockError::Failed { .. }) => (
        NodeStatus::UnhandledException,
        Value::String(err.to_string()),
        true,
      ),
    }
  }
}
