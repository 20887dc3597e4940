//! Lifecycle hooks and run events.
//!
//! Hooks are invoked by the scheduler after every node and once after the
//! whole run; implementations decide what to do with them (persist state,
//! stream to UIs, log, ignore). Both hook points are async and awaited in
//! place, so a synchronous implementation is just one that never awaits.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::job::Job;
use crate::status::NodeStatus;

/// Callbacks observed during a run.
#[async_trait]
pub trait JobHooks: Send + Sync {
  /// Called after every node is processed (success, failure, or skip).
  /// The node's status and result are readable through the job.
  async fn on_step_update(&self, _job: &Job, _path: &str) {}

  /// Called once after the whole run; `failed` carries the path of the first
  /// failed node, if any.
  async fn on_job_finish(&self, _job: &Job, _failed: Option<&str>) {}
}

/// Discards all events; the default.
#[derive(Debug, Clone, Default)]
pub struct NoopHooks;

#[async_trait]
impl JobHooks for NoopHooks {}

/// Events emitted by [`ChannelHooks`].
#[derive(Debug, Clone)]
pub enum JobEvent {
  StepUpdated {
    path: String,
    status: NodeStatus,
    result: Value,
  },
  JobFinished {
    succeeded: bool,
    failed_path: Option<String>,
  },
}

/// Hooks that forward events to an unbounded channel.
///
/// NOTE: the channel is unbounded so a slow consumer never stalls the run;
/// the volume is one event per node, so growth stays small in practice.
#[derive(Debug, Clone)]
pub struct ChannelHooks {
  sender: mpsc::UnboundedSender<JobEvent>,
}

impl ChannelHooks {
  pub fn new(sender: mpsc::UnboundedSender<JobEvent>) -> Self {
    Self { sender }
  }
}

#[async_trait]
impl JobHooks for ChannelHooks {
  async fn on_step_update(&self, job: &Job, path: &str) {
    // Send errors mean the receiver is gone; nothing useful to do.
    let _ = self.sender.send(JobEvent::StepUpdated {
      path: path.to_string(),
      status: job.status_of(path),
      result: job.result_of(path).cloned().unwrap_or(Value::Null),
    });
  }

  async fn on_job_finish(&self, job: &Job, failed: Option<&str>) {
    let _ = self.sender.send(JobEvent::JobFinished {
      succeeded: job.succeeded().unwrap_or(false),
      failed_path: failed.map(str::to_string),
    });
  }
}
