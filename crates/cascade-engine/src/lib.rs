//! Cascade Engine
//!
//! The node tree, the job that owns it, and the scheduler that executes it.
//!
//! A [`Job`] owns an ordered tree of [`Node`]s, each bound to a block from a
//! shared [`cascade_registry::BlockRegistry`]. `run()` walks the tree
//! depth-first, resolves each node's parameters through the reference
//! templating language, invokes the block (awaiting async ones in place),
//! and records results and statuses per node path. A failed node makes every
//! later non-forced node skip; admission problems (missing blocks, duplicate
//! ids, tag mismatches, usage ceilings) are caught when steps are attached.

mod error;
mod events;
mod job;
mod node;
mod run;
mod status;
mod walk;

pub use error::EngineError;
pub use events::{ChannelHooks, JobEvent, JobHooks, NoopHooks};
pub use job::Job;
pub use node::{Node, Nodes};
pub use status::{JobState, NodeStatus};
pub use walk::Walk;
