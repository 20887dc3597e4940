//! Cascade Registry
//!
//! Block descriptors, the process-wide block registry, and the invocation
//! surface block functions are written against: resolved arguments, the
//! block context (job view, variables, globals, step queue), and the error
//! values blocks use to signal failure.
//!
//! Registration happens once at startup; the registry is then shared
//! read-only across running jobs.

mod args;
mod block;
mod context;
mod error;
mod params;
mod pattern;
mod registry;
mod variable;

pub use args::{Argument, BlockArgs};
pub use block::{Block, BlockDescriptor, BlockFn, BlockHandle, BlockKind};
pub use context::{BlockContext, Globals, JobView, NodeView, StepQueue, Variables};
pub use error::{BlockError, RegistryError, ValidationError};
pub use params::{validate_args, ParamMode, ParamSpec, ParamType};
pub use pattern::{make_display_name, parse_display_name, pattern_match};
pub use registry::BlockRegistry;
pub use variable::Variable;
