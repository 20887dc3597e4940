//! Cascade - a declarative workflow engine.
//!
//! A job is a tree of named nodes, each bound to a block registered by the
//! host. Nodes execute strictly in order with conditional and
//! forced-continue-on-failure control, and later nodes reference earlier
//! results, job variables, and job parameters through `{X ... X}` template
//! tokens.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cascade::{
//!   BlockDescriptor, BlockFn, BlockRegistry, Job, ParamType, StepDef,
//! };
//! use serde_json::json;
//!
//! # async fn demo() {
//! let mut registry = BlockRegistry::new();
//! registry
//!   .register(
//!     BlockDescriptor::new("math", "sum")
//!       .keyword("value1", ParamType::Number)
//!       .keyword("value2", ParamType::Number),
//!     BlockFn::sync(|args, _| {
//!       Ok(json!(args.i64("value1")? + args.i64("value2")?))
//!     }),
//!   )
//!   .unwrap();
//!
//! let mut variables = serde_json::Map::new();
//! variables.insert("count".into(), json!(3));
//! let mut job = Job::new(Arc::new(registry)).with_variables(variables);
//! job.create_step(
//!   StepDef::new("math.sum")
//!     .with_id("total")
//!     .with_parameter("value1", "{# count #}")
//!     .with_parameter("value2", 4),
//! );
//! job.run().await;
//! assert_eq!(job.result_of("total"), Some(&json!(7)));
//! # }
//! ```

pub use cascade_config::{JobDef, LimitOverride, StepDef};
pub use cascade_engine::{
  ChannelHooks, EngineError, Job, JobEvent, JobHooks, JobState, Node, Nodes, NodeStatus,
  NoopHooks, Walk,
};
pub use cascade_registry::{
  validate_args, Argument, Block, BlockArgs, BlockContext, BlockDescriptor, BlockError, BlockFn,
  BlockHandle, BlockKind, BlockRegistry, Globals, JobView, NodeView, ParamMode, ParamSpec,
  ParamType, RegistryError, StepQueue, ValidationError, Variable, Variables,
};
pub use cascade_template::{
  lookup_path, resolve, resolve_condition, resolve_string, stringify, truthy, ContextSnapshot,
  TemplateError,
};
