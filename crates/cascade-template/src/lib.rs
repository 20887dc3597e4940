//! Cascade Template
//!
//! The reference-resolution language used in node parameters and conditions.
//! Strings may embed `{X expr X}` tokens addressing earlier step results
//! (`{: :}`), job variables (`{# #}`), job parameters (`{< >}`), or the raw
//! context snapshot (`{% %}`); expressions are dotted key paths with index
//! and slice segments.

mod context;
mod error;
mod path;
mod resolver;

pub use context::ContextSnapshot;
pub use error::TemplateError;
pub use path::{lookup_path, parse_slice, SliceSpec};
pub use resolver::{resolve, resolve_condition, resolve_string, stringify, truthy};
