//! Block descriptors and callable variants.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::args::BlockArgs;
use crate::context::BlockContext;
use crate::error::BlockError;
use crate::params::{ParamSpec, ParamType};
use crate::pattern::make_display_name;

/// Whether a block function is synchronous or asynchronous, fixed once at
/// registration so the scheduler can branch on a tag instead of inspecting
/// the callable per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
  Sync,
  Async,
}

type SyncFn = dyn Fn(BlockArgs, BlockContext) -> Result<Value, BlockError> + Send + Sync;
type AsyncFn =
  dyn Fn(BlockArgs, BlockContext) -> BoxFuture<'static, Result<Value, BlockError>> + Send + Sync;

/// The callable behind a block, tagged sync or async.
#[derive(Clone)]
pub enum BlockFn {
  Sync(Arc<SyncFn>),
  Async(Arc<AsyncFn>),
}

impl BlockFn {
  pub fn sync<F>(f: F) -> Self
  where
    F: Fn(BlockArgs, BlockContext) -> Result<Value, BlockError> + Send + Sync + 'static,
  {
    BlockFn::Sync(Arc::new(f))
  }

  pub fn async_fn<F, Fut>(f: F) -> Self
  where
    F: Fn(BlockArgs, BlockContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, BlockError>> + Send + 'static,
  {
    BlockFn::Async(Arc::new(move |args, ctx| Box::pin(f(args, ctx))))
  }

  pub fn kind(&self) -> BlockKind {
    match self {
      BlockFn::Sync(_) => BlockKind::Sync,
      BlockFn::Async(_) => BlockKind::Async,
    }
  }
}

impl fmt::Debug for BlockFn {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BlockFn::Sync(_) => f.write_str("BlockFn::Sync"),
      BlockFn::Async(_) => f.write_str("BlockFn::Async"),
    }
  }
}

/// Static description of a block: identity, parameter schema, and admission
/// attributes. Built once at registration and immutable afterwards.
#[derive(Debug, Clone)]
pub struct BlockDescriptor {
  name: String,
  category: Option<String>,
  params: Vec<ParamSpec>,
  tags: BTreeSet<String>,
  max_uses: Option<u32>,
  private: bool,
  validate: bool,
}

impl BlockDescriptor {
  /// A block without a category; names are uppercased.
  pub fn named(name: impl Into<String>) -> Self {
    Self {
      name: name.into().to_uppercase(),
      category: None,
      params: Vec::new(),
      tags: BTreeSet::new(),
      max_uses: None,
      private: false,
      validate: true,
    }
  }

  /// A block inside a category, e.g. `BlockDescriptor::new("math", "sum")`.
  pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
    let mut descriptor = Self::named(name);
    descriptor.category = Some(category.into().to_uppercase());
    descriptor
  }

  /// Declare a keyword parameter; order of declaration is the schema order.
  pub fn keyword(mut self, name: impl Into<String>, ty: ParamType) -> Self {
    self.params.push(ParamSpec::keyword(name, ty));
    self
  }

  pub fn optional(mut self, name: impl Into<String>, ty: ParamType) -> Self {
    self.params.push(ParamSpec::keyword(name, ty).optional());
    self
  }

  pub fn with_default(
    mut self,
    name: impl Into<String>,
    ty: ParamType,
    default: impl Into<Value>,
  ) -> Self {
    self.params.push(ParamSpec::keyword(name, ty).with_default(default));
    self
  }

  /// Declare an injected parameter, auto-filled from the job's globals.
  pub fn injected(mut self, name: impl Into<String>) -> Self {
    self.params.push(ParamSpec::injected(name));
    self
  }

  pub fn tag(mut self, tag: impl Into<String>) -> Self {
    self.tags.insert(tag.into());
    self
  }

  pub fn with_max_uses(mut self, max_uses: u32) -> Self {
    self.max_uses = Some(max_uses);
    self
  }

  pub fn private(mut self) -> Self {
    self.private = true;
    self
  }

  /// Disable argument-schema validation for this block.
  pub fn no_validate(mut self) -> Self {
    self.validate = false;
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn category(&self) -> Option<&str> {
    self.category.as_deref()
  }

  /// The registry identifier, `CATEGORY.NAME` or bare `NAME`.
  pub fn display_name(&self) -> String {
    make_display_name(self.category.as_deref(), &self.name)
  }

  pub fn params(&self) -> &[ParamSpec] {
    &self.params
  }

  pub fn param(&self, name: &str) -> Option<&ParamSpec> {
    self.params.iter().find(|p| p.name == name)
  }

  pub fn tags(&self) -> &BTreeSet<String> {
    &self.tags
  }

  pub fn max_uses(&self) -> Option<u32> {
    self.max_uses
  }

  /// Private either by explicit flag or by the `__NAME__` convention.
  pub fn is_private(&self) -> bool {
    self.private || (self.name.starts_with("__") && self.name.ends_with("__"))
  }

  pub fn validates(&self) -> bool {
    self.validate
  }

  /// True iff every tag required by this block is present in `job_tags`.
  /// Extra job tags are ignored.
  pub fn exists_tags(&self, job_tags: &BTreeSet<String>) -> bool {
    self.tags.iter().all(|tag| job_tags.contains(tag))
  }
}

/// A registered block: descriptor plus callable.
#[derive(Debug, Clone)]
pub struct Block {
  descriptor: BlockDescriptor,
  func: BlockFn,
}

impl Block {
  pub fn new(descriptor: BlockDescriptor, func: BlockFn) -> Self {
    Self { descriptor, func }
  }

  pub fn descriptor(&self) -> &BlockDescriptor {
    &self.descriptor
  }

  pub fn func(&self) -> &BlockFn {
    &self.func
  }

  pub fn kind(&self) -> BlockKind {
    self.func.kind()
  }

  pub fn display_name(&self) -> String {
    self.descriptor.display_name()
  }
}

/// Lookup result: a live block, or a distinguished placeholder for a name
/// that is not registered. Callers test `exists()` instead of handling an
/// error on every lookup.
#[derive(Debug, Clone)]
pub enum BlockHandle {
  Found(Arc<Block>),
  Missing {
    category: Option<String>,
    name: String,
  },
}

impl BlockHandle {
  pub fn exists(&self) -> bool {
    matches!(self, BlockHandle::Found(_))
  }

  pub fn block(&self) -> Option<&Arc<Block>> {
    match self {
      BlockHandle::Found(block) => Some(block),
      BlockHandle::Missing { .. } => None,
    }
  }

  pub fn display_name(&self) -> String {
    match self {
      BlockHandle::Found(block) => block.display_name(),
      BlockHandle::Missing { category, name } => make_display_name(category.as_deref(), name),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_display_name_uppercased() {
    let descriptor = BlockDescriptor::new("math", "sum");
    assert_eq!(descriptor.display_name(), "MATH.SUM");
    assert_eq!(BlockDescriptor::named("noop").display_name(), "NOOP");
  }

  #[test]
  fn test_privacy_by_convention() {
    assert!(BlockDescriptor::named("__debug__").is_private());
    assert!(BlockDescriptor::named("debug").private().is_private());
    assert!(!BlockDescriptor::named("debug").is_private());
  }

  #[test]
  fn test_exists_tags_subset() {
    let descriptor = BlockDescriptor::named("send").tag("messaging").tag("net");
    let mut job_tags: BTreeSet<String> = ["messaging", "net", "extra"]
      .iter()
      .map(|s| s.to_string())
      .collect();
    assert!(descriptor.exists_tags(&job_tags));
    job_tags.remove("net");
    assert!(!descriptor.exists_tags(&job_tags));
  }

  #[test]
  fn test_block_kind_tag() {
    let sync = BlockFn::sync(|_, _| Ok(json!(null)));
    assert_eq!(sync.kind(), BlockKind::Sync);
    let asynchronous = BlockFn::async_fn(|_, _| async { Ok(json!(null)) });
    assert_eq!(asynchronous.kind(), BlockKind::Async);
  }
}
