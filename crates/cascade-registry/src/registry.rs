//! The block registry.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::block::{Block, BlockDescriptor, BlockFn, BlockHandle};
use crate::error::RegistryError;
use crate::pattern::{parse_display_name, pattern_match};

/// Table of registered blocks, keyed by display name.
///
/// Registration happens once at startup; afterwards the registry is shared
/// read-only (typically behind an `Arc`) across every running job, so lookups
/// never contend.
#[derive(Debug, Default)]
pub struct BlockRegistry {
  // Insertion order is preserved so `match_first` is deterministic.
  order: Vec<Arc<Block>>,
  by_name: HashMap<String, usize>,
}

impl BlockRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a block under its display name.
  ///
  /// Private blocks are not inserted into the by-name table; the returned
  /// handle is the only way to reach them.
  pub fn register(
    &mut self,
    descriptor: BlockDescriptor,
    func: BlockFn,
  ) -> Result<BlockHandle, RegistryError> {
    if descriptor.name().contains('.') || descriptor.category().is_some_and(|c| c.contains('.')) {
      return Err(RegistryError::InvalidName {
        name: descriptor.display_name(),
      });
    }
    let display_name = descriptor.display_name();
    if self.by_name.contains_key(&display_name) {
      return Err(RegistryError::DuplicateBlock { display_name });
    }
    let private = descriptor.is_private();
    let block = Arc::new(Block::new(descriptor, func));
    if !private {
      self.order.push(block.clone());
      self.by_name.insert(display_name.clone(), self.order.len() - 1);
      debug!(block = %display_name, "registered block");
    }
    Ok(BlockHandle::Found(block))
  }

  /// Exact lookup by display name; a missing name yields the placeholder
  /// handle rather than an error.
  pub fn get(&self, display_name: &str) -> BlockHandle {
    let display_name = display_name.to_uppercase();
    match self.by_name.get(&display_name) {
      Some(&index) => BlockHandle::Found(self.order[index].clone()),
      None => {
        let (category, name) = parse_display_name(&display_name);
        BlockHandle::Missing { category, name }
      }
    }
  }

  /// All blocks whose display name matches the wildcard pattern.
  pub fn match_all(&self, pattern: &str, strict: bool) -> Vec<BlockHandle> {
    self
      .order
      .iter()
      .filter(|block| pattern_match(&block.display_name(), pattern, strict))
      .map(|block| BlockHandle::Found(block.clone()))
      .collect()
  }

  /// The first block whose display name matches the wildcard pattern.
  pub fn match_first(&self, pattern: &str, strict: bool) -> Option<BlockHandle> {
    self
      .order
      .iter()
      .find(|block| pattern_match(&block.display_name(), pattern, strict))
      .map(|block| BlockHandle::Found(block.clone()))
  }

  /// Display names of every listed (non-private) block, in registration
  /// order.
  pub fn names(&self) -> Vec<String> {
    self.order.iter().map(|block| block.display_name()).collect()
  }

  pub fn len(&self) -> usize {
    self.order.len()
  }

  pub fn is_empty(&self) -> bool {
    self.order.is_empty()
  }
}
