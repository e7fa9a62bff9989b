//! Creation contexts.
//!
//! A context is one node of a tree mirroring the lexical nesting of the
//! document: it owns the id-name → object map for its naming scope, points
//! back at its parent, and knows which compiled unit defines it. The root
//! context of an operation also records the incubator driving it, if any.

use crate::compiled::CompiledUnit;
use crate::handle::ContextId;
use crate::handle::IncubatorId;
use crate::handle::ObjectId;
use ahash::AHashMap;
use std::sync::Arc;

#[derive(Debug)]
pub struct ContextData {
  pub parent: Option<ContextId>,
  pub unit: Arc<CompiledUnit>,
  pub names: AHashMap<String, ObjectId>,
  /// Set on the root context of an incubated operation.
  pub incubator: Option<IncubatorId>,
}

/// Store of live creation contexts. Contexts are owned by the builder that
/// created them until construction finishes; on success ownership transfers
/// to the root instance, on failure the builder's `clear()` frees them.
#[derive(Debug, Default)]
pub struct ContextStore {
  slots: Vec<Option<ContextData>>,
  free: Vec<u32>,
}

impl ContextStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn alloc(
    &mut self,
    parent: Option<ContextId>,
    unit: Arc<CompiledUnit>,
    incubator: Option<IncubatorId>,
  ) -> ContextId {
    let data = ContextData {
      parent,
      unit,
      names: AHashMap::new(),
      incubator,
    };
    if let Some(index) = self.free.pop() {
      self.slots[index as usize] = Some(data);
      return ContextId(index);
    }
    assert!(self.slots.len() < u32::MAX as usize, "context store overflow");
    let index = self.slots.len() as u32;
    self.slots.push(Some(data));
    ContextId(index)
  }

  pub fn free(&mut self, id: ContextId) {
    if let Some(slot) = self.slots.get_mut(id.0 as usize) {
      if slot.take().is_some() {
        self.free.push(id.0);
      }
    }
  }

  /// Panics on freed ids; builders only hold ids of contexts they own.
  pub fn context(&self, id: ContextId) -> &ContextData {
    self.slots[id.0 as usize]
      .as_ref()
      .expect("context used after free")
  }

  pub fn context_mut(&mut self, id: ContextId) -> &mut ContextData {
    self.slots[id.0 as usize]
      .as_mut()
      .expect("context used after free")
  }

  pub fn get(&self, id: ContextId) -> Option<&ContextData> {
    self.slots.get(id.0 as usize).and_then(|s| s.as_ref())
  }

  pub fn register_name(&mut self, id: ContextId, name: &str, object: ObjectId) {
    self
      .context_mut(id)
      .names
      .insert(name.to_string(), object);
  }

  /// Resolve an id-name, walking parent contexts outward.
  pub fn lookup_name(&self, id: ContextId, name: &str) -> Option<ObjectId> {
    let mut current = Some(id);
    while let Some(ctx) = current {
      let data = self.get(ctx)?;
      if let Some(object) = data.names.get(name) {
        return Some(*object);
      }
      current = data.parent;
    }
    None
  }

  /// The innermost incubator owning any context on the chain.
  pub fn find_incubator(&self, id: ContextId) -> Option<IncubatorId> {
    let mut current = Some(id);
    while let Some(ctx) = current {
      let data = self.get(ctx)?;
      if let Some(incubator) = data.incubator {
        return Some(incubator);
      }
      current = data.parent;
    }
    None
  }

  /// Whether `unit` is the defining unit of any context on the chain. Bound
  /// components may only be instantiated inside such a chain.
  pub fn unit_in_chain(&self, id: ContextId, unit: &Arc<CompiledUnit>) -> bool {
    let mut current = Some(id);
    while let Some(ctx) = current {
      let Some(data) = self.get(ctx) else {
        return false;
      };
      if Arc::ptr_eq(&data.unit, unit) {
        return true;
      }
      current = data.parent;
    }
    false
  }

  /// Whether `ancestor` appears on `id`'s parent chain (inclusive).
  pub fn chain_contains(&self, id: ContextId, ancestor: ContextId) -> bool {
    let mut current = Some(id);
    while let Some(ctx) = current {
      if ctx == ancestor {
        return true;
      }
      current = self.get(ctx).and_then(|d| d.parent);
    }
    false
  }
}
