//! The object store: slot-addressed live instances with generation-checked
//! handles.
//!
//! There is no garbage collection here. The object graph creator tracks
//! every instance it makes for explicit rollback, and on success ownership
//! transfers to the caller, so collection is always an explicit `free` (or
//! `free_tree`) — the store's job is to make stale handles detectable, not
//! to find garbage.

use crate::binding::BindingKey;
use crate::binding::BoundSignal;
use crate::binding::DeferredBlock;
use crate::binding::LiveBinding;
use crate::compiled::ExprIndex;
use crate::error::StoreError;
use crate::handle::ContextId;
use crate::handle::ObjectId;
use crate::propcache::PropertyCache;
use crate::propcache::PropertyFlags;
use crate::registry::NativeClassId;
use crate::value::Value;
use ahash::AHashMap;
use std::sync::Arc;

/// Transitive alias-chain walks give up after this many hops; compiled
/// alias cycles would otherwise loop forever.
const MAX_ALIAS_DEPTH: u32 = 32;

/// A live object instance.
pub struct Instance {
  /// The leaf native class of the instance's descriptor chain. Capability
  /// hooks are looked up through it.
  pub class: Option<NativeClassId>,
  pub cache: Arc<PropertyCache>,
  /// Slot storage, indexed by global property index.
  pub values: Vec<Value>,
  pub parent: Option<ObjectId>,
  pub children: Vec<ObjectId>,
  pub id_name: Option<String>,
  pub context: Option<ContextId>,
  /// Installed live bindings, keyed by (slot, value-type sub-field).
  pub(crate) bindings: AHashMap<BindingKey, Box<dyn LiveBinding>>,
  pub bound_signals: Vec<BoundSignal>,
  /// `on`-assignment value sources/interceptors installed on slots.
  pub value_sources: Vec<(u32, ObjectId)>,
  /// Declared functions installed on method slots.
  pub methods: AHashMap<u32, ExprIndex>,
  /// Per-instance alias resolution: alias slot → (target, target slot or
  /// whole-object).
  pub alias_targets: AHashMap<u32, (ObjectId, Option<u32>)>,
  /// Attachment objects created for this instance, one per attaching class.
  pub attached: AHashMap<NativeClassId, ObjectId>,
  /// Deferred bindings retained for later activation.
  pub deferred: Vec<DeferredBlock>,
  /// Creation contexts this (root) instance took ownership of when its
  /// construction completed.
  pub owned_contexts: Vec<ContextId>,
}

impl Instance {
  pub fn new(class: Option<NativeClassId>, cache: Arc<PropertyCache>) -> Self {
    let mut instance = Self {
      class,
      cache,
      values: Vec::new(),
      parent: None,
      children: Vec::new(),
      id_name: None,
      context: None,
      bindings: AHashMap::new(),
      bound_signals: Vec::new(),
      value_sources: Vec::new(),
      methods: AHashMap::new(),
      alias_targets: AHashMap::new(),
      attached: AHashMap::new(),
      deferred: Vec::new(),
      owned_contexts: Vec::new(),
    };
    instance.sync_slots();
    instance
  }

  /// Grow slot storage to match the descriptor, defaulting new slots by
  /// their declared type. Called after the descriptor is extended.
  pub fn sync_slots(&mut self) {
    let count = self.cache.property_count() as usize;
    for index in self.values.len()..count {
      let default = self
        .cache
        .property_at(index as u32)
        .map(|data| data.ty.default_value())
        .unwrap_or(Value::Null);
      self.values.push(default);
    }
  }

  pub fn has_binding(&self, property: u32) -> bool {
    self.bindings.keys().any(|(slot, _)| *slot == property)
  }

  pub fn binding_count(&self) -> usize {
    self.bindings.len()
  }
}

impl std::fmt::Debug for Instance {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Instance")
      .field("class", &self.class)
      .field("id_name", &self.id_name)
      .field("values", &self.values)
      .field("bindings", &self.bindings.len())
      .field("children", &self.children.len())
      .finish()
  }
}

enum Slot {
  Free { generation: u32 },
  Occupied { generation: u32, instance: Box<Instance> },
}

/// Resolution of a (possibly aliased) property slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AliasResolution {
  /// A concrete slot on a concrete object.
  Slot(ObjectId, u32),
  /// An alias to a whole object; readable, never writable.
  Object(ObjectId),
}

#[derive(Default)]
pub struct ObjectStore {
  slots: Vec<Slot>,
  free: Vec<u32>,
  live: usize,
}

impl ObjectStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn alloc(&mut self, instance: Instance) -> ObjectId {
    self.live += 1;
    if let Some(index) = self.free.pop() {
      let generation = match &self.slots[index as usize] {
        Slot::Free { generation } => *generation,
        Slot::Occupied { .. } => unreachable!("free list points at occupied slot"),
      };
      self.slots[index as usize] = Slot::Occupied {
        generation,
        instance: Box::new(instance),
      };
      return ObjectId::from_parts(index, generation);
    }
    assert!(self.slots.len() < u32::MAX as usize, "object store overflow");
    let index = self.slots.len() as u32;
    self.slots.push(Slot::Occupied {
      generation: 0,
      instance: Box::new(instance),
    });
    ObjectId::from_parts(index, 0)
  }

  /// Free one instance. Children are not touched; use
  /// [`ObjectStore::free_tree`] for recursive teardown.
  pub fn free(&mut self, id: ObjectId) -> Option<Instance> {
    let slot = self.slots.get_mut(id.index() as usize)?;
    match slot {
      Slot::Occupied { generation, .. } if *generation == id.generation() => {
        let next_generation = id.generation().wrapping_add(1);
        let previous = std::mem::replace(
          slot,
          Slot::Free {
            generation: next_generation,
          },
        );
        self.free.push(id.index());
        self.live -= 1;
        match previous {
          Slot::Occupied { instance, .. } => Some(*instance),
          Slot::Free { .. } => unreachable!(),
        }
      }
      _ => None,
    }
  }

  /// Free an instance and, recursively, every instance parented under it.
  pub fn free_tree(&mut self, id: ObjectId) {
    let Some(instance) = self.free(id) else {
      return;
    };
    for child in instance.children {
      self.free_tree(child);
    }
  }

  pub fn is_valid(&self, id: ObjectId) -> bool {
    matches!(
      self.slots.get(id.index() as usize),
      Some(Slot::Occupied { generation, .. }) if *generation == id.generation()
    )
  }

  pub fn live_count(&self) -> usize {
    self.live
  }

  /// Panics on stale handles. Builders only hold handles of instances they
  /// created and have not freed; host-facing accessors are the fallible
  /// [`ObjectStore::get`]/[`ObjectStore::get_mut`].
  pub fn instance(&self, id: ObjectId) -> &Instance {
    self.get(id).expect("stale object handle")
  }

  pub fn instance_mut(&mut self, id: ObjectId) -> &mut Instance {
    self.get_mut(id).expect("stale object handle")
  }

  pub fn get(&self, id: ObjectId) -> Option<&Instance> {
    match self.slots.get(id.index() as usize)? {
      Slot::Occupied {
        generation,
        instance,
      } if *generation == id.generation() => Some(instance),
      _ => None,
    }
  }

  pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Instance> {
    match self.slots.get_mut(id.index() as usize)? {
      Slot::Occupied {
        generation,
        instance,
      } if *generation == id.generation() => Some(instance),
      _ => None,
    }
  }

  /// Follow alias forwarding from `(id, property)` to a canonical
  /// resolution.
  pub fn resolve_alias(&self, id: ObjectId, property: u32) -> Result<AliasResolution, StoreError> {
    let mut object = id;
    let mut slot = property;
    for _ in 0..MAX_ALIAS_DEPTH {
      let instance = self.get(object).ok_or(StoreError::StaleHandle)?;
      let data = instance
        .cache
        .property_at(slot)
        .ok_or(StoreError::NoSuchSlot)?;
      if !data.flags.contains(PropertyFlags::ALIAS) {
        return Ok(AliasResolution::Slot(object, slot));
      }
      match instance.alias_targets.get(&slot) {
        Some((target, Some(target_slot))) => {
          object = *target;
          slot = *target_slot;
        }
        Some((target, None)) => return Ok(AliasResolution::Object(*target)),
        None => return Err(StoreError::UnresolvedAlias),
      }
    }
    Err(StoreError::UnresolvedAlias)
  }

  /// Read a property value, following alias forwarding.
  pub fn read_property(&self, id: ObjectId, property: u32) -> Result<Value, StoreError> {
    match self.resolve_alias(id, property)? {
      AliasResolution::Slot(object, slot) => {
        let instance = self.get(object).ok_or(StoreError::StaleHandle)?;
        instance
          .values
          .get(slot as usize)
          .cloned()
          .ok_or(StoreError::NoSuchSlot)
      }
      AliasResolution::Object(object) => Ok(Value::Object(object)),
    }
  }

  /// Write a property value, following alias forwarding. Returns the
  /// canonical `(object, slot)` actually written — the de-dup key for
  /// required-property satisfaction.
  pub fn write_property(
    &mut self,
    id: ObjectId,
    property: u32,
    value: Value,
  ) -> Result<(ObjectId, u32), StoreError> {
    match self.resolve_alias(id, property)? {
      AliasResolution::Slot(object, slot) => {
        let instance = self.get_mut(object).ok_or(StoreError::StaleHandle)?;
        let stored = instance
          .values
          .get_mut(slot as usize)
          .ok_or(StoreError::NoSuchSlot)?;
        *stored = value;
        Ok((object, slot))
      }
      AliasResolution::Object(_) => Err(StoreError::ObjectAlias),
    }
  }

  /// Install or replace a live binding on a slot.
  pub(crate) fn install_binding(
    &mut self,
    id: ObjectId,
    key: BindingKey,
    binding: Box<dyn LiveBinding>,
  ) {
    self.instance_mut(id).bindings.insert(key, binding);
  }

  /// Remove the binding on a slot (a literal write through the same slot
  /// replaces any binding installed earlier).
  pub(crate) fn remove_binding(&mut self, id: ObjectId, property: u32) {
    self
      .instance_mut(id)
      .bindings
      .retain(|(slot, _), _| *slot != property);
  }
}

impl std::fmt::Debug for ObjectStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ObjectStore")
      .field("slots", &self.slots.len())
      .field("live", &self.live)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::compiled::Revision;
  use crate::propcache::CacheBuilder;
  use crate::value::PropertyType;

  fn simple_cache() -> Arc<PropertyCache> {
    let mut builder = CacheBuilder::new(None, Revision::MAX);
    builder.append_property(
      "width",
      PropertyType::Int,
      PropertyFlags::empty(),
      Revision::ZERO,
      None,
    );
    builder.append_property(
      "indirect",
      PropertyType::Var,
      PropertyFlags::ALIAS,
      Revision::ZERO,
      None,
    );
    builder.build()
  }

  #[test]
  fn stale_handles_are_detected() {
    let mut store = ObjectStore::new();
    let cache = simple_cache();
    let id = store.alloc(Instance::new(None, cache.clone()));
    assert!(store.is_valid(id));
    store.free(id);
    assert!(!store.is_valid(id));
    assert!(store.get(id).is_none());

    // The slot is reused under a new generation; the old handle stays dead.
    let next = store.alloc(Instance::new(None, cache));
    assert_eq!(next.index(), id.index());
    assert_ne!(next.generation(), id.generation());
    assert!(store.get(id).is_none());
    assert!(store.get(next).is_some());
  }

  #[test]
  fn alias_writes_land_on_the_canonical_slot() {
    let mut store = ObjectStore::new();
    let cache = simple_cache();
    let target = store.alloc(Instance::new(None, cache.clone()));
    let holder = store.alloc(Instance::new(None, cache));
    store
      .instance_mut(holder)
      .alias_targets
      .insert(1, (target, Some(0)));

    let written = store
      .write_property(holder, 1, Value::Int(7))
      .unwrap();
    assert_eq!(written, (target, 0));
    assert_eq!(store.read_property(target, 0).unwrap(), Value::Int(7));
    assert_eq!(store.read_property(holder, 1).unwrap(), Value::Int(7));
  }

  #[test]
  fn unresolved_alias_reads_fail() {
    let mut store = ObjectStore::new();
    let cache = simple_cache();
    let holder = store.alloc(Instance::new(None, cache));
    assert_eq!(
      store.read_property(holder, 1),
      Err(StoreError::UnresolvedAlias)
    );
  }

  #[test]
  fn free_tree_tears_down_children() {
    let mut store = ObjectStore::new();
    let cache = simple_cache();
    let root = store.alloc(Instance::new(None, cache.clone()));
    let child = store.alloc(Instance::new(None, cache.clone()));
    let grandchild = store.alloc(Instance::new(None, cache));
    store.instance_mut(root).children.push(child);
    store.instance_mut(child).children.push(grandchild);

    store.free_tree(root);
    assert_eq!(store.live_count(), 0);
  }
}
