//! The engine runtime: explicit owner of every store the builders operate
//! on.
//!
//! Nothing here is process-global. The type registry and the expression
//! evaluator are dependencies injected at construction, with engine-wide
//! lifetime — which keeps the whole core testable in isolation.

use crate::binding::ExpressionEvaluator;
use crate::context::ContextStore;
use crate::creator;
use crate::handle::ContextId;
use crate::handle::IncubatorId;
use crate::handle::ObjectId;
use crate::incubator;
use crate::incubator::IncubationController;
use crate::incubator::IncubationMode;
use crate::incubator::IncubatorStatus;
use crate::interrupt::Interrupt;
use crate::registry::TypeRegistry;
use crate::store::ObjectStore;
use crate::value::Value;
use diagnostics::Diagnostic;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// Everything the object graph creator needs mutable access to while it
/// runs. Split from the incubation controller so a suspended incubator's
/// creator can be resumed against the same stores without aliasing them.
pub(crate) struct CoreState {
  pub objects: ObjectStore,
  pub contexts: ContextStore,
  pub registry: TypeRegistry,
  pub evaluator: Box<dyn ExpressionEvaluator>,
}

/// The engine.
pub struct Runtime {
  pub(crate) core: CoreState,
  pub(crate) incubation: IncubationController,
  /// Concurrently pending component begin/complete pairs.
  pub(crate) creation_depth: u32,
}

impl Runtime {
  pub fn new(registry: TypeRegistry, evaluator: Box<dyn ExpressionEvaluator>) -> Self {
    Self {
      core: CoreState {
        objects: ObjectStore::new(),
        contexts: ContextStore::new(),
        registry,
        evaluator,
      },
      incubation: IncubationController::new(),
      creation_depth: 0,
    }
  }

  pub fn objects(&self) -> &ObjectStore {
    &self.core.objects
  }

  pub fn objects_mut(&mut self) -> &mut ObjectStore {
    &mut self.core.objects
  }

  pub fn contexts(&self) -> &ContextStore {
    &self.core.contexts
  }

  pub fn registry(&self) -> &TypeRegistry {
    &self.core.registry
  }

  pub fn registry_mut(&mut self) -> &mut TypeRegistry {
    &mut self.core.registry
  }

  /// Read a property by name on an instance, following aliases.
  pub fn read_property(&self, object: ObjectId, name: &str) -> Option<Value> {
    let instance = self.core.objects.get(object)?;
    let (slot, _) = instance.cache.property(name)?;
    self.core.objects.read_property(object, slot).ok()
  }

  /// Tear down an object tree: the instance, every instance parented under
  /// it, and the creation contexts the tree owns.
  pub fn destroy_object(&mut self, object: ObjectId) {
    let owned_contexts = match self.core.objects.get(object) {
      Some(instance) => instance.owned_contexts.clone(),
      None => return,
    };
    self.core.objects.free_tree(object);
    for context in owned_contexts {
      self.core.contexts.free(context);
    }
  }

  /// Activate deferred bindings on a constructed object — all of them, or
  /// those of one property.
  pub fn activate_deferred(&mut self, object: ObjectId, property: Option<&str>) -> Vec<Diagnostic> {
    creator::activate_deferred(&mut self.core, object, property)
  }

  // Incubation API.

  pub fn new_incubator(&mut self, mode: IncubationMode) -> IncubatorId {
    self.incubation.create(mode)
  }

  pub fn incubator_status(&self, id: IncubatorId) -> IncubatorStatus {
    self.incubation.status(id)
  }

  pub fn incubator_errors(&self, id: IncubatorId) -> &[Diagnostic] {
    self.incubation.errors(id)
  }

  /// The incubated root, observable without claiming ownership.
  pub fn incubator_result(&self, id: IncubatorId) -> Option<ObjectId> {
    self.incubation.result(id)
  }

  /// Claim the incubated root; ownership of the graph transfers to the
  /// caller and survives a later `clear_incubator`.
  pub fn take_incubator_result(&mut self, id: IncubatorId) -> Option<ObjectId> {
    incubator::take_result(&mut self.incubation, &mut self.core, id)
  }

  /// Overrides applied once the incubated root instance exists.
  pub fn set_incubator_initial_properties(
    &mut self,
    id: IncubatorId,
    properties: Vec<(String, Value)>,
  ) {
    self.incubation.set_initial_properties(id, properties);
  }

  /// Advance one incubator under an explicit interrupt predicate.
  pub fn incubate(&mut self, id: IncubatorId, interrupt: &Interrupt) {
    incubator::incubate(&mut self.incubation, &mut self.core, id, interrupt);
  }

  /// Run an incubator to completion, draining everything it waits on first.
  pub fn force_completion(&mut self, id: IncubatorId) {
    incubator::force_completion(&mut self.incubation, &mut self.core, id);
  }

  /// Incubate for at most `duration`, servicing the oldest pending
  /// asynchronous incubator per quantum.
  pub fn incubate_for(&mut self, duration: Duration) {
    let interrupt = Interrupt::deadline(duration);
    incubator::drive(&mut self.incubation, &mut self.core, &interrupt);
  }

  /// Incubate while `flag` reads `true`, optionally bounded by `duration`.
  pub fn incubate_while(&mut self, flag: Arc<AtomicBool>, duration: Option<Duration>) {
    let interrupt = Interrupt::while_true(flag, duration);
    incubator::drive(&mut self.incubation, &mut self.core, &interrupt);
  }

  /// Reset an incubator to `Null`, releasing unclaimed instances and
  /// detaching it from the wait-for DAG in both directions.
  pub fn clear_incubator(&mut self, id: IncubatorId) {
    incubator::clear(&mut self.incubation, &mut self.core, id);
  }

  pub fn incubating_object_count(&self) -> usize {
    self.incubation.incubating_count()
  }

  /// Host callback invoked whenever the incubating-object count changes.
  pub fn set_incubation_count_callback(&mut self, callback: Option<fn(usize)>) {
    self.incubation.set_count_changed(callback);
  }

  /// Whether incubator `id` currently waits on `dependency`.
  pub fn incubator_is_waiting_on(&self, id: IncubatorId, dependency: IncubatorId) -> bool {
    self.incubation.is_waiting_on(id, dependency)
  }

  /// The root creation context of an incubating operation. Nested
  /// incubations pass this as their parent context.
  pub fn incubator_context(&self, id: IncubatorId) -> Option<ContextId> {
    self.incubation.context(id)
  }
}

impl std::fmt::Debug for Runtime {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Runtime")
      .field("objects", &self.core.objects)
      .field("registry", &self.core.registry)
      .field("incubating", &self.incubation.incubating_count())
      .finish()
  }
}
