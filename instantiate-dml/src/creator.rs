//! The object graph creator.
//!
//! Walks a compiled unit's object tables and produces the live,
//! interconnected instance graph. Construction is a resumable machine with
//! two creation phases and a finalize drain:
//!
//! - `CreatingObjects` instantiates every object of the tree depth-first in
//!   declared order: type resolution, composite recursion, id-map installs,
//!   required scans, construction-begin hooks, declared-function installs.
//!   Plain object-valued bindings define the tree structure and enqueue
//!   child work.
//! - `CreatingObjectsPhase2` applies each object's binding table in declared
//!   order. One object's pass runs to completion atomically — an object is
//!   never observed half-bound — and the interrupt predicate is only
//!   consulted between objects. Alias declarations resolve at the end of the
//!   phase, followed by exactly one retry pass over bindings that targeted
//!   then-unresolved aliases.
//! - `Finalizing` drains, in order: installed expression bindings (each
//!   evaluated once and discarded again if constant), reactive-slot
//!   bindings, construction-complete hooks, finalize hooks, and completed
//!   notifications. Every drain is pop-one-check-interrupt resumable.
//!
//! Failure of one object aborts its remaining siblings but never rolls back
//! already-created instances; rollback is the owner's explicit [`clear`]
//! call.
//!
//! [`clear`]: ObjectCreator::clear

use crate::binding::BindingTarget;
use crate::binding::DeferredBlock;
use crate::binding::PendingBinding;
use crate::compiled::BindingFlags;
use crate::compiled::CompiledBinding;
use crate::compiled::CompiledUnit;
use crate::compiled::CompiledValue;
use crate::compiled::ObjectFlags;
use crate::compiled::ObjectIndex;
use crate::compiled::Revision;
use crate::convert::convert;
use crate::error::codes;
use crate::handle::ContextId;
use crate::handle::IncubatorId;
use crate::handle::ObjectId;
use crate::interrupt::Interrupt;
use crate::propcache::build_object_cache;
use crate::propcache::PropertyFlags;
use crate::registry::NativeClassId;
use crate::required::AliasCandidate;
use crate::required::RequiredPropertiesTracker;
use crate::required::RequiredPropertyInfo;
use crate::runtime::CoreState;
use crate::error::StoreError;
use crate::store::AliasResolution;
use crate::store::Instance;
use crate::value::ComponentRef;
use crate::value::PropertyType;
use crate::value::Value;
use ahash::AHashMap;
use diagnostics::Diagnostic;
use diagnostics::Span;
use std::collections::VecDeque;
use std::sync::Arc;

/// Composite nesting deeper than this aborts the pass as a resource error
/// instead of overflowing the native call stack.
pub(crate) const MAX_COMPOSITE_DEPTH: u32 = 10;

/// Construction phases of a creator.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CreatorPhase {
  Startup,
  CreatingObjects,
  /// Binding application; re-entrant `create` calls are rejected here.
  CreatingObjectsPhase2,
  ObjectsCreated,
  Finalizing,
  Done,
}

/// Outcome of one `execute` slice.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CreatorProgress {
  /// The interrupt predicate fired; call `execute` again to resume.
  Interrupted,
  /// Creation ran to the `ObjectsCreated` phase (possibly with errors).
  Finished,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum FinalizeStage {
  Bindings,
  ReactiveBindings,
  CompleteHooks,
  FinalizeHooks,
  CompletedNotify,
}

struct CreateJob {
  unit: Arc<CompiledUnit>,
  context: ContextId,
  index: ObjectIndex,
  parent: Option<ObjectId>,
  /// `(owner, binding index)` whose value the created object becomes.
  dest: Option<(ObjectId, u32)>,
  /// Jobs sharing a group are siblings; a failure aborts the rest of its
  /// group.
  sibling_group: u32,
}

struct BindJob {
  unit: Arc<CompiledUnit>,
  context: ContextId,
  index: ObjectIndex,
  instance: ObjectId,
}

struct AliasDeclJob {
  unit: Arc<CompiledUnit>,
  context: ContextId,
  instance: ObjectId,
  /// Index into the compiled object's alias table.
  object_index: ObjectIndex,
  alias_index: usize,
}

struct RetryBinding {
  unit: Arc<CompiledUnit>,
  context: ContextId,
  object_index: ObjectIndex,
  binding_index: u32,
  instance: ObjectId,
}

#[derive(Clone, Copy)]
enum BindMode {
  /// Initial pass: deferred bindings are collected, not applied.
  Initial,
  /// Deferred activation: only the listed binding indices apply, and plain
  /// object payloads create their subtrees on demand.
  Deferred,
  /// Alias retry: an unresolved alias target is now a structural error.
  AliasRetry,
}

impl BindMode {
  fn allows_alias_queue(self) -> bool {
    !matches!(self, BindMode::AliasRetry)
  }
}

/// The resumable object graph builder.
pub struct ObjectCreator {
  unit: Arc<CompiledUnit>,
  start_index: ObjectIndex,
  phase: CreatorPhase,
  finalize_stage: FinalizeStage,
  root_context: ContextId,
  root_object: Option<ObjectId>,
  fatal: bool,

  errors: Vec<Diagnostic>,
  created: Vec<ObjectId>,
  contexts_created: Vec<ContextId>,

  create_stack: Vec<CreateJob>,
  bind_jobs: VecDeque<BindJob>,
  pending_bindings: VecDeque<PendingBinding>,
  pending_reactive: VecDeque<PendingBinding>,
  complete_hooks: VecDeque<ObjectId>,
  finalize_hooks: VecDeque<ObjectId>,
  completed_notify: VecDeque<ObjectId>,
  required: RequiredPropertiesTracker,
  alias_decls: Vec<AliasDeclJob>,
  retry_bindings: Vec<RetryBinding>,
  /// Child instance created for `(owner, binding index)`.
  object_for_binding: AHashMap<(ObjectId, u32), ObjectId>,

  next_sibling_group: u32,
  composite_depth: u32,
  result_claimed: bool,
  cleared: bool,
}

impl ObjectCreator {
  /// Set up a creator for `unit` (or one of its inline sub-objects).
  ///
  /// Enforces the bound-component invariant up front: a compiled object
  /// flagged as bound to its creation context cannot be instantiated from
  /// outside a context chain defined by its unit.
  pub(crate) fn new(
    core: &mut CoreState,
    unit: Arc<CompiledUnit>,
    sub_index: Option<ObjectIndex>,
    parent_context: Option<ContextId>,
    incubator: Option<IncubatorId>,
  ) -> Result<Self, Diagnostic> {
    let start_index = sub_index.unwrap_or(unit.root);
    let Some(obj) = unit.get_object(start_index) else {
      return Err(Diagnostic::error(
        codes::UNRESOLVED_TYPE,
        format!("compiled unit has no object at index {}", start_index.0),
        Span::new(unit.file, diagnostics::TextRange::EMPTY),
      ));
    };
    if obj.flags.contains(ObjectFlags::BOUND_COMPONENT) {
      let inside = parent_context.is_some_and(|ctx| core.contexts.unit_in_chain(ctx, &unit));
      if !inside {
        return Err(Diagnostic::error(
          codes::BOUND_COMPONENT_OUTSIDE_CONTEXT,
          "bound component cannot be instantiated outside its creation context",
          unit.span(obj.loc),
        ));
      }
    }

    let root_context = core.contexts.alloc(parent_context, unit.clone(), incubator);
    Ok(Self {
      unit,
      start_index,
      phase: CreatorPhase::Startup,
      finalize_stage: FinalizeStage::Bindings,
      root_context,
      root_object: None,
      fatal: false,
      errors: Vec::new(),
      created: Vec::new(),
      contexts_created: vec![root_context],
      create_stack: Vec::new(),
      bind_jobs: VecDeque::new(),
      pending_bindings: VecDeque::new(),
      pending_reactive: VecDeque::new(),
      complete_hooks: VecDeque::new(),
      finalize_hooks: VecDeque::new(),
      completed_notify: VecDeque::new(),
      required: RequiredPropertiesTracker::new(),
      alias_decls: Vec::new(),
      retry_bindings: Vec::new(),
      object_for_binding: AHashMap::new(),
      next_sibling_group: 0,
      composite_depth: 0,
      result_claimed: false,
      cleared: false,
    })
  }

  pub fn phase(&self) -> CreatorPhase {
    self.phase
  }

  pub fn root_object(&self) -> Option<ObjectId> {
    self.root_object
  }

  pub fn root_context(&self) -> ContextId {
    self.root_context
  }

  pub fn errors(&self) -> &[Diagnostic] {
    &self.errors
  }

  pub(crate) fn take_errors(&mut self) -> Vec<Diagnostic> {
    std::mem::take(&mut self.errors)
  }

  pub(crate) fn record_error(&mut self, diagnostic: Diagnostic) {
    self.errors.push(diagnostic);
  }

  /// Advance creation until the tree is built or the interrupt fires.
  /// Returns `Finished` once the `ObjectsCreated` phase is reached; the
  /// finalize drains are a separate entry point ([`ObjectCreator::finalize`]).
  pub(crate) fn execute(&mut self, core: &mut CoreState, interrupt: &Interrupt) -> CreatorProgress {
    loop {
      match self.phase {
        CreatorPhase::Startup => {
          tracing::debug!(objects = self.unit.object_count(), "starting creation pass");
          let group = self.next_group();
          self.create_stack.push(CreateJob {
            unit: self.unit.clone(),
            context: self.root_context,
            index: self.start_index,
            parent: None,
            dest: None,
            sibling_group: group,
          });
          self.phase = CreatorPhase::CreatingObjects;
        }

        CreatorPhase::CreatingObjects => {
          let Some(job) = self.create_stack.pop() else {
            self.phase = CreatorPhase::CreatingObjectsPhase2;
            continue;
          };
          let is_root = self.root_object.is_none();
          let created = self.create_object(core, job);
          if is_root {
            self.root_object = created;
          }
          if self.fatal {
            self.create_stack.clear();
            self.bind_jobs.clear();
            self.phase = CreatorPhase::ObjectsCreated;
            return CreatorProgress::Finished;
          }
          if interrupt.should_interrupt() {
            return CreatorProgress::Interrupted;
          }
        }

        CreatorPhase::CreatingObjectsPhase2 => {
          let Some(job) = self.bind_jobs.pop_front() else {
            self.resolve_aliases(core);
            self.phase = CreatorPhase::ObjectsCreated;
            return CreatorProgress::Finished;
          };
          let unit = job.unit.clone();
          self.apply_bindings(core, &unit, job.context, job.index, job.instance, BindMode::Initial);
          if interrupt.should_interrupt() {
            return CreatorProgress::Interrupted;
          }
        }

        CreatorPhase::ObjectsCreated | CreatorPhase::Finalizing | CreatorPhase::Done => {
          return CreatorProgress::Finished;
        }
      }
    }
  }

  fn next_group(&mut self) -> u32 {
    self.next_sibling_group += 1;
    self.next_sibling_group
  }

  /// Abort the not-yet-created siblings of a failed object.
  fn abort_sibling_group(&mut self, group: u32) {
    self.create_stack.retain(|job| job.sibling_group != group);
  }

  fn create_object(&mut self, core: &mut CoreState, job: CreateJob) -> Option<ObjectId> {
    let unit = job.unit.clone();
    let obj = unit.object(job.index);
    let type_name = unit.str_at(obj.type_name).to_string();

    let Some(resolved) = core.registry.resolve(&type_name, obj.type_version) else {
      self.errors.push(Diagnostic::error(
        codes::UNRESOLVED_TYPE,
        format!("{type_name} is not a type"),
        unit.span(obj.loc),
      ));
      self.abort_sibling_group(job.sibling_group);
      return None;
    };

    let id = match resolved {
      crate::registry::ResolvedType::Native {
        class,
        cache,
        constructible,
      } => {
        if !constructible {
          self.errors.push(Diagnostic::error(
            codes::NOT_CONSTRUCTIBLE,
            format!("{type_name} cannot be created directly"),
            unit.span(obj.loc),
          ));
          self.abort_sibling_group(job.sibling_group);
          return None;
        }
        let cache = if obj.declares_members() {
          build_object_cache(cache, &unit, obj, &mut self.errors)
        } else {
          cache
        };
        let mut instance = Instance::new(Some(class), cache);
        instance.parent = job.parent;
        instance.context = Some(job.context);
        let id = core.objects.alloc(instance);
        self.created.push(id);
        if let Some(parent) = job.parent {
          core.objects.instance_mut(parent).children.push(id);
        }
        self.enqueue_lifecycle_hooks(core, class, id);
        if let Some(hook) = core.registry.class(class).capabilities.construction_begin {
          hook(&mut core.objects, id);
        }
        id
      }

      crate::registry::ResolvedType::Composite { unit: inner } => {
        if self.composite_depth >= MAX_COMPOSITE_DEPTH {
          self.errors.push(Diagnostic::error(
            codes::STACK_BUDGET,
            "maximum call stack size exceeded",
            unit.span(obj.loc),
          ));
          self.fatal = true;
          return None;
        }
        let inner_context = core.contexts.alloc(Some(job.context), inner.clone(), None);
        self.contexts_created.push(inner_context);
        let group = self.next_group();
        self.composite_depth += 1;
        let created = self.create_object(
          core,
          CreateJob {
            unit: inner.clone(),
            context: inner_context,
            index: inner.root,
            parent: job.parent,
            dest: None,
            sibling_group: group,
          },
        );
        self.composite_depth -= 1;
        let Some(id) = created else {
          self.abort_sibling_group(job.sibling_group);
          return None;
        };
        // The outer document may extend the composite instance with members
        // of its own; they stack on top of the inner unit's descriptor.
        if obj.declares_members() {
          let base = core.objects.instance(id).cache.clone();
          let cache = build_object_cache(base, &unit, obj, &mut self.errors);
          let instance = core.objects.instance_mut(id);
          instance.cache = cache;
          instance.sync_slots();
        }
        id
      }
    };

    self.register_object(core, &unit, job, id);
    Some(id)
  }

  /// Bookkeeping common to native and composite instantiation: id-map
  /// install, required scans, declared functions, alias collection, bind
  /// job, and child jobs for the plain object-valued bindings.
  fn register_object(&mut self, core: &mut CoreState, unit: &Arc<CompiledUnit>, job: CreateJob, id: ObjectId) {
    let obj = unit.object(job.index);

    if let Some(name_index) = obj.id {
      let name = unit.str_at(name_index).to_string();
      core.contexts.register_name(job.context, &name, id);
      core.objects.instance_mut(id).id_name = Some(name);
    }

    if let Some(dest) = job.dest {
      self.object_for_binding.insert(dest, id);
    }

    self.scan_required(core, unit, job.index, id);

    // Declared functions become method-slot values on the instance.
    let cache = core.objects.instance(id).cache.clone();
    for function in &obj.functions {
      let name = unit.str_at(function.name);
      if let Some((index, _)) = cache.method(name) {
        core.objects.instance_mut(id).methods.insert(index, function.body);
      }
    }

    for alias_index in 0..obj.aliases.len() {
      self.alias_decls.push(AliasDeclJob {
        unit: unit.clone(),
        context: job.context,
        instance: id,
        object_index: job.index,
        alias_index,
      });
    }

    self.bind_jobs.push_back(BindJob {
      unit: unit.clone(),
      context: job.context,
      index: job.index,
      instance: id,
    });

    // Plain object-valued bindings are the tree structure; everything else
    // (group/attached/on-assignment payloads, component declarations,
    // deferred subtrees) materializes during binding application.
    let group = self.next_group();
    let mut children = Vec::new();
    for (binding_index, binding) in obj.bindings.iter().enumerate() {
      if binding.flags.intersects(
        BindingFlags::GROUP | BindingFlags::ATTACHED | BindingFlags::DEFERRED,
      ) {
        continue;
      }
      let CompiledValue::Object(child_index) = binding.value else {
        continue;
      };
      if unit.object(child_index).flags.contains(ObjectFlags::IS_COMPONENT) {
        continue;
      }
      children.push(CreateJob {
        unit: unit.clone(),
        context: job.context,
        index: child_index,
        parent: Some(id),
        dest: Some((id, binding_index as u32)),
        sibling_group: group,
      });
    }
    for child in children.into_iter().rev() {
      self.create_stack.push(child);
    }
  }

  fn enqueue_lifecycle_hooks(&mut self, core: &CoreState, class: NativeClassId, id: ObjectId) {
    let capabilities = &core.registry.class(class).capabilities;
    if capabilities.construction_complete.is_some() {
      self.complete_hooks.push_back(id);
    }
    if capabilities.finalize.is_some() {
      self.finalize_hooks.push_back(id);
    }
    if capabilities.completed.is_some() {
      self.completed_notify.push_back(id);
    }
  }

  /// Record this object's unset required properties.
  ///
  /// If the nominal type is native, the entire flattened descriptor is
  /// scanned — hand-written native ancestors may declare required properties
  /// of their own. If it is composite, only the slots introduced at this
  /// level are scanned: the ancestor unit's own builder pass already covered
  /// its levels.
  fn scan_required(&mut self, core: &mut CoreState, unit: &Arc<CompiledUnit>, index: ObjectIndex, id: ObjectId) {
    let obj = unit.object(index);
    let type_name = unit.str_at(obj.type_name);
    let is_composite = matches!(
      core.registry.resolve(type_name, obj.type_version),
      Some(crate::registry::ResolvedType::Composite { .. })
    );
    let cache = core.objects.instance(id).cache.clone();
    let span = unit.span(obj.loc);

    let mark = |tracker: &mut RequiredPropertiesTracker, slot: u32, name: &str| {
      tracker.mark_required(
        id,
        slot,
        RequiredPropertyInfo {
          property_name: name.to_string(),
          span,
          aliases: Vec::new(),
        },
      );
    };

    if is_composite {
      for (slot, data) in cache.local_properties() {
        if data.flags.contains(PropertyFlags::REQUIRED) {
          mark(&mut self.required, slot, &data.name);
        }
      }
    } else {
      for (slot, data) in cache.all_properties() {
        if data.flags.contains(PropertyFlags::REQUIRED) {
          mark(&mut self.required, slot, &data.name);
        }
      }
    }

    // `required existing` markers on inherited properties.
    for name_index in &obj.required {
      let name = unit.str_at(*name_index);
      match cache.property(name) {
        Some((slot, data)) => {
          let name = data.name.clone();
          mark(&mut self.required, slot, &name);
        }
        None => self.errors.push(Diagnostic::error(
          codes::NO_SUCH_PROPERTY,
          format!("required property \"{name}\" does not exist"),
          span,
        )),
      }
    }
  }

  fn apply_bindings(
    &mut self,
    core: &mut CoreState,
    unit: &Arc<CompiledUnit>,
    context: ContextId,
    index: ObjectIndex,
    target: ObjectId,
    mode: BindMode,
  ) {
    let obj = unit.object(index);
    let mut deferred = Vec::new();
    for (binding_index, binding) in obj.bindings.iter().enumerate() {
      if matches!(mode, BindMode::Initial) && binding.flags.contains(BindingFlags::DEFERRED) {
        deferred.push(binding_index as u32);
        continue;
      }
      self.apply_one_binding(core, unit, context, index, binding_index as u32, binding, target, mode);
    }
    if !deferred.is_empty() {
      core.objects.instance_mut(target).deferred.push(DeferredBlock {
        object_index: index,
        bindings: deferred,
      });
    }
  }

  /// Apply exactly the listed deferred binding indices of one block.
  fn apply_deferred_subset(
    &mut self,
    core: &mut CoreState,
    unit: &Arc<CompiledUnit>,
    context: ContextId,
    index: ObjectIndex,
    target: ObjectId,
    bindings: &[u32],
  ) {
    let obj = unit.object(index);
    for &binding_index in bindings {
      let Some(binding) = obj.bindings.get(binding_index as usize) else {
        continue;
      };
      self.apply_one_binding(
        core,
        unit,
        context,
        index,
        binding_index,
        binding,
        target,
        BindMode::Deferred,
      );
    }
  }

  #[allow(clippy::too_many_arguments)]
  fn apply_one_binding(
    &mut self,
    core: &mut CoreState,
    unit: &Arc<CompiledUnit>,
    context: ContextId,
    object_index: ObjectIndex,
    binding_index: u32,
    binding: &CompiledBinding,
    target: ObjectId,
    mode: BindMode,
  ) {
    let name = unit.str_at(binding.property).to_string();
    let span = unit.span(binding.loc);

    if binding.flags.contains(BindingFlags::SIGNAL_HANDLER) {
      self.apply_signal_handler(core, unit, context, binding, target, &name, span);
      return;
    }
    if binding.flags.contains(BindingFlags::ATTACHED) {
      self.apply_attached(core, unit, context, binding, target, &name, span, mode);
      return;
    }
    if binding.flags.contains(BindingFlags::GROUP) {
      self.apply_group(core, unit, context, binding, target, &name, span, mode);
      return;
    }
    if binding.flags.contains(BindingFlags::ON_ASSIGNMENT) {
      self.apply_on_assignment(core, unit, context, binding_index, binding, target, &name, span, mode);
      return;
    }

    match &binding.value {
      CompiledValue::Literal(literal) => {
        let Some((slot, ty, flags, prop_name)) = self.resolve_property(core, target, &name, span)
        else {
          return;
        };
        if flags.contains(PropertyFlags::READ_ONLY) {
          self.errors.push(Diagnostic::error(
            codes::READ_ONLY_PROPERTY,
            format!("invalid property assignment: \"{prop_name}\" is a read-only property"),
            span,
          ));
          return;
        }
        if self.queue_if_unresolved_alias(
          core,
          unit,
          context,
          object_index,
          binding_index,
          target,
          slot,
          flags,
          mode,
          span,
          &prop_name,
        ) {
          return;
        }
        let value = literal.to_value();
        self.write_value(core, target, slot, &ty, &value, span);
      }
      CompiledValue::Script(expr) => {
        let Some((slot, _ty, flags, prop_name)) = self.resolve_property(core, target, &name, span)
        else {
          return;
        };
        if flags.contains(PropertyFlags::READ_ONLY) {
          self.errors.push(Diagnostic::error(
            codes::READ_ONLY_PROPERTY,
            format!("invalid property assignment: \"{prop_name}\" is a read-only property"),
            span,
          ));
          return;
        }
        if self.queue_if_unresolved_alias(
          core,
          unit,
          context,
          object_index,
          binding_index,
          target,
          slot,
          flags,
          mode,
          span,
          &prop_name,
        ) {
          return;
        }
        self.install_expression(core, context, target, slot, prop_name, *expr, span);
      }
      CompiledValue::Object(child_index) => {
        self.assign_object_binding(
          core,
          unit,
          context,
          object_index,
          binding_index,
          *child_index,
          target,
          &name,
          span,
          mode,
        );
      }
    }
  }

  /// Resolve the (possibly default) property `name` on `target`. Records a
  /// property error and returns `None` when it does not exist.
  fn resolve_property(
    &mut self,
    core: &CoreState,
    target: ObjectId,
    name: &str,
    span: Span,
  ) -> Option<(u32, PropertyType, PropertyFlags, String)> {
    let cache = core.objects.instance(target).cache.clone();
    let effective = if name.is_empty() {
      match cache.default_property_name() {
        Some(default) => default.to_string(),
        None => {
          self.errors.push(Diagnostic::error(
            codes::NO_SUCH_PROPERTY,
            "type has no default property",
            span,
          ));
          return None;
        }
      }
    } else {
      name.to_string()
    };
    match cache.property(&effective) {
      Some((slot, data)) => Some((slot, data.ty.clone(), data.flags, data.name.clone())),
      None => {
        self.errors.push(Diagnostic::error(
          codes::NO_SUCH_PROPERTY,
          format!("cannot assign to non-existent property \"{effective}\""),
          span,
        ));
        None
      }
    }
  }

  /// Queue a binding for the post-phase alias retry pass if its target
  /// alias has not been resolved yet. Returns whether it was queued.
  fn queue_if_unresolved_alias(
    &mut self,
    core: &CoreState,
    unit: &Arc<CompiledUnit>,
    context: ContextId,
    object_index: ObjectIndex,
    binding_index: u32,
    target: ObjectId,
    slot: u32,
    flags: PropertyFlags,
    mode: BindMode,
    span: Span,
    name: &str,
  ) -> bool {
    if !flags.contains(PropertyFlags::ALIAS) {
      return false;
    }
    match core.objects.resolve_alias(target, slot) {
      Ok(_) => false,
      Err(StoreError::UnresolvedAlias) if mode.allows_alias_queue() => {
        self.retry_bindings.push(RetryBinding {
          unit: unit.clone(),
          context,
          object_index,
          binding_index,
          instance: target,
        });
        true
      }
      Err(_) => {
        self.errors.push(Diagnostic::error(
          codes::UNRESOLVED_ALIAS_TARGET,
          format!("alias property \"{name}\" has no resolved target"),
          span,
        ));
        true
      }
    }
  }

  /// Literal path: convert, write through aliases, clear any previous
  /// binding on the canonical slot, satisfy the required tracker.
  fn write_value(
    &mut self,
    core: &mut CoreState,
    target: ObjectId,
    slot: u32,
    ty: &PropertyType,
    value: &Value,
    span: Span,
  ) -> bool {
    let converted = match convert(value, ty) {
      Ok(converted) => converted,
      Err(message) => {
        self.errors.push(Diagnostic::error(
          codes::INVALID_ASSIGNMENT,
          format!("invalid property assignment: {message}"),
          span,
        ));
        return false;
      }
    };
    match core.objects.write_property(target, slot, converted) {
      Ok((object, canonical)) => {
        core.objects.remove_binding(object, canonical);
        self.required.satisfy(object, canonical);
        true
      }
      Err(StoreError::ObjectAlias) => {
        self.errors.push(Diagnostic::error(
          codes::READ_ONLY_PROPERTY,
          "cannot assign to an object alias",
          span,
        ));
        false
      }
      Err(StoreError::UnresolvedAlias) => {
        self.errors.push(Diagnostic::error(
          codes::UNRESOLVED_ALIAS_TARGET,
          "alias target could not be resolved",
          span,
        ));
        false
      }
      Err(_) => false,
    }
  }

  fn install_expression(
    &mut self,
    core: &mut CoreState,
    context: ContextId,
    target: ObjectId,
    slot: u32,
    prop_name: String,
    expr: crate::compiled::ExprIndex,
    span: Span,
  ) {
    // Install on the canonical slot so later literal writes replace it.
    let (object, canonical) = match core.objects.resolve_alias(target, slot) {
      Ok(AliasResolution::Slot(object, canonical)) => (object, canonical),
      Ok(AliasResolution::Object(_)) => {
        self.errors.push(Diagnostic::error(
          codes::READ_ONLY_PROPERTY,
          "cannot assign to an object alias",
          span,
        ));
        return;
      }
      Err(_) => {
        self.errors.push(Diagnostic::error(
          codes::UNRESOLVED_ALIAS_TARGET,
          format!("alias property \"{prop_name}\" has no resolved target"),
          span,
        ));
        return;
      }
    };

    let reactive = core
      .objects
      .instance(object)
      .cache
      .property_at(canonical)
      .is_some_and(|data| data.flags.contains(PropertyFlags::REACTIVE));

    let binding_target = BindingTarget {
      object,
      property: canonical,
      field: None,
      context,
    };
    let live = core.evaluator.create_binding(expr, &binding_target);
    core.objects.install_binding(object, (canonical, None), live);
    self.required.satisfy(object, canonical);

    let pending = PendingBinding {
      object,
      property: canonical,
      field: None,
      property_name: prop_name,
      span,
    };
    if reactive {
      self.pending_reactive.push_back(pending);
    } else {
      self.pending_bindings.push_back(pending);
    }
  }

  fn apply_signal_handler(
    &mut self,
    core: &mut CoreState,
    unit: &Arc<CompiledUnit>,
    context: ContextId,
    binding: &CompiledBinding,
    target: ObjectId,
    name: &str,
    span: Span,
  ) {
    let cache = core.objects.instance(target).cache.clone();
    let Some((signal, _)) = cache.signal(name) else {
      self.errors.push(Diagnostic::error(
        codes::NO_SUCH_SIGNAL,
        format!("cannot assign a handler to non-existent signal \"{name}\""),
        span,
      ));
      return;
    };
    let CompiledValue::Script(expr) = &binding.value else {
      self.errors.push(Diagnostic::error(
        codes::INVALID_ASSIGNMENT,
        format!("signal \"{name}\" requires a script handler"),
        unit.span(binding.loc),
      ));
      return;
    };
    core.objects.instance_mut(target).bound_signals.push(crate::binding::BoundSignal {
      signal,
      expr: *expr,
      context,
      span,
    });
  }

  #[allow(clippy::too_many_arguments)]
  fn apply_attached(
    &mut self,
    core: &mut CoreState,
    unit: &Arc<CompiledUnit>,
    context: ContextId,
    binding: &CompiledBinding,
    target: ObjectId,
    name: &str,
    span: Span,
    mode: BindMode,
  ) {
    let CompiledValue::Object(nested_index) = binding.value else {
      self.errors.push(Diagnostic::error(
        codes::UNRESOLVED_ATTACHED_OBJECT,
        format!("malformed attached property block for \"{name}\""),
        span,
      ));
      return;
    };

    let attached_class = match core.registry.resolve(name, Revision::MAX) {
      Some(crate::registry::ResolvedType::Native { class, .. }) => {
        core.registry.class(class).attached_type.clone()
      }
      _ => None,
    };
    let Some(attached_class) = attached_class else {
      self.errors.push(Diagnostic::error(
        codes::UNRESOLVED_ATTACHED_OBJECT,
        format!("non-existent attached object \"{name}\""),
        span,
      ));
      return;
    };
    let Some(crate::registry::ResolvedType::Native { class, cache, .. }) =
      core.registry.resolve(&attached_class, Revision::MAX)
    else {
      self.errors.push(Diagnostic::error(
        codes::UNRESOLVED_ATTACHED_OBJECT,
        format!("attachment class \"{attached_class}\" is not registered"),
        span,
      ));
      return;
    };

    // An attachment object's own required properties can never be satisfied
    // by the attaching document.
    if cache
      .all_properties()
      .iter()
      .any(|(_, data)| data.flags.contains(PropertyFlags::REQUIRED))
    {
      self.errors.push(Diagnostic::error(
        codes::ATTACHED_REQUIRED_PROPERTIES,
        format!("attached property \"{name}\" has required sub-properties"),
        span,
      ));
      return;
    }

    let attachment = match core.objects.instance(target).attached.get(&class) {
      Some(existing) => *existing,
      None => {
        let mut instance = Instance::new(Some(class), cache);
        instance.parent = Some(target);
        instance.context = Some(context);
        let id = core.objects.alloc(instance);
        self.created.push(id);
        core.objects.instance_mut(target).children.push(id);
        core.objects.instance_mut(target).attached.insert(class, id);
        self.enqueue_lifecycle_hooks(core, class, id);
        if let Some(hook) = core.registry.class(class).capabilities.construction_begin {
          hook(&mut core.objects, id);
        }
        id
      }
    };

    // The nested sub-graph applies onto the attachment object.
    self.apply_bindings(core, unit, context, nested_index, attachment, mode);
  }

  #[allow(clippy::too_many_arguments)]
  fn apply_group(
    &mut self,
    core: &mut CoreState,
    unit: &Arc<CompiledUnit>,
    context: ContextId,
    binding: &CompiledBinding,
    target: ObjectId,
    name: &str,
    span: Span,
    mode: BindMode,
  ) {
    let CompiledValue::Object(nested_index) = binding.value else {
      self.errors.push(Diagnostic::error(
        codes::INVALID_GROUP_TARGET,
        format!("malformed group property block for \"{name}\""),
        span,
      ));
      return;
    };

    // Case 1: the name is an id in scope; the nested bindings follow it.
    if let Some(existing) = core.contexts.lookup_name(context, name) {
      self.apply_bindings(core, unit, context, nested_index, existing, mode);
      return;
    }

    let Some((slot, _ty, _flags, prop_name)) = self.resolve_property(core, target, name, span)
    else {
      return;
    };
    let current = match core.objects.read_property(target, slot) {
      Ok(value) => value,
      Err(_) => {
        self.errors.push(Diagnostic::error(
          codes::INVALID_GROUP_TARGET,
          format!("cannot read group property \"{prop_name}\""),
          span,
        ));
        return;
      }
    };

    if current.is_value_type() {
      // Case 2: a value-type wrapper — copy semantics. Read the wrapper,
      // apply the nested bindings to its fields, write it back explicitly.
      let mut wrapper = current;
      self.apply_group_value(core, unit, context, nested_index, target, slot, &mut wrapper);
      if core.objects.write_property(target, slot, wrapper).is_ok() {
        if let Ok(AliasResolution::Slot(object, canonical)) = core.objects.resolve_alias(target, slot) {
          self.required.satisfy(object, canonical);
        }
      }
      return;
    }

    match current {
      // Case 3: an object-valued sub-property — reference semantics.
      Value::Object(sub_object) => {
        self.apply_bindings(core, unit, context, nested_index, sub_object, mode);
      }
      _ => self.errors.push(Diagnostic::error(
        codes::INVALID_GROUP_TARGET,
        format!("cannot set group properties on \"{prop_name}\""),
        span,
      )),
    }
  }

  /// Nested bindings of a group targeting a value-type wrapper.
  #[allow(clippy::too_many_arguments)]
  fn apply_group_value(
    &mut self,
    core: &mut CoreState,
    unit: &Arc<CompiledUnit>,
    context: ContextId,
    nested_index: ObjectIndex,
    owner: ObjectId,
    owner_slot: u32,
    wrapper: &mut Value,
  ) {
    let nested = unit.object(nested_index);
    for sub in &nested.bindings {
      let field = unit.str_at(sub.property).to_string();
      let span = unit.span(sub.loc);
      match &sub.value {
        CompiledValue::Literal(literal) => {
          let value = literal.to_value();
          if wrapper.set_field(&field, &value).is_err() {
            self.errors.push(Diagnostic::error(
              codes::INVALID_ASSIGNMENT,
              format!(
                "cannot assign {} to sub-property \"{field}\"",
                value.kind_name()
              ),
              span,
            ));
          }
        }
        CompiledValue::Script(expr) => {
          let binding_target = BindingTarget {
            object: owner,
            property: owner_slot,
            field: Some(field.clone()),
            context,
          };
          let live = core.evaluator.create_binding(*expr, &binding_target);
          core
            .objects
            .install_binding(owner, (owner_slot, Some(field.clone())), live);
          self.pending_bindings.push_back(PendingBinding {
            object: owner,
            property: owner_slot,
            field: Some(field.clone()),
            property_name: field,
            span,
          });
        }
        CompiledValue::Object(_) => {
          self.errors.push(Diagnostic::error(
            codes::INVALID_GROUP_TARGET,
            format!("cannot assign an object to sub-property \"{field}\""),
            span,
          ));
        }
      }
    }
  }

  #[allow(clippy::too_many_arguments)]
  fn apply_on_assignment(
    &mut self,
    core: &mut CoreState,
    unit: &Arc<CompiledUnit>,
    context: ContextId,
    binding_index: u32,
    binding: &CompiledBinding,
    target: ObjectId,
    name: &str,
    span: Span,
    mode: BindMode,
  ) {
    let CompiledValue::Object(child_index) = binding.value else {
      self.errors.push(Diagnostic::error(
        codes::NOT_A_VALUE_SOURCE,
        format!("\"on\" assignment to \"{name}\" requires an object"),
        span,
      ));
      return;
    };
    let child = match self.child_for_binding(core, unit, context, binding_index, child_index, target, mode) {
      Some(child) => child,
      None => return,
    };
    let Some((slot, _ty, _flags, prop_name)) = self.resolve_property(core, target, name, span)
    else {
      return;
    };
    let accepted = core
      .objects
      .instance(child)
      .class
      .map(|class| {
        let capabilities = &core.registry.class(class).capabilities;
        capabilities.is_value_source || capabilities.is_value_interceptor
      })
      .unwrap_or(false);
    if !accepted {
      self.errors.push(Diagnostic::error(
        codes::NOT_A_VALUE_SOURCE,
        format!("\"{prop_name}\": \"on\" assignment target is not a value source or interceptor"),
        span,
      ));
      return;
    }
    core.objects.instance_mut(target).value_sources.push((slot, child));
  }

  /// The instance created for a plain object-valued binding. During deferred
  /// activation the subtree is created on demand, since the initial pass
  /// skipped it.
  #[allow(clippy::too_many_arguments)]
  fn child_for_binding(
    &mut self,
    core: &mut CoreState,
    unit: &Arc<CompiledUnit>,
    context: ContextId,
    binding_index: u32,
    child_index: ObjectIndex,
    target: ObjectId,
    mode: BindMode,
  ) -> Option<ObjectId> {
    if let Some(child) = self.object_for_binding.get(&(target, binding_index)) {
      return Some(*child);
    }
    if matches!(mode, BindMode::Deferred) {
      let group = self.next_group();
      let created = self.create_object(
        core,
        CreateJob {
          unit: unit.clone(),
          context,
          index: child_index,
          parent: Some(target),
          dest: Some((target, binding_index)),
          sibling_group: group,
        },
      );
      // The deferred subtree's own children queued as jobs; build them now.
      while let Some(job) = self.create_stack.pop() {
        self.create_object(core, job);
      }
      return created;
    }
    // Creation of this child failed earlier; its error is already recorded.
    None
  }

  #[allow(clippy::too_many_arguments)]
  fn assign_object_binding(
    &mut self,
    core: &mut CoreState,
    unit: &Arc<CompiledUnit>,
    context: ContextId,
    object_index: ObjectIndex,
    binding_index: u32,
    child_index: ObjectIndex,
    target: ObjectId,
    name: &str,
    span: Span,
    mode: BindMode,
  ) {
    let child_record = unit.object(child_index);

    if child_record.flags.contains(ObjectFlags::IS_COMPONENT) {
      // Component declarations become component values, never instances.
      let value = Value::Component(ComponentRef {
        unit: unit.clone(),
        index: child_index,
        context,
      });
      let Some((slot, ty, flags, prop_name)) = self.resolve_property(core, target, name, span)
      else {
        return;
      };
      if flags.contains(PropertyFlags::READ_ONLY) {
        self.errors.push(Diagnostic::error(
          codes::READ_ONLY_PROPERTY,
          format!("invalid property assignment: \"{prop_name}\" is a read-only property"),
          span,
        ));
        return;
      }
      if !matches!(ty, PropertyType::Var) {
        self.errors.push(Diagnostic::error(
          codes::INVALID_ASSIGNMENT,
          format!("cannot assign a component declaration to \"{prop_name}\""),
          span,
        ));
        return;
      }
      if let Ok((object, canonical)) = core.objects.write_property(target, slot, value) {
        core.objects.remove_binding(object, canonical);
        self.required.satisfy(object, canonical);
      }
      return;
    }

    let Some(child) = self.child_for_binding(core, unit, context, binding_index, child_index, target, mode)
    else {
      return;
    };

    let Some((slot, ty, flags, prop_name)) = self.resolve_property(core, target, name, span)
    else {
      return;
    };
    if flags.contains(PropertyFlags::READ_ONLY) {
      self.errors.push(Diagnostic::error(
        codes::READ_ONLY_PROPERTY,
        format!("invalid property assignment: \"{prop_name}\" is a read-only property"),
        span,
      ));
      return;
    }
    if self.queue_if_unresolved_alias(
      core,
      unit,
      context,
      object_index,
      binding_index,
      target,
      slot,
      flags,
      mode,
      span,
      &prop_name,
    ) {
      return;
    }

    let child_class = core.objects.instance(child).class;

    match &ty {
      PropertyType::Object(expected) => {
        if let Some(expected) = expected {
          if !self.object_assignable(core, child_class, expected) {
            self.errors.push(Diagnostic::error(
              codes::INVALID_ASSIGNMENT,
              format!("cannot assign object to property \"{prop_name}\" of type {expected}"),
              span,
            ));
            return;
          }
        }
        if let Ok((object, canonical)) = core.objects.write_property(target, slot, Value::Object(child)) {
          core.objects.remove_binding(object, canonical);
          self.required.satisfy(object, canonical);
        }
      }
      PropertyType::List(element) => {
        if let PropertyType::Object(Some(expected)) = element.as_ref() {
          if !self.object_assignable(core, child_class, expected) {
            self.errors.push(Diagnostic::error(
              codes::INVALID_ASSIGNMENT,
              format!("cannot append object to list property \"{prop_name}\" of type {expected}"),
              span,
            ));
            return;
          }
        }
        // Successive object bindings append in declared order.
        let mut list = match core.objects.read_property(target, slot) {
          Ok(Value::List(items)) => items,
          Ok(_) | Err(_) => Vec::new(),
        };
        list.push(Value::Object(child));
        if let Ok((object, canonical)) = core.objects.write_property(target, slot, Value::List(list)) {
          self.required.satisfy(object, canonical);
        }
      }
      PropertyType::Var => {
        if let Ok((object, canonical)) = core.objects.write_property(target, slot, Value::Object(child)) {
          core.objects.remove_binding(object, canonical);
          self.required.satisfy(object, canonical);
        }
      }
      _ => {
        self.errors.push(Diagnostic::error(
          codes::INVALID_ASSIGNMENT,
          format!("cannot assign an object to property \"{prop_name}\" of type {}", ty.name()),
          span,
        ));
      }
    }
  }

  /// Whether an instance of `class` may be assigned where `expected` (a
  /// class name) is declared. Composite expectations are accepted as-is;
  /// only native ancestry is checkable here.
  fn object_assignable(&self, core: &CoreState, class: Option<NativeClassId>, expected: &str) -> bool {
    match (class, core.registry.class_id(expected)) {
      (Some(class), Some(_)) => core.registry.class_derives(class, expected),
      _ => true,
    }
  }

  /// Resolve alias declarations and run the single retry pass over bindings
  /// that targeted unresolved aliases. Runs once, at the end of the binding
  /// phase, when every sibling id is registered.
  fn resolve_aliases(&mut self, core: &mut CoreState) {
    let decls = std::mem::take(&mut self.alias_decls);
    for job in &decls {
      let obj = job.unit.object(job.object_index);
      let decl = &obj.aliases[job.alias_index];
      let alias_name = job.unit.str_at(decl.name).to_string();
      let target_id_name = job.unit.str_at(decl.target_id);
      let span = job.unit.span(decl.loc);

      let Some(target) = core.contexts.lookup_name(job.context, target_id_name) else {
        self.errors.push(Diagnostic::error(
          codes::UNRESOLVED_ALIAS_TARGET,
          format!("invalid alias target \"{target_id_name}\""),
          span,
        ));
        continue;
      };

      let mapping = match decl.target_property {
        Some(property_index) => {
          let property_name = job.unit.str_at(property_index);
          let target_cache = core.objects.instance(target).cache.clone();
          match target_cache.property(property_name) {
            Some((slot, _)) => (target, Some(slot)),
            None => {
              self.errors.push(Diagnostic::error(
                codes::UNRESOLVED_ALIAS_TARGET,
                format!("invalid alias target \"{target_id_name}.{property_name}\""),
                span,
              ));
              continue;
            }
          }
        }
        None => (target, None),
      };

      let holder_cache = core.objects.instance(job.instance).cache.clone();
      let Some((alias_slot, _)) = holder_cache.property(&alias_name) else {
        continue;
      };
      core
        .objects
        .instance_mut(job.instance)
        .alias_targets
        .insert(alias_slot, mapping);

      // If the alias lands on a required-but-unset property, remember it as
      // a satisfaction route for diagnostics.
      if let Ok(AliasResolution::Slot(object, canonical)) =
        core.objects.resolve_alias(job.instance, alias_slot)
      {
        self.required.add_alias_candidate(
          object,
          canonical,
          AliasCandidate {
            name: alias_name,
            span,
          },
        );
      }
    }

    // One retry pass; aliases still unresolved now are structural errors.
    let retries = std::mem::take(&mut self.retry_bindings);
    for retry in retries {
      let unit = retry.unit.clone();
      let obj = unit.object(retry.object_index);
      let Some(binding) = obj.bindings.get(retry.binding_index as usize) else {
        continue;
      };
      let binding = binding.clone();
      self.apply_one_binding(
        core,
        &unit,
        retry.context,
        retry.object_index,
        retry.binding_index,
        &binding,
        retry.instance,
        BindMode::AliasRetry,
      );
    }
  }

  /// Run the finalize drains. Returns `true` once everything drained; an
  /// interrupted call leaves the remaining work queued and returns `false`.
  pub(crate) fn finalize(&mut self, core: &mut CoreState, interrupt: &Interrupt) -> bool {
    if self.phase == CreatorPhase::ObjectsCreated {
      self.phase = CreatorPhase::Finalizing;
      self.finalize_stage = FinalizeStage::Bindings;
    }
    if self.phase == CreatorPhase::Done {
      return true;
    }
    debug_assert_eq!(self.phase, CreatorPhase::Finalizing);

    loop {
      let worked = match self.finalize_stage {
        FinalizeStage::Bindings => match self.pending_bindings.pop_front() {
          Some(pending) => {
            self.run_pending_binding(core, pending);
            true
          }
          None => {
            self.finalize_stage = FinalizeStage::ReactiveBindings;
            false
          }
        },
        FinalizeStage::ReactiveBindings => match self.pending_reactive.pop_front() {
          Some(pending) => {
            self.run_pending_binding(core, pending);
            true
          }
          None => {
            self.finalize_stage = FinalizeStage::CompleteHooks;
            false
          }
        },
        FinalizeStage::CompleteHooks => match self.complete_hooks.pop_front() {
          Some(id) => {
            self.run_lifecycle_hook(core, id, |capabilities| capabilities.construction_complete);
            true
          }
          None => {
            self.finalize_stage = FinalizeStage::FinalizeHooks;
            false
          }
        },
        FinalizeStage::FinalizeHooks => match self.finalize_hooks.pop_front() {
          Some(id) => {
            self.run_lifecycle_hook(core, id, |capabilities| capabilities.finalize);
            true
          }
          None => {
            self.finalize_stage = FinalizeStage::CompletedNotify;
            false
          }
        },
        FinalizeStage::CompletedNotify => match self.completed_notify.pop_front() {
          Some(id) => {
            self.run_lifecycle_hook(core, id, |capabilities| capabilities.completed);
            true
          }
          None => {
            self.phase = CreatorPhase::Done;
            return true;
          }
        },
      };

      if worked && interrupt.should_interrupt() {
        return false;
      }
    }
  }

  fn run_lifecycle_hook(
    &mut self,
    core: &mut CoreState,
    id: ObjectId,
    select: fn(&crate::registry::Capabilities) -> Option<crate::registry::LifecycleHook>,
  ) {
    let Some(class) = core.objects.get(id).and_then(|instance| instance.class) else {
      return;
    };
    let Some(hook) = select(&core.registry.class(class).capabilities) else {
      return;
    };
    hook(&mut core.objects, id);
  }

  /// Evaluate one installed binding exactly once, forcing dependency
  /// capture. Constant bindings (no error, no dependencies, no unresolved
  /// names) are intentionally not kept alive.
  fn run_pending_binding(&mut self, core: &mut CoreState, pending: PendingBinding) {
    let key = (pending.property, pending.field.clone());
    let Some(mut binding) = core
      .objects
      .get_mut(pending.object)
      .and_then(|instance| instance.bindings.remove(&key))
    else {
      // Freed, replaced, or already pruned; nothing to evaluate.
      return;
    };

    let value = binding.evaluate_once(&mut core.objects);

    if binding.has_error() {
      self.errors.push(Diagnostic::error(
        codes::BINDING_ERROR,
        format!("unable to assign binding to property \"{}\"", pending.property_name),
        pending.span,
      ));
      // Errored bindings stay installed; only provably constant ones prune.
      if let Some(instance) = core.objects.get_mut(pending.object) {
        instance.bindings.insert(key, binding);
      }
      return;
    }

    if let Some(value) = value {
      match &pending.field {
        None => {
          let ty = core
            .objects
            .get(pending.object)
            .and_then(|instance| instance.cache.property_at(pending.property))
            .map(|data| data.ty.clone());
          if let Some(ty) = ty {
            match convert(&value, &ty) {
              Ok(converted) => {
                let _ = core.objects.write_property(pending.object, pending.property, converted);
              }
              Err(message) => {
                self.errors.push(Diagnostic::error(
                  codes::INVALID_ASSIGNMENT,
                  format!("invalid property assignment: {message}"),
                  pending.span,
                ));
              }
            }
          }
        }
        Some(field) => {
          // Value-type sub-property: patch the wrapper and write it back.
          if let Ok(mut wrapper) = core.objects.read_property(pending.object, pending.property) {
            if wrapper.set_field(field, &value).is_ok() {
              let _ = core.objects.write_property(pending.object, pending.property, wrapper);
            } else {
              self.errors.push(Diagnostic::error(
                codes::INVALID_ASSIGNMENT,
                format!("cannot assign {} to sub-property \"{field}\"", value.kind_name()),
                pending.span,
              ));
            }
          }
        }
      }
    }

    let constant = !binding.has_dependencies() && !binding.has_unresolved_names();
    if !constant {
      if let Some(instance) = core.objects.get_mut(pending.object) {
        instance.bindings.insert(key, binding);
      }
    }
  }

  /// Write one top-level override between the creation and completion
  /// phases, satisfying the required tracker if it covers an entry.
  pub(crate) fn set_initial_property(
    &mut self,
    core: &mut CoreState,
    root: ObjectId,
    name: &str,
    value: &Value,
  ) {
    let cache = core.objects.instance(root).cache.clone();
    let Some((slot, data)) = cache.property(name) else {
      self.errors.push(Diagnostic::error(
        codes::INITIAL_PROPERTY,
        format!("could not set initial property \"{name}\""),
        Span::new(self.unit.file, diagnostics::TextRange::EMPTY),
      ));
      return;
    };
    let ty = data.ty.clone();
    let span = Span::new(self.unit.file, diagnostics::TextRange::EMPTY);
    self.write_value(core, root, slot, &ty, value, span);
  }

  /// Convert the surviving required-property entries into errors. Called at
  /// the completion boundary, after initial-property overrides ran.
  pub(crate) fn take_unset_required_errors(&mut self) -> Vec<Diagnostic> {
    self.required.drain_into_errors()
  }

  /// Transfer ownership of the created graph (and its contexts) to the
  /// caller; `clear` becomes a no-op afterwards.
  pub(crate) fn mark_claimed(&mut self, core: &mut CoreState) {
    self.result_claimed = true;
    if let Some(root) = self.root_object {
      let contexts = self.contexts_created.clone();
      if let Some(instance) = core.objects.get_mut(root) {
        instance.owned_contexts = contexts;
      }
    }
  }

  pub(crate) fn is_claimed(&self) -> bool {
    self.result_claimed
  }

  /// Explicit rollback: free every created-but-unclaimed instance in
  /// reverse creation order, then the contexts of this operation.
  pub(crate) fn clear(&mut self, core: &mut CoreState) {
    if self.cleared {
      return;
    }
    self.cleared = true;
    if self.result_claimed {
      return;
    }
    for id in self.created.iter().rev() {
      core.objects.free(*id);
    }
    self.created.clear();
    for context in self.contexts_created.drain(..) {
      core.contexts.free(context);
    }
    self.root_object = None;
  }
}

/// Activate deferred bindings of one fully constructed object.
///
/// Re-enters the binding machinery restricted to the deferred subset —
/// optionally a single property — in a throwaway context rooted at the
/// object's original creation context, then immediately drains the bindings
/// it installed. Returns the errors of the activation pass.
pub(crate) fn activate_deferred(
  core: &mut CoreState,
  object: ObjectId,
  property: Option<&str>,
) -> Vec<Diagnostic> {
  let Some(instance) = core.objects.get(object) else {
    return Vec::new();
  };
  let Some(context) = instance.context else {
    return Vec::new();
  };
  let blocks = std::mem::take(&mut core.objects.instance_mut(object).deferred);
  if blocks.is_empty() {
    return Vec::new();
  }

  let unit = core.contexts.context(context).unit.clone();
  let mut creator = match ObjectCreator::new(core, unit.clone(), None, Some(context), None) {
    Ok(creator) => creator,
    Err(diagnostic) => return vec![diagnostic],
  };
  // The creator's own root context is the throwaway scope of this pass.
  let scratch_context = creator.root_context();

  let mut retained = Vec::new();
  for block in blocks {
    let (selected, kept) = match property {
      None => (block.bindings.clone(), Vec::new()),
      Some(filter) => {
        let obj = unit.object(block.object_index);
        let mut selected = Vec::new();
        let mut kept = Vec::new();
        for index in block.bindings {
          let matches = obj
            .bindings
            .get(index as usize)
            .map(|b| unit.str_at(b.property) == filter)
            .unwrap_or(false);
          if matches {
            selected.push(index);
          } else {
            kept.push(index);
          }
        }
        (selected, kept)
      }
    };
    if !kept.is_empty() {
      retained.push(DeferredBlock {
        object_index: block.object_index,
        bindings: kept,
      });
    }
    if !selected.is_empty() {
      creator.apply_deferred_subset(core, &unit, scratch_context, block.object_index, object, &selected);
    }
  }
  core.objects.instance_mut(object).deferred = retained;

  // Bind jobs queued by on-demand subtree creation, then the drains.
  while let Some(job) = creator.bind_jobs.pop_front() {
    let job_unit = job.unit.clone();
    creator.apply_bindings(core, &job_unit, job.context, job.index, job.instance, BindMode::Initial);
  }
  creator.resolve_aliases(core);
  creator.phase = CreatorPhase::ObjectsCreated;
  creator.finalize(core, &Interrupt::none());

  // Instances created on demand (and the scope they resolve names in) now
  // belong to the activated object's tree and are torn down with it.
  creator.result_claimed = true;
  let contexts: Vec<_> = creator.contexts_created.drain(..).collect();
  if let Some(instance) = core.objects.get_mut(object) {
    instance.owned_contexts.extend(contexts);
  }

  creator.take_errors()
}
