//! The component handle: a two-phase creation API over the object graph
//! creator.
//!
//! `begin_create` runs the creation phases only, stopping before finalize;
//! between it and `complete_create` the caller may inject top-level property
//! overrides (satisfying required properties they cover). `create` is the
//! one-shot composition, and `create_with_incubator` routes the same
//! machinery through an incubator instead.

use crate::compiled::CompiledUnit;
use crate::compiled::ObjectIndex;
use crate::creator::ObjectCreator;
use crate::error::codes;
use crate::handle::ContextId;
use crate::handle::IncubatorId;
use crate::handle::ObjectId;
use crate::incubator;
use crate::interrupt::Interrupt;
use crate::runtime::Runtime;
use crate::value::ComponentRef;
use crate::value::Value;
use diagnostics::Diagnostic;
use diagnostics::Span;
use std::sync::Arc;

/// Cap on concurrently pending begin/complete pairs, preventing runaway
/// self-referential component graphs driven through the handle API.
pub const MAX_CREATION_DEPTH: u32 = 10;

struct PendingCreation {
  creator: ObjectCreator,
  root: Option<ObjectId>,
}

/// A handle on an instantiable (sub-)document.
pub struct Component {
  unit: Arc<CompiledUnit>,
  sub_index: Option<ObjectIndex>,
  /// For components captured as values: the context they were declared in.
  declaration_context: Option<ContextId>,
  pending: Option<PendingCreation>,
  errors: Vec<Diagnostic>,
}

impl Component {
  /// A component over a unit's root object.
  pub fn new(unit: Arc<CompiledUnit>) -> Self {
    Self {
      unit,
      sub_index: None,
      declaration_context: None,
      pending: None,
      errors: Vec::new(),
    }
  }

  /// A component over an inline sub-object of a unit.
  pub fn for_sub_object(unit: Arc<CompiledUnit>, index: ObjectIndex) -> Self {
    Self {
      unit,
      sub_index: Some(index),
      declaration_context: None,
      pending: None,
      errors: Vec::new(),
    }
  }

  /// A component from a captured component value. Carries the declaration
  /// context, which bound components are restricted to.
  pub fn from_ref(reference: &ComponentRef) -> Self {
    Self {
      unit: reference.unit.clone(),
      sub_index: Some(reference.index),
      declaration_context: Some(reference.context),
      pending: None,
      errors: Vec::new(),
    }
  }

  pub fn errors(&self) -> &[Diagnostic] {
    &self.errors
  }

  pub fn is_error(&self) -> bool {
    !self.errors.is_empty()
  }

  /// Whether a begin/complete pair is outstanding.
  pub fn is_pending(&self) -> bool {
    self.pending.is_some()
  }

  /// One-shot creation: begin, then immediately complete.
  pub fn create(&mut self, rt: &mut Runtime, parent_context: Option<ContextId>) -> Option<ObjectId> {
    self.begin_create(rt, parent_context)?;
    self.complete_create(rt)
  }

  /// Run object creation only — structural instantiation and binding
  /// installs, no binding evaluation, hooks, or notifications. Returns the
  /// root instance, or `None` with errors recorded.
  pub fn begin_create(
    &mut self,
    rt: &mut Runtime,
    parent_context: Option<ContextId>,
  ) -> Option<ObjectId> {
    self.errors.clear();
    if self.pending.is_some() {
      self.errors.push(Diagnostic::error(
        codes::CREATION_PENDING,
        "beginCreate while a previous creation is still pending",
        Span::new(self.unit.file, diagnostics::TextRange::EMPTY),
      ));
      return None;
    }
    if rt.creation_depth >= MAX_CREATION_DEPTH {
      self.errors.push(Diagnostic::error(
        codes::CREATION_DEPTH_EXCEEDED,
        "maximum component creation depth exceeded",
        Span::new(self.unit.file, diagnostics::TextRange::EMPTY),
      ));
      return None;
    }

    let effective_parent = parent_context.or(self.declaration_context);

    // A component value declared bound must stay inside the context chain it
    // was captured from.
    if let Some(declaration) = self.declaration_context {
      let record = self
        .sub_index
        .and_then(|index| self.unit.get_object(index));
      let bound = record.is_some_and(|obj| {
        obj
          .flags
          .contains(crate::compiled::ObjectFlags::BOUND_COMPONENT)
      });
      let inside = effective_parent
        .is_some_and(|parent| rt.core.contexts.chain_contains(parent, declaration));
      if bound && !inside {
        self.errors.push(Diagnostic::error(
          codes::BOUND_COMPONENT_OUTSIDE_CONTEXT,
          "bound component cannot be instantiated outside its creation context",
          Span::new(self.unit.file, diagnostics::TextRange::EMPTY),
        ));
        return None;
      }
    }

    let mut creator = match ObjectCreator::new(
      &mut rt.core,
      self.unit.clone(),
      self.sub_index,
      effective_parent,
      None,
    ) {
      Ok(creator) => creator,
      Err(diagnostic) => {
        self.errors.push(diagnostic);
        return None;
      }
    };

    rt.creation_depth += 1;
    creator.execute(&mut rt.core, &Interrupt::none());
    let root = creator.root_object();
    self.errors = creator.errors().to_vec();

    if root.is_none() {
      // Nothing came of the pass; roll the partial graph back right away.
      self.errors.extend(creator.take_unset_required_errors());
      creator.clear(&mut rt.core);
      rt.creation_depth -= 1;
      return None;
    }

    self.pending = Some(PendingCreation { creator, root });
    root
  }

  /// Overwrite top-level properties of the pending root instance. Required
  /// properties covered here count as satisfied.
  pub fn set_initial_properties(&mut self, rt: &mut Runtime, properties: &[(String, Value)]) {
    let Some(pending) = self.pending.as_mut() else {
      return;
    };
    let Some(root) = pending.root else {
      return;
    };
    for (name, value) in properties {
      pending.creator.set_initial_property(&mut rt.core, root, name, value);
    }
  }

  /// Run the finalize drains of a pending creation: evaluate installed
  /// bindings, fire hooks and completion notifications.
  ///
  /// Required properties still unset at this boundary fail the creation:
  /// the partial graph is released and `None` returned, with one error per
  /// missing property.
  pub fn complete_create(&mut self, rt: &mut Runtime) -> Option<ObjectId> {
    let Some(pending) = self.pending.take() else {
      self.errors.push(Diagnostic::error(
        codes::CREATION_PENDING,
        "completeCreate without a pending beginCreate",
        Span::new(self.unit.file, diagnostics::TextRange::EMPTY),
      ));
      return None;
    };
    let mut creator = pending.creator;
    rt.creation_depth = rt.creation_depth.saturating_sub(1);

    let required_errors = creator.take_unset_required_errors();
    if !required_errors.is_empty() {
      for error in required_errors {
        creator.record_error(error);
      }
      self.errors = creator.take_errors();
      creator.clear(&mut rt.core);
      return None;
    }

    creator.finalize(&mut rt.core, &Interrupt::none());
    self.errors = creator.take_errors();
    creator.mark_claimed(&mut rt.core);
    pending.root
  }

  /// Route creation through an incubator. Status, result, and errors are
  /// observed through the runtime's incubator API; initial-property
  /// overrides set on the incubator apply once the root instance exists.
  pub fn create_with_incubator(
    &mut self,
    rt: &mut Runtime,
    incubator: IncubatorId,
    parent_context: Option<ContextId>,
  ) {
    let effective_parent = parent_context.or(self.declaration_context);
    incubator::start_incubation(
      &mut rt.incubation,
      &mut rt.core,
      incubator,
      self.unit.clone(),
      self.sub_index,
      effective_parent,
    );
  }
}
