//! Incubators: time-sliced, resumable object-graph construction.
//!
//! "Asynchronous" here means cooperative time-slicing on one logical thread,
//! never parallelism. An incubator wraps an [`ObjectCreator`] and advances it
//! in bounded slices under an interrupt predicate; the controller services
//! the oldest pending asynchronous incubator on every quantum. Incubators
//! waiting on nested incubations form a DAG — acyclic by construction, since
//! a child always belongs to a strictly younger creation pass — and
//! completion propagates leaf-to-root: finishing the last dependency of a
//! waiter re-invokes the waiter's own incubation.

use crate::compiled::CompiledUnit;
use crate::compiled::ObjectIndex;
use crate::creator::CreatorProgress;
use crate::creator::ObjectCreator;
use crate::handle::ContextId;
use crate::handle::IncubatorId;
use crate::handle::ObjectId;
use crate::interrupt::Interrupt;
use crate::runtime::CoreState;
use crate::value::Value;
use diagnostics::Diagnostic;
use std::sync::Arc;

/// How an incubator is driven.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IncubationMode {
  /// Run to completion inside the starting call.
  Synchronous,
  /// Only ever advanced by the controller, in bounded slices.
  Asynchronous,
  /// Synchronous, unless an enclosing incubation on the parent context chain
  /// is itself asynchronous — then this one joins that asynchrony and gates
  /// the parent's completion.
  AsynchronousIfNested,
}

/// Externally observable incubator state.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IncubatorStatus {
  Null,
  Loading,
  Ready,
  Error,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Progress {
  Execute,
  Completing,
  Completed,
}

pub struct IncubatorState {
  mode: IncubationMode,
  effective_async: bool,
  status: IncubatorStatus,
  progress: Progress,
  creator: Option<ObjectCreator>,
  result: Option<ObjectId>,
  result_taken: bool,
  errors: Vec<Diagnostic>,
  /// Incubators whose completion gates this one.
  waiting_for: Vec<IncubatorId>,
  /// The incubator gated on this one, if any.
  waiting_on_me: Option<IncubatorId>,
  /// Overrides applied once the root instance exists.
  initial_properties: Vec<(String, Value)>,
}

impl IncubatorState {
  fn new(mode: IncubationMode) -> Self {
    Self {
      mode,
      effective_async: false,
      status: IncubatorStatus::Null,
      progress: Progress::Execute,
      creator: None,
      result: None,
      result_taken: false,
      errors: Vec::new(),
      waiting_for: Vec::new(),
      waiting_on_me: None,
      initial_properties: Vec::new(),
    }
  }
}

/// Owns every incubator and the ordered live set of asynchronous ones.
pub struct IncubationController {
  slots: Vec<Option<IncubatorState>>,
  free: Vec<u32>,
  /// Loading asynchronous incubators, oldest first.
  async_queue: Vec<IncubatorId>,
  /// Host callback observing the incubating-object count.
  count_changed: Option<fn(usize)>,
}

impl IncubationController {
  pub fn new() -> Self {
    Self {
      slots: Vec::new(),
      free: Vec::new(),
      async_queue: Vec::new(),
      count_changed: None,
    }
  }

  pub fn set_count_changed(&mut self, callback: Option<fn(usize)>) {
    self.count_changed = callback;
  }

  pub fn create(&mut self, mode: IncubationMode) -> IncubatorId {
    let state = IncubatorState::new(mode);
    if let Some(index) = self.free.pop() {
      self.slots[index as usize] = Some(state);
      return IncubatorId(index);
    }
    assert!(self.slots.len() < u32::MAX as usize, "incubator store overflow");
    let index = self.slots.len() as u32;
    self.slots.push(Some(state));
    IncubatorId(index)
  }

  fn get(&self, id: IncubatorId) -> Option<&IncubatorState> {
    self.slots.get(id.0 as usize).and_then(|s| s.as_ref())
  }

  fn get_mut(&mut self, id: IncubatorId) -> Option<&mut IncubatorState> {
    self.slots.get_mut(id.0 as usize).and_then(|s| s.as_mut())
  }

  /// Panics on unknown ids. The driving functions below only ever receive
  /// ids handed out by [`IncubationController::create`], and slots are never
  /// removed, so this is an internal invariant, not an input check.
  fn state_mut(&mut self, id: IncubatorId) -> &mut IncubatorState {
    self.slots[id.0 as usize]
      .as_mut()
      .expect("unknown incubator id")
  }

  pub fn status(&self, id: IncubatorId) -> IncubatorStatus {
    self.get(id).map_or(IncubatorStatus::Null, |s| s.status)
  }

  pub fn errors(&self, id: IncubatorId) -> &[Diagnostic] {
    self.get(id).map_or(&[], |s| s.errors.as_slice())
  }

  pub fn result(&self, id: IncubatorId) -> Option<ObjectId> {
    self.get(id).and_then(|s| s.result)
  }

  pub fn is_waiting_on(&self, id: IncubatorId, dependency: IncubatorId) -> bool {
    self
      .get(id)
      .is_some_and(|s| s.waiting_for.contains(&dependency))
  }

  /// The root creation context of the incubated operation, once it started.
  pub fn context(&self, id: IncubatorId) -> Option<ContextId> {
    self
      .get(id)
      .and_then(|s| s.creator.as_ref())
      .map(|creator| creator.root_context())
  }

  /// Overrides to apply once the root instance exists. Only meaningful
  /// before the creation pass completes.
  pub fn set_initial_properties(&mut self, id: IncubatorId, properties: Vec<(String, Value)>) {
    if let Some(state) = self.get_mut(id) {
      state.initial_properties = properties;
    }
  }

  /// Number of asynchronously incubating objects.
  pub fn incubating_count(&self) -> usize {
    self.async_queue.len()
  }

  fn notify_count(&self) {
    if let Some(callback) = self.count_changed {
      callback(self.async_queue.len());
    }
  }

  fn remove_from_queue(&mut self, id: IncubatorId) {
    let before = self.async_queue.len();
    self.async_queue.retain(|queued| *queued != id);
    if self.async_queue.len() != before {
      self.notify_count();
    }
  }

  /// The oldest asynchronous incubator that can make progress right now.
  /// Incubators whose creation finished but whose dependencies are still
  /// loading are skipped; their dependencies are younger queue entries.
  fn next_pending(&self) -> Option<IncubatorId> {
    self
      .async_queue
      .iter()
      .copied()
      .find(|id| match self.get(*id) {
        Some(state) => {
          state.status == IncubatorStatus::Loading
            && !(state.progress == Progress::Completed && !state.waiting_for.is_empty())
        }
        None => false,
      })
  }
}

impl Default for IncubationController {
  fn default() -> Self {
    Self::new()
  }
}

/// Begin incubating `unit` under `id`.
///
/// Synchronous (and not-actually-nested asynchronous-if-nested) incubations
/// run to completion before this returns; asynchronous ones enter the
/// controller's queue in `Loading` state.
pub(crate) fn start_incubation(
  controller: &mut IncubationController,
  core: &mut CoreState,
  id: IncubatorId,
  unit: Arc<CompiledUnit>,
  sub_index: Option<ObjectIndex>,
  parent_context: Option<ContextId>,
) {
  let Some(state) = controller.get_mut(id) else {
    return;
  };
  debug_assert_eq!(state.status, IncubatorStatus::Null, "incubator reused without clear()");
  let mode = state.mode;

  // Resolve asynchronous-if-nested against the enclosing incubation, if any.
  let nested_parent = match mode {
    IncubationMode::AsynchronousIfNested => parent_context
      .and_then(|ctx| core.contexts.find_incubator(ctx))
      .filter(|parent| {
        controller
          .get(*parent)
          .is_some_and(|p| p.effective_async && p.status == IncubatorStatus::Loading)
      }),
    _ => None,
  };
  let effective_async = match mode {
    IncubationMode::Synchronous => false,
    IncubationMode::Asynchronous => true,
    IncubationMode::AsynchronousIfNested => nested_parent.is_some(),
  };

  let creator = match ObjectCreator::new(core, unit, sub_index, parent_context, Some(id)) {
    Ok(creator) => creator,
    Err(diagnostic) => {
      let state = controller.state_mut(id);
      state.errors.push(diagnostic);
      state.status = IncubatorStatus::Error;
      return;
    }
  };

  let state = controller.state_mut(id);
  state.effective_async = effective_async;
  state.creator = Some(creator);
  state.progress = Progress::Execute;
  state.status = IncubatorStatus::Loading;

  if let Some(parent) = nested_parent {
    // The wait-for DAG edge, stored on both sides: the parent's completion
    // is gated on this child.
    state.waiting_on_me = Some(parent);
    if let Some(parent_state) = controller.get_mut(parent) {
      parent_state.waiting_for.push(id);
    }
  }

  if effective_async {
    controller.async_queue.push(id);
    controller.notify_count();
  } else {
    incubate(controller, core, id, &Interrupt::none());
  }
}

/// Advance one incubator under the interrupt predicate. State is never lost
/// on interruption; the next call resumes where this one stopped.
pub(crate) fn incubate(
  controller: &mut IncubationController,
  core: &mut CoreState,
  id: IncubatorId,
  interrupt: &Interrupt,
) {
  let Some(state) = controller.get_mut(id) else {
    return;
  };
  if state.status != IncubatorStatus::Loading {
    return;
  }
  let Some(mut creator) = state.creator.take() else {
    return;
  };
  let mut progress = state.progress;
  let initial_properties = std::mem::take(&mut state.initial_properties);

  if progress == Progress::Execute {
    match creator.execute(core, interrupt) {
      CreatorProgress::Interrupted => {
        let state = controller.state_mut(id);
        state.initial_properties = initial_properties;
        state.creator = Some(creator);
        return;
      }
      CreatorProgress::Finished => {
        if let Some(root) = creator.root_object() {
          for (name, value) in &initial_properties {
            creator.set_initial_property(core, root, name, value);
          }
        }
        // The completion boundary for unset required properties.
        for error in creator.take_unset_required_errors() {
          creator.record_error(error);
        }
        progress = if creator.errors().is_empty() && creator.root_object().is_some() {
          Progress::Completing
        } else {
          Progress::Completed
        };
        if progress == Progress::Completing && interrupt.should_interrupt() {
          let state = controller.state_mut(id);
          state.progress = progress;
          state.creator = Some(creator);
          return;
        }
      }
    }
  }

  if progress == Progress::Completing {
    loop {
      if creator.finalize(core, interrupt) {
        progress = Progress::Completed;
        break;
      }
      if interrupt.should_interrupt() {
        let state = controller.state_mut(id);
        state.progress = progress;
        state.creator = Some(creator);
        return;
      }
    }
  }

  finish_incubation(controller, core, id, creator, interrupt);
}

/// Completion path: publish status, detach from the queue, and propagate
/// leaf-to-root through the wait-for DAG.
fn finish_incubation(
  controller: &mut IncubationController,
  core: &mut CoreState,
  id: IncubatorId,
  mut creator: ObjectCreator,
  interrupt: &Interrupt,
) {
  let state = controller.state_mut(id);
  state.progress = Progress::Completed;

  if !state.waiting_for.is_empty() {
    // Still gated on nested incubations; the last of them to finish will
    // re-invoke this incubator.
    state.creator = Some(creator);
    return;
  }

  let errors = creator.take_errors();
  state.errors.extend(errors);
  state.result = creator.root_object();
  let waiter = state.waiting_on_me.take();
  state.status = if state.errors.is_empty() {
    IncubatorStatus::Ready
  } else {
    IncubatorStatus::Error
  };
  // The creator is retained: partially-created instances of a failed pass
  // stay inspectable until clear().
  state.creator = Some(creator);
  controller.remove_from_queue(id);

  if let Some(waiter_id) = waiter {
    if let Some(waiter_state) = controller.get_mut(waiter_id) {
      waiter_state.waiting_for.retain(|dep| *dep != id);
      let resumable = waiter_state.waiting_for.is_empty()
        && waiter_state.status == IncubatorStatus::Loading;
      if resumable {
        incubate(controller, core, waiter_id, interrupt);
      }
    }
  }
}

/// Run `id` to completion, first forcing completion of everything it waits
/// on, leaf-to-root.
pub(crate) fn force_completion(
  controller: &mut IncubationController,
  core: &mut CoreState,
  id: IncubatorId,
) {
  let interrupt = Interrupt::none();
  while controller.status(id) == IncubatorStatus::Loading {
    let pending_dependency = controller.get(id).and_then(|state| {
      state
        .waiting_for
        .iter()
        .copied()
        .find(|dep| controller.status(*dep) == IncubatorStatus::Loading)
    });
    if let Some(dependency) = pending_dependency {
      force_completion(controller, core, dependency);
      continue;
    }
    incubate(controller, core, id, &interrupt);
  }
}

/// Controller quantum: advance the oldest pending asynchronous incubator
/// until the interrupt fires or nothing is left to do.
pub(crate) fn drive(
  controller: &mut IncubationController,
  core: &mut CoreState,
  interrupt: &Interrupt,
) {
  loop {
    let Some(id) = controller.next_pending() else {
      return;
    };
    incubate(controller, core, id, interrupt);
    if interrupt.should_interrupt() {
      return;
    }
  }
}

/// Reset an incubator to `Null` from any state, releasing unclaimed
/// instances and detaching both directions of the wait-for DAG. Dependent
/// incubations are cleared too.
pub(crate) fn clear(
  controller: &mut IncubationController,
  core: &mut CoreState,
  id: IncubatorId,
) {
  let (dependencies, waiter) = match controller.get_mut(id) {
    Some(state) => (
      std::mem::take(&mut state.waiting_for),
      state.waiting_on_me.take(),
    ),
    None => return,
  };

  for dependency in dependencies {
    clear(controller, core, dependency);
  }
  if let Some(waiter_id) = waiter {
    if let Some(waiter_state) = controller.get_mut(waiter_id) {
      waiter_state.waiting_for.retain(|dep| *dep != id);
    }
  }

  let state = controller.state_mut(id);
  let creator = state.creator.take();
  state.status = IncubatorStatus::Null;
  state.progress = Progress::Execute;
  state.errors.clear();
  state.result = None;
  state.result_taken = false;
  state.effective_async = false;
  state.initial_properties.clear();

  if let Some(mut creator) = creator {
    creator.clear(core);
  }
  controller.remove_from_queue(id);
}

/// Claim the incubated root object. Ownership of the graph (and its
/// contexts) transfers to the caller; a later `clear` will not free it.
pub(crate) fn take_result(
  controller: &mut IncubationController,
  core: &mut CoreState,
  id: IncubatorId,
) -> Option<ObjectId> {
  let state = controller.get_mut(id)?;
  if state.status != IncubatorStatus::Ready || state.result_taken {
    return None;
  }
  state.result_taken = true;
  if let Some(creator) = state.creator.as_mut() {
    creator.mark_claimed(core);
  }
  state.result
}
