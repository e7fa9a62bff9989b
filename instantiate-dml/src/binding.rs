//! The binding seam between this engine and the external expression
//! evaluator.
//!
//! This engine never executes expressions. During creation it *installs*
//! expression bindings (replacing any previous binding on the slot) and
//! queues them; during finalize each queued binding is evaluated exactly once
//! to force dependency capture, and discarded again if it turns out to be
//! constant — no error, no dependencies, no unresolved names.

use crate::compiled::ExprIndex;
use crate::handle::ContextId;
use crate::handle::ObjectId;
use crate::store::ObjectStore;
use crate::value::Value;
use diagnostics::Span;

/// Where an installed binding writes its result.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BindingTarget {
  pub object: ObjectId,
  /// Global property index on the object's descriptor.
  pub property: u32,
  /// Sub-field of a value-type property, for group bindings like
  /// `origin.x`. The wrapper is read, patched, and written back.
  pub field: Option<String>,
  /// The context the expression resolves names in.
  pub context: ContextId,
}

/// A live binding produced by the expression-evaluation service.
pub trait LiveBinding {
  /// Evaluate the expression once and return the produced value, or `None`
  /// if evaluation failed (then [`LiveBinding::has_error`] reports `true`).
  fn evaluate_once(&mut self, objects: &mut ObjectStore) -> Option<Value>;

  fn has_error(&self) -> bool;

  /// Whether the evaluation captured dependencies that can re-trigger it.
  fn has_dependencies(&self) -> bool;

  /// Whether the expression referenced names that did not resolve.
  fn has_unresolved_names(&self) -> bool;
}

/// The expression-evaluation service. An implementation turns a compiled
/// expression index plus a target into a live binding object.
pub trait ExpressionEvaluator {
  fn create_binding(&mut self, expr: ExprIndex, target: &BindingTarget) -> Box<dyn LiveBinding>;
}

/// A signal-handler binding compiled into a bound-signal record instead of a
/// property binding. Emission is the evaluator's concern; the engine only
/// records the association.
#[derive(Clone, Debug)]
pub struct BoundSignal {
  /// Global signal index on the object's descriptor.
  pub signal: u32,
  pub expr: ExprIndex,
  pub context: ContextId,
  pub span: Span,
}

/// A binding installed during creation and awaiting its first evaluation in
/// the finalize drain.
#[derive(Clone, Debug)]
pub(crate) struct PendingBinding {
  pub object: ObjectId,
  pub property: u32,
  pub field: Option<String>,
  pub property_name: String,
  pub span: Span,
}

/// Key under which an installed binding is stored on its instance.
pub(crate) type BindingKey = (u32, Option<String>);

/// Bindings of one object that were flagged deferred and skipped during the
/// initial pass, retained for later activation.
#[derive(Clone, Debug)]
pub struct DeferredBlock {
  /// The compiled object whose binding table the indices refer to.
  pub object_index: crate::compiled::ObjectIndex,
  /// Indices into that object's binding table.
  pub bindings: Vec<u32>,
}
