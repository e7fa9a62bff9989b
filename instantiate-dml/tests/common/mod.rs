//! Shared test host: a native type registry resembling a small UI module
//! and a scripted expression evaluator. Tests construct compiled units with
//! [`UnitBuilder`] and drive them against these fakes.

#![allow(dead_code)]

use instantiate_dml::BindingTarget;
use instantiate_dml::Capabilities;
use instantiate_dml::EnumEncoding;
use instantiate_dml::ExprIndex;
use instantiate_dml::ExpressionEvaluator;
use instantiate_dml::LiveBinding;
use instantiate_dml::NativeClass;
use instantiate_dml::NativeProperty;
use instantiate_dml::ObjectId;
use instantiate_dml::ObjectStore;
use instantiate_dml::PropertyFlags;
use instantiate_dml::PropertyType;
use instantiate_dml::Revision;
use instantiate_dml::Runtime;
use instantiate_dml::TypeRegistry;
use instantiate_dml::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::AtomicI32;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// What a scripted binding produces when evaluated.
#[derive(Clone, Debug)]
pub enum Plan {
  /// A value with no captured dependencies; pruned after first evaluation.
  Const(Value),
  /// A value with dependencies; the binding stays installed.
  WithDeps(Value),
  /// Evaluation fails.
  Error,
  /// Evaluation yields no value (and no error).
  Skip,
}

#[derive(Default)]
pub struct EvalState {
  pub plans: HashMap<u32, Plan>,
  /// Expression index of every evaluation, in order.
  pub evaluations: Vec<u32>,
  /// Every target a binding was created for.
  pub targets: Vec<BindingTarget>,
}

pub struct ScriptedEvaluator {
  state: Rc<RefCell<EvalState>>,
}

struct ScriptedBinding {
  expr: u32,
  plan: Plan,
  errored: bool,
  state: Rc<RefCell<EvalState>>,
}

impl LiveBinding for ScriptedBinding {
  fn evaluate_once(&mut self, _objects: &mut ObjectStore) -> Option<Value> {
    self.state.borrow_mut().evaluations.push(self.expr);
    match &self.plan {
      Plan::Const(value) | Plan::WithDeps(value) => Some(value.clone()),
      Plan::Error => {
        self.errored = true;
        None
      }
      Plan::Skip => None,
    }
  }

  fn has_error(&self) -> bool {
    self.errored
  }

  fn has_dependencies(&self) -> bool {
    matches!(self.plan, Plan::WithDeps(_))
  }

  fn has_unresolved_names(&self) -> bool {
    false
  }
}

impl ExpressionEvaluator for ScriptedEvaluator {
  fn create_binding(&mut self, expr: ExprIndex, target: &BindingTarget) -> Box<dyn LiveBinding> {
    let mut state = self.state.borrow_mut();
    state.targets.push(target.clone());
    let plan = state.plans.get(&expr.0).cloned().unwrap_or(Plan::Skip);
    Box::new(ScriptedBinding {
      expr: expr.0,
      plan,
      errored: false,
      state: self.state.clone(),
    })
  }
}

/// Monotonic order stamp shared by the lifecycle hooks below.
static SEQUENCE: AtomicI32 = AtomicI32::new(0);

pub fn reset_sequence() {
  SEQUENCE.store(0, Ordering::SeqCst);
}

fn write_named(store: &mut ObjectStore, id: ObjectId, name: &str, value: Value) {
  let slot = store.instance(id).cache.property(name).map(|(slot, _)| slot);
  if let Some(slot) = slot {
    let _ = store.write_property(id, slot, value);
  }
}

fn stamp(store: &mut ObjectStore, id: ObjectId, name: &str) {
  let order = SEQUENCE.fetch_add(1, Ordering::SeqCst);
  write_named(store, id, name, Value::Int(order));
}

fn hook_begin(store: &mut ObjectStore, id: ObjectId) {
  write_named(store, id, "beginSeen", Value::Bool(true));
}

fn hook_complete(store: &mut ObjectStore, id: ObjectId) {
  stamp(store, id, "completeOrder");
}

fn hook_finalize(store: &mut ObjectStore, id: ObjectId) {
  stamp(store, id, "finalizeOrder");
}

fn hook_completed(store: &mut ObjectStore, id: ObjectId) {
  stamp(store, id, "completedOrder");
}

/// A registry resembling a small UI module.
pub fn test_registry() -> TypeRegistry {
  let mut registry = TypeRegistry::new();

  registry.register(
    NativeClass::new("Object").property(
      NativeProperty::new("objectName", PropertyType::String).with_flags(PropertyFlags::FINAL),
    ),
  );

  registry.register(
    NativeClass::new("Item")
      .inherits("Object")
      .property(NativeProperty::new("width", PropertyType::Real))
      .property(NativeProperty::new("height", PropertyType::Real))
      .property(NativeProperty::new("visible", PropertyType::Bool))
      .property(NativeProperty::new("pos", PropertyType::Point))
      .property(NativeProperty::new("frame", PropertyType::Rect))
      .property(NativeProperty::new("helper", PropertyType::Object(None)))
      .property(NativeProperty::new(
        "data",
        PropertyType::List(Box::new(PropertyType::Object(None))),
      ))
      .signal("clicked", &[])
      .with_default_property("data"),
  );

  registry.register(
    NativeClass::new("Text")
      .inherits("Item")
      .property(NativeProperty::new("text", PropertyType::String))
      .property(NativeProperty::new("color", PropertyType::Color))
      .property(NativeProperty::new(
        "align",
        PropertyType::Enum(Arc::new(EnumEncoding {
          name: "Align".into(),
          values: vec![("Left".into(), 0), ("Center".into(), 1), ("Right".into(), 2)],
        })),
      )),
  );

  // Revisioned member: only visible when the document asks for 2.1+.
  registry.register(
    NativeClass::new("Styled")
      .inherits("Item")
      .property(NativeProperty::new("padding", PropertyType::Real).added_in(Revision::new(2, 1))),
  );

  // `on`-assignment acceptor.
  registry.register(
    NativeClass::new("Animation")
      .inherits("Object")
      .with_capabilities(Capabilities {
        is_value_source: true,
        ..Capabilities::default()
      }),
  );

  // Attached properties: `Keys.<x>` materializes a KeysAttached per object.
  registry.register(
    NativeClass::new("KeysAttached")
      .inherits("Object")
      .property(NativeProperty::new("enabled", PropertyType::Bool))
      .property(NativeProperty::new("priority", PropertyType::Int))
      .signal("pressed", &[]),
  );
  registry.register(
    NativeClass::new("Keys")
      .inherits("Object")
      .non_constructible()
      .with_attached_type("KeysAttached"),
  );

  // Native required properties, including one an ancestor declares.
  registry.register(
    NativeClass::new("FormField")
      .inherits("Object")
      .property(NativeProperty::new("label", PropertyType::String).with_flags(PropertyFlags::REQUIRED)),
  );
  registry.register(NativeClass::new("SpecialField").inherits("FormField"));

  // Lifecycle capability recorder.
  registry.register(
    NativeClass::new("Tracker")
      .inherits("Object")
      .property(NativeProperty::new("beginSeen", PropertyType::Bool))
      .property(NativeProperty::new("completeOrder", PropertyType::Int))
      .property(NativeProperty::new("finalizeOrder", PropertyType::Int))
      .property(NativeProperty::new("completedOrder", PropertyType::Int))
      .with_capabilities(Capabilities {
        construction_begin: Some(hook_begin),
        construction_complete: Some(hook_complete),
        finalize: Some(hook_finalize),
        completed: Some(hook_completed),
        ..Capabilities::default()
      }),
  );

  registry
}

/// A runtime over the test registry and a scripted evaluator, plus the
/// handle used to script expressions and observe evaluations.
pub fn new_runtime() -> (Runtime, Rc<RefCell<EvalState>>) {
  let state = Rc::new(RefCell::new(EvalState::default()));
  let evaluator = ScriptedEvaluator {
    state: state.clone(),
  };
  (Runtime::new(test_registry(), Box::new(evaluator)), state)
}

pub fn plan(state: &Rc<RefCell<EvalState>>, expr: u32, plan: Plan) {
  state.borrow_mut().plans.insert(expr, plan);
}

pub fn evaluations(state: &Rc<RefCell<EvalState>>) -> Vec<u32> {
  state.borrow().evaluations.clone()
}
