mod common;

use common::evaluations;
use common::new_runtime;
use common::plan;
use common::Plan;
use diagnostics::FileId;
use instantiate_dml::codes;
use instantiate_dml::Component;
use instantiate_dml::ConstValue;
use instantiate_dml::ExprIndex;
use instantiate_dml::Revision;
use instantiate_dml::UnitBuilder;
use instantiate_dml::Value;

const V1: Revision = Revision::new(1, 0);

#[test]
fn constant_binding_evaluates_once_and_is_pruned() {
  let (mut rt, eval) = new_runtime();
  plan(&eval, 1, Plan::Const(Value::Int(7)));

  let mut b = UnitBuilder::new(FileId(0));
  let root = b
    .object("Item", V1)
    .bind_script("width", ExprIndex(1))
    .finish();
  b.set_root(root);

  let mut component = Component::new(b.finish());
  let root = component.create(&mut rt, None).unwrap();
  assert!(component.errors().is_empty(), "{:?}", component.errors());

  // Evaluated exactly once, converted to the slot type, then discarded.
  assert_eq!(evaluations(&eval), vec![1]);
  assert_eq!(rt.read_property(root, "width"), Some(Value::Real(7.0)));
  assert_eq!(rt.objects().instance(root).binding_count(), 0);

  // Idempotence: re-reading does not re-evaluate.
  assert_eq!(rt.read_property(root, "width"), Some(Value::Real(7.0)));
  assert_eq!(evaluations(&eval), vec![1]);
}

#[test]
fn dependent_binding_stays_installed() {
  let (mut rt, eval) = new_runtime();
  plan(&eval, 2, Plan::WithDeps(Value::Real(3.5)));

  let mut b = UnitBuilder::new(FileId(0));
  let root = b
    .object("Item", V1)
    .bind_script("height", ExprIndex(2))
    .finish();
  b.set_root(root);

  let mut component = Component::new(b.finish());
  let root = component.create(&mut rt, None).unwrap();

  assert_eq!(rt.read_property(root, "height"), Some(Value::Real(3.5)));
  assert_eq!(rt.objects().instance(root).binding_count(), 1);
  assert!(rt.objects().instance(root).has_binding(
    rt.objects().instance(root).cache.property("height").unwrap().0
  ));
}

#[test]
fn failed_binding_reports_the_property() {
  let (mut rt, eval) = new_runtime();
  plan(&eval, 3, Plan::Error);

  let mut b = UnitBuilder::new(FileId(0));
  let root = b
    .object("Item", V1)
    .bind_script("width", ExprIndex(3))
    .finish();
  b.set_root(root);

  let mut component = Component::new(b.finish());
  let root = component.create(&mut rt, None).unwrap();

  let errors = component.errors();
  assert_eq!(errors.len(), 1);
  assert_eq!(errors[0].code, codes::BINDING_ERROR);
  assert!(errors[0].message.contains("width"));
  // The slot keeps its default; the errored binding is not pruned.
  assert_eq!(rt.read_property(root, "width"), Some(Value::Real(0.0)));
  assert_eq!(rt.objects().instance(root).binding_count(), 1);
}

#[test]
fn later_literal_replaces_installed_binding() {
  let (mut rt, eval) = new_runtime();
  plan(&eval, 4, Plan::Const(Value::Int(1)));

  let mut b = UnitBuilder::new(FileId(0));
  let root = b
    .object("Item", V1)
    .bind_script("width", ExprIndex(4))
    .bind_literal("width", ConstValue::Int(20))
    .finish();
  b.set_root(root);

  let mut component = Component::new(b.finish());
  let root = component.create(&mut rt, None).unwrap();
  assert!(component.errors().is_empty());

  // The literal won and the replaced binding never ran.
  assert_eq!(rt.read_property(root, "width"), Some(Value::Real(20.0)));
  assert!(evaluations(&eval).is_empty());
  assert_eq!(rt.objects().instance(root).binding_count(), 0);
}

#[test]
fn binding_result_conversion_failures_are_property_errors() {
  let (mut rt, eval) = new_runtime();
  plan(&eval, 5, Plan::Const(Value::Bool(true)));

  let mut b = UnitBuilder::new(FileId(0));
  let root = b
    .object("Item", V1)
    .bind_script("width", ExprIndex(5))
    .finish();
  b.set_root(root);

  let mut component = Component::new(b.finish());
  let root = component.create(&mut rt, None).unwrap();

  assert_eq!(component.errors().len(), 1);
  assert_eq!(component.errors()[0].code, codes::INVALID_ASSIGNMENT);
  assert_eq!(rt.read_property(root, "width"), Some(Value::Real(0.0)));
}

#[test]
fn binding_targets_carry_canonical_slots() {
  let (mut rt, eval) = new_runtime();
  plan(&eval, 6, Plan::Const(Value::Real(2.0)));

  let mut b = UnitBuilder::new(FileId(0));
  let root = b
    .object("Item", V1)
    .bind_script("width", ExprIndex(6))
    .finish();
  b.set_root(root);

  let mut component = Component::new(b.finish());
  let root = component.create(&mut rt, None).unwrap();

  let state = eval.borrow();
  assert_eq!(state.targets.len(), 1);
  assert_eq!(state.targets[0].object, root);
  let (width_slot, _) = rt.objects().instance(root).cache.property("width").unwrap();
  assert_eq!(state.targets[0].property, width_slot);
  assert_eq!(state.targets[0].field, None);
}
