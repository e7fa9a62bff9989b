mod common;

use common::evaluations;
use common::new_runtime;
use common::plan;
use common::Plan;
use diagnostics::FileId;
use instantiate_dml::BindingFlags;
use instantiate_dml::CompiledValue;
use instantiate_dml::Component;
use instantiate_dml::ConstValue;
use instantiate_dml::ExprIndex;
use instantiate_dml::Loc;
use instantiate_dml::Revision;
use instantiate_dml::UnitBuilder;
use instantiate_dml::Value;

const V1: Revision = Revision::new(1, 0);

#[test]
fn deferred_bindings_are_skipped_then_activated() {
  let (mut rt, eval) = new_runtime();
  plan(&eval, 1, Plan::Const(Value::Real(8.0)));

  let mut b = UnitBuilder::new(FileId(0));
  let root = b
    .object("Item", V1)
    .binding(
      "width",
      BindingFlags::DEFERRED,
      CompiledValue::Literal(ConstValue::Int(5)),
      Loc::default(),
    )
    .binding(
      "height",
      BindingFlags::DEFERRED,
      CompiledValue::Script(ExprIndex(1)),
      Loc::default(),
    )
    .bind_literal("visible", ConstValue::Bool(true))
    .finish();
  b.set_root(root);

  let mut component = Component::new(b.finish());
  let root = component.create(&mut rt, None).unwrap();
  assert!(component.errors().is_empty(), "{:?}", component.errors());

  // Only the non-deferred binding applied.
  assert_eq!(rt.read_property(root, "visible"), Some(Value::Bool(true)));
  assert_eq!(rt.read_property(root, "width"), Some(Value::Real(0.0)));
  assert_eq!(rt.read_property(root, "height"), Some(Value::Real(0.0)));
  assert!(evaluations(&eval).is_empty());
  assert!(!rt.objects().instance(root).deferred.is_empty());

  let errors = rt.activate_deferred(root, None);
  assert!(errors.is_empty(), "{errors:?}");
  assert_eq!(rt.read_property(root, "width"), Some(Value::Real(5.0)));
  assert_eq!(rt.read_property(root, "height"), Some(Value::Real(8.0)));
  assert_eq!(evaluations(&eval), vec![1]);
  assert!(rt.objects().instance(root).deferred.is_empty());

  // Re-activation is a no-op.
  let errors = rt.activate_deferred(root, None);
  assert!(errors.is_empty());
  assert_eq!(evaluations(&eval), vec![1]);
}

#[test]
fn deferred_activation_can_target_one_property() {
  let (mut rt, _eval) = new_runtime();

  let mut b = UnitBuilder::new(FileId(0));
  let root = b
    .object("Item", V1)
    .binding(
      "width",
      BindingFlags::DEFERRED,
      CompiledValue::Literal(ConstValue::Int(5)),
      Loc::default(),
    )
    .binding(
      "height",
      BindingFlags::DEFERRED,
      CompiledValue::Literal(ConstValue::Int(6)),
      Loc::default(),
    )
    .finish();
  b.set_root(root);

  let mut component = Component::new(b.finish());
  let root = component.create(&mut rt, None).unwrap();

  let errors = rt.activate_deferred(root, Some("width"));
  assert!(errors.is_empty(), "{errors:?}");
  assert_eq!(rt.read_property(root, "width"), Some(Value::Real(5.0)));
  // The other binding stays deferred.
  assert_eq!(rt.read_property(root, "height"), Some(Value::Real(0.0)));
  assert!(!rt.objects().instance(root).deferred.is_empty());

  let errors = rt.activate_deferred(root, Some("height"));
  assert!(errors.is_empty());
  assert_eq!(rt.read_property(root, "height"), Some(Value::Real(6.0)));
  assert!(rt.objects().instance(root).deferred.is_empty());
}

#[test]
fn deferred_object_bindings_create_their_subtree_on_activation() {
  let (mut rt, _eval) = new_runtime();

  let mut b = UnitBuilder::new(FileId(0));
  let lazy = b
    .object("Text", V1)
    .bind_literal("text", ConstValue::String("late".into()))
    .finish();
  let root = b
    .object("Item", V1)
    .binding(
      "helper",
      BindingFlags::DEFERRED,
      CompiledValue::Object(lazy),
      Loc::default(),
    )
    .finish();
  b.set_root(root);

  let mut component = Component::new(b.finish());
  let root = component.create(&mut rt, None).unwrap();
  assert!(component.errors().is_empty());

  // The deferred subtree was not created with the initial pass.
  assert_eq!(rt.objects().live_count(), 1);
  assert_eq!(rt.read_property(root, "helper"), Some(Value::Null));

  let errors = rt.activate_deferred(root, None);
  assert!(errors.is_empty(), "{errors:?}");
  assert_eq!(rt.objects().live_count(), 2);
  let Some(Value::Object(helper)) = rt.read_property(root, "helper") else {
    panic!("helper not created");
  };
  assert_eq!(
    rt.read_property(helper, "text"),
    Some(Value::String("late".into()))
  );
  assert_eq!(rt.objects().instance(helper).parent, Some(root));
}
