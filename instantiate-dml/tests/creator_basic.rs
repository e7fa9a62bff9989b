mod common;

use common::new_runtime;
use diagnostics::FileId;
use instantiate_dml::codes;
use instantiate_dml::Color;
use instantiate_dml::Component;
use instantiate_dml::ConstValue;
use instantiate_dml::ExprIndex;
use instantiate_dml::Revision;
use instantiate_dml::UnitBuilder;
use instantiate_dml::Value;

const V1: Revision = Revision::new(1, 0);

#[test]
fn creates_a_tree_in_declared_order() {
  let (mut rt, _eval) = new_runtime();

  let mut b = UnitBuilder::new(FileId(0));
  let first = b
    .object("Text", V1)
    .with_id("first")
    .bind_literal("text", ConstValue::String("hello".into()))
    .bind_literal("color", ConstValue::String("#ff0000".into()))
    .finish();
  let second = b
    .object("Text", V1)
    .with_id("second")
    .bind_literal("text", ConstValue::String("world".into()))
    .finish();
  let root = b
    .object("Item", V1)
    .with_id("root")
    .bind_literal("width", ConstValue::Int(10))
    .bind_object("", first)
    .bind_object("", second)
    .finish();
  b.set_root(root);
  let unit = b.finish();

  let mut component = Component::new(unit);
  let root = component.create(&mut rt, None).expect("creation succeeds");
  assert!(component.errors().is_empty(), "{:?}", component.errors());

  // Literal conversion widened the int to the real-typed slot.
  assert_eq!(rt.read_property(root, "width"), Some(Value::Real(10.0)));

  // Default-property routing appended both children in declared order.
  let data = rt.read_property(root, "data").unwrap();
  let Value::List(children) = data else {
    panic!("expected list, got {data:?}");
  };
  assert_eq!(children.len(), 2);
  let Value::Object(first_child) = children[0] else {
    panic!("expected object");
  };
  assert_eq!(
    rt.read_property(first_child, "text"),
    Some(Value::String("hello".into()))
  );
  assert_eq!(
    rt.read_property(first_child, "color"),
    Some(Value::Color(Color::rgb(0xff, 0, 0)))
  );

  // Ids resolve through the root creation context.
  let context = rt.objects().instance(root).context.unwrap();
  let by_id = rt.contexts().lookup_name(context, "second").unwrap();
  assert_eq!(
    rt.read_property(by_id, "text"),
    Some(Value::String("world".into()))
  );
  assert_eq!(rt.objects().instance(first_child).parent, Some(root));
  assert_eq!(rt.objects().live_count(), 3);
}

#[test]
fn unresolved_type_aborts_remaining_siblings() {
  let (mut rt, _eval) = new_runtime();

  let mut b = UnitBuilder::new(FileId(0));
  let bogus = b.object("Bogus", V1).finish();
  let text = b.object("Text", V1).with_id("late").finish();
  let root = b
    .object("Item", V1)
    .bind_object("", bogus)
    .bind_object("", text)
    .finish();
  b.set_root(root);

  let mut component = Component::new(b.finish());
  let root = component.create(&mut rt, None).expect("root itself is fine");

  let errors = component.errors();
  assert_eq!(errors.len(), 1);
  assert_eq!(errors[0].code, codes::UNRESOLVED_TYPE);
  assert!(errors[0].message.contains("Bogus"));

  // The failing sibling aborted the one declared after it.
  assert!(rt.objects().instance(root).children.is_empty());
  assert_eq!(rt.objects().live_count(), 1);
}

#[test]
fn unconvertible_literal_aborts_only_that_binding() {
  let (mut rt, _eval) = new_runtime();

  let mut b = UnitBuilder::new(FileId(0));
  let root = b
    .object("Item", V1)
    .bind_literal("width", ConstValue::Bool(true))
    .bind_literal("height", ConstValue::Int(4))
    .finish();
  b.set_root(root);

  let mut component = Component::new(b.finish());
  let root = component.create(&mut rt, None).expect("object still created");

  assert_eq!(component.errors().len(), 1);
  assert_eq!(component.errors()[0].code, codes::INVALID_ASSIGNMENT);
  // The failed binding left its slot at the default; the next one applied.
  assert_eq!(rt.read_property(root, "width"), Some(Value::Real(0.0)));
  assert_eq!(rt.read_property(root, "height"), Some(Value::Real(4.0)));
}

#[test]
fn assigning_to_unknown_property_is_an_error() {
  let (mut rt, _eval) = new_runtime();

  let mut b = UnitBuilder::new(FileId(0));
  let root = b
    .object("Item", V1)
    .bind_literal("wdith", ConstValue::Int(3))
    .finish();
  b.set_root(root);

  let mut component = Component::new(b.finish());
  component.create(&mut rt, None).expect("object still created");
  assert_eq!(component.errors().len(), 1);
  assert_eq!(component.errors()[0].code, codes::NO_SUCH_PROPERTY);
  assert!(component.errors()[0].message.contains("wdith"));
}

#[test]
fn declared_functions_install_on_method_slots() {
  let (mut rt, _eval) = new_runtime();

  let mut b = UnitBuilder::new(FileId(0));
  let root = b
    .object("Item", V1)
    .declare_function("describe", &["prefix"], ExprIndex(7))
    .finish();
  b.set_root(root);

  let mut component = Component::new(b.finish());
  let root = component.create(&mut rt, None).unwrap();

  let instance = rt.objects().instance(root);
  let (method_index, data) = instance.cache.method("describe").expect("method slot exists");
  assert_eq!(data.params, vec!["prefix".to_string()]);
  assert_eq!(instance.methods.get(&method_index), Some(&ExprIndex(7)));
}

#[test]
fn signal_handlers_become_bound_signal_records() {
  let (mut rt, _eval) = new_runtime();

  let mut b = UnitBuilder::new(FileId(0));
  let root = b
    .object("Item", V1)
    .binding(
      "clicked",
      instantiate_dml::BindingFlags::SIGNAL_HANDLER,
      instantiate_dml::CompiledValue::Script(ExprIndex(3)),
      instantiate_dml::Loc::default(),
    )
    .binding(
      "missing",
      instantiate_dml::BindingFlags::SIGNAL_HANDLER,
      instantiate_dml::CompiledValue::Script(ExprIndex(4)),
      instantiate_dml::Loc::default(),
    )
    .finish();
  b.set_root(root);

  let mut component = Component::new(b.finish());
  let root = component.create(&mut rt, None).unwrap();

  let instance = rt.objects().instance(root);
  assert_eq!(instance.bound_signals.len(), 1);
  assert_eq!(instance.bound_signals[0].expr, ExprIndex(3));
  let (signal_index, _) = instance.cache.signal("clicked").unwrap();
  assert_eq!(instance.bound_signals[0].signal, signal_index);

  assert_eq!(component.errors().len(), 1);
  assert_eq!(component.errors()[0].code, codes::NO_SUCH_SIGNAL);
}

#[test]
fn read_only_properties_reject_assignment() {
  let (mut rt, _eval) = new_runtime();

  let mut b = UnitBuilder::new(FileId(0));
  let root = b
    .object("Item", V1)
    .declare_read_only_property("locked", instantiate_dml::DeclaredType::Int)
    .bind_literal("locked", ConstValue::Int(9))
    .finish();
  b.set_root(root);

  let mut component = Component::new(b.finish());
  component.create(&mut rt, None).unwrap();
  assert_eq!(component.errors().len(), 1);
  assert_eq!(component.errors()[0].code, codes::READ_ONLY_PROPERTY);
}
