mod common;

use common::new_runtime;
use diagnostics::FileId;
use instantiate_dml::codes;
use instantiate_dml::Component;
use instantiate_dml::ConstValue;
use instantiate_dml::DeclaredType;
use instantiate_dml::Revision;
use instantiate_dml::UnitBuilder;
use instantiate_dml::Value;

const V1: Revision = Revision::new(1, 0);

#[test]
fn unset_required_property_fails_completion_with_one_error() {
  let (mut rt, _eval) = new_runtime();

  let mut b = UnitBuilder::new(FileId(0));
  let root = b
    .object("Item", V1)
    .declare_required_property("title", DeclaredType::String)
    .finish();
  b.set_root(root);

  let mut component = Component::new(b.finish());
  let root = component.begin_create(&mut rt, None);
  assert!(root.is_some());

  assert!(component.complete_create(&mut rt).is_none());
  let errors = component.errors();
  assert_eq!(errors.len(), 1);
  assert_eq!(errors[0].code, codes::REQUIRED_NOT_SET);
  assert!(errors[0].message.contains("title"));
  // The failed pass rolled back on completion.
  assert_eq!(rt.objects().live_count(), 0);
}

#[test]
fn initial_properties_between_begin_and_complete_satisfy_required() {
  let (mut rt, _eval) = new_runtime();

  let mut b = UnitBuilder::new(FileId(0));
  let root = b
    .object("Item", V1)
    .declare_required_property("count", DeclaredType::Int)
    .finish();
  b.set_root(root);

  let mut component = Component::new(b.finish());
  let root = component.begin_create(&mut rt, None).unwrap();
  component.set_initial_properties(&mut rt, &[("count".to_string(), Value::Int(5))]);
  let completed = component.complete_create(&mut rt);

  assert_eq!(completed, Some(root));
  assert!(component.errors().is_empty(), "{:?}", component.errors());
  assert_eq!(rt.read_property(root, "count"), Some(Value::Int(5)));
}

#[test]
fn literal_binding_satisfies_required() {
  let (mut rt, _eval) = new_runtime();

  let mut b = UnitBuilder::new(FileId(0));
  let root = b
    .object("Item", V1)
    .declare_required_property("title", DeclaredType::String)
    .bind_literal("title", ConstValue::String("set".into()))
    .finish();
  b.set_root(root);

  let mut component = Component::new(b.finish());
  let root = component.create(&mut rt, None).unwrap();
  assert!(component.errors().is_empty());
  assert_eq!(rt.read_property(root, "title"), Some(Value::String("set".into())));
}

#[test]
fn required_markers_on_inherited_native_properties_are_enforced() {
  let (mut rt, _eval) = new_runtime();

  let mut b = UnitBuilder::new(FileId(0));
  let root = b.object("Item", V1).mark_required("width").finish();
  b.set_root(root);

  let mut component = Component::new(b.finish());
  component.begin_create(&mut rt, None).unwrap();
  assert!(component.complete_create(&mut rt).is_none());
  assert_eq!(component.errors().len(), 1);
  assert!(component.errors()[0].message.contains("width"));
}

#[test]
fn native_ancestor_required_properties_are_scanned() {
  let (mut rt, _eval) = new_runtime();

  // SpecialField declares nothing itself; its native ancestor FormField
  // requires "label", and the full flattened descriptor is scanned for
  // native nominal types.
  let mut b = UnitBuilder::new(FileId(0));
  let root = b.object("SpecialField", V1).finish();
  b.set_root(root);

  let mut component = Component::new(b.finish());
  component.begin_create(&mut rt, None).unwrap();
  assert!(component.complete_create(&mut rt).is_none());
  assert_eq!(component.errors().len(), 1);
  assert!(component.errors()[0].message.contains("label"));

  // Satisfied variant.
  let mut b = UnitBuilder::new(FileId(0));
  let root = b
    .object("SpecialField", V1)
    .bind_literal("label", ConstValue::String("ok".into()))
    .finish();
  b.set_root(root);
  let mut component = Component::new(b.finish());
  assert!(component.create(&mut rt, None).is_some());
  assert!(component.errors().is_empty());
}

#[test]
fn alias_write_satisfies_the_canonical_required_entry() {
  let (mut rt, _eval) = new_runtime();

  let mut b = UnitBuilder::new(FileId(0));
  let root = b
    .object("Item", V1)
    .with_id("top")
    .declare_required_property("title", DeclaredType::String)
    .declare_alias("shortcut", "top", Some("title"))
    .bind_literal("shortcut", ConstValue::String("via alias".into()))
    .finish();
  b.set_root(root);

  let mut component = Component::new(b.finish());
  let root = component.create(&mut rt, None).unwrap();
  assert!(component.errors().is_empty(), "{:?}", component.errors());
  assert_eq!(
    rt.read_property(root, "title"),
    Some(Value::String("via alias".into()))
  );
  // Reading through the alias sees the same value.
  assert_eq!(
    rt.read_property(root, "shortcut"),
    Some(Value::String("via alias".into()))
  );
}

#[test]
fn unset_required_error_names_alias_routes() {
  let (mut rt, _eval) = new_runtime();

  let mut b = UnitBuilder::new(FileId(0));
  let root = b
    .object("Item", V1)
    .with_id("top")
    .declare_required_property("title", DeclaredType::String)
    .declare_alias("shortcut", "top", Some("title"))
    .finish();
  b.set_root(root);

  let mut component = Component::new(b.finish());
  component.begin_create(&mut rt, None).unwrap();
  assert!(component.complete_create(&mut rt).is_none());

  let errors = component.errors();
  assert_eq!(errors.len(), 1);
  assert_eq!(errors[0].code, codes::REQUIRED_NOT_SET);
  assert!(errors[0].notes.iter().any(|note| note.contains("shortcut")));
}

#[test]
fn unresolved_alias_target_is_a_structural_error() {
  let (mut rt, _eval) = new_runtime();

  let mut b = UnitBuilder::new(FileId(0));
  let root = b
    .object("Item", V1)
    .declare_alias("broken", "nonexistent", None)
    .finish();
  b.set_root(root);

  let mut component = Component::new(b.finish());
  component.create(&mut rt, None).unwrap();
  assert_eq!(component.errors().len(), 1);
  assert_eq!(component.errors()[0].code, codes::UNRESOLVED_ALIAS_TARGET);
}
