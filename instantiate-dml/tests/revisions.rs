mod common;

use common::new_runtime;
use diagnostics::FileId;
use instantiate_dml::codes;
use instantiate_dml::Component;
use instantiate_dml::ConstValue;
use instantiate_dml::Revision;
use instantiate_dml::UnitBuilder;
use instantiate_dml::Value;

#[test]
fn slots_added_in_later_revisions_are_invisible_to_older_documents() {
  let (mut rt, _eval) = new_runtime();

  // "padding" was added to Styled in 2.1; a 2.0 document cannot see it.
  let mut b = UnitBuilder::new(FileId(0));
  let root = b
    .object("Styled", Revision::new(2, 0))
    .bind_literal("padding", ConstValue::Int(1))
    .finish();
  b.set_root(root);

  let mut component = Component::new(b.finish());
  component.create(&mut rt, None).unwrap();
  assert_eq!(component.errors().len(), 1);
  assert_eq!(component.errors()[0].code, codes::NO_SUCH_PROPERTY);
  assert!(component.errors()[0].message.contains("padding"));
}

#[test]
fn requesting_the_introducing_revision_reveals_the_slot() {
  let (mut rt, _eval) = new_runtime();

  let mut b = UnitBuilder::new(FileId(0));
  let root = b
    .object("Styled", Revision::new(2, 1))
    .bind_literal("padding", ConstValue::Int(1))
    .finish();
  b.set_root(root);

  let mut component = Component::new(b.finish());
  let root = component.create(&mut rt, None).unwrap();
  assert!(component.errors().is_empty(), "{:?}", component.errors());
  assert_eq!(rt.read_property(root, "padding"), Some(Value::Real(1.0)));
}

#[test]
fn inherited_unrevisioned_slots_stay_visible_at_any_version() {
  let (mut rt, _eval) = new_runtime();

  let mut b = UnitBuilder::new(FileId(0));
  let root = b
    .object("Styled", Revision::new(2, 0))
    .bind_literal("width", ConstValue::Int(6))
    .finish();
  b.set_root(root);

  let mut component = Component::new(b.finish());
  let root = component.create(&mut rt, None).unwrap();
  assert!(component.errors().is_empty());
  assert_eq!(rt.read_property(root, "width"), Some(Value::Real(6.0)));
}
