use crate::compiled::CompiledUnit;
use crate::compiled::ObjectIndex;
use crate::handle::ContextId;
use crate::handle::ObjectId;
use std::sync::Arc;

/// An ARGB color with 8-bit channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
  pub a: u8,
  pub r: u8,
  pub g: u8,
  pub b: u8,
}

impl Color {
  pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
    Self { a: 0xff, r, g, b }
  }

  pub const fn argb(a: u8, r: u8, g: u8, b: u8) -> Self {
    Self { a, r, g, b }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Point {
  pub x: f64,
  pub y: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Size {
  pub width: f64,
  pub height: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Rect {
  pub x: f64,
  pub y: f64,
  pub width: f64,
  pub height: f64,
}

/// A component definition captured as a value: a compiled object flagged as a
/// component declaration, together with the creation context it was declared
/// in. Bound components may only be instantiated inside that context.
#[derive(Clone, Debug, PartialEq)]
pub struct ComponentRef {
  pub unit: Arc<CompiledUnit>,
  pub index: ObjectIndex,
  pub context: ContextId,
}

/// A runtime property value.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
  #[default]
  Null,
  Bool(bool),
  Int(i32),
  Real(f64),
  String(String),
  Url(String),
  Color(Color),
  Point(Point),
  Size(Size),
  Rect(Rect),
  Object(ObjectId),
  Component(ComponentRef),
  List(Vec<Value>),
}

impl Value {
  /// Short name of the value's kind, for error messages.
  pub fn kind_name(&self) -> &'static str {
    match self {
      Value::Null => "null",
      Value::Bool(_) => "bool",
      Value::Int(_) => "int",
      Value::Real(_) => "real",
      Value::String(_) => "string",
      Value::Url(_) => "url",
      Value::Color(_) => "color",
      Value::Point(_) => "point",
      Value::Size(_) => "size",
      Value::Rect(_) => "rect",
      Value::Object(_) => "object",
      Value::Component(_) => "component",
      Value::List(_) => "list",
    }
  }

  /// Whether this value is a value type with named sub-fields (used by group
  /// property bindings, which copy the wrapper out, mutate it, and write it
  /// back).
  pub fn is_value_type(&self) -> bool {
    matches!(self, Value::Point(_) | Value::Size(_) | Value::Rect(_))
  }

  /// Read a named sub-field of a value type.
  pub fn field(&self, name: &str) -> Option<Value> {
    match (self, name) {
      (Value::Point(p), "x") => Some(Value::Real(p.x)),
      (Value::Point(p), "y") => Some(Value::Real(p.y)),
      (Value::Size(s), "width") => Some(Value::Real(s.width)),
      (Value::Size(s), "height") => Some(Value::Real(s.height)),
      (Value::Rect(r), "x") => Some(Value::Real(r.x)),
      (Value::Rect(r), "y") => Some(Value::Real(r.y)),
      (Value::Rect(r), "width") => Some(Value::Real(r.width)),
      (Value::Rect(r), "height") => Some(Value::Real(r.height)),
      _ => None,
    }
  }

  /// Write a named sub-field of a value type. The field value must be
  /// numeric; ints widen to real.
  pub fn set_field(&mut self, name: &str, value: &Value) -> Result<(), ()> {
    let number = match value {
      Value::Int(i) => *i as f64,
      Value::Real(r) => *r,
      _ => return Err(()),
    };
    let slot = match (self, name) {
      (Value::Point(p), "x") => &mut p.x,
      (Value::Point(p), "y") => &mut p.y,
      (Value::Size(s), "width") => &mut s.width,
      (Value::Size(s), "height") => &mut s.height,
      (Value::Rect(r), "x") => &mut r.x,
      (Value::Rect(r), "y") => &mut r.y,
      (Value::Rect(r), "width") => &mut r.width,
      (Value::Rect(r), "height") => &mut r.height,
      _ => return Err(()),
    };
    *slot = number;
    Ok(())
  }
}

/// Named integer encoding of an enum type, as resolved from a native type
/// registration. Literal conversion validates enum assignments against this.
#[derive(Clone, Debug, PartialEq)]
pub struct EnumEncoding {
  pub name: String,
  pub values: Vec<(String, i32)>,
}

impl EnumEncoding {
  pub fn value_of(&self, name: &str) -> Option<i32> {
    self
      .values
      .iter()
      .find_map(|(n, v)| (n == name).then_some(*v))
  }

  pub fn contains(&self, value: i32) -> bool {
    self.values.iter().any(|(_, v)| *v == value)
  }
}

/// The declared type of a property slot.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyType {
  /// `var`: accepts any value.
  Var,
  Bool,
  Int,
  Real,
  String,
  Url,
  Color,
  Point,
  Size,
  Rect,
  /// An enum value, validated against its resolved numeric encoding.
  Enum(Arc<EnumEncoding>),
  /// An object reference, optionally constrained to a named class.
  Object(Option<Arc<str>>),
  List(Box<PropertyType>),
}

impl PropertyType {
  /// The value a freshly created slot of this type holds.
  pub fn default_value(&self) -> Value {
    match self {
      PropertyType::Var => Value::Null,
      PropertyType::Bool => Value::Bool(false),
      PropertyType::Int => Value::Int(0),
      PropertyType::Real => Value::Real(0.0),
      PropertyType::String => Value::String(String::new()),
      PropertyType::Url => Value::Url(String::new()),
      PropertyType::Color => Value::Color(Color::rgb(0, 0, 0)),
      PropertyType::Point => Value::Point(Point::default()),
      PropertyType::Size => Value::Size(Size::default()),
      PropertyType::Rect => Value::Rect(Rect::default()),
      PropertyType::Enum(_) => Value::Int(0),
      PropertyType::Object(_) => Value::Null,
      PropertyType::List(_) => Value::List(Vec::new()),
    }
  }

  pub fn name(&self) -> String {
    match self {
      PropertyType::Var => "var".into(),
      PropertyType::Bool => "bool".into(),
      PropertyType::Int => "int".into(),
      PropertyType::Real => "real".into(),
      PropertyType::String => "string".into(),
      PropertyType::Url => "url".into(),
      PropertyType::Color => "color".into(),
      PropertyType::Point => "point".into(),
      PropertyType::Size => "size".into(),
      PropertyType::Rect => "rect".into(),
      PropertyType::Enum(e) => e.name.clone(),
      PropertyType::Object(None) => "object".into(),
      PropertyType::Object(Some(class)) => class.to_string(),
      PropertyType::List(inner) => format!("list<{}>", inner.name()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn value_type_fields_round_trip() {
    let mut rect = Value::Rect(Rect::default());
    rect.set_field("width", &Value::Int(20)).unwrap();
    rect.set_field("x", &Value::Real(1.5)).unwrap();
    assert_eq!(rect.field("width"), Some(Value::Real(20.0)));
    assert_eq!(rect.field("x"), Some(Value::Real(1.5)));
    assert!(rect.set_field("radius", &Value::Int(1)).is_err());
    assert!(rect.set_field("width", &Value::Bool(true)).is_err());
  }

  #[test]
  fn enum_encoding_lookups() {
    let encoding = EnumEncoding {
      name: "Orientation".into(),
      values: vec![("Horizontal".into(), 1), ("Vertical".into(), 2)],
    };
    assert_eq!(encoding.value_of("Vertical"), Some(2));
    assert_eq!(encoding.value_of("Diagonal"), None);
    assert!(encoding.contains(1));
    assert!(!encoding.contains(3));
  }
}
