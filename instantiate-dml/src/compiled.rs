//! Compiled-unit tables.
//!
//! A [`CompiledUnit`] is the immutable output of the external document
//! compiler: a string table plus an ordered list of object records, each
//! carrying its binding table, declarations, and required-property markers.
//! Units are shared via `Arc` and referenced (never owned) by every builder
//! operating on them. Object identity is the index into the unit.

use crate::value::Value;
use ahash::AHashMap;
use diagnostics::FileId;
use diagnostics::Span;
use diagnostics::TextRange;
use serde::Deserialize;
use serde::Serialize;
use std::sync::Arc;

/// Index into a unit's string table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[repr(transparent)]
pub struct StrIndex(pub u32);

/// Index of an object record within its unit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ObjectIndex(pub u32);

/// Index of a compiled expression in the expression-evaluation service's
/// table. Opaque to this engine.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ExprIndex(pub u32);

/// A byte range within the unit's source document.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct Loc(pub u32, pub u32);

/// A document API version: `major.minor`.
#[derive(
  Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize, Default,
)]
pub struct Revision {
  pub major: u16,
  pub minor: u16,
}

impl Revision {
  pub const ZERO: Revision = Revision::new(0, 0);
  pub const MAX: Revision = Revision::new(u16::MAX, u16::MAX);

  pub const fn new(major: u16, minor: u16) -> Self {
    Self { major, minor }
  }
}

impl std::fmt::Display for Revision {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}.{}", self.major, self.minor)
  }
}

bitflags::bitflags! {
  /// Modifier flags on a compiled binding.
  #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
  pub struct BindingFlags: u8 {
    /// Not applied during initial construction; activated later on demand.
    const DEFERRED = 1 << 0;
    /// Dotted property path; the payload object holds the nested bindings.
    const GROUP = 1 << 1;
    /// Attached-property block; the property name is the attaching type.
    const ATTACHED = 1 << 2;
    /// Signal handler; the payload script becomes a bound-signal record.
    const SIGNAL_HANDLER = 1 << 3;
    /// `on`-assignment; the payload object is a value source/interceptor.
    const ON_ASSIGNMENT = 1 << 4;
  }
}

impl Serialize for BindingFlags {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(self.bits())
  }
}

impl<'de> Deserialize<'de> for BindingFlags {
  fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    Ok(Self::from_bits_truncate(u8::deserialize(deserializer)?))
  }
}

bitflags::bitflags! {
  /// Flags on a compiled object record.
  #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
  pub struct ObjectFlags: u8 {
    /// A component declaration: not instantiated with the surrounding tree;
    /// assigning it to a property produces a component value.
    const IS_COMPONENT = 1 << 0;
    /// A component bound to its creation context; instantiating it outside
    /// that context is a structural error.
    const BOUND_COMPONENT = 1 << 1;
  }
}

impl Serialize for ObjectFlags {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(self.bits())
  }
}

impl<'de> Deserialize<'de> for ObjectFlags {
  fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    Ok(Self::from_bits_truncate(u8::deserialize(deserializer)?))
  }
}

/// A literal value embedded in the compiled tables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConstValue {
  Null,
  Bool(bool),
  Int(i32),
  Real(f64),
  String(String),
}

impl ConstValue {
  pub fn to_value(&self) -> Value {
    match self {
      ConstValue::Null => Value::Null,
      ConstValue::Bool(b) => Value::Bool(*b),
      ConstValue::Int(i) => Value::Int(*i),
      ConstValue::Real(r) => Value::Real(*r),
      ConstValue::String(s) => Value::String(s.clone()),
    }
  }
}

/// The right-hand side of a compiled binding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CompiledValue {
  Literal(ConstValue),
  Script(ExprIndex),
  Object(ObjectIndex),
}

/// One property-name → value association in an object's binding table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompiledBinding {
  /// Empty string targets the object's default property.
  pub property: StrIndex,
  pub flags: BindingFlags,
  pub value: CompiledValue,
  pub loc: Loc,
}

/// The declared type of a property declaration in a document.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum DeclaredType {
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
  /// A named object type.
  Custom(StrIndex),
  /// A list of a named object type.
  CustomList(StrIndex),
}

/// A property declared by a compiled object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertyDecl {
  pub name: StrIndex,
  pub ty: DeclaredType,
  pub required: bool,
  pub read_only: bool,
  pub loc: Loc,
}

/// An alias declared by a compiled object: `name` forwards to
/// `target_id[.target_property]`. Without a target property the alias refers
/// to the target object itself and is read-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AliasDecl {
  pub name: StrIndex,
  pub target_id: StrIndex,
  pub target_property: Option<StrIndex>,
  pub loc: Loc,
}

/// A signal declared by a compiled object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalDecl {
  pub name: StrIndex,
  pub params: Vec<(StrIndex, DeclaredType)>,
  pub loc: Loc,
}

/// A function declared by a compiled object. The body is an opaque compiled
/// expression owned by the expression-evaluation service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
  pub name: StrIndex,
  pub formals: Vec<StrIndex>,
  pub body: ExprIndex,
  pub loc: Loc,
}

/// One object record in a compiled unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompiledObject {
  pub type_name: StrIndex,
  /// The API version the document requested for this type.
  pub type_version: Revision,
  pub id: Option<StrIndex>,
  pub flags: ObjectFlags,
  pub properties: Vec<PropertyDecl>,
  pub aliases: Vec<AliasDecl>,
  pub signals: Vec<SignalDecl>,
  pub functions: Vec<FunctionDecl>,
  pub bindings: Vec<CompiledBinding>,
  /// Required markers on properties this object does not itself declare.
  pub required: Vec<StrIndex>,
  /// Index into `properties` of the declared default property, if any.
  pub default_property: Option<u32>,
  pub loc: Loc,
}

impl CompiledObject {
  pub fn declares_members(&self) -> bool {
    !self.properties.is_empty()
      || !self.aliases.is_empty()
      || !self.signals.is_empty()
      || !self.functions.is_empty()
  }
}

/// A complete compiled document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompiledUnit {
  #[serde(with = "file_id_serde")]
  pub file: FileId,
  pub strings: Vec<String>,
  pub objects: Vec<CompiledObject>,
  pub root: ObjectIndex,
}

mod file_id_serde {
  use diagnostics::FileId;
  use serde::Deserialize;

  pub fn serialize<S: serde::Serializer>(file: &FileId, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u32(file.0)
  }

  pub fn deserialize<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<FileId, D::Error> {
    Ok(FileId(u32::deserialize(deserializer)?))
  }
}

impl CompiledUnit {
  pub fn str_at(&self, index: StrIndex) -> &str {
    &self.strings[index.0 as usize]
  }

  /// Panics on out-of-range indices; compiled tables are validated by their
  /// producer.
  pub fn object(&self, index: ObjectIndex) -> &CompiledObject {
    &self.objects[index.0 as usize]
  }

  pub fn get_object(&self, index: ObjectIndex) -> Option<&CompiledObject> {
    self.objects.get(index.0 as usize)
  }

  pub fn object_count(&self) -> usize {
    self.objects.len()
  }

  pub fn span(&self, loc: Loc) -> Span {
    Span::new(self.file, TextRange::new(loc.0, loc.1))
  }
}

/// Assembles [`CompiledUnit`]s programmatically. Hosts use this to adapt an
/// external compiler's output; tests use it to build fixtures.
#[derive(Debug)]
pub struct UnitBuilder {
  file: FileId,
  strings: Vec<String>,
  interned: AHashMap<String, StrIndex>,
  objects: Vec<CompiledObject>,
  root: ObjectIndex,
}

impl UnitBuilder {
  pub fn new(file: FileId) -> Self {
    Self {
      file,
      strings: Vec::new(),
      interned: AHashMap::new(),
      objects: Vec::new(),
      root: ObjectIndex(0),
    }
  }

  pub fn intern(&mut self, s: &str) -> StrIndex {
    if let Some(index) = self.interned.get(s) {
      return *index;
    }
    assert!(self.strings.len() < u32::MAX as usize, "string table overflow");
    let index = StrIndex(self.strings.len() as u32);
    self.strings.push(s.to_string());
    self.interned.insert(s.to_string(), index);
    index
  }

  /// Begin a new object record. Finish it with [`ObjectBuilder::finish`]
  /// before beginning the next one.
  pub fn object(&mut self, type_name: &str, version: Revision) -> ObjectBuilder<'_> {
    let type_name = self.intern(type_name);
    ObjectBuilder {
      object: CompiledObject {
        type_name,
        type_version: version,
        id: None,
        flags: ObjectFlags::empty(),
        properties: Vec::new(),
        aliases: Vec::new(),
        signals: Vec::new(),
        functions: Vec::new(),
        bindings: Vec::new(),
        required: Vec::new(),
        default_property: None,
        loc: Loc::default(),
      },
      unit: self,
    }
  }

  /// Set the root object. Defaults to index zero.
  pub fn set_root(&mut self, root: ObjectIndex) {
    self.root = root;
  }

  pub fn finish(self) -> Arc<CompiledUnit> {
    Arc::new(CompiledUnit {
      file: self.file,
      strings: self.strings,
      objects: self.objects,
      root: self.root,
    })
  }
}

/// Builder for a single [`CompiledObject`].
pub struct ObjectBuilder<'a> {
  unit: &'a mut UnitBuilder,
  object: CompiledObject,
}

impl<'a> ObjectBuilder<'a> {
  pub fn with_id(mut self, id: &str) -> Self {
    self.object.id = Some(self.unit.intern(id));
    self
  }

  pub fn with_flags(mut self, flags: ObjectFlags) -> Self {
    self.object.flags |= flags;
    self
  }

  pub fn at(mut self, loc: Loc) -> Self {
    self.object.loc = loc;
    self
  }

  pub fn declare_property(mut self, name: &str, ty: DeclaredType) -> Self {
    let name = self.unit.intern(name);
    self.object.properties.push(PropertyDecl {
      name,
      ty,
      required: false,
      read_only: false,
      loc: Loc::default(),
    });
    self
  }

  pub fn declare_required_property(mut self, name: &str, ty: DeclaredType) -> Self {
    let name = self.unit.intern(name);
    self.object.properties.push(PropertyDecl {
      name,
      ty,
      required: true,
      read_only: false,
      loc: Loc::default(),
    });
    self
  }

  pub fn declare_read_only_property(mut self, name: &str, ty: DeclaredType) -> Self {
    let name = self.unit.intern(name);
    self.object.properties.push(PropertyDecl {
      name,
      ty,
      required: false,
      read_only: true,
      loc: Loc::default(),
    });
    self
  }

  /// Mark the most recently declared property as the default property.
  pub fn as_default(mut self) -> Self {
    assert!(!self.object.properties.is_empty(), "no property declared yet");
    self.object.default_property = Some(self.object.properties.len() as u32 - 1);
    self
  }

  pub fn declare_alias(mut self, name: &str, target_id: &str, target_property: Option<&str>) -> Self {
    let name = self.unit.intern(name);
    let target_id = self.unit.intern(target_id);
    let target_property = target_property.map(|p| self.unit.intern(p));
    self.object.aliases.push(AliasDecl {
      name,
      target_id,
      target_property,
      loc: Loc::default(),
    });
    self
  }

  pub fn declare_signal(mut self, name: &str, params: &[(&str, DeclaredType)]) -> Self {
    let name = self.unit.intern(name);
    let params = params
      .iter()
      .map(|(n, ty)| (self.unit.intern(n), *ty))
      .collect();
    self.object.signals.push(SignalDecl {
      name,
      params,
      loc: Loc::default(),
    });
    self
  }

  pub fn declare_function(mut self, name: &str, formals: &[&str], body: ExprIndex) -> Self {
    let name = self.unit.intern(name);
    let formals = formals.iter().map(|f| self.unit.intern(f)).collect();
    self.object.functions.push(FunctionDecl {
      name,
      formals,
      body,
      loc: Loc::default(),
    });
    self
  }

  /// Mark an inherited property as required.
  pub fn mark_required(mut self, name: &str) -> Self {
    let name = self.unit.intern(name);
    self.object.required.push(name);
    self
  }

  /// Append a binding with explicit flags and location.
  pub fn binding(mut self, property: &str, flags: BindingFlags, value: CompiledValue, loc: Loc) -> Self {
    let property = self.unit.intern(property);
    self.object.bindings.push(CompiledBinding {
      property,
      flags,
      value,
      loc,
    });
    self
  }

  pub fn bind_literal(self, property: &str, value: ConstValue) -> Self {
    self.binding(
      property,
      BindingFlags::empty(),
      CompiledValue::Literal(value),
      Loc::default(),
    )
  }

  pub fn bind_script(self, property: &str, expr: ExprIndex) -> Self {
    self.binding(
      property,
      BindingFlags::empty(),
      CompiledValue::Script(expr),
      Loc::default(),
    )
  }

  pub fn bind_object(self, property: &str, object: ObjectIndex) -> Self {
    self.binding(
      property,
      BindingFlags::empty(),
      CompiledValue::Object(object),
      Loc::default(),
    )
  }

  pub fn finish(self) -> ObjectIndex {
    assert!(
      self.unit.objects.len() < u32::MAX as usize,
      "object table overflow"
    );
    let index = ObjectIndex(self.unit.objects.len() as u32);
    self.unit.objects.push(self.object);
    index
  }
}
