//! Revision-aware property descriptor caches.
//!
//! A [`PropertyCache`] maps property/method/signal names to stable numeric
//! slots for one level of a type's inheritance chain. Each cache only holds
//! the slots introduced at its level; lookup walks the parent chain. Caches
//! are immutable once built and shared via `Arc` — extending a type always
//! copies-and-appends into a new cache, never mutates in place, so concurrent
//! readers across incubation slices are safe without locking.
//!
//! Global slot indices are continuous across the chain:
//! `property_offset..property_offset + local count` belongs to this level,
//! which makes "is this slot visible from this descendant" an O(1) offset
//! comparison instead of a chain walk.

use crate::compiled::CompiledObject;
use crate::compiled::CompiledUnit;
use crate::compiled::DeclaredType;
use crate::compiled::Revision;
use crate::error::codes;
use crate::value::PropertyType;
use ahash::AHashMap;
use ahash::AHashSet;
use diagnostics::Diagnostic;
use std::sync::Arc;

bitflags::bitflags! {
  /// Flags on a property slot.
  #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
  pub struct PropertyFlags: u16 {
    const READ_ONLY = 1 << 0;
    /// Construction must assign this property before completion.
    const REQUIRED = 1 << 1;
    /// Descendants may not shadow this slot.
    const FINAL = 1 << 2;
    /// A native reactive slot; its bindings drain in the second finalize
    /// queue.
    const REACTIVE = 1 << 3;
    /// An alias placeholder; reads and writes forward to the alias target
    /// resolved per instance.
    const ALIAS = 1 << 4;
    /// Declared `var`.
    const VAR = 1 << 5;
  }
}

/// A property slot.
#[derive(Clone, Debug)]
pub struct PropertyData {
  pub name: String,
  pub ty: PropertyType,
  pub flags: PropertyFlags,
  /// The revision this slot was added in, at its level.
  pub revision: Revision,
  /// Global signal index of the slot's change-notify signal.
  pub notify_signal: Option<u32>,
  /// Global property index of the same-name slot this one shadows. The
  /// shadowed slot keeps its index so dispatch through it still works.
  pub overrides: Option<u32>,
}

/// A method slot.
#[derive(Clone, Debug)]
pub struct MethodData {
  pub name: String,
  pub params: Vec<String>,
  pub revision: Revision,
  pub overrides: Option<u32>,
}

/// A signal slot.
#[derive(Clone, Debug)]
pub struct SignalData {
  pub name: String,
  pub params: Vec<(String, PropertyType)>,
  pub revision: Revision,
}

#[derive(Clone, Copy, Debug)]
enum NameEntry {
  Property(u32),
  Method(u32),
  Signal(u32),
}

/// Result of a name lookup across all member kinds.
#[derive(Clone, Copy, Debug)]
pub enum Member<'a> {
  Property(u32, &'a PropertyData),
  Method(u32, &'a MethodData),
  Signal(u32, &'a SignalData),
}

/// One level of a type's flattened, revision-gated member table.
#[derive(Debug)]
pub struct PropertyCache {
  parent: Option<Arc<PropertyCache>>,
  /// Depth of this level in the chain; the root ancestor is level zero.
  level: u32,
  property_offset: u32,
  method_offset: u32,
  signal_offset: u32,
  properties: Vec<PropertyData>,
  methods: Vec<MethodData>,
  signals: Vec<SignalData>,
  names: AHashMap<String, NameEntry>,
  /// Allowed revision per level, index 0..=level. A slot at level `l` is
  /// visible iff its added-in revision is at most `allowed_revisions[l]`.
  allowed_revisions: Vec<Revision>,
  default_property: Option<String>,
}

impl PropertyCache {
  pub fn level(&self) -> u32 {
    self.level
  }

  pub fn parent(&self) -> Option<&Arc<PropertyCache>> {
    self.parent.as_ref()
  }

  pub fn property_offset(&self) -> u32 {
    self.property_offset
  }

  pub fn method_offset(&self) -> u32 {
    self.method_offset
  }

  pub fn signal_offset(&self) -> u32 {
    self.signal_offset
  }

  pub fn property_count(&self) -> u32 {
    self.property_offset + self.properties.len() as u32
  }

  pub fn method_count(&self) -> u32 {
    self.method_offset + self.methods.len() as u32
  }

  pub fn signal_count(&self) -> u32 {
    self.signal_offset + self.signals.len() as u32
  }

  /// Whether a global property index was introduced at this level.
  #[inline]
  pub fn is_local_property(&self, global: u32) -> bool {
    global >= self.property_offset && global < self.property_count()
  }

  pub fn allowed_revision(&self, level: u32) -> Revision {
    self
      .allowed_revisions
      .get(level as usize)
      .copied()
      .unwrap_or(Revision::MAX)
  }

  /// Whether a slot added in `revision` at `level` is visible from this
  /// descriptor's configuration.
  pub fn is_visible_at_revision(&self, level: u32, revision: Revision) -> bool {
    revision <= self.allowed_revision(level)
  }

  /// Resolve a property by name: local table first, then the parent chain,
  /// stopping at the first revision-visible match. Revision gating uses this
  /// (leaf) descriptor's allowed-revision table for every level, so the same
  /// shared ancestor cache can sit under differently gated descendants.
  pub fn property(&self, name: &str) -> Option<(u32, &PropertyData)> {
    match self.member(name) {
      Some(Member::Property(index, data)) => Some((index, data)),
      _ => None,
    }
  }

  pub fn signal(&self, name: &str) -> Option<(u32, &SignalData)> {
    match self.member(name) {
      Some(Member::Signal(index, data)) => Some((index, data)),
      _ => None,
    }
  }

  pub fn method(&self, name: &str) -> Option<(u32, &MethodData)> {
    match self.member(name) {
      Some(Member::Method(index, data)) => Some((index, data)),
      _ => None,
    }
  }

  /// Resolve any member by name with revision gating.
  pub fn member(&self, name: &str) -> Option<Member<'_>> {
    let mut cache: Option<&PropertyCache> = Some(self);
    while let Some(c) = cache {
      if let Some(entry) = c.names.get(name) {
        let (member, revision) = match *entry {
          NameEntry::Property(local) => {
            let data = &c.properties[local as usize];
            (Member::Property(c.property_offset + local, data), data.revision)
          }
          NameEntry::Method(local) => {
            let data = &c.methods[local as usize];
            (Member::Method(c.method_offset + local, data), data.revision)
          }
          NameEntry::Signal(local) => {
            let data = &c.signals[local as usize];
            (Member::Signal(c.signal_offset + local, data), data.revision)
          }
        };
        if self.is_visible_at_revision(c.level, revision) {
          return Some(member);
        }
        // Revisioned out at this level; an ancestor may still provide the
        // name.
      }
      cache = c.parent.as_deref();
    }
    None
  }

  /// Slot access by global property index, walking the chain by offset.
  pub fn property_at(&self, global: u32) -> Option<&PropertyData> {
    let mut cache: Option<&PropertyCache> = Some(self);
    while let Some(c) = cache {
      if global >= c.property_offset {
        return c.properties.get((global - c.property_offset) as usize);
      }
      cache = c.parent.as_deref();
    }
    None
  }

  pub fn signal_at(&self, global: u32) -> Option<&SignalData> {
    let mut cache: Option<&PropertyCache> = Some(self);
    while let Some(c) = cache {
      if global >= c.signal_offset {
        return c.signals.get((global - c.signal_offset) as usize);
      }
      cache = c.parent.as_deref();
    }
    None
  }

  pub fn method_at(&self, global: u32) -> Option<&MethodData> {
    let mut cache: Option<&PropertyCache> = Some(self);
    while let Some(c) = cache {
      if global >= c.method_offset {
        return c.methods.get((global - c.method_offset) as usize);
      }
      cache = c.parent.as_deref();
    }
    None
  }

  /// The default property name, inherited from ancestors when this level
  /// does not set one.
  pub fn default_property_name(&self) -> Option<&str> {
    let mut cache: Option<&PropertyCache> = Some(self);
    while let Some(c) = cache {
      if let Some(name) = &c.default_property {
        return Some(name);
      }
      cache = c.parent.as_deref();
    }
    None
  }

  /// Iterate all property slots visible from this descriptor (every level),
  /// in global index order.
  pub fn all_properties(&self) -> Vec<(u32, &PropertyData)> {
    let mut levels = Vec::new();
    let mut cache: Option<&PropertyCache> = Some(self);
    while let Some(c) = cache {
      levels.push(c);
      cache = c.parent.as_deref();
    }
    let mut out = Vec::new();
    for c in levels.into_iter().rev() {
      for (local, data) in c.properties.iter().enumerate() {
        out.push((c.property_offset + local as u32, data));
      }
    }
    out
  }

  /// Iterate only the property slots introduced at this level.
  pub fn local_properties(&self) -> impl Iterator<Item = (u32, &PropertyData)> {
    self
      .properties
      .iter()
      .enumerate()
      .map(|(local, data)| (self.property_offset + local as u32, data))
  }

  fn find_ignoring_revision(&self, name: &str) -> Option<(u32, &PropertyData)> {
    let mut cache: Option<&PropertyCache> = Some(self);
    while let Some(c) = cache {
      if let Some(NameEntry::Property(local)) = c.names.get(name) {
        let data = &c.properties[*local as usize];
        return Some((c.property_offset + local, data));
      }
      cache = c.parent.as_deref();
    }
    None
  }

  fn signal_exists(&self, name: &str) -> bool {
    let mut cache: Option<&PropertyCache> = Some(self);
    while let Some(c) = cache {
      if let Some(NameEntry::Signal(_)) = c.names.get(name) {
        return true;
      }
      cache = c.parent.as_deref();
    }
    false
  }
}

/// Copy-on-append construction of a new descriptor level.
#[derive(Debug)]
pub struct CacheBuilder {
  parent: Option<Arc<PropertyCache>>,
  allowed_revision: Revision,
  properties: Vec<PropertyData>,
  methods: Vec<MethodData>,
  signals: Vec<SignalData>,
  names: AHashMap<String, NameEntry>,
  default_property: Option<String>,
}

impl CacheBuilder {
  /// Begin a new level on top of `parent`. `allowed_revision` is the
  /// revision ceiling recorded for this level in the resulting descriptor's
  /// gating table.
  pub fn new(parent: Option<Arc<PropertyCache>>, allowed_revision: Revision) -> Self {
    Self {
      parent,
      allowed_revision,
      properties: Vec::new(),
      methods: Vec::new(),
      signals: Vec::new(),
      names: AHashMap::new(),
      default_property: None,
    }
  }

  fn property_offset(&self) -> u32 {
    self.parent.as_ref().map_or(0, |p| p.property_count())
  }

  fn method_offset(&self) -> u32 {
    self.parent.as_ref().map_or(0, |p| p.method_count())
  }

  fn signal_offset(&self) -> u32 {
    self.parent.as_ref().map_or(0, |p| p.signal_count())
  }

  /// Append a property slot, returning its global index.
  ///
  /// If an ancestor slot of the same name is `final`, the shadow is ignored
  /// (the ancestor's index is returned) and a warning is logged; this is not
  /// an error by contract.
  pub fn append_property(
    &mut self,
    name: &str,
    ty: PropertyType,
    flags: PropertyFlags,
    revision: Revision,
    notify_signal: Option<u32>,
  ) -> u32 {
    let overrides = match self.parent.as_ref().and_then(|p| p.find_ignoring_revision(name)) {
      Some((index, data)) if data.flags.contains(PropertyFlags::FINAL) => {
        tracing::warn!(property = name, "ignoring shadow of final property");
        return index;
      }
      Some((index, _)) => Some(index),
      None => None,
    };

    let local = self.properties.len() as u32;
    self.properties.push(PropertyData {
      name: name.to_string(),
      ty,
      flags,
      revision,
      notify_signal,
      overrides,
    });
    self.names.insert(name.to_string(), NameEntry::Property(local));
    self.property_offset() + local
  }

  /// Append a signal slot, returning its global index.
  pub fn append_signal(
    &mut self,
    name: &str,
    params: Vec<(String, PropertyType)>,
    revision: Revision,
  ) -> u32 {
    let local = self.signals.len() as u32;
    self.signals.push(SignalData {
      name: name.to_string(),
      params,
      revision,
    });
    self.names.insert(name.to_string(), NameEntry::Signal(local));
    self.signal_offset() + local
  }

  /// Append a method slot, returning its global index.
  pub fn append_method(&mut self, name: &str, params: Vec<String>, revision: Revision) -> u32 {
    let overrides = self.parent.as_ref().and_then(|p| match p.member(name) {
      Some(Member::Method(index, _)) => Some(index),
      _ => None,
    });
    let local = self.methods.len() as u32;
    self.methods.push(MethodData {
      name: name.to_string(),
      params,
      revision,
      overrides,
    });
    self.names.insert(name.to_string(), NameEntry::Method(local));
    self.method_offset() + local
  }

  /// Whether a signal of this name already exists, locally or inherited.
  pub fn signal_exists(&self, name: &str) -> bool {
    if matches!(self.names.get(name), Some(NameEntry::Signal(_))) {
      return true;
    }
    self.parent.as_ref().is_some_and(|p| p.signal_exists(name))
  }

  pub fn set_default_property(&mut self, name: &str) {
    self.default_property = Some(name.to_string());
  }

  pub fn build(self) -> Arc<PropertyCache> {
    let property_offset = self.property_offset();
    let method_offset = self.method_offset();
    let signal_offset = self.signal_offset();
    let (level, mut allowed_revisions) = match &self.parent {
      Some(p) => (p.level + 1, p.allowed_revisions.clone()),
      None => (0, Vec::new()),
    };
    allowed_revisions.push(self.allowed_revision);

    Arc::new(PropertyCache {
      parent: self.parent,
      level,
      property_offset,
      method_offset,
      signal_offset,
      properties: self.properties,
      methods: self.methods,
      signals: self.signals,
      names: self.names,
      allowed_revisions,
      default_property: self.default_property,
    })
  }
}

pub(crate) fn declared_property_type(unit: &CompiledUnit, ty: DeclaredType) -> PropertyType {
  match ty {
    DeclaredType::Var => PropertyType::Var,
    DeclaredType::Bool => PropertyType::Bool,
    DeclaredType::Int => PropertyType::Int,
    DeclaredType::Real => PropertyType::Real,
    DeclaredType::String => PropertyType::String,
    DeclaredType::Url => PropertyType::Url,
    DeclaredType::Color => PropertyType::Color,
    DeclaredType::Point => PropertyType::Point,
    DeclaredType::Size => PropertyType::Size,
    DeclaredType::Rect => PropertyType::Rect,
    DeclaredType::Custom(name) => PropertyType::Object(Some(Arc::from(unit.str_at(name)))),
    DeclaredType::CustomList(name) => PropertyType::List(Box::new(PropertyType::Object(Some(
      Arc::from(unit.str_at(name)),
    )))),
  }
}

/// Build the extended descriptor for a compiled object that declares members
/// of its own, on top of its nominal type's cache.
///
/// Append order matches the original table layout: change-notify signals for
/// declared properties (normal, then var, then alias), declared signals
/// (rejecting duplicates of inherited or just-added signal names), declared
/// methods, then the properties themselves in the same three passes, with
/// alias slots appended last as forwarding placeholders.
pub(crate) fn build_object_cache(
  base: Arc<PropertyCache>,
  unit: &CompiledUnit,
  obj: &CompiledObject,
  errors: &mut Vec<Diagnostic>,
) -> Arc<PropertyCache> {
  let mut builder = CacheBuilder::new(Some(base), Revision::MAX);

  enum Pass {
    Normal,
    Var,
    Alias,
  }
  let decl_passes = [Pass::Normal, Pass::Var, Pass::Alias];

  // Change-notify signals, in the same pass order the properties will use so
  // that notify indices line up.
  let mut notify_signals: AHashMap<String, u32> = AHashMap::new();
  let mut seen_signals: AHashSet<String> = AHashSet::new();
  for pass in &decl_passes {
    match pass {
      Pass::Normal | Pass::Var => {
        for decl in &obj.properties {
          let is_var = matches!(decl.ty, DeclaredType::Var);
          if matches!(pass, Pass::Normal) == is_var {
            continue;
          }
          let name = unit.str_at(decl.name);
          let changed = format!("{name}Changed");
          let index = builder.append_signal(&changed, Vec::new(), Revision::ZERO);
          notify_signals.insert(name.to_string(), index);
          seen_signals.insert(changed);
        }
      }
      Pass::Alias => {
        for alias in &obj.aliases {
          let name = unit.str_at(alias.name);
          let changed = format!("{name}Changed");
          let index = builder.append_signal(&changed, Vec::new(), Revision::ZERO);
          notify_signals.insert(name.to_string(), index);
          seen_signals.insert(changed);
        }
      }
    }
  }

  // Declared signals.
  for signal in &obj.signals {
    let name = unit.str_at(signal.name);
    if seen_signals.contains(name) || builder.signal_exists(name) {
      errors.push(Diagnostic::error(
        codes::DUPLICATE_SIGNAL_NAME,
        format!("duplicate signal name \"{name}\""),
        unit.span(signal.loc),
      ));
      continue;
    }
    let params = signal
      .params
      .iter()
      .map(|(n, ty)| (unit.str_at(*n).to_string(), declared_property_type(unit, *ty)))
      .collect();
    builder.append_signal(name, params, Revision::ZERO);
    seen_signals.insert(name.to_string());
  }

  // Declared methods.
  for function in &obj.functions {
    let name = unit.str_at(function.name);
    let params = function
      .formals
      .iter()
      .map(|f| unit.str_at(*f).to_string())
      .collect();
    builder.append_method(name, params, Revision::ZERO);
  }

  // Declared properties, same three passes as their notify signals.
  for pass in &decl_passes {
    match pass {
      Pass::Normal | Pass::Var => {
        for decl in &obj.properties {
          let is_var = matches!(decl.ty, DeclaredType::Var);
          if matches!(pass, Pass::Normal) == is_var {
            continue;
          }
          let name = unit.str_at(decl.name);
          let mut flags = PropertyFlags::empty();
          if decl.required {
            flags |= PropertyFlags::REQUIRED;
          }
          if decl.read_only {
            flags |= PropertyFlags::READ_ONLY;
          }
          if is_var {
            flags |= PropertyFlags::VAR;
          }
          builder.append_property(
            name,
            declared_property_type(unit, decl.ty),
            flags,
            Revision::ZERO,
            notify_signals.get(name).copied(),
          );
        }
      }
      Pass::Alias => {
        for alias in &obj.aliases {
          let name = unit.str_at(alias.name);
          builder.append_property(
            name,
            PropertyType::Var,
            PropertyFlags::ALIAS,
            Revision::ZERO,
            notify_signals.get(name).copied(),
          );
        }
      }
    }
  }

  if let Some(default_index) = obj.default_property {
    if let Some(decl) = obj.properties.get(default_index as usize) {
      builder.set_default_property(unit.str_at(decl.name));
    }
  }

  builder.build()
}
