//! Type-registration lookup.
//!
//! The registry is an explicit dependency handed to the runtime at
//! construction time — never process-global state — so the engine stays
//! testable in isolation. It resolves a `(type name, requested version)` pair
//! to either a constructible native descriptor or a composite compiled unit,
//! building the native descriptor chain lazily once per distinct
//! `(class, version)` configuration and sharing it from then on.

use crate::compiled::CompiledUnit;
use crate::compiled::Revision;
use crate::handle::ObjectId;
use crate::propcache::CacheBuilder;
use crate::propcache::PropertyCache;
use crate::propcache::PropertyFlags;
use crate::store::ObjectStore;
use crate::value::PropertyType;
use ahash::AHashMap;
use std::sync::Arc;

/// A lifecycle hook installed on a native class.
pub type LifecycleHook = fn(&mut ObjectStore, ObjectId);

/// Capability set of a native class, expressed as tagged optional slots
/// rather than inheritance: a type "has" a capability if the slot is set.
#[derive(Clone, Copy, Default)]
pub struct Capabilities {
  /// Invoked after instantiation, before any binding is installed.
  pub construction_begin: Option<LifecycleHook>,
  /// Invoked during finalize, in creation order, after all bindings ran.
  pub construction_complete: Option<LifecycleHook>,
  /// Invoked during the finalize-hook drain.
  pub finalize: Option<LifecycleHook>,
  /// Invoked during the completed-notification drain.
  pub completed: Option<LifecycleHook>,
  /// Accepts `on`-assignment as a value source.
  pub is_value_source: bool,
  /// Accepts `on`-assignment as a value interceptor.
  pub is_value_interceptor: bool,
}

impl std::fmt::Debug for Capabilities {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Capabilities")
      .field("construction_begin", &self.construction_begin.is_some())
      .field("construction_complete", &self.construction_complete.is_some())
      .field("finalize", &self.finalize.is_some())
      .field("completed", &self.completed.is_some())
      .field("is_value_source", &self.is_value_source)
      .field("is_value_interceptor", &self.is_value_interceptor)
      .finish()
  }
}

/// A property declared by a native class level.
#[derive(Clone, Debug)]
pub struct NativeProperty {
  pub name: String,
  pub ty: PropertyType,
  pub flags: PropertyFlags,
  /// Revision this property was added in.
  pub revision: Revision,
  /// Whether a `<name>Changed` notify signal accompanies the property.
  pub notify: bool,
}

impl NativeProperty {
  pub fn new(name: &str, ty: PropertyType) -> Self {
    Self {
      name: name.to_string(),
      ty,
      flags: PropertyFlags::empty(),
      revision: Revision::ZERO,
      notify: true,
    }
  }

  pub fn with_flags(mut self, flags: PropertyFlags) -> Self {
    self.flags |= flags;
    self
  }

  pub fn added_in(mut self, revision: Revision) -> Self {
    self.revision = revision;
    self
  }
}

#[derive(Clone, Debug)]
pub struct NativeSignal {
  pub name: String,
  pub params: Vec<(String, PropertyType)>,
  pub revision: Revision,
}

#[derive(Clone, Debug)]
pub struct NativeMethod {
  pub name: String,
  pub params: Vec<String>,
  pub revision: Revision,
}

/// One registered native class level.
#[derive(Clone, Debug)]
pub struct NativeClass {
  pub name: String,
  /// Ancestor class name; lookup of unresolved names continues there.
  pub parent: Option<String>,
  /// Whether documents may instantiate this class directly.
  pub constructible: bool,
  pub properties: Vec<NativeProperty>,
  pub signals: Vec<NativeSignal>,
  pub methods: Vec<NativeMethod>,
  pub default_property: Option<String>,
  /// Class providing this type's attachment object, if any.
  pub attached_type: Option<String>,
  /// Maps a leaf's requested version to the allowed revision ceiling at this
  /// class's level. Unlisted versions use the requested version itself,
  /// giving each ancestor level an independent minor-version ceiling.
  pub version_map: Vec<(Revision, Revision)>,
  pub capabilities: Capabilities,
}

impl NativeClass {
  pub fn new(name: &str) -> Self {
    Self {
      name: name.to_string(),
      parent: None,
      constructible: true,
      properties: Vec::new(),
      signals: Vec::new(),
      methods: Vec::new(),
      default_property: None,
      attached_type: None,
      version_map: Vec::new(),
      capabilities: Capabilities::default(),
    }
  }

  pub fn inherits(mut self, parent: &str) -> Self {
    self.parent = Some(parent.to_string());
    self
  }

  pub fn non_constructible(mut self) -> Self {
    self.constructible = false;
    self
  }

  pub fn property(mut self, property: NativeProperty) -> Self {
    self.properties.push(property);
    self
  }

  pub fn signal(mut self, name: &str, params: &[(&str, PropertyType)]) -> Self {
    self.signals.push(NativeSignal {
      name: name.to_string(),
      params: params
        .iter()
        .map(|(n, ty)| (n.to_string(), ty.clone()))
        .collect(),
      revision: Revision::ZERO,
    });
    self
  }

  pub fn method(mut self, name: &str, params: &[&str]) -> Self {
    self.methods.push(NativeMethod {
      name: name.to_string(),
      params: params.iter().map(|p| p.to_string()).collect(),
      revision: Revision::ZERO,
    });
    self
  }

  pub fn with_default_property(mut self, name: &str) -> Self {
    self.default_property = Some(name.to_string());
    self
  }

  pub fn with_attached_type(mut self, class: &str) -> Self {
    self.attached_type = Some(class.to_string());
    self
  }

  pub fn with_version_map(mut self, map: &[(Revision, Revision)]) -> Self {
    self.version_map = map.to_vec();
    self
  }

  pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
    self.capabilities = capabilities;
    self
  }

  fn ceiling_for(&self, requested: Revision) -> Revision {
    self
      .version_map
      .iter()
      .find_map(|(req, ceiling)| (*req == requested).then_some(*ceiling))
      .unwrap_or(requested)
  }
}

/// Identifier of a registered native class.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct NativeClassId(u32);

/// The result of resolving a type name at a version.
#[derive(Clone, Debug)]
pub enum ResolvedType {
  Native {
    class: NativeClassId,
    cache: Arc<PropertyCache>,
    constructible: bool,
  },
  Composite {
    unit: Arc<CompiledUnit>,
  },
}

/// Registry of native classes and composite units.
#[derive(Default)]
pub struct TypeRegistry {
  classes: Vec<NativeClass>,
  by_name: AHashMap<String, NativeClassId>,
  composites: AHashMap<String, Arc<CompiledUnit>>,
  /// Lazily built descriptor chain per distinct (class, version)
  /// configuration.
  cache_configs: AHashMap<(NativeClassId, Revision), Arc<PropertyCache>>,
}

impl TypeRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a native class. Panics on duplicate names; registration is a
  /// host setup step, not a runtime operation.
  pub fn register(&mut self, class: NativeClass) -> NativeClassId {
    assert!(
      !self.by_name.contains_key(&class.name) && !self.composites.contains_key(&class.name),
      "duplicate type registration: {}",
      class.name
    );
    let id = NativeClassId(self.classes.len() as u32);
    self.by_name.insert(class.name.clone(), id);
    self.classes.push(class);
    id
  }

  /// Register a composite type backed by another compiled unit.
  pub fn register_composite(&mut self, name: &str, unit: Arc<CompiledUnit>) {
    assert!(
      !self.by_name.contains_key(name) && !self.composites.contains_key(name),
      "duplicate type registration: {name}"
    );
    self.composites.insert(name.to_string(), unit);
  }

  pub fn class(&self, id: NativeClassId) -> &NativeClass {
    &self.classes[id.0 as usize]
  }

  pub fn class_id(&self, name: &str) -> Option<NativeClassId> {
    self.by_name.get(name).copied()
  }

  /// Whether `class` is or inherits from the class named `ancestor`.
  pub fn class_derives(&self, class: NativeClassId, ancestor: &str) -> bool {
    let mut current = Some(class);
    while let Some(id) = current {
      let c = self.class(id);
      if c.name == ancestor {
        return true;
      }
      current = c.parent.as_deref().and_then(|p| self.class_id(p));
    }
    false
  }

  /// Resolve a type name at a requested version.
  pub fn resolve(&mut self, name: &str, version: Revision) -> Option<ResolvedType> {
    if let Some(unit) = self.composites.get(name) {
      return Some(ResolvedType::Composite { unit: unit.clone() });
    }
    let id = self.class_id(name)?;
    let cache = self.native_cache(id, version);
    Some(ResolvedType::Native {
      class: id,
      cache,
      constructible: self.class(id).constructible,
    })
  }

  /// The shared descriptor chain for a native class at a version, built on
  /// first use of that configuration.
  pub fn native_cache(&mut self, id: NativeClassId, version: Revision) -> Arc<PropertyCache> {
    if let Some(cache) = self.cache_configs.get(&(id, version)) {
      return cache.clone();
    }

    let parent_id = match self.class(id).parent.as_deref() {
      Some(parent) => self.class_id(parent),
      None => None,
    };
    let parent_cache = parent_id.map(|pid| self.native_cache(pid, version));

    let class = &self.classes[id.0 as usize];
    let mut builder = CacheBuilder::new(parent_cache, class.ceiling_for(version));

    // Notify signals first so their global indices are known to the
    // properties referencing them.
    let mut notify: AHashMap<&str, u32> = AHashMap::new();
    for property in &class.properties {
      if property.notify {
        let index = builder.append_signal(
          &format!("{}Changed", property.name),
          Vec::new(),
          property.revision,
        );
        notify.insert(property.name.as_str(), index);
      }
    }
    for signal in &class.signals {
      builder.append_signal(&signal.name, signal.params.clone(), signal.revision);
    }
    for method in &class.methods {
      builder.append_method(&method.name, method.params.clone(), method.revision);
    }
    for property in &class.properties {
      builder.append_property(
        &property.name,
        property.ty.clone(),
        property.flags,
        property.revision,
        notify.get(property.name.as_str()).copied(),
      );
    }
    if let Some(default) = &class.default_property {
      builder.set_default_property(default);
    }

    let cache = builder.build();
    self.cache_configs.insert((id, version), cache.clone());
    cache
  }

  /// Reference count of the memoized descriptor for a configuration, if it
  /// was ever built. Exposed so hosts can assert cache lifetime invariants.
  pub fn cache_refcount(&self, id: NativeClassId, version: Revision) -> Option<usize> {
    self
      .cache_configs
      .get(&(id, version))
      .map(Arc::strong_count)
  }
}

impl std::fmt::Debug for TypeRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TypeRegistry")
      .field("classes", &self.classes.len())
      .field("composites", &self.composites.len())
      .field("cache_configs", &self.cache_configs.len())
      .finish()
  }
}
