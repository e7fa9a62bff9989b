//! Required-property tracking.
//!
//! During a construction pass, every property marked `required` that has not
//! yet received a value is recorded here, keyed by the object's identity and
//! the property's *canonical* slot — satisfaction through an alias resolves
//! to the alias target first, so writing through an alias clears the same
//! entry a direct write would. Entries surviving to the completion boundary
//! are reported as one error per entry, carrying the alias names that could
//! also have satisfied it.

use crate::error::codes;
use crate::handle::ObjectId;
use ahash::AHashMap;
use diagnostics::Diagnostic;
use diagnostics::Span;

/// An alias that could satisfy a required property, kept for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AliasCandidate {
  pub name: String,
  pub span: Span,
}

/// Bookkeeping for one unset required property.
#[derive(Clone, Debug)]
pub struct RequiredPropertyInfo {
  pub property_name: String,
  pub span: Span,
  pub aliases: Vec<AliasCandidate>,
}

/// The set of required-but-unset properties of the current pass.
#[derive(Debug, Default)]
pub struct RequiredPropertiesTracker {
  entries: AHashMap<(ObjectId, u32), RequiredPropertyInfo>,
  /// Insertion order, for deterministic reporting.
  order: Vec<(ObjectId, u32)>,
}

impl RequiredPropertiesTracker {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn mark_required(&mut self, object: ObjectId, property: u32, info: RequiredPropertyInfo) {
    let key = (object, property);
    if self.entries.insert(key, info).is_none() {
      self.order.push(key);
    }
  }

  /// Record that the property received a value. Returns whether an entry was
  /// cleared. Must be called with the canonical (alias-resolved) slot.
  pub fn satisfy(&mut self, object: ObjectId, property: u32) -> bool {
    self.entries.remove(&(object, property)).is_some()
  }

  /// Record an alias name that could satisfy the entry, if it is still
  /// outstanding.
  pub fn add_alias_candidate(&mut self, object: ObjectId, property: u32, candidate: AliasCandidate) {
    if let Some(info) = self.entries.get_mut(&(object, property)) {
      if !info.aliases.contains(&candidate) {
        info.aliases.push(candidate);
      }
    }
  }

  pub fn contains(&self, object: ObjectId, property: u32) -> bool {
    self.entries.contains_key(&(object, property))
  }

  /// The aliases recorded as possible satisfaction routes for an entry.
  pub fn aliases_of(&self, object: ObjectId, property: u32) -> &[AliasCandidate] {
    self
      .entries
      .get(&(object, property))
      .map_or(&[], |info| info.aliases.as_slice())
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  /// Drain every remaining entry into one diagnostic each, in the order the
  /// entries were recorded.
  pub fn drain_into_errors(&mut self) -> Vec<Diagnostic> {
    let mut errors = Vec::with_capacity(self.entries.len());
    for key in self.order.drain(..) {
      let Some(info) = self.entries.remove(&key) else {
        continue;
      };
      let mut diagnostic = Diagnostic::error(
        codes::REQUIRED_NOT_SET,
        format!(
          "required property \"{}\" was not set",
          info.property_name
        ),
        info.span,
      );
      for alias in &info.aliases {
        diagnostic = diagnostic.with_note(format!(
          "it can also be set through alias \"{}\"",
          alias.name
        ));
      }
      errors.push(diagnostic);
    }
    errors
  }
}
