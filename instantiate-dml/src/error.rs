/// Failures of store-level property access.
///
/// These are hard API-contract violations, not user-document problems:
/// user-visible structural and property errors accumulate as
/// [`diagnostics::Diagnostic`] batches on the active creator/incubator and
/// never unwind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
  /// An object handle was used after the underlying instance was freed (or
  /// the handle is otherwise malformed).
  #[error("stale object handle")]
  StaleHandle,

  /// The slot is an alias whose target has not been resolved.
  #[error("unresolved alias")]
  UnresolvedAlias,

  /// The slot aliases a whole object and cannot be written.
  #[error("cannot write through an object alias")]
  ObjectAlias,

  /// The slot index is out of range for the instance's descriptor.
  #[error("no such property slot")]
  NoSuchSlot,
}

/// Stable diagnostic codes for every error the engine reports.
///
/// Grouped by taxonomy: structural errors abort the current object's
/// construction, property errors abort a single binding, resource errors
/// abort the incubation.
pub mod codes {
  // Structural.
  pub const UNRESOLVED_TYPE: &str = "INST0001";
  pub const NOT_CONSTRUCTIBLE: &str = "INST0002";
  pub const BOUND_COMPONENT_OUTSIDE_CONTEXT: &str = "INST0003";
  pub const UNRESOLVED_ALIAS_TARGET: &str = "INST0004";
  pub const DUPLICATE_SIGNAL_NAME: &str = "INST0005";
  pub const ATTACHED_REQUIRED_PROPERTIES: &str = "INST0006";
  pub const CREATION_DEPTH_EXCEEDED: &str = "INST0007";

  // Property.
  pub const NO_SUCH_PROPERTY: &str = "INST0010";
  pub const INVALID_ASSIGNMENT: &str = "INST0011";
  pub const READ_ONLY_PROPERTY: &str = "INST0012";
  pub const INVALID_GROUP_TARGET: &str = "INST0013";
  pub const UNRESOLVED_ATTACHED_OBJECT: &str = "INST0014";
  pub const NO_SUCH_SIGNAL: &str = "INST0015";
  pub const NOT_A_VALUE_SOURCE: &str = "INST0016";
  pub const BINDING_ERROR: &str = "INST0017";
  pub const INITIAL_PROPERTY: &str = "INST0018";

  // Completion boundary.
  pub const REQUIRED_NOT_SET: &str = "INST0020";

  // Resource / API misuse.
  pub const STACK_BUDGET: &str = "INST0030";
  pub const CREATION_PENDING: &str = "INST0031";
}
