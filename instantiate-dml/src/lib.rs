//! Object instantiation and incremental binding engine for compiled DML
//! documents.
//!
//! This crate turns precompiled object/property/binding tables into live,
//! interconnected instance graphs. It provides:
//! - Revision-gated, copy-on-append property descriptor caches
//!   ([`PropertyCache`])
//! - A generation-checked object store ([`ObjectStore`], [`ObjectId`])
//! - The resumable object graph creator with two-phase construction,
//!   deferred-binding activation, and required-property enforcement
//! - Incubators and an incubation controller for time-sliced construction
//!   ([`IncubationMode`], [`IncubatorStatus`])
//! - The component handle's two-phase create API ([`Component`])
//!
//! # External collaborators
//!
//! The engine consumes three things it does not implement: compiled-unit
//! tables ([`CompiledUnit`], typically adapted from an external compiler's
//! output via [`UnitBuilder`]), a type registry mapping `(name, version)` to
//! constructible descriptors ([`TypeRegistry`]), and an expression-
//! evaluation service ([`ExpressionEvaluator`]) producing live bindings.
//! Expressions are never executed here; the engine only installs bindings,
//! evaluates each exactly once during finalize to force dependency capture,
//! and prunes the ones that turn out to be constant.
//!
//! # Concurrency model
//!
//! Single-logical-thread cooperative scheduling: "asynchronous" means
//! time-sliced. Suspension points are between whole objects during creation
//! and between items of each finalize drain; one object's property
//! application always runs to completion, so an object is never observed
//! half-bound.

mod binding;
mod compiled;
mod component;
mod context;
mod convert;
mod creator;
mod error;
mod handle;
mod incubator;
mod interrupt;
mod propcache;
mod registry;
mod required;
mod runtime;
mod store;
mod value;

pub use crate::binding::BindingTarget;
pub use crate::binding::BoundSignal;
pub use crate::binding::DeferredBlock;
pub use crate::binding::ExpressionEvaluator;
pub use crate::binding::LiveBinding;
pub use crate::compiled::AliasDecl;
pub use crate::compiled::BindingFlags;
pub use crate::compiled::CompiledBinding;
pub use crate::compiled::CompiledObject;
pub use crate::compiled::CompiledUnit;
pub use crate::compiled::CompiledValue;
pub use crate::compiled::ConstValue;
pub use crate::compiled::DeclaredType;
pub use crate::compiled::ExprIndex;
pub use crate::compiled::FunctionDecl;
pub use crate::compiled::Loc;
pub use crate::compiled::ObjectBuilder;
pub use crate::compiled::ObjectFlags;
pub use crate::compiled::ObjectIndex;
pub use crate::compiled::PropertyDecl;
pub use crate::compiled::Revision;
pub use crate::compiled::SignalDecl;
pub use crate::compiled::StrIndex;
pub use crate::compiled::UnitBuilder;
pub use crate::component::Component;
pub use crate::component::MAX_CREATION_DEPTH;
pub use crate::context::ContextData;
pub use crate::context::ContextStore;
pub use crate::convert::convert;
pub use crate::creator::CreatorPhase;
pub use crate::error::codes;
pub use crate::error::StoreError;
pub use crate::handle::ContextId;
pub use crate::handle::IncubatorId;
pub use crate::handle::ObjectId;
pub use crate::incubator::IncubationController;
pub use crate::incubator::IncubationMode;
pub use crate::incubator::IncubatorStatus;
pub use crate::interrupt::Interrupt;
pub use crate::interrupt::InterruptHandle;
pub use crate::interrupt::InterruptToken;
pub use crate::propcache::CacheBuilder;
pub use crate::propcache::Member;
pub use crate::propcache::MethodData;
pub use crate::propcache::PropertyCache;
pub use crate::propcache::PropertyData;
pub use crate::propcache::PropertyFlags;
pub use crate::propcache::SignalData;
pub use crate::registry::Capabilities;
pub use crate::registry::LifecycleHook;
pub use crate::registry::NativeClass;
pub use crate::registry::NativeClassId;
pub use crate::registry::NativeMethod;
pub use crate::registry::NativeProperty;
pub use crate::registry::NativeSignal;
pub use crate::registry::ResolvedType;
pub use crate::registry::TypeRegistry;
pub use crate::required::AliasCandidate;
pub use crate::required::RequiredPropertiesTracker;
pub use crate::required::RequiredPropertyInfo;
pub use crate::runtime::Runtime;
pub use crate::store::AliasResolution;
pub use crate::store::Instance;
pub use crate::store::ObjectStore;
pub use crate::value::Color;
pub use crate::value::ComponentRef;
pub use crate::value::EnumEncoding;
pub use crate::value::Point;
pub use crate::value::PropertyType;
pub use crate::value::Rect;
pub use crate::value::Size;
pub use crate::value::Value;
