//! Mapping between provider session identity and local sessions.

pub mod registry;

pub use registry::{DEFAULT_REGISTRY_TTL, RegistryEntry, SessionRegistry};
