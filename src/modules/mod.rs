//! Feature modules and the table they are registered in.
//!
//! # Architecture
//!
//! ```text
//! ModuleRegistry
//! └── modules: BTreeMap<ModuleGuid, RegisteredModule>
//!     ├── descriptor: ModuleDescriptor (name, hash patterns, option schema)
//!     └── runtime: Box<dyn ModuleRuntime> (load / soft unload / hard unload)
//! ```
//!
//! Descriptors are static data; runtimes carry whatever state a module keeps
//! while it is loaded. The lifecycle manager owns the registry and only ever
//! addresses modules by GUID.

mod error;
mod manifest;
mod registry;
mod runtime;
#[cfg(test)]
pub(crate) mod testing;

pub use error::{ModuleError, ModuleResult};
pub use manifest::{HashPattern, ModuleDescriptor, OptionKind, OptionSchema, Validator};
pub use registry::{ModuleRegistry, RegisteredModule};
pub use runtime::{ModuleContext, ModuleRuntime};

/// Stable unique identifier for a module.
pub type ModuleGuid = String;
