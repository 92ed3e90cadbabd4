//! pageplus - feature modules for a school web portal.
//!
//! Modules are small features that attach to pages of the portal. Which
//! modules run depends on the page's URL hash and on per-module options the
//! user can change at any time. The controller loads and unloads modules as
//! the hash or the options change.
//!
//! # Architecture
//!
//! The library is organized into these main modules:
//!
//! - [`modules`] - Module descriptors, the runtime trait and the registry
//! - [`options`] - The options tree, its diff and storage backends
//! - [`router`] - Which modules are active for a hash
//! - [`lifecycle`] - Loading and unloading with the soft/hard/reload ladder
//! - [`dispatch`] - The task that serializes navigation and options events
//! - [`startup`] - [`run_extension`] and the running [`Extension`] handle
//! - [`notifications`] - The Message Notifications module
//! - [`remote_disable`] - Remotely switching modules off
//! - [`config`] - Configuration loading and management
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use pageplus::{run_extension, Config, HeadlessPage, Startup};
//!
//! let config = Config::load();
//! let page = Arc::new(HeadlessPage::new("https://gannacademy.myschoolapp.com/app/student#"));
//! let (startup, _notifications) = Startup::from_config(&config, page.clone(), page.clone())?;
//!
//! if let Some(extension) = run_extension(startup)? {
//!     extension.hash_changed(old_url, new_url)?;
//! }
//! ```

// Public modules
pub mod config;
pub mod dispatch;
pub mod lifecycle;
pub mod logging;
pub mod modules;
pub mod notifications;
pub mod options;
pub mod page;
pub mod remote_disable;
pub mod router;
pub mod startup;

// Internal modules
mod error;

// Re-export commonly used types for convenience
pub use config::Config;
pub use error::{PagePlusError, PagePlusResult};
pub use lifecycle::{LifecycleManager, Transition};
pub use modules::{ModuleDescriptor, ModuleGuid, ModuleRegistry, ModuleRuntime};
pub use options::{JsonOptionsStore, MemoryOptionsStore, OptionsStore, OptionsTree};
pub use page::{BookmarkletGuard, HeadlessPage, Page};
pub use startup::{run_extension, Extension, Startup};
