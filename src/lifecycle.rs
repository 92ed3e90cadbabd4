//! Module lifecycle manager.
//!
//! Decides which modules to load, soft-unload or hard-unload when the page
//! hash changes or the options change, and runs those transitions. Unloading
//! walks a fallback ladder: soft unload, then hard unload, then (only for
//! options-triggered disables) a full page reload.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::modules::{ModuleContext, ModuleDescriptor, ModuleGuid, ModuleRegistry, ModuleRuntime};
use crate::options::{diff, ModuleOptions, OptionsChange, OptionsTree};
use crate::page::Page;
use crate::router::{hash_from_url, HashRouter, DEFAULT_HASH};

/// One step taken by the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Loaded(ModuleGuid),
    /// Load requested for a module that was already loaded; nothing ran.
    AlreadyLoaded(ModuleGuid),
    LoadFailed(ModuleGuid),
    SoftUnloaded(ModuleGuid),
    HardUnloaded(ModuleGuid),
    /// Soft and hard unload both failed; the module is left as it is.
    UnloadFailed(ModuleGuid),
    /// Hard unload failed while disabling; the page was reloaded.
    PageReloaded(ModuleGuid),
}

enum Teardown {
    NotLoaded,
    Done,
    Failed,
}

/// Owns the registry and the options snapshot for the lifetime of a page.
pub struct LifecycleManager {
    registry: ModuleRegistry,
    options: OptionsTree,
    remote_disabled: BTreeSet<ModuleGuid>,
    page: Arc<dyn Page>,
}

impl LifecycleManager {
    pub fn new(registry: ModuleRegistry, options: OptionsTree, page: Arc<dyn Page>) -> Self {
        Self {
            registry,
            options,
            remote_disabled: BTreeSet::new(),
            page,
        }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn options(&self) -> &OptionsTree {
        &self.options
    }

    pub fn remote_disabled(&self) -> &BTreeSet<ModuleGuid> {
        &self.remote_disabled
    }

    pub fn is_loaded(&self, guid: &str) -> bool {
        self.registry.is_loaded(guid)
    }

    /// Replace the set of remotely disabled modules.
    ///
    /// Takes effect at the next routing decision; loaded modules stay loaded.
    pub fn set_remote_disabled(&mut self, guids: impl IntoIterator<Item = ModuleGuid>) {
        self.remote_disabled = guids.into_iter().collect();
        debug!(count = self.remote_disabled.len(), "Updated remotely disabled modules");
    }

    pub fn router(&self) -> HashRouter<'_> {
        HashRouter::new(&self.registry, &self.options, &self.remote_disabled)
    }

    pub fn modules_for_hash(&self, hash: &str) -> BTreeSet<ModuleGuid> {
        self.router().modules_for_hash(hash)
    }

    /// Hash of the page right now, `"#"` if its URL cannot be parsed.
    pub fn current_hash(&self) -> String {
        let url = self.page.url();
        hash_from_url(&url).unwrap_or_else(|e| {
            warn!(error = %e, "Could not read the page hash");
            DEFAULT_HASH.to_string()
        })
    }

    /// Load every module active for `hash`. Failures are logged per module.
    ///
    /// Modules that are already loaded are refreshed instead.
    pub fn load_modules(&mut self, hash: &str) -> Vec<Transition> {
        let mut out = Vec::new();
        for guid in self.modules_for_hash(hash) {
            if self.registry.is_loaded(&guid) {
                self.refresh_module(&guid, hash);
            }
            self.load_module(&guid, hash, &mut out);
        }
        out
    }

    /// Unload modules active for `old_hash` but not for `new_hash`.
    ///
    /// A failed hard unload is logged and the module left as it is.
    pub fn unload_modules(&mut self, old_hash: &str, new_hash: &str) -> Vec<Transition> {
        let old_modules = self.modules_for_hash(old_hash);
        let new_modules = self.modules_for_hash(new_hash);
        let mut out = Vec::new();

        for guid in old_modules.difference(&new_modules) {
            match self.soft_unload(guid) {
                Teardown::NotLoaded => continue,
                Teardown::Done => {
                    out.push(Transition::SoftUnloaded(guid.clone()));
                    continue;
                }
                // Module changed page-wide state
                Teardown::Failed => {}
            }

            match self.hard_unload(guid) {
                Teardown::Failed => {
                    warn!(module = %self.display_name(guid), "Failed to hard unload module");
                    out.push(Transition::UnloadFailed(guid.clone()));
                }
                _ => out.push(Transition::HardUnloaded(guid.clone())),
            }
        }

        out
    }

    /// React to an options change.
    ///
    /// The new tree becomes the manager's snapshot. Each module in the diff is
    /// inspected once: an `enabled` change loads or disables it, any other
    /// change reloads it if it is loaded. Processing stops once the page has
    /// been reloaded.
    pub fn apply_new_options(&mut self, change: &OptionsChange) -> Vec<Transition> {
        self.options = change.new_value.clone();

        let hash = self.current_hash();
        let active = self.modules_for_hash(&hash);
        let mut out = Vec::new();

        for (guid, module_diff) in diff(&change.old_value, &change.new_value) {
            if !self.registry.contains(&guid) {
                debug!(module = %guid, "Ignoring options of unregistered module");
                continue;
            }

            if module_diff.touches_enabled() {
                if module_diff.newly_enabled() {
                    if active.contains(&guid) {
                        self.load_module(&guid, &hash, &mut out);
                    }
                } else if !self.hard_unload_or_reload(&guid, &mut out) {
                    return out;
                }
            } else if self.registry.is_loaded(&guid) {
                if !self.hard_unload_or_reload(&guid, &mut out) {
                    return out;
                }
                self.load_module(&guid, &hash, &mut out);
            }
        }

        out
    }

    /// Hard unload, reloading the page on failure. Returns false when the page
    /// was reloaded.
    fn hard_unload_or_reload(&mut self, guid: &str, out: &mut Vec<Transition>) -> bool {
        match self.hard_unload(guid) {
            Teardown::NotLoaded => true,
            Teardown::Done => {
                out.push(Transition::HardUnloaded(guid.to_string()));
                true
            }
            Teardown::Failed => {
                warn!(module = %self.display_name(guid), "Failed to hard unload module, reloading page");
                self.page.reload();
                out.push(Transition::PageReloaded(guid.to_string()));
                false
            }
        }
    }

    fn load_module(&mut self, guid: &str, hash: &str, out: &mut Vec<Transition>) {
        let Some(module) = self.registry.get_mut(guid) else {
            return;
        };

        if module.runtime().is_loaded() {
            debug!(module = %module.descriptor.name, "Module already loaded");
            out.push(Transition::AlreadyLoaded(guid.to_string()));
            return;
        }

        let name = module.descriptor.name.clone();
        let options = merged_options(&module.descriptor, &self.options);

        let ctx = ModuleContext {
            guid,
            name: &name,
            options: &options,
            hash,
        };

        match module.runtime_mut().load(&ctx) {
            Ok(()) => {
                info!(module = %name, hash, "Loaded module");
                out.push(Transition::Loaded(guid.to_string()));
            }
            Err(e) => {
                warn!(module = %name, error = %e, "Failed to load module");
                out.push(Transition::LoadFailed(guid.to_string()));
            }
        }
    }

    fn refresh_module(&mut self, guid: &str, hash: &str) {
        let Some(module) = self.registry.get_mut(guid) else {
            return;
        };

        let name = module.descriptor.name.clone();
        let options = merged_options(&module.descriptor, &self.options);
        let ctx = ModuleContext {
            guid,
            name: &name,
            options: &options,
            hash,
        };

        if let Err(e) = module.runtime_mut().refresh(&ctx) {
            warn!(module = %name, error = %e, "Failed to refresh module");
        }
    }

    fn soft_unload(&mut self, guid: &str) -> Teardown {
        self.teardown(guid, |runtime| runtime.soft_unload())
    }

    fn hard_unload(&mut self, guid: &str) -> Teardown {
        self.teardown(guid, |runtime| runtime.hard_unload())
    }

    fn teardown(
        &mut self,
        guid: &str,
        unload: impl FnOnce(&mut dyn ModuleRuntime) -> bool,
    ) -> Teardown {
        let Some(module) = self.registry.get_mut(guid) else {
            return Teardown::NotLoaded;
        };

        if !module.runtime().is_loaded() {
            debug!(module = %module.descriptor.name, "Module not loaded, nothing to unload");
            return Teardown::NotLoaded;
        }

        if unload(module.runtime_mut()) {
            info!(module = %module.descriptor.name, "Unloaded module");
            Teardown::Done
        } else {
            Teardown::Failed
        }
    }

    fn display_name(&self, guid: &str) -> String {
        self.registry
            .get(guid)
            .map(|d| d.name.clone())
            .unwrap_or_else(|| guid.to_string())
    }
}

/// Descriptor defaults overlaid with the module's current options.
fn merged_options(descriptor: &ModuleDescriptor, tree: &OptionsTree) -> ModuleOptions {
    let mut options = descriptor.default_options();
    if let Some(current) = tree.module(&descriptor.guid) {
        options.extend(current.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    options
}
