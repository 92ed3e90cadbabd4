//! The explicit table of modules known to a controller.

use std::collections::BTreeMap;

use super::manifest::ModuleDescriptor;
use super::runtime::ModuleRuntime;
use super::ModuleGuid;
use crate::error::{PagePlusError, PagePlusResult};
use crate::options::OptionsTree;

/// A descriptor together with the runtime that implements it.
pub struct RegisteredModule {
    pub descriptor: ModuleDescriptor,
    runtime: Box<dyn ModuleRuntime>,
}

impl RegisteredModule {
    pub fn runtime(&self) -> &dyn ModuleRuntime {
        self.runtime.as_ref()
    }

    pub fn runtime_mut(&mut self) -> &mut dyn ModuleRuntime {
        self.runtime.as_mut()
    }
}

impl std::fmt::Debug for RegisteredModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredModule")
            .field("descriptor", &self.descriptor)
            .field("loaded", &self.runtime.is_loaded())
            .finish()
    }
}

/// Modules by GUID, registered once at startup.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<ModuleGuid, RegisteredModule>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module. The descriptor is validated and GUIDs must be unique.
    pub fn register(
        &mut self,
        descriptor: ModuleDescriptor,
        runtime: Box<dyn ModuleRuntime>,
    ) -> PagePlusResult<()> {
        descriptor.validate()?;

        if self.modules.contains_key(&descriptor.guid) {
            return Err(PagePlusError::Config(format!(
                "module '{}' registered twice",
                descriptor.guid
            )));
        }

        self.modules.insert(
            descriptor.guid.clone(),
            RegisteredModule {
                descriptor,
                runtime,
            },
        );
        Ok(())
    }

    pub fn get(&self, guid: &str) -> Option<&ModuleDescriptor> {
        self.modules.get(guid).map(|m| &m.descriptor)
    }

    pub fn get_mut(&mut self, guid: &str) -> Option<&mut RegisteredModule> {
        self.modules.get_mut(guid)
    }

    pub fn contains(&self, guid: &str) -> bool {
        self.modules.contains_key(guid)
    }

    /// All descriptors by GUID, in GUID order.
    pub fn all(&self) -> impl Iterator<Item = (&ModuleGuid, &ModuleDescriptor)> {
        self.modules.iter().map(|(guid, m)| (guid, &m.descriptor))
    }

    pub fn is_loaded(&self, guid: &str) -> bool {
        self.modules
            .get(guid)
            .is_some_and(|m| m.runtime.is_loaded())
    }

    /// GUIDs of every module whose runtime reports loaded.
    pub fn loaded(&self) -> Vec<ModuleGuid> {
        self.modules
            .iter()
            .filter(|(_, m)| m.runtime.is_loaded())
            .map(|(guid, _)| guid.clone())
            .collect()
    }

    /// Defaults of every registered module as an options tree.
    pub fn default_options(&self) -> OptionsTree {
        let mut tree = OptionsTree::new();
        for (guid, module) in &self.modules {
            tree.insert_module(guid.clone(), module.descriptor.default_options());
        }
        tree
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
