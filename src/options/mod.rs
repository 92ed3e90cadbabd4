//! Module options.
//!
//! Options are kept as a tree, module GUID → option key → JSON value. Every
//! module carries a reserved `enabled` flag. On disk the tree is flattened to
//! a single-level object keyed `"<guid>.<option>"`.

mod diff;
mod store;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::modules::ModuleGuid;

pub use diff::{diff, ModuleDiff};
pub use store::{
    JsonOptionsStore, MemoryOptionsStore, OptionsChange, OptionsListener, OptionsStore,
};

/// Reserved per-module option that turns a module on or off.
pub const ENABLED_KEY: &str = "enabled";

/// Options of a single module by key.
pub type ModuleOptions = BTreeMap<String, Value>;

/// Flattened persisted form, `"<guid>.<option>"` → value.
pub type FlatOptions = BTreeMap<String, Value>;

/// Options of every module by GUID.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionsTree(BTreeMap<ModuleGuid, ModuleOptions>);

impl OptionsTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn module(&self, guid: &str) -> Option<&ModuleOptions> {
        self.0.get(guid)
    }

    pub fn get(&self, guid: &str, key: &str) -> Option<&Value> {
        self.0.get(guid).and_then(|m| m.get(key))
    }

    pub fn set(&mut self, guid: &str, key: &str, value: Value) {
        self.0
            .entry(guid.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    pub fn insert_module(&mut self, guid: ModuleGuid, options: ModuleOptions) {
        self.0.insert(guid, options);
    }

    pub fn remove_module(&mut self, guid: &str) -> Option<ModuleOptions> {
        self.0.remove(guid)
    }

    /// The module's `enabled` flag, if set to a boolean.
    pub fn is_enabled(&self, guid: &str) -> Option<bool> {
        self.get(guid, ENABLED_KEY).and_then(Value::as_bool)
    }

    pub fn modules(&self) -> impl Iterator<Item = (&ModuleGuid, &ModuleOptions)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fill keys missing from `self` with `defaults`. Present keys always win.
    pub fn merge_defaults(mut self, defaults: &OptionsTree) -> OptionsTree {
        for (guid, module_defaults) in &defaults.0 {
            let module = self.0.entry(guid.clone()).or_default();
            for (key, value) in module_defaults {
                module.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        self
    }

    pub fn flatten(&self) -> FlatOptions {
        let mut flat = FlatOptions::new();
        for (guid, module) in &self.0 {
            for (key, value) in module {
                flat.insert(format!("{}.{}", guid, key), value.clone());
            }
        }
        flat
    }

    /// Rebuild a tree from flattened keys. Keys without a `.` are dropped.
    pub fn unflatten(flat: &FlatOptions) -> OptionsTree {
        let mut tree = OptionsTree::new();
        for (flat_key, value) in flat {
            match flat_key.split_once('.') {
                Some((guid, key)) if !guid.is_empty() && !key.is_empty() => {
                    tree.set(guid, key, value.clone());
                }
                _ => tracing::debug!(key = %flat_key, "Skipping malformed option key"),
            }
        }
        tree
    }
}

impl From<BTreeMap<ModuleGuid, ModuleOptions>> for OptionsTree {
    fn from(map: BTreeMap<ModuleGuid, ModuleOptions>) -> Self {
        Self(map)
    }
}
