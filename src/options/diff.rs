//! Structural diff of two options trees, grouped by module.

use std::collections::BTreeMap;

use serde_json::Value;

use super::{ModuleOptions, OptionsTree, ENABLED_KEY};
use crate::modules::ModuleGuid;

/// What changed for one module between two trees.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleDiff {
    /// Changed keys with their new value, `None` when the key was removed.
    pub changed: BTreeMap<String, Option<Value>>,
}

impl ModuleDiff {
    pub fn touches_enabled(&self) -> bool {
        self.changed.contains_key(ENABLED_KEY)
    }

    /// True only when `enabled` changed to the boolean `true`.
    pub fn newly_enabled(&self) -> bool {
        matches!(self.changed.get(ENABLED_KEY), Some(Some(Value::Bool(true))))
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Modules whose options differ between `old` and `new`.
///
/// Values are compared structurally, so a nested object only counts as
/// changed when something inside it differs. Modules that appear or vanish
/// report every key.
pub fn diff(old: &OptionsTree, new: &OptionsTree) -> BTreeMap<ModuleGuid, ModuleDiff> {
    let empty = ModuleOptions::new();
    let mut result = BTreeMap::new();

    let guids = old
        .modules()
        .map(|(g, _)| g)
        .chain(new.modules().map(|(g, _)| g));

    for guid in guids {
        if result.contains_key(guid) {
            continue;
        }

        let before = old.module(guid).unwrap_or(&empty);
        let after = new.module(guid).unwrap_or(&empty);
        let module_diff = diff_module(before, after);

        if !module_diff.is_empty() {
            result.insert(guid.clone(), module_diff);
        }
    }

    result
}

fn diff_module(before: &ModuleOptions, after: &ModuleOptions) -> ModuleDiff {
    let mut changed = BTreeMap::new();

    for (key, old_value) in before {
        match after.get(key) {
            Some(new_value) if new_value == old_value => {}
            Some(new_value) => {
                changed.insert(key.clone(), Some(new_value.clone()));
            }
            None => {
                changed.insert(key.clone(), None);
            }
        }
    }

    for (key, new_value) in after {
        if !before.contains_key(key) {
            changed.insert(key.clone(), Some(new_value.clone()));
        }
    }

    ModuleDiff { changed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(entries: &[(&str, &str, Value)]) -> OptionsTree {
        let mut t = OptionsTree::new();
        for (guid, key, value) in entries {
            t.set(guid, key, value.clone());
        }
        t
    }

    #[test]
    fn test_identical_trees_have_no_diff() {
        let a = tree(&[("m", "enabled", json!(true)), ("m", "n", json!({"x": [1]}))]);
        assert!(diff(&a, &a.clone()).is_empty());
    }

    #[test]
    fn test_enabled_flip() {
        let old = tree(&[("m", "enabled", json!(false)), ("other", "enabled", json!(true))]);
        let new = tree(&[("m", "enabled", json!(true)), ("other", "enabled", json!(true))]);

        let d = diff(&old, &new);
        assert_eq!(d.len(), 1);
        assert!(d["m"].touches_enabled());
        assert!(d["m"].newly_enabled());
    }

    #[test]
    fn test_disable_is_not_newly_enabled() {
        let old = tree(&[("m", "enabled", json!(true))]);
        let new = tree(&[("m", "enabled", json!(false))]);

        let d = diff(&old, &new);
        assert!(d["m"].touches_enabled());
        assert!(!d["m"].newly_enabled());
    }

    #[test]
    fn test_several_options_one_entry() {
        let old = tree(&[
            ("m", "enabled", json!(true)),
            ("m", "a", json!(1)),
            ("m", "b", json!(2)),
        ]);
        let new = tree(&[
            ("m", "enabled", json!(true)),
            ("m", "a", json!(5)),
            ("m", "b", json!(6)),
        ]);

        let d = diff(&old, &new);
        assert_eq!(d.len(), 1);
        assert!(!d["m"].touches_enabled());
        assert_eq!(d["m"].changed.len(), 2);
    }

    #[test]
    fn test_nested_values_compared_structurally() {
        let old = tree(&[("m", "list", json!({"a": [1, 2], "b": null}))]);
        let same = tree(&[("m", "list", json!({"b": null, "a": [1, 2]}))]);
        let changed = tree(&[("m", "list", json!({"a": [1, 3], "b": null}))]);

        assert!(diff(&old, &same).is_empty());
        assert_eq!(
            diff(&old, &changed)["m"].changed["list"],
            Some(json!({"a": [1, 3], "b": null}))
        );
    }

    #[test]
    fn test_removed_module_touches_enabled() {
        let old = tree(&[("m", "enabled", json!(true)), ("m", "a", json!(1))]);
        let new = OptionsTree::new();

        let d = diff(&old, &new);
        assert!(d["m"].touches_enabled());
        assert!(!d["m"].newly_enabled());
        assert_eq!(d["m"].changed["a"], None);
    }

    #[test]
    fn test_added_module_reports_all_keys() {
        let old = OptionsTree::new();
        let new = tree(&[("m", "enabled", json!(true)), ("m", "a", json!(1))]);

        let d = diff(&old, &new);
        assert!(d["m"].newly_enabled());
        assert_eq!(d["m"].changed.len(), 2);
    }
}
