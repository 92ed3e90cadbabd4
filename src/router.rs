//! Hash routing: which modules apply to a URL fragment.

use std::collections::BTreeSet;

use url::Url;

use crate::error::{PagePlusError, PagePlusResult};
use crate::modules::{ModuleGuid, ModuleRegistry};
use crate::options::OptionsTree;

/// Hash used when a URL has no fragment.
pub const DEFAULT_HASH: &str = "#";

/// The hash of `url`, including the leading `#`.
///
/// A URL with no fragment, or an empty one, resolves to `"#"`.
pub fn hash_from_url(url: &str) -> PagePlusResult<String> {
    let parsed = Url::parse(url).map_err(|source| PagePlusError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;

    Ok(match parsed.fragment() {
        Some(fragment) if !fragment.is_empty() => format!("#{}", fragment),
        _ => DEFAULT_HASH.to_string(),
    })
}

/// Read-only view over the state that decides which modules are active.
#[derive(Clone, Copy)]
pub struct HashRouter<'a> {
    registry: &'a ModuleRegistry,
    options: &'a OptionsTree,
    remote_disabled: &'a BTreeSet<ModuleGuid>,
}

impl<'a> HashRouter<'a> {
    pub fn new(
        registry: &'a ModuleRegistry,
        options: &'a OptionsTree,
        remote_disabled: &'a BTreeSet<ModuleGuid>,
    ) -> Self {
        Self {
            registry,
            options,
            remote_disabled,
        }
    }

    /// Modules that should be active for `hash`.
    ///
    /// A module is active when one of its patterns matches, its `enabled`
    /// option is true and it has not been disabled remotely.
    pub fn modules_for_hash(&self, hash: &str) -> BTreeSet<ModuleGuid> {
        self.registry
            .all()
            .filter(|(guid, desc)| {
                desc.matches_hash(hash)
                    && self.is_enabled(guid)
                    && !self.remote_disabled.contains(guid.as_str())
            })
            .map(|(guid, _)| guid.clone())
            .collect()
    }

    /// Whether the module is switched on by its options.
    ///
    /// Only a boolean `true` counts. A missing or non-boolean `enabled` is
    /// off, the same as when the options change removes it.
    pub fn is_enabled(&self, guid: &str) -> bool {
        self.options.is_enabled(guid).unwrap_or(false)
    }
}
