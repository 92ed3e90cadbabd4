//! Options storage backends.
//!
//! Stores hold the whole options tree and notify registered listeners with
//! the previous and current tree whenever a write actually changes it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{FlatOptions, OptionsTree};
use crate::error::{PagePlusError, PagePlusResult};

/// Payload delivered to change listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionsChange {
    pub old_value: OptionsTree,
    pub new_value: OptionsTree,
}

/// Callback invoked after every effective options write.
pub type OptionsListener = Arc<dyn Fn(&OptionsChange) + Send + Sync + 'static>;

/// Persistent options storage.
pub trait OptionsStore: Send {
    /// Current options tree.
    fn get(&self) -> PagePlusResult<OptionsTree>;

    /// Replace the options tree, notifying listeners if it changed.
    fn set(&mut self, tree: OptionsTree) -> PagePlusResult<()>;

    /// Register a listener for future changes.
    fn on_change(&mut self, listener: OptionsListener);

    /// `tree` with every missing key filled from `defaults`.
    fn merge_defaults(&self, tree: OptionsTree, defaults: &OptionsTree) -> OptionsTree {
        tree.merge_defaults(defaults)
    }
}

#[derive(Default)]
struct Listeners(Vec<OptionsListener>);

impl Listeners {
    fn push(&mut self, listener: OptionsListener) {
        self.0.push(listener);
    }

    fn notify(&self, old_value: OptionsTree, new_value: OptionsTree) {
        if old_value == new_value || self.0.is_empty() {
            return;
        }
        let change = OptionsChange {
            old_value,
            new_value,
        };
        for listener in &self.0 {
            listener(&change);
        }
    }
}

/// In-memory store, for embedding and tests.
#[derive(Default)]
pub struct MemoryOptionsStore {
    tree: OptionsTree,
    listeners: Listeners,
}

impl MemoryOptionsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(tree: OptionsTree) -> Self {
        Self {
            tree,
            listeners: Listeners::default(),
        }
    }
}

impl OptionsStore for MemoryOptionsStore {
    fn get(&self) -> PagePlusResult<OptionsTree> {
        Ok(self.tree.clone())
    }

    fn set(&mut self, tree: OptionsTree) -> PagePlusResult<()> {
        let old = std::mem::replace(&mut self.tree, tree);
        self.listeners.notify(old, self.tree.clone());
        Ok(())
    }

    fn on_change(&mut self, listener: OptionsListener) {
        self.listeners.push(listener);
    }
}

/// Options persisted as flattened JSON.
///
/// The tree is cached in memory and written to disk on every change.
pub struct JsonOptionsStore {
    path: PathBuf,
    cache: OptionsTree,
    dirty: bool,
    listeners: Listeners,
}

impl JsonOptionsStore {
    /// Open the store at `path`.
    ///
    /// A missing file is an empty tree; an unreadable or corrupt file is an
    /// error.
    pub fn open(path: impl Into<PathBuf>) -> PagePlusResult<Self> {
        let path = path.into();

        let cache = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|e| storage_error(&path, e))?;
            let flat: FlatOptions =
                serde_json::from_str(&contents).map_err(|e| storage_error(&path, e))?;
            OptionsTree::unflatten(&flat)
        } else {
            OptionsTree::new()
        };

        Ok(Self {
            path,
            cache,
            dirty: false,
            listeners: Listeners::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush cached changes to disk.
    pub fn flush(&mut self) -> PagePlusResult<()> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| storage_error(&self.path, e))?;
        }

        let contents = serde_json::to_string_pretty(&self.cache.flatten())?;
        fs::write(&self.path, contents).map_err(|e| storage_error(&self.path, e))?;

        self.dirty = false;
        Ok(())
    }
}

impl OptionsStore for JsonOptionsStore {
    fn get(&self) -> PagePlusResult<OptionsTree> {
        Ok(self.cache.clone())
    }

    fn set(&mut self, tree: OptionsTree) -> PagePlusResult<()> {
        if tree == self.cache {
            return Ok(());
        }

        // The cache only takes the new tree once it is on disk
        let old = std::mem::replace(&mut self.cache, tree);
        self.dirty = true;
        if let Err(e) = self.flush() {
            self.cache = old;
            self.dirty = false;
            return Err(e);
        }

        self.listeners.notify(old, self.cache.clone());
        Ok(())
    }

    fn on_change(&mut self, listener: OptionsListener) {
        self.listeners.push(listener);
    }
}

impl Drop for JsonOptionsStore {
    fn drop(&mut self) {
        // Best-effort flush on drop
        let _ = self.flush();
    }
}

fn storage_error(path: &Path, e: impl std::fmt::Display) -> PagePlusError {
    PagePlusError::Storage {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}
