//! The host page the controller runs in.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Page-wide operations the controller needs.
pub trait Page: Send + Sync {
    /// Full URL of the page.
    fn url(&self) -> String;

    /// Reload the whole page. Everything running in it is discarded.
    fn reload(&self);

    /// Set a CSS custom property on the document root.
    fn set_css_var(&self, name: &str, value: &str);

    /// Remove a CSS custom property from the document root.
    fn remove_css_var(&self, name: &str);
}

/// Guards against initializing twice when injected as a bookmarklet.
pub trait BookmarkletGuard: Send + Sync {
    fn is_bookmarklet(&self) -> bool;

    fn is_loaded(&self) -> bool;

    fn mark_loaded(&self);
}

/// A page with no browser behind it.
///
/// Keeps the URL, the CSS variables and the reload count in memory.
#[derive(Debug, Default)]
pub struct HeadlessPage {
    url: Mutex<String>,
    css_vars: Mutex<BTreeMap<String, String>>,
    reloads: AtomicUsize,
    bookmarklet: bool,
    bookmarklet_loaded: AtomicBool,
}

impl HeadlessPage {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Mutex::new(url.into()),
            ..Default::default()
        }
    }

    /// A page the controller was injected into as a bookmarklet.
    pub fn bookmarklet(url: impl Into<String>) -> Self {
        Self {
            bookmarklet: true,
            ..Self::new(url)
        }
    }

    /// Change the URL; returns the previous one.
    pub fn navigate(&self, url: impl Into<String>) -> String {
        let mut current = self.url.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *current, url.into())
    }

    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    pub fn css_var(&self, name: &str) -> Option<String> {
        self.css_vars
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }
}

impl Page for HeadlessPage {
    fn url(&self) -> String {
        self.url.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }

    fn set_css_var(&self, name: &str, value: &str) {
        self.css_vars
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), value.to_string());
    }

    fn remove_css_var(&self, name: &str) {
        self.css_vars
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name);
    }
}

impl BookmarkletGuard for HeadlessPage {
    fn is_bookmarklet(&self) -> bool {
        self.bookmarklet
    }

    fn is_loaded(&self) -> bool {
        self.bookmarklet_loaded.load(Ordering::SeqCst)
    }

    fn mark_loaded(&self) {
        self.bookmarklet_loaded.store(true, Ordering::SeqCst);
    }
}
