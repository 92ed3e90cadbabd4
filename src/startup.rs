//! Controller startup and the handle embedders drive it through.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::{AppearanceConfig, Config};
use crate::dispatch::{DispatchSender, LifecycleDispatcher};
use crate::error::{PagePlusError, PagePlusResult};
use crate::lifecycle::LifecycleManager;
use crate::modules::{ModuleDescriptor, ModuleGuid, ModuleRegistry};
use crate::notifications::{self, ApiInbox, MessageNotifications, NotificationsHandle};
use crate::options::{JsonOptionsStore, OptionsStore, OptionsTree};
use crate::page::{BookmarkletGuard, Page};
use crate::remote_disable::{
    spawn_fetch, HttpRemoteDisabled, RemoteDisabledSource, StaticRemoteDisabled,
};

/// Everything the controller needs to start on a page.
pub struct Startup {
    pub registry: ModuleRegistry,
    pub store: Box<dyn OptionsStore>,
    pub page: Arc<dyn Page>,
    pub guard: Arc<dyn BookmarkletGuard>,
    pub remote: Arc<dyn RemoteDisabledSource>,
    pub appearance: AppearanceConfig,
}

impl Startup {
    /// The built-in modules with the on-disk store and sources from `config`.
    pub fn from_config(
        config: &Config,
        page: Arc<dyn Page>,
        guard: Arc<dyn BookmarkletGuard>,
    ) -> PagePlusResult<(Self, NotificationsHandle)> {
        let (registry, notifications) = builtin_registry(config, Arc::clone(&page))?;
        let store = JsonOptionsStore::open(config.options_path())?;

        let remote: Arc<dyn RemoteDisabledSource> = match &config.remote.disabled_url {
            Some(url) => Arc::new(HttpRemoteDisabled::new(url.clone(), config.remote_timeout())),
            None => Arc::new(StaticRemoteDisabled::default()),
        };

        let startup = Self {
            registry,
            store: Box::new(store),
            page,
            guard,
            remote,
            appearance: config.appearance.clone(),
        };
        Ok((startup, notifications))
    }
}

/// Registry of the modules shipped with the controller.
pub fn builtin_registry(
    config: &Config,
    page: Arc<dyn Page>,
) -> PagePlusResult<(ModuleRegistry, NotificationsHandle)> {
    let inbox = Arc::new(ApiInbox::new(
        config.school.base_url.clone(),
        config.school_timeout(),
    ));
    let (module, handle) = MessageNotifications::new(
        inbox,
        page,
        config.school.base_url.clone(),
        std::time::Duration::from_millis(config.appearance.transition_ms),
    );

    let mut registry = ModuleRegistry::new();
    registry.register(notifications::descriptor(), Box::new(module))?;
    Ok((registry, handle))
}

/// Start the controller on the current page.
///
/// Returns `None` when injected as a bookmarklet into a page that already
/// runs it. Must be called from within a tokio runtime.
pub fn run_extension(startup: Startup) -> PagePlusResult<Option<Extension>> {
    let Startup {
        registry,
        mut store,
        page,
        guard,
        remote,
        appearance,
    } = startup;

    if guard.is_bookmarklet() {
        if guard.is_loaded() {
            info!("Already running on this page");
            return Ok(None);
        }
        guard.mark_loaded();
    }

    let options = initialize_options(store.as_mut(), &registry)?;
    let descriptors: BTreeMap<ModuleGuid, ModuleDescriptor> = registry
        .all()
        .map(|(guid, descriptor)| (guid.clone(), descriptor.clone()))
        .collect();

    let manager = LifecycleManager::new(registry, options, Arc::clone(&page));
    let dispatcher = LifecycleDispatcher::spawn(manager);
    let sender = dispatcher.sender();

    spawn_fetch(Arc::clone(&remote), sender.clone());

    for (name, value) in appearance.css_vars() {
        page.set_css_var(&name, &value);
    }

    store.on_change(sender.options_listener());
    sender.load_current_hash()?;

    info!(modules = descriptors.len(), "Controller started");

    Ok(Some(Extension {
        store,
        dispatcher,
        remote,
        descriptors,
    }))
}

/// Fill missing options with schema defaults and persist the result.
fn initialize_options(
    store: &mut dyn OptionsStore,
    registry: &ModuleRegistry,
) -> PagePlusResult<OptionsTree> {
    let current = store
        .get()
        .map_err(|e| PagePlusError::OptionsInit(e.to_string()))?;
    let merged = store.merge_defaults(current, &registry.default_options());
    store
        .set(merged.clone())
        .map_err(|e| PagePlusError::OptionsInit(e.to_string()))?;
    debug!(modules = merged.len(), "Initialized options");
    Ok(merged)
}

/// A running controller.
pub struct Extension {
    store: Box<dyn OptionsStore>,
    dispatcher: LifecycleDispatcher,
    remote: Arc<dyn RemoteDisabledSource>,
    descriptors: BTreeMap<ModuleGuid, ModuleDescriptor>,
}

impl Extension {
    /// The page hash changed from `old_url` to `new_url`.
    pub fn hash_changed(
        &self,
        old_url: impl Into<String>,
        new_url: impl Into<String>,
    ) -> PagePlusResult<()> {
        self.refresh_remote_disabled();
        self.dispatcher.sender().hash_changed(old_url, new_url)
    }

    /// Refetch the remotely disabled list in the background.
    pub fn refresh_remote_disabled(&self) -> JoinHandle<()> {
        spawn_fetch(Arc::clone(&self.remote), self.dispatcher.sender())
    }

    pub fn sender(&self) -> DispatchSender {
        self.dispatcher.sender()
    }

    pub fn options(&self) -> PagePlusResult<OptionsTree> {
        self.store.get()
    }

    /// Replace the whole options tree.
    pub fn set_options(&mut self, tree: OptionsTree) -> PagePlusResult<()> {
        self.store.set(tree)
    }

    /// Change one option after checking it against the module's schema.
    pub fn set_option(&mut self, guid: &str, key: &str, value: Value) -> PagePlusResult<()> {
        let descriptor = self
            .descriptors
            .get(guid)
            .ok_or_else(|| PagePlusError::UnknownModule(guid.to_string()))?;
        descriptor.validate_option(key, &value)?;

        let mut tree = self.store.get()?;
        tree.set(guid, key, value);
        self.store.set(tree)
    }

    /// Wait until every queued event has been handled.
    pub async fn flush(&self) -> PagePlusResult<()> {
        self.dispatcher.flush().await
    }

    /// Stop the dispatcher and hand back the manager.
    pub async fn shutdown(self) -> PagePlusResult<LifecycleManager> {
        self.dispatcher.shutdown().await
    }
}
