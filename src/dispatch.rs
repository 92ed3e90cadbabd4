//! Serialized event delivery to the lifecycle manager.
//!
//! The dispatcher runs in its own tokio task and owns the
//! [`LifecycleManager`]. Navigation events, options changes and remote
//! disable updates are queued and handled strictly one after another, so an
//! unload/load sequence always completes before the next event starts.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{PagePlusError, PagePlusResult};
use crate::lifecycle::{LifecycleManager, Transition};
use crate::modules::ModuleGuid;
use crate::options::{OptionsChange, OptionsListener};
use crate::router::hash_from_url;

/// Messages handled by the dispatcher task.
#[derive(Debug)]
pub enum DispatchMessage {
    /// The page hash changed.
    HashChanged { old_url: String, new_url: String },

    /// The options store reported a change.
    OptionsChanged(OptionsChange),

    /// A fresh remotely disabled module list arrived.
    RemoteDisabled(Vec<ModuleGuid>),

    /// Load the modules for the page's current hash.
    LoadCurrentHash,

    /// Reply once everything queued before this message has been handled.
    Flush(oneshot::Sender<()>),

    /// Stop the dispatcher.
    Shutdown,
}

/// Cloneable handle for queueing events.
#[derive(Debug, Clone)]
pub struct DispatchSender {
    tx: mpsc::UnboundedSender<DispatchMessage>,
}

impl DispatchSender {
    pub fn send(&self, msg: DispatchMessage) -> PagePlusResult<()> {
        self.tx
            .send(msg)
            .map_err(|e| PagePlusError::Dispatcher(format!("Failed to send message: {}", e)))
    }

    pub fn hash_changed(
        &self,
        old_url: impl Into<String>,
        new_url: impl Into<String>,
    ) -> PagePlusResult<()> {
        self.send(DispatchMessage::HashChanged {
            old_url: old_url.into(),
            new_url: new_url.into(),
        })
    }

    pub fn options_changed(&self, change: OptionsChange) -> PagePlusResult<()> {
        self.send(DispatchMessage::OptionsChanged(change))
    }

    pub fn remote_disabled(&self, guids: Vec<ModuleGuid>) -> PagePlusResult<()> {
        self.send(DispatchMessage::RemoteDisabled(guids))
    }

    pub fn load_current_hash(&self) -> PagePlusResult<()> {
        self.send(DispatchMessage::LoadCurrentHash)
    }

    /// An options listener that queues every change.
    pub fn options_listener(&self) -> OptionsListener {
        let sender = self.clone();
        std::sync::Arc::new(move |change: &OptionsChange| {
            if let Err(e) = sender.options_changed(change.clone()) {
                warn!(error = %e, "Dropped options change");
            }
        })
    }
}

/// Owner of the dispatcher task.
pub struct LifecycleDispatcher {
    sender: DispatchSender,
    task_handle: Option<JoinHandle<LifecycleManager>>,
}

impl LifecycleDispatcher {
    /// Move `manager` into a new dispatcher task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(manager: LifecycleManager) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task_handle = tokio::spawn(dispatch_loop(rx, manager));

        Self {
            sender: DispatchSender { tx },
            task_handle: Some(task_handle),
        }
    }

    pub fn sender(&self) -> DispatchSender {
        self.sender.clone()
    }

    /// Wait until every event queued so far has been handled.
    pub async fn flush(&self) -> PagePlusResult<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.sender.send(DispatchMessage::Flush(done_tx))?;
        done_rx
            .await
            .map_err(|_| PagePlusError::Dispatcher("Dispatcher stopped".to_string()))
    }

    /// Stop the dispatcher after the queued events and hand back the manager.
    pub async fn shutdown(mut self) -> PagePlusResult<LifecycleManager> {
        let _ = self.sender.send(DispatchMessage::Shutdown);

        let handle = self
            .task_handle
            .take()
            .ok_or_else(|| PagePlusError::Dispatcher("Dispatcher already stopped".to_string()))?;

        handle
            .await
            .map_err(|e| PagePlusError::Dispatcher(format!("Dispatcher task panicked: {}", e)))
    }
}

/// Main loop of the dispatcher task.
async fn dispatch_loop(
    mut rx: mpsc::UnboundedReceiver<DispatchMessage>,
    mut manager: LifecycleManager,
) -> LifecycleManager {
    while let Some(msg) = rx.recv().await {
        match msg {
            DispatchMessage::HashChanged { old_url, new_url } => {
                if let Err(e) = handle_hash_change(&mut manager, &old_url, &new_url) {
                    warn!(error = %e, "Ignoring hash change");
                }
            }
            DispatchMessage::OptionsChanged(change) => {
                let transitions = manager.apply_new_options(&change);
                debug!(?transitions, "Applied new options");
            }
            DispatchMessage::RemoteDisabled(guids) => {
                manager.set_remote_disabled(guids);
            }
            DispatchMessage::LoadCurrentHash => {
                let hash = manager.current_hash();
                let transitions = manager.load_modules(&hash);
                debug!(%hash, ?transitions, "Loaded modules for current hash");
            }
            DispatchMessage::Flush(done) => {
                let _ = done.send(());
            }
            DispatchMessage::Shutdown => break,
        }
    }

    manager
}

/// Unload modules that no longer match, then load the new set.
pub fn handle_hash_change(
    manager: &mut LifecycleManager,
    old_url: &str,
    new_url: &str,
) -> PagePlusResult<Vec<Transition>> {
    let old_hash = hash_from_url(old_url)?;
    let new_hash = hash_from_url(new_url)?;

    let mut transitions = manager.unload_modules(&old_hash, &new_hash);
    transitions.extend(manager.load_modules(&new_hash));
    debug!(old = %old_hash, new = %new_hash, ?transitions, "Handled hash change");

    Ok(transitions)
}
