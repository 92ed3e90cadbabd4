//! Remotely disabled modules.
//!
//! A module that misbehaves after the school changes its site can be switched
//! off for everyone by listing its GUID at a well-known URL. The list is
//! fetched off the dispatcher task and delivered back through its queue.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::dispatch::DispatchSender;
use crate::error::PagePlusResult;
use crate::modules::ModuleGuid;

/// Where the remotely disabled list comes from.
pub trait RemoteDisabledSource: Send + Sync {
    fn fetch_disabled(&self) -> PagePlusResult<Vec<ModuleGuid>>;
}

/// Fetches the list over HTTP.
pub struct HttpRemoteDisabled {
    url: String,
    agent: ureq::Agent,
}

impl HttpRemoteDisabled {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl RemoteDisabledSource for HttpRemoteDisabled {
    fn fetch_disabled(&self) -> PagePlusResult<Vec<ModuleGuid>> {
        let body = self.agent.get(&self.url).call()?.into_string()?;
        parse_disabled_list(&body)
    }
}

/// A fixed list; empty when there is nothing to disable.
#[derive(Debug, Clone, Default)]
pub struct StaticRemoteDisabled(pub Vec<ModuleGuid>);

impl RemoteDisabledSource for StaticRemoteDisabled {
    fn fetch_disabled(&self) -> PagePlusResult<Vec<ModuleGuid>> {
        Ok(self.0.clone())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DisabledList {
    Bare(Vec<ModuleGuid>),
    Wrapped { disabled: Vec<ModuleGuid> },
}

/// Parse `["guid", ...]` or `{"disabled": ["guid", ...]}`.
pub fn parse_disabled_list(body: &str) -> PagePlusResult<Vec<ModuleGuid>> {
    let list: DisabledList = serde_json::from_str(body)?;
    Ok(match list {
        DisabledList::Bare(guids) => guids,
        DisabledList::Wrapped { disabled } => disabled,
    })
}

/// Fetch the list on a blocking thread and queue the result.
///
/// Failures are logged and otherwise ignored.
pub fn spawn_fetch(source: Arc<dyn RemoteDisabledSource>, sender: DispatchSender) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || match source.fetch_disabled() {
        Ok(guids) => {
            if let Err(e) = sender.remote_disabled(guids) {
                warn!(error = %e, "Could not deliver remotely disabled modules");
            }
        }
        Err(e) => debug!(error = %e, "Failed to fetch remotely disabled modules"),
    })
}
