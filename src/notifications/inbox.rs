//! The school portal's message API.

use std::time::Duration;

use super::message::Conversation;
use crate::error::PagePlusResult;

/// Inbox read and archive operations.
pub trait InboxSource: Send + Sync {
    fn fetch_inbox(&self) -> PagePlusResult<Vec<Conversation>>;

    fn archive(&self, conversation_id: u64) -> PagePlusResult<()>;
}

/// Talks to `{base_url}/api/message/...` with the signed-in session.
pub struct ApiInbox {
    base_url: String,
    agent: ureq::Agent,
}

impl ApiInbox {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl InboxSource for ApiInbox {
    fn fetch_inbox(&self) -> PagePlusResult<Vec<Conversation>> {
        let url = format!("{}/api/message/inbox/?format=json", self.base_url);
        let body = self.agent.get(&url).call()?.into_string()?;
        Ok(serde_json::from_str(&body)?)
    }

    fn archive(&self, conversation_id: u64) -> PagePlusResult<()> {
        let url = format!(
            "{}/api/message/conversationarchive/{}?format=json",
            self.base_url, conversation_id
        );
        let body = serde_json::json!({
            "id": conversation_id,
            "unarchive": false,
        });
        self.agent
            .put(&url)
            .set("Content-Type", "application/json")
            .send_string(&body.to_string())?;
        Ok(())
    }
}

/// Portal page of a conversation.
pub fn conversation_link(base_url: &str, conversation_id: u64) -> String {
    format!(
        "{}/app/student#message/conversation/{}",
        base_url.trim_end_matches('/'),
        conversation_id
    )
}
