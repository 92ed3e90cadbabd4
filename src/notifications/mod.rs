//! Message Notifications: popups for unread portal messages.
//!
//! Each load fetches the inbox and shows the first unread message of every
//! conversation, at most `maxMessages` at a time, each conversation only once
//! per page session. Popups hide after `disappearTime` seconds unless the
//! pointer is over them. Opening the messages page clears them.
//!
//! The module sets a CSS variable on the document root when it first loads,
//! so only a hard unload can take it down.

mod board;
mod inbox;
mod message;

pub use board::{Notification, NotificationBoard, NotificationState};
pub use inbox::{conversation_link, ApiInbox, InboxSource};
pub use message::{
    extract_urls, format_body_text, unread_messages, Conversation, FromUser, InboxMessage,
    Message,
};

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::PagePlusResult;
use crate::modules::{
    ModuleContext, ModuleDescriptor, ModuleResult, ModuleRuntime, OptionSchema, Validator,
};
use crate::page::Page;

pub const GUID: &str = "message-notifications";

pub const TRANSITION_VAR: &str = "--message-notifications--transition-time";

pub const MAX_MESSAGES: &str = "maxMessages";
pub const DISAPPEAR_TIME: &str = "disappearTime";

const DEFAULT_DISAPPEAR_SECS: f64 = 10.0;

pub fn descriptor() -> ModuleDescriptor {
    ModuleDescriptor::new(GUID, "Message Notifications")
        .with_hashes(&["*"])
        .with_option(
            MAX_MESSAGES,
            OptionSchema::number("Maximum Messages to Display", 3.0)
                .min(0.0)
                .validator(Validator::Integer),
        )
        .with_option(
            DISAPPEAR_TIME,
            OptionSchema::number("Disappear Time (seconds)", DEFAULT_DISAPPEAR_SECS).min(0.0),
        )
}

type SharedBoard = Arc<Mutex<NotificationBoard>>;

fn lock(board: &SharedBoard) -> MutexGuard<'_, NotificationBoard> {
    board.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct MessageNotifications {
    inbox: Arc<dyn InboxSource>,
    page: Arc<dyn Page>,
    base_url: String,
    transition: Duration,
    board: SharedBoard,
    styles_installed: bool,
    loaded: bool,
}

impl MessageNotifications {
    /// The module plus a handle for driving its popups from the page.
    pub fn new(
        inbox: Arc<dyn InboxSource>,
        page: Arc<dyn Page>,
        base_url: impl Into<String>,
        transition: Duration,
    ) -> (Self, NotificationsHandle) {
        let board = Arc::new(Mutex::new(NotificationBoard::new(transition)));
        let handle = NotificationsHandle {
            inbox: Arc::clone(&inbox),
            board: Arc::clone(&board),
        };
        let module = Self {
            inbox,
            page,
            base_url: base_url.into(),
            transition,
            board,
            styles_installed: false,
            loaded: false,
        };
        (module, handle)
    }

    fn install_styles(&mut self) {
        if self.styles_installed {
            return;
        }
        self.page
            .set_css_var(TRANSITION_VAR, &format!("{}ms", self.transition.as_millis()));
        self.styles_installed = true;
    }

    fn fetch_unread(&self) -> Vec<Message> {
        match self.inbox.fetch_inbox() {
            Ok(conversations) => unread_messages(&conversations),
            Err(e) => {
                // Signed out or portal down; the portal shows its own error
                debug!(error = %e, "Failed to fetch inbox");
                Vec::new()
            }
        }
    }

    fn show_unread(&mut self, ctx: &ModuleContext<'_>) -> ModuleResult<()> {
        let max_messages = ctx.option_f64(MAX_MESSAGES)?.max(0.0) as usize;
        let disappear = Duration::try_from_secs_f64(ctx.option_f64(DISAPPEAR_TIME)?.max(0.0))
            .unwrap_or_else(|_| Duration::from_secs_f64(DEFAULT_DISAPPEAR_SECS));

        let now = Instant::now();
        if ctx.hash.starts_with("#message") {
            lock(&self.board).begin_removal_all(now);
            return Ok(());
        }

        let messages = self.fetch_unread();
        let mut board = lock(&self.board);
        let shown = messages
            .iter()
            .take(max_messages)
            .filter(|m| board.show(m, conversation_link(&self.base_url, m.id), disappear, now))
            .count();
        debug!(shown, unread = messages.len(), "Showing message notifications");

        Ok(())
    }
}

impl ModuleRuntime for MessageNotifications {
    fn load(&mut self, ctx: &ModuleContext<'_>) -> ModuleResult<()> {
        // Options are checked before anything touches the page
        ctx.option_f64(MAX_MESSAGES)?;
        ctx.option_f64(DISAPPEAR_TIME)?;

        self.install_styles();
        self.loaded = true;
        self.show_unread(ctx)
    }

    fn refresh(&mut self, ctx: &ModuleContext<'_>) -> ModuleResult<()> {
        self.show_unread(ctx)
    }

    fn soft_unload(&mut self) -> bool {
        if self.styles_installed {
            return false;
        }
        lock(&self.board).clear();
        self.loaded = false;
        true
    }

    fn hard_unload(&mut self) -> bool {
        lock(&self.board).clear();
        if self.styles_installed {
            self.page.remove_css_var(TRANSITION_VAR);
            self.styles_installed = false;
        }
        self.loaded = false;
        true
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }
}

/// Page-side access to the popups: timers, clicks and rendering.
#[derive(Clone)]
pub struct NotificationsHandle {
    inbox: Arc<dyn InboxSource>,
    board: SharedBoard,
}

impl NotificationsHandle {
    /// Popups currently on screen, including those fading out.
    pub fn active(&self) -> Vec<Notification> {
        lock(&self.board).active().to_vec()
    }

    pub fn tick(&self, now: Instant, hovered: bool) -> Vec<u64> {
        lock(&self.board).tick(now, hovered)
    }

    /// Archive the conversation and fade its popup out.
    ///
    /// The popup goes away even when the request fails.
    pub fn archive(&self, conversation_id: u64, now: Instant) -> PagePlusResult<()> {
        lock(&self.board).begin_removal(conversation_id, now);
        self.inbox.archive(conversation_id).map_err(|e| {
            warn!(conversation_id, error = %e, "Failed to archive conversation");
            e
        })
    }

    /// Fade a popup out after it was clicked and return where to go.
    ///
    /// The first link in the message wins over the conversation page.
    pub fn open(&self, conversation_id: u64, now: Instant) -> Option<String> {
        let mut board = lock(&self.board);
        let target = board
            .get(conversation_id)
            .map(|n| n.urls.first().cloned().unwrap_or_else(|| n.link.clone()));
        board.begin_removal(conversation_id, now);
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PagePlusError;
    use crate::lifecycle::{LifecycleManager, Transition};
    use crate::modules::ModuleRegistry;
    use crate::options::ModuleOptions;
    use crate::page::HeadlessPage;
    use serde_json::json;

    const BASE: &str = "https://school.example.com";
    const FADE: Duration = Duration::from_millis(300);

    #[derive(Default)]
    struct FakeInbox {
        conversations: Vec<Conversation>,
        archived: Mutex<Vec<u64>>,
        offline: bool,
    }

    impl InboxSource for FakeInbox {
        fn fetch_inbox(&self) -> PagePlusResult<Vec<Conversation>> {
            if self.offline {
                return Err(PagePlusError::Http("offline".to_string()));
            }
            Ok(self.conversations.clone())
        }

        fn archive(&self, conversation_id: u64) -> PagePlusResult<()> {
            if self.offline {
                return Err(PagePlusError::Http("offline".to_string()));
            }
            self.archived.lock().unwrap().push(conversation_id);
            Ok(())
        }
    }

    fn conversation(id: u64, body: &str) -> Conversation {
        serde_json::from_value(json!({
            "Messages": [{
                "ConversationId": id,
                "ReadInd": false,
                "Body": body,
                "FromUser": {"FirstName": "Ada", "LastName": "Lovelace"}
            }]
        }))
        .unwrap()
    }

    fn inbox(count: u64) -> FakeInbox {
        FakeInbox {
            conversations: (1..=count)
                .map(|id| conversation(id, &format!("message {}", id)))
                .collect(),
            ..Default::default()
        }
    }

    fn options(max: u64, disappear: u64) -> ModuleOptions {
        let mut opts = ModuleOptions::new();
        opts.insert(MAX_MESSAGES.to_string(), json!(max));
        opts.insert(DISAPPEAR_TIME.to_string(), json!(disappear));
        opts
    }

    fn ctx<'a>(options: &'a ModuleOptions, hash: &'a str) -> ModuleContext<'a> {
        ModuleContext {
            guid: GUID,
            name: "Message Notifications",
            options,
            hash,
        }
    }

    fn module(
        inbox: FakeInbox,
    ) -> (MessageNotifications, NotificationsHandle, Arc<FakeInbox>, Arc<HeadlessPage>) {
        let inbox = Arc::new(inbox);
        let page = Arc::new(HeadlessPage::new(format!("{}/app/student#", BASE)));
        let (module, handle) = MessageNotifications::new(inbox.clone(), page.clone(), BASE, FADE);
        (module, handle, inbox, page)
    }

    #[test]
    fn test_descriptor() {
        let descriptor = descriptor();
        descriptor.validate().unwrap();
        assert!(descriptor.matches_hash("#anything"));

        let defaults = descriptor.default_options();
        assert_eq!(defaults.get("enabled"), Some(&json!(true)));
        assert_eq!(defaults.get(MAX_MESSAGES), Some(&json!(3.0)));
        assert_eq!(defaults.get(DISAPPEAR_TIME), Some(&json!(10.0)));

        assert!(descriptor.validate_option(MAX_MESSAGES, &json!(2.5)).is_err());
        assert!(descriptor.validate_option(MAX_MESSAGES, &json!(-1)).is_err());
        assert!(descriptor.validate_option(DISAPPEAR_TIME, &json!(2.5)).is_ok());
    }

    #[test]
    fn test_load_shows_up_to_max() {
        let (mut module, handle, _, page) = module(inbox(5));
        let opts = options(3, 10);

        module.load(&ctx(&opts, "#")).unwrap();

        assert!(module.is_loaded());
        let active = handle.active();
        assert_eq!(active.iter().map(|n| n.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(active[0].from, "Ada Lovelace");
        assert_eq!(active[0].link, format!("{}/app/student#message/conversation/1", BASE));
        assert_eq!(page.css_var(TRANSITION_VAR).as_deref(), Some("300ms"));
    }

    #[test]
    fn test_reload_does_not_repeat() {
        let (mut module, handle, _, _) = module(inbox(2));
        let opts = options(3, 10);

        module.load(&ctx(&opts, "#")).unwrap();
        assert!(module.hard_unload());
        assert!(handle.active().is_empty());

        module.load(&ctx(&opts, "#")).unwrap();
        assert!(handle.active().is_empty());
    }

    #[test]
    fn test_messages_page_clears_popups() {
        let (mut module, handle, _, _) = module(inbox(2));
        let opts = options(3, 10);

        module.load(&ctx(&opts, "#")).unwrap();
        module.load(&ctx(&opts, "#message/inbox")).unwrap();

        assert!(handle.active().iter().all(Notification::is_removing));
        handle.tick(Instant::now() + FADE, false);
        assert!(handle.active().is_empty());
    }

    #[test]
    fn test_messages_page_shows_nothing() {
        let (mut module, handle, _, _) = module(inbox(2));
        let opts = options(3, 10);

        module.load(&ctx(&opts, "#message")).unwrap();
        assert!(handle.active().is_empty());

        // Not marked as displayed, so they appear on the next page
        module.load(&ctx(&opts, "#")).unwrap();
        assert_eq!(handle.active().len(), 2);
    }

    #[test]
    fn test_offline_inbox_is_empty() {
        let (mut module, handle, _, _) = module(FakeInbox {
            offline: true,
            ..inbox(2)
        });
        let opts = options(3, 10);

        module.load(&ctx(&opts, "#")).unwrap();
        assert!(module.is_loaded());
        assert!(handle.active().is_empty());
    }

    #[test]
    fn test_missing_option_fails_load() {
        let (mut module, _, _, page) = module(inbox(1));
        let opts = ModuleOptions::new();

        assert!(module.load(&ctx(&opts, "#")).is_err());
        assert!(!module.is_loaded());
        assert!(page.css_var(TRANSITION_VAR).is_none());
    }

    #[test]
    fn test_soft_unload_refused_after_styles() {
        let (mut module, handle, _, page) = module(inbox(1));
        assert!(module.soft_unload());

        let opts = options(3, 10);
        module.load(&ctx(&opts, "#")).unwrap();

        assert!(!module.soft_unload());
        assert!(module.is_loaded());
        assert_eq!(handle.active().len(), 1);

        assert!(module.hard_unload());
        assert!(!module.is_loaded());
        assert!(page.css_var(TRANSITION_VAR).is_none());
    }

    #[test]
    fn test_navigation_refreshes_loaded_module() {
        let inbox = Arc::new(inbox(2));
        let page = Arc::new(HeadlessPage::new(format!("{}/app/student#", BASE)));
        let (module, handle) = MessageNotifications::new(inbox, page.clone(), BASE, FADE);

        let mut registry = ModuleRegistry::new();
        registry.register(descriptor(), Box::new(module)).unwrap();
        let options = registry.default_options();
        let mut manager = LifecycleManager::new(registry, options, page);

        assert_eq!(manager.load_modules("#"), vec![Transition::Loaded(GUID.to_string())]);
        assert_eq!(handle.active().len(), 2);

        let out = manager.load_modules("#message/inbox");
        assert_eq!(out, vec![Transition::AlreadyLoaded(GUID.to_string())]);
        assert!(handle.active().iter().all(Notification::is_removing));
    }

    #[test]
    fn test_popups_expire() {
        let (mut module, handle, _, _) = module(inbox(1));
        let opts = options(3, 2);
        module.load(&ctx(&opts, "#")).unwrap();

        let later = Instant::now() + Duration::from_secs(3);
        handle.tick(later, false);
        assert_eq!(handle.tick(later + FADE, false), vec![1]);
    }

    #[test]
    fn test_archive() {
        let (mut module, handle, inbox, _) = module(inbox(2));
        let opts = options(3, 10);
        module.load(&ctx(&opts, "#")).unwrap();

        let now = Instant::now();
        handle.archive(2, now).unwrap();

        assert_eq!(*inbox.archived.lock().unwrap(), vec![2]);
        assert_eq!(handle.tick(now + FADE, true), vec![2]);
    }

    #[test]
    fn test_open_prefers_message_link() {
        let (mut module, handle, _, _) = module(FakeInbox {
            conversations: vec![
                conversation(1, "Slides: https://docs.example.com/x"),
                conversation(2, "no link"),
            ],
            ..Default::default()
        });
        let opts = options(3, 10);
        module.load(&ctx(&opts, "#")).unwrap();

        let now = Instant::now();
        assert_eq!(
            handle.open(1, now).as_deref(),
            Some("https://docs.example.com/x")
        );
        assert_eq!(
            handle.open(2, now),
            Some(format!("{}/app/student#message/conversation/2", BASE))
        );
        assert_eq!(handle.open(9, now), None);
    }
}
