//! The stack of notification popups and their timing.
//!
//! A popup is visible until its disappear time passes, then fades for the
//! transition time and is dropped. While the pointer is over the board an
//! expired popup stays until the pointer leaves.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use super::message::{extract_urls, format_body_text, Message};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationState {
    Visible { expires_at: Instant },
    Removing { since: Instant },
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub id: u64,
    pub from: String,
    /// Body flattened onto one line.
    pub text: String,
    pub urls: Vec<String>,
    /// Conversation page in the school portal.
    pub link: String,
    pub state: NotificationState,
}

impl Notification {
    pub fn is_removing(&self) -> bool {
        matches!(self.state, NotificationState::Removing { .. })
    }
}

#[derive(Debug)]
pub struct NotificationBoard {
    /// Conversations shown at least once; never shown again.
    displayed: HashSet<u64>,
    active: Vec<Notification>,
    transition: Duration,
}

impl NotificationBoard {
    pub fn new(transition: Duration) -> Self {
        Self {
            displayed: HashSet::new(),
            active: Vec::new(),
            transition,
        }
    }

    /// Show a message unless its conversation was shown before.
    pub fn show(&mut self, message: &Message, link: String, disappear: Duration, now: Instant) -> bool {
        if !self.displayed.insert(message.id) {
            return false;
        }

        let text = format_body_text(&message.body);
        let urls = extract_urls(&text);
        self.active.push(Notification {
            id: message.id,
            from: message.from.clone(),
            text,
            urls,
            link,
            state: NotificationState::Visible {
                expires_at: now + disappear,
            },
        });
        true
    }

    /// Start fading a popup out. Popups already fading keep their start time.
    pub fn begin_removal(&mut self, id: u64, now: Instant) -> bool {
        match self.active.iter_mut().find(|n| n.id == id) {
            Some(n) => {
                if !n.is_removing() {
                    n.state = NotificationState::Removing { since: now };
                }
                true
            }
            None => false,
        }
    }

    pub fn begin_removal_all(&mut self, now: Instant) {
        for n in &mut self.active {
            if !n.is_removing() {
                n.state = NotificationState::Removing { since: now };
            }
        }
    }

    /// Advance timers. Returns the ids dropped from the board.
    pub fn tick(&mut self, now: Instant, hovered: bool) -> Vec<u64> {
        for n in &mut self.active {
            if let NotificationState::Visible { expires_at } = n.state {
                if now >= expires_at && !hovered {
                    n.state = NotificationState::Removing { since: now };
                }
            }
        }

        let transition = self.transition;
        let mut removed = Vec::new();
        self.active.retain(|n| match n.state {
            NotificationState::Removing { since } if now.duration_since(since) >= transition => {
                removed.push(n.id);
                false
            }
            _ => true,
        });
        removed
    }

    /// Drop every popup at once.
    pub fn clear(&mut self) {
        self.active.clear();
    }

    pub fn active(&self) -> &[Notification] {
        &self.active
    }

    pub fn get(&self, id: u64) -> Option<&Notification> {
        self.active.iter().find(|n| n.id == id)
    }

    pub fn is_displayed(&self, id: u64) -> bool {
        self.displayed.contains(&id)
    }
}
