//! Inbox payloads and message text handling.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

static URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:https?://|www\.)[^\s<>"']+"#).expect("valid regex")
});

/// One conversation as returned by the inbox endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Conversation {
    #[serde(default)]
    pub messages: Vec<InboxMessage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InboxMessage {
    pub conversation_id: u64,
    #[serde(default)]
    pub read_ind: bool,
    #[serde(default)]
    pub body: String,
    pub from_user: FromUser,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FromUser {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// An unread message ready to be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: u64,
    pub from: String,
    pub body: String,
}

/// The first unread message of every conversation, in inbox order.
pub fn unread_messages(conversations: &[Conversation]) -> Vec<Message> {
    conversations
        .iter()
        .filter_map(|c| c.messages.iter().find(|m| !m.read_ind))
        .map(|m| Message {
            id: m.conversation_id,
            from: format!("{} {}", m.from_user.first_name, m.from_user.last_name)
                .trim()
                .to_string(),
            body: m.body.clone(),
        })
        .collect()
}

/// Flatten a message body onto one line.
///
/// `<br>` tags and newlines become spaces and runs of whitespace collapse.
pub fn format_body_text(text: &str) -> String {
    let text = text.replace("<br>", " ");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Links found in `text`, first occurrence order, without duplicates.
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for m in URL.find_iter(text) {
        let url = m
            .as_str()
            .trim_end_matches(|c| matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | ')'));
        if !urls.iter().any(|u| u == url) {
            urls.push(url.to_string());
        }
    }
    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    const INBOX: &str = r#"[
        {
            "Messages": [
                {
                    "ConversationId": 11,
                    "ReadInd": false,
                    "Body": "Quiz moved<br>to Friday",
                    "FromUser": {"FirstName": "Ada", "LastName": "Lovelace"}
                },
                {
                    "ConversationId": 11,
                    "ReadInd": false,
                    "Body": "older",
                    "FromUser": {"FirstName": "Ada", "LastName": "Lovelace"}
                }
            ]
        },
        {
            "Messages": [
                {
                    "ConversationId": 12,
                    "ReadInd": true,
                    "Body": "seen",
                    "FromUser": {"FirstName": "Alan", "LastName": "Turing"}
                }
            ]
        },
        {
            "Messages": [
                {
                    "ConversationId": 13,
                    "ReadInd": true,
                    "Body": "seen",
                    "FromUser": {"FirstName": "Grace", "LastName": "Hopper"}
                },
                {
                    "ConversationId": 13,
                    "ReadInd": false,
                    "Body": "new one",
                    "FromUser": {"FirstName": "Grace", "LastName": "Hopper"}
                }
            ]
        }
    ]"#;

    #[test]
    fn test_unread_messages() {
        let conversations: Vec<Conversation> = serde_json::from_str(INBOX).unwrap();
        let messages = unread_messages(&conversations);

        assert_eq!(
            messages,
            vec![
                Message {
                    id: 11,
                    from: "Ada Lovelace".to_string(),
                    body: "Quiz moved<br>to Friday".to_string(),
                },
                Message {
                    id: 13,
                    from: "Grace Hopper".to_string(),
                    body: "new one".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_format_body_text() {
        assert_eq!(format_body_text("Quiz moved<br>to Friday"), "Quiz moved to Friday");
        assert_eq!(format_body_text("  a\n\nb \t c  "), "a b c");
        assert_eq!(format_body_text("a <br> b"), "a b");
        assert_eq!(format_body_text(""), "");
    }

    #[test]
    fn test_extract_urls() {
        let urls = extract_urls(
            "Slides at https://docs.example.com/deck?id=4. Also www.example.org, and https://docs.example.com/deck?id=4",
        );
        assert_eq!(
            urls,
            vec!["https://docs.example.com/deck?id=4", "www.example.org"]
        );
        assert!(extract_urls("no links here").is_empty());
    }
}
