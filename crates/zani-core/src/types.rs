use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier of a single chat message, assigned by the message store.
    MessageId
);
string_id!(
    /// Identifier of the channel a message was posted in.
    ChannelId
);
string_id!(UserId);

/// One emoji reaction tally on a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: String,
    pub count: u32,
}

/// A chat message as owned by the surrounding message store.
///
/// Read-only to the renderer and the assistant: nothing in this workspace
/// mutates or persists a `Message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub user_id: UserId,
    /// Raw text as typed, including attachment lines and markdown.
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub edited: bool,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    #[serde(default)]
    pub reply_count: Option<u32>,
}

impl Message {
    /// Build a plain message stamped with the current time.
    pub fn new(
        id: impl Into<MessageId>,
        channel_id: impl Into<ChannelId>,
        user_id: impl Into<UserId>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            channel_id: channel_id.into(),
            user_id: user_id.into(),
            content: content.into(),
            timestamp: Utc::now(),
            edited: false,
            reactions: Vec::new(),
            reply_count: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_optional_fields_default() {
        let json = r#"{
            "id": "m1",
            "channel_id": "general",
            "user_id": "alice",
            "content": "hi",
            "timestamp": "2026-03-01T10:00:00Z"
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.id.as_str(), "m1");
        assert!(!msg.edited);
        assert!(msg.reactions.is_empty());
        assert_eq!(msg.reply_count, None);
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = MessageId::from("m-42");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""m-42""#);
        assert_eq!(id.to_string(), "m-42");
    }
}
