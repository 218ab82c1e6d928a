//! User-facing chat/system messages

use crate::codec::FIELD_SEPARATOR;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;

/// Sender label used for messages generated locally about the connection.
pub const SERVER_INFORMATION: &str = "SERVER_INFORMATION: ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: String,
    pub message: String,
    /// Milliseconds since the Unix epoch at which the message was received.
    pub timestamp: u64,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            message: message.into(),
            timestamp: received_at(),
        }
    }

    /// Parses the `sender:message` argument of a `chat` command.
    ///
    /// A message without a sender is attributed to the server.
    pub fn from_arguments(arguments: &str) -> Self {
        match arguments.split_once(FIELD_SEPARATOR) {
            Some((sender, message)) => Self::new(sender, message),
            None => Self::new(SERVER_INFORMATION, arguments),
        }
    }

    pub fn to_arguments(&self) -> String {
        format!("{}{}{}", self.sender, FIELD_SEPARATOR, self.message)
    }
}

impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sender == SERVER_INFORMATION {
            write!(f, "{}{}", self.sender, self.message)
        } else {
            write!(f, "{}: {}", self.sender, self.message)
        }
    }
}

/// Milliseconds since the Unix epoch, or 0 if the clock is before it.
fn received_at() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as u64)
}

pub type ChatSink = mpsc::UnboundedSender<ChatMessage>;
pub type ChatReceiver = mpsc::UnboundedReceiver<ChatMessage>;

pub fn chat_channel() -> (ChatSink, ChatReceiver) {
    mpsc::unbounded_channel()
}
