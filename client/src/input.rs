//! Terminal input handling: turning typed lines into chat messages

use rand::Rng;
use shared::ChatMessage;

/// Turns lines typed by the user into outgoing chat messages
pub struct InputManager {
    username: String,
    messages_composed: u64,
}

impl InputManager {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            messages_composed: 0,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn messages_composed(&self) -> u64 {
        self.messages_composed
    }

    /// Builds a message from one input line
    ///
    /// Trailing whitespace (including the line break) is stripped. Blank lines
    /// produce nothing.
    pub fn compose(&mut self, line: &str) -> Option<ChatMessage> {
        let text = line.trim_end();
        if text.trim().is_empty() {
            return None;
        }

        self.messages_composed += 1;
        Some(ChatMessage::new(self.username.clone(), text))
    }
}

/// Formats a received message for the terminal
pub fn render(message: &ChatMessage) -> String {
    let username = if message.username.is_empty() {
        "anonymous"
    } else {
        &message.username
    };
    format!("[{}] {}", username, message.message)
}

/// Picks a throwaway name like `guest-4821`
pub fn guest_name() -> String {
    let suffix: u16 = rand::thread_rng().gen_range(1000..10000);
    format!("guest-{}", suffix)
}
