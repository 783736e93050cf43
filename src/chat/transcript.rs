use std::error::Error;
use std::fs;
use std::path::Path;

use chrono::{serde::ts_seconds, DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of a chat session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    #[serde(with = "ts_seconds")]
    pub created_at: DateTime<Utc>,
}

/// Ordered messages of the current chat session.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    /// Starts a session with the assistant's greeting.
    pub fn with_greeting(greeting: &str) -> Self {
        let mut transcript = Self::default();
        transcript.push(Role::Assistant, greeting);
        transcript
    }

    pub fn push(&mut self, role: Role, content: &str) -> &ChatMessage {
        self.messages.push(ChatMessage {
            id: Uuid::new_v4(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        });
        &self.messages[self.messages.len() - 1]
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Writes the transcript as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), Box<dyn Error + Send + Sync>> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.messages)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_opens_the_session() {
        let transcript = Transcript::with_greeting("Hello, how can I help you today?");
        assert_eq!(transcript.messages().len(), 1);
        assert_eq!(transcript.messages()[0].role, Role::Assistant);
    }

    #[test]
    fn test_saved_transcript_lists_messages_in_order() {
        let mut transcript = Transcript::with_greeting("hi");
        transcript.push(Role::User, "What is Rust?");
        transcript.push(Role::Assistant, "A systems language.");

        let dir = std::env::temp_dir().join(format!("llama-bridge-transcript-{}", Uuid::new_v4()));
        let path = dir.join("chat.json");
        transcript.save(&path).unwrap();

        let saved: Vec<ChatMessage> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let roles: Vec<Role> = saved.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::Assistant, Role::User, Role::Assistant]);
        assert_eq!(saved[1].content, "What is Rust?");

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"role\": \"user\""));

        fs::remove_dir_all(&dir).ok();
    }
}
