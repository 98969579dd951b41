use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

/// A chat message posted to a group
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub group_id: String,
    pub sender_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoardStats {
    pub groups: usize,
    pub messages: usize,
}

/// In-memory message storage backing the demonstration routes
#[derive(Debug, Default)]
pub struct MessageBoard {
    messages: DashMap<String, ChatMessage>,
}

impl MessageBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&self, group_id: &str, sender_id: &str, body: &str) -> ChatMessage {
        let message = ChatMessage {
            id: Uuid::new_v4().to_string(),
            group_id: group_id.to_string(),
            sender_id: sender_id.to_string(),
            body: body.to_string(),
            created_at: Utc::now(),
        };
        self.messages.insert(message.id.clone(), message.clone());
        message
    }

    pub fn get(&self, id: &str) -> Option<ChatMessage> {
        self.messages.get(id).map(|message| message.clone())
    }

    /// Messages in a group, oldest first, at most `limit`
    pub fn list(&self, group_id: &str, limit: usize) -> Vec<ChatMessage> {
        let mut messages: Vec<ChatMessage> = self
            .messages
            .iter()
            .filter(|entry| entry.group_id == group_id)
            .map(|entry| entry.value().clone())
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        messages.truncate(limit);
        messages
    }

    pub fn remove(&self, id: &str) -> Option<ChatMessage> {
        self.messages.remove(id).map(|(_, message)| message)
    }

    pub fn stats(&self) -> BoardStats {
        let mut groups: Vec<String> = self
            .messages
            .iter()
            .map(|entry| entry.group_id.clone())
            .collect();
        groups.sort();
        groups.dedup();

        BoardStats {
            groups: groups.len(),
            messages: self.messages.len(),
        }
    }
}
