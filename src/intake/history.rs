//! Append-only record of the conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<Utc>>,
}

/// Ordered conversation turns. Turns can be appended, never edited.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(TurnRole::User, content.into());
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(TurnRole::Assistant, content.into());
    }

    fn push(&mut self, role: TurnRole, content: String) {
        self.turns.push(Turn {
            role,
            content,
            at: Some(Utc::now()),
        });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The history as LLM chat messages, oldest first.
    pub fn to_chat_messages(&self) -> Vec<ChatMessage> {
        self.turns
            .iter()
            .map(|t| match t.role {
                TurnRole::User => ChatMessage::user(&t.content),
                TurnRole::Assistant => ChatMessage::assistant(&t.content),
            })
            .collect()
    }

    /// Customer turns longer than `min_chars`, used as summary highlights.
    pub fn customer_highlights(&self, min_chars: usize) -> Vec<&str> {
        self.turns
            .iter()
            .filter(|t| t.role == TurnRole::User && t.content.chars().count() > min_chars)
            .map(|t| t.content.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    #[test]
    fn appends_in_order() {
        let mut history = ConversationHistory::new();
        history.push_user("hi");
        history.push_assistant("hello! what's your name?");
        assert_eq!(history.len(), 2);
        assert_eq!(history.turns()[0].role, TurnRole::User);
        assert_eq!(history.turns()[1].content, "hello! what's your name?");
        assert!(history.turns()[0].at.is_some());
    }

    #[test]
    fn deserializes_turns_without_timestamps() {
        let history: ConversationHistory = serde_json::from_str(
            r#"[{"role":"user","content":"hi"},{"role":"assistant","content":"hey"}]"#,
        )
        .unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.turns()[1].at.is_none());
        let json = serde_json::to_string(&history).unwrap();
        assert!(!json.contains("\"at\""));
    }

    #[test]
    fn chat_messages_keep_roles() {
        let mut history = ConversationHistory::new();
        history.push_user("I want an SUV");
        history.push_assistant("Great choice.");
        let messages = history.to_chat_messages();
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
    }

    #[test]
    fn highlights_skip_short_and_assistant_turns() {
        let mut history = ConversationHistory::new();
        history.push_user("yes");
        history.push_assistant("Do you have a trade-in vehicle available?");
        history.push_user("I'd like a hybrid with heated seats");
        assert_eq!(
            history.customer_highlights(10),
            vec!["I'd like a hybrid with heated seats"]
        );
    }
}
