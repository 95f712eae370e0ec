//! The conversation transcript: an append-only list of user and assistant
//! entries. Entries are never edited or removed once appended; `reset`
//! drops the whole list when the user starts a fresh session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One rendered turn of the conversation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    /// Data URI preview of the image sent with a user entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attached_image: Option<String>,
    /// Model reported by the service for an assistant entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    /// Whether the service answered from curriculum context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_used: Option<bool>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct ConversationLog {
    entries: Vec<ConversationEntry>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&ConversationEntry> {
        self.entries.last()
    }

    pub fn get(&self, id: Uuid) -> Option<&ConversationEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push_user(&mut self, content: String, attached_image: Option<String>) -> Uuid {
        self.append(Role::User, content, attached_image, None, None)
    }

    pub fn push_assistant(
        &mut self,
        content: String,
        model_used: Option<String>,
        context_used: Option<bool>,
    ) -> Uuid {
        self.append(Role::Assistant, content, None, model_used, context_used)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn append(
        &mut self,
        role: Role,
        content: String,
        attached_image: Option<String>,
        model_used: Option<String>,
        context_used: Option<bool>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let created_at = clamp_monotonic(self.entries.last().map(|e| e.created_at), Utc::now());
        self.entries.push(ConversationEntry {
            id,
            role,
            content,
            attached_image,
            model_used,
            context_used,
            created_at,
        });
        id
    }
}

/// Timestamps never run backwards within one log, even if the wall clock
/// does.
fn clamp_monotonic(prev: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match prev {
        Some(prev) if prev > now => prev,
        _ => now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn entries_append_in_order() {
        let mut log = ConversationLog::new();
        let user = log.push_user("سؤال".into(), None);
        let assistant = log.push_assistant("جواب".into(), Some("gpt-4o".into()), Some(true));

        assert_eq!(log.len(), 2);
        assert_eq!(log.entries()[0].id, user);
        assert_eq!(log.entries()[0].role, Role::User);
        assert_eq!(log.entries()[1].id, assistant);
        assert_eq!(log.entries()[1].role, Role::Assistant);
        assert_eq!(log.entries()[1].model_used.as_deref(), Some("gpt-4o"));
        assert_eq!(log.last().map(|e| e.id), Some(assistant));
    }

    #[test]
    fn get_finds_entries_by_id() {
        let mut log = ConversationLog::new();
        let id = log.push_assistant("جواب".into(), None, None);
        assert_eq!(log.get(id).map(|e| e.content.as_str()), Some("جواب"));
        assert!(log.get(Uuid::new_v4()).is_none());
    }

    #[test]
    fn timestamps_never_decrease() {
        let mut log = ConversationLog::new();
        for i in 0..20 {
            log.push_user(format!("q{i}"), None);
        }
        let stamps: Vec<_> = log.entries().iter().map(|e| e.created_at).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn clamp_holds_against_clock_skew() {
        let now = Utc::now();
        let future = now + TimeDelta::seconds(30);
        assert_eq!(clamp_monotonic(Some(future), now), future);
        assert_eq!(clamp_monotonic(Some(now), future), future);
        assert_eq!(clamp_monotonic(None, now), now);
    }

    #[test]
    fn clear_empties_the_log() {
        let mut log = ConversationLog::new();
        log.push_user("سؤال".into(), None);
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn image_preview_survives_serialization() {
        let mut log = ConversationLog::new();
        log.push_user("ما هذا؟".into(), Some("data:image/png;base64,AAAA".into()));
        let json = serde_json::to_value(&log.entries()[0]).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["attached_image"], "data:image/png;base64,AAAA");
        // Absent options are skipped entirely.
        assert!(json.get("model_used").is_none());
    }
}
