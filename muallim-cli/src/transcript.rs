//! Write-only JSONL transcript of one session, one file per run under
//! `~/.muallim/sessions/`. Logging is best effort: a logger that failed
//! to open silently drops records rather than disturbing the
//! conversation.

use std::fs::{self, File};
use std::io::{BufWriter, Write as _};
use std::path::PathBuf;

use chrono::{Local, Utc};
use muallim_core::{ConversationEntry, Role};
use serde_json::json;
use uuid::Uuid;

pub fn sessions_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".muallim").join("sessions")
}

pub struct Transcript {
    file: Option<BufWriter<File>>,
}

impl Transcript {
    pub fn open(session_id: Uuid, base_url: &str) -> Self {
        let dir = sessions_dir();
        let file = fs::create_dir_all(&dir)
            .and_then(|_| {
                let name = format!("{}.jsonl", Local::now().format("%Y%m%d_%H%M%S"));
                File::create(dir.join(name))
            })
            .map(BufWriter::new)
            .ok();
        let mut transcript = Self { file };
        transcript.write_json(&json!({
            "type": "session_start",
            "ts": Utc::now().to_rfc3339(),
            "session_id": session_id.to_string(),
            "backend": base_url,
        }));
        transcript
    }

    pub fn log_entry(&mut self, entry: &ConversationEntry) {
        self.write_json(&entry_record(entry));
    }

    pub fn log_review(&mut self, entry_id: Uuid, rating: u8, has_feedback: bool) {
        self.write_json(&review_record(entry_id, rating, has_feedback));
    }

    fn write_json(&mut self, value: &serde_json::Value) {
        if let Some(file) = &mut self.file {
            let _ = serde_json::to_writer(&mut *file, value);
            let _ = file.write_all(b"\n");
            let _ = file.flush();
        }
    }
}

/// One conversation entry as a transcript record. The image preview is
/// reduced to a flag; data URIs would bloat the file.
fn entry_record(entry: &ConversationEntry) -> serde_json::Value {
    let role = match entry.role {
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    json!({
        "type": "entry",
        "ts": entry.created_at.to_rfc3339(),
        "id": entry.id.to_string(),
        "role": role,
        "content": entry.content,
        "has_image": entry.attached_image.is_some(),
        "model_used": entry.model_used,
        "context_used": entry.context_used,
    })
}

fn review_record(entry_id: Uuid, rating: u8, has_feedback: bool) -> serde_json::Value {
    json!({
        "type": "review",
        "ts": Utc::now().to_rfc3339(),
        "entry_id": entry_id.to_string(),
        "rating": rating,
        "has_feedback": has_feedback,
    })
}

#[cfg(test)]
mod tests {
    use muallim_core::ConversationLog;

    use super::*;

    #[test]
    fn entry_records_flag_images_instead_of_embedding_them() {
        let mut log = ConversationLog::new();
        log.push_user(
            "سؤال".to_string(),
            Some("data:image/png;base64,AAAA".to_string()),
        );
        let record = entry_record(&log.entries()[0]);

        assert_eq!(record["type"], "entry");
        assert_eq!(record["role"], "user");
        assert_eq!(record["has_image"], true);
        assert!(record.get("attached_image").is_none());
    }

    #[test]
    fn review_records_carry_the_rating() {
        let id = Uuid::new_v4();
        let record = review_record(id, 4, false);
        assert_eq!(record["type"], "review");
        assert_eq!(record["entry_id"], id.to_string());
        assert_eq!(record["rating"], 4);
        assert_eq!(record["has_feedback"], false);
    }
}
