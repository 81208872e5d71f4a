//! Wire shapes of the backend's JSON, decoded at the client boundary.

use chrono::{DateTime, TimeZone, Utc};
use nt_core::types::null_as_default;
use nt_core::{ArticleDetail, ChatMessage, ChatReply, ChatRole, Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub(crate) struct RatingBody {
    pub rating: u8,
}

#[derive(Serialize)]
pub(crate) struct ReadingTimeBody {
    pub seconds: u64,
}

#[derive(Serialize)]
pub(crate) struct CommentsBody<'a> {
    pub comments: &'a str,
}

#[derive(Serialize)]
pub(crate) struct TagsBody<'a> {
    pub tags: &'a [String],
}

#[derive(Serialize)]
pub(crate) struct ChatBody<'a> {
    pub question: &'a str,
    pub model: &'a str,
}

#[derive(Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct RatingAck {
    pub rating: u8,
}

#[derive(Deserialize)]
pub(crate) struct CommentsAck {
    #[serde(default, deserialize_with = "null_as_default")]
    pub comments: String,
}

#[derive(Deserialize)]
pub(crate) struct TagsAck {
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

#[derive(Deserialize)]
pub(crate) struct TagsResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

#[derive(Deserialize)]
pub(crate) struct UnprocessedResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub unpretreat_articles: Vec<ArticleDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum WireId {
    Text(String),
    Number(u64),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum WireTimestamp {
    Millis(f64),
    Text(String),
}

impl WireTimestamp {
    /// Millisecond numbers, RFC 3339 strings, numeric strings, and the
    /// `{"$date": {"$numberLong": "..."}}` blobs the server stores.
    fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            WireTimestamp::Millis(ms) => Utc.timestamp_millis_opt(*ms as i64).single(),
            WireTimestamp::Text(text) => {
                if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
                    return Some(parsed.with_timezone(&Utc));
                }
                if let Ok(ms) = text.trim().parse::<f64>() {
                    return Utc.timestamp_millis_opt(ms as i64).single();
                }
                let blob: serde_json::Value = serde_json::from_str(text).ok()?;
                let ms = blob.pointer("/$date/$numberLong")?.as_str()?.parse::<i64>().ok()?;
                Utc.timestamp_millis_opt(ms).single()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryEntry {
    #[serde(default)]
    pub id: Option<WireId>,
    #[serde(rename = "type")]
    pub role: ChatRole,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<WireTimestamp>,
}

impl From<HistoryEntry> for ChatMessage {
    fn from(entry: HistoryEntry) -> Self {
        let mut message = ChatMessage::new(entry.role, entry.content);
        match entry.id {
            Some(WireId::Text(id)) if !id.is_empty() => message.id = id,
            Some(WireId::Number(id)) => message.id = id.to_string(),
            _ => {}
        }
        if let Some(timestamp) = entry.timestamp.as_ref().and_then(WireTimestamp::to_datetime) {
            message.timestamp = timestamp;
        }
        message
    }
}

#[derive(Deserialize)]
pub(crate) struct ChatHistoryResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub conversation: Option<Vec<HistoryEntry>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ChatHistoryResponse {
    pub fn into_messages(self, status: u16) -> Result<Vec<ChatMessage>> {
        if !self.success {
            return Err(Error::Api {
                status,
                message: self.error.unwrap_or_else(|| "chat history unavailable".to_string()),
            });
        }
        Ok(self
            .conversation
            .unwrap_or_default()
            .into_iter()
            .map(ChatMessage::from)
            .collect())
    }
}

#[derive(Deserialize)]
pub(crate) struct ChatSendResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub model_used: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ChatSendResponse {
    pub fn into_reply(self) -> Result<ChatReply> {
        if self.success {
            let answer = self
                .answer
                .ok_or_else(|| Error::Decode("chat reply marked successful but has no answer".to_string()))?;
            Ok(ChatReply::Answered { answer, model_used: self.model_used })
        } else {
            Ok(ChatReply::Failed {
                error: self.error.unwrap_or_else(|| "unknown error".to_string()),
            })
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct ClearResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_history_entry_timestamps() {
        let entries: Vec<HistoryEntry> = serde_json::from_value(json!([
            {"id": "1", "type": "user", "content": "Q", "timestamp": 1717243200000.0},
            {"id": 2, "type": "ai", "content": "A", "timestamp": "2024-06-01T12:00:00Z"},
            {"id": "3", "type": "ai", "content": "B",
             "timestamp": "{\"$date\": {\"$numberLong\": \"1717243200000\"}}"},
            {"type": "user", "content": "C", "timestamp": "garbage"}
        ]))
        .unwrap();

        let messages: Vec<ChatMessage> = entries.into_iter().map(ChatMessage::from).collect();
        let expected = Utc.timestamp_millis_opt(1_717_243_200_000).unwrap();

        assert_eq!(messages[0].id, "1");
        assert_eq!(messages[0].timestamp, expected);
        assert_eq!(messages[1].id, "2");
        assert_eq!(messages[1].timestamp, expected);
        assert_eq!(messages[2].timestamp, expected);
        assert_eq!(messages[3].role, ChatRole::User);
        assert!(!messages[3].id.is_empty());
    }

    #[test]
    fn test_history_failure_is_an_error() {
        let response: ChatHistoryResponse =
            serde_json::from_value(json!({"error": "boom"})).unwrap();
        let err = response.into_messages(500).unwrap_err();
        assert_eq!(err.to_string(), "API error (500): boom");
    }

    #[test]
    fn test_send_response_into_reply() {
        let ok: ChatSendResponse = serde_json::from_value(json!({
            "success": true, "answer": "42", "model_used": "mistral small", "question": "?"
        }))
        .unwrap();
        assert_eq!(
            ok.into_reply().unwrap(),
            ChatReply::Answered { answer: "42".to_string(), model_used: Some("mistral small".to_string()) }
        );

        let failed: ChatSendResponse =
            serde_json::from_value(json!({"success": false, "error": "quota exceeded"})).unwrap();
        assert_eq!(
            failed.into_reply().unwrap(),
            ChatReply::Failed { error: "quota exceeded".to_string() }
        );

        let broken: ChatSendResponse = serde_json::from_value(json!({"success": true})).unwrap();
        assert!(matches!(broken.into_reply(), Err(Error::Decode(_))));
    }
}
