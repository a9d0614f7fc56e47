//! A single catalog entry.

use serde::{Deserialize, Deserializer, Serialize};

use crate::telegram::Audio;

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_PERFORMER: &str = "Unknown Artist";

/// One audio item retained in the monitored chat.
///
/// Inline channel catalogs written by older deployments only carry
/// `{title, performer, file_id}`; such records have no `message_id` and are
/// re-sent by file id instead of copied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongRecord {
    #[serde(default = "default_title", deserialize_with = "string_or_title")]
    pub title: String,
    #[serde(default = "default_performer", deserialize_with = "string_or_performer")]
    pub performer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_thread_id")]
    pub thread_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
}

fn default_title() -> String {
    UNKNOWN_TITLE.to_string()
}

fn default_performer() -> String {
    UNKNOWN_PERFORMER.to_string()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn string_or_title<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(non_blank(value).unwrap_or_else(default_title))
}

fn string_or_performer<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(non_blank(value).unwrap_or_else(default_performer))
}

/// Older catalogs stored the topic either as a number, a numeric string or a
/// display name. Names cannot be mapped back to a topic and become `None`.
fn deserialize_thread_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("thread_id out of range: {}", n))),
        Some(serde_json::Value::String(s)) => Ok(s.trim().parse().ok()),
        Some(other) => Err(D::Error::custom(format!(
            "expected number or string thread_id, got {}",
            other
        ))),
    }
}

impl SongRecord {
    pub fn new(
        title: impl Into<String>,
        performer: impl Into<String>,
        message_id: i64,
        thread_id: Option<i64>,
    ) -> Self {
        Self {
            title: title.into(),
            performer: performer.into(),
            message_id: Some(message_id),
            thread_id,
            file_id: None,
        }
    }

    /// Build a record from audio metadata, falling back to the file name and
    /// then to placeholders.
    pub fn from_audio(audio: &Audio, message_id: i64, thread_id: Option<i64>) -> Self {
        let title = non_blank(audio.title.clone())
            .or_else(|| non_blank(audio.file_name.as_deref().map(file_stem)))
            .unwrap_or_else(default_title);
        let performer = non_blank(audio.performer.clone()).unwrap_or_else(default_performer);

        Self {
            title,
            performer,
            message_id: Some(message_id),
            thread_id,
            file_id: Some(audio.file_id.clone()),
        }
    }

    /// "title - performer", the text users send back to request a song.
    pub fn label(&self) -> String {
        format!("{} - {}", self.title, self.performer)
    }

    /// Same song in the same topic, regardless of which message holds it.
    pub fn same_song(&self, other: &SongRecord) -> bool {
        self.title == other.title
            && self.performer == other.performer
            && self.thread_id == other.thread_id
    }
}

fn file_stem(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn audio(title: Option<&str>, performer: Option<&str>, file_name: Option<&str>) -> Audio {
        Audio {
            file_id: "FID".to_string(),
            title: title.map(String::from),
            performer: performer.map(String::from),
            file_name: file_name.map(String::from),
            duration: None,
            mime_type: None,
        }
    }

    #[test]
    fn missing_keys_get_placeholders() {
        let record: SongRecord = serde_json::from_value(json!({ "message_id": 4 })).unwrap();
        assert_eq!(record.title, UNKNOWN_TITLE);
        assert_eq!(record.performer, UNKNOWN_PERFORMER);
        assert_eq!(record.thread_id, None);
    }

    #[test]
    fn file_only_inline_rows_load() {
        let record: SongRecord = serde_json::from_value(
            json!({ "title": "Song", "performer": "Band", "file_id": "F1" }),
        )
        .unwrap();
        assert_eq!(record.message_id, None);
        assert_eq!(record.file_id.as_deref(), Some("F1"));

        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("message_id").is_none());
        assert_eq!(value["file_id"], "F1");
    }

    #[test]
    fn null_title_gets_placeholder() {
        let record: SongRecord =
            serde_json::from_value(json!({ "title": null, "performer": "A", "message_id": 1 }))
                .unwrap();
        assert_eq!(record.title, UNKNOWN_TITLE);
        assert_eq!(record.performer, "A");
    }

    #[test]
    fn thread_id_accepts_numbers_and_numeric_strings() {
        let numeric: SongRecord =
            serde_json::from_value(json!({ "message_id": 1, "thread_id": 12 })).unwrap();
        let stringly: SongRecord =
            serde_json::from_value(json!({ "message_id": 1, "thread_id": "12" })).unwrap();
        let named: SongRecord =
            serde_json::from_value(json!({ "message_id": 1, "thread_id": "Pop" })).unwrap();

        assert_eq!(numeric.thread_id, Some(12));
        assert_eq!(stringly.thread_id, Some(12));
        assert_eq!(named.thread_id, None);
    }

    #[test]
    fn thread_id_rejects_structures() {
        let result =
            serde_json::from_value::<SongRecord>(json!({ "message_id": 1, "thread_id": [1] }));
        assert!(result.is_err());
    }

    #[test]
    fn file_id_is_omitted_when_absent() {
        let value = serde_json::to_value(SongRecord::new("T", "P", 1, Some(2))).unwrap();
        assert!(value.get("file_id").is_none());
        assert_eq!(value["thread_id"], 2);
    }

    #[test]
    fn from_audio_prefers_metadata_then_file_name() {
        let full = SongRecord::from_audio(&audio(Some("Song"), Some("Band"), None), 5, Some(1));
        assert_eq!(full.label(), "Song - Band");
        assert_eq!(full.file_id.as_deref(), Some("FID"));

        let named = SongRecord::from_audio(&audio(None, None, Some("track01.mp3")), 5, None);
        assert_eq!(named.title, "track01");
        assert_eq!(named.performer, UNKNOWN_PERFORMER);

        let bare = SongRecord::from_audio(&audio(Some("  "), None, None), 5, None);
        assert_eq!(bare.title, UNKNOWN_TITLE);
    }

    #[test]
    fn same_song_ignores_message_id() {
        let a = SongRecord::new("T", "P", 1, Some(2));
        let b = SongRecord::new("T", "P", 9, Some(2));
        let c = SongRecord::new("T", "P", 1, None);
        assert!(a.same_song(&b));
        assert!(!a.same_song(&c));
    }
}
