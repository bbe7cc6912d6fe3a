//! Typed view of the upstream events feed.
//!
//! The upstream provider owns this shape: a list of centers, each holding
//! groups of events. Every nested field is optional so that a sparse or
//! partially broken entry degrades to defaults instead of failing the
//! whole payload. Only the top level (the `data` array itself) is strict.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Failed to read payload file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid payload JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// The `data` value of a feed response: centers in upstream order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct FeedPayload {
    pub centers: Vec<Center>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Center {
    #[serde(default, deserialize_with = "lenient_text")]
    pub center_city: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub center_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub events_at_center: Option<Vec<EventGroup>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EventGroup {
    #[serde(default, deserialize_with = "lenient_list")]
    pub events_list: Option<Vec<Event>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Event {
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub short_description: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub small_image_url: Option<String>,
}

/// Response envelope: `{"data": [...]}`.
#[derive(Deserialize)]
struct Envelope {
    data: FeedPayload,
}

impl FeedPayload {
    pub fn new(centers: Vec<Center>) -> Self {
        Self { centers }
    }

    /// Parses a bare centers array (the shape of a fallback data file).
    pub fn from_json_str(json: &str) -> Result<Self, PayloadError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a fallback data file holding a bare centers array.
    pub fn from_file(path: &Path) -> Result<Self, PayloadError> {
        let content = std::fs::read_to_string(path)?;
        let payload = Self::from_json_str(&content)?;
        tracing::debug!(
            path = %path.display(),
            centers = payload.centers.len(),
            "Loaded fallback payload"
        );
        Ok(payload)
    }

    /// Extracts the payload from a response body shaped `{"data": [...]}`.
    pub fn from_response_body(body: &str) -> Result<Self, PayloadError> {
        let envelope: Envelope = serde_json::from_str(body)?;
        Ok(envelope.data)
    }
}

impl Center {
    pub fn city(&self) -> &str {
        self.center_city.as_deref().unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.center_name.as_deref().unwrap_or_default()
    }

    pub fn groups(&self) -> &[EventGroup] {
        self.events_at_center.as_deref().unwrap_or_default()
    }
}

impl EventGroup {
    pub fn events(&self) -> &[Event] {
        self.events_list.as_deref().unwrap_or_default()
    }
}

/// Accepts strings and numbers; empty strings and every other JSON type
/// count as absent.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Accepts arrays, dropping elements that do not match `T`; anything else
/// counts as absent.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(values) => Some(
            values
                .into_iter()
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect(),
        ),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_response_body_requires_data_field() {
        let err = FeedPayload::from_response_body(r#"{"items": []}"#).unwrap_err();
        assert!(matches!(err, PayloadError::Json(_)));
        assert!(err.to_string().contains("data"));
    }

    #[test]
    fn test_response_body_rejects_non_array_data() {
        assert!(FeedPayload::from_response_body(r#"{"data": "nope"}"#).is_err());
        assert!(FeedPayload::from_response_body(r#"{"data": null}"#).is_err());
    }

    #[test]
    fn test_response_body_rejects_invalid_json() {
        assert!(FeedPayload::from_response_body("<html>").is_err());
    }

    #[test]
    fn test_empty_data_array() {
        let payload = FeedPayload::from_response_body(r#"{"data": []}"#).unwrap();
        assert!(payload.centers.is_empty());
    }

    #[test]
    fn test_missing_nested_fields_default() {
        let payload = FeedPayload::from_json_str(r#"[{}]"#).unwrap();
        let center = &payload.centers[0];
        assert_eq!(center.city(), "");
        assert_eq!(center.name(), "");
        assert!(center.groups().is_empty());
    }

    #[test]
    fn test_null_collections_are_empty() {
        let json = r#"[{"center_city": "X", "events_at_center": null},
                       {"events_at_center": [{"events_list": null}]}]"#;
        let payload = FeedPayload::from_json_str(json).unwrap();
        assert!(payload.centers[0].groups().is_empty());
        assert!(payload.centers[1].groups()[0].events().is_empty());
    }

    #[test]
    fn test_text_fields_are_lenient() {
        let json = r#"[{"events_at_center": [{"events_list": [
            {"title": 42, "short_description": "", "small_image_url": {"nested": true}}
        ]}]}]"#;
        let payload = FeedPayload::from_json_str(json).unwrap();
        let event = &payload.centers[0].groups()[0].events()[0];
        assert_eq!(event.title.as_deref(), Some("42"));
        assert_eq!(event.short_description, None);
        assert_eq!(event.small_image_url, None);
    }

    #[test]
    fn test_malformed_nested_entries_are_skipped() {
        let json = r#"[{"events_at_center": [
            "not a group",
            {"events_list": [7, {"title": "Kept"}]}
        ]}]"#;
        let payload = FeedPayload::from_json_str(json).unwrap();
        let groups = payload.centers[0].groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].events().len(), 1);
        assert_eq!(groups[0].events()[0].title.as_deref(), Some("Kept"));
    }

    #[test]
    fn test_from_file_missing_is_io_error() {
        let path = Path::new("/tmp/eventpoll_test_missing_fallback.json");
        assert!(matches!(
            FeedPayload::from_file(path),
            Err(PayloadError::Io(_))
        ));
    }

    #[test]
    fn test_from_file_reads_bare_array() {
        let dir = std::env::temp_dir().join("eventpoll_payload_test_file");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("data.json");
        std::fs::write(&path, r#"[{"center_city": "Oslo", "center_name": "Hall"}]"#).unwrap();

        let payload = FeedPayload::from_file(&path).unwrap();
        assert_eq!(payload.centers.len(), 1);
        assert_eq!(payload.centers[0].city(), "Oslo");
        assert_eq!(payload.centers[0].name(), "Hall");

        std::fs::remove_dir_all(&dir).ok();
    }
}
