//! Queue item entities
//!
//! A queue item is one crawl target plus its fetch outcome. The store stamps
//! `queueName`, `status` and `created` on insert; everything else belongs to
//! the crawler.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::document::{Document, PUBLIC_ID_FIELD, STORAGE_ID_FIELD};
use super::errors::QueueError;

/// Status stamped on every freshly added item.
pub const STATUS_QUEUED: &str = "queued";

/// Fields owned by the store. Caller input carrying them is overwritten.
pub const STORE_MANAGED_FIELDS: [&str; 5] =
    [PUBLIC_ID_FIELD, STORAGE_ID_FIELD, "queueName", "status", "created"];

/// Store-assigned identifier of a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ItemId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// A queue item as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: ItemId,
    pub url: String,
    pub queue_name: String,
    pub status: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub fetched: bool,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub state_data: Document,
    /// Caller fields the store does not interpret.
    #[serde(flatten)]
    pub extra: Document,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Document, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Document>::deserialize(deserializer)?.unwrap_or_default())
}

impl QueueItem {
    pub fn is_queued(&self) -> bool {
        self.status == STATUS_QUEUED
    }

    /// Numeric value of a fetch statistic, if recorded.
    pub fn statistic(&self, statistic: Statistic) -> Option<f64> {
        self.state_data.get(statistic.as_str()).and_then(serde_json::Value::as_f64)
    }
}

/// A queue item as built by the crawler before insertion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQueueItem {
    pub url: String,
    #[serde(default)]
    pub fetched: bool,
    #[serde(default)]
    pub state_data: Document,
    #[serde(flatten)]
    pub extra: Document,
}

impl NewQueueItem {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_state(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.state_data.insert(key.into(), value.into());
        self
    }

    /// Serialize into a document stamped for `queue_name`.
    pub fn into_document(self, queue_name: &str, created: DateTime<Utc>) -> Result<Document, QueueError> {
        let mut document = match serde_json::to_value(self)? {
            serde_json::Value::Object(document) => document,
            other => {
                return Err(QueueError::invalid_argument(format!(
                    "queue item must serialize to an object, got {other}"
                )));
            }
        };
        for field in STORE_MANAGED_FIELDS {
            document.remove(field);
        }
        document.insert("queueName".into(), queue_name.into());
        document.insert("status".into(), STATUS_QUEUED.into());
        document.insert("created".into(), created.timestamp_millis().into());
        Ok(document)
    }
}

/// Reject `$set` paths that would leave a stored item unreadable as a
/// [`QueueItem`]: `stateData` stays an object, `status` and `url` stay
/// strings and `fetched` stays a boolean.
pub fn check_patch_paths(set: &[(String, serde_json::Value)]) -> Result<(), QueueError> {
    for (path, value) in set {
        let (root, nested) = match path.split_once('.') {
            Some((root, _)) => (root, true),
            None => (path.as_str(), false),
        };
        let expected = match root {
            "stateData" if nested || value.is_object() => continue,
            "stateData" => "an object",
            "status" | "url" if !nested && value.is_string() => continue,
            "status" | "url" => "a string",
            "fetched" if !nested && value.is_boolean() => continue,
            "fetched" => "a boolean",
            _ => continue,
        };
        let found = if nested { format!("a value at `{path}`") } else { value.to_string() };
        return Err(QueueError::invalid_argument(format!("`{root}` must be {expected}, got {found}")));
    }
    Ok(())
}

/// Fetch statistics that may be aggregated with `max`/`min`/`avg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statistic {
    ActualDataSize,
    ContentLength,
    DownloadTime,
    RequestLatency,
    RequestTime,
}

impl Statistic {
    pub const ALL: [Self; 5] = [
        Self::ActualDataSize,
        Self::ContentLength,
        Self::DownloadTime,
        Self::RequestLatency,
        Self::RequestTime,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ActualDataSize => "actualDataSize",
            Self::ContentLength => "contentLength",
            Self::DownloadTime => "downloadTime",
            Self::RequestLatency => "requestLatency",
            Self::RequestTime => "requestTime",
        }
    }

    /// Dotted path of the statistic inside a stored item.
    pub fn field_path(self) -> String {
        format!("stateData.{}", self.as_str())
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Statistic {
    type Err = QueueError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|statistic| statistic.as_str() == name)
            .ok_or_else(|| QueueError::invalid_argument(format!("Invalid statistic: {name}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ErrorKind;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn statistic_names_round_trip() {
        for statistic in Statistic::ALL {
            assert_eq!(statistic.as_str().parse::<Statistic>().unwrap(), statistic);
        }
        assert_eq!(Statistic::ContentLength.field_path(), "stateData.contentLength");
    }

    #[test]
    fn unknown_statistic_is_invalid_argument() {
        let error = "fetchCount".parse::<Statistic>().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidArgument);
        assert!("ContentLength".parse::<Statistic>().is_err());
    }

    #[test]
    fn into_document_stamps_store_fields() {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let item = NewQueueItem::new("http://example.com/foobar")
            .with_field("depth", 1)
            .with_field("status", "created")
            .with_field("id", "caller-id")
            .with_state("headers", json!({"server": "nginx"}));

        let document = item.into_document("example", created).unwrap();

        assert_eq!(document["url"], json!("http://example.com/foobar"));
        assert_eq!(document["queueName"], json!("example"));
        assert_eq!(document["status"], json!("queued"));
        assert_eq!(document["created"], json!(created.timestamp_millis()));
        assert_eq!(document["depth"], json!(1));
        assert_eq!(document["fetched"], json!(false));
        assert_eq!(document["stateData"]["headers"]["server"], json!("nginx"));
        assert!(!document.contains_key("id"));
        assert!(!document.contains_key("_id"));
    }

    #[test]
    fn patch_paths_keep_typed_fields_readable() {
        let ok = [
            ("status".to_string(), json!("downloaded")),
            ("fetched".to_string(), json!(true)),
            ("stateData.headers.server".to_string(), json!("nginx")),
            ("depth".to_string(), json!(null)),
        ];
        assert!(check_patch_paths(&ok).is_ok());

        for bad in [
            ("stateData", json!(null)),
            ("stateData", json!([1])),
            ("status", json!(3)),
            ("url", json!(null)),
            ("fetched", json!(1)),
            ("status.code", json!(200)),
        ] {
            let error = check_patch_paths(&[(bad.0.to_string(), bad.1.clone())]).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::InvalidArgument, "{bad:?}");
        }
        assert_eq!(
            check_patch_paths(&[("status".to_string(), json!(3))]).unwrap_err().to_string(),
            "Invalid argument: `status` must be a string, got 3"
        );
    }

    #[test]
    fn queue_item_reads_normalized_documents() {
        let item: QueueItem = serde_json::from_value(json!({
            "id": 4,
            "url": "http://example.com/blog",
            "queueName": "example",
            "status": "queued",
            "created": 1_714_564_800_000_i64,
            "depth": 2,
            "stateData": {"contentLength": 512}
        }))
        .unwrap();

        assert_eq!(item.id, ItemId(4));
        assert!(item.is_queued());
        assert!(!item.fetched);
        assert_eq!(item.statistic(Statistic::ContentLength), Some(512.0));
        assert_eq!(item.statistic(Statistic::DownloadTime), None);
        assert_eq!(item.extra["depth"], json!(2));

        let cleared: QueueItem = serde_json::from_value(json!({
            "id": 5, "url": "u", "queueName": "example", "status": "queued",
            "created": 0, "stateData": null
        }))
        .unwrap();
        assert!(cleared.state_data.is_empty());
    }
}
