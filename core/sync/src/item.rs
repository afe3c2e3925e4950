//! Queued mutations awaiting delivery.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use offsync_common::{Error, ItemId};

use crate::remote::RemoteMethod;

/// Type of queued mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationKind {
    /// New resource, sent as POST.
    Create,
    /// Existing resource modified, sent as PUT.
    Update,
    /// Resource removed, sent as DELETE.
    Delete,
}

impl MutationKind {
    /// Remote method used to deliver this kind of mutation.
    pub fn method(self) -> RemoteMethod {
        match self {
            MutationKind::Create => RemoteMethod::Post,
            MutationKind::Update => RemoteMethod::Put,
            MutationKind::Delete => RemoteMethod::Delete,
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MutationKind::Create => "CREATE",
            MutationKind::Update => "UPDATE",
            MutationKind::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

impl FromStr for MutationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CREATE" => Ok(MutationKind::Create),
            "UPDATE" => Ok(MutationKind::Update),
            "DELETE" => Ok(MutationKind::Delete),
            other => Err(Error::InvalidInput(format!("Unknown mutation kind: {}", other))),
        }
    }
}

/// A mutation waiting in the sync queue.
///
/// Field aliases accept the layout written by earlier mobile releases
/// (`type`, `endpoint`, `data`, `timestamp`), so existing queues survive an
/// upgrade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncItem {
    /// Unique ID for this mutation.
    pub id: ItemId,
    /// Type of mutation.
    #[serde(alias = "type")]
    pub kind: MutationKind,
    /// Remote resource or endpoint the mutation applies to.
    #[serde(alias = "endpoint")]
    pub target: String,
    /// Request body; always absent for deletes.
    #[serde(default, alias = "data", skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// When the mutation was queued.
    #[serde(alias = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub enqueued_at: DateTime<Utc>,
    /// Number of failed delivery attempts so far.
    #[serde(default)]
    pub retry_count: u32,
}

impl SyncItem {
    /// Create a fresh item with a new ID and zero retries.
    ///
    /// A payload passed with [`MutationKind::Delete`] is discarded.
    pub fn new(kind: MutationKind, target: impl Into<String>, payload: Option<Value>) -> Self {
        let payload = match kind {
            MutationKind::Delete => None,
            _ => payload,
        };

        Self {
            id: ItemId::generate(),
            kind,
            target: target.into(),
            payload,
            // Stored with millisecond precision
            enqueued_at: Utc::now().trunc_subsecs(3),
            retry_count: 0,
        }
    }

    /// Record a failed delivery attempt and return the new retry count.
    pub fn record_failure(&mut self) -> u32 {
        self.retry_count = self.retry_count.saturating_add(1);
        self.retry_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_item() {
        let item = SyncItem::new(MutationKind::Create, "/items", Some(json!({"name": "a"})));
        assert_eq!(item.kind, MutationKind::Create);
        assert_eq!(item.target, "/items");
        assert_eq!(item.retry_count, 0);
        assert_eq!(item.payload, Some(json!({"name": "a"})));
    }

    #[test]
    fn test_delete_discards_payload() {
        let item = SyncItem::new(MutationKind::Delete, "/items/1", Some(json!({"x": 1})));
        assert!(item.payload.is_none());
    }

    #[test]
    fn test_record_failure() {
        let mut item = SyncItem::new(MutationKind::Update, "/items/1", None);
        assert_eq!(item.record_failure(), 1);
        assert_eq!(item.record_failure(), 2);
        assert_eq!(item.retry_count, 2);
    }

    #[test]
    fn test_kind_methods() {
        assert_eq!(MutationKind::Create.method(), RemoteMethod::Post);
        assert_eq!(MutationKind::Update.method(), RemoteMethod::Put);
        assert_eq!(MutationKind::Delete.method(), RemoteMethod::Delete);
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("create".parse::<MutationKind>().unwrap(), MutationKind::Create);
        assert_eq!("UPDATE".parse::<MutationKind>().unwrap(), MutationKind::Update);
        assert!("upsert".parse::<MutationKind>().is_err());
    }

    #[test]
    fn test_serialized_layout() {
        let item = SyncItem::new(MutationKind::Delete, "/items/1", None);
        let value = serde_json::to_value(&item).unwrap();

        assert_eq!(value["kind"], "DELETE");
        assert_eq!(value["target"], "/items/1");
        assert_eq!(value["retryCount"], 0);
        assert!(value["enqueuedAt"].is_i64());
        assert!(value.get("payload").is_none());
    }

    #[test]
    fn test_reads_legacy_layout() {
        let legacy = r#"{
            "id": "1700000000000_0.42",
            "type": "UPDATE",
            "endpoint": "/items/7",
            "data": {"name": "b"},
            "timestamp": 1700000000000,
            "retryCount": 2
        }"#;

        let item: SyncItem = serde_json::from_str(legacy).unwrap();
        assert_eq!(item.id.as_str(), "1700000000000_0.42");
        assert_eq!(item.kind, MutationKind::Update);
        assert_eq!(item.target, "/items/7");
        assert_eq!(item.payload, Some(json!({"name": "b"})));
        assert_eq!(item.enqueued_at.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(item.retry_count, 2);
    }
}
