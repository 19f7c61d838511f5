//! Request and response payloads exchanged with workers.

use serde::{Deserialize, Serialize};

use crate::config::LogLevel;
use crate::workers::worker::WorkerId;

/// Settings that can be changed on a running worker.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkerSettings {
    /// New log level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,
    /// New set of log tags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_tags: Option<Vec<String>>,
}

/// Options for a new room.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoomOptions {
    /// Media codecs the room supports, in worker-specific form.
    pub media_codecs: Vec<serde_json::Value>,
    /// Opaque application data attached to the room.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_data: Option<serde_json::Value>,
}

/// A room hosted by one worker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Room id.
    pub id: String,
    /// Worker hosting the room.
    pub worker: WorkerId,
}

impl Room {
    /// Creates a room with a fresh random id hosted by `worker`.
    pub fn new(worker: WorkerId) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            worker,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_skip_unset_fields() {
        let settings = WorkerSettings {
            log_level: Some(LogLevel::Warn),
            log_tags: None,
        };
        assert_eq!(
            serde_json::to_string(&settings).unwrap(),
            r#"{"logLevel":"warn"}"#
        );
    }

    #[test]
    fn room_ids_are_unique() {
        let worker = WorkerId::new("p", 1);
        assert_ne!(Room::new(worker.clone()).id, Room::new(worker).id);
    }
}
