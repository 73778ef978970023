//! Realtime message shapes.
//!
//! One socket connection per authenticated user multiplexes events for
//! every board that user can edit; payloads are plain JSON mirroring the
//! node/board record shapes.

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::error::CoreError;
use crate::ids::NodeId;
use crate::node::{Node, NodeData, NodeStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SocketEvent {
    #[serde(rename = "nodeUpdate")]
    NodeUpdate {
        nid: NodeId,
        status: NodeStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<NodeData>,
    },
    #[serde(rename = "moodboardUpdate")]
    MoodboardUpdate { data: Board },
    #[serde(rename = "nodeAdd")]
    NodeAdd { data: Node },
}

impl SocketEvent {
    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self, CoreError> {
        serde_json::from_str(text).map_err(|e| CoreError::Serialization(e.to_string()))
    }
}

/// Keep-alive frame sent periodically while the connection is open.
pub const HEARTBEAT: &str = r#"{"signal":"heartbeat"}"#;
