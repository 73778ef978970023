use serde::{Deserialize, Serialize};

use crate::ids::{EdgeId, NodeId};
use crate::node::Position;

/// Batched deltas emitted by a drag-and-drop graph surface. Position
/// deltas stage a move; removals are durable and trigger persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeChange {
    Position { id: NodeId, position: Position },
    Select { id: NodeId, selected: bool },
    Remove { id: NodeId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EdgeChange {
    Select { id: EdgeId, selected: bool },
    Remove { id: EdgeId },
}
