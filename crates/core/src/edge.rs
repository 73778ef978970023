use serde::{Deserialize, Serialize};

use crate::ids::{EdgeId, NodeId};
use crate::node::{LifecycleTag, NodeKind};

/// Named connection point on a node. Sources advertise what they produce
/// (`txt`, `img`, `mesh`, ...); targets name the input they accept
/// (`prompt`, `style`, `geometry`). Target handles with no rule of their
/// own pass validation unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Handle {
    Txt,
    Img,
    Sketch,
    Mesh,
    Prompt,
    Style,
    Geometry,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(
        rename = "sourceHandle",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub source_handle: Option<Handle>,
    #[serde(
        rename = "targetHandle",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub target_handle: Option<Handle>,
    #[serde(default)]
    pub style: EdgeStyle,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub animated: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub selected: bool,
    #[serde(
        rename = "lifecycleTag",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub lifecycle: Option<LifecycleTag>,
}

impl Edge {
    pub fn is_dirty(&self) -> bool {
        matches!(
            self.lifecycle,
            Some(LifecycleTag::Add) | Some(LifecycleTag::Update) | Some(LifecycleTag::Delete)
        )
    }
}

/// A pending connection between two handles, prior to validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub source: NodeId,
    pub target: NodeId,
    #[serde(
        rename = "sourceHandle",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub source_handle: Option<Handle>,
    #[serde(
        rename = "targetHandle",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub target_handle: Option<Handle>,
}

impl Connection {
    pub fn new(
        source: NodeId,
        source_handle: Handle,
        target: NodeId,
        target_handle: Handle,
    ) -> Self {
        Self {
            source,
            target,
            source_handle: Some(source_handle),
            target_handle: Some(target_handle),
        }
    }
}

/// Stroke color for an edge leaving a node of the given kind. The value is
/// a CSS variable reference resolved by the rendering layer.
pub fn stroke_for(kind: NodeKind) -> String {
    format!("var(--node-title-color-{})", kind.as_str())
}

impl From<&Connection> for Edge {
    fn from(conn: &Connection) -> Self {
        Self {
            id: EdgeId::new(),
            source: conn.source,
            target: conn.target,
            source_handle: conn.source_handle,
            target_handle: conn.target_handle,
            style: EdgeStyle::default(),
            animated: false,
            selected: false,
            lifecycle: None,
        }
    }
}

/// Matches the `(source, target, sourceHandle, targetHandle)` identity
/// tuple. No two edges may share it.
pub fn same_endpoints(edge: &Edge, conn: &Connection) -> bool {
    edge.source == conn.source
        && edge.target == conn.target
        && edge.source_handle == conn.source_handle
        && edge.target_handle == conn.target_handle
}
