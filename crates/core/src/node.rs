use serde::{Deserialize, Serialize};

use crate::ids::{MeshId, NodeId, PlaygroundId, UserId};

/// What a node produces and which handles it exposes. Determines the
/// validation rule applied during path checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Img,
    Sketch,
    Txt,
    Mesh,
    GeneratedImg,
    Comment,
    Segment,
    Playground,
    Remesh,
    Texture,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Img => "img",
            Self::Sketch => "sketch",
            Self::Txt => "txt",
            Self::Mesh => "mesh",
            Self::GeneratedImg => "generatedImg",
            Self::Comment => "comment",
            Self::Segment => "segment",
            Self::Playground => "playground",
            Self::Remesh => "remesh",
            Self::Texture => "texture",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeStatus {
    Static,
    Ready,
    Done,
    Error,
    Running,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeMode {
    Generate,
    Style,
    Replace,
    Inpaint,
    Recolor,
    RemoveBackground,
    ReplaceBackground,
    Structure,
}

/// Per-record marker relating it to the last synced snapshot. `Ignore` is
/// synced and clean; `Add`/`Update`/`Delete` are dirty, pending
/// persistence. A record fresh off a server merge carries no tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleTag {
    Add,
    Delete,
    Update,
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo_strength: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_strength: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshRef {
    pub id: MeshId,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaygroundRef {
    pub id: PlaygroundId,
    #[serde(default)]
    pub meshes: Vec<MeshRef>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeData {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playground: Option<PlaygroundRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: UserId,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub position: Position,
    pub data: NodeData,
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<UserRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<NodeMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<NodeParams>,
    #[serde(rename = "reRun", default, skip_serializing_if = "std::ops::Not::not")]
    pub re_run: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub selected: bool,
    #[serde(
        rename = "lifecycleTag",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub lifecycle: Option<LifecycleTag>,
}

impl Node {
    pub fn new(kind: NodeKind, position: Position, data: NodeData) -> Self {
        Self {
            id: NodeId::new(),
            kind,
            position,
            data,
            status: NodeStatus::Static,
            owner: None,
            mode: None,
            params: None,
            re_run: false,
            selected: false,
            lifecycle: None,
        }
    }

    /// Locally modified and not yet persisted.
    pub fn is_dirty(&self) -> bool {
        matches!(
            self.lifecycle,
            Some(LifecycleTag::Add) | Some(LifecycleTag::Update) | Some(LifecycleTag::Delete)
        )
    }

    pub fn is_anonymous(&self) -> bool {
        self.owner.is_none()
    }
}
