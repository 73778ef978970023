use serde::{Deserialize, Serialize};

use flowboard_core::board::Board;
use flowboard_core::edge::Edge;
use flowboard_core::ids::{BoardId, NodeId, ProjectId, UserId};
use flowboard_core::node::{Node, NodeStatus};
use flowboard_core::traverse::PathStep;

use crate::error::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    pub is_owner: bool,
    pub is_editor: bool,
    pub is_viewer: bool,
}

impl Permissions {
    pub const OWNER: Self = Self {
        is_owner: true,
        is_editor: false,
        is_viewer: false,
    };
    pub const EDITOR: Self = Self {
        is_owner: false,
        is_editor: true,
        is_viewer: false,
    };
    pub const VIEWER: Self = Self {
        is_owner: false,
        is_editor: false,
        is_viewer: true,
    };

    /// Full graph edits allowed.
    pub fn can_edit(&self) -> bool {
        self.is_owner || self.is_editor
    }
}

/// One unit of an execution dispatch: a path node, its incoming edges, and
/// the re-run flag for the whole request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStep {
    pub node: Node,
    pub incoming: Vec<Edge>,
    #[serde(rename = "reRun")]
    pub re_run: bool,
}

impl RunStep {
    pub fn from_path(step: &PathStep, re_run: bool) -> Self {
        Self {
            node: step.node.clone(),
            incoming: step.incoming.clone(),
            re_run,
        }
    }
}

/// The server-side board store. Request/response bodies are plain JSON
/// mirroring the `Node`/`Edge`/`Board` shapes; the transport itself is out
/// of scope.
pub trait Persistence {
    fn get_moodboard(&mut self, id: BoardId) -> Result<Board, StorageError>;

    /// Authenticated edit path. Returns the server's canonical snapshot.
    fn edit_moodboard(
        &mut self,
        id: BoardId,
        title: &str,
        nodes: &[Node],
        edges: &[Edge],
    ) -> Result<Board, StorageError>;

    /// Unauthenticated comment path, open to any visitor. The client only
    /// routes anonymous comment nodes here.
    fn edit_moodboard_unsecure(&mut self, id: BoardId, nodes: &[Node])
        -> Result<(), StorageError>;

    fn create_moodboard(&mut self, project_id: ProjectId) -> Result<Board, StorageError>;

    fn delete_moodboard(&mut self, id: BoardId) -> Result<(), StorageError>;

    /// Dispatch a validated upstream path to the execution backend.
    fn run_path(
        &mut self,
        id: BoardId,
        path: &[RunStep],
    ) -> Result<Vec<(NodeId, NodeStatus)>, StorageError>;

    fn caption_node(&mut self, node: NodeId) -> Result<(), StorageError>;

    /// Upload an image for a node; returns the stored URL.
    fn upload_img(
        &mut self,
        board: BoardId,
        node: NodeId,
        bytes: &[u8],
    ) -> Result<String, StorageError>;

    fn delete_img(&mut self, board: BoardId, node: NodeId) -> Result<(), StorageError>;
}

pub trait PermissionService {
    fn get_permissions(&mut self, board: BoardId, user: UserId)
        -> Result<Permissions, StorageError>;
}

/// Durable last-known-persisted snapshot, one slot per board. Written at
/// save time, read at merge time, last writer wins. Never authoritative
/// beyond one session: a cleared or corrupt slot reads as absent.
pub trait SnapshotCache {
    fn get_snapshot(&self, id: BoardId) -> Result<Option<Board>, StorageError>;

    fn put_snapshot(&mut self, id: BoardId, board: &Board) -> Result<(), StorageError>;

    fn remove_snapshot(&mut self, id: BoardId) -> Result<(), StorageError>;

    fn clear(&mut self) -> Result<(), StorageError>;
}
