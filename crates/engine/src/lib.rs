pub mod error;
pub mod history;
pub mod merge;
pub mod path;
pub mod save;
pub mod sync;

pub use error::EngineError;
pub use history::{History, Snapshot, HISTORY_EDGE_KEYS, HISTORY_NODE_KEYS};
pub use sync::{SocketSession, SocketTransport, HEARTBEAT_INTERVAL_SECS};

use std::collections::BTreeMap;

use tracing::debug;

use flowboard_core::change::{EdgeChange, NodeChange};
use flowboard_core::connect::is_valid_connection;
use flowboard_core::diff::{
    node_by_id, update_edges, update_nodes, EdgePatch, EdgeSelector, EdgeStylePatch, NodeDataPatch,
    NodePatch, NodeSelector, SYNC_EDGE_KEYS,
};
use flowboard_core::edge::{stroke_for, Connection, Edge};
use flowboard_core::ids::{BoardId, NodeId};
use flowboard_core::node::{
    LifecycleTag, MeshRef, Node, NodeKind, NodeMode, NodeStatus, PlaygroundRef, UserRef,
};
use flowboard_storage::{
    Permissions, PermissionService, Persistence, SnapshotCache, SqliteCache,
};

const DEFAULT_UNDO_DEPTH: usize = 100;

/// Human-readable progress indicator shown while a call is outstanding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Loading {
    pub on: bool,
    pub progress: Option<String>,
}

/// Requested change to a node's image slot.
#[derive(Debug, Clone)]
pub enum ImagePatch {
    /// Raw bytes to push through the upload endpoint.
    Upload(Vec<u8>),
    /// An already-hosted URL.
    Url(String),
    /// Remove the stored image.
    Clear,
}

/// Partial node-data edit as the UI hands it over. Image changes are
/// explicit so an update that says nothing about the image leaves it
/// alone.
#[derive(Debug, Clone, Default)]
pub struct DataUpdate {
    pub title: Option<String>,
    pub src: Option<String>,
    pub image: Option<ImagePatch>,
    pub playground: Option<Option<PlaygroundRef>>,
}

/// The moodboard state container: live graph arrays, dirty tracking,
/// reconciliation against the persisted snapshot, undo history, and the
/// realtime merge path. Owned by the UI shell and shared by reference.
pub struct Engine<S: Persistence + PermissionService> {
    pub(crate) api: S,
    pub(crate) cache: SqliteCache,
    pub(crate) history: History,

    pub(crate) board_id: BoardId,
    pub(crate) user: UserRef,

    pub(crate) title: String,
    pub(crate) owner: Option<UserRef>,

    pub(crate) nodes: Vec<Node>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) node_status: BTreeMap<NodeId, NodeStatus>,
    pub(crate) selected: Vec<NodeId>,

    pub(crate) perms: Option<Permissions>,
    pub(crate) loading: Loading,
    pub(crate) mounted: bool,
}

impl<S: Persistence + PermissionService> Engine<S> {
    pub fn new(api: S, cache: SqliteCache, board_id: BoardId, user: UserRef) -> Self {
        Self {
            api,
            cache,
            history: History::new(DEFAULT_UNDO_DEPTH),
            board_id,
            user,
            title: String::new(),
            owner: None,
            nodes: Vec::new(),
            edges: Vec::new(),
            node_status: BTreeMap::new(),
            selected: Vec::new(),
            perms: None,
            loading: Loading::default(),
            mounted: true,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn board_id(&self) -> BoardId {
        self.board_id
    }

    pub fn user(&self) -> &UserRef {
        &self.user
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn owner(&self) -> Option<&UserRef> {
        self.owner.as_ref()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_status(&self, id: NodeId) -> Option<NodeStatus> {
        self.node_status.get(&id).copied()
    }

    pub fn selected(&self) -> &[NodeId] {
        &self.selected
    }

    pub fn perms(&self) -> Option<Permissions> {
        self.perms
    }

    pub fn loading(&self) -> &Loading {
        &self.loading
    }

    pub fn can_edit(&self) -> bool {
        self.perms.is_some_and(|p| p.can_edit())
    }

    pub(crate) fn set_loading(&mut self, progress: &str) {
        self.loading = Loading {
            on: true,
            progress: Some(progress.to_string()),
        };
    }

    pub(crate) fn clear_loading(&mut self) {
        self.loading = Loading::default();
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Fetch the board from the server and merge it in. The cached
    /// snapshot is evicted first so the whole payload reads as fresh.
    pub fn load(&mut self) -> Result<(), EngineError> {
        self.cache.remove_snapshot(self.board_id)?;
        let board = self.api.get_moodboard(self.board_id)?;
        self.init(&board);
        Ok(())
    }

    pub fn init_perms(&mut self) -> Result<(), EngineError> {
        self.perms = Some(self.api.get_permissions(self.board_id, self.user.id)?);
        Ok(())
    }

    /// Stop reacting to asynchronous resolutions; the container is gone
    /// from the shell's point of view.
    pub fn unmount(&mut self) {
        debug!(board = %self.board_id, "unmounting");
        self.mounted = false;
    }

    // ========================================================================
    // History plumbing
    // ========================================================================

    pub(crate) fn checkpoint(&self) -> Snapshot {
        Snapshot {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }

    pub(crate) fn commit(&mut self, before: Snapshot) {
        self.history.record(before, &self.nodes, &self.edges);
    }

    pub fn undo(&mut self) {
        let current = self.checkpoint();
        if let Some(previous) = self.history.undo(current) {
            self.nodes = previous.nodes;
            self.edges = previous.edges;
        }
    }

    pub fn redo(&mut self) {
        let current = self.checkpoint();
        if let Some(next) = self.history.redo(current) {
            self.nodes = next.nodes;
            self.edges = next.edges;
        }
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn undo_depth(&self) -> usize {
        self.history.undo_depth()
    }

    pub fn redo_depth(&self) -> usize {
        self.history.redo_depth()
    }

    // ========================================================================
    // Selection
    // ========================================================================

    pub fn select(&mut self, id: NodeId) {
        debug!(node = %id, "selecting");
        if self.selected.contains(&id) {
            return;
        }
        self.selected.push(id);
    }

    /// Drop one id from the selection, or clear it entirely and dim every
    /// edge when called without one.
    pub fn unselect(&mut self, id: Option<NodeId>) {
        match id {
            Some(id) => self.selected.retain(|s| *s != id),
            None => {
                self.selected.clear();
                let before = self.checkpoint();
                self.edges = update_edges(
                    &self.edges,
                    &EdgeSelector::All,
                    &EdgePatch::style(EdgeStylePatch::opacity(0.4)),
                );
                self.commit(before);
            }
        }
    }

    // ========================================================================
    // Graph mutation
    // ========================================================================

    pub fn on_nodes_change(&mut self, changes: &[NodeChange]) {
        let before = self.checkpoint();
        let mut removed = false;

        for change in changes {
            match change {
                NodeChange::Position { id, position } => {
                    if let Some(node) = self.nodes.iter_mut().find(|n| n.id == *id) {
                        node.position = *position;
                        if node.lifecycle != Some(LifecycleTag::Add) {
                            node.lifecycle = Some(LifecycleTag::Update);
                        }
                    }
                }
                NodeChange::Select { id, selected } => {
                    if let Some(node) = self.nodes.iter_mut().find(|n| n.id == *id) {
                        node.selected = *selected;
                    }
                }
                NodeChange::Remove { id } => {
                    if let Some(node) = self.nodes.iter_mut().find(|n| n.id == *id) {
                        node.lifecycle = Some(LifecycleTag::Delete);
                        removed = true;
                    }
                }
            }
        }

        self.commit(before);
        if removed {
            self.try_save();
        }
    }

    /// A staged move becomes durable when the drag ends.
    pub fn on_node_drag_stop(&mut self, id: NodeId) {
        self.stage_node(id);
        self.try_save();
    }

    pub fn on_edges_change(&mut self, changes: &[EdgeChange]) {
        let before = self.checkpoint();
        let mut removed = false;

        for change in changes {
            match change {
                EdgeChange::Select { id, selected } => {
                    if let Some(edge) = self.edges.iter_mut().find(|e| e.id == *id) {
                        edge.selected = *selected;
                    }
                }
                EdgeChange::Remove { id } => {
                    if let Some(edge) = self.edges.iter_mut().find(|e| e.id == *id) {
                        edge.lifecycle = Some(LifecycleTag::Delete);
                        removed = true;
                    }
                }
            }
        }

        self.commit(before);
        if removed {
            self.try_save();
        }
    }

    pub fn is_valid_connection(&self, conn: &Connection) -> bool {
        is_valid_connection(&self.nodes, &self.edges, conn)
    }

    /// Create the edge for a validated connection. An invalid connection
    /// is silently refused: no edge appears and nothing is surfaced.
    pub fn on_connect(&mut self, conn: &Connection) {
        if !self.is_valid_connection(conn) {
            debug!(source = %conn.source, target = %conn.target, "connection refused");
            return;
        }

        let before = self.checkpoint();
        let stroke = node_by_id(&self.nodes, conn.source).map(|n| stroke_for(n.kind));
        let mut edge = Edge::from(conn);
        edge.style.stroke = stroke;
        edge.lifecycle = Some(LifecycleTag::Add);
        self.edges.push(edge);
        self.commit(before);

        self.try_save();
    }

    pub fn add_node(
        &mut self,
        node: Node,
        status: NodeStatus,
        owner: Option<UserRef>,
        persist: bool,
    ) {
        let before = self.checkpoint();
        self.add_node_inner(node, status, owner, persist);
        self.commit(before);
    }

    pub(crate) fn add_node_inner(
        &mut self,
        mut node: Node,
        status: NodeStatus,
        owner: Option<UserRef>,
        persist: bool,
    ) {
        if node_by_id(&self.nodes, node.id).is_some() {
            debug!(node = %node.id, "add skipped: id already present");
            return;
        }

        node.status = status;
        node.owner = owner;
        let id = node.id;

        if persist {
            node.lifecycle = Some(LifecycleTag::Add);
            self.nodes.push(node);
            // spinner until the save round-trip settles
            self.node_status.insert(id, NodeStatus::Pending);
            self.try_save();
            self.node_status.insert(id, status);
        } else {
            node.lifecycle = None;
            self.nodes.push(node);
            self.node_status.insert(id, status);
        }
    }

    pub fn update_node(&mut self, id: NodeId, patch: NodePatch, persist: bool) {
        let before = self.checkpoint();
        self.update_node_inner(id, &patch);
        if persist {
            self.stage_node(id);
        }
        self.commit(before);
        if persist {
            self.try_save();
        }
    }

    pub(crate) fn update_node_inner(&mut self, id: NodeId, patch: &NodePatch) {
        self.nodes = update_nodes(&self.nodes, &NodeSelector::Id(id), patch);
    }

    pub fn push_node_data(&mut self, id: NodeId, data: NodeDataPatch, persist: bool) {
        let before = self.checkpoint();
        self.push_node_data_inner(id, data, persist);
        self.commit(before);
        if persist {
            self.try_save();
        }
    }

    pub(crate) fn push_node_data_inner(&mut self, id: NodeId, data: NodeDataPatch, stage: bool) {
        self.update_node_inner(id, &NodePatch::data(data));
        if stage {
            self.stage_node(id);
        }
    }

    /// Edit a node's data payload. Image and sketch nodes route image
    /// bytes through the upload/delete endpoints (owner/editor only);
    /// everything else pushes straight through and persists.
    pub fn update_node_data(&mut self, id: NodeId, update: DataUpdate) -> Result<(), EngineError> {
        debug!(node = %id, "updating node data");
        let Some(node) = node_by_id(&self.nodes, id).cloned() else {
            return Ok(());
        };

        match node.kind {
            NodeKind::Img | NodeKind::Sketch => {
                if !self.can_edit() {
                    return Ok(());
                }

                let mut patch = NodeDataPatch {
                    title: update.title,
                    src: update.src,
                    img: None,
                    playground: update.playground,
                };
                match update.image {
                    Some(ImagePatch::Upload(bytes)) => {
                        self.set_loading("uploading image...");
                        let url = self.api.upload_img(self.board_id, id, &bytes)?;
                        self.clear_loading();
                        patch.img = Some(Some(url));
                    }
                    Some(ImagePatch::Clear) => {
                        if node.data.img.is_some() {
                            self.set_loading("deleting image...");
                            self.api.delete_img(self.board_id, id)?;
                            self.clear_loading();
                        }
                        patch.img = Some(None);
                    }
                    Some(ImagePatch::Url(url)) => patch.img = Some(Some(url)),
                    None => {}
                }
                self.push_node_data(id, patch, true);
            }
            NodeKind::Mesh | NodeKind::Comment | NodeKind::GeneratedImg | NodeKind::Txt => {
                let patch = NodeDataPatch {
                    title: update.title,
                    src: update.src,
                    img: match update.image {
                        Some(ImagePatch::Url(url)) => Some(Some(url)),
                        Some(ImagePatch::Clear) => Some(None),
                        _ => None,
                    },
                    playground: update.playground,
                };
                self.push_node_data(id, patch, true);
            }
            _ => {}
        }

        Ok(())
    }

    /// Track a node's execution status and animate the edges feeding it
    /// while it is pending.
    pub fn set_node_status(&mut self, id: NodeId, status: NodeStatus) {
        let before = self.checkpoint();
        self.set_node_status_inner(id, status);
        self.commit(before);
    }

    pub(crate) fn set_node_status_inner(&mut self, id: NodeId, status: NodeStatus) {
        let pending = status == NodeStatus::Pending;
        self.node_status.insert(id, status);
        self.edges = update_edges(
            &self.edges,
            &EdgeSelector::Target(id),
            &EdgePatch::animated(pending),
        );
    }

    pub fn set_node_mode(&mut self, id: NodeId, mode: NodeMode) {
        let before = self.checkpoint();
        self.update_node_inner(id, &NodePatch::mode(mode));
        self.stage_node(id);
        self.commit(before);
        self.try_save();
    }

    /// Mark a node dirty without losing a pending `Add`.
    pub(crate) fn stage_node(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == id)
            && node.lifecycle != Some(LifecycleTag::Add)
        {
            node.lifecycle = Some(LifecycleTag::Update);
        }
    }

    // ========================================================================
    // Edge highlighting
    // ========================================================================

    pub fn on_edge_hover(&mut self, edge: &Edge, entered: bool) {
        if !entered && edge.selected {
            return;
        }
        let opacity = if entered { 1.0 } else { 0.4 };
        let before = self.checkpoint();
        self.edges = update_edges(
            &self.edges,
            &EdgeSelector::Record {
                pattern: edge,
                keys: SYNC_EDGE_KEYS,
            },
            &EdgePatch::style(EdgeStylePatch::opacity(opacity)),
        );
        self.commit(before);
    }

    pub fn on_edge_click(&mut self, edge: &Edge) {
        let before = self.checkpoint();
        let dimmed = update_edges(
            &self.edges,
            &EdgeSelector::All,
            &EdgePatch::style(EdgeStylePatch::opacity(0.4)),
        );
        let opacity = if edge.selected { 0.4 } else { 1.0 };
        self.edges = update_edges(
            &dimmed,
            &EdgeSelector::Record {
                pattern: edge,
                keys: SYNC_EDGE_KEYS,
            },
            &EdgePatch::style(EdgeStylePatch::opacity(opacity)),
        );
        self.commit(before);
    }

    // ========================================================================
    // Meshes
    // ========================================================================

    /// First mesh of a node's playground. `MeshNotFound` means "not yet
    /// present", distinct from an unknown node.
    pub fn primary_mesh(&self, id: NodeId) -> Result<MeshRef, EngineError> {
        let node =
            node_by_id(&self.nodes, id).ok_or_else(|| EngineError::NodeNotFound(id.to_string()))?;
        node.data
            .playground
            .as_ref()
            .and_then(|p| p.meshes.first())
            .cloned()
            .ok_or_else(|| EngineError::MeshNotFound(id.to_string()))
    }

    /// Idempotent add-if-missing: attaching a mesh that is already present
    /// is a no-op.
    pub fn attach_mesh(&mut self, id: NodeId, mesh: MeshRef) -> Result<(), EngineError> {
        let before = self.checkpoint();
        {
            let node = self
                .nodes
                .iter_mut()
                .find(|n| n.id == id)
                .ok_or_else(|| EngineError::NodeNotFound(id.to_string()))?;
            let playground = node.data.playground.get_or_insert_with(|| PlaygroundRef {
                id: flowboard_core::ids::PlaygroundId::new(),
                meshes: Vec::new(),
            });
            if playground.meshes.iter().any(|m| m.id == mesh.id) {
                return Ok(());
            }
            playground.meshes.push(mesh);
        }
        self.commit(before);
        Ok(())
    }

    // ========================================================================
    // Passthrough
    // ========================================================================

    pub fn caption_node(&mut self, id: NodeId) -> Result<(), EngineError> {
        Ok(self.api.caption_node(id)?)
    }
}
