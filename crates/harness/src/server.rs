//! In-memory stand-in for the persistence API, the permission service,
//! and the realtime broadcast fan-out.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use flowboard_core::board::Board;
use flowboard_core::diff::{edge_eq, SYNC_EDGE_KEYS};
use flowboard_core::edge::Edge;
use flowboard_core::ids::{BoardId, NodeId, ProjectId, UserId};
use flowboard_core::node::{LifecycleTag, Node, NodeKind, NodeStatus, UserRef};
use flowboard_core::wire::SocketEvent;
use flowboard_storage::{
    Permissions, PermissionService, Persistence, RunStep, StorageError,
};

pub struct TestServer {
    boards: BTreeMap<BoardId, Board>,
    perms: BTreeMap<(BoardId, UserId), Permissions>,
    images: BTreeMap<NodeId, String>,
    outbox: Vec<(UserId, SocketEvent)>,

    /// Every `run_path` dispatch, in order.
    pub run_log: Vec<(BoardId, Vec<RunStep>)>,
    /// Every captioned node, in order.
    pub captioned: Vec<NodeId>,
    /// Payloads received on the unauthenticated comment path.
    pub unsecure_edits: Vec<Vec<Node>>,
    /// Number of authenticated edits accepted.
    pub edit_count: usize,
    /// Fail the next authenticated edit with a remote error.
    pub fail_next_save: bool,
}

impl Default for TestServer {
    fn default() -> Self {
        Self::new()
    }
}

impl TestServer {
    pub fn new() -> Self {
        Self {
            boards: BTreeMap::new(),
            perms: BTreeMap::new(),
            images: BTreeMap::new(),
            outbox: Vec::new(),
            run_log: Vec::new(),
            captioned: Vec::new(),
            unsecure_edits: Vec::new(),
            edit_count: 0,
            fail_next_save: false,
        }
    }

    pub fn insert_board(&mut self, board: Board) {
        self.boards.insert(board.id, board);
    }

    pub fn board(&self, id: BoardId) -> Option<&Board> {
        self.boards.get(&id)
    }

    pub fn board_mut(&mut self, id: BoardId) -> Option<&mut Board> {
        self.boards.get_mut(&id)
    }

    pub fn set_permissions(&mut self, board: BoardId, user: UserId, perms: Permissions) {
        self.perms.insert((board, user), perms);
    }

    pub fn permissions(&self, board: BoardId, user: UserId) -> Permissions {
        self.perms
            .get(&(board, user))
            .copied()
            .unwrap_or(Permissions::VIEWER)
    }

    pub fn push_event(&mut self, origin: UserId, event: SocketEvent) {
        self.outbox.push((origin, event));
    }

    pub fn drain_outbox(&mut self) -> Vec<(UserId, SocketEvent)> {
        std::mem::take(&mut self.outbox)
    }

    fn clean_node(node: &Node) -> Node {
        let mut node = node.clone();
        node.lifecycle = None;
        node.selected = false;
        node
    }

    fn clean_edge(edge: &Edge) -> Edge {
        let mut edge = edge.clone();
        edge.lifecycle = None;
        edge.selected = false;
        edge
    }

    fn apply_nodes(board: &mut Board, images: &BTreeMap<NodeId, String>, nodes: &[Node]) {
        for node in nodes {
            if node.lifecycle == Some(LifecycleTag::Delete) {
                board.nodes.retain(|n| n.id != node.id);
                continue;
            }

            let mut incoming = Self::clean_node(node);
            // the wire strips heavy fields; the server's copies survive
            if let Some(existing) = board.nodes.iter_mut().find(|n| n.id == node.id) {
                if incoming.data.img.is_none() {
                    incoming.data.img = existing.data.img.clone();
                }
                if incoming.data.playground.is_none() {
                    incoming.data.playground = existing.data.playground.clone();
                }
                *existing = incoming;
            } else {
                if incoming.data.img.is_none() {
                    incoming.data.img = images.get(&incoming.id).cloned();
                }
                board.nodes.push(incoming);
            }
        }
    }

    fn apply_edges(board: &mut Board, edges: &[Edge]) {
        for edge in edges {
            if edge.lifecycle == Some(LifecycleTag::Delete) {
                board
                    .edges
                    .retain(|e| !edge_eq(e, edge, SYNC_EDGE_KEYS));
                continue;
            }

            let incoming = Self::clean_edge(edge);
            if let Some(existing) = board
                .edges
                .iter_mut()
                .find(|e| edge_eq(e, edge, SYNC_EDGE_KEYS))
            {
                *existing = incoming;
            } else {
                board.edges.push(incoming);
            }
        }
    }
}

/// Per-actor handle on the shared server, standing in for an
/// authenticated HTTP client plus its realtime channel.
#[derive(Clone)]
pub struct SharedServer {
    server: Rc<RefCell<TestServer>>,
    user: UserId,
}

impl SharedServer {
    pub fn new(server: Rc<RefCell<TestServer>>, user: UserId) -> Self {
        Self { server, user }
    }

    pub fn user(&self) -> UserId {
        self.user
    }
}

impl Persistence for SharedServer {
    fn get_moodboard(&mut self, id: BoardId) -> Result<Board, StorageError> {
        self.server
            .borrow()
            .board(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    fn edit_moodboard(
        &mut self,
        id: BoardId,
        title: &str,
        nodes: &[Node],
        edges: &[Edge],
    ) -> Result<Board, StorageError> {
        let mut server = self.server.borrow_mut();

        if server.fail_next_save {
            server.fail_next_save = false;
            return Err(StorageError::Remote("connection reset".into()));
        }

        let perms = server.permissions(id, self.user);
        // non-editors may only submit comment nodes
        if !perms.can_edit()
            && (!edges.is_empty() || nodes.iter().any(|n| n.kind != NodeKind::Comment))
        {
            return Err(StorageError::PermissionDenied(self.user.to_string()));
        }

        let images = server.images.clone();
        server.edit_count += 1;
        let board = server
            .boards
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;

        board.title = title.to_string();
        TestServer::apply_nodes(board, &images, nodes);
        TestServer::apply_edges(board, edges);

        let snapshot = board.clone();
        server.push_event(
            self.user,
            SocketEvent::MoodboardUpdate {
                data: snapshot.clone(),
            },
        );
        Ok(snapshot)
    }

    fn edit_moodboard_unsecure(
        &mut self,
        id: BoardId,
        nodes: &[Node],
    ) -> Result<(), StorageError> {
        let mut server = self.server.borrow_mut();

        // minimal server-side belt on the trusted-client path
        let comments: Vec<Node> = nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Comment && n.owner.is_none())
            .cloned()
            .collect();
        server.unsecure_edits.push(comments.clone());

        let images = server.images.clone();
        let board = server
            .boards
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        TestServer::apply_nodes(board, &images, &comments);
        Ok(())
    }

    fn create_moodboard(&mut self, _project_id: ProjectId) -> Result<Board, StorageError> {
        let mut server = self.server.borrow_mut();
        let owner = UserRef {
            id: self.user,
            name: String::new(),
        };
        let board = Board::new("untitled", owner);
        server.set_permissions(board.id, self.user, Permissions::OWNER);
        server.insert_board(board.clone());
        Ok(board)
    }

    fn delete_moodboard(&mut self, id: BoardId) -> Result<(), StorageError> {
        let mut server = self.server.borrow_mut();
        server
            .boards
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    fn run_path(
        &mut self,
        id: BoardId,
        path: &[RunStep],
    ) -> Result<Vec<(NodeId, NodeStatus)>, StorageError> {
        let mut server = self.server.borrow_mut();
        server.run_log.push((id, path.to_vec()));
        Ok(path
            .iter()
            .map(|step| (step.node.id, NodeStatus::Pending))
            .collect())
    }

    fn caption_node(&mut self, node: NodeId) -> Result<(), StorageError> {
        self.server.borrow_mut().captioned.push(node);
        Ok(())
    }

    fn upload_img(
        &mut self,
        board: BoardId,
        node: NodeId,
        bytes: &[u8],
    ) -> Result<String, StorageError> {
        let mut server = self.server.borrow_mut();
        let url = format!("https://img.test/{node}/{}", bytes.len());
        server.images.insert(node, url.clone());
        if let Some(board) = server.boards.get_mut(&board)
            && let Some(stored) = board.nodes.iter_mut().find(|n| n.id == node)
        {
            stored.data.img = Some(url.clone());
        }
        Ok(url)
    }

    fn delete_img(&mut self, board: BoardId, node: NodeId) -> Result<(), StorageError> {
        let mut server = self.server.borrow_mut();
        server.images.remove(&node);
        if let Some(board) = server.boards.get_mut(&board)
            && let Some(stored) = board.nodes.iter_mut().find(|n| n.id == node)
        {
            stored.data.img = None;
        }
        Ok(())
    }
}

impl PermissionService for SharedServer {
    fn get_permissions(
        &mut self,
        board: BoardId,
        user: UserId,
    ) -> Result<Permissions, StorageError> {
        Ok(self.server.borrow().permissions(board, user))
    }
}
