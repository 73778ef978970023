//! The save protocol: diff the live arrays against the last persisted
//! snapshot, partition the dirty set by authorization class, push it out,
//! then settle tags and the cache from the server's response.

use tracing::{debug, warn};

use flowboard_core::board::Board;
use flowboard_core::diff::{changed_edges, changed_nodes, SYNC_EDGE_KEYS, SYNC_NODE_KEYS};
use flowboard_core::edge::Edge;
use flowboard_core::node::{LifecycleTag, Node, NodeKind};
use flowboard_storage::{PermissionService, Persistence, SnapshotCache};

use crate::{Engine, EngineError};

/// Copy of a record as it goes over the wire: heavy data slots are
/// stripped, the server keeps its own canonical copies of those.
pub(crate) fn wire_node(node: &Node) -> Node {
    let mut node = node.clone();
    node.data.img = None;
    node.data.playground = None;
    node
}

pub(crate) fn wire_nodes(nodes: &[Node]) -> Vec<Node> {
    nodes.iter().map(wire_node).collect()
}

impl<S: Persistence + PermissionService> Engine<S> {
    pub(crate) fn cached_snapshot(&self) -> Option<Board> {
        match self.cache.get_snapshot(self.board_id) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(board = %self.board_id, error = %e, "snapshot read failed; diffing from scratch");
                None
            }
        }
    }

    /// New-or-changed records relative to the cached snapshot, plus
    /// everything tagged for deletion. Records tagged `Ignore` are clean
    /// by definition and excluded from the content diff.
    pub(crate) fn dirty_set(&self) -> (Vec<Node>, Vec<Edge>) {
        let cached = self.cached_snapshot();
        let (cached_nodes, cached_edges) = match &cached {
            Some(board) => (board.nodes.as_slice(), board.edges.as_slice()),
            None => (&[][..], &[][..]),
        };

        let node_candidates: Vec<Node> = self
            .nodes
            .iter()
            .filter(|n| {
                !matches!(
                    n.lifecycle,
                    Some(LifecycleTag::Ignore) | Some(LifecycleTag::Delete)
                )
            })
            .cloned()
            .collect();
        let mut nodes = changed_nodes(&node_candidates, cached_nodes, SYNC_NODE_KEYS);
        nodes.extend(
            self.nodes
                .iter()
                .filter(|n| n.lifecycle == Some(LifecycleTag::Delete))
                .cloned(),
        );

        let edge_candidates: Vec<Edge> = self
            .edges
            .iter()
            .filter(|e| {
                !matches!(
                    e.lifecycle,
                    Some(LifecycleTag::Ignore) | Some(LifecycleTag::Delete)
                )
            })
            .cloned()
            .collect();
        let mut edges = changed_edges(&edge_candidates, cached_edges, SYNC_EDGE_KEYS);
        edges.extend(
            self.edges
                .iter()
                .filter(|e| e.lifecycle == Some(LifecycleTag::Delete))
                .cloned(),
        );

        (nodes, edges)
    }

    /// Log-and-continue save used by the mutation primitives: a failed
    /// save leaves every record dirty, and the next durable edit retries
    /// the whole set.
    pub(crate) fn try_save(&mut self) {
        if let Err(e) = self.save() {
            warn!(board = %self.board_id, error = %e, "save failed; records stay dirty");
        }
    }

    /// Push the dirty set to the server. No-op when nothing is dirty, so
    /// overlapping calls are harmless: whatever the first one missed is in
    /// the second one's diff.
    pub fn save(&mut self) -> Result<(), EngineError> {
        let (updated_nodes, updated_edges) = self.dirty_set();
        if updated_nodes.is_empty() && updated_edges.is_empty() {
            return Ok(());
        }
        debug!(
            nodes = updated_nodes.len(),
            edges = updated_edges.len(),
            "saving dirty records"
        );

        // Anonymous comments travel on the unauthenticated path: any
        // visitor may leave one.
        let anon_comments: Vec<Node> = updated_nodes
            .iter()
            .filter(|n| n.is_anonymous() && n.kind == NodeKind::Comment)
            .cloned()
            .collect();
        if !anon_comments.is_empty() {
            self.set_loading("commenting...");
            self.api
                .edit_moodboard_unsecure(self.board_id, &wire_nodes(&anon_comments))?;
        }

        let owned: Vec<Node> = updated_nodes
            .iter()
            .filter(|n| !n.is_anonymous())
            .cloned()
            .collect();

        let mut board = None;

        // The protected path carries the full payload, but only for an
        // actor with edit rights; the server does not have to trust a
        // client-asserted role.
        if (!owned.is_empty() || !updated_edges.is_empty()) && self.can_edit() {
            self.set_loading("saving...");
            board = Some(self.api.edit_moodboard(
                self.board_id,
                &self.title,
                &wire_nodes(&owned),
                &updated_edges,
            )?);
        }

        // A registered visitor without edit rights may still comment.
        let owned_comments: Vec<Node> = owned
            .iter()
            .filter(|n| n.kind == NodeKind::Comment)
            .cloned()
            .collect();
        if !owned_comments.is_empty()
            && self.perms.is_some_and(|p| !p.can_edit())
        {
            self.set_loading("commenting...");
            board = Some(self.api.edit_moodboard(
                self.board_id,
                &self.title,
                &wire_nodes(&owned_comments),
                &[],
            )?);
        }

        // Settle: deletions leave the live arrays, everything else is
        // clean until the next edit.
        self.nodes.retain(|n| n.lifecycle != Some(LifecycleTag::Delete));
        for node in &mut self.nodes {
            node.lifecycle = Some(LifecycleTag::Ignore);
        }
        self.edges.retain(|e| e.lifecycle != Some(LifecycleTag::Delete));
        for edge in &mut self.edges {
            edge.lifecycle = Some(LifecycleTag::Ignore);
        }

        if let Some(board) = &board {
            self.cache.put_snapshot(self.board_id, board)?;
        }

        self.clear_loading();
        Ok(())
    }
}
