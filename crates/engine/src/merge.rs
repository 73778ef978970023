//! Merge-inbound: fold an authoritative snapshot (initial load or realtime
//! push) into the live arrays without clobbering unsaved local edits.
//!
//! What changed remotely is judged against the cached snapshot, not
//! against the live arrays: new ids are appended, changed ids are patched,
//! ids that vanished from the incoming payload are dropped — except where
//! the live record is dirty, in which case the local edit wins until the
//! next save round-trip resolves it.

use tracing::debug;

use flowboard_core::board::Board;
use flowboard_core::diff::{
    changed_edges, changed_nodes, edge_eq, update_edges, EdgePatch, EdgeSelector, EdgeStylePatch,
    SYNC_EDGE_KEYS, SYNC_NODE_KEYS,
};
use flowboard_core::edge::{stroke_for, Edge};
use flowboard_core::node::{Node, NodeStatus};
use flowboard_storage::{PermissionService, Persistence};

use crate::Engine;

impl<S: Persistence + PermissionService> Engine<S> {
    /// Treat `board` as the authoritative snapshot and reconcile.
    pub fn init(&mut self, board: &Board) {
        let before = self.checkpoint();
        self.init_inner(board);
        self.commit(before);
    }

    pub(crate) fn init_inner(&mut self, board: &Board) {
        if !self.mounted {
            debug!(board = %board.id, "ignoring inbound snapshot after unmount");
            return;
        }

        self.node_status = board.nodes.iter().map(|n| (n.id, n.status)).collect();
        self.title = board.title.clone();
        self.owner = Some(board.owner.clone());

        let cached = self.cached_snapshot();
        let (cached_nodes, cached_edges) = match &cached {
            Some(board) => (board.nodes.as_slice(), board.edges.as_slice()),
            None => (&[][..], &[][..]),
        };

        let remote_nodes = changed_nodes(&board.nodes, cached_nodes, SYNC_NODE_KEYS);
        if let Some(merged) = merged_nodes(&self.nodes, &board.nodes, &remote_nodes, cached_nodes) {
            self.nodes = merged;
        }

        let remote_edges = changed_edges(&board.edges, cached_edges, SYNC_EDGE_KEYS);
        if let Some(merged) = merged_edges(&self.edges, &board.edges, &remote_edges, cached_edges) {
            self.edges = merged;
        }

        self.apply_edge_hints();
    }

    /// Derived visual hints, recomputed after every merge: edges feeding a
    /// pending node animate, and every edge takes its resting stroke from
    /// its source node's kind.
    pub(crate) fn apply_edge_hints(&mut self) {
        let mut edges = self.edges.clone();
        for node in &self.nodes {
            let pending = self.node_status.get(&node.id) == Some(&NodeStatus::Pending);
            edges = update_edges(
                &edges,
                &EdgeSelector::Target(node.id),
                &EdgePatch::animated(pending),
            );
            edges = update_edges(
                &edges,
                &EdgeSelector::Source(node.id),
                &EdgePatch::style(EdgeStylePatch {
                    stroke: Some(stroke_for(node.kind)),
                    opacity: Some(0.4),
                }),
            );
        }
        self.edges = edges;
    }
}

/// `None` means nothing to adopt: the live array stays as it is.
fn merged_nodes(
    live: &[Node],
    incoming: &[Node],
    remote_changed: &[Node],
    cached: &[Node],
) -> Option<Vec<Node>> {
    let mut changed_any = false;
    let mut result = Vec::with_capacity(live.len());

    for record in live {
        if record.is_dirty() {
            // local optimistic edit wins
            result.push(record.clone());
            continue;
        }
        if let Some(patched) = remote_changed.iter().find(|rc| rc.id == record.id) {
            changed_any = changed_any || patched != record;
            result.push(patched.clone());
            continue;
        }
        if incoming.iter().any(|n| n.id == record.id) {
            result.push(record.clone());
            continue;
        }
        if cached.iter().any(|c| c.id == record.id) {
            // present in the last snapshot, gone from the incoming one
            changed_any = true;
            continue;
        }
        result.push(record.clone());
    }

    for addition in remote_changed {
        if !live.iter().any(|n| n.id == addition.id) {
            changed_any = true;
            result.push(addition.clone());
        }
    }

    changed_any.then_some(result)
}

/// Edge identity is the endpoint tuple, not the id: ids are minted
/// client-side and differ between collaborators.
fn merged_edges(
    live: &[Edge],
    incoming: &[Edge],
    remote_changed: &[Edge],
    cached: &[Edge],
) -> Option<Vec<Edge>> {
    let same = |a: &Edge, b: &Edge| edge_eq(a, b, SYNC_EDGE_KEYS);

    let mut changed_any = false;
    let mut result = Vec::with_capacity(live.len());

    for record in live {
        if record.is_dirty() {
            result.push(record.clone());
            continue;
        }
        if incoming.iter().any(|e| same(e, record)) {
            result.push(record.clone());
            continue;
        }
        if cached.iter().any(|c| same(c, record)) {
            changed_any = true;
            continue;
        }
        result.push(record.clone());
    }

    for addition in remote_changed {
        if !live.iter().any(|e| same(e, addition)) {
            changed_any = true;
            result.push(addition.clone());
        }
    }

    changed_any.then_some(result)
}
