//! Bounded undo/redo over the graph arrays.
//!
//! Only `nodes` and `edges` are captured; derived and presentational state
//! is excluded. A snapshot is pushed only when the outgoing state is
//! materially different from the new one: a cheap deep-equality
//! short-circuit first, then a restricted-key comparison that ignores
//! volatile fields (edge opacity, selection, lifecycle tags), so cosmetic
//! re-renders never grow the stack.

use std::collections::VecDeque;

use flowboard_core::diff::{edges_index_eq, nodes_index_eq, EdgeKey, NodeKey};
use flowboard_core::edge::Edge;
use flowboard_core::node::Node;

pub const HISTORY_NODE_KEYS: &[NodeKey] = &[
    NodeKey::Id,
    NodeKey::Src,
    NodeKey::Img,
    NodeKey::Title,
    NodeKey::Kind,
    NodeKey::Status,
    NodeKey::OwnerId,
    NodeKey::PlaygroundId,
    NodeKey::Mode,
];

pub const HISTORY_EDGE_KEYS: &[EdgeKey] = &[
    EdgeKey::Id,
    EdgeKey::Source,
    EdgeKey::Target,
    EdgeKey::SourceHandle,
    EdgeKey::TargetHandle,
];

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

pub struct History {
    past: VecDeque<Snapshot>,
    future: Vec<Snapshot>,
    max_depth: usize,
}

impl History {
    pub fn new(max_depth: usize) -> Self {
        Self {
            past: VecDeque::new(),
            future: Vec::new(),
            max_depth,
        }
    }

    /// Record the state a transition started from. No-op when the
    /// transition was cosmetic, or when `before` is already on top of the
    /// stack (a transition recorded through more than one wrap point).
    pub fn record(&mut self, before: Snapshot, nodes: &[Node], edges: &[Edge]) {
        if !materially_different(&before, nodes, edges) {
            return;
        }
        if self.past.back() == Some(&before) {
            return;
        }

        self.future.clear();
        self.past.push_back(before);
        if self.past.len() > self.max_depth {
            self.past.pop_front();
        }
    }

    /// Swap to the previous state, parking `current` for redo.
    pub fn undo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let previous = self.past.pop_back()?;
        self.future.push(current);
        Some(previous)
    }

    /// Swap back to the most recently undone state.
    pub fn redo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let next = self.future.pop()?;
        self.past.push_back(current);
        Some(next)
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }

    pub fn undo_depth(&self) -> usize {
        self.past.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.future.len()
    }
}

fn materially_different(before: &Snapshot, nodes: &[Node], edges: &[Edge]) -> bool {
    // never capture the initial empty graph
    if before.nodes.is_empty() {
        return false;
    }
    if before.nodes == nodes && before.edges == edges {
        return false;
    }
    !nodes_index_eq(&before.nodes, nodes, HISTORY_NODE_KEYS)
        || !edges_index_eq(&before.edges, edges, HISTORY_EDGE_KEYS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowboard_core::node::{NodeData, NodeKind, NodeStatus, Position};

    fn txt(src: &str) -> Node {
        Node::new(
            NodeKind::Txt,
            Position::default(),
            NodeData {
                title: "prompt".into(),
                src: Some(src.into()),
                ..NodeData::default()
            },
        )
    }

    fn snap(nodes: Vec<Node>) -> Snapshot {
        Snapshot {
            nodes,
            edges: Vec::new(),
        }
    }

    #[test]
    fn material_change_is_recorded() {
        let mut history = History::new(10);
        let a = txt("a cat");
        let mut b = a.clone();
        b.data.src = Some("a dog".into());

        history.record(snap(vec![a]), &[b], &[]);
        assert_eq!(history.undo_depth(), 1);
    }

    #[test]
    fn cosmetic_change_is_not_recorded() {
        let mut history = History::new(10);
        let a = txt("a cat");
        let mut dimmed = a.clone();
        dimmed.selected = true;

        history.record(snap(vec![a]), &[dimmed], &[]);
        assert_eq!(history.undo_depth(), 0);
    }

    #[test]
    fn status_change_is_material() {
        let mut history = History::new(10);
        let a = txt("a cat");
        let mut running = a.clone();
        running.status = NodeStatus::Running;

        history.record(snap(vec![a]), &[running], &[]);
        assert_eq!(history.undo_depth(), 1);
    }

    #[test]
    fn empty_before_state_is_skipped() {
        let mut history = History::new(10);
        history.record(snap(Vec::new()), &[txt("a cat")], &[]);
        assert_eq!(history.undo_depth(), 0);
    }

    #[test]
    fn depth_limit_drops_oldest() {
        let mut history = History::new(2);
        let mut prev = txt("v0");
        for i in 1..=5 {
            let mut next = prev.clone();
            next.data.src = Some(format!("v{i}"));
            history.record(snap(vec![prev]), &[next.clone()], &[]);
            prev = next;
        }
        assert_eq!(history.undo_depth(), 2);
    }

    #[test]
    fn undo_redo_round_trip() {
        let mut history = History::new(10);
        let s0 = txt("s0");
        let mut s1 = s0.clone();
        s1.data.src = Some("s1".into());
        let mut s2 = s1.clone();
        s2.data.src = Some("s2".into());

        history.record(snap(vec![s0.clone()]), &[s1.clone()], &[]);
        history.record(snap(vec![s1.clone()]), &[s2.clone()], &[]);

        let back = history.undo(snap(vec![s2.clone()])).unwrap();
        assert_eq!(back.nodes[0].data.src.as_deref(), Some("s1"));

        let forward = history.redo(back).unwrap();
        assert_eq!(forward.nodes[0].data.src.as_deref(), Some("s2"));
    }

    #[test]
    fn new_record_clears_redo() {
        let mut history = History::new(10);
        let s0 = txt("s0");
        let mut s1 = s0.clone();
        s1.data.src = Some("s1".into());

        history.record(snap(vec![s0.clone()]), &[s1.clone()], &[]);
        history.undo(snap(vec![s1.clone()])).unwrap();
        assert_eq!(history.redo_depth(), 1);

        let mut s1b = s0.clone();
        s1b.data.src = Some("s1b".into());
        history.record(snap(vec![s0]), &[s1b], &[]);
        assert_eq!(history.redo_depth(), 0);
    }
}
