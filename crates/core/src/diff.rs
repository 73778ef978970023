//! Typed record matching, filtering, and patching.
//!
//! Comparisons run over a closed set of field keys instead of runtime
//! string paths, so a typo'd key is a compile error. The same key sets
//! drive the save diff, the inbound merge, and history materiality.

use crate::edge::{Edge, EdgeStyle};
use crate::ids::{EdgeId, NodeId};
use crate::node::{
    LifecycleTag, Node, NodeData, NodeMode, NodeParams, NodeStatus, PlaygroundRef, Position,
    UserRef,
};

/// How per-key results combine into a single verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combine {
    All,
    Any,
}

// ============================================================================
// Field keys
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKey {
    Id,
    Kind,
    Status,
    Title,
    Src,
    Img,
    PlaygroundId,
    Mode,
    OwnerId,
    PositionX,
    PositionY,
}

impl NodeKey {
    fn eq_on(self, a: &Node, b: &Node) -> bool {
        match self {
            Self::Id => a.id == b.id,
            Self::Kind => a.kind == b.kind,
            Self::Status => a.status == b.status,
            Self::Title => a.data.title == b.data.title,
            Self::Src => a.data.src == b.data.src,
            Self::Img => a.data.img == b.data.img,
            Self::PlaygroundId => {
                a.data.playground.as_ref().map(|p| p.id) == b.data.playground.as_ref().map(|p| p.id)
            }
            Self::Mode => a.mode == b.mode,
            Self::OwnerId => {
                a.owner.as_ref().map(|o| o.id) == b.owner.as_ref().map(|o| o.id)
            }
            Self::PositionX => a.position.x.total_cmp(&b.position.x).is_eq(),
            Self::PositionY => a.position.y.total_cmp(&b.position.y).is_eq(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKey {
    Id,
    Source,
    Target,
    SourceHandle,
    TargetHandle,
}

impl EdgeKey {
    fn eq_on(self, a: &Edge, b: &Edge) -> bool {
        match self {
            Self::Id => a.id == b.id,
            Self::Source => a.source == b.source,
            Self::Target => a.target == b.target,
            Self::SourceHandle => a.source_handle == b.source_handle,
            Self::TargetHandle => a.target_handle == b.target_handle,
        }
    }
}

/// Key set used when diffing live records against the persisted snapshot.
pub const SYNC_NODE_KEYS: &[NodeKey] = &[
    NodeKey::Id,
    NodeKey::Title,
    NodeKey::Src,
    NodeKey::PositionX,
    NodeKey::PositionY,
    NodeKey::Status,
    NodeKey::Kind,
    NodeKey::Img,
    NodeKey::PlaygroundId,
    NodeKey::Mode,
];

pub const SYNC_EDGE_KEYS: &[EdgeKey] = &[
    EdgeKey::Source,
    EdgeKey::Target,
    EdgeKey::SourceHandle,
    EdgeKey::TargetHandle,
];

// ============================================================================
// Matching
// ============================================================================

pub fn node_matches(a: &Node, b: &Node, keys: &[NodeKey], combine: Combine) -> bool {
    match combine {
        Combine::All => keys.iter().all(|k| k.eq_on(a, b)),
        Combine::Any => keys.iter().any(|k| k.eq_on(a, b)),
    }
}

pub fn node_eq(a: &Node, b: &Node, keys: &[NodeKey]) -> bool {
    node_matches(a, b, keys, Combine::All)
}

pub fn edge_matches(a: &Edge, b: &Edge, keys: &[EdgeKey], combine: Combine) -> bool {
    match combine {
        Combine::All => keys.iter().all(|k| k.eq_on(a, b)),
        Combine::Any => keys.iter().any(|k| k.eq_on(a, b)),
    }
}

pub fn edge_eq(a: &Edge, b: &Edge, keys: &[EdgeKey]) -> bool {
    edge_matches(a, b, keys, Combine::All)
}

pub fn find_node<'a>(nodes: &'a [Node], pattern: &Node, keys: &[NodeKey]) -> Option<&'a Node> {
    nodes.iter().find(|n| node_eq(n, pattern, keys))
}

pub fn find_edge<'a>(edges: &'a [Edge], pattern: &Edge, keys: &[EdgeKey]) -> Option<&'a Edge> {
    edges.iter().find(|e| edge_eq(e, pattern, keys))
}

pub fn node_by_id(nodes: &[Node], id: NodeId) -> Option<&Node> {
    nodes.iter().find(|n| n.id == id)
}

pub fn edge_by_id(edges: &[Edge], id: EdgeId) -> Option<&Edge> {
    edges.iter().find(|e| e.id == id)
}

/// Edges whose target is the given node, in array order.
pub fn edges_to(edges: &[Edge], target: NodeId) -> Vec<&Edge> {
    edges.iter().filter(|e| e.target == target).collect()
}

/// Edges whose source is the given node, in array order.
pub fn edges_from(edges: &[Edge], source: NodeId) -> Vec<&Edge> {
    edges.iter().filter(|e| e.source == source).collect()
}

/// Records with no counterpart in `baseline` equal on every key. This is
/// the save-diff primitive: against the cached snapshot it yields exactly
/// the new-or-changed records.
pub fn changed_nodes(records: &[Node], baseline: &[Node], keys: &[NodeKey]) -> Vec<Node> {
    records
        .iter()
        .filter(|r| !baseline.iter().any(|b| node_eq(r, b, keys)))
        .cloned()
        .collect()
}

pub fn changed_edges(records: &[Edge], baseline: &[Edge], keys: &[EdgeKey]) -> Vec<Edge> {
    records
        .iter()
        .filter(|r| !baseline.iter().any(|b| edge_eq(r, b, keys)))
        .cloned()
        .collect()
}

/// Pairwise restricted-key equality. Lengths must match.
pub fn nodes_index_eq(a: &[Node], b: &[Node], keys: &[NodeKey]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| node_eq(x, y, keys))
}

pub fn edges_index_eq(a: &[Edge], b: &[Edge], keys: &[EdgeKey]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| edge_eq(x, y, keys))
}

// ============================================================================
// Selectors
// ============================================================================

pub enum NodeSelector<'a> {
    /// Nodes equal to the pattern on every key.
    Record {
        pattern: &'a Node,
        keys: &'a [NodeKey],
    },
    /// Nodes equal to any of the patterns on every key.
    AnyOf {
        patterns: &'a [Node],
        keys: &'a [NodeKey],
    },
    Id(NodeId),
    All,
    Pred(&'a dyn Fn(&Node) -> bool),
}

impl NodeSelector<'_> {
    fn selects(&self, node: &Node) -> bool {
        match self {
            Self::Record { pattern, keys } => node_eq(node, pattern, keys),
            Self::AnyOf { patterns, keys } => patterns.iter().any(|p| node_eq(node, p, keys)),
            Self::Id(id) => node.id == *id,
            Self::All => true,
            Self::Pred(f) => f(node),
        }
    }
}

pub enum EdgeSelector<'a> {
    Record {
        pattern: &'a Edge,
        keys: &'a [EdgeKey],
    },
    Id(EdgeId),
    Target(NodeId),
    Source(NodeId),
    All,
    Pred(&'a dyn Fn(&Edge) -> bool),
}

impl EdgeSelector<'_> {
    fn selects(&self, edge: &Edge) -> bool {
        match self {
            Self::Record { pattern, keys } => edge_eq(edge, pattern, keys),
            Self::Id(id) => edge.id == *id,
            Self::Target(id) => edge.target == *id,
            Self::Source(id) => edge.source == *id,
            Self::All => true,
            Self::Pred(f) => f(edge),
        }
    }
}

// ============================================================================
// Patches
// ============================================================================

/// Partial update for `NodeData`. Double-`Option` fields distinguish
/// "leave alone" (`None`) from "set or clear" (`Some(..)`).
#[derive(Debug, Clone, Default)]
pub struct NodeDataPatch {
    pub title: Option<String>,
    pub src: Option<String>,
    pub img: Option<Option<String>>,
    pub playground: Option<Option<PlaygroundRef>>,
}

impl NodeDataPatch {
    fn apply(&self, data: &mut NodeData) {
        if let Some(title) = &self.title {
            data.title = title.clone();
        }
        if let Some(src) = &self.src {
            data.src = Some(src.clone());
        }
        if let Some(img) = &self.img {
            data.img = img.clone();
        }
        if let Some(playground) = &self.playground {
            data.playground = playground.clone();
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NodeParamsPatch {
    pub geo_strength: Option<f32>,
    pub style_strength: Option<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct NodePatch {
    pub position: Option<Position>,
    pub status: Option<NodeStatus>,
    pub mode: Option<NodeMode>,
    pub owner: Option<Option<UserRef>>,
    pub re_run: Option<bool>,
    pub selected: Option<bool>,
    pub lifecycle: Option<Option<LifecycleTag>>,
    pub data: Option<NodeDataPatch>,
    pub params: Option<NodeParamsPatch>,
}

impl NodePatch {
    pub fn status(status: NodeStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn mode(mode: NodeMode) -> Self {
        Self {
            mode: Some(mode),
            ..Self::default()
        }
    }

    pub fn re_run(re_run: bool) -> Self {
        Self {
            re_run: Some(re_run),
            ..Self::default()
        }
    }

    pub fn lifecycle(tag: Option<LifecycleTag>) -> Self {
        Self {
            lifecycle: Some(tag),
            ..Self::default()
        }
    }

    pub fn data(data: NodeDataPatch) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    fn apply(&self, node: &mut Node) {
        if let Some(position) = self.position {
            node.position = position;
        }
        if let Some(status) = self.status {
            node.status = status;
        }
        if let Some(mode) = self.mode {
            node.mode = Some(mode);
        }
        if let Some(owner) = &self.owner {
            node.owner = owner.clone();
        }
        if let Some(re_run) = self.re_run {
            node.re_run = re_run;
        }
        if let Some(selected) = self.selected {
            node.selected = selected;
        }
        if let Some(lifecycle) = self.lifecycle {
            node.lifecycle = lifecycle;
        }
        if let Some(data) = &self.data {
            data.apply(&mut node.data);
        }
        if let Some(params) = self.params {
            // one-level merge, like data
            let merged = node.params.get_or_insert(NodeParams::default());
            if let Some(geo) = params.geo_strength {
                merged.geo_strength = Some(geo);
            }
            if let Some(style) = params.style_strength {
                merged.style_strength = Some(style);
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EdgeStylePatch {
    pub stroke: Option<String>,
    pub opacity: Option<f32>,
}

impl EdgeStylePatch {
    pub fn opacity(opacity: f32) -> Self {
        Self {
            opacity: Some(opacity),
            ..Self::default()
        }
    }

    fn apply(&self, style: &mut EdgeStyle) {
        if let Some(stroke) = &self.stroke {
            style.stroke = Some(stroke.clone());
        }
        if let Some(opacity) = self.opacity {
            style.opacity = Some(opacity);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EdgePatch {
    pub style: Option<EdgeStylePatch>,
    pub animated: Option<bool>,
    pub selected: Option<bool>,
    pub lifecycle: Option<Option<LifecycleTag>>,
}

impl EdgePatch {
    pub fn animated(animated: bool) -> Self {
        Self {
            animated: Some(animated),
            ..Self::default()
        }
    }

    pub fn style(style: EdgeStylePatch) -> Self {
        Self {
            style: Some(style),
            ..Self::default()
        }
    }

    pub fn lifecycle(tag: Option<LifecycleTag>) -> Self {
        Self {
            lifecycle: Some(tag),
            ..Self::default()
        }
    }

    fn apply(&self, edge: &mut Edge) {
        if let Some(style) = &self.style {
            style.apply(&mut edge.style);
        }
        if let Some(animated) = self.animated {
            edge.animated = animated;
        }
        if let Some(selected) = self.selected {
            edge.selected = selected;
        }
        if let Some(lifecycle) = self.lifecycle {
            edge.lifecycle = lifecycle;
        }
    }
}

/// Returns a copy of the collection with the patch merged into every
/// selected record. Unmatched selectors yield an unmodified copy.
pub fn update_nodes(nodes: &[Node], selector: &NodeSelector, patch: &NodePatch) -> Vec<Node> {
    nodes
        .iter()
        .map(|n| {
            if selector.selects(n) {
                let mut updated = n.clone();
                patch.apply(&mut updated);
                updated
            } else {
                n.clone()
            }
        })
        .collect()
}

pub fn update_edges(edges: &[Edge], selector: &EdgeSelector, patch: &EdgePatch) -> Vec<Edge> {
    edges
        .iter()
        .map(|e| {
            if selector.selects(e) {
                let mut updated = e.clone();
                patch.apply(&mut updated);
                updated
            } else {
                e.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    fn txt(src: &str) -> Node {
        let mut node = Node::new(
            NodeKind::Txt,
            Position::new(0.0, 0.0),
            NodeData {
                title: "prompt".into(),
                src: Some(src.into()),
                ..NodeData::default()
            },
        );
        node.status = NodeStatus::Ready;
        node
    }

    #[test]
    fn matches_all_and_any() {
        let a = txt("a cat");
        let mut b = a.clone();
        b.data.src = Some("a dog".into());

        assert!(node_matches(&a, &b, &[NodeKey::Id, NodeKey::Kind], Combine::All));
        assert!(!node_matches(
            &a,
            &b,
            &[NodeKey::Id, NodeKey::Src],
            Combine::All
        ));
        assert!(node_matches(
            &a,
            &b,
            &[NodeKey::Src, NodeKey::Id],
            Combine::Any
        ));
    }

    #[test]
    fn changed_nodes_against_baseline() {
        let a = txt("a cat");
        let b = txt("a dog");
        let baseline = vec![a.clone(), b.clone()];

        // Unchanged records produce an empty diff.
        assert!(changed_nodes(&[a.clone(), b.clone()], &baseline, SYNC_NODE_KEYS).is_empty());

        // A field edit shows up; the untouched record does not.
        let mut edited = a.clone();
        edited.data.src = Some("a hat".into());
        let diff = changed_nodes(&[edited.clone(), b], &baseline, SYNC_NODE_KEYS);
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].id, a.id);

        // Records absent from the baseline always count as changed.
        let fresh = txt("new");
        assert_eq!(changed_nodes(&[fresh], &baseline, SYNC_NODE_KEYS).len(), 1);
    }

    #[test]
    fn update_merges_one_level() {
        let a = txt("a cat");
        let nodes = vec![a.clone()];

        let updated = update_nodes(
            &nodes,
            &NodeSelector::Id(a.id),
            &NodePatch::data(NodeDataPatch {
                src: Some("a dog".into()),
                ..NodeDataPatch::default()
            }),
        );

        // src replaced, title untouched
        assert_eq!(updated[0].data.src.as_deref(), Some("a dog"));
        assert_eq!(updated[0].data.title, "prompt");
    }

    #[test]
    fn update_with_unmatched_selector_is_identity() {
        let a = txt("a cat");
        let nodes = vec![a.clone()];
        let updated = update_nodes(
            &nodes,
            &NodeSelector::Id(NodeId::new()),
            &NodePatch::status(NodeStatus::Done),
        );
        assert_eq!(updated, nodes);
    }

    #[test]
    fn predicate_and_many_pattern_selectors() {
        let a = txt("a cat");
        let b = txt("a dog");
        let nodes = vec![a.clone(), b.clone()];

        let updated = update_nodes(
            &nodes,
            &NodeSelector::Pred(&|n| n.data.src.as_deref() == Some("a dog")),
            &NodePatch::status(NodeStatus::Done),
        );
        assert_eq!(updated[0].status, NodeStatus::Ready);
        assert_eq!(updated[1].status, NodeStatus::Done);

        let patterns = vec![a.clone()];
        let updated = update_nodes(
            &nodes,
            &NodeSelector::AnyOf {
                patterns: &patterns,
                keys: &[NodeKey::Id],
            },
            &NodePatch::re_run(true),
        );
        assert!(updated[0].re_run);
        assert!(!updated[1].re_run);
    }

    #[test]
    fn img_patch_can_clear() {
        let mut a = txt("x");
        a.data.img = Some("https://img".into());
        let nodes = vec![a.clone()];

        let updated = update_nodes(
            &nodes,
            &NodeSelector::Id(a.id),
            &NodePatch::data(NodeDataPatch {
                img: Some(None),
                ..NodeDataPatch::default()
            }),
        );
        assert_eq!(updated[0].data.img, None);
    }
}
