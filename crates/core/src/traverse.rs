//! Upstream dependency traversal.
//!
//! Walks incoming edges depth-first from a start node, producing the
//! ordered `(node, incoming edges)` pairs used for both validity checking
//! and execution dispatch. The result is pre-order with the start node
//! first; consumers must not assume topological order beyond that.

use std::collections::{BTreeMap, HashSet};

use tracing::warn;

use crate::edge::Edge;
use crate::error::CoreError;
use crate::ids::NodeId;
use crate::node::{Node, NodeKind};

#[derive(Debug, Clone, PartialEq)]
pub struct PathStep {
    pub node: Node,
    pub incoming: Vec<Edge>,
}

/// Depth-first upstream walk with cycle detection.
///
/// The `seen` set covers the current path only — an id is entered on
/// descent and removed on backtrack — so diamond dependencies are legal
/// while true cycles raise `CycleDetected` carrying the closing edge.
/// Each reachable node appears in the output exactly once; reaching an
/// already-listed node off-path records the edge without re-entering it.
pub fn upstream(nodes: &[Node], edges: &[Edge], start: &Node) -> Result<Vec<PathStep>, CoreError> {
    let by_id: BTreeMap<NodeId, &Node> = nodes.iter().map(|n| (n.id, n)).collect();

    let mut path = vec![PathStep {
        node: start.clone(),
        incoming: Vec::new(),
    }];
    let mut seen = HashSet::from([start.id]);
    let mut emitted = HashSet::from([start.id]);

    explore(&by_id, edges, &mut path, 0, &mut seen, &mut emitted)?;
    Ok(path)
}

fn explore(
    by_id: &BTreeMap<NodeId, &Node>,
    edges: &[Edge],
    path: &mut Vec<PathStep>,
    at: usize,
    seen: &mut HashSet<NodeId>,
    emitted: &mut HashSet<NodeId>,
) -> Result<(), CoreError> {
    let target = path[at].node.id;

    // Reverse array order, matching connect-time ordering of the edges.
    for edge in edges.iter().rev() {
        if edge.target != target {
            continue;
        }
        if seen.contains(&edge.source) {
            return Err(CoreError::CycleDetected { edge: edge.clone() });
        }

        path[at].incoming.push(edge.clone());

        if !emitted.insert(edge.source) {
            continue;
        }
        let Some(source) = by_id.get(&edge.source) else {
            warn!(source = %edge.source, "edge references a missing source node");
            continue;
        };

        seen.insert(edge.source);
        path.push(PathStep {
            node: (*source).clone(),
            incoming: Vec::new(),
        });
        let next = path.len() - 1;
        explore(by_id, edges, path, next, seen, emitted)?;
        seen.remove(&edge.source);
    }

    Ok(())
}

/// Checks that a source node carries the input it is supposed to feed
/// downstream. `None` passes — a dangling geometry edge is handled by the
/// caller's own missing-input rule.
pub fn require_input(node: Option<&Node>) -> Result<(), CoreError> {
    let Some(node) = node else {
        return Ok(());
    };

    match node.kind {
        NodeKind::Txt => {
            if node.data.src.as_deref().unwrap_or("").is_empty() {
                return Err(CoreError::input_missing(
                    node.id,
                    "prompt (prompt can not be empty)",
                ));
            }
        }
        NodeKind::Img => {
            if node.data.img.is_none() {
                return Err(CoreError::input_missing(node.id, "img (upload an image)"));
            }
        }
        NodeKind::Sketch => {
            if node.data.img.is_none() {
                return Err(CoreError::input_missing(node.id, "img (upload a sketch)"));
            }
        }
        _ => {}
    }

    Ok(())
}
