//! Connect-time validation of a pending edge.

use crate::diff::node_by_id;
use crate::edge::{same_endpoints, Connection, Edge, Handle};
use crate::node::Node;

/// Whether a new edge may be created for `conn`.
///
/// Rules, in order:
/// 1. an identical `(source, target, sourceHandle, targetHandle)` edge
///    must not already exist;
/// 2. `prompt` targets accept only `txt` sources;
/// 3. `style` targets reject `mesh` and `sketch` sources;
/// 4. `geometry` targets reject `mesh` sources and hold at most one
///    incoming edge — reconnecting the same source is allowed;
/// 5. anything else is permitted.
pub fn is_valid_connection(nodes: &[Node], edges: &[Edge], conn: &Connection) -> bool {
    let Some(source_handle) = conn.source_handle else {
        return false;
    };

    if edges.iter().any(|e| same_endpoints(e, conn)) {
        return false;
    }

    match conn.target_handle {
        Some(Handle::Prompt) => source_handle == Handle::Txt,
        Some(Handle::Style) => !matches!(source_handle, Handle::Mesh | Handle::Sketch),
        Some(Handle::Geometry) => {
            if source_handle == Handle::Mesh {
                return false;
            }
            if node_by_id(nodes, conn.target).is_none() {
                return false;
            }
            let occupied = edges
                .iter()
                .find(|e| e.target == conn.target && e.target_handle == Some(Handle::Geometry));
            match occupied {
                Some(existing) => existing.source == conn.source,
                None => true,
            }
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeData, NodeKind, Position};

    fn node(kind: NodeKind) -> Node {
        Node::new(kind, Position::default(), NodeData::default())
    }

    fn graph() -> (Vec<Node>, Vec<Edge>) {
        (
            vec![
                node(NodeKind::Txt),
                node(NodeKind::Img),
                node(NodeKind::Mesh),
                node(NodeKind::GeneratedImg),
            ],
            Vec::new(),
        )
    }

    #[test]
    fn prompt_accepts_only_txt() {
        let (nodes, edges) = graph();
        let txt = &nodes[0];
        let img = &nodes[1];
        let r#gen = &nodes[3];

        let ok = Connection::new(txt.id, Handle::Txt, r#gen.id, Handle::Prompt);
        assert!(is_valid_connection(&nodes, &edges, &ok));

        let bad = Connection::new(img.id, Handle::Img, r#gen.id, Handle::Prompt);
        assert!(!is_valid_connection(&nodes, &edges, &bad));
    }

    #[test]
    fn style_rejects_mesh_and_sketch_sources() {
        let (nodes, edges) = graph();
        let r#gen = &nodes[3];

        for (source_handle, expect) in [
            (Handle::Mesh, false),
            (Handle::Sketch, false),
            (Handle::Img, true),
            (Handle::Txt, true),
        ] {
            let conn = Connection::new(nodes[1].id, source_handle, r#gen.id, Handle::Style);
            assert_eq!(is_valid_connection(&nodes, &edges, &conn), expect);
        }
    }

    #[test]
    fn duplicate_edge_rejected() {
        let (nodes, mut edges) = graph();
        let conn = Connection::new(nodes[0].id, Handle::Txt, nodes[3].id, Handle::Prompt);
        edges.push(Edge::from(&conn));

        assert!(!is_valid_connection(&nodes, &edges, &conn));
    }

    #[test]
    fn geometry_holds_a_single_source() {
        let (nodes, mut edges) = graph();
        let img = &nodes[1];
        let sketch_source = &nodes[0];
        let r#gen = &nodes[3];

        // unoccupied handle accepts
        let first = Connection::new(img.id, Handle::Img, r#gen.id, Handle::Geometry);
        assert!(is_valid_connection(&nodes, &edges, &first));
        edges.push(Edge::from(&first));

        // a different source is rejected while occupied
        let second = Connection::new(sketch_source.id, Handle::Txt, r#gen.id, Handle::Geometry);
        assert!(!is_valid_connection(&nodes, &edges, &second));

        // the same source may reconnect on a different handle pair
        let reconnect = Connection::new(img.id, Handle::Sketch, r#gen.id, Handle::Geometry);
        assert!(is_valid_connection(&nodes, &edges, &reconnect));
    }

    #[test]
    fn geometry_rejects_mesh_sources_and_missing_targets() {
        let (nodes, edges) = graph();
        let mesh = &nodes[2];
        let r#gen = &nodes[3];

        let from_mesh = Connection::new(mesh.id, Handle::Mesh, r#gen.id, Handle::Geometry);
        assert!(!is_valid_connection(&nodes, &edges, &from_mesh));

        let dangling = Connection::new(
            nodes[0].id,
            Handle::Txt,
            crate::ids::NodeId::new(),
            Handle::Geometry,
        );
        assert!(!is_valid_connection(&nodes, &edges, &dangling));
    }

    #[test]
    fn missing_source_handle_rejected() {
        let (nodes, edges) = graph();
        let conn = Connection {
            source: nodes[0].id,
            target: nodes[3].id,
            source_handle: None,
            target_handle: Some(Handle::Prompt),
        };
        assert!(!is_valid_connection(&nodes, &edges, &conn));
    }
}
