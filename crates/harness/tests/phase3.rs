use flowboard_core::diff::{node_by_id, NodeDataPatch};
use flowboard_core::edge::Handle;
use flowboard_core::ids::{MeshId, UserId};
use flowboard_core::node::{MeshRef, NodeData, NodeKind, NodeStatus, Position, UserRef};
use flowboard_core::wire::{SocketEvent, HEARTBEAT};
use flowboard_core::Node;
use flowboard_engine::EngineError;
use flowboard_harness::TestNetwork;
use flowboard_storage::Permissions;

fn user(name: &str) -> UserRef {
    UserRef {
        id: UserId::new(),
        name: name.into(),
    }
}

fn owner_network() -> (TestNetwork, usize) {
    let mut network = TestNetwork::new();
    let board = network.create_board("shapes", &user("ada"));
    let session = network
        .add_session(board, "ada", Permissions::OWNER)
        .unwrap();
    (network, session)
}

fn bare_node(kind: NodeKind, title: &str) -> Node {
    Node::new(
        kind,
        Position::default(),
        NodeData {
            title: title.into(),
            ..NodeData::default()
        },
    )
}

// ============================================================================
// Undo / redo (4 tests)
// ============================================================================

#[test]
fn undo_redo_round_trip() {
    let (mut network, s) = owner_network();
    let session = network.session_mut(s);

    let t1 = session.txt_node("s1");
    session.engine.push_node_data(
        t1,
        NodeDataPatch {
            src: Some("s2".into()),
            ..Default::default()
        },
        true,
    );
    session.engine.push_node_data(
        t1,
        NodeDataPatch {
            src: Some("s3".into()),
            ..Default::default()
        },
        true,
    );

    session.engine.undo();
    let src = |engine: &flowboard_engine::Engine<_>| {
        node_by_id(engine.nodes(), t1)
            .unwrap()
            .data
            .src
            .clone()
            .unwrap()
    };
    assert_eq!(src(&session.engine), "s2");

    session.engine.undo();
    assert_eq!(src(&session.engine), "s1");

    session.engine.redo();
    assert_eq!(src(&session.engine), "s2");

    session.engine.redo();
    assert_eq!(src(&session.engine), "s3");
}

#[test]
fn cosmetic_transitions_do_not_grow_the_stack() {
    let (mut network, s) = owner_network();
    let session = network.session_mut(s);

    let t1 = session.txt_node("a cat");
    let g1 = session.generated_img_node();
    assert!(session.connect(t1, Handle::Txt, g1, Handle::Prompt));
    let depth = session.engine.undo_depth();

    session.engine.select(t1);
    session.engine.unselect(None);
    let edge = session.engine.edges()[0].clone();
    session.engine.on_edge_hover(&edge, true);
    session.engine.on_edge_hover(&edge, false);
    session.engine.on_edge_click(&edge);

    assert_eq!(session.engine.undo_depth(), depth);
}

#[test]
fn undo_then_edit_discards_the_redo_branch() {
    let (mut network, s) = owner_network();
    let session = network.session_mut(s);

    let t1 = session.txt_node("s1");
    session.engine.push_node_data(
        t1,
        NodeDataPatch {
            src: Some("s2".into()),
            ..Default::default()
        },
        true,
    );

    session.engine.undo();
    assert_eq!(session.engine.redo_depth(), 1);

    session.engine.push_node_data(
        t1,
        NodeDataPatch {
            src: Some("fork".into()),
            ..Default::default()
        },
        true,
    );
    assert_eq!(session.engine.redo_depth(), 0);
}

#[test]
fn clear_history_empties_both_stacks() {
    let (mut network, s) = owner_network();
    let session = network.session_mut(s);

    let t1 = session.txt_node("s1");
    session.engine.push_node_data(
        t1,
        NodeDataPatch {
            src: Some("s2".into()),
            ..Default::default()
        },
        true,
    );
    session.engine.undo();

    session.engine.clear_history();
    assert_eq!(session.engine.undo_depth(), 0);
    assert_eq!(session.engine.redo_depth(), 0);
}

// ============================================================================
// Realtime channel (6 tests)
// ============================================================================

#[test]
fn node_update_patches_status_without_saving() {
    let (mut network, s) = owner_network();
    let server = network.server.clone();

    let t1 = network.session_mut(s).txt_node("a cat");
    let g1 = network.session_mut(s).generated_img_node();
    assert!(network.session_mut(s).connect(t1, Handle::Txt, g1, Handle::Geometry));
    let edits = server.borrow().edit_count;

    let session = network.session_mut(s);
    session.engine.apply_socket_event(SocketEvent::NodeUpdate {
        nid: g1,
        status: NodeStatus::Pending,
        data: None,
    });

    assert_eq!(session.engine.node_status(g1), Some(NodeStatus::Pending));
    assert_eq!(
        node_by_id(session.engine.nodes(), g1).unwrap().status,
        NodeStatus::Pending
    );
    // edges feeding a pending node animate
    assert!(session.engine.edges().iter().all(|e| e.animated));
    assert_eq!(server.borrow().edit_count, edits);
}

#[test]
fn node_update_can_carry_fresh_data() {
    let (mut network, s) = owner_network();
    let session = network.session_mut(s);

    let g1 = session.generated_img_node();
    session.engine.apply_socket_event(SocketEvent::NodeUpdate {
        nid: g1,
        status: NodeStatus::Done,
        data: Some(NodeData {
            title: "generated image".into(),
            img: Some("https://img.test/result".into()),
            ..NodeData::default()
        }),
    });

    let node = node_by_id(session.engine.nodes(), g1).unwrap();
    assert_eq!(node.status, NodeStatus::Done);
    assert_eq!(node.data.img.as_deref(), Some("https://img.test/result"));
}

#[test]
fn node_add_appends_without_saving_and_skips_duplicates() {
    let (mut network, s) = owner_network();
    let server = network.server.clone();
    let edits = server.borrow().edit_count;

    let incoming = bare_node(NodeKind::GeneratedImg, "from a collaborator");
    let nid = incoming.id;

    let session = network.session_mut(s);
    session
        .engine
        .apply_socket_event(SocketEvent::NodeAdd {
            data: incoming.clone(),
        });
    session
        .engine
        .apply_socket_event(SocketEvent::NodeAdd { data: incoming });

    let matches = session
        .engine
        .nodes()
        .iter()
        .filter(|n| n.id == nid)
        .count();
    assert_eq!(matches, 1);
    assert_eq!(server.borrow().edit_count, edits);
}

#[test]
fn moodboard_update_is_an_authoritative_snapshot() {
    let (mut network, s) = owner_network();
    let server = network.server.clone();

    let t1 = network.session_mut(s).txt_node("a cat");
    let board_id = network.session(s).engine.board_id();

    let mut snapshot = server.borrow().board(board_id).unwrap().clone();
    snapshot.title = "renamed elsewhere".into();
    if let Some(node) = snapshot.nodes.iter_mut().find(|n| n.id == t1) {
        node.data.src = Some("a bat".into());
    }

    let session = network.session_mut(s);
    session
        .engine
        .apply_socket_event(SocketEvent::MoodboardUpdate { data: snapshot });

    assert_eq!(session.engine.title(), "renamed elsewhere");
    assert_eq!(
        node_by_id(session.engine.nodes(), t1)
            .unwrap()
            .data
            .src
            .as_deref(),
        Some("a bat")
    );
}

#[test]
fn sockets_open_for_editors_only_and_heartbeat() {
    let mut network = TestNetwork::new();
    let board = network.create_board("shapes", &user("ada"));
    let owner = network.add_session(board, "ada", Permissions::OWNER).unwrap();
    let viewer = network
        .add_session(board, "visitor", Permissions::VIEWER)
        .unwrap();

    assert!(network.session(viewer).socket.is_none());

    let session = network.session_mut(owner);
    let socket = session.socket.as_mut().expect("owner socket");
    socket.heartbeat().unwrap();
    assert_eq!(session.socket_frames.borrow().as_slice(), [HEARTBEAT]);
}

#[test]
fn unknown_messages_are_ignored() {
    let (mut network, s) = owner_network();
    let session = network.session_mut(s);

    session.txt_node("a cat");
    let nodes_before = session.engine.nodes().to_vec();

    let frames = [
        r#"{"type":"meshSegmented","nid":"x"}"#,
        "not even json",
    ];
    let socket = session.socket.as_mut().expect("owner socket");
    for frame in frames {
        socket.receive(&mut session.engine, frame);
    }

    assert_eq!(session.engine.nodes(), nodes_before.as_slice());
}

#[test]
fn unmounted_engines_stop_reacting() {
    let (mut network, s) = owner_network();
    let session = network.session_mut(s);

    session.txt_node("a cat");
    let nodes_before = session.engine.nodes().len();

    session.engine.unmount();
    session.engine.apply_socket_event(SocketEvent::NodeAdd {
        data: bare_node(NodeKind::GeneratedImg, "late arrival"),
    });

    assert_eq!(session.engine.nodes().len(), nodes_before);
}

// ============================================================================
// Execution trigger (4 tests)
// ============================================================================

#[test]
fn run_dispatches_the_validated_path_with_statuses() {
    let (mut network, s) = owner_network();
    let server = network.server.clone();

    let t1 = network.session_mut(s).txt_node("a cat");
    let g1 = network.session_mut(s).generated_img_node();
    assert!(network.session_mut(s).connect(t1, Handle::Txt, g1, Handle::Geometry));

    network
        .session_mut(s)
        .engine
        .set_node_status(g1, NodeStatus::Running);
    network.session_mut(s).engine.run(g1, true).unwrap();

    let guard = server.borrow();
    assert_eq!(guard.run_log.len(), 1);
    let (board_id, steps) = &guard.run_log[0];
    assert_eq!(*board_id, network.session(s).engine.board_id());
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].node.id, g1);
    // current status is attached and the re-run flag rides along
    assert_eq!(steps[0].node.status, NodeStatus::Running);
    assert!(steps.iter().all(|step| step.re_run));
    // heavy data fields stay off the wire
    assert!(steps.iter().all(|step| step.node.data.img.is_none()));
}

#[test]
fn run_without_edit_rights_is_a_silent_noop() {
    let mut network = TestNetwork::new();
    let board = network.create_board("shapes", &user("ada"));
    let server = network.server.clone();
    let s = network
        .add_session(board, "visitor", Permissions::VIEWER)
        .unwrap();

    let t1 = network.session_mut(s).txt_node("a cat");
    network.session_mut(s).engine.run(t1, false).unwrap();

    assert!(server.borrow().run_log.is_empty());
}

#[test]
fn run_with_an_invalid_path_skips_dispatch() {
    let (mut network, s) = owner_network();
    let server = network.server.clone();

    let t1 = network.session_mut(s).txt_node("");
    let g1 = network.session_mut(s).generated_img_node();
    assert!(network.session_mut(s).connect(t1, Handle::Txt, g1, Handle::Geometry));

    network.session_mut(s).engine.run(g1, false).unwrap();
    assert!(server.borrow().run_log.is_empty());
}

#[test]
fn caption_requests_pass_through() {
    let (mut network, s) = owner_network();
    let server = network.server.clone();

    let t1 = network.session_mut(s).txt_node("a cat");
    network.session_mut(s).engine.caption_node(t1).unwrap();

    assert_eq!(server.borrow().captioned, vec![t1]);
}

// ============================================================================
// Mesh lookups (1 test)
// ============================================================================

#[test]
fn missing_mesh_reads_as_not_yet_present() {
    let (mut network, s) = owner_network();
    let session = network.session_mut(s);

    let m1 = session.mesh_node();
    assert!(matches!(
        session.engine.primary_mesh(m1),
        Err(EngineError::MeshNotFound(_))
    ));

    let mesh = MeshRef {
        id: MeshId::new(),
        url: "https://mesh.test/m1.obj".into(),
    };
    session.engine.attach_mesh(m1, mesh.clone()).unwrap();
    // idempotent add-if-missing
    session.engine.attach_mesh(m1, mesh.clone()).unwrap();

    let node = node_by_id(session.engine.nodes(), m1).unwrap();
    assert_eq!(node.data.playground.as_ref().unwrap().meshes.len(), 1);
    assert_eq!(session.engine.primary_mesh(m1).unwrap().url, mesh.url);
}
