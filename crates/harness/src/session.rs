use std::cell::RefCell;
use std::rc::Rc;

use flowboard_core::edge::{Connection, Handle};
use flowboard_core::ids::{BoardId, NodeId, UserId};
use flowboard_core::node::{Node, NodeData, NodeKind, NodeStatus, Position, UserRef};
use flowboard_engine::{Engine, EngineError, SocketSession, SocketTransport};
use flowboard_storage::{SqliteCache, StorageError};

use crate::server::{SharedServer, TestServer};

/// Transport double that records every outbound frame.
#[derive(Clone, Default)]
pub struct TestSocket {
    pub sent: Rc<RefCell<Vec<String>>>,
}

impl SocketTransport for TestSocket {
    fn send(&mut self, frame: &str) -> Result<(), EngineError> {
        self.sent.borrow_mut().push(frame.to_string());
        Ok(())
    }
}

/// One actor's client: an engine bound to the shared server, plus its
/// realtime session when the actor may edit.
pub struct TestSession {
    pub user: UserRef,
    pub engine: Engine<SharedServer>,
    pub socket: Option<SocketSession<TestSocket>>,
    pub socket_frames: Rc<RefCell<Vec<String>>>,
}

impl TestSession {
    pub fn new(
        server: &Rc<RefCell<TestServer>>,
        board: BoardId,
        name: &str,
    ) -> Result<Self, StorageError> {
        let user = UserRef {
            id: UserId::new(),
            name: name.to_string(),
        };
        let api = SharedServer::new(Rc::clone(server), user.id);
        let cache = SqliteCache::open_in_memory()?;
        let engine = Engine::new(api, cache, board, user.clone());

        Ok(Self {
            user,
            engine,
            socket: None,
            socket_frames: Rc::new(RefCell::new(Vec::new())),
        })
    }

    /// Fetch permissions and the board, then open the realtime session if
    /// the actor holds edit rights.
    pub fn login(&mut self) -> Result<(), EngineError> {
        self.engine.init_perms()?;
        self.engine.load()?;

        if let Some(perms) = self.engine.perms() {
            let transport = TestSocket {
                sent: Rc::clone(&self.socket_frames),
            };
            self.socket = SocketSession::connect(transport, perms);
        }
        Ok(())
    }

    pub fn user_id(&self) -> UserId {
        self.user.id
    }

    fn make_node(&self, kind: NodeKind, title: &str) -> Node {
        Node::new(
            kind,
            Position::default(),
            NodeData {
                title: title.to_string(),
                ..NodeData::default()
            },
        )
    }

    /// Optimistically add a text prompt node owned by this actor.
    pub fn txt_node(&mut self, src: &str) -> NodeId {
        let mut node = self.make_node(NodeKind::Txt, "prompt");
        node.data.src = Some(src.to_string());
        let id = node.id;
        self.engine
            .add_node(node, NodeStatus::Ready, Some(self.user.clone()), true);
        id
    }

    pub fn img_node(&mut self, img: Option<&str>) -> NodeId {
        let mut node = self.make_node(NodeKind::Img, "image");
        node.data.img = img.map(str::to_string);
        let id = node.id;
        self.engine
            .add_node(node, NodeStatus::Static, Some(self.user.clone()), true);
        id
    }

    pub fn generated_img_node(&mut self) -> NodeId {
        let node = self.make_node(NodeKind::GeneratedImg, "generated image");
        let id = node.id;
        self.engine
            .add_node(node, NodeStatus::Ready, Some(self.user.clone()), true);
        id
    }

    pub fn mesh_node(&mut self) -> NodeId {
        let node = self.make_node(NodeKind::Mesh, "mesh");
        let id = node.id;
        self.engine
            .add_node(node, NodeStatus::Ready, Some(self.user.clone()), true);
        id
    }

    /// A comment node; anonymous when `owner` is false.
    pub fn comment_node(&mut self, text: &str, owned: bool) -> NodeId {
        let mut node = self.make_node(NodeKind::Comment, "comment");
        node.data.src = Some(text.to_string());
        let id = node.id;
        let owner = owned.then(|| self.user.clone());
        self.engine.add_node(node, NodeStatus::Static, owner, true);
        id
    }

    /// Attempt a connection through validation; reports whether the edge
    /// was accepted.
    pub fn connect(
        &mut self,
        source: NodeId,
        source_handle: Handle,
        target: NodeId,
        target_handle: Handle,
    ) -> bool {
        let conn = Connection::new(source, source_handle, target, target_handle);
        let accepted = self.engine.is_valid_connection(&conn);
        self.engine.on_connect(&conn);
        accepted
    }
}
