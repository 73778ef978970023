use std::cell::RefCell;
use std::rc::Rc;

use flowboard_core::board::Board;
use flowboard_core::ids::BoardId;
use flowboard_core::node::UserRef;
use flowboard_storage::{Permissions, StorageError};

use crate::server::TestServer;
use crate::session::TestSession;

/// A shared server plus any number of client sessions, with explicit
/// broadcast delivery so tests control the interleaving.
pub struct TestNetwork {
    pub server: Rc<RefCell<TestServer>>,
    sessions: Vec<TestSession>,
}

impl Default for TestNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl TestNetwork {
    pub fn new() -> Self {
        Self {
            server: Rc::new(RefCell::new(TestServer::new())),
            sessions: Vec::new(),
        }
    }

    /// Seed a board owned by `owner` straight into the server.
    pub fn create_board(&mut self, title: &str, owner: &UserRef) -> BoardId {
        let board = Board::new(title, owner.clone());
        let id = board.id;
        self.server.borrow_mut().insert_board(board);
        id
    }

    /// Create a session with the given permissions and log it in.
    pub fn add_session(
        &mut self,
        board: BoardId,
        name: &str,
        perms: Permissions,
    ) -> Result<usize, StorageError> {
        let mut session = TestSession::new(&self.server, board, name)?;
        self.server
            .borrow_mut()
            .set_permissions(board, session.user_id(), perms);
        session
            .login()
            .map_err(|e| StorageError::Remote(e.to_string()))?;

        let index = self.sessions.len();
        self.sessions.push(session);
        Ok(index)
    }

    pub fn session(&self, index: usize) -> &TestSession {
        &self.sessions[index]
    }

    pub fn session_mut(&mut self, index: usize) -> &mut TestSession {
        &mut self.sessions[index]
    }

    /// Deliver queued broadcast events to every eligible session: anyone
    /// but the origin actor who holds edit rights on their board. Returns
    /// the number of deliveries.
    pub fn flush(&mut self) -> usize {
        let events = self.server.borrow_mut().drain_outbox();
        let mut delivered = 0;

        for (origin, event) in events {
            for session in &mut self.sessions {
                if session.user_id() == origin {
                    continue;
                }
                let perms = self
                    .server
                    .borrow()
                    .permissions(session.engine.board_id(), session.user_id());
                if !perms.can_edit() {
                    continue;
                }
                session.engine.apply_socket_event(event.clone());
                delivered += 1;
            }
        }

        delivered
    }
}
