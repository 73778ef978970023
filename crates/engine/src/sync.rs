//! Realtime sync channel consumer.
//!
//! One connection per authenticated user, opened only while the actor
//! holds owner or editor permission, multiplexing events for every board
//! that user can edit. Inbound patches flow through the same
//! reconciliation paths as everything else and never trigger a save.

use tracing::{debug, warn};

use flowboard_core::diff::{NodeDataPatch, NodePatch};
use flowboard_core::node::NodeData;
use flowboard_core::wire::{self, SocketEvent};
use flowboard_storage::{Permissions, PermissionService, Persistence};

use crate::{Engine, EngineError};

pub const HEARTBEAT_INTERVAL_SECS: u64 = 10;

/// Outbound half of the realtime channel. One method keeps the harness
/// trivially able to capture frames.
pub trait SocketTransport {
    fn send(&mut self, frame: &str) -> Result<(), EngineError>;
}

pub struct SocketSession<T: SocketTransport> {
    transport: T,
}

impl<T: SocketTransport> SocketSession<T> {
    /// Open a session for an editing actor. Viewers get none.
    pub fn connect(transport: T, perms: Permissions) -> Option<Self> {
        if !perms.can_edit() {
            debug!("socket not opened for a non-editing actor");
            return None;
        }
        Some(Self { transport })
    }

    /// Keep-alive, driven by the shell every `HEARTBEAT_INTERVAL_SECS`.
    pub fn heartbeat(&mut self) -> Result<(), EngineError> {
        self.transport.send(wire::HEARTBEAT)
    }

    /// Decode one inbound frame and apply it. Unknown message types are
    /// logged and ignored.
    pub fn receive<S>(&mut self, engine: &mut Engine<S>, frame: &str)
    where
        S: Persistence + PermissionService,
    {
        match SocketEvent::from_json(frame) {
            Ok(event) => engine.apply_socket_event(event),
            Err(e) => warn!(error = %e, "ignoring unrecognized socket message"),
        }
    }
}

fn data_patch(data: NodeData) -> NodeDataPatch {
    NodeDataPatch {
        title: Some(data.title),
        src: data.src,
        img: data.img.map(Some),
        playground: data.playground.map(Some),
    }
}

impl<S: Persistence + PermissionService> Engine<S> {
    /// Apply one typed realtime event. None of these trigger a save.
    pub fn apply_socket_event(&mut self, event: SocketEvent) {
        if !self.mounted {
            return;
        }

        let before = self.checkpoint();
        match event {
            SocketEvent::NodeUpdate { nid, status, data } => {
                debug!(node = %nid, ?status, "realtime node update");
                self.set_node_status_inner(nid, status);
                self.update_node_inner(nid, &NodePatch::status(status));
                if let Some(data) = data {
                    self.push_node_data_inner(nid, data_patch(data), false);
                }
            }
            SocketEvent::MoodboardUpdate { data } => {
                debug!(board = %data.id, "realtime board snapshot");
                self.init_inner(&data);
            }
            SocketEvent::NodeAdd { data } => {
                debug!(node = %data.id, "realtime node add");
                let status = data.status;
                let owner = data.owner.clone();
                self.add_node_inner(data, status, owner, false);
            }
        }
        self.commit(before);
    }
}
