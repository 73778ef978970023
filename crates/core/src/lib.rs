pub mod board;
pub mod change;
pub mod connect;
pub mod diff;
pub mod edge;
pub mod error;
pub mod ids;
pub mod node;
pub mod traverse;
pub mod wire;

pub use board::Board;
pub use edge::{Connection, Edge, Handle};
pub use error::CoreError;
pub use ids::*;
pub use node::{LifecycleTag, Node, NodeKind, NodeStatus};
