pub mod network;
pub mod server;
pub mod session;

pub use network::TestNetwork;
pub use server::{SharedServer, TestServer};
pub use session::{TestSession, TestSocket};
