pub mod activity;
pub mod connection;
pub mod listener;

pub use activity::{Activity, ActivityIo};
pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{Accepted, Listener, ListenerError};
