//! I/O side of gm: the graph session client and the annotation loader.
//!
//! Network failures never escape as errors from the high-level calls; they
//! are logged and treated as "no data" so correlation proceeds with whatever
//! is already known.

pub mod config;
pub mod error;
pub mod loader;
pub mod protocol;
pub mod session;
pub mod transport;

pub use config::{DEFAULT_SUBPROTOCOL, DEFAULT_TIMEOUT_MS, SessionConfig, Settings};
pub use error::{LoadError, Result, SessionError};
pub use loader::{AnnotationLoader, CancelFlag};
pub use protocol::{ClientMessage, ServerMessage};
pub use session::GraphSession;
pub use transport::{
    Connector, FrameSink, FrameStream, Inbox, MemoryConnector, Outbox, WebSocketConnector,
};
