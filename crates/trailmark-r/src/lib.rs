pub mod frames;
pub mod host;
pub mod router;
pub mod server;

pub use frames::{BridgeFrame, HostCall, HostCallResult, ServerFrame};
pub use host::{HOST_CALL_TIMEOUT, RemoteHost};
pub use router::route_frames;
pub use server::{RemoteServer, ServerHandle};
