use std::net::SocketAddr;

pub const INBOUND_CAP: usize = 256;
pub const OUTBOUND_CAP: usize = 256;

pub enum InboundMsg {
    ClientConnected {
        socket_addr: SocketAddr,
        thread_id: String,
    },
    ClientDisconnected,
    Frame { frame: ClientFrame },
}

pub enum OutboundMsg {
    Send { frame: ServerFrame },
    /// Written verbatim, for exercising client-side frame validation.
    Raw { text: String },
    /// Close the active client's socket.
    Kick,
}

pub use supplygraph_protocol::{ClientFrame, ServerFrame};
