//! Coordinator RPC plumbing: the per-connection handshake and the
//! length-prefixed call framing.
//!
//! [`call`] holds the pure buffer encode/decode; [`connection`] owns the
//! socket and pairs each request with its response.

pub mod call;
pub mod connection;


pub use connection::RpcConnection;

/// Magic bytes opening every coordinator connection.
pub const MAGIC: &[u8; 4] = b"hrpc";

/// RPC envelope version.
pub const VERSION: u8 = 9;

/// Service class byte (protocol-buffer serialisation).
pub const SERVICE_CLASS: u8 = 0;

/// Auth selector byte (simple).
pub const AUTH_SIMPLE: u8 = 0;

/// Reserved call id of the synthetic connection-context call.
pub const CONTEXT_CALL_ID: i32 = -3;

/// Largest response frame the client will accept.
pub const MAX_RESPONSE_LEN: u32 = 64 * 1024 * 1024;

/// A logical protocol spoken over a coordinator connection.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Protocol {
    pub name: &'static str,
    pub version: u64,
}

/// The client-facing metadata protocol; everything but `version` uses it.
pub const CLIENT_PROTOCOL: Protocol =
    Protocol { name: "org.apache.hadoop.hdfs.protocol.ClientProtocol", version: 1 };

/// The coordinator-internal protocol, used only to discover build info.
pub const NAMENODE_PROTOCOL: Protocol =
    Protocol { name: "org.apache.hadoop.hdfs.server.protocol.NamenodeProtocol", version: 1 };
