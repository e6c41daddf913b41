//! Coordinator RPC envelope messages: the per-connection handshake
//! context and the per-call request/response headers.

use prost::{Enumeration, Message};

/// RPC serialisation kind. Only the protocol-buffer kind is spoken here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum RpcKindProto {
    RpcBuiltin = 0,
    RpcWritable = 1,
    RpcProtocolBuffer = 2,
}

/// Per-request operation selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum RpcOperationProto {
    RpcFinalPacket = 0,
    RpcContinuationPacket = 1,
    RpcCloseConnection = 2,
}

/// Server-reported status of one call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum RpcStatusProto {
    Success = 0,
    Error = 1,
    Fatal = 2,
}

/// First header of every request frame, and of the handshake context.
#[derive(Clone, PartialEq, Message)]
pub struct RpcRequestHeaderProto {
    #[prost(enumeration = "RpcKindProto", optional, tag = "1")]
    pub rpc_kind: Option<i32>,
    #[prost(enumeration = "RpcOperationProto", optional, tag = "2")]
    pub rpc_op: Option<i32>,
    /// Monotonic per-connection call id; `-3` for the connection context.
    #[prost(sint32, required, tag = "3")]
    pub call_id: i32,
    /// The client's 16-byte opaque identifier.
    #[prost(bytes = "vec", required, tag = "4")]
    pub client_id: Vec<u8>,
    #[prost(sint32, optional, tag = "5", default = "-1")]
    pub retry_count: Option<i32>,
}

/// Second header of every request frame: which method of which protocol.
#[derive(Clone, PartialEq, Message)]
pub struct RequestHeaderProto {
    #[prost(string, required, tag = "1")]
    pub method_name: String,
    #[prost(string, required, tag = "2")]
    pub declaring_class_protocol_name: String,
    #[prost(uint64, required, tag = "3")]
    pub client_protocol_version: u64,
}

/// Header of every response frame.
#[derive(Clone, PartialEq, Message)]
pub struct RpcResponseHeaderProto {
    #[prost(uint32, required, tag = "1")]
    pub call_id: u32,
    #[prost(enumeration = "RpcStatusProto", required, tag = "2")]
    pub status: i32,
    #[prost(uint32, optional, tag = "3")]
    pub server_ipc_version_num: Option<u32>,
    /// Exception class name on the server, when the call failed there.
    #[prost(string, optional, tag = "4")]
    pub exception_class_name: Option<String>,
    #[prost(string, optional, tag = "5")]
    pub error_msg: Option<String>,
    #[prost(bytes = "vec", optional, tag = "7")]
    pub client_id: Option<Vec<u8>>,
    #[prost(sint32, optional, tag = "8", default = "-1")]
    pub retry_count: Option<i32>,
}

/// User identity presented during the handshake.
#[derive(Clone, PartialEq, Message)]
pub struct UserInformationProto {
    #[prost(string, optional, tag = "1")]
    pub effective_user: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub real_user: Option<String>,
}

/// Connection context sent once per connection, after the magic header.
#[derive(Clone, PartialEq, Message)]
pub struct IpcConnectionContextProto {
    #[prost(message, optional, tag = "2")]
    pub user_info: Option<UserInformationProto>,
    /// Name of the protocol this connection will speak.
    #[prost(string, optional, tag = "3")]
    pub protocol: Option<String>,
}
