//! Storage-node data-transfer protocol.
//!
//! A distinct framing from the coordinator RPC: no handshake, a two-byte
//! version and one opcode byte open each operation, and block contents
//! move as checksummed data packets. [`packet`] holds the wire
//! encode/decode; [`client`] drives whole block reads and writes.

pub mod client;
pub mod packet;


use num_derive::FromPrimitive;

pub use client::StorageNodeClient;

/// Data-transfer protocol version, pinned to one server generation.
pub const TRANSFER_VERSION: u16 = 28;

/// Checksum chunk size in bytes.
pub const BYTES_PER_CHECKSUM: usize = 512;

/// Largest data payload of one packet.
pub const MAX_PACKET_DATA: usize = 64 * 1024;

/// Largest operation response the client will accept.
pub const MAX_OP_RESPONSE_LEN: u64 = 1024 * 1024;

/// The single byte naming a data-transfer operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum Opcode {
    /// Stream a block from the client into a write pipeline.
    WriteBlock = 0x50,
    /// Stream a block from the node to the client.
    ReadBlock = 0x51,
}
