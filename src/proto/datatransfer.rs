//! Storage-node data-transfer messages: operation headers, packet
//! headers, and acknowledgements.

use prost::{Enumeration, Message};

use crate::proto::hdfs::{DatanodeInfoProto, ExtendedBlockProto, TokenProto};

/// Status carried in operation responses and pipeline acks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum Status {
    Success = 0,
    Error = 1,
    ErrorChecksum = 2,
    ErrorInvalid = 3,
    ErrorExists = 4,
    ErrorAccessToken = 5,
    ChecksumOk = 6,
    ErrorUnsupported = 7,
    OobRestart = 8,
    OobReserved1 = 9,
    OobReserved2 = 10,
    OobReserved3 = 11,
    InProgress = 12,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum ChecksumTypeProto {
    ChecksumNull = 0,
    ChecksumCrc32 = 1,
    ChecksumCrc32c = 2,
}

/// Stage of a write pipeline. Only setup-create is issued by this client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum BlockConstructionStageProto {
    PipelineSetupAppend = 0,
    PipelineSetupAppendRecovery = 1,
    DataStreaming = 2,
    PipelineSetupStreamingRecovery = 3,
    PipelineClose = 4,
    PipelineCloseRecovery = 5,
    PipelineSetupCreate = 6,
    TransferRbw = 7,
    TransferFinalized = 8,
}

#[derive(Clone, PartialEq, Message)]
pub struct BaseHeaderProto {
    #[prost(message, required, tag = "1")]
    pub block: ExtendedBlockProto,
    /// Absent in simple auth mode.
    #[prost(message, optional, tag = "2")]
    pub token: Option<TokenProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ClientOperationHeaderProto {
    #[prost(message, required, tag = "1")]
    pub base_header: BaseHeaderProto,
    #[prost(string, required, tag = "2")]
    pub client_name: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct CachingStrategyProto {
    #[prost(bool, optional, tag = "1")]
    pub drop_behind: Option<bool>,
    #[prost(int64, optional, tag = "2")]
    pub readahead: Option<i64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ChecksumProto {
    #[prost(enumeration = "ChecksumTypeProto", required, tag = "1")]
    pub r#type: i32,
    #[prost(uint32, required, tag = "2")]
    pub bytes_per_checksum: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct OpReadBlockProto {
    #[prost(message, required, tag = "1")]
    pub header: ClientOperationHeaderProto,
    #[prost(uint64, required, tag = "2")]
    pub offset: u64,
    #[prost(uint64, required, tag = "3")]
    pub len: u64,
    #[prost(bool, optional, tag = "4", default = "true")]
    pub send_checksums: Option<bool>,
    #[prost(message, optional, tag = "5")]
    pub caching_strategy: Option<CachingStrategyProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct OpWriteBlockProto {
    #[prost(message, required, tag = "1")]
    pub header: ClientOperationHeaderProto,
    /// Downstream pipeline targets; empty when writing to the head only.
    #[prost(message, repeated, tag = "2")]
    pub targets: Vec<DatanodeInfoProto>,
    #[prost(message, optional, tag = "3")]
    pub source: Option<DatanodeInfoProto>,
    #[prost(enumeration = "BlockConstructionStageProto", required, tag = "4")]
    pub stage: i32,
    #[prost(uint32, required, tag = "5")]
    pub pipeline_size: u32,
    #[prost(uint64, required, tag = "6")]
    pub min_bytes_rcvd: u64,
    #[prost(uint64, required, tag = "7")]
    pub max_bytes_rcvd: u64,
    #[prost(uint64, required, tag = "8")]
    pub latest_generation_stamp: u64,
    #[prost(message, required, tag = "9")]
    pub requested_checksum: ChecksumProto,
    #[prost(message, optional, tag = "10")]
    pub caching_strategy: Option<CachingStrategyProto>,
}

/// Header of one data packet. Fixed-width integer encodings keep the
/// serialised header length stable for a given flag combination.
#[derive(Clone, PartialEq, Message)]
pub struct PacketHeaderProto {
    #[prost(sfixed64, required, tag = "1")]
    pub offset_in_block: i64,
    #[prost(sfixed64, required, tag = "2")]
    pub seqno: i64,
    #[prost(bool, required, tag = "3")]
    pub last_packet_in_block: bool,
    #[prost(sfixed32, required, tag = "4")]
    pub data_len: i32,
    #[prost(bool, optional, tag = "5", default = "false")]
    pub sync_block: Option<bool>,
}

#[derive(Clone, PartialEq, Message)]
pub struct PipelineAckProto {
    #[prost(sint64, required, tag = "1")]
    pub seqno: i64,
    /// One status per pipeline node, head first.
    #[prost(enumeration = "Status", repeated, packed = "false", tag = "2")]
    pub reply: Vec<i32>,
    #[prost(uint64, optional, tag = "3", default = "0")]
    pub downstream_ack_time_nanos: Option<u64>,
    #[prost(uint32, repeated, tag = "4")]
    pub flag: Vec<u32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ReadOpChecksumInfoProto {
    #[prost(message, required, tag = "1")]
    pub checksum: ChecksumProto,
    #[prost(uint64, required, tag = "2")]
    pub chunk_offset: u64,
}

/// The node's reply to a read or write operation request.
#[derive(Clone, PartialEq, Message)]
pub struct BlockOpResponseProto {
    #[prost(enumeration = "Status", required, tag = "1")]
    pub status: i32,
    #[prost(string, optional, tag = "2")]
    pub first_bad_link: Option<String>,
    #[prost(message, optional, tag = "4")]
    pub read_op_checksum_info: Option<ReadOpChecksumInfoProto>,
    #[prost(string, optional, tag = "5")]
    pub message: Option<String>,
}
