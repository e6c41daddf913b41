//! File-system metadata messages and the coordinator operations built
//! from them.

use prost::{Enumeration, Message};

/// Entry kind inside [`HdfsFileStatusProto`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum FileTypeProto {
    IsDir = 1,
    IsFile = 2,
    IsSymlink = 3,
}

/// Flags passed to create. Used as a bitmask in [`CreateRequestProto`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum CreateFlagProto {
    Create = 1,
    Overwrite = 2,
    Append = 4,
}

#[derive(Clone, PartialEq, Message)]
pub struct FsPermissionProto {
    /// Low nine bits carry the permission.
    #[prost(uint32, required, tag = "1")]
    pub perm: u32,
}

/// A block identified across the whole cluster: pool, id, generation.
#[derive(Clone, PartialEq, Message)]
pub struct ExtendedBlockProto {
    #[prost(string, required, tag = "1")]
    pub pool_id: String,
    #[prost(uint64, required, tag = "2")]
    pub block_id: u64,
    #[prost(uint64, required, tag = "3")]
    pub generation_stamp: u64,
    /// Block length; for an open block this is the writer's running count.
    #[prost(uint64, optional, tag = "4", default = "0")]
    pub num_bytes: Option<u64>,
}

/// Delegation token. Carried for wire compatibility; empty in simple
/// auth mode.
#[derive(Clone, PartialEq, Message)]
pub struct TokenProto {
    #[prost(bytes = "vec", required, tag = "1")]
    pub identifier: Vec<u8>,
    #[prost(bytes = "vec", required, tag = "2")]
    pub password: Vec<u8>,
    #[prost(string, required, tag = "3")]
    pub kind: String,
    #[prost(string, required, tag = "4")]
    pub service: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct DatanodeIdProto {
    #[prost(string, required, tag = "1")]
    pub ip_addr: String,
    #[prost(string, required, tag = "2")]
    pub host_name: String,
    #[prost(string, required, tag = "3")]
    pub datanode_uuid: String,
    /// Data-transfer port.
    #[prost(uint32, required, tag = "4")]
    pub xfer_port: u32,
    #[prost(uint32, required, tag = "5")]
    pub info_port: u32,
    #[prost(uint32, required, tag = "6")]
    pub ipc_port: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct DatanodeInfoProto {
    #[prost(message, required, tag = "1")]
    pub id: DatanodeIdProto,
    /// Topology path of the node.
    #[prost(string, optional, tag = "8")]
    pub location: Option<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct LocatedBlockProto {
    #[prost(message, required, tag = "1")]
    pub b: ExtendedBlockProto,
    /// Offset of this block within the file.
    #[prost(uint64, required, tag = "2")]
    pub offset: u64,
    #[prost(message, repeated, tag = "3")]
    pub locs: Vec<DatanodeInfoProto>,
    #[prost(bool, required, tag = "4")]
    pub corrupt: bool,
    #[prost(message, required, tag = "5")]
    pub block_token: TokenProto,
}

#[derive(Clone, PartialEq, Message)]
pub struct LocatedBlocksProto {
    #[prost(uint64, required, tag = "1")]
    pub file_length: u64,
    #[prost(message, repeated, tag = "2")]
    pub blocks: Vec<LocatedBlockProto>,
    #[prost(bool, required, tag = "3")]
    pub under_construction: bool,
    #[prost(message, optional, tag = "4")]
    pub last_block: Option<LocatedBlockProto>,
    #[prost(bool, required, tag = "5")]
    pub is_last_block_complete: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct HdfsFileStatusProto {
    #[prost(enumeration = "FileTypeProto", required, tag = "1")]
    pub file_type: i32,
    /// Base name bytes in listings; empty when the caller named the path.
    #[prost(bytes = "vec", required, tag = "2")]
    pub path: Vec<u8>,
    #[prost(uint64, required, tag = "3")]
    pub length: u64,
    #[prost(message, required, tag = "4")]
    pub permission: FsPermissionProto,
    #[prost(string, required, tag = "5")]
    pub owner: String,
    #[prost(string, required, tag = "6")]
    pub group: String,
    #[prost(uint64, required, tag = "7")]
    pub modification_time: u64,
    #[prost(uint64, required, tag = "8")]
    pub access_time: u64,
    #[prost(bytes = "vec", optional, tag = "9")]
    pub symlink: Option<Vec<u8>>,
    #[prost(uint32, optional, tag = "10", default = "0")]
    pub block_replication: Option<u32>,
    #[prost(uint64, optional, tag = "11", default = "0")]
    pub blocksize: Option<u64>,
    #[prost(message, optional, tag = "12")]
    pub locations: Option<LocatedBlocksProto>,
    #[prost(uint64, optional, tag = "13", default = "0")]
    pub file_id: Option<u64>,
    #[prost(int32, optional, tag = "14", default = "-1")]
    pub children_num: Option<i32>,
    #[prost(uint32, optional, tag = "16", default = "0")]
    pub storage_policy: Option<u32>,
    #[prost(uint32, optional, tag = "18", default = "0")]
    pub flags: Option<u32>,
    #[prost(string, optional, tag = "19")]
    pub namespace: Option<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct DirectoryListingProto {
    #[prost(message, repeated, tag = "1")]
    pub partial_listing: Vec<HdfsFileStatusProto>,
    /// Entries beyond this page; the client does not page further.
    #[prost(uint32, required, tag = "2")]
    pub remaining_entries: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct StorageInfoProto {
    #[prost(uint32, required, tag = "1")]
    pub layout_version: u32,
    #[prost(uint32, required, tag = "2")]
    pub namespace_id: u32,
    #[prost(string, required, tag = "3")]
    pub cluster_id: String,
    #[prost(uint64, required, tag = "4")]
    pub c_time: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct NamespaceInfoProto {
    #[prost(string, required, tag = "1")]
    pub build_version: String,
    #[prost(uint32, required, tag = "2")]
    pub unused: u32,
    #[prost(string, required, tag = "3")]
    pub block_pool_id: String,
    #[prost(message, required, tag = "4")]
    pub storage_info: StorageInfoProto,
    #[prost(string, required, tag = "5")]
    pub software_version: String,
    #[prost(uint64, optional, tag = "6", default = "0")]
    pub capabilities: Option<u64>,
}

// --- operation bodies -------------------------------------------------

#[derive(Clone, PartialEq, Message)]
pub struct GetListingRequestProto {
    #[prost(string, required, tag = "1")]
    pub src: String,
    #[prost(bytes = "vec", required, tag = "2")]
    pub start_after: Vec<u8>,
    #[prost(bool, required, tag = "3")]
    pub need_location: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct GetListingResponseProto {
    #[prost(message, optional, tag = "1")]
    pub dir_list: Option<DirectoryListingProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct GetFileInfoRequestProto {
    #[prost(string, required, tag = "1")]
    pub src: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct GetFileInfoResponseProto {
    /// Absent when the path does not exist.
    #[prost(message, optional, tag = "1")]
    pub fs: Option<HdfsFileStatusProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct MkdirsRequestProto {
    #[prost(string, required, tag = "1")]
    pub src: String,
    #[prost(message, required, tag = "2")]
    pub masked: FsPermissionProto,
    #[prost(bool, required, tag = "3")]
    pub create_parent: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct MkdirsResponseProto {
    #[prost(bool, required, tag = "1")]
    pub result: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct CreateRequestProto {
    #[prost(string, required, tag = "1")]
    pub src: String,
    #[prost(message, required, tag = "2")]
    pub masked: FsPermissionProto,
    #[prost(string, required, tag = "3")]
    pub client_name: String,
    /// Bitmask of [`CreateFlagProto`] values.
    #[prost(uint32, required, tag = "4")]
    pub create_flag: u32,
    #[prost(bool, required, tag = "5")]
    pub create_parent: bool,
    #[prost(uint32, required, tag = "6")]
    pub replication: u32,
    #[prost(uint64, required, tag = "7")]
    pub block_size: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct CreateResponseProto {
    #[prost(message, optional, tag = "1")]
    pub fs: Option<HdfsFileStatusProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AddBlockRequestProto {
    #[prost(string, required, tag = "1")]
    pub src: String,
    #[prost(string, required, tag = "2")]
    pub client_name: String,
    /// Previous block, with the writer's byte count; sending it closes
    /// that block at the given length.
    #[prost(message, optional, tag = "3")]
    pub previous: Option<ExtendedBlockProto>,
    #[prost(message, repeated, tag = "4")]
    pub exclude_nodes: Vec<DatanodeInfoProto>,
    #[prost(uint64, optional, tag = "5", default = "0")]
    pub file_id: Option<u64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AddBlockResponseProto {
    #[prost(message, required, tag = "1")]
    pub block: LocatedBlockProto,
}

#[derive(Clone, PartialEq, Message)]
pub struct CompleteRequestProto {
    #[prost(string, required, tag = "1")]
    pub src: String,
    #[prost(string, required, tag = "2")]
    pub client_name: String,
    /// Tail block with its authoritative length.
    #[prost(message, optional, tag = "3")]
    pub last: Option<ExtendedBlockProto>,
    #[prost(uint64, optional, tag = "4", default = "0")]
    pub file_id: Option<u64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct CompleteResponseProto {
    #[prost(bool, required, tag = "1")]
    pub result: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct DeleteRequestProto {
    #[prost(string, required, tag = "1")]
    pub src: String,
    #[prost(bool, required, tag = "2")]
    pub recursive: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct DeleteResponseProto {
    #[prost(bool, required, tag = "1")]
    pub result: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct VersionRequestProto {}

#[derive(Clone, PartialEq, Message)]
pub struct VersionResponseProto {
    #[prost(message, required, tag = "1")]
    pub info: NamespaceInfoProto,
}
