//! Data model records returned by the coordinator and consumed by the
//! block I/O layer.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use uuid::Uuid;

/// What a path points at.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
    Symlink,
}

/// Immutable snapshot of one file-system entry.
#[derive(Debug, Clone)]
pub struct FileSummary {
    pub kind: FileKind,
    /// Final path component; empty for the root.
    pub name: String,
    /// Full absolute path.
    pub path: String,
    /// Byte length; 0 for non-files.
    pub length: u64,
    /// Low nine permission bits.
    pub permission: u32,
    pub owner: String,
    pub group: String,
    pub modified: SystemTime,
    pub accessed: SystemTime,
    pub symlink_target: Option<String>,
    /// Replication factor; files only.
    pub replication: u32,
    /// Block size; files only.
    pub block_size: u64,
    /// Opaque identifier assigned by the coordinator.
    pub file_id: u64,
    /// Number of children; directories only.
    pub children: i32,
    pub storage_policy: u32,
    pub flags: u32,
    pub namespace: Option<String>,
    /// Block locations, when the coordinator was asked for them.
    pub blocks: Option<Vec<BlockLocation>>,
}

impl FileSummary {
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }
}

/// One block of a file, with the replicas that hold it.
///
/// `length` is authoritative only once the block is closed. For the tail
/// block of a file being written it is the client's running byte count
/// until a later coordinator call reports it back.
#[derive(Debug, Clone)]
pub struct BlockLocation {
    /// Offset of this block within the file.
    pub offset: u64,
    pub length: u64,
    pub pool_id: String,
    pub block_id: u64,
    pub generation_stamp: u64,
    /// Replica endpoints in the coordinator's preference order.
    pub replicas: Vec<Replica>,
}

/// A storage node holding one replica of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replica {
    pub host: String,
    /// Data-transfer port.
    pub port: u16,
    pub uuid: String,
    /// Topology path, e.g. `/default-rack`.
    pub location: String,
}

/// Coordinator build and capability information.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub build_version: String,
    pub block_pool_id: String,
    pub software_version: String,
    pub capabilities: u64,
}

/// Per-client identity carried in every RPC request header and in
/// write-pipeline operation headers. Stable for the client's lifetime.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    id: [u8; 16],
    name: String,
}

impl ClientIdentity {
    /// Generates a fresh random identity.
    pub fn generate() -> Self {
        let uuid = Uuid::new_v4();
        ClientIdentity { id: *uuid.as_bytes(), name: format!("dfs-client-{}", uuid.simple()) }
    }

    /// The 16-byte opaque identifier.
    pub fn id(&self) -> &[u8] {
        &self.id
    }

    /// The human-readable client name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Converts coordinator epoch-millisecond timestamps to instants.
pub(crate) fn millis_to_system_time(millis: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(millis)
}
