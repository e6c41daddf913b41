//! Conversions between wire messages and the crate's data model.

use crate::config::DEFAULT_DATA_PORT;
use crate::error::{Error, Result};
use crate::model::{
    millis_to_system_time, BlockLocation, FileKind, FileSummary, Replica, ServerInfo,
};
use crate::path;
use crate::proto::hdfs::{
    DatanodeInfoProto, ExtendedBlockProto, FileTypeProto, HdfsFileStatusProto, LocatedBlockProto,
    NamespaceInfoProto,
};

/// Builds a summary for an entry returned by a listing of `dir`. The
/// wire carries only the base name; the full path is joined locally.
pub(super) fn summary_in_dir(
    proto: HdfsFileStatusProto,
    dir: &str,
    local_mode: bool,
) -> Result<FileSummary> {
    let name = String::from_utf8_lossy(&proto.path).into_owned();
    let full = path::join(dir, &[&name])?;
    summary(proto, full, local_mode)
}

/// Builds a summary for a status fetched by naming `queried` directly;
/// the wire leaves the path field empty in that case.
pub(super) fn summary_at_path(
    proto: HdfsFileStatusProto,
    queried: &str,
    local_mode: bool,
) -> Result<FileSummary> {
    summary(proto, path::normalize(queried), local_mode)
}

fn summary(proto: HdfsFileStatusProto, full_path: String, local_mode: bool) -> Result<FileSummary> {
    let kind = match FileTypeProto::try_from(proto.file_type) {
        Ok(FileTypeProto::IsDir) => FileKind::Directory,
        Ok(FileTypeProto::IsFile) => FileKind::File,
        Ok(FileTypeProto::IsSymlink) => FileKind::Symlink,
        Err(_) => {
            return Err(Error::infra(format!("unknown file type {}", proto.file_type)));
        }
    };
    let blocks = match proto.locations {
        Some(located) => Some(
            located
                .blocks
                .into_iter()
                .map(|b| block_location(b, local_mode))
                .collect::<Result<Vec<_>>>()?,
        ),
        None => None,
    };
    Ok(FileSummary {
        kind,
        name: path::basename(&full_path).to_string(),
        path: full_path,
        length: proto.length,
        permission: proto.permission.perm & 0o777,
        owner: proto.owner,
        group: proto.group,
        modified: millis_to_system_time(proto.modification_time),
        accessed: millis_to_system_time(proto.access_time),
        symlink_target: proto.symlink.map(|s| String::from_utf8_lossy(&s).into_owned()),
        replication: proto.block_replication.unwrap_or(0),
        block_size: proto.blocksize.unwrap_or(0),
        file_id: proto.file_id.unwrap_or(0),
        children: proto.children_num.unwrap_or(-1),
        storage_policy: proto.storage_policy.unwrap_or(0),
        flags: proto.flags.unwrap_or(0),
        namespace: proto.namespace,
        blocks,
    })
}

pub(super) fn block_location(proto: LocatedBlockProto, local_mode: bool) -> Result<BlockLocation> {
    let replicas = proto.locs.into_iter().map(|node| replica(node, local_mode)).collect();
    Ok(BlockLocation {
        offset: proto.offset,
        length: proto.b.num_bytes.unwrap_or(0),
        pool_id: proto.b.pool_id,
        block_id: proto.b.block_id,
        generation_stamp: proto.b.generation_stamp,
        replicas,
    })
}

fn replica(node: DatanodeInfoProto, local_mode: bool) -> Replica {
    let host = if local_mode { "localhost".to_string() } else { node.id.host_name };
    let port = match u16::try_from(node.id.xfer_port) {
        Ok(p) if p > 0 => p,
        _ => DEFAULT_DATA_PORT,
    };
    Replica { host, port, uuid: node.id.datanode_uuid, location: node.location.unwrap_or_default() }
}

/// Rebuilds the wire descriptor of a known block, carrying the client's
/// current byte count.
pub(super) fn extended_block(block: &BlockLocation) -> ExtendedBlockProto {
    ExtendedBlockProto {
        pool_id: block.pool_id.clone(),
        block_id: block.block_id,
        generation_stamp: block.generation_stamp,
        num_bytes: Some(block.length),
    }
}

pub(super) fn server_info(info: NamespaceInfoProto) -> ServerInfo {
    ServerInfo {
        build_version: info.build_version,
        block_pool_id: info.block_pool_id,
        software_version: info.software_version,
        capabilities: info.capabilities.unwrap_or(0),
    }
}
