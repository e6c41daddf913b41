//! Coordinator metadata client.
//!
//! Every operation opens a connection lazily, speaks one or two strictly
//! paired calls, and closes it on return. Configured endpoints are tried
//! in order: a semantic [`Error::NotFound`] propagates immediately, any
//! other failure advances to the next endpoint, and exhaustion wraps the
//! last cause as [`Error::Infrastructure`].

mod convert;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use prost::Message;
use tracing::debug;

use crate::config::{ClientConfig, Endpoint};
use crate::error::{Error, Result};
use crate::model::{ClientIdentity, FileSummary, ServerInfo};
use crate::proto::hdfs::{
    AddBlockRequestProto, AddBlockResponseProto, CompleteRequestProto, CompleteResponseProto,
    CreateFlagProto, CreateRequestProto, CreateResponseProto, DeleteRequestProto,
    DeleteResponseProto, FsPermissionProto, GetFileInfoRequestProto, GetFileInfoResponseProto,
    GetListingRequestProto, GetListingResponseProto, MkdirsRequestProto, MkdirsResponseProto,
    VersionRequestProto, VersionResponseProto,
};
use crate::rpc::{Protocol, RpcConnection, CLIENT_PROTOCOL, NAMENODE_PROTOCOL};

// Method names are fixed constants; the reference implementation derives
// them from request type names by reflection, which has no counterpart
// here.
const METHOD_GET_LISTING: &str = "getListing";
const METHOD_GET_FILE_INFO: &str = "getFileInfo";
const METHOD_MKDIRS: &str = "mkdirs";
const METHOD_CREATE: &str = "create";
const METHOD_ADD_BLOCK: &str = "addBlock";
const METHOD_COMPLETE: &str = "complete";
const METHOD_DELETE: &str = "delete";
const METHOD_VERSION: &str = "versionRequest";

/// Permission bits given to new directories.
const DIR_PERMISSION: u32 = 0o755;

/// Permission bits given to new files.
const FILE_PERMISSION: u32 = 0o644;

/// Client for the coordinator's metadata operations.
#[derive(Clone)]
pub struct CoordinatorClient {
    config: Arc<ClientConfig>,
    identity: ClientIdentity,
}

impl CoordinatorClient {
    /// Fails with [`Error::InvalidArgument`] when no endpoint is
    /// configured.
    pub fn new(config: Arc<ClientConfig>, identity: ClientIdentity) -> Result<Self> {
        if config.endpoints.is_empty() {
            return Err(Error::InvalidArgument("no coordinator endpoints configured".into()));
        }
        Ok(CoordinatorClient { config, identity })
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// Coordinator build and capability information.
    pub async fn version(&self) -> Result<ServerInfo> {
        let resp: VersionResponseProto =
            self.exchange(&NAMENODE_PROTOCOL, METHOD_VERSION, &VersionRequestProto {}).await?;
        Ok(convert::server_info(resp.info))
    }

    /// Lists `path` one level deep, truncated at the coordinator's page
    /// size. Entries carry block locations.
    pub async fn list(&self, path: &str) -> Result<Vec<FileSummary>> {
        let req = GetListingRequestProto {
            src: path.to_string(),
            start_after: Vec::new(),
            need_location: true,
        };
        let resp: GetListingResponseProto =
            self.exchange(&CLIENT_PROTOCOL, METHOD_GET_LISTING, &req).await?;
        let listing = resp.dir_list.ok_or_else(|| Error::NotFound(path.to_string()))?;
        listing
            .partial_listing
            .into_iter()
            .map(|entry| convert::summary_in_dir(entry, path, self.config.local_mode))
            .collect()
    }

    /// Returns the summary of `path`, or `None` when it does not exist.
    pub async fn stat(&self, path: &str) -> Result<Option<FileSummary>> {
        let req = GetFileInfoRequestProto { src: path.to_string() };
        let resp: GetFileInfoResponseProto =
            self.exchange(&CLIENT_PROTOCOL, METHOD_GET_FILE_INFO, &req).await?;
        resp.fs
            .map(|fs| convert::summary_at_path(fs, path, self.config.local_mode))
            .transpose()
    }

    /// Creates a directory and returns its summary.
    pub async fn mkdir(&self, path: &str, create_parents: bool) -> Result<FileSummary> {
        let req = MkdirsRequestProto {
            src: path.to_string(),
            masked: FsPermissionProto { perm: DIR_PERMISSION },
            create_parent: create_parents,
        };
        let resp: MkdirsResponseProto =
            self.exchange(&CLIENT_PROTOCOL, METHOD_MKDIRS, &req).await?;
        if !resp.result {
            return Err(Error::infra(format!("coordinator refused mkdir of {path}")));
        }
        match self.stat(path).await? {
            Some(summary) => Ok(summary),
            None => Err(Error::infra(format!("created directory {path} has no summary"))),
        }
    }

    /// Allocates a new file entry. No blocks are assigned yet.
    pub async fn create(
        &self,
        path: &str,
        create_parent: bool,
        replication: u32,
        block_size: u64,
    ) -> Result<FileSummary> {
        let req = CreateRequestProto {
            src: path.to_string(),
            masked: FsPermissionProto { perm: FILE_PERMISSION },
            client_name: self.identity.name().to_string(),
            create_flag: CreateFlagProto::Create as u32,
            create_parent,
            replication,
            block_size,
        };
        let resp: CreateResponseProto =
            self.exchange(&CLIENT_PROTOCOL, METHOD_CREATE, &req).await?;
        let fs = resp
            .fs
            .ok_or_else(|| Error::infra(format!("create of {path} returned no file status")))?;
        convert::summary_at_path(fs, path, self.config.local_mode)
    }

    /// Asks for one more block of `file`. The last known block, if any,
    /// is reported back with its running length, which implicitly closes
    /// it. Returns the summary with the new block appended.
    pub async fn add_block(&self, file: &FileSummary) -> Result<FileSummary> {
        let req = AddBlockRequestProto {
            src: file.path.clone(),
            client_name: self.identity.name().to_string(),
            previous: file.blocks.as_ref().and_then(|b| b.last()).map(convert::extended_block),
            exclude_nodes: Vec::new(),
            file_id: Some(file.file_id),
        };
        let resp: AddBlockResponseProto =
            self.exchange(&CLIENT_PROTOCOL, METHOD_ADD_BLOCK, &req).await?;
        let block = convert::block_location(resp.block, self.config.local_mode)?;
        let mut updated = file.clone();
        updated.blocks.get_or_insert_with(Vec::new).push(block);
        Ok(updated)
    }

    /// Completes `file`, reporting the tail block's authoritative length.
    pub async fn complete(&self, file: &FileSummary, last_block_length: u64) -> Result<bool> {
        let last = file.blocks.as_ref().and_then(|b| b.last()).map(|b| {
            let mut ext = convert::extended_block(b);
            ext.num_bytes = Some(last_block_length);
            ext
        });
        let req = CompleteRequestProto {
            src: file.path.clone(),
            client_name: self.identity.name().to_string(),
            last,
            file_id: Some(file.file_id),
        };
        let resp: CompleteResponseProto =
            self.exchange(&CLIENT_PROTOCOL, METHOD_COMPLETE, &req).await?;
        Ok(resp.result)
    }

    /// Deletes `path` non-recursively. Returns the coordinator's verdict.
    pub async fn delete(&self, path: &str) -> Result<bool> {
        let req = DeleteRequestProto { src: path.to_string(), recursive: false };
        let resp: DeleteResponseProto =
            self.exchange(&CLIENT_PROTOCOL, METHOD_DELETE, &req).await?;
        Ok(resp.result)
    }

    async fn exchange<Resp>(
        &self,
        protocol: &Protocol,
        method: &str,
        body: &impl Message,
    ) -> Result<Resp>
    where
        Resp: Message + Default,
    {
        let mut last_error = None;
        for endpoint in &self.config.endpoints {
            match self.exchange_once(endpoint, protocol, method, body).await {
                Ok(resp) => return Ok(resp),
                Err(err @ Error::NotFound(_)) => return Err(err),
                Err(err) => {
                    debug!(%endpoint, method, error = %err, "endpoint failed, advancing");
                    last_error = Some(err);
                }
            }
        }
        let attempts = self.config.endpoints.len();
        Err(match last_error {
            Some(err) => Error::infra_with(
                format!("{method} failed on all {attempts} coordinator endpoints"),
                err,
            ),
            None => Error::infra(format!("{method} had no coordinator endpoint to try")),
        })
    }

    async fn exchange_once<Resp>(
        &self,
        endpoint: &Endpoint,
        protocol: &Protocol,
        method: &str,
        body: &impl Message,
    ) -> Result<Resp>
    where
        Resp: Message + Default,
    {
        let mut conn =
            RpcConnection::connect(endpoint, &self.identity, &self.config, protocol).await?;
        let bytes = conn.call(protocol, method, body).await?;
        Resp::decode_length_delimited(&mut &bytes[..]).map_err(Into::into)
    }
}
