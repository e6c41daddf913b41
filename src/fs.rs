//! The composite file client: a file-system-like surface stitched from
//! the coordinator metadata client and the storage-node block client.

use std::sync::Arc;

use encoding_rs::Encoding;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::debug;

use crate::config::ClientConfig;
use crate::coordinator::CoordinatorClient;
use crate::datatransfer::StorageNodeClient;
use crate::error::{Error, Result};
use crate::model::{BlockLocation, ClientIdentity, FileSummary, ServerInfo};
use crate::path;

/// High-level DFS client.
///
/// Thread-safe for concurrent use by independent operations; every
/// operation opens its own connections.
#[derive(Clone)]
pub struct DfsClient {
    config: Arc<ClientConfig>,
    coordinator: CoordinatorClient,
}

impl DfsClient {
    /// Fails with [`Error::InvalidArgument`] when the config names no
    /// coordinator endpoint.
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.block_size == 0 {
            return Err(Error::InvalidArgument("block size must be positive".into()));
        }
        let config = Arc::new(config);
        let coordinator = CoordinatorClient::new(config.clone(), ClientIdentity::generate())?;
        Ok(DfsClient { config, coordinator })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Coordinator build and capability information.
    pub async fn server_info(&self) -> Result<ServerInfo> {
        self.coordinator.version().await
    }

    /// Lists `path` one level deep. Truncated at the coordinator's page
    /// size; a missing directory is [`Error::NotFound`].
    pub async fn list(&self, path: &str) -> Result<Vec<FileSummary>> {
        path::require_absolute(path)?;
        self.coordinator.list(path).await
    }

    /// Creates one directory; the parent must already exist.
    pub async fn create_directory(&self, path: &str) -> Result<FileSummary> {
        path::require_absolute(path)?;
        self.coordinator.mkdir(path, false).await
    }

    /// Creates a directory and any missing parents.
    pub async fn create_directories(&self, path: &str) -> Result<FileSummary> {
        path::require_absolute(path)?;
        self.coordinator.mkdir(path, true).await
    }

    /// Returns the summary of `path`, failing with [`Error::NotFound`]
    /// when it does not exist.
    pub async fn read_attributes(&self, path: &str) -> Result<FileSummary> {
        path::require_absolute(path)?;
        self.coordinator
            .stat(path)
            .await?
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }

    /// Whole file contents, pre-sized from the file length.
    pub async fn read_all_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let summary = self.readable_summary(path).await?;
        let mut buf = Vec::with_capacity(usize::try_from(summary.length).unwrap_or(0));
        self.copy_blocks(&summary, &mut buf).await?;
        Ok(buf)
    }

    /// Whole file contents decoded with `charset` and split into lines
    /// on `\r?\n`. A trailing empty element from a final newline is
    /// dropped.
    pub async fn read_all_lines(
        &self,
        path: &str,
        charset: &'static Encoding,
    ) -> Result<Vec<String>> {
        let bytes = self.read_all_bytes(path).await?;
        let (text, _, _) = charset.decode(&bytes);
        let mut lines: Vec<String> = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect();
        if lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }
        Ok(lines)
    }

    /// Streams the whole file into `sink`, block by block, trying
    /// replicas in the coordinator's order. Sink failures propagate as
    /// [`Error::CallerStream`]; they are not retried across replicas.
    pub async fn copy_to_sink(
        &self,
        path: &str,
        sink: &mut (impl AsyncWrite + Unpin),
    ) -> Result<u64> {
        let summary = self.readable_summary(path).await?;
        self.copy_blocks(&summary, sink).await
    }

    /// Creates `path` and streams `source` into it until EOF, one block
    /// at a time through each block's first replica. Fails when the path
    /// already exists. Returns the byte count written.
    pub async fn copy_from_source(
        &self,
        path: &str,
        source: &mut (impl AsyncRead + Unpin),
    ) -> Result<u64> {
        path::require_absolute(path)?;
        if self.coordinator.stat(path).await?.is_some() {
            return Err(Error::infra(format!("path already exists: {path}")));
        }
        let created = self
            .coordinator
            .create(path, true, self.config.replication, self.config.block_size)
            .await?;
        let block_size =
            if created.block_size > 0 { created.block_size } else { self.config.block_size };
        let mut file = self.coordinator.add_block(&created).await?;

        let mut total: u64 = 0;
        loop {
            // Single-byte look-ahead pins down end-of-input exactly.
            let lead = peek_byte(source).await?;
            if lead.is_none() && total > 0 {
                break;
            }
            if total > 0 && total % block_size == 0 {
                // Closes the previous block at its actual length.
                file = self.coordinator.add_block(&file).await?;
            }
            let capacity = block_size - (total % block_size);
            let written = self.write_block_session(&file, lead, source, capacity).await?;
            total += written;
            if let Some(blocks) = file.blocks.as_mut() {
                if let Some(tail) = blocks.last_mut() {
                    tail.length = written;
                }
            }
            if lead.is_none() {
                // Empty source: one empty session recorded the block.
                break;
            }
        }

        let last_len = file.blocks.as_ref().and_then(|b| b.last()).map_or(0, |b| b.length);
        if !self.coordinator.complete(&file, last_len).await? {
            return Err(Error::infra(format!("coordinator did not complete {path}")));
        }
        debug!(path, bytes = total, "file written");
        Ok(total)
    }

    /// Deletes `path` non-recursively.
    pub async fn delete(&self, path: &str) -> Result<()> {
        path::require_absolute(path)?;
        if self.coordinator.delete(path).await? {
            return Ok(());
        }
        match self.coordinator.stat(path).await? {
            None => Err(Error::NotFound(path.to_string())),
            Some(_) => Err(Error::infra(format!("coordinator refused delete of {path}"))),
        }
    }

    /// Deletes `path` if it exists. Returns `false` iff the path is
    /// confirmed absent after a delete failure; any other failure wraps
    /// the original error.
    pub async fn delete_if_exists(&self, path: &str) -> Result<bool> {
        path::require_absolute(path)?;
        let failure = match self.coordinator.delete(path).await {
            Ok(true) => return Ok(true),
            Ok(false) => Error::infra(format!("coordinator refused delete of {path}")),
            Err(err) => err,
        };
        match self.coordinator.stat(path).await {
            Ok(None) => Ok(false),
            _ => Err(Error::infra_with(format!("delete of {path} failed"), failure)),
        }
    }

    async fn readable_summary(&self, path: &str) -> Result<FileSummary> {
        let summary = self.read_attributes(path).await?;
        if summary.is_dir() {
            return Err(Error::InvalidArgument(format!("{path} is a directory")));
        }
        Ok(summary)
    }

    async fn copy_blocks(
        &self,
        summary: &FileSummary,
        sink: &mut (impl AsyncWrite + Unpin),
    ) -> Result<u64> {
        let blocks = summary.blocks.as_deref().unwrap_or(&[]);
        if blocks.is_empty() {
            if summary.length == 0 {
                return Ok(0);
            }
            return Err(Error::infra(format!("{} has no block locations", summary.path)));
        }
        let mut total = 0;
        for block in blocks {
            total += self.read_block_any_replica(block, sink).await?;
        }
        Ok(total)
    }

    async fn read_block_any_replica(
        &self,
        block: &BlockLocation,
        sink: &mut (impl AsyncWrite + Unpin),
    ) -> Result<u64> {
        let mut last_error = None;
        for replica in &block.replicas {
            let client = match StorageNodeClient::connect(
                replica,
                self.coordinator.identity().name(),
                &self.config,
            )
            .await
            {
                Ok(client) => client,
                Err(err) => {
                    last_error = Some(err);
                    continue;
                }
            };
            match client.read_block(block, sink).await {
                Ok(n) => return Ok(n),
                Err(err @ Error::CallerStream(_)) => return Err(err),
                Err(err) => {
                    debug!(block = block.block_id, replica = %replica.host, error = %err,
                        "replica failed, advancing");
                    last_error = Some(err);
                }
            }
        }
        Err(match last_error {
            Some(err) => Error::infra_with(
                format!("all replicas of block {} failed", block.block_id),
                err,
            ),
            None => Error::infra(format!("block {} has no replicas", block.block_id)),
        })
    }

    /// Streams at most `capacity` bytes (the lead byte included) of the
    /// current block through its first replica. Each block is written in
    /// exactly one session.
    async fn write_block_session(
        &self,
        file: &FileSummary,
        lead: Option<u8>,
        source: &mut (impl AsyncRead + Unpin),
        capacity: u64,
    ) -> Result<u64> {
        let block = file
            .blocks
            .as_ref()
            .and_then(|b| b.last())
            .ok_or_else(|| Error::infra(format!("{} has no open block", file.path)))?;
        let replica = block
            .replicas
            .first()
            .ok_or_else(|| Error::infra(format!("block {} has no replicas", block.block_id)))?;
        let client =
            StorageNodeClient::connect(replica, self.coordinator.identity().name(), &self.config)
                .await?;

        let lead_buf = match lead {
            Some(byte) => vec![byte],
            None => Vec::new(),
        };
        let limit = capacity - lead_buf.len() as u64;
        let mut limited = (&lead_buf[..]).chain(source.take(limit));
        client.write_block(block, &mut limited).await
    }
}

/// Reads one byte ahead of the main loop. Source failures are tagged as
/// caller-stream errors right here, where they originate.
async fn peek_byte(source: &mut (impl AsyncRead + Unpin)) -> Result<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match source.read(&mut byte).await {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::CallerStream(e)),
        }
    }
}
