//! Block-level operations against one storage node.
//!
//! A client instance owns one connection for one block operation in one
//! direction; it is consumed by the operation and the socket drops with
//! it.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::config::ClientConfig;
use crate::datatransfer::{packet, Opcode, MAX_PACKET_DATA};
use crate::error::{Error, Result};
use crate::model::{BlockLocation, Replica};
use crate::proto::datatransfer::{
    BaseHeaderProto, BlockConstructionStageProto, BlockOpResponseProto, CachingStrategyProto,
    ChecksumProto, ChecksumTypeProto, ClientOperationHeaderProto, OpReadBlockProto,
    OpWriteBlockProto, PacketHeaderProto, PipelineAckProto, Status,
};
use crate::proto::hdfs::ExtendedBlockProto;

/// Client for one storage node's data-transfer port.
pub struct StorageNodeClient {
    stream: TcpStream,
    replica: Replica,
    client_name: String,
    read_timeout: Duration,
}

impl StorageNodeClient {
    /// Dials the replica's data-transfer endpoint. There is no
    /// handshake; the first bytes on the wire belong to the first
    /// operation.
    pub async fn connect(
        replica: &Replica,
        client_name: &str,
        config: &ClientConfig,
    ) -> Result<Self> {
        let stream = timeout(
            config.data_connect_timeout(),
            TcpStream::connect((replica.host.as_str(), replica.port)),
        )
        .await
        .map_err(|_| Error::infra(format!("connect to storage node {} timed out", replica.host)))?
        .map_err(|e| {
            Error::infra_with(format!("cannot connect to storage node {}", replica.host), e)
        })?;
        stream.set_nodelay(true).map_err(|e| {
            Error::infra_with(format!("cannot configure socket to {}", replica.host), e)
        })?;
        Ok(StorageNodeClient {
            stream,
            replica: replica.clone(),
            client_name: client_name.to_string(),
            read_timeout: config.data_read_timeout(),
        })
    }

    /// Streams the whole block into `sink`. Returns the byte count,
    /// which must match the block's declared length.
    pub async fn read_block(
        mut self,
        block: &BlockLocation,
        sink: &mut (impl AsyncWrite + Unpin),
    ) -> Result<u64> {
        self.require_replica_of(block)?;
        let op = OpReadBlockProto {
            header: self.operation_header(block),
            offset: 0,
            len: block.length,
            send_checksums: Some(false),
            caching_strategy: Some(CachingStrategyProto::default()),
        };
        self.send_op(Opcode::ReadBlock, &op).await?;
        self.await_op_response().await?;

        let mut total: u64 = 0;
        loop {
            let packet = timeout(self.read_timeout, packet::read_packet(&mut self.stream))
                .await
                .map_err(|_| Error::infra(format!("packet from {} timed out", self.replica.host)))??;
            trace!(
                seqno = packet.header.seqno,
                len = packet.data.len(),
                last = packet.is_last(),
                "read packet"
            );
            if !packet.data.is_empty() {
                sink.write_all(&packet.data).await.map_err(Error::CallerStream)?;
                total += packet.data.len() as u64;
            }
            if packet.is_last() {
                break;
            }
        }
        if total != block.length {
            return Err(Error::infra(format!(
                "block {} stream ended at {total} of {} bytes",
                block.block_id, block.length
            )));
        }
        debug!(block = block.block_id, bytes = total, node = %self.replica.host, "block read");
        Ok(total)
    }

    /// Streams `source` into the block until EOF. Every packet is
    /// acknowledged before the next is sent; a final empty packet closes
    /// the block. Returns the payload byte count.
    pub async fn write_block(
        mut self,
        block: &BlockLocation,
        source: &mut (impl AsyncRead + Unpin),
    ) -> Result<u64> {
        self.require_replica_of(block)?;
        let op = OpWriteBlockProto {
            header: self.operation_header(block),
            targets: Vec::new(),
            source: None,
            stage: BlockConstructionStageProto::PipelineSetupCreate as i32,
            pipeline_size: block.replicas.len() as u32,
            min_bytes_rcvd: 0,
            max_bytes_rcvd: 0,
            latest_generation_stamp: block.generation_stamp,
            requested_checksum: ChecksumProto {
                r#type: ChecksumTypeProto::ChecksumCrc32 as i32,
                bytes_per_checksum: crate::datatransfer::BYTES_PER_CHECKSUM as u32,
            },
            caching_strategy: Some(CachingStrategyProto::default()),
        };
        self.send_op(Opcode::WriteBlock, &op).await?;
        self.await_op_response().await?;

        let mut seqno: i64 = 0;
        let mut sent: u64 = 0;
        let mut buf = vec![0u8; MAX_PACKET_DATA];
        loop {
            let n = fill_from(source, &mut buf).await.map_err(Error::CallerStream)?;
            if n == 0 {
                break;
            }
            let header = PacketHeaderProto {
                offset_in_block: sent as i64,
                seqno,
                last_packet_in_block: false,
                data_len: n as i32,
                sync_block: Some(false),
            };
            let frame = packet::encode_packet(&header, &buf[..n], true);
            self.stream.write_all(&frame).await.map_err(|e| {
                Error::infra_with(format!("packet send to {} failed", self.replica.host), e)
            })?;
            self.await_ack(seqno).await?;
            sent += n as u64;
            seqno += 1;
        }

        // The block always closes with an empty, unchecksummed packet.
        let last = PacketHeaderProto {
            offset_in_block: sent as i64,
            seqno,
            last_packet_in_block: true,
            data_len: 0,
            sync_block: Some(false),
        };
        let frame = packet::encode_packet(&last, &[], false);
        self.stream.write_all(&frame).await.map_err(|e| {
            Error::infra_with(format!("packet send to {} failed", self.replica.host), e)
        })?;
        self.await_ack(seqno).await?;
        debug!(block = block.block_id, bytes = sent, node = %self.replica.host, "block written");
        Ok(sent)
    }

    fn require_replica_of(&self, block: &BlockLocation) -> Result<()> {
        if block.replicas.iter().any(|r| r.host == self.replica.host) {
            Ok(())
        } else {
            Err(Error::InvalidArgument(format!(
                "node {} holds no replica of block {}",
                self.replica.host, block.block_id
            )))
        }
    }

    fn operation_header(&self, block: &BlockLocation) -> ClientOperationHeaderProto {
        ClientOperationHeaderProto {
            base_header: BaseHeaderProto {
                block: ExtendedBlockProto {
                    pool_id: block.pool_id.clone(),
                    block_id: block.block_id,
                    generation_stamp: block.generation_stamp,
                    num_bytes: Some(block.length),
                },
                // Simple auth mode: no token.
                token: None,
            },
            client_name: self.client_name.clone(),
        }
    }

    async fn send_op(&mut self, op: Opcode, message: &impl prost::Message) -> Result<()> {
        let frame = packet::encode_op(op, message);
        trace!(?op, len = frame.len(), node = %self.replica.host, "transfer operation");
        self.stream.write_all(&frame).await.map_err(|e| {
            Error::infra_with(format!("operation send to {} failed", self.replica.host), e)
        })
    }

    async fn await_op_response(&mut self) -> Result<()> {
        let resp: BlockOpResponseProto =
            timeout(self.read_timeout, packet::read_delimited(&mut self.stream))
                .await
                .map_err(|_| {
                    Error::infra(format!("operation response from {} timed out", self.replica.host))
                })??;
        if resp.status != Status::Success as i32 {
            return Err(Error::infra(format!(
                "storage node {} rejected operation with status {}: {}",
                self.replica.host,
                resp.status,
                resp.message.unwrap_or_default()
            )));
        }
        Ok(())
    }

    async fn await_ack(&mut self, expected_seqno: i64) -> Result<()> {
        let ack: PipelineAckProto =
            timeout(self.read_timeout, packet::read_delimited(&mut self.stream))
                .await
                .map_err(|_| {
                    Error::infra(format!("ack from {} timed out", self.replica.host))
                })??;
        if ack.seqno != expected_seqno {
            return Err(Error::infra(format!(
                "ack seqno {} does not match packet {expected_seqno}",
                ack.seqno
            )));
        }
        if ack.reply.iter().any(|s| *s != Status::Success as i32) {
            return Err(Error::infra(format!(
                "pipeline reported failure for packet {expected_seqno}: {:?}",
                ack.reply
            )));
        }
        Ok(())
    }
}

/// Fills `buf` from the source, stopping early only at EOF.
async fn fill_from(
    source: &mut (impl AsyncRead + Unpin),
    buf: &mut [u8],
) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
