//! Wire encode/decode for data-transfer operations and data packets.
//!
//! The packet framing is asymmetric on purpose, inherited from the
//! reference server:
//!
//! ```text
//! PLEN (u32 BE) | HLEN (u16 BE) | HEADER (HLEN bytes) | CHECKSUMS | DATA
//! ```
//!
//! `PLEN` counts its own four bytes plus the checksums plus the data; it
//! does NOT cover `HLEN` or the header. `HLEN` counts the header bytes
//! only. Getting this wrong is the classic interop bug, so both encode
//! and decode live here next to their tests.

use byteorder::{BigEndian, ByteOrder};
use prost::Message;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::datatransfer::{Opcode, BYTES_PER_CHECKSUM, MAX_OP_RESPONSE_LEN, TRANSFER_VERSION};
use crate::error::{Error, Result};
use crate::proto::datatransfer::PacketHeaderProto;

/// One decoded data packet. Incoming checksums are skipped, not
/// verified; read-side verification is out of scope.
#[derive(Debug)]
pub struct Packet {
    pub header: PacketHeaderProto,
    pub data: Vec<u8>,
}

impl Packet {
    pub fn is_last(&self) -> bool {
        self.header.last_packet_in_block
    }
}

/// Encodes the request envelope opening an operation: version, opcode,
/// then the length-delimited operation message.
pub fn encode_op(op: Opcode, message: &impl Message) -> Vec<u8> {
    let mut buf = Vec::with_capacity(3 + message.encoded_len() + 5);
    buf.extend_from_slice(&TRANSFER_VERSION.to_be_bytes());
    buf.push(op as u8);
    message.encode_length_delimited(&mut buf).expect("vec has capacity");
    buf
}

/// Number of checksum chunks covering `data_len` bytes.
pub fn checksum_count(data_len: usize) -> usize {
    data_len.div_ceil(BYTES_PER_CHECKSUM)
}

/// CRC32 of every 512-byte chunk of `data`, each as a `u32 BE`. The
/// final chunk may be short.
pub fn chunk_checksums(data: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; checksum_count(data.len()) * 4];
    for (i, chunk) in data.chunks(BYTES_PER_CHECKSUM).enumerate() {
        BigEndian::write_u32(&mut out[i * 4..i * 4 + 4], crc32fast::hash(chunk));
    }
    out
}

/// Encodes one data packet.
pub fn encode_packet(header: &PacketHeaderProto, data: &[u8], with_checksums: bool) -> Vec<u8> {
    let checksums = if with_checksums { chunk_checksums(data) } else { Vec::new() };
    let header_bytes = header.encode_to_vec();
    let plen = 4 + checksums.len() + data.len();
    let mut buf = vec![0u8; 6];
    buf.reserve(header_bytes.len() + checksums.len() + data.len());
    BigEndian::write_u32(&mut buf[0..4], plen as u32);
    BigEndian::write_u16(&mut buf[4..6], header_bytes.len() as u16);
    buf.extend_from_slice(&header_bytes);
    buf.extend_from_slice(&checksums);
    buf.extend_from_slice(data);
    buf
}

/// Reads and decodes one data packet, skipping any checksums the sender
/// interleaved.
pub async fn read_packet(reader: &mut (impl AsyncRead + Unpin)) -> Result<Packet> {
    let plen = reader
        .read_u32()
        .await
        .map_err(|e| Error::infra_with("packet read failed", e))? as usize;
    let hlen = reader
        .read_u16()
        .await
        .map_err(|e| Error::infra_with("packet read failed", e))? as usize;
    if plen < 4 {
        return Err(Error::infra(format!("bad packet length {plen}")));
    }

    let mut header_bytes = vec![0u8; hlen];
    reader
        .read_exact(&mut header_bytes)
        .await
        .map_err(|e| Error::infra_with("packet header read failed", e))?;
    let header = PacketHeaderProto::decode(&header_bytes[..])?;

    let data_len = usize::try_from(header.data_len)
        .map_err(|_| Error::infra(format!("negative packet data length {}", header.data_len)))?;
    let checksum_len = (plen - 4)
        .checked_sub(data_len)
        .ok_or_else(|| Error::infra(format!("packet length {plen} shorter than data {data_len}")))?;

    let mut checksums = vec![0u8; checksum_len];
    reader
        .read_exact(&mut checksums)
        .await
        .map_err(|e| Error::infra_with("packet checksum read failed", e))?;
    let mut data = vec![0u8; data_len];
    reader
        .read_exact(&mut data)
        .await
        .map_err(|e| Error::infra_with("packet data read failed", e))?;
    Ok(Packet { header, data })
}

/// Reads one length-delimited message, as the node frames operation
/// responses and pipeline acks.
pub async fn read_delimited<M>(reader: &mut (impl AsyncRead + Unpin)) -> Result<M>
where
    M: Message + Default,
{
    let len = read_varint(reader).await?;
    if len > MAX_OP_RESPONSE_LEN {
        return Err(Error::infra(format!("oversized response message ({len} bytes)")));
    }
    let mut buf = vec![0u8; len as usize];
    reader
        .read_exact(&mut buf)
        .await
        .map_err(|e| Error::infra_with("response read failed", e))?;
    M::decode(&buf[..]).map_err(Into::into)
}

async fn read_varint(reader: &mut (impl AsyncRead + Unpin)) -> Result<u64> {
    let mut value: u64 = 0;
    for shift in (0..64).step_by(7) {
        let byte = reader
            .read_u8()
            .await
            .map_err(|e| Error::infra_with("response length read failed", e))?;
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(Error::infra("malformed varint length"))
}
