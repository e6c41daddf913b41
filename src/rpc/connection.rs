//! One coordinator connection: TCP dial, handshake, and strictly paired
//! request/response exchange.

use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use prost::Message;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::config::{ClientConfig, Endpoint};
use crate::error::{Error, Result};
use crate::model::ClientIdentity;
use crate::rpc::{call, Protocol, MAX_RESPONSE_LEN};

/// A live coordinator connection.
///
/// Holds the socket for its whole lifetime; dropping the connection
/// releases it on every exit path. Call ids are allocated from an atomic
/// counter starting at 0, and `&mut self` on [`RpcConnection::call`]
/// keeps request encoding serialised per connection.
pub struct RpcConnection {
    stream: TcpStream,
    endpoint: Endpoint,
    call_id: AtomicI32,
    client_id: Vec<u8>,
    read_timeout: Duration,
}

impl RpcConnection {
    /// Dials `endpoint`, then writes the handshake preamble and the
    /// connection context naming `protocol`.
    pub async fn connect(
        endpoint: &Endpoint,
        identity: &ClientIdentity,
        config: &ClientConfig,
        protocol: &Protocol,
    ) -> Result<Self> {
        let stream = timeout(
            config.connect_timeout(),
            TcpStream::connect((endpoint.host.as_str(), endpoint.port)),
        )
        .await
        .map_err(|_| Error::infra(format!("connect to {endpoint} timed out")))?
        .map_err(|e| Error::infra_with(format!("cannot connect to {endpoint}"), e))?;
        stream
            .set_nodelay(true)
            .map_err(|e| Error::infra_with(format!("cannot configure socket to {endpoint}"), e))?;

        let mut conn = RpcConnection {
            stream,
            endpoint: endpoint.clone(),
            call_id: AtomicI32::new(0),
            client_id: identity.id().to_vec(),
            read_timeout: config.read_timeout(),
        };
        let preamble = call::encode_handshake(identity, config, protocol);
        conn.stream
            .write_all(&preamble)
            .await
            .map_err(|e| Error::infra_with(format!("handshake to {endpoint} failed"), e))?;
        debug!(%endpoint, protocol = protocol.name, "coordinator connection established");
        Ok(conn)
    }

    /// Sends `body` as `method` of `protocol` and waits for the paired
    /// response. Returns the raw response-body bytes for the caller to
    /// decode against the expected type.
    pub async fn call(
        &mut self,
        protocol: &Protocol,
        method: &str,
        body: &impl Message,
    ) -> Result<Vec<u8>> {
        let call_id = self.call_id.fetch_add(1, Ordering::Relaxed);
        let frame = call::encode_request(call_id, &self.client_id, protocol, method, body);
        trace!(call_id, method, len = frame.len(), "rpc request");
        self.stream
            .write_all(&frame)
            .await
            .map_err(|e| Error::infra_with(format!("rpc send of {method} failed"), e))?;

        let frame = self.read_frame(method).await?;
        trace!(call_id, method, len = frame.len(), "rpc response");
        call::decode_response(&frame)
    }

    async fn read_frame(&mut self, method: &str) -> Result<Vec<u8>> {
        let endpoint = &self.endpoint;
        let len = timeout(self.read_timeout, self.stream.read_u32())
            .await
            .map_err(|_| Error::infra(format!("rpc response to {method} timed out")))?
            .map_err(|e| Error::infra_with(format!("rpc read from {endpoint} failed"), e))?;
        if len == 0 || len > MAX_RESPONSE_LEN {
            return Err(Error::infra(format!("bad rpc response length {len} from {endpoint}")));
        }
        let mut frame = vec![0u8; len as usize];
        timeout(self.read_timeout, self.stream.read_exact(&mut frame))
            .await
            .map_err(|_| Error::infra(format!("rpc response to {method} timed out")))?
            .map_err(|e| Error::infra_with(format!("rpc read from {endpoint} failed"), e))?;
        Ok(frame)
    }
}
