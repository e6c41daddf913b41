//! Pure encode/decode for the coordinator RPC framing. No sockets here;
//! everything operates on byte buffers so it can be tested in isolation.

use prost::Message;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::model::ClientIdentity;
use crate::proto::rpc::{
    IpcConnectionContextProto, RequestHeaderProto, RpcKindProto, RpcOperationProto,
    RpcRequestHeaderProto, RpcResponseHeaderProto, RpcStatusProto, UserInformationProto,
};
use crate::rpc::{Protocol, AUTH_SIMPLE, CONTEXT_CALL_ID, MAGIC, SERVICE_CLASS, VERSION};

/// Exception class the coordinator raises for missing paths.
const FILE_NOT_FOUND_CLASS: &str = "FileNotFoundException";

fn delimited_len(message: &impl Message) -> usize {
    let len = message.encoded_len();
    prost::length_delimiter_len(len) + len
}

/// Encodes the complete connection preamble: magic header, version,
/// service class, auth selector, then the length-prefixed pair of the
/// context request header (call id `-3`) and the connection context.
pub fn encode_handshake(
    identity: &ClientIdentity,
    config: &ClientConfig,
    protocol: &Protocol,
) -> Vec<u8> {
    let header = RpcRequestHeaderProto {
        rpc_kind: Some(RpcKindProto::RpcProtocolBuffer as i32),
        rpc_op: Some(RpcOperationProto::RpcFinalPacket as i32),
        call_id: CONTEXT_CALL_ID,
        client_id: identity.id().to_vec(),
        retry_count: Some(-1),
    };
    let context = IpcConnectionContextProto {
        user_info: Some(UserInformationProto {
            effective_user: Some(config.effective_user.clone()),
            real_user: config.real_user.clone(),
        }),
        protocol: Some(protocol.name.to_string()),
    };

    let body_len = delimited_len(&header) + delimited_len(&context);
    let mut buf = Vec::with_capacity(7 + 4 + body_len);
    buf.extend_from_slice(MAGIC);
    buf.push(VERSION);
    buf.push(SERVICE_CLASS);
    buf.push(AUTH_SIMPLE);
    buf.extend_from_slice(&(body_len as u32).to_be_bytes());
    header.encode_length_delimited(&mut buf).expect("vec has capacity");
    context.encode_length_delimited(&mut buf).expect("vec has capacity");
    buf
}

/// Encodes one request frame: `len ‖ [rpc-header ‖ request-header ‖ body]`
/// with each inner message length-delimited. `len` covers the three
/// delimited messages only.
pub fn encode_request(
    call_id: i32,
    client_id: &[u8],
    protocol: &Protocol,
    method: &str,
    body: &impl Message,
) -> Vec<u8> {
    let rpc_header = RpcRequestHeaderProto {
        rpc_kind: Some(RpcKindProto::RpcProtocolBuffer as i32),
        rpc_op: Some(RpcOperationProto::RpcFinalPacket as i32),
        call_id,
        client_id: client_id.to_vec(),
        retry_count: Some(0),
    };
    let request_header = RequestHeaderProto {
        method_name: method.to_string(),
        declaring_class_protocol_name: protocol.name.to_string(),
        client_protocol_version: protocol.version,
    };

    let body_len =
        delimited_len(&rpc_header) + delimited_len(&request_header) + delimited_len(body);
    let mut buf = Vec::with_capacity(4 + body_len);
    buf.extend_from_slice(&(body_len as u32).to_be_bytes());
    rpc_header.encode_length_delimited(&mut buf).expect("vec has capacity");
    request_header.encode_length_delimited(&mut buf).expect("vec has capacity");
    body.encode_length_delimited(&mut buf).expect("vec has capacity");
    buf
}

/// Decodes one response frame (already stripped of its length prefix).
///
/// Returns the bytes following the response header; the caller decodes
/// them as one length-delimited message of the expected type. A
/// non-success status becomes [`Error::Infrastructure`] carrying the
/// server's exception class and message, except for the file-not-found
/// class which maps to [`Error::NotFound`].
pub fn decode_response(frame: &[u8]) -> Result<Vec<u8>> {
    let mut rest = frame;
    let header = RpcResponseHeaderProto::decode_length_delimited(&mut rest)?;
    if header.status != RpcStatusProto::Success as i32 {
        let class = header.exception_class_name.unwrap_or_default();
        let message = header.error_msg.unwrap_or_default();
        if class.contains(FILE_NOT_FOUND_CLASS) {
            return Err(Error::NotFound(message));
        }
        return Err(Error::infra(format!(
            "rpc failed with status {}: {class}: {message}",
            header.status
        )));
    }
    Ok(rest.to_vec())
}
