//! In-process mock cluster speaking the coordinator RPC and the
//! storage-node data-transfer protocol over real TCP sockets.
//!
//! The wire handling here is deliberately independent of the client's
//! own framing code: packets are decoded by hand and checksums are
//! recomputed, so an encode/decode bug cannot cancel itself out.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use num_traits::FromPrimitive;
use prost::Message;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use dfs_client::config::{ClientConfig, Endpoint};
use dfs_client::datatransfer::Opcode;
use dfs_client::proto::datatransfer::{
    BlockOpResponseProto, OpReadBlockProto, OpWriteBlockProto, PacketHeaderProto,
    PipelineAckProto, Status,
};
use dfs_client::proto::hdfs::{
    AddBlockRequestProto, AddBlockResponseProto, CompleteRequestProto, CompleteResponseProto,
    CreateRequestProto, CreateResponseProto, DatanodeIdProto, DatanodeInfoProto,
    DeleteRequestProto, DeleteResponseProto, DirectoryListingProto, ExtendedBlockProto,
    FileTypeProto, FsPermissionProto, GetFileInfoRequestProto, GetFileInfoResponseProto,
    GetListingRequestProto, GetListingResponseProto, HdfsFileStatusProto, LocatedBlockProto,
    LocatedBlocksProto, MkdirsRequestProto, MkdirsResponseProto, NamespaceInfoProto,
    StorageInfoProto, TokenProto, VersionResponseProto,
};
use dfs_client::proto::rpc::{
    IpcConnectionContextProto, RequestHeaderProto, RpcRequestHeaderProto, RpcResponseHeaderProto,
    RpcStatusProto,
};

const LISTING_PAGE_SIZE: usize = 1000;
const FILE_NOT_FOUND: &str = "java.io.FileNotFoundException";
const ALREADY_EXISTS: &str = "org.apache.hadoop.fs.FileAlreadyExistsException";
const NOT_EMPTY: &str = "org.apache.hadoop.fs.PathIsNotEmptyDirectoryException";

/// One data packet as observed by the storage node.
#[derive(Debug, Clone)]
pub struct PacketRecord {
    pub seqno: i64,
    pub len: usize,
    pub last: bool,
}

#[derive(Debug, Clone)]
struct BlockMeta {
    id: u64,
    gen: u64,
    len: u64,
}

#[derive(Debug, Clone)]
struct FileState {
    file_id: u64,
    block_size: u64,
    replication: u32,
    blocks: Vec<BlockMeta>,
    completed: bool,
}

#[derive(Debug, Clone)]
enum Entry {
    Dir,
    File(FileState),
}

struct Namespace {
    entries: BTreeMap<String, Entry>,
    block_data: HashMap<u64, Vec<u8>>,
    write_sessions: Vec<Vec<PacketRecord>>,
    next_block_id: u64,
    next_file_id: u64,
    datanode_host: String,
    datanode_port: u16,
}

impl Namespace {
    fn new(datanode_host: String, datanode_port: u16) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert("/".to_string(), Entry::Dir);
        Namespace {
            entries,
            block_data: HashMap::new(),
            write_sessions: Vec::new(),
            next_block_id: 1,
            next_file_id: 16385,
            datanode_host,
            datanode_port,
        }
    }

    fn parent(path: &str) -> String {
        match path.rsplit_once('/') {
            Some(("", _)) => "/".to_string(),
            Some((prefix, _)) => prefix.to_string(),
            None => "/".to_string(),
        }
    }

    fn children(&self, dir: &str) -> Vec<(String, Entry)> {
        let prefix = if dir == "/" { "/".to_string() } else { format!("{dir}/") };
        self.entries
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(&prefix))
            .filter(|(path, _)| !path[prefix.len()..].contains('/') && !path[prefix.len()..].is_empty())
            .map(|(path, entry)| (path[prefix.len()..].to_string(), entry.clone()))
            .collect()
    }

    fn ensure_parents(&mut self, path: &str, create: bool) -> Result<(), (String, String)> {
        let parent = Self::parent(path);
        match self.entries.get(&parent) {
            Some(Entry::Dir) => Ok(()),
            Some(Entry::File(_)) => {
                Err((FILE_NOT_FOUND.to_string(), format!("{parent} is not a directory")))
            }
            None if create => {
                self.ensure_parents(&parent, true)?;
                self.entries.insert(parent, Entry::Dir);
                Ok(())
            }
            None => Err((FILE_NOT_FOUND.to_string(), format!("{parent} does not exist"))),
        }
    }

    fn datanode(&self) -> DatanodeInfoProto {
        DatanodeInfoProto {
            id: DatanodeIdProto {
                ip_addr: "127.0.0.1".to_string(),
                host_name: self.datanode_host.clone(),
                datanode_uuid: "mock-dn-1".to_string(),
                xfer_port: u32::from(self.datanode_port),
                info_port: 0,
                ipc_port: 0,
            },
            location: Some("/default-rack".to_string()),
        }
    }

    fn empty_token() -> TokenProto {
        TokenProto {
            identifier: Vec::new(),
            password: Vec::new(),
            kind: String::new(),
            service: String::new(),
        }
    }

    fn located_block(&self, meta: &BlockMeta, offset: u64) -> LocatedBlockProto {
        LocatedBlockProto {
            b: ExtendedBlockProto {
                pool_id: "BP-mock-1".to_string(),
                block_id: meta.id,
                generation_stamp: meta.gen,
                num_bytes: Some(meta.len),
            },
            offset,
            locs: vec![self.datanode()],
            corrupt: false,
            block_token: Self::empty_token(),
        }
    }

    fn located_blocks(&self, fs: &FileState) -> LocatedBlocksProto {
        let mut offset = 0;
        let mut blocks = Vec::with_capacity(fs.blocks.len());
        for meta in &fs.blocks {
            blocks.push(self.located_block(meta, offset));
            offset += meta.len;
        }
        LocatedBlocksProto {
            file_length: offset,
            blocks,
            under_construction: !fs.completed,
            last_block: None,
            is_last_block_complete: fs.completed,
        }
    }

    fn status(&self, name: &[u8], entry: &Entry) -> HdfsFileStatusProto {
        let (file_type, length, fs) = match entry {
            Entry::Dir => (FileTypeProto::IsDir, 0, None),
            Entry::File(fs) => {
                (FileTypeProto::IsFile, fs.blocks.iter().map(|b| b.len).sum(), Some(fs))
            }
        };
        HdfsFileStatusProto {
            file_type: file_type as i32,
            path: name.to_vec(),
            length,
            permission: FsPermissionProto {
                perm: if fs.is_some() { 0o644 } else { 0o755 },
            },
            owner: "tester".to_string(),
            group: "supergroup".to_string(),
            modification_time: 1_700_000_000_000,
            access_time: 1_700_000_000_000,
            symlink: None,
            block_replication: fs.map(|f| f.replication),
            blocksize: fs.map(|f| f.block_size),
            locations: fs.map(|f| self.located_blocks(f)),
            file_id: fs.map(|f| f.file_id),
            children_num: match entry {
                Entry::Dir => Some(0),
                Entry::File(_) => Some(-1),
            },
            storage_policy: Some(0),
            flags: Some(0),
            namespace: None,
        }
    }
}

type Shared = Arc<Mutex<Namespace>>;

/// A mock coordinator plus one mock storage node.
pub struct MockCluster {
    pub endpoint: Endpoint,
    state: Shared,
}

impl MockCluster {
    /// Starts a cluster whose storage node advertises `127.0.0.1`.
    pub async fn start() -> Self {
        Self::start_with_host("127.0.0.1").await
    }

    /// Starts a cluster whose storage node advertises `advertised_host`
    /// in coordinator metadata (the node still listens on loopback).
    pub async fn start_with_host(advertised_host: &str) -> Self {
        init_tracing();
        let coordinator = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let storage = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let coordinator_port = coordinator.local_addr().unwrap().port();
        let storage_port = storage.local_addr().unwrap().port();

        let state: Shared =
            Arc::new(Mutex::new(Namespace::new(advertised_host.to_string(), storage_port)));

        let coordinator_state = Arc::clone(&state);
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = coordinator.accept().await else { break };
                let state = Arc::clone(&coordinator_state);
                tokio::spawn(serve_coordinator(socket, state));
            }
        });

        let storage_state = Arc::clone(&state);
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = storage.accept().await else { break };
                let state = Arc::clone(&storage_state);
                tokio::spawn(serve_storage(socket, state));
            }
        });

        MockCluster {
            endpoint: Endpoint { host: "127.0.0.1".to_string(), port: coordinator_port },
            state,
        }
    }

    /// A client config pointing at this cluster.
    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            endpoints: vec![self.endpoint.clone()],
            effective_user: "tester".to_string(),
            ..ClientConfig::default()
        }
    }

    /// Inserts a completed file directly into the namespace, bypassing
    /// the write path. Missing parents are created.
    pub fn seed_file(&self, path: &str, content: &[u8]) {
        let mut ns = self.state.lock().unwrap();
        ns.ensure_parents(path, true).unwrap();
        let block_id = ns.next_block_id;
        ns.next_block_id += 1;
        let file_id = ns.next_file_id;
        ns.next_file_id += 1;
        ns.block_data.insert(block_id, content.to_vec());
        ns.entries.insert(
            path.to_string(),
            Entry::File(FileState {
                file_id,
                block_size: 128 * 1024 * 1024,
                replication: 1,
                blocks: vec![BlockMeta { id: block_id, gen: 1000, len: content.len() as u64 }],
                completed: true,
            }),
        );
    }

    /// Every write session the storage node observed, in order, as the
    /// packets it received.
    pub fn write_sessions(&self) -> Vec<Vec<PacketRecord>> {
        self.state.lock().unwrap().write_sessions.clone()
    }
}

/// Honours `RUST_LOG` when a test run wants protocol traces.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

// --- coordinator ------------------------------------------------------

async fn read_frame(stream: &mut TcpStream) -> Option<Vec<u8>> {
    let len = stream.read_u32().await.ok()?;
    let mut buf = vec![0u8; len as usize];
    stream.read_exact(&mut buf).await.ok()?;
    Some(buf)
}

async fn serve_coordinator(mut stream: TcpStream, state: Shared) {
    let mut preamble = [0u8; 7];
    stream.read_exact(&mut preamble).await.unwrap();
    assert_eq!(&preamble[0..4], b"hrpc");
    assert_eq!(preamble[4], 9, "rpc version");
    assert_eq!(preamble[5], 0, "service class");
    assert_eq!(preamble[6], 0, "auth selector");

    let context_frame = read_frame(&mut stream).await.expect("context frame");
    let mut rest = &context_frame[..];
    let context_header = RpcRequestHeaderProto::decode_length_delimited(&mut rest).unwrap();
    assert_eq!(context_header.call_id, -3, "context call id");
    let context = IpcConnectionContextProto::decode_length_delimited(&mut rest).unwrap();
    assert!(context.protocol.is_some());

    let mut last_call_id: i64 = -1;
    while let Some(frame) = read_frame(&mut stream).await {
        let mut rest = &frame[..];
        let rpc_header = RpcRequestHeaderProto::decode_length_delimited(&mut rest).unwrap();
        let request_header = RequestHeaderProto::decode_length_delimited(&mut rest).unwrap();
        assert!(
            i64::from(rpc_header.call_id) > last_call_id,
            "call ids must be strictly increasing"
        );
        last_call_id = i64::from(rpc_header.call_id);

        let reply = dispatch(&state, &request_header.method_name, rest);
        let mut response = Vec::new();
        match reply {
            Ok(body) => {
                let header = RpcResponseHeaderProto {
                    call_id: rpc_header.call_id as u32,
                    status: RpcStatusProto::Success as i32,
                    server_ipc_version_num: Some(9),
                    exception_class_name: None,
                    error_msg: None,
                    client_id: Some(rpc_header.client_id.clone()),
                    retry_count: None,
                };
                response.extend_from_slice(&header.encode_length_delimited_to_vec());
                response.extend_from_slice(&body);
            }
            Err((class, message)) => {
                let header = RpcResponseHeaderProto {
                    call_id: rpc_header.call_id as u32,
                    status: RpcStatusProto::Error as i32,
                    server_ipc_version_num: Some(9),
                    exception_class_name: Some(class),
                    error_msg: Some(message),
                    client_id: Some(rpc_header.client_id.clone()),
                    retry_count: None,
                };
                response.extend_from_slice(&header.encode_length_delimited_to_vec());
            }
        }
        stream.write_u32(response.len() as u32).await.unwrap();
        stream.write_all(&response).await.unwrap();
    }
}

type Reply = Result<Vec<u8>, (String, String)>;

fn not_found(path: &str) -> (String, String) {
    (FILE_NOT_FOUND.to_string(), format!("File does not exist: {path}"))
}

fn dispatch(state: &Shared, method: &str, body: &[u8]) -> Reply {
    let mut ns = state.lock().unwrap();
    match method {
        "getFileInfo" => {
            let req = GetFileInfoRequestProto::decode_length_delimited(&mut &body[..]).unwrap();
            let fs = ns.entries.get(&req.src).map(|entry| ns.status(b"", entry));
            Ok(GetFileInfoResponseProto { fs }.encode_length_delimited_to_vec())
        }
        "getListing" => {
            let req = GetListingRequestProto::decode_length_delimited(&mut &body[..]).unwrap();
            let entry = ns.entries.get(&req.src).cloned().ok_or_else(|| not_found(&req.src))?;
            let listing = match entry {
                Entry::File(_) => DirectoryListingProto {
                    partial_listing: vec![ns.status(b"", &entry)],
                    remaining_entries: 0,
                },
                Entry::Dir => {
                    let children = ns.children(&req.src);
                    let total = children.len();
                    let page: Vec<HdfsFileStatusProto> = children
                        .into_iter()
                        .take(LISTING_PAGE_SIZE)
                        .map(|(name, entry)| ns.status(name.as_bytes(), &entry))
                        .collect();
                    DirectoryListingProto {
                        remaining_entries: total.saturating_sub(page.len()) as u32,
                        partial_listing: page,
                    }
                }
            };
            Ok(GetListingResponseProto { dir_list: Some(listing) }
                .encode_length_delimited_to_vec())
        }
        "mkdirs" => {
            let req = MkdirsRequestProto::decode_length_delimited(&mut &body[..]).unwrap();
            match ns.entries.get(&req.src) {
                Some(Entry::Dir) => {}
                Some(Entry::File(_)) => {
                    return Err((ALREADY_EXISTS.to_string(), format!("{} is a file", req.src)));
                }
                None => {
                    ns.ensure_parents(&req.src, req.create_parent)?;
                    ns.entries.insert(req.src.clone(), Entry::Dir);
                }
            }
            Ok(MkdirsResponseProto { result: true }.encode_length_delimited_to_vec())
        }
        "create" => {
            let req = CreateRequestProto::decode_length_delimited(&mut &body[..]).unwrap();
            if ns.entries.contains_key(&req.src) {
                return Err((
                    ALREADY_EXISTS.to_string(),
                    format!("{} already exists", req.src),
                ));
            }
            ns.ensure_parents(&req.src, req.create_parent)?;
            let file_id = ns.next_file_id;
            ns.next_file_id += 1;
            let file = FileState {
                file_id,
                block_size: req.block_size,
                replication: req.replication,
                blocks: Vec::new(),
                completed: false,
            };
            let status = ns.status(b"", &Entry::File(file.clone()));
            ns.entries.insert(req.src.clone(), Entry::File(file));
            Ok(CreateResponseProto { fs: Some(status) }.encode_length_delimited_to_vec())
        }
        "addBlock" => {
            let req = AddBlockRequestProto::decode_length_delimited(&mut &body[..]).unwrap();
            let block_id = ns.next_block_id;
            ns.next_block_id += 1;
            let Some(Entry::File(file)) = ns.entries.get_mut(&req.src) else {
                return Err(not_found(&req.src));
            };
            if let Some(previous) = req.previous {
                let meta = file
                    .blocks
                    .iter_mut()
                    .find(|b| b.id == previous.block_id)
                    .expect("previous block is known");
                meta.len = previous.num_bytes.unwrap_or(0);
            }
            let offset: u64 = file.blocks.iter().map(|b| b.len).sum();
            let meta = BlockMeta { id: block_id, gen: 1000 + block_id, len: 0 };
            file.blocks.push(meta.clone());
            let block = ns.located_block(&meta, offset);
            Ok(AddBlockResponseProto { block }.encode_length_delimited_to_vec())
        }
        "complete" => {
            let req = CompleteRequestProto::decode_length_delimited(&mut &body[..]).unwrap();
            let Some(Entry::File(file)) = ns.entries.get_mut(&req.src) else {
                return Err(not_found(&req.src));
            };
            if let Some(last) = req.last {
                if let Some(meta) = file.blocks.iter_mut().find(|b| b.id == last.block_id) {
                    meta.len = last.num_bytes.unwrap_or(0);
                }
            }
            file.completed = true;
            Ok(CompleteResponseProto { result: true }.encode_length_delimited_to_vec())
        }
        "delete" => {
            let req = DeleteRequestProto::decode_length_delimited(&mut &body[..]).unwrap();
            assert!(!req.recursive, "client only issues non-recursive deletes");
            let result = match ns.entries.get(&req.src) {
                None => false,
                Some(Entry::Dir) => {
                    if !ns.children(&req.src).is_empty() {
                        return Err((
                            NOT_EMPTY.to_string(),
                            format!("{} is non empty", req.src),
                        ));
                    }
                    ns.entries.remove(&req.src);
                    true
                }
                Some(Entry::File(file)) => {
                    let ids: Vec<u64> = file.blocks.iter().map(|b| b.id).collect();
                    for id in ids {
                        ns.block_data.remove(&id);
                    }
                    ns.entries.remove(&req.src);
                    true
                }
            };
            Ok(DeleteResponseProto { result }.encode_length_delimited_to_vec())
        }
        "versionRequest" => {
            let info = NamespaceInfoProto {
                build_version: "mock-build".to_string(),
                unused: 0,
                block_pool_id: "BP-mock-1".to_string(),
                storage_info: StorageInfoProto {
                    layout_version: 1,
                    namespace_id: 1,
                    cluster_id: "CID-mock".to_string(),
                    c_time: 0,
                },
                software_version: "3.3.6".to_string(),
                capabilities: Some(1),
            };
            Ok(VersionResponseProto { info }.encode_length_delimited_to_vec())
        }
        other => panic!("unexpected rpc method {other}"),
    }
}

// --- storage node -----------------------------------------------------

async fn read_varint(stream: &mut TcpStream) -> u64 {
    let mut value = 0u64;
    for shift in (0..64).step_by(7) {
        let byte = stream.read_u8().await.unwrap();
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            break;
        }
    }
    value
}

async fn read_proto<M: Message + Default>(stream: &mut TcpStream) -> M {
    let len = read_varint(stream).await as usize;
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await.unwrap();
    M::decode(&buf[..]).unwrap()
}

async fn write_proto(stream: &mut TcpStream, message: &impl Message) {
    stream.write_all(&message.encode_length_delimited_to_vec()).await.unwrap();
}

async fn serve_storage(mut stream: TcpStream, state: Shared) {
    let version = stream.read_u16().await.unwrap();
    assert_eq!(version, 28, "data transfer version");
    let opcode = stream.read_u8().await.unwrap();
    match Opcode::from_u8(opcode) {
        Some(Opcode::ReadBlock) => serve_read(&mut stream, state).await,
        Some(Opcode::WriteBlock) => serve_write(&mut stream, state).await,
        None => panic!("unexpected transfer opcode {opcode:#x}"),
    }
}

fn success_response() -> BlockOpResponseProto {
    BlockOpResponseProto {
        status: Status::Success as i32,
        first_bad_link: None,
        read_op_checksum_info: None,
        message: None,
    }
}

async fn serve_read(stream: &mut TcpStream, state: Shared) {
    let op: OpReadBlockProto = read_proto(stream).await;
    let block_id = op.header.base_header.block.block_id;
    let content = {
        let ns = state.lock().unwrap();
        ns.block_data.get(&block_id).cloned()
    };
    let Some(content) = content else {
        write_proto(
            stream,
            &BlockOpResponseProto {
                status: Status::Error as i32,
                first_bad_link: None,
                read_op_checksum_info: None,
                message: Some(format!("unknown block {block_id}")),
            },
        )
        .await;
        return;
    };
    assert_eq!(op.offset, 0, "client reads whole blocks");
    assert_eq!(op.send_checksums, Some(false));
    write_proto(stream, &success_response()).await;

    // The client asked for no checksums, so PLEN is 4 + data only.
    let mut seqno: i64 = 0;
    let mut offset: i64 = 0;
    for chunk in content.chunks(16 * 1024) {
        let header = PacketHeaderProto {
            offset_in_block: offset,
            seqno,
            last_packet_in_block: false,
            data_len: chunk.len() as i32,
            sync_block: Some(false),
        };
        let header_bytes = header.encode_to_vec();
        stream.write_u32((4 + chunk.len()) as u32).await.unwrap();
        stream.write_u16(header_bytes.len() as u16).await.unwrap();
        stream.write_all(&header_bytes).await.unwrap();
        stream.write_all(chunk).await.unwrap();
        seqno += 1;
        offset += chunk.len() as i64;
    }
    let last = PacketHeaderProto {
        offset_in_block: offset,
        seqno,
        last_packet_in_block: true,
        data_len: 0,
        sync_block: Some(false),
    };
    let header_bytes = last.encode_to_vec();
    stream.write_u32(4).await.unwrap();
    stream.write_u16(header_bytes.len() as u16).await.unwrap();
    stream.write_all(&header_bytes).await.unwrap();
}

async fn serve_write(stream: &mut TcpStream, state: Shared) {
    let op: OpWriteBlockProto = read_proto(stream).await;
    let block_id = op.header.base_header.block.block_id;
    assert!(!op.header.client_name.is_empty());
    write_proto(stream, &success_response()).await;

    let mut data = Vec::new();
    let mut records = Vec::new();
    let mut expected_seqno: i64 = 0;
    loop {
        let plen = stream.read_u32().await.unwrap() as usize;
        let hlen = stream.read_u16().await.unwrap() as usize;
        let mut header_bytes = vec![0u8; hlen];
        stream.read_exact(&mut header_bytes).await.unwrap();
        let header = PacketHeaderProto::decode(&header_bytes[..]).unwrap();

        let data_len = header.data_len as usize;
        let checksum_len = plen.checked_sub(4 + data_len).expect("PLEN covers itself + data");
        let mut checksums = vec![0u8; checksum_len];
        stream.read_exact(&mut checksums).await.unwrap();
        let mut payload = vec![0u8; data_len];
        stream.read_exact(&mut payload).await.unwrap();

        assert_eq!(header.seqno, expected_seqno, "contiguous sequence numbers");
        assert_eq!(header.offset_in_block as usize, data.len(), "offset tracks bytes sent");
        if header.last_packet_in_block {
            assert_eq!(data_len, 0, "final packet is empty");
            assert_eq!(checksum_len, 0, "final packet carries no checksums");
        } else {
            // One CRC32 per 512-byte chunk, recomputed independently.
            assert_eq!(checksum_len, data_len.div_ceil(512) * 4);
            for (i, chunk) in payload.chunks(512).enumerate() {
                let expected = crc32fast::hash(chunk).to_be_bytes();
                assert_eq!(checksums[i * 4..i * 4 + 4], expected, "chunk {i} checksum");
            }
        }

        records.push(PacketRecord {
            seqno: header.seqno,
            len: data_len,
            last: header.last_packet_in_block,
        });
        data.extend_from_slice(&payload);

        let ack = PipelineAckProto {
            seqno: header.seqno,
            reply: vec![Status::Success as i32],
            downstream_ack_time_nanos: Some(0),
            flag: Vec::new(),
        };
        write_proto(stream, &ack).await;

        expected_seqno += 1;
        if header.last_packet_in_block {
            break;
        }
    }

    let mut ns = state.lock().unwrap();
    ns.block_data.insert(block_id, data);
    ns.write_sessions.push(records);
}
