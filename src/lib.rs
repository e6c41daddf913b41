//! A lightweight client for HDFS-compatible distributed file systems.
//!
//! Speaks the coordinator's metadata RPC and the storage nodes' binary
//! data-transfer protocol directly, with no dependency on the reference
//! implementation's runtime. [`DfsClient`] exposes a file-system-like
//! surface (list, read, write, delete); [`transfer::TransferManager`]
//! fans many file transfers across a worker pool.

pub mod config;
pub mod coordinator;
pub mod datatransfer;
pub mod error;
pub mod fs;
pub mod model;
pub mod path;
pub mod proto;
pub mod rpc;
pub mod transfer;

pub use config::{ClientConfig, Endpoint};
pub use error::{Error, Result};
pub use fs::DfsClient;
pub use model::{BlockLocation, FileKind, FileSummary, Replica, ServerInfo};
pub use transfer::{ProgressListener, TransferManager, TransferReport, TransferResult};
