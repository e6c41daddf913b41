//! Hand-maintained mirrors of the wire protocol messages.
//!
//! Only the messages this client actually reads or writes are kept, with
//! tags matching the reference server's definitions. Field presence
//! follows the originals: proto2 `required` fields use prost's `required`
//! modifier so a missing field is a decode error, not a silent default.

pub mod datatransfer;
pub mod hdfs;
pub mod rpc;
