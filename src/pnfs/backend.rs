//! Storage backend collaborators.
//!
//! The pNFS layer never talks to storage directly. The metadata server asks
//! a [`MetadataBackend`] for file layout parameters, topology and attributes;
//! a data server drives a [`DataBackend`] for block I/O. Both share
//! [`StripePlacement`], so the owner of a stripe is computed by the same
//! function on every node.
//!
//! All calls may block on the network or disk and are therefore async.

use crate::nfs::{NfsTime4, PosixError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io;
use std::net::SocketAddrV4;
use thiserror::Error;

/// Storage node identifier.
pub type NodeId = u32;

/// Error reported by a storage backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{context}: {errno}")]
pub struct StorageError {
    pub errno: PosixError,
    pub context: String,
}

impl StorageError {
    pub fn new(errno: PosixError, context: impl Into<String>) -> Self {
        Self {
            errno,
            context: context.into(),
        }
    }

    pub fn from_errno(errno: i32, context: impl Into<String>) -> Self {
        Self::new(PosixError::from_errno(errno), context)
    }
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        let errno = err
            .raw_os_error()
            .map(PosixError::from_errno)
            .unwrap_or(PosixError::Io);
        Self::new(errno, err.to_string())
    }
}

/// Result type for backend calls.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Identity of a file (or of one snapshot of it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId {
    pub inode: u64,
    pub snapid: u64,
}

impl FileId {
    /// Snapshot id of the live (writable) file.
    pub const NOSNAP: u64 = u64::MAX - 1;

    pub const fn new(inode: u64, snapid: u64) -> Self {
        Self { inode, snapid }
    }

    /// The live head of `inode`.
    pub const fn head(inode: u64) -> Self {
        Self::new(inode, Self::NOSNAP)
    }
}

/// Striping parameters the backend reports for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FileLayoutParams {
    /// Bytes per stripe. Zero means the file has no usable layout.
    pub stripe_unit: u32,
    pub stripe_count: u32,
    pub object_size: u32,
    pub pool_id: i64,
    /// Parent directory inode.
    pub parent_inode: u64,
    /// Hash of the file's name within its parent.
    pub parent_hash: u32,
}

/// Attributes LAYOUTCOMMIT reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileAttrs {
    pub size: u64,
    pub mtime: NfsTime4,
}

/// Attributes LAYOUTCOMMIT may change. `None` leaves the attribute alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SetAttrs {
    pub size: Option<u64>,
    pub mtime: Option<NfsTime4>,
}

impl SetAttrs {
    pub fn is_empty(&self) -> bool {
        self.size.is_none() && self.mtime.is_none()
    }
}

/// Open file on a data server's MDS-routed write path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileDescriptor(pub u64);

/// Maps a stripe of a file to the node that stores it.
#[async_trait]
pub trait StripePlacement: Send + Sync {
    async fn stripe_owner(
        &self,
        file: FileId,
        stripe: u64,
        layout: &FileLayoutParams,
    ) -> StorageResult<NodeId>;
}

/// Backend consulted by the metadata server.
#[async_trait]
pub trait MetadataBackend: StripePlacement {
    /// Striping parameters of `file`.
    async fn file_layout(&self, file: FileId) -> StorageResult<FileLayoutParams>;

    /// Current snapshot sequence of `file`.
    async fn snap_seq(&self, file: FileId) -> StorageResult<u64>;

    /// Number of storage nodes in the cluster.
    async fn node_count(&self) -> StorageResult<u32>;

    /// TCP endpoint of a storage node.
    async fn node_address(&self, node: NodeId) -> StorageResult<SocketAddrV4>;

    async fn getattr(&self, file: FileId) -> StorageResult<FileAttrs>;

    async fn setattr(&self, file: FileId, attrs: &SetAttrs) -> StorageResult<()>;
}

/// Backend driven by a data server.
#[async_trait]
pub trait DataBackend: StripePlacement {
    /// Node this data server runs on.
    fn local_node(&self) -> NodeId;

    /// Read up to `len` bytes of one stripe, starting `offset` bytes into it.
    async fn read_block(
        &self,
        file: FileId,
        layout: &FileLayoutParams,
        stripe: u64,
        offset: u64,
        len: u32,
    ) -> StorageResult<Vec<u8>>;

    /// Write into one stripe. `sync` requests data durability before return.
    #[allow(clippy::too_many_arguments)]
    async fn write_block(
        &self,
        file: FileId,
        layout: &FileLayoutParams,
        stripe: u64,
        offset: u64,
        data: &[u8],
        snapseq: u64,
        sync: bool,
    ) -> StorageResult<u32>;

    /// Make a byte range of earlier unstable writes durable.
    async fn commit_blocks(&self, file: FileId, offset: u64, count: u64) -> StorageResult<()>;

    /// Make `file` reachable through the namespace by parent inode and name hash.
    async fn connect(&self, file: FileId, parent_inode: u64, parent_hash: u32)
        -> StorageResult<()>;

    async fn open_write(&self, file: FileId) -> StorageResult<FileDescriptor>;

    async fn write(&self, fd: FileDescriptor, offset: u64, data: &[u8]) -> StorageResult<u32>;

    async fn fsync(&self, fd: FileDescriptor) -> StorageResult<()>;

    async fn close(&self, fd: FileDescriptor) -> StorageResult<()>;
}
