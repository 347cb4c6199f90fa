//! Data-server filehandles.
//!
//! A filehandle embedded in a layout is not the backend's own handle. It is
//! a versioned envelope around an opaque backend payload, flagged as a
//! data-server handle and tagged with the server id, so a data server can
//! unwrap it on READ/WRITE without asking the metadata server.
//!
//! ```text
//!  0        1        2        4        5                 5+len
//!  ┌────────┬────────┬────────┬────────┬──────────────────┐
//!  │fhversion│ flags  │server_id│  len   │ payload (DsWire) │
//!  └────────┴────────┴────────┴────────┴──────────────────┘
//! ```

use crate::nfs::{NfsFh4, NFS4_FHSIZE};
use crate::pnfs::backend::{FileId, FileLayoutParams};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Envelope format version.
pub const FH_VERSION: u8 = 0x43;

/// Flag bit marking a data-server handle.
pub const FH_FLAG_DS: u8 = 0x01;

/// Bytes of envelope header preceding the payload.
pub const FH_HEADER_LEN: usize = 5;

/// Largest payload that still fits in an `nfs_fh4`.
pub const FH_MAX_PAYLOAD: usize = NFS4_FHSIZE - FH_HEADER_LEN;

/// Filehandle envelope error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandleError {
    #[error("handle too short: {0} bytes")]
    Truncated(usize),

    #[error("unsupported handle version {0:#x}")]
    BadVersion(u8),

    #[error("not a data-server handle")]
    NotDataServer,

    #[error("payload length {declared} does not match {actual} bytes present")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("payload of {0} bytes exceeds NFS4_FHSIZE")]
    TooLarge(usize),

    #[error("payload is {0} bytes, expected {size}", size = DsWire::SIZE)]
    BadPayload(usize),
}

/// Envelope around an opaque backend handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DsHandle {
    pub server_id: u16,
    pub is_ds: bool,
    payload: Vec<u8>,
}

impl DsHandle {
    /// Wrap an already-serialized backend payload as a data-server handle.
    pub fn new(server_id: u16, payload: Vec<u8>) -> Result<Self, HandleError> {
        if payload.len() > FH_MAX_PAYLOAD {
            return Err(HandleError::TooLarge(payload.len()));
        }
        Ok(Self {
            server_id,
            is_ds: true,
            payload,
        })
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Serialize to the bytes carried in `nfs_fh4`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(FH_HEADER_LEN + self.payload.len());
        bytes.push(FH_VERSION);
        bytes.push(if self.is_ds { FH_FLAG_DS } else { 0 });
        bytes.extend_from_slice(&self.server_id.to_be_bytes());
        // Bounded by FH_MAX_PAYLOAD at construction.
        bytes.push(self.payload.len() as u8);
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    pub fn to_fh(&self) -> NfsFh4 {
        NfsFh4::new(self.to_bytes())
    }

    /// Parse an envelope. Handles without the data-server flag are rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HandleError> {
        if bytes.len() < FH_HEADER_LEN {
            return Err(HandleError::Truncated(bytes.len()));
        }
        if bytes[0] != FH_VERSION {
            return Err(HandleError::BadVersion(bytes[0]));
        }
        if bytes[1] & FH_FLAG_DS == 0 {
            return Err(HandleError::NotDataServer);
        }
        let server_id = u16::from_be_bytes([bytes[2], bytes[3]]);
        let declared = bytes[4] as usize;
        let payload = &bytes[FH_HEADER_LEN..];
        if payload.len() != declared {
            return Err(HandleError::LengthMismatch {
                declared,
                actual: payload.len(),
            });
        }
        Ok(Self {
            server_id,
            is_ds: true,
            payload: payload.to_vec(),
        })
    }
}

/// Payload a data server needs to serve I/O for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DsWire {
    pub inode: u64,
    pub snapid: u64,
    /// Parent directory inode, used to reach the file through the namespace.
    pub parent_inode: u64,
    /// Hash of the file's name within its parent.
    pub parent_hash: u32,
    pub stripe_unit: u32,
    pub stripe_count: u32,
    pub object_size: u32,
    pub pool_id: i64,
    /// Snapshot sequence the layout was granted under.
    pub snapseq: u64,
}

impl DsWire {
    /// Encoded size in bytes.
    pub const SIZE: usize = 56;

    pub fn new(file: FileId, layout: &FileLayoutParams, snapseq: u64) -> Self {
        Self {
            inode: file.inode,
            snapid: file.snapid,
            parent_inode: layout.parent_inode,
            parent_hash: layout.parent_hash,
            stripe_unit: layout.stripe_unit,
            stripe_count: layout.stripe_count,
            object_size: layout.object_size,
            pool_id: layout.pool_id,
            snapseq,
        }
    }

    pub fn file_id(&self) -> FileId {
        FileId::new(self.inode, self.snapid)
    }

    /// Layout parameters carried in the handle.
    pub fn layout(&self) -> FileLayoutParams {
        FileLayoutParams {
            stripe_unit: self.stripe_unit,
            stripe_count: self.stripe_count,
            object_size: self.object_size,
            pool_id: self.pool_id,
            parent_inode: self.parent_inode,
            parent_hash: self.parent_hash,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..8].copy_from_slice(&self.inode.to_be_bytes());
        out[8..16].copy_from_slice(&self.snapid.to_be_bytes());
        out[16..24].copy_from_slice(&self.parent_inode.to_be_bytes());
        out[24..28].copy_from_slice(&self.parent_hash.to_be_bytes());
        out[28..32].copy_from_slice(&self.stripe_unit.to_be_bytes());
        out[32..36].copy_from_slice(&self.stripe_count.to_be_bytes());
        out[36..40].copy_from_slice(&self.object_size.to_be_bytes());
        out[40..48].copy_from_slice(&self.pool_id.to_be_bytes());
        out[48..56].copy_from_slice(&self.snapseq.to_be_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HandleError> {
        let bytes: &[u8; Self::SIZE] = bytes
            .try_into()
            .map_err(|_| HandleError::BadPayload(bytes.len()))?;

        let u64_at = |at: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&bytes[at..at + 8]);
            u64::from_be_bytes(b)
        };
        let u32_at = |at: usize| {
            let mut b = [0u8; 4];
            b.copy_from_slice(&bytes[at..at + 4]);
            u32::from_be_bytes(b)
        };

        Ok(Self {
            inode: u64_at(0),
            snapid: u64_at(8),
            parent_inode: u64_at(16),
            parent_hash: u32_at(24),
            stripe_unit: u32_at(28),
            stripe_count: u32_at(32),
            object_size: u32_at(36),
            pool_id: u64_at(40) as i64,
            snapseq: u64_at(48),
        })
    }

    /// Wrap into a data-server handle envelope.
    pub fn into_handle(self, server_id: u16) -> Result<DsHandle, HandleError> {
        DsHandle::new(server_id, self.to_bytes().to_vec())
    }

    /// Unwrap a data-server handle envelope.
    pub fn from_handle(handle: &DsHandle) -> Result<Self, HandleError> {
        Self::from_bytes(handle.payload())
    }
}
