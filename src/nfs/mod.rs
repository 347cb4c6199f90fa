//! NFSv4.1 protocol building blocks.
//!
//! The pNFS layer sits below the RPC dispatcher of an NFS server: requests
//! arrive already parsed, and replies are written into XDR buffers handed
//! down by the dispatcher.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │            RPC dispatcher (external: transport, auth)         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  pnfs::mds  LAYOUTGET/RETURN/COMMIT, GETDEVICEINFO/LIST       │
//! │  pnfs::ds   READ / WRITE / COMMIT on data-server handles      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  nfs::types │ nfs::xdr (bounded encoder) │ nfs::error         │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod error;
mod types;
pub mod xdr;

pub use error::{NfsError, NfsResult, NfsStatus, PosixError};
pub use types::{
    LayoutType, Layoutiomode4, Layouttype4, NfsFh4, NfsTime4, StableHow4, Stateid4, Verifier4,
    NFS4_DEVICEID4_SIZE, NFS4_FHSIZE, NFS4_VERIFIER_SIZE,
};
pub use xdr::{XdrDecoder, XdrEncoder, XdrError, XdrMark, XdrResult};
