//! pnfs-fsal - the pNFS layout layer of an NFSv4.1 server.
//!
//! A metadata server grants clients file layouts that point them straight at
//! the storage nodes holding each stripe of a file; the storage nodes then
//! act as pNFS data servers. This crate holds everything between the RPC
//! dispatcher and the storage backend.
//!
//! # Features
//!
//! - **Layout grants**: LAYOUTGET, LAYOUTRETURN, LAYOUTCOMMIT with
//!   per-client layout state.
//! - **Device topology**: GETDEVICEINFO built from the backend's stripe
//!   placement, GETDEVICELIST.
//! - **Data server I/O**: READ, WRITE and COMMIT on data-server filehandles,
//!   with stripe ownership checks.
//! - **Wire codec**: byte-exact NFSv4.1 file layout and flex-file XDR.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              RPC dispatcher (embedding server)               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  pnfs::mds  MdsExport        │  pnfs::ds  DataServer         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  segment │ state │ deviceid │ handle │ stripe │ codec        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  nfs: status codes, XDR, protocol types                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  MetadataBackend / DataBackend (storage cluster)             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use pnfs_fsal::config::PnfsConfig;
//!
//! fn main() -> pnfs_fsal::Result<()> {
//!     let config = PnfsConfig::development();
//!     pnfs_fsal::observability::init(&config.observability)?;
//!     config.validate()?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod nfs;
pub mod node;
pub mod observability;
pub mod pnfs;

// Re-exports
pub use error::{FsalError, Result};
pub use node::PnfsNode;
