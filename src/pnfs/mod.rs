//! pNFS layout protocol layer.
//!
//! The metadata server hands clients a layout naming a device and a data
//! server filehandle; clients then send READ/WRITE/COMMIT straight to the
//! data servers.
//!
//! ```text
//!   client ──LAYOUTGET──────▶ MdsExport ──file_layout──▶ MetadataBackend
//!     │   ◀──file layout─────     │
//!     │                           └──LayoutStateTable (grants per client)
//!     ├──GETDEVICEINFO────▶ DeviceRegistry ──▶ MdsExport ──stripe_table──▶ node addresses
//!     │
//!     └──READ/WRITE(fh)───▶ DataServer ──locate + owner check──▶ DataBackend
//! ```
//!
//! Both sides compute stripe ownership through the same
//! [`StripePlacement`](backend::StripePlacement), so a data server accepts
//! exactly the I/O the advertised device table sends it.

pub mod backend;
pub mod codec;
pub mod deviceid;
pub mod ds;
pub mod handle;
pub mod mds;
pub mod segment;
pub mod state;
pub mod stripe;

pub use backend::{
    DataBackend, FileAttrs, FileDescriptor, FileId, FileLayoutParams, MetadataBackend, NodeId,
    SetAttrs, StorageError, StorageResult, StripePlacement,
};
pub use deviceid::{DeviceId, DeviceRegistry};
pub use ds::{DataServer, DsReadResult, DsWriteResult};
pub use handle::{DsHandle, DsWire, HandleError};
pub use mds::{
    GetDeviceListResult, LayoutCommitArgs, LayoutCommitResult, LayoutGetArgs, LayoutGetResult,
    LayoutReturnArgs, LayoutReturnResult, MdsExport, ReturnRange,
};
pub use segment::{Segment, NFS4_UINT64_MAX};
pub use state::{ClientId, GrantedLayout, LayoutStateTable, ReturnOutcome};
pub use stripe::{HashPlacement, StripeLocation, StripeUtil};
