//! Device ids and the export registry used to route them.
//!
//! A device id is two 64-bit quads: the export id, and a per-export device
//! number. Every backend here uses the file's inode number as the device
//! number, so devices are never allocated or freed and the set of devices
//! is unbounded.

use crate::nfs::{
    NfsError, NfsResult, NfsStatus, XdrDecoder, XdrEncoder, XdrResult, NFS4_DEVICEID4_SIZE,
};
use crate::pnfs::mds::{check_layout_type, MdsExport};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// 128-bit pNFS device identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId {
    /// Export the device belongs to.
    pub export_id: u64,
    /// Export-local device number.
    pub devid: u64,
}

impl DeviceId {
    pub const fn new(export_id: u64, devid: u64) -> Self {
        Self { export_id, devid }
    }

    /// Device id for a file: the low quad is the inode number.
    pub const fn derive_from_inode(export_id: u64, inode: u64) -> Self {
        Self::new(export_id, inode)
    }

    /// Wire representation (`deviceid4`).
    pub fn encode(&self) -> [u8; NFS4_DEVICEID4_SIZE] {
        let mut bytes = [0u8; NFS4_DEVICEID4_SIZE];
        bytes[..8].copy_from_slice(&self.export_id.to_be_bytes());
        bytes[8..].copy_from_slice(&self.devid.to_be_bytes());
        bytes
    }

    pub fn decode(bytes: &[u8; NFS4_DEVICEID4_SIZE]) -> Self {
        let mut export_id = [0u8; 8];
        let mut devid = [0u8; 8];
        export_id.copy_from_slice(&bytes[..8]);
        devid.copy_from_slice(&bytes[8..]);
        Self {
            export_id: u64::from_be_bytes(export_id),
            devid: u64::from_be_bytes(devid),
        }
    }

    pub fn encode_xdr(&self, enc: &mut XdrEncoder) -> XdrResult<()> {
        enc.encode_opaque_fixed(&self.encode())
    }

    pub fn decode_xdr(dec: &mut XdrDecoder<'_>) -> XdrResult<Self> {
        Ok(Self::decode(&dec.decode_array::<NFS4_DEVICEID4_SIZE>()?))
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}:{:016x}", self.export_id, self.devid)
    }
}

/// Maps the export quad of a device id to the export that issued it.
pub struct DeviceRegistry {
    exports: RwLock<HashMap<u64, Arc<MdsExport>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            exports: RwLock::new(HashMap::new()),
        }
    }

    /// Register an export, replacing any previous export with the same id.
    pub fn register(&self, export: Arc<MdsExport>) {
        let export_id = export.export_id();
        info!(export_id, "Registered pNFS export");
        self.exports.write().insert(export_id, export);
    }

    pub fn unregister(&self, export_id: u64) -> Option<Arc<MdsExport>> {
        let removed = self.exports.write().remove(&export_id);
        if removed.is_some() {
            info!(export_id, "Unregistered pNFS export");
        }
        removed
    }

    pub fn get(&self, export_id: u64) -> Option<Arc<MdsExport>> {
        self.exports.read().get(&export_id).cloned()
    }

    /// Resolve the export that owns `deviceid`.
    pub fn route(&self, deviceid: &DeviceId) -> Result<Arc<MdsExport>, NfsError> {
        match self.get(deviceid.export_id) {
            Some(export) => Ok(export),
            None => {
                debug!(%deviceid, "Device id names an unknown export");
                Err(NfsError::protocol(NfsStatus::Noent))
            }
        }
    }

    /// GETDEVICEINFO entry point: check the layout type, then hand the
    /// request to the export named by the device id.
    pub async fn getdeviceinfo(
        &self,
        layout_type: u32,
        deviceid: &DeviceId,
        da_addr: &mut XdrEncoder,
    ) -> NfsResult<()> {
        check_layout_type("getdeviceinfo", layout_type)?;
        let export = self.route(deviceid)?;
        export.getdeviceinfo(layout_type, deviceid, da_addr).await
    }

    pub fn len(&self) -> usize {
        self.exports.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.exports.read().is_empty()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
