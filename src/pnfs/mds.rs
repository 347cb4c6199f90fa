//! Metadata server side of the pNFS layout protocol.
//!
//! An [`MdsExport`] answers the layout operations for one export:
//!
//! ```text
//!   LAYOUTGET ──▶ file_layout ──▶ range policy ──▶ DsWire ──▶ nfsv4_1_file_layout4
//!                                                    │
//!                                                    └──▶ LayoutStateTable::grant
//!   GETDEVICEINFO ──▶ stripe_table ──▶ node_address ──▶ nfsv4_1_file_layout_ds_addr4
//!   LAYOUTCOMMIT ──▶ getattr ──▶ grow size / newer mtime ──▶ setattr
//! ```
//!
//! Every layout is the whole stripe pattern of the file: `stripe_unit`
//! times the configured pattern size, read/write, returned on close. The
//! device id of a file is its inode, so GETDEVICEINFO can rebuild the
//! stripe table without any stored state.

use crate::config::MdsConfig;
use crate::error::Result;
use crate::nfs::{
    LayoutType, Layoutiomode4, NfsError, NfsResult, NfsStatus, NfsTime4, PosixError, Stateid4,
    XdrEncoder,
};
use crate::observability::{layout_timer, record_layout_op};
use crate::pnfs::backend::{FileId, MetadataBackend, SetAttrs, StorageError};
use crate::pnfs::codec::{
    encode_file_device_addr, encode_file_layout, FileDeviceAddr, FileLayout, MultipathMember,
};
use crate::pnfs::deviceid::DeviceId;
use crate::pnfs::handle::DsWire;
use crate::pnfs::segment::{overlaps, Segment, NFS4_UINT64_MAX};
use crate::pnfs::state::{ClientId, GrantedLayout, LayoutStateTable, ReturnOutcome};
use crate::pnfs::stripe::{stripe_table, StripeUtil};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Number of striped LAYOUTCOMMIT locks.
const COMMIT_LOCK_STRIPES: usize = 64;

/// LAYOUTGET arguments.
#[derive(Debug, Clone, Copy)]
pub struct LayoutGetArgs {
    /// Raw `layouttype4` from the request.
    pub layout_type: u32,
    pub client: ClientId,
    /// Requested range and io mode.
    pub segment: Segment,
    /// Smallest length the client will accept.
    pub minlength: u64,
}

/// LAYOUTGET result. The layout body itself goes to the caller's encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutGetResult {
    pub stateid: Stateid4,
    pub segment: Segment,
    pub deviceid: DeviceId,
    pub return_on_close: bool,
    pub last_segment: bool,
}

/// Range named by a LAYOUTRETURN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnRange {
    /// LAYOUTRETURN4_FILE: one range of the current file.
    File(Segment),
    /// LAYOUTRETURN4_FSID / LAYOUTRETURN4_ALL: every layout of the client.
    All(Layoutiomode4),
}

#[derive(Debug, Clone, Copy)]
pub struct LayoutReturnArgs {
    pub layout_type: u32,
    pub client: ClientId,
    pub range: ReturnRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutReturnResult {
    pub outcome: ReturnOutcome,
    /// Stateid of the layout state that survives the return, if any.
    pub stateid: Option<Stateid4>,
}

/// LAYOUTCOMMIT arguments.
#[derive(Debug, Clone, Copy)]
pub struct LayoutCommitArgs {
    pub layout_type: u32,
    /// Offset of the last byte written, when the client supplied one.
    pub last_write: Option<u64>,
    /// Modification time proposed by the client.
    pub new_time: Option<NfsTime4>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutCommitResult {
    pub commit_done: bool,
    /// New file size, when the commit grew the file.
    pub new_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetDeviceListResult {
    pub deviceids: Vec<DeviceId>,
    pub cookie: u64,
    pub eof: bool,
}

/// Fail with `UnknownLayoutType` unless `layout_type` is supported.
pub(crate) fn check_layout_type(op: &'static str, layout_type: u32) -> NfsResult<LayoutType> {
    LayoutType::from_wire(layout_type).ok_or_else(|| {
        error!(op, layout_type, "Unsupported layout type");
        NfsError::protocol(NfsStatus::UnknownLayoutType)
    })
}

fn observe<T>(op: &'static str, result: NfsResult<T>) -> NfsResult<T> {
    let status = match &result {
        Ok(_) => NfsStatus::Ok,
        Err(err) => err.to_status(),
    };
    record_layout_op(op, &status.to_string());
    result
}

/// One pNFS export served by the metadata server.
pub struct MdsExport {
    config: MdsConfig,
    backend: Arc<dyn MetadataBackend>,
    state: LayoutStateTable,
    commit_locks: Vec<Mutex<()>>,
}

impl MdsExport {
    /// Build an export after validating its configuration.
    pub fn new(config: MdsConfig, backend: Arc<dyn MetadataBackend>) -> Result<Self> {
        config.validate()?;
        info!(
            export_id = config.export_id,
            pattern_stripes = config.max_pattern_stripes,
            "Created pNFS export"
        );
        Ok(Self {
            config,
            backend,
            state: LayoutStateTable::new(),
            commit_locks: (0..COMMIT_LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        })
    }

    pub fn export_id(&self) -> u64 {
        self.config.export_id
    }

    pub fn config(&self) -> &MdsConfig {
        &self.config
    }

    /// Layout types this export grants (`fs_layout_types`).
    pub fn layout_types(&self) -> &'static [LayoutType] {
        LayoutType::SUPPORTED
    }

    pub fn layout_blocksize(&self) -> u32 {
        self.config.layout_blocksize
    }

    pub fn maximum_segments(&self) -> u32 {
        self.config.maximum_segments
    }

    pub fn loc_body_size(&self) -> usize {
        self.config.loc_body_size
    }

    pub fn da_addr_size(&self) -> usize {
        self.config.da_addr_size
    }

    /// Encoder sized for one layout body.
    pub fn loc_body_encoder(&self) -> XdrEncoder {
        XdrEncoder::with_limit(self.config.loc_body_size)
    }

    /// Encoder sized for one device address.
    pub fn da_addr_encoder(&self) -> XdrEncoder {
        XdrEncoder::with_limit(self.config.da_addr_size)
    }

    pub fn state(&self) -> &LayoutStateTable {
        &self.state
    }

    /// Bytes covered by the stripe pattern of a file with this stripe unit.
    fn pattern_span(&self, stripe_unit: u32) -> u64 {
        (stripe_unit as u64).saturating_mul(self.config.max_pattern_stripes as u64)
    }

    /// LAYOUTGET: grant the whole stripe pattern of `file`.
    pub async fn layoutget(
        &self,
        file: FileId,
        args: &LayoutGetArgs,
        loc_body: &mut XdrEncoder,
    ) -> NfsResult<LayoutGetResult> {
        let _timer = layout_timer("layoutget");
        observe("layoutget", self.do_layoutget(file, args, loc_body).await)
    }

    async fn do_layoutget(
        &self,
        file: FileId,
        args: &LayoutGetArgs,
        loc_body: &mut XdrEncoder,
    ) -> NfsResult<LayoutGetResult> {
        check_layout_type("layoutget", args.layout_type)?;
        if args.segment.io_mode == Layoutiomode4::Any {
            return Err(NfsError::protocol(NfsStatus::BadIomode));
        }

        let layout = self.backend.file_layout(file).await?;
        if layout.stripe_unit == 0 {
            warn!(inode = file.inode, "File has no stripe unit");
            return Err(NfsError::protocol(NfsStatus::Inval));
        }

        let span = self.pattern_span(layout.stripe_unit);
        if !args.segment.is_whole_file() {
            let wanted = Segment::new(args.segment.io_mode, args.segment.offset, args.minlength);
            let forbidden = Segment::new(args.segment.io_mode, span, NFS4_UINT64_MAX);
            if overlaps(&wanted, &forbidden) {
                debug!(
                    inode = file.inode,
                    offset = args.segment.offset,
                    minlength = args.minlength,
                    span,
                    "Requested range reaches past the stripe pattern"
                );
                return Err(NfsError::protocol(NfsStatus::BadLayout));
            }
        }
        let segment = Segment::new(Layoutiomode4::Rw, 0, span);

        let util = StripeUtil::sparse(layout.stripe_unit);
        if !util.is_encodable() {
            error!(
                inode = file.inode,
                stripe_unit = layout.stripe_unit,
                "Stripe unit collides with layout util flags"
            );
            return Err(NfsError::protocol(NfsStatus::Serverfault));
        }

        let snapseq = self.backend.snap_seq(file).await?;
        let handle = DsWire::new(file, &layout, snapseq)
            .into_handle(self.config.server_id)
            .map_err(|e| {
                error!(inode = file.inode, error = %e, "Failed to wrap DS handle");
                NfsError::protocol(NfsStatus::Serverfault)
            })?;

        let deviceid = DeviceId::derive_from_inode(self.config.export_id, file.inode);
        let body = FileLayout {
            deviceid,
            util,
            first_stripe_index: 0,
            pattern_offset: 0,
            handles: vec![handle],
        };

        let mark = loc_body.mark();
        if let Err(e) = encode_file_layout(loc_body, &body) {
            loc_body.rewind(mark);
            error!(inode = file.inode, error = %e, "Failed to encode file layout");
            return Err(NfsError::Encode(e));
        }

        let granted = GrantedLayout {
            segment,
            deviceid,
            return_on_close: true,
            last_segment: true,
        };
        let stateid = self.state.grant(file, args.client, granted);

        debug!(
            inode = file.inode,
            client = args.client.0,
            %deviceid,
            length = span,
            "Granted layout"
        );
        Ok(LayoutGetResult {
            stateid,
            segment,
            deviceid,
            return_on_close: true,
            last_segment: true,
        })
    }

    /// LAYOUTRETURN: release granted segments.
    ///
    /// The backend holds no pins on behalf of layouts, so only the state
    /// table changes.
    pub async fn layoutreturn(
        &self,
        file: FileId,
        args: &LayoutReturnArgs,
    ) -> NfsResult<LayoutReturnResult> {
        let _timer = layout_timer("layoutreturn");
        observe("layoutreturn", self.do_layoutreturn(file, args))
    }

    fn do_layoutreturn(&self, file: FileId, args: &LayoutReturnArgs) -> NfsResult<LayoutReturnResult> {
        check_layout_type("layoutreturn", args.layout_type)?;

        match args.range {
            ReturnRange::File(segment) => {
                let outcome = self.state.return_range(file, args.client, &segment);
                let stateid = if outcome.state_deleted {
                    None
                } else {
                    self.state.stateid(file, args.client)
                };
                Ok(LayoutReturnResult { outcome, stateid })
            }
            ReturnRange::All(io_mode) => Ok(LayoutReturnResult {
                outcome: self.state.return_all(args.client, io_mode),
                stateid: None,
            }),
        }
    }

    /// Drop `return_on_close` layouts of `client` on `file`.
    pub fn close(&self, file: FileId, client: ClientId) -> usize {
        self.state.close(file, client)
    }

    /// LAYOUTCOMMIT: publish the size and mtime of data written through a
    /// layout.
    pub async fn layoutcommit(
        &self,
        file: FileId,
        args: &LayoutCommitArgs,
    ) -> NfsResult<LayoutCommitResult> {
        let _timer = layout_timer("layoutcommit");
        observe("layoutcommit", self.do_layoutcommit(file, args).await)
    }

    async fn do_layoutcommit(
        &self,
        file: FileId,
        args: &LayoutCommitArgs,
    ) -> NfsResult<LayoutCommitResult> {
        check_layout_type("layoutcommit", args.layout_type)?;

        let lock = &self.commit_locks[(file.inode % self.commit_locks.len() as u64) as usize];
        let _guard = lock.lock().await;

        let current = self.backend.getattr(file).await.map_err(commit_error)?;

        let mut attrs = SetAttrs::default();
        if let Some(last_write) = args.last_write {
            let end = last_write.saturating_add(1);
            if current.size < end {
                attrs.size = Some(end);
            }
        }
        attrs.mtime = Some(match args.new_time {
            Some(time) if time > current.mtime => time,
            _ => NfsTime4::now(),
        });

        self.backend
            .setattr(file, &attrs)
            .await
            .map_err(commit_error)?;

        debug!(inode = file.inode, new_size = ?attrs.size, "Committed layout");
        Ok(LayoutCommitResult {
            commit_done: true,
            new_size: attrs.size,
        })
    }

    /// GETDEVICEINFO: encode the stripe table of the file named by `deviceid`.
    pub async fn getdeviceinfo(
        &self,
        layout_type: u32,
        deviceid: &DeviceId,
        da_addr: &mut XdrEncoder,
    ) -> NfsResult<()> {
        let _timer = layout_timer("getdeviceinfo");
        observe(
            "getdeviceinfo",
            self.do_getdeviceinfo(layout_type, deviceid, da_addr).await,
        )
    }

    async fn do_getdeviceinfo(
        &self,
        layout_type: u32,
        deviceid: &DeviceId,
        da_addr: &mut XdrEncoder,
    ) -> NfsResult<()> {
        check_layout_type("getdeviceinfo", layout_type)?;

        let file = FileId::new(deviceid.devid, FileId::NOSNAP);
        let layout = self
            .backend
            .file_layout(file)
            .await
            .map_err(|e| placement_failure(deviceid, "file layout", e))?;

        let owners = stripe_table(
            self.backend.as_ref(),
            file,
            &layout,
            self.config.max_pattern_stripes,
        )
        .await
        .map_err(|e| placement_failure(deviceid, "stripe owner", e))?;

        let node_count = self
            .backend
            .node_count()
            .await
            .map_err(|e| placement_failure(deviceid, "node count", e))?;
        if let Some(stray) = owners.iter().find(|&&node| node >= node_count) {
            error!(%deviceid, node = *stray, node_count, "Stripe owner outside the cluster");
            return Err(NfsError::protocol(NfsStatus::Serverfault));
        }

        let mut multipath_lists = Vec::with_capacity(node_count as usize);
        for node in 0..node_count {
            let addr = self
                .backend
                .node_address(node)
                .await
                .map_err(|e| placement_failure(deviceid, "node address", e))?;
            multipath_lists.push(vec![MultipathMember::tcp(addr)]);
        }

        let addr = FileDeviceAddr {
            stripe_indices: owners,
            multipath_lists,
        };

        let mark = da_addr.mark();
        if let Err(e) = encode_file_device_addr(da_addr, &addr) {
            da_addr.rewind(mark);
            error!(%deviceid, error = %e, "Failed to encode device address");
            return Err(NfsError::Encode(e));
        }

        debug!(%deviceid, nodes = node_count, "Encoded device info");
        Ok(())
    }

    /// GETDEVICELIST: device ids are derived per file, so there is never a
    /// list to hand out.
    pub fn getdevicelist(&self, layout_type: u32) -> GetDeviceListResult {
        let _timer = layout_timer("getdevicelist");
        debug!(layout_type, "Device list requested");
        record_layout_op("getdevicelist", &NfsStatus::Ok.to_string());
        GetDeviceListResult {
            deviceids: Vec::new(),
            cookie: 0,
            eof: true,
        }
    }
}

fn placement_failure(deviceid: &DeviceId, what: &'static str, err: StorageError) -> NfsError {
    error!(%deviceid, what, error = %err, "Device info lookup failed");
    NfsError::protocol(NfsStatus::Serverfault)
}

/// Permission failures on the attribute path are `Access`, not `Perm`.
fn commit_error(err: StorageError) -> NfsError {
    match err.errno {
        PosixError::Perm => NfsError::protocol(NfsStatus::Access),
        _ => NfsError::Storage(err),
    }
}
