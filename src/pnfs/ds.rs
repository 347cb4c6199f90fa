//! Data server side of the pNFS layout protocol.
//!
//! A data server is stateless: everything it needs about a file travels in
//! the [`DsWire`] payload of the filehandle the metadata server handed out.
//! Each READ or WRITE touches at most one stripe, and only a stripe this
//! node owns; anything else is `PnfsIoHole` so the client refreshes its
//! device info.
//!
//! ```text
//!   WRITE ──▶ locate ──▶ owner == local? ──no──▶ PnfsIoHole
//!                              │yes
//!                 FILE_SYNC4 ──┼──▶ connect ▶ open ▶ write ▶ fsync ▶ close
//!                 otherwise  ──┴──▶ write_block(snapseq)
//! ```

use crate::config::DsConfig;
use crate::nfs::{NfsError, NfsResult, NfsStatus, StableHow4, Verifier4};
use crate::observability::{ds_timer, record_ds_read, record_ds_write, record_io_hole};
use crate::pnfs::backend::{DataBackend, FileDescriptor, StripePlacement};
use crate::pnfs::handle::{DsHandle, DsWire};
use crate::pnfs::stripe::StripeLocation;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of a data-server READ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DsReadResult {
    pub data: Vec<u8>,
    /// Nothing was available at the requested offset.
    pub eof: bool,
}

/// Result of a data-server WRITE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DsWriteResult {
    pub count: u32,
    pub stability_got: StableHow4,
    pub verifier: Verifier4,
}

/// Data server for one storage node.
pub struct DataServer {
    config: DsConfig,
    backend: Arc<dyn DataBackend>,
}

impl DataServer {
    pub fn new(config: DsConfig, backend: Arc<dyn DataBackend>) -> Self {
        Self { config, backend }
    }

    pub fn server_id(&self) -> u16 {
        self.config.server_id
    }

    /// Unwrap the filehandle bytes of a PUTFH into the wire payload.
    ///
    /// A zero stripe unit is accepted here and rejected by the I/O
    /// operations, which may not return `Badhandle`.
    pub fn create_ds_handle(&self, fh: &[u8]) -> NfsResult<DsWire> {
        let handle = DsHandle::from_bytes(fh).map_err(|e| {
            debug!(error = %e, "Rejected DS filehandle");
            NfsError::protocol(NfsStatus::Badhandle)
        })?;
        if handle.server_id != self.config.server_id {
            debug!(
                server_id = handle.server_id,
                expected = self.config.server_id,
                "DS filehandle for another server"
            );
            return Err(NfsError::protocol(NfsStatus::Badhandle));
        }
        DsWire::from_handle(&handle).map_err(|e| {
            debug!(error = %e, "Rejected DS filehandle payload");
            NfsError::protocol(NfsStatus::Badhandle)
        })
    }

    /// Locate `offset` and make sure this node owns its stripe.
    async fn owned_stripe(&self, wire: &DsWire, offset: u64) -> NfsResult<StripeLocation> {
        let location = StripeLocation::locate(offset, wire.stripe_unit)?;
        let owner = self
            .backend
            .stripe_owner(wire.file_id(), location.stripe, &wire.layout())
            .await?;
        let local = self.backend.local_node();
        if owner != local {
            warn!(
                inode = wire.inode,
                stripe = location.stripe,
                owner,
                local,
                "I/O for a stripe owned by another node"
            );
            record_io_hole();
            return Err(NfsError::protocol(NfsStatus::PnfsIoHole));
        }
        Ok(location)
    }

    /// READ at most one stripe's worth of data starting at `offset`.
    pub async fn read(&self, wire: &DsWire, offset: u64, count: u32) -> NfsResult<DsReadResult> {
        let _timer = ds_timer("read");
        let location = self.owned_stripe(wire, offset).await?;
        let len = location.clamp_length(count);
        // A zero-count READ still fetches one byte so EOF reflects the stored data.
        let fetch = len.max(1);

        let mut data = self
            .backend
            .read_block(
                wire.file_id(),
                &wire.layout(),
                location.stripe,
                location.internal_offset,
                fetch,
            )
            .await?;
        let eof = data.is_empty();
        data.truncate(len as usize);

        debug!(
            inode = wire.inode,
            stripe = location.stripe,
            offset,
            len = data.len(),
            "DS read"
        );
        record_ds_read(data.len() as u64);
        Ok(DsReadResult { data, eof })
    }

    /// WRITE within one stripe.
    ///
    /// `FileSync4` goes through the metadata path so size and mtime stay
    /// current; other levels write the stripe object directly.
    pub async fn write(
        &self,
        wire: &DsWire,
        offset: u64,
        data: &[u8],
        stability: StableHow4,
    ) -> NfsResult<DsWriteResult> {
        let _timer = ds_timer("write");
        let location = self.owned_stripe(wire, offset).await?;
        let len = location.clamp_length(u32::try_from(data.len()).unwrap_or(u32::MAX));
        let data = &data[..len as usize];

        let written = match stability {
            StableHow4::FileSync4 => self.write_through_mds(wire, offset, data).await?,
            StableHow4::DataSync4 | StableHow4::Unstable4 => {
                self.backend
                    .write_block(
                        wire.file_id(),
                        &wire.layout(),
                        location.stripe,
                        location.internal_offset,
                        data,
                        wire.snapseq,
                        stability == StableHow4::DataSync4,
                    )
                    .await?
            }
        };
        let count = written.min(len);

        debug!(
            inode = wire.inode,
            stripe = location.stripe,
            offset,
            count,
            stability = stability.as_str(),
            "DS write"
        );
        record_ds_write(count as u64, stability.as_str());
        Ok(DsWriteResult {
            count,
            stability_got: stability,
            verifier: Verifier4::ZERO,
        })
    }

    async fn write_through_mds(&self, wire: &DsWire, offset: u64, data: &[u8]) -> NfsResult<u32> {
        let file = wire.file_id();
        self.backend
            .connect(file, wire.parent_inode, wire.parent_hash)
            .await?;
        let fd = self.backend.open_write(file).await?;

        let result = self.write_and_sync(fd, offset, data).await;
        let closed = self.backend.close(fd).await;
        let written = result?;
        closed?;
        Ok(written)
    }

    async fn write_and_sync(&self, fd: FileDescriptor, offset: u64, data: &[u8]) -> NfsResult<u32> {
        let written = self.backend.write(fd, offset, data).await?;
        self.backend.fsync(fd).await?;
        Ok(written)
    }

    /// COMMIT a range of unstable writes. A zero `count` runs to the end of
    /// the file. The verifier is always zero.
    pub async fn commit(&self, wire: &DsWire, offset: u64, count: u64) -> NfsResult<Verifier4> {
        let _timer = ds_timer("commit");
        if wire.stripe_unit == 0 {
            return Err(NfsError::protocol(NfsStatus::Inval));
        }
        let count = if count == 0 { u64::MAX } else { count };
        self.backend
            .commit_blocks(wire.file_id(), offset, count)
            .await?;
        debug!(inode = wire.inode, offset, count, "DS commit");
        Ok(Verifier4::ZERO)
    }
}
