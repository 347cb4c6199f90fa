//! Node assembly.
//!
//! Wires the configured roles of one process to their storage backends.

use crate::config::PnfsConfig;
use crate::error::{FsalError, Result};
use crate::pnfs::{DataBackend, DataServer, DeviceRegistry, MdsExport, MetadataBackend};
use std::sync::Arc;
use tracing::info;

/// The pNFS services of one node.
pub struct PnfsNode {
    registry: DeviceRegistry,
    export: Option<Arc<MdsExport>>,
    data_server: Option<DataServer>,
}

impl PnfsNode {
    /// Build the services the configured role asks for.
    ///
    /// A metadata role needs `metadata`, a data role needs `data`.
    pub fn new(
        config: &PnfsConfig,
        metadata: Option<Arc<dyn MetadataBackend>>,
        data: Option<Arc<dyn DataBackend>>,
    ) -> Result<Self> {
        config.validate()?;
        let registry = DeviceRegistry::new();

        let export = if config.role.is_metadata() {
            let backend = metadata.ok_or_else(|| {
                FsalError::Config("metadata role configured without a metadata backend".into())
            })?;
            let export = Arc::new(MdsExport::new(config.mds.clone(), backend)?);
            registry.register(export.clone());
            Some(export)
        } else {
            None
        };

        let data_server = if config.role.is_data() {
            let backend = data.ok_or_else(|| {
                FsalError::Config("data role configured without a data backend".into())
            })?;
            Some(DataServer::new(config.ds.clone(), backend))
        } else {
            None
        };

        info!(
            role = ?config.role,
            metadata = export.is_some(),
            data = data_server.is_some(),
            "pNFS node ready"
        );
        Ok(Self {
            registry,
            export,
            data_server,
        })
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn export(&self) -> Option<&Arc<MdsExport>> {
        self.export.as_ref()
    }

    pub fn data_server(&self) -> Option<&DataServer> {
        self.data_server.as_ref()
    }
}
