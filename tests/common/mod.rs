//! Common test utilities for integration tests.

pub mod cluster_sim;
pub mod fixtures;

use pnfs_fsal::config::MdsConfig;
use pnfs_fsal::nfs::{Layouttype4, XdrDecoder};
use pnfs_fsal::pnfs::codec::{decode_file_device_addr, decode_file_layout, FileDeviceAddr, FileLayout};
use pnfs_fsal::pnfs::{DataServer, DeviceRegistry, MdsExport};
use std::sync::Arc;

// Re-export common types
pub use cluster_sim::*;
pub use fixtures::*;

/// Test error type
pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Result<T> = std::result::Result<T, Error>;

/// Wire value of the file layout type.
pub const FILES: u32 = Layouttype4::NfsV41Files as u32;

pub const EXPORT_ID: u64 = 0x51;
pub const SERVER_ID: u16 = 3;

/// A metadata export and one data server per node over one simulated
/// cluster.
pub struct TestCluster {
    pub sim: Arc<SimCluster>,
    pub export: Arc<MdsExport>,
    pub registry: DeviceRegistry,
    pub data_servers: Vec<DataServer>,
}

impl TestCluster {
    pub fn new(nodes: u32, pattern_stripes: u32) -> Self {
        let sim = SimCluster::new(nodes);
        let config = MdsConfig {
            export_id: EXPORT_ID,
            server_id: SERVER_ID,
            max_pattern_stripes: pattern_stripes,
            ..MdsConfig::default()
        };
        let export =
            Arc::new(MdsExport::new(config, sim.clone()).expect("valid export config"));
        let registry = DeviceRegistry::new();
        registry.register(export.clone());

        let data_servers = (0..nodes)
            .map(|node| {
                DataServer::new(
                    pnfs_fsal::config::DsConfig {
                        server_id: SERVER_ID,
                    },
                    sim.node(node),
                )
            })
            .collect();

        Self {
            sim,
            export,
            registry,
            data_servers,
        }
    }

    /// The data server a client would pick for `stripe` from the device table.
    pub fn server_for(&self, addr: &FileDeviceAddr, stripe: u64) -> &DataServer {
        let index = addr.stripe_indices[(stripe % addr.stripe_indices.len() as u64) as usize];
        &self.data_servers[index as usize]
    }
}

pub fn decode_layout(bytes: &[u8]) -> FileLayout {
    let mut dec = XdrDecoder::new(bytes);
    let layout = decode_file_layout(&mut dec).expect("layout body decodes");
    assert_eq!(dec.remaining(), 0, "trailing bytes after layout body");
    layout
}

pub fn decode_device_addr(bytes: &[u8]) -> FileDeviceAddr {
    let mut dec = XdrDecoder::new(bytes);
    let addr = decode_file_device_addr(&mut dec).expect("device address decodes");
    assert_eq!(dec.remaining(), 0, "trailing bytes after device address");
    addr
}
