//! Configuration for pNFS metadata and data servers.

use crate::error::{FsalError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Largest stripe pattern a Linux pNFS client will accept.
pub const MAX_CLIENT_PATTERN_STRIPES: u32 = 4096;

/// Main configuration for a pNFS node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PnfsConfig {
    /// Role this node plays in the pNFS deployment.
    pub role: NodeRole,
    /// Metadata server configuration.
    pub mds: MdsConfig,
    /// Data server configuration.
    pub ds: DsConfig,
    /// Observability configuration.
    pub observability: ObservabilityConfig,
}

impl PnfsConfig {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FsalError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| FsalError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.role.is_metadata() {
            self.mds.validate()?;
        }
        Ok(())
    }

    /// Create a minimal development configuration.
    pub fn development() -> Self {
        Self {
            role: NodeRole::Combined,
            mds: MdsConfig {
                export_id: 1,
                server_id: 1,
                ..MdsConfig::default()
            },
            ds: DsConfig { server_id: 1 },
            observability: ObservabilityConfig {
                metrics_enabled: false,
                log_level: "debug".to_string(),
                json_logs: false,
            },
        }
    }
}

/// Node role enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    /// Metadata server only (grants layouts).
    Metadata,
    /// Data server only (serves striped I/O).
    Data,
    /// Both roles on one node.
    #[default]
    Combined,
}

impl NodeRole {
    pub fn is_metadata(&self) -> bool {
        matches!(self, NodeRole::Metadata | NodeRole::Combined)
    }

    pub fn is_data(&self) -> bool {
        matches!(self, NodeRole::Data | NodeRole::Combined)
    }
}

/// Metadata server (layout granting) configuration.
///
/// One instance is handed to each export, so exports with different
/// pattern sizes can live in the same process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MdsConfig {
    /// Export identifier carried in the high quad of every device id.
    pub export_id: u64,
    /// Server id stamped into data-server filehandles.
    pub server_id: u16,
    /// Number of stripes in the fixed stripe pattern advertised to clients.
    pub max_pattern_stripes: u32,
    /// Preferred layout block size reported to clients.
    pub layout_blocksize: u32,
    /// Maximum number of segments granted per LAYOUTGET.
    pub maximum_segments: u32,
    /// Buffer size reserved for an encoded layout body.
    pub loc_body_size: usize,
    /// Buffer size reserved for an encoded device address.
    pub da_addr_size: usize,
}

impl Default for MdsConfig {
    fn default() -> Self {
        Self {
            export_id: 1,
            server_id: 1,
            max_pattern_stripes: 1024,
            layout_blocksize: 0x40_0000, // 4MB
            maximum_segments: 1,
            loc_body_size: 0x100,
            da_addr_size: 0x1400,
        }
    }
}

impl MdsConfig {
    /// Validate the metadata server settings.
    pub fn validate(&self) -> Result<()> {
        if self.max_pattern_stripes == 0 {
            return Err(FsalError::InvalidConfig {
                field: "mds.max_pattern_stripes".to_string(),
                reason: "Stripe pattern must contain at least one stripe".to_string(),
            });
        }

        if self.max_pattern_stripes > MAX_CLIENT_PATTERN_STRIPES {
            return Err(FsalError::InvalidConfig {
                field: "mds.max_pattern_stripes".to_string(),
                reason: format!(
                    "Clients accept at most {} stripes, got {}",
                    MAX_CLIENT_PATTERN_STRIPES, self.max_pattern_stripes
                ),
            });
        }

        if self.maximum_segments == 0 {
            return Err(FsalError::InvalidConfig {
                field: "mds.maximum_segments".to_string(),
                reason: "At least one segment must be grantable".to_string(),
            });
        }

        if self.loc_body_size == 0 || self.da_addr_size == 0 {
            return Err(FsalError::InvalidConfig {
                field: "mds.loc_body_size/da_addr_size".to_string(),
                reason: "Encode buffers must be non-empty".to_string(),
            });
        }

        Ok(())
    }
}

/// Data server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DsConfig {
    /// Server id this data server answers to.
    pub server_id: u16,
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Install the Prometheus metrics recorder.
    pub metrics_enabled: bool,
    /// Log level.
    pub log_level: String,
    /// Enable JSON logging.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}
