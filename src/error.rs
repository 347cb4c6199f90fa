//! Error types for the pNFS layout layer.
//!
//! This module provides the crate-level error type [`FsalError`] used for
//! configuration and setup failures, along with a convenient [`Result`] alias.
//!
//! Per-operation failures on the NFS path do not use this type: they are
//! reported as [`NfsError`](crate::nfs::NfsError) values carrying an NFSv4
//! status code, because every layout and data-server operation must answer
//! the client with a status from the NFSv4.1 error domain.
//!
//! # Example
//!
//! ```rust
//! use pnfs_fsal::error::{FsalError, Result};
//!
//! fn check_stripes(stripes: u32) -> Result<()> {
//!     if stripes == 0 {
//!         return Err(FsalError::InvalidConfig {
//!             field: "mds.max_pattern_stripes".into(),
//!             reason: "must be non-zero".into(),
//!         });
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_stripes(0).is_err());
//! ```

use std::io;
use thiserror::Error;

/// Main error type for setup and configuration.
#[derive(Error, Debug)]
pub enum FsalError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for FsalError {
    fn from(e: serde_json::Error) -> Self {
        FsalError::Serialization(e.to_string())
    }
}

/// Result type alias for setup operations.
pub type Result<T> = std::result::Result<T, FsalError>;
