//! NFS error types and status codes.
//!
//! Implements the NFSv4.1 status codes (RFC 5661) returned by layout and
//! data-server operations, and the fixed translation from POSIX errno values
//! reported by storage backends.

use crate::nfs::xdr::XdrError;
use crate::pnfs::backend::StorageError;
use std::fmt;
use thiserror::Error;

/// NFS status codes as defined in RFC 5661.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum NfsStatus {
    /// No error - operation succeeded
    Ok = 0,
    /// Not owner
    Perm = 1,
    /// No such file or directory
    Noent = 2,
    /// I/O error
    Io = 5,
    /// No such device or address
    Nxio = 6,
    /// Permission denied
    Access = 13,
    /// Invalid argument
    Inval = 22,
    /// File too large
    Fbig = 27,
    /// No space left on device
    Nospc = 28,
    /// Read-only file system
    Rofs = 30,
    /// Disk quota exceeded
    Dquot = 69,
    /// Stale file handle
    Stale = 70,
    /// Illegal filehandle
    Badhandle = 10001,
    /// Operation not supported
    Notsupp = 10004,
    /// Response buffer too small
    Toosmall = 10005,
    /// Server fault
    Serverfault = 10006,
    /// Request delay/retry (same as JUKEBOX)
    Delay = 10008,
    /// Resource exhausted
    Resource = 10018,
    /// Bad state id
    BadStateid = 10025,
    /// Bad XDR
    BadXdr = 10036,
    /// Invalid layout iomode
    BadIomode = 10049,
    /// Invalid layout
    BadLayout = 10050,
    /// Layout try later
    LayoutTryLater = 10058,
    /// Layout unavailable
    LayoutUnavailable = 10059,
    /// No matching layout
    NoMatchingLayout = 10060,
    /// Recall conflict
    RecallConflict = 10061,
    /// Unknown layout type
    UnknownLayoutType = 10062,
    /// pNFS I/O hole
    PnfsIoHole = 10075,
}

impl NfsStatus {
    /// Convert status to u32 value.
    pub fn to_u32(self) -> u32 {
        self as u32
    }

    /// Create status from u32 value.
    pub fn from_u32(val: u32) -> Option<Self> {
        match val {
            0 => Some(Self::Ok),
            1 => Some(Self::Perm),
            2 => Some(Self::Noent),
            5 => Some(Self::Io),
            6 => Some(Self::Nxio),
            13 => Some(Self::Access),
            22 => Some(Self::Inval),
            27 => Some(Self::Fbig),
            28 => Some(Self::Nospc),
            30 => Some(Self::Rofs),
            69 => Some(Self::Dquot),
            70 => Some(Self::Stale),
            10001 => Some(Self::Badhandle),
            10004 => Some(Self::Notsupp),
            10005 => Some(Self::Toosmall),
            10006 => Some(Self::Serverfault),
            10008 => Some(Self::Delay),
            10018 => Some(Self::Resource),
            10025 => Some(Self::BadStateid),
            10036 => Some(Self::BadXdr),
            10049 => Some(Self::BadIomode),
            10050 => Some(Self::BadLayout),
            10058 => Some(Self::LayoutTryLater),
            10059 => Some(Self::LayoutUnavailable),
            10060 => Some(Self::NoMatchingLayout),
            10061 => Some(Self::RecallConflict),
            10062 => Some(Self::UnknownLayoutType),
            10075 => Some(Self::PnfsIoHole),
            _ => None,
        }
    }

    /// Check if this is a success status.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Delay | Self::LayoutTryLater | Self::Resource
        )
    }
}

impl fmt::Display for NfsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// POSIX error kinds reported by storage backends.
///
/// Every errno the NFS layer distinguishes has its own variant; anything
/// else is carried as `Other` and maps to `Serverfault`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PosixError {
    Perm,
    Noent,
    Io,
    Nfile,
    Mfile,
    Pipe,
    Nodev,
    Nxio,
    Acces,
    Nospc,
    Dquot,
    Stale,
    Notsup,
    Other(i32),
}

impl PosixError {
    /// Classify a raw errno value.
    pub fn from_errno(errno: i32) -> Self {
        match errno {
            libc::EPERM => Self::Perm,
            libc::ENOENT => Self::Noent,
            libc::EIO => Self::Io,
            libc::ENFILE => Self::Nfile,
            libc::EMFILE => Self::Mfile,
            libc::EPIPE => Self::Pipe,
            libc::ENODEV => Self::Nodev,
            libc::ENXIO => Self::Nxio,
            libc::EACCES => Self::Acces,
            libc::ENOSPC => Self::Nospc,
            libc::EDQUOT => Self::Dquot,
            libc::ESTALE => Self::Stale,
            libc::ENOTSUP => Self::Notsup,
            other => Self::Other(other),
        }
    }

    /// Raw errno value for this error.
    pub fn errno(&self) -> i32 {
        match self {
            Self::Perm => libc::EPERM,
            Self::Noent => libc::ENOENT,
            Self::Io => libc::EIO,
            Self::Nfile => libc::ENFILE,
            Self::Mfile => libc::EMFILE,
            Self::Pipe => libc::EPIPE,
            Self::Nodev => libc::ENODEV,
            Self::Nxio => libc::ENXIO,
            Self::Acces => libc::EACCES,
            Self::Nospc => libc::ENOSPC,
            Self::Dquot => libc::EDQUOT,
            Self::Stale => libc::ESTALE,
            Self::Notsup => libc::ENOTSUP,
            Self::Other(errno) => *errno,
        }
    }

    /// Translate to the NFSv4 status returned to the client.
    pub fn to_nfs_status(&self) -> NfsStatus {
        match self {
            Self::Perm => NfsStatus::Perm,
            Self::Noent => NfsStatus::Noent,
            Self::Io | Self::Nfile | Self::Mfile | Self::Pipe => NfsStatus::Io,
            Self::Nodev | Self::Nxio => NfsStatus::Nxio,
            Self::Acces => NfsStatus::Access,
            Self::Nospc => NfsStatus::Nospc,
            Self::Dquot => NfsStatus::Dquot,
            Self::Stale => NfsStatus::Stale,
            Self::Notsup => NfsStatus::Notsupp,
            Self::Other(_) => NfsStatus::Serverfault,
        }
    }
}

impl fmt::Display for PosixError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(errno) => write!(f, "errno {}", errno),
            kind => write!(f, "{:?} (errno {})", kind, kind.errno()),
        }
    }
}

/// NFS error type for layout and data-server operations.
#[derive(Error, Debug)]
pub enum NfsError {
    /// Protocol-level error with NFS status.
    #[error("NFS error: {status}")]
    Protocol { status: NfsStatus },

    /// Failure writing a reply structure.
    #[error("XDR encode error: {0}")]
    Encode(XdrError),

    /// Failure reading a request structure.
    #[error("XDR decode error: {0}")]
    Decode(XdrError),

    /// Error reported by a storage backend.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl NfsError {
    /// Create a protocol error with the given status.
    pub fn protocol(status: NfsStatus) -> Self {
        Self::Protocol { status }
    }

    /// Convert to NFS status code.
    pub fn to_status(&self) -> NfsStatus {
        match self {
            Self::Protocol { status } => *status,
            Self::Encode(_) => NfsStatus::Serverfault,
            Self::Decode(_) => NfsStatus::BadXdr,
            Self::Storage(err) => err.errno.to_nfs_status(),
            Self::Internal(_) => NfsStatus::Serverfault,
        }
    }
}

/// Result type alias for NFS operations.
pub type NfsResult<T> = std::result::Result<T, NfsError>;
