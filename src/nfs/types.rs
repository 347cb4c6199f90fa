//! NFS v4.1 type definitions used by the pNFS layer.
//!
//! These types follow the XDR definitions from RFC 5661 (NFSv4.1) and
//! RFC 8435 (flexible file layout).

use super::xdr::{XdrDecoder, XdrEncoder, XdrResult};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Maximum file handle size (NFS4_FHSIZE).
pub const NFS4_FHSIZE: usize = 128;

/// Size of a device id on the wire (NFS4_DEVICEID4_SIZE).
pub const NFS4_DEVICEID4_SIZE: usize = 16;

/// Size of a write verifier (NFS4_VERIFIER_SIZE).
pub const NFS4_VERIFIER_SIZE: usize = 8;

/// NFS time value (seconds + nanoseconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct NfsTime4 {
    /// Seconds since epoch.
    pub seconds: i64,
    /// Nanoseconds.
    pub nseconds: u32,
}

impl NfsTime4 {
    /// Create a new NFS time.
    pub fn new(seconds: i64, nseconds: u32) -> Self {
        Self { seconds, nseconds }
    }

    /// Create from SystemTime.
    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(SystemTime::UNIX_EPOCH) {
            Ok(duration) => Self {
                seconds: duration.as_secs() as i64,
                nseconds: duration.subsec_nanos(),
            },
            Err(_) => Self::default(),
        }
    }

    /// Get current time.
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    pub fn encode(&self, enc: &mut XdrEncoder) -> XdrResult<()> {
        enc.encode_i64(self.seconds)?;
        enc.encode_u32(self.nseconds)
    }

    pub fn decode(dec: &mut XdrDecoder<'_>) -> XdrResult<Self> {
        Ok(Self {
            seconds: dec.decode_i64()?,
            nseconds: dec.decode_u32()?,
        })
    }
}

/// NFS file handle opaque data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NfsFh4(pub Vec<u8>);

impl NfsFh4 {
    /// Create a new file handle.
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    /// Get the file handle data.
    pub fn data(&self) -> &[u8] {
        &self.0
    }

    /// Check if the file handle is valid.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && self.0.len() <= NFS4_FHSIZE
    }

    /// Encode as `nfs_fh4` (`opaque<NFS4_FHSIZE>`).
    pub fn encode(&self, enc: &mut XdrEncoder) -> XdrResult<()> {
        enc.encode_opaque_bounded(&self.0, NFS4_FHSIZE)
    }
}

/// Write verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Verifier4(pub [u8; NFS4_VERIFIER_SIZE]);

impl Verifier4 {
    /// The all-zero verifier reported by data servers.
    pub const ZERO: Self = Self([0; NFS4_VERIFIER_SIZE]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0; NFS4_VERIFIER_SIZE]
    }
}

/// State ID for opens, locks and layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Stateid4 {
    /// Sequence ID.
    pub seqid: u32,
    /// Other (opaque identifier).
    pub other: [u8; 12],
}

impl Stateid4 {
    /// Special state ID representing anonymous access.
    pub fn anonymous() -> Self {
        Self {
            seqid: 0,
            other: [0; 12],
        }
    }

    pub fn encode(&self, enc: &mut XdrEncoder) -> XdrResult<()> {
        enc.encode_u32(self.seqid)?;
        enc.encode_opaque_fixed(&self.other)
    }
}

/// Layout type for pNFS, as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum Layouttype4 {
    NfsV41Files = 1,
    Osd2Objects = 2,
    BlockVolume = 3,
    FlexFiles = 4,
}

impl Layouttype4 {
    pub fn from_u32(val: u32) -> Option<Self> {
        match val {
            1 => Some(Self::NfsV41Files),
            2 => Some(Self::Osd2Objects),
            3 => Some(Self::BlockVolume),
            4 => Some(Self::FlexFiles),
            _ => None,
        }
    }
}

/// Layout types this server can grant.
///
/// Operations match on this instead of comparing raw wire values, so adding
/// a layout type is a new variant here plus its arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayoutType {
    /// LAYOUT4_NFSV4_1_FILES
    Files,
}

impl LayoutType {
    /// Layout types supported by every export.
    pub const SUPPORTED: &'static [LayoutType] = &[LayoutType::Files];

    /// Resolve a wire layout type, `None` when it is not supported.
    pub fn from_wire(val: u32) -> Option<Self> {
        match Layouttype4::from_u32(val)? {
            Layouttype4::NfsV41Files => Some(Self::Files),
            Layouttype4::Osd2Objects | Layouttype4::BlockVolume | Layouttype4::FlexFiles => None,
        }
    }

    pub fn to_wire(self) -> Layouttype4 {
        match self {
            Self::Files => Layouttype4::NfsV41Files,
        }
    }
}

/// Layout I/O mode.
///
/// The discriminants are bit flags: `Any` is the union of `Read` and `Rw`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum Layoutiomode4 {
    Read = 1,
    Rw = 2,
    Any = 3,
}

impl Layoutiomode4 {
    pub fn bits(self) -> u32 {
        self as u32
    }

    /// True if the two modes share at least one bit.
    pub fn intersects(self, other: Self) -> bool {
        self.bits() & other.bits() != 0
    }

    pub fn from_u32(val: u32) -> Option<Self> {
        match val {
            1 => Some(Self::Read),
            2 => Some(Self::Rw),
            3 => Some(Self::Any),
            _ => None,
        }
    }
}

/// Write stability levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum StableHow4 {
    Unstable4 = 0,
    DataSync4 = 1,
    FileSync4 = 2,
}

impl StableHow4 {
    pub fn from_u32(val: u32) -> Option<Self> {
        match val {
            0 => Some(Self::Unstable4),
            1 => Some(Self::DataSync4),
            2 => Some(Self::FileSync4),
            _ => None,
        }
    }

    /// Label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unstable4 => "unstable",
            Self::DataSync4 => "data_sync",
            Self::FileSync4 => "file_sync",
        }
    }
}
