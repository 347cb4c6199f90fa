//! pNFS wire codec.
//!
//! Encodes layout bodies and device addresses into the exact XDR layout
//! NFSv4.1 clients expect:
//!
//! ```text
//! nfsv4_1_file_layout4            nfsv4_1_file_layout_ds_addr4
//! ┌─────────────────────────┐     ┌──────────────────────────────┐
//! │ deviceid4   (16 bytes)  │     │ stripe_indices<u32>          │
//! │ nfl_util    (u32)       │     │ multipath_ds_list<>          │
//! │ first_stripe_index (u32)│     │   └ multipath_list4          │
//! │ pattern_offset (u64)    │     │       └ netaddr4<>           │
//! │ fh_list<nfs_fh4>        │     │           (netid, uaddr)     │
//! └─────────────────────────┘     └──────────────────────────────┘
//! ```
//!
//! plus the flexible file layout (`ff_layout4`, `ff_device_addr4`) from
//! RFC 8435. Every encoder writes into a bounded [`XdrEncoder`] and stops at
//! the first failure; callers rewind the encoder so nothing partial is
//! returned.

use crate::nfs::{NfsFh4, Stateid4, XdrDecoder, XdrEncoder, XdrError, XdrResult, NFS4_FHSIZE};
use crate::pnfs::deviceid::DeviceId;
use crate::pnfs::handle::DsHandle;
use crate::pnfs::stripe::StripeUtil;
use std::net::{Ipv4Addr, SocketAddrV4};

/// IP protocol numbers with a defined netid.
pub const IPPROTO_TCP: u16 = 6;
pub const IPPROTO_UDP: u16 = 17;
pub const IPPROTO_SCTP: u16 = 132;

/// One network endpoint of a storage node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MultipathMember {
    /// IP protocol number.
    pub protocol: u16,
    /// IPv4 address in host order.
    pub address: u32,
    pub port: u16,
}

impl MultipathMember {
    pub fn tcp(addr: SocketAddrV4) -> Self {
        Self {
            protocol: IPPROTO_TCP,
            address: u32::from(*addr.ip()),
            port: addr.port(),
        }
    }

    pub fn socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::from(self.address), self.port)
    }

    /// Universal address: `a.b.c.d.hi.lo`.
    pub fn uaddr(&self) -> String {
        let [a, b, c, d] = self.address.to_be_bytes();
        format!(
            "{}.{}.{}.{}.{}.{}",
            a,
            b,
            c,
            d,
            self.port >> 8,
            self.port & 0xFF
        )
    }
}

/// Netid string for an IP protocol number.
pub fn netid(protocol: u16) -> Option<&'static str> {
    match protocol {
        IPPROTO_TCP => Some("tcp"),
        IPPROTO_UDP => Some("udp"),
        IPPROTO_SCTP => Some("sctp"),
        _ => None,
    }
}

fn protocol_from_netid(netid: &str) -> Option<u16> {
    match netid {
        "tcp" => Some(IPPROTO_TCP),
        "udp" => Some(IPPROTO_UDP),
        "sctp" => Some(IPPROTO_SCTP),
        _ => None,
    }
}

/// Encode one `netaddr4`. An unknown protocol is an encode failure.
pub fn encode_ipv4_netaddr(enc: &mut XdrEncoder, member: &MultipathMember) -> XdrResult<()> {
    let netid = netid(member.protocol).ok_or_else(|| {
        XdrError::InvalidData(format!("no netid for protocol {}", member.protocol))
    })?;
    enc.encode_string(netid)?;
    enc.encode_string(&member.uaddr())
}

/// Encode a `multipath_list4`. An empty list is a zero count.
pub fn encode_multipath_list(enc: &mut XdrEncoder, members: &[MultipathMember]) -> XdrResult<()> {
    enc.encode_len(members.len())?;
    for member in members {
        encode_ipv4_netaddr(enc, member)?;
    }
    Ok(())
}

/// Decode one IPv4 `netaddr4`.
pub fn decode_netaddr(dec: &mut XdrDecoder<'_>) -> XdrResult<MultipathMember> {
    let netid = dec.decode_string()?;
    let protocol = protocol_from_netid(&netid)
        .ok_or_else(|| XdrError::InvalidData(format!("unknown netid {:?}", netid)))?;
    let uaddr = dec.decode_string()?;

    let invalid = || XdrError::InvalidData(format!("bad universal address {:?}", uaddr));
    let parts = uaddr
        .split('.')
        .map(|p| p.parse::<u8>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| invalid())?;
    let [a, b, c, d, hi, lo]: [u8; 6] = parts.try_into().map_err(|_| invalid())?;

    Ok(MultipathMember {
        protocol,
        address: u32::from_be_bytes([a, b, c, d]),
        port: u16::from_be_bytes([hi, lo]),
    })
}

pub fn decode_multipath_list(dec: &mut XdrDecoder<'_>) -> XdrResult<Vec<MultipathMember>> {
    let count = dec.decode_len()?;
    let mut members = Vec::with_capacity(count);
    for _ in 0..count {
        members.push(decode_netaddr(dec)?);
    }
    Ok(members)
}

/// A file layout (`nfsv4_1_file_layout4`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLayout {
    pub deviceid: DeviceId,
    pub util: StripeUtil,
    pub first_stripe_index: u32,
    pub pattern_offset: u64,
    pub handles: Vec<DsHandle>,
}

pub fn encode_file_layout(enc: &mut XdrEncoder, layout: &FileLayout) -> XdrResult<()> {
    let util = layout.util.to_wire().map_err(|_| {
        XdrError::InvalidData(format!(
            "stripe unit {:#x} collides with util flags",
            layout.util.stripe_unit
        ))
    })?;

    layout.deviceid.encode_xdr(enc)?;
    enc.encode_u32(util)?;
    enc.encode_u32(layout.first_stripe_index)?;
    enc.encode_u64(layout.pattern_offset)?;
    enc.encode_len(layout.handles.len())?;
    for handle in &layout.handles {
        enc.encode_opaque_bounded(&handle.to_bytes(), NFS4_FHSIZE)?;
    }
    Ok(())
}

/// Decode a file layout. Handles that are not data-server envelopes are
/// rejected.
pub fn decode_file_layout(dec: &mut XdrDecoder<'_>) -> XdrResult<FileLayout> {
    let deviceid = DeviceId::decode_xdr(dec)?;
    let util = StripeUtil::from_wire(dec.decode_u32()?);
    let first_stripe_index = dec.decode_u32()?;
    let pattern_offset = dec.decode_u64()?;
    let count = dec.decode_len()?;
    let mut handles = Vec::with_capacity(count);
    for _ in 0..count {
        let bytes = dec.decode_opaque()?;
        if bytes.len() > NFS4_FHSIZE {
            return Err(XdrError::TooLong {
                len: bytes.len(),
                max: NFS4_FHSIZE,
            });
        }
        let handle =
            DsHandle::from_bytes(bytes).map_err(|e| XdrError::InvalidData(e.to_string()))?;
        handles.push(handle);
    }
    Ok(FileLayout {
        deviceid,
        util,
        first_stripe_index,
        pattern_offset,
        handles,
    })
}

/// Device address of a file layout device (`nfsv4_1_file_layout_ds_addr4`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDeviceAddr {
    /// Index into `multipath_lists` for each stripe.
    pub stripe_indices: Vec<u32>,
    pub multipath_lists: Vec<Vec<MultipathMember>>,
}

pub fn encode_file_device_addr(enc: &mut XdrEncoder, addr: &FileDeviceAddr) -> XdrResult<()> {
    enc.encode_u32_array(&addr.stripe_indices)?;
    enc.encode_len(addr.multipath_lists.len())?;
    for list in &addr.multipath_lists {
        encode_multipath_list(enc, list)?;
    }
    Ok(())
}

pub fn decode_file_device_addr(dec: &mut XdrDecoder<'_>) -> XdrResult<FileDeviceAddr> {
    let stripe_indices = dec.decode_u32_array()?;
    let count = dec.decode_len()?;
    let mut multipath_lists = Vec::with_capacity(count);
    for _ in 0..count {
        multipath_lists.push(decode_multipath_list(dec)?);
    }
    Ok(FileDeviceAddr {
        stripe_indices,
        multipath_lists,
    })
}

/// Flex file layout flags (`ffl_flags4`).
pub const FF_FLAGS_NO_LAYOUTCOMMIT: u32 = 0x1;
pub const FF_FLAGS_NO_IO_THRU_MDS: u32 = 0x2;
pub const FF_FLAGS_NO_READ_IO: u32 = 0x4;
pub const FF_FLAGS_WRITE_ONE_MIRROR: u32 = 0x8;

/// One data server of a flex file mirror (`ff_data_server4`).
///
/// Data servers are loosely coupled: the client presents the anonymous
/// stateid and the synthetic owner/group, and the data server checks
/// permissions against those.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfDataServer {
    pub deviceid: DeviceId,
    pub efficiency: u32,
    pub stateid: Stateid4,
    pub fh_versions: Vec<NfsFh4>,
    pub user: String,
    pub group: String,
}

/// A flex file mirror (`ff_mirror4`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfMirror {
    pub data_servers: Vec<FfDataServer>,
}

impl FfMirror {
    /// Mirror serving `layout` with a synthetic uid/gid.
    pub fn from_file_layout(layout: &FileLayout, uid: u32, gid: u32, efficiency: u32) -> Self {
        Self {
            data_servers: vec![FfDataServer {
                deviceid: layout.deviceid,
                efficiency,
                stateid: Stateid4::anonymous(),
                fh_versions: layout.handles.iter().map(DsHandle::to_fh).collect(),
                user: uid.to_string(),
                group: gid.to_string(),
            }],
        }
    }
}

/// Flex file layout body (`ff_layout4`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlexFileLayout {
    pub stripe_unit: u64,
    pub mirrors: Vec<FfMirror>,
    pub flags: u32,
    pub stats_collect_hint: u32,
}

fn encode_ff_data_server(enc: &mut XdrEncoder, ds: &FfDataServer) -> XdrResult<()> {
    ds.deviceid.encode_xdr(enc)?;
    enc.encode_u32(ds.efficiency)?;
    ds.stateid.encode(enc)?;
    enc.encode_len(ds.fh_versions.len())?;
    for fh in &ds.fh_versions {
        fh.encode(enc)?;
    }
    enc.encode_string(&ds.user)?;
    enc.encode_string(&ds.group)
}

/// Encode `ff_layout4`.
///
/// Codec-level only: exports grant `LAYOUT4_NFSV4_1_FILES`, so no MDS
/// operation emits this body.
pub fn encode_flex_file_layout(enc: &mut XdrEncoder, layout: &FlexFileLayout) -> XdrResult<()> {
    enc.encode_u64(layout.stripe_unit)?;
    enc.encode_len(layout.mirrors.len())?;
    for mirror in &layout.mirrors {
        enc.encode_len(mirror.data_servers.len())?;
        for ds in &mirror.data_servers {
            encode_ff_data_server(enc, ds)?;
        }
    }
    enc.encode_u32(layout.flags)?;
    enc.encode_u32(layout.stats_collect_hint)
}

/// NFS protocol version a flex file data server speaks (`ff_device_versions4`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FfDeviceVersion {
    pub version: u32,
    pub minorversion: u32,
    pub rsize: u32,
    pub wsize: u32,
    pub tightly_coupled: bool,
}

/// Flex file device address (`ff_device_addr4`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlexDeviceAddr {
    pub netaddrs: Vec<MultipathMember>,
    pub versions: Vec<FfDeviceVersion>,
}

/// Encode `ff_device_addr4`. Codec-level only, like [`encode_flex_file_layout`].
pub fn encode_flex_device_addr(enc: &mut XdrEncoder, addr: &FlexDeviceAddr) -> XdrResult<()> {
    encode_multipath_list(enc, &addr.netaddrs)?;
    enc.encode_len(addr.versions.len())?;
    for v in &addr.versions {
        enc.encode_u32(v.version)?;
        enc.encode_u32(v.minorversion)?;
        enc.encode_u32(v.rsize)?;
        enc.encode_u32(v.wsize)?;
        enc.encode_bool(v.tightly_coupled)?;
    }
    Ok(())
}
