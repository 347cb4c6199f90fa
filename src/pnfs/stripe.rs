//! Stripe placement.
//!
//! A file is cut into `stripe_unit`-sized stripes, and each stripe lives on
//! exactly one storage node. The metadata server uses this mapping to
//! advertise a device's stripe table, and every data server recomputes it
//! to decide whether it owns an incoming I/O. Both sides must agree, so
//! they share the math here and the backend's [`StripePlacement`].

use crate::nfs::{NfsError, NfsResult, NfsStatus, PosixError};
use crate::pnfs::backend::{
    FileId, FileLayoutParams, NodeId, StorageError, StorageResult, StripePlacement,
};
use async_trait::async_trait;

/// Stripe unit lives in the high bits; the low six bits are flags.
pub const NFL4_UFLG_MASK: u32 = 0x0000_003F;
/// Stripe indices count from the start of the file.
pub const NFL4_UFLG_DENSE: u32 = 0x0000_0001;
/// COMMIT must be sent to the metadata server.
pub const NFL4_UFLG_COMMIT_THRU_MDS: u32 = 0x0000_0002;
pub const NFL4_UFLG_STRIPE_UNIT_SIZE_MASK: u32 = 0xFFFF_FFC0;

/// The `nfl_util` word of a file layout: stripe width plus flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripeUtil {
    pub stripe_unit: u32,
    pub dense: bool,
    pub commit_through_mds: bool,
}

impl StripeUtil {
    /// Sparse packing with COMMIT sent to the data servers.
    pub fn sparse(stripe_unit: u32) -> Self {
        Self {
            stripe_unit,
            dense: false,
            commit_through_mds: false,
        }
    }

    /// True if the width leaves the flag bits clear.
    pub fn is_encodable(&self) -> bool {
        self.stripe_unit & !NFL4_UFLG_STRIPE_UNIT_SIZE_MASK == 0
    }

    /// Pack into the wire word, failing if the width collides with the flags.
    pub fn to_wire(&self) -> NfsResult<u32> {
        if !self.is_encodable() {
            return Err(NfsError::protocol(NfsStatus::Serverfault));
        }
        let mut util = self.stripe_unit;
        if self.dense {
            util |= NFL4_UFLG_DENSE;
        }
        if self.commit_through_mds {
            util |= NFL4_UFLG_COMMIT_THRU_MDS;
        }
        Ok(util)
    }

    pub fn from_wire(util: u32) -> Self {
        Self {
            stripe_unit: util & NFL4_UFLG_STRIPE_UNIT_SIZE_MASK,
            dense: util & NFL4_UFLG_DENSE != 0,
            commit_through_mds: util & NFL4_UFLG_COMMIT_THRU_MDS != 0,
        }
    }
}

/// Where a file offset falls within the stripe pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripeLocation {
    pub stripe: u64,
    /// File offset of the first byte of the stripe.
    pub block_start: u64,
    /// Offset of the request within the stripe.
    pub internal_offset: u64,
    pub stripe_unit: u32,
}

impl StripeLocation {
    /// Locate `offset`. A zero stripe unit is `Inval`.
    pub fn locate(offset: u64, stripe_unit: u32) -> NfsResult<Self> {
        if stripe_unit == 0 {
            return Err(NfsError::protocol(NfsStatus::Inval));
        }
        let unit = stripe_unit as u64;
        let stripe = offset / unit;
        let block_start = stripe * unit;
        Ok(Self {
            stripe,
            block_start,
            internal_offset: offset - block_start,
            stripe_unit,
        })
    }

    /// Bytes left in this stripe from the request offset.
    pub fn remaining_in_stripe(&self) -> u64 {
        self.stripe_unit as u64 - self.internal_offset
    }

    /// Clamp a request so it does not cross into the next stripe.
    pub fn clamp_length(&self, requested: u32) -> u32 {
        self.remaining_in_stripe().min(requested as u64) as u32
    }
}

/// Owner of every stripe in a pattern of `stripes` entries, in order.
pub async fn stripe_table(
    placement: &(impl StripePlacement + ?Sized),
    file: FileId,
    layout: &FileLayoutParams,
    stripes: u32,
) -> StorageResult<Vec<NodeId>> {
    let mut owners = Vec::with_capacity(stripes as usize);
    for stripe in 0..stripes {
        owners.push(placement.stripe_owner(file, stripe as u64, layout).await?);
    }
    Ok(owners)
}

/// Rendezvous-hash placement of `(inode, stripe)` over a fixed node set.
///
/// Each candidate node gets a score derived from `crc32(inode, stripe)` and
/// its id; the highest score wins, so removing a node only moves the
/// stripes it owned.
#[derive(Debug, Clone)]
pub struct HashPlacement {
    nodes: Vec<NodeId>,
}

impl HashPlacement {
    pub fn new(nodes: Vec<NodeId>) -> Self {
        Self { nodes }
    }

    /// Nodes `0..count`.
    pub fn with_node_count(count: u32) -> Self {
        Self::new((0..count).collect())
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn owner(&self, inode: u64, stripe: u64) -> Option<NodeId> {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&inode.to_be_bytes());
        hasher.update(&stripe.to_be_bytes());
        let key = hasher.finalize() as u64;

        let mut best: Option<(u64, NodeId)> = None;
        for &node in &self.nodes {
            let score = mix64(key ^ (node as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
            match best {
                Some((top, _)) if top >= score => {}
                _ => best = Some((score, node)),
            }
        }
        best.map(|(_, node)| node)
    }
}

/// 64-bit finalizer (splitmix64). CRC is linear, so scores need remixing.
fn mix64(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

#[async_trait]
impl StripePlacement for HashPlacement {
    async fn stripe_owner(
        &self,
        file: FileId,
        stripe: u64,
        _layout: &FileLayoutParams,
    ) -> StorageResult<NodeId> {
        self.owner(file.inode, stripe)
            .ok_or_else(|| StorageError::new(PosixError::Nxio, "no storage nodes"))
    }
}
