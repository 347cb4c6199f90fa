//! Server-side layout state.
//!
//! The metadata server records every granted layout segment per
//! `(file, client)` pair:
//!
//! ```text
//!   NoLayout ──LAYOUTGET──▶ Granted ──LAYOUTRETURN (all)──▶ NoLayout
//!                             │  ▲
//!                             └──┘ LAYOUTRETURN (part): narrow segments
//!   Granted ──CLOSE──▶ return_on_close segments dropped
//! ```
//!
//! Returning a range disposes of every segment it contains and narrows the
//! ones it merely overlaps. Segments are never split, so returning the
//! middle of a granted segment leaves the segment as it was.

use crate::nfs::{Layoutiomode4, Stateid4};
use crate::pnfs::backend::FileId;
use crate::pnfs::deviceid::DeviceId;
use crate::pnfs::segment::{contains, difference, overlaps, Segment};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Client identifier (unique per client instance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub u64);

impl ClientId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

/// One granted layout segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantedLayout {
    pub segment: Segment,
    pub deviceid: DeviceId,
    /// Drop the segment when the client closes the file.
    pub return_on_close: bool,
    /// No segments follow this one.
    pub last_segment: bool,
}

/// Layout state of one client on one file.
#[derive(Debug, Clone)]
pub struct LayoutState {
    pub stateid: Stateid4,
    pub segments: Vec<GrantedLayout>,
}

/// What a LAYOUTRETURN did to a client's state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReturnOutcome {
    /// Segments removed outright.
    pub disposed: usize,
    /// Segments shrunk but kept.
    pub narrowed: usize,
    /// The state itself was deleted because no segments remain.
    pub state_deleted: bool,
}

/// Layout state statistics.
#[derive(Debug, Clone, Copy)]
pub struct LayoutStateStats {
    /// Number of (file, client) layout states.
    pub state_count: usize,
    /// Number of granted segments across all states.
    pub segment_count: usize,
}

/// Table of layout states keyed by file and client.
pub struct LayoutStateTable {
    states: RwLock<HashMap<(FileId, ClientId), LayoutState>>,
    /// Source of layout stateid `other` fields.
    state_counter: AtomicU64,
}

impl LayoutStateTable {
    pub fn new() -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            state_counter: AtomicU64::new(1),
        }
    }

    fn new_stateid(&self) -> Stateid4 {
        let id = self.state_counter.fetch_add(1, Ordering::SeqCst);
        let mut other = [0u8; 12];
        other[4..12].copy_from_slice(&id.to_be_bytes());
        Stateid4 { seqid: 1, other }
    }

    /// Record a grant and return the layout stateid.
    pub fn grant(&self, file: FileId, client: ClientId, layout: GrantedLayout) -> Stateid4 {
        let mut states = self.states.write();
        let stateid = match states.get_mut(&(file, client)) {
            Some(state) => {
                bump(&mut state.stateid);
                // Identical re-grants converge on one entry.
                if !state.segments.contains(&layout) {
                    state.segments.push(layout);
                }
                state.stateid
            }
            None => {
                let stateid = self.new_stateid();
                states.insert(
                    (file, client),
                    LayoutState {
                        stateid,
                        segments: vec![layout],
                    },
                );
                stateid
            }
        };

        debug!(
            inode = file.inode,
            client = client.0,
            offset = layout.segment.offset,
            length = layout.segment.length,
            "Recorded layout grant"
        );
        stateid
    }

    /// Apply a LAYOUTRETURN of `returned` by `client`.
    pub fn return_range(&self, file: FileId, client: ClientId, returned: &Segment) -> ReturnOutcome {
        let mut outcome = ReturnOutcome::default();
        let mut states = self.states.write();
        let Some(state) = states.get_mut(&(file, client)) else {
            return outcome;
        };

        state.segments.retain_mut(|granted| {
            if contains(returned, &granted.segment) {
                outcome.disposed += 1;
                return false;
            }
            if overlaps(&granted.segment, returned) {
                let narrowed = difference(&granted.segment, returned);
                if narrowed.is_empty() {
                    outcome.disposed += 1;
                    return false;
                }
                if narrowed != granted.segment {
                    granted.segment = narrowed;
                    outcome.narrowed += 1;
                }
            }
            true
        });

        if state.segments.is_empty() {
            states.remove(&(file, client));
            outcome.state_deleted = true;
        } else if outcome.disposed + outcome.narrowed > 0 {
            bump(&mut state.stateid);
        }

        debug!(
            inode = file.inode,
            client = client.0,
            disposed = outcome.disposed,
            narrowed = outcome.narrowed,
            deleted = outcome.state_deleted,
            "Processed layout return"
        );
        outcome
    }

    /// Files on which `client` currently holds layouts.
    pub fn files_of(&self, client: ClientId) -> Vec<FileId> {
        self.states
            .read()
            .keys()
            .filter(|(_, owner)| *owner == client)
            .map(|(file, _)| *file)
            .collect()
    }

    /// Return every layout `client` holds in `io_mode` (LAYOUTRETURN4_ALL).
    pub fn return_all(&self, client: ClientId, io_mode: Layoutiomode4) -> ReturnOutcome {
        let everything = Segment::whole_file(io_mode);
        let mut total = ReturnOutcome::default();
        for file in self.files_of(client) {
            let outcome = self.return_range(file, client, &everything);
            total.disposed += outcome.disposed;
            total.narrowed += outcome.narrowed;
            total.state_deleted |= outcome.state_deleted;
        }
        total
    }

    /// Drop the client's `return_on_close` segments. Returns how many went.
    pub fn close(&self, file: FileId, client: ClientId) -> usize {
        let mut states = self.states.write();
        let Some(state) = states.get_mut(&(file, client)) else {
            return 0;
        };
        let before = state.segments.len();
        state.segments.retain(|granted| !granted.return_on_close);
        let dropped = before - state.segments.len();
        if state.segments.is_empty() {
            states.remove(&(file, client));
        }
        if dropped > 0 {
            debug!(inode = file.inode, client = client.0, dropped, "Dropped layouts on close");
        }
        dropped
    }

    /// Segments currently granted to `client` on `file`.
    pub fn granted(&self, file: FileId, client: ClientId) -> Vec<GrantedLayout> {
        self.states
            .read()
            .get(&(file, client))
            .map(|state| state.segments.clone())
            .unwrap_or_default()
    }

    pub fn stateid(&self, file: FileId, client: ClientId) -> Option<Stateid4> {
        self.states.read().get(&(file, client)).map(|s| s.stateid)
    }

    /// Get state statistics.
    pub fn stats(&self) -> LayoutStateStats {
        let states = self.states.read();
        LayoutStateStats {
            state_count: states.len(),
            segment_count: states.values().map(|s| s.segments.len()).sum(),
        }
    }
}

impl Default for LayoutStateTable {
    fn default() -> Self {
        Self::new()
    }
}

fn bump(stateid: &mut Stateid4) {
    stateid.seqid = stateid.seqid.wrapping_add(1);
    if stateid.seqid == 0 {
        stateid.seqid = 1;
    }
}
