// Cluster simulation for integration tests
// An in-memory striped storage cluster backing both pNFS roles

use parking_lot::{Mutex, RwLock};
use pnfs_fsal::nfs::{NfsTime4, PosixError};
use pnfs_fsal::pnfs::{
    DataBackend, FileAttrs, FileDescriptor, FileId, FileLayoutParams, HashPlacement,
    MetadataBackend, NodeId, SetAttrs, StorageError, StorageResult, StripePlacement,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Hash of a file name within its parent directory.
pub fn name_hash(name: &str) -> u32 {
    crc32fast::hash(name.as_bytes())
}

/// A backend call recorded by the simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimCall {
    ReadBlock { node: NodeId, stripe: u64 },
    WriteBlock { node: NodeId, stripe: u64, sync: bool, snapseq: u64 },
    CommitBlocks { node: NodeId, count: u64 },
    Connect { node: NodeId, parent: u64 },
    OpenWrite { node: NodeId },
    Write { node: NodeId, offset: u64, len: usize },
    Fsync { node: NodeId },
    Close { node: NodeId },
    Setattr { size: Option<u64> },
}

#[derive(Debug, Clone)]
struct SimFile {
    layout: FileLayoutParams,
    attrs: FileAttrs,
    snapseq: u64,
}

/// Simulated storage cluster.
pub struct SimCluster {
    placement: RwLock<HashPlacement>,
    node_count: u32,
    files: RwLock<HashMap<u64, SimFile>>,
    namespace: RwLock<HashMap<(u64, u32), u64>>,
    /// Stripe objects keyed by (inode, stripe).
    objects: RwLock<HashMap<(u64, u64), Vec<u8>>>,
    unstable: Mutex<HashSet<(u64, u64)>>,
    open_files: Mutex<HashMap<u64, u64>>,
    next_fd: AtomicU64,
    calls: Mutex<Vec<SimCall>>,
    /// Makes `node_address` fail.
    pub fail_addresses: AtomicBool,
}

impl SimCluster {
    pub fn new(node_count: u32) -> Arc<Self> {
        Arc::new(Self {
            placement: RwLock::new(HashPlacement::with_node_count(node_count)),
            node_count,
            files: RwLock::new(HashMap::new()),
            namespace: RwLock::new(HashMap::new()),
            objects: RwLock::new(HashMap::new()),
            unstable: Mutex::new(HashSet::new()),
            open_files: Mutex::new(HashMap::new()),
            next_fd: AtomicU64::new(3),
            calls: Mutex::new(Vec::new()),
            fail_addresses: AtomicBool::new(false),
        })
    }

    /// Create a file named `name` in directory `parent`.
    pub fn create_file(&self, inode: u64, parent: u64, name: &str, stripe_unit: u32) -> FileId {
        let layout = FileLayoutParams {
            stripe_unit,
            stripe_count: 1,
            object_size: stripe_unit,
            pool_id: 1,
            parent_inode: parent,
            parent_hash: name_hash(name),
        };
        self.files.write().insert(
            inode,
            SimFile {
                layout,
                attrs: FileAttrs {
                    size: 0,
                    mtime: NfsTime4::new(1_000, 0),
                },
                snapseq: 1,
            },
        );
        self.namespace.write().insert((parent, name_hash(name)), inode);
        FileId::head(inode)
    }

    pub fn set_snapseq(&self, inode: u64, snapseq: u64) {
        if let Some(file) = self.files.write().get_mut(&inode) {
            file.snapseq = snapseq;
        }
    }

    pub fn attrs(&self, inode: u64) -> Option<FileAttrs> {
        self.files.read().get(&inode).map(|f| f.attrs)
    }

    /// Replace the placement, as if nodes joined or left.
    pub fn set_placement(&self, placement: HashPlacement) {
        *self.placement.write() = placement;
    }

    pub fn owner(&self, inode: u64, stripe: u64) -> NodeId {
        self.placement
            .read()
            .owner(inode, stripe)
            .expect("cluster has nodes")
    }

    /// Raw contents of one stripe object.
    pub fn object(&self, inode: u64, stripe: u64) -> Vec<u8> {
        self.objects
            .read()
            .get(&(inode, stripe))
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_unstable(&self, inode: u64, stripe: u64) -> bool {
        self.unstable.lock().contains(&(inode, stripe))
    }

    pub fn calls(&self) -> Vec<SimCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// A data-server view of this cluster running on `node`.
    pub fn node(self: &Arc<Self>, node: NodeId) -> Arc<SimNode> {
        Arc::new(SimNode {
            cluster: self.clone(),
            node,
        })
    }

    fn record(&self, call: SimCall) {
        self.calls.lock().push(call);
    }

    fn layout_of(&self, inode: u64) -> StorageResult<FileLayoutParams> {
        self.files
            .read()
            .get(&inode)
            .map(|f| f.layout)
            .ok_or_else(|| StorageError::new(PosixError::Noent, format!("inode {}", inode)))
    }

    fn write_object(&self, inode: u64, stripe: u64, offset: u64, data: &[u8]) {
        let mut objects = self.objects.write();
        let object = objects.entry((inode, stripe)).or_default();
        let end = offset as usize + data.len();
        if object.len() < end {
            object.resize(end, 0);
        }
        object[offset as usize..end].copy_from_slice(data);
    }

    fn grow(&self, inode: u64, end: u64) {
        if let Some(file) = self.files.write().get_mut(&inode) {
            file.attrs.size = file.attrs.size.max(end);
        }
    }
}

#[async_trait]
impl StripePlacement for SimCluster {
    async fn stripe_owner(
        &self,
        file: FileId,
        stripe: u64,
        layout: &FileLayoutParams,
    ) -> StorageResult<NodeId> {
        let placement = self.placement.read().clone();
        placement.stripe_owner(file, stripe, layout).await
    }
}

#[async_trait]
impl MetadataBackend for SimCluster {
    async fn file_layout(&self, file: FileId) -> StorageResult<FileLayoutParams> {
        self.layout_of(file.inode)
    }

    async fn snap_seq(&self, file: FileId) -> StorageResult<u64> {
        self.files
            .read()
            .get(&file.inode)
            .map(|f| f.snapseq)
            .ok_or_else(|| StorageError::new(PosixError::Noent, "snap_seq"))
    }

    async fn node_count(&self) -> StorageResult<u32> {
        Ok(self.node_count)
    }

    async fn node_address(&self, node: NodeId) -> StorageResult<SocketAddrV4> {
        if self.fail_addresses.load(Ordering::SeqCst) {
            return Err(StorageError::new(PosixError::Nxio, "monitor unreachable"));
        }
        Ok(SocketAddrV4::new(
            Ipv4Addr::new(192, 168, 1, 10 + node as u8),
            2049,
        ))
    }

    async fn getattr(&self, file: FileId) -> StorageResult<FileAttrs> {
        self.attrs(file.inode)
            .ok_or_else(|| StorageError::new(PosixError::Noent, "getattr"))
    }

    async fn setattr(&self, file: FileId, attrs: &SetAttrs) -> StorageResult<()> {
        // Give concurrent commits a chance to interleave.
        tokio::task::yield_now().await;
        self.record(SimCall::Setattr { size: attrs.size });
        let mut files = self.files.write();
        let entry = files
            .get_mut(&file.inode)
            .ok_or_else(|| StorageError::new(PosixError::Stale, "setattr"))?;
        if let Some(size) = attrs.size {
            entry.attrs.size = size;
        }
        if let Some(mtime) = attrs.mtime {
            entry.attrs.mtime = mtime;
        }
        Ok(())
    }
}

/// One storage node of a [`SimCluster`].
pub struct SimNode {
    cluster: Arc<SimCluster>,
    node: NodeId,
}

#[async_trait]
impl StripePlacement for SimNode {
    async fn stripe_owner(
        &self,
        file: FileId,
        stripe: u64,
        layout: &FileLayoutParams,
    ) -> StorageResult<NodeId> {
        self.cluster.stripe_owner(file, stripe, layout).await
    }
}

#[async_trait]
impl DataBackend for SimNode {
    fn local_node(&self) -> NodeId {
        self.node
    }

    async fn read_block(
        &self,
        file: FileId,
        _layout: &FileLayoutParams,
        stripe: u64,
        offset: u64,
        len: u32,
    ) -> StorageResult<Vec<u8>> {
        self.cluster.record(SimCall::ReadBlock {
            node: self.node,
            stripe,
        });
        let object = self.cluster.object(file.inode, stripe);
        let start = (offset as usize).min(object.len());
        let end = (start + len as usize).min(object.len());
        Ok(object[start..end].to_vec())
    }

    async fn write_block(
        &self,
        file: FileId,
        _layout: &FileLayoutParams,
        stripe: u64,
        offset: u64,
        data: &[u8],
        snapseq: u64,
        sync: bool,
    ) -> StorageResult<u32> {
        self.cluster.record(SimCall::WriteBlock {
            node: self.node,
            stripe,
            sync,
            snapseq,
        });
        self.cluster.write_object(file.inode, stripe, offset, data);
        let mut unstable = self.cluster.unstable.lock();
        if sync {
            unstable.remove(&(file.inode, stripe));
        } else {
            unstable.insert((file.inode, stripe));
        }
        drop(unstable);
        // Direct writes leave the size alone until LAYOUTCOMMIT.
        Ok(data.len() as u32)
    }

    async fn commit_blocks(&self, file: FileId, offset: u64, count: u64) -> StorageResult<()> {
        self.cluster.record(SimCall::CommitBlocks {
            node: self.node,
            count,
        });
        let layout = self.cluster.layout_of(file.inode)?;
        let unit = layout.stripe_unit.max(1) as u64;
        let first = offset / unit;
        let last = offset.saturating_add(count.saturating_sub(1)) / unit;
        self.cluster
            .unstable
            .lock()
            .retain(|&(inode, stripe)| inode != file.inode || stripe < first || stripe > last);
        Ok(())
    }

    async fn connect(&self, file: FileId, parent_inode: u64, parent_hash: u32) -> StorageResult<()> {
        self.cluster.record(SimCall::Connect {
            node: self.node,
            parent: parent_inode,
        });
        match self.cluster.namespace.read().get(&(parent_inode, parent_hash)) {
            Some(&inode) if inode == file.inode => Ok(()),
            _ => Err(StorageError::new(PosixError::Stale, "name not in parent")),
        }
    }

    async fn open_write(&self, file: FileId) -> StorageResult<FileDescriptor> {
        self.cluster.record(SimCall::OpenWrite { node: self.node });
        let fd = self.cluster.next_fd.fetch_add(1, Ordering::SeqCst);
        self.cluster.open_files.lock().insert(fd, file.inode);
        Ok(FileDescriptor(fd))
    }

    async fn write(&self, fd: FileDescriptor, offset: u64, data: &[u8]) -> StorageResult<u32> {
        self.cluster.record(SimCall::Write {
            node: self.node,
            offset,
            len: data.len(),
        });
        let inode = self
            .cluster
            .open_files
            .lock()
            .get(&fd.0)
            .copied()
            .ok_or_else(|| StorageError::new(PosixError::Io, "bad descriptor"))?;
        let unit = self.cluster.layout_of(inode)?.stripe_unit as u64;

        // File-level write: split across stripe objects.
        let mut done = 0usize;
        while done < data.len() {
            let pos = offset + done as u64;
            let stripe = pos / unit;
            let within = pos - stripe * unit;
            let take = ((unit - within) as usize).min(data.len() - done);
            self.cluster
                .write_object(inode, stripe, within, &data[done..done + take]);
            done += take;
        }
        self.cluster.grow(inode, offset + data.len() as u64);
        Ok(data.len() as u32)
    }

    async fn fsync(&self, _fd: FileDescriptor) -> StorageResult<()> {
        self.cluster.record(SimCall::Fsync { node: self.node });
        Ok(())
    }

    async fn close(&self, fd: FileDescriptor) -> StorageResult<()> {
        self.cluster.record(SimCall::Close { node: self.node });
        self.cluster.open_files.lock().remove(&fd.0);
        Ok(())
    }
}
