// Test fixtures and data generators for integration tests

use pnfs_fsal::nfs::Layoutiomode4;
use pnfs_fsal::pnfs::{DeviceId, Segment, NFS4_UINT64_MAX};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Deterministic random data generator for reproducible tests
pub struct TestDataGenerator {
    rng: StdRng,
}

impl TestDataGenerator {
    /// Creates a new generator with a fixed seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generates random bytes of specified length
    pub fn random_bytes(&mut self, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        self.rng.fill(&mut bytes[..]);
        bytes
    }

    pub fn random_io_mode(&mut self) -> Layoutiomode4 {
        match self.rng.gen_range(0..3) {
            0 => Layoutiomode4::Read,
            1 => Layoutiomode4::Rw,
            _ => Layoutiomode4::Any,
        }
    }

    /// A u64 biased towards the interesting edges: zero, small values and
    /// values near the top of the range.
    pub fn edgy_u64(&mut self) -> u64 {
        match self.rng.gen_range(0..6) {
            0 => 0,
            1 => NFS4_UINT64_MAX,
            2 => NFS4_UINT64_MAX - self.rng.gen_range(0..4096),
            3 => self.rng.gen_range(0..16),
            4 => self.rng.gen_range(0..1 << 20),
            _ => self.rng.gen(),
        }
    }

    /// A segment with clustered bounds so overlaps are common.
    pub fn random_segment(&mut self) -> Segment {
        let io_mode = self.random_io_mode();
        if self.rng.gen_bool(0.1) {
            return Segment::whole_file(io_mode);
        }
        if self.rng.gen_bool(0.1) {
            return Segment::new(io_mode, self.edgy_u64(), self.edgy_u64());
        }
        let offset = self.rng.gen_range(0..64u64) * 512;
        let length = match self.rng.gen_range(0..8) {
            0 => 0,
            1 => NFS4_UINT64_MAX,
            _ => self.rng.gen_range(1..64u64) * 512,
        };
        Segment::new(io_mode, offset, length)
    }

    pub fn random_deviceid(&mut self) -> DeviceId {
        DeviceId::new(self.edgy_u64(), self.edgy_u64())
    }

    /// A stripe unit that is a multiple of 64, as clients expect.
    pub fn random_stripe_unit(&mut self) -> u32 {
        self.rng.gen_range(1..=(1u32 << 16)) * 64
    }

    pub fn gen_range_u64(&mut self, range: std::ops::Range<u64>) -> u64 {
        self.rng.gen_range(range)
    }
}

impl Default for TestDataGenerator {
    fn default() -> Self {
        Self::new(42)
    }
}
