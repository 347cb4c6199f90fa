//! Benchmarks for the layout wire codec and stripe math.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pnfs_fsal::nfs::XdrEncoder;
use pnfs_fsal::pnfs::codec::{
    encode_file_device_addr, encode_file_layout, FileDeviceAddr, FileLayout, MultipathMember,
};
use pnfs_fsal::pnfs::{
    DeviceId, DsWire, FileId, FileLayoutParams, HashPlacement, StripeLocation, StripeUtil,
};
use std::net::{Ipv4Addr, SocketAddrV4};

fn sample_layout() -> FileLayout {
    let params = FileLayoutParams {
        stripe_unit: 0x40_0000,
        stripe_count: 1,
        object_size: 0x40_0000,
        pool_id: 2,
        parent_inode: 1,
        parent_hash: 0x1234_5678,
    };
    let handle = DsWire::new(FileId::head(0x1000), &params, 9)
        .into_handle(1)
        .unwrap();
    FileLayout {
        deviceid: DeviceId::derive_from_inode(1, 0x1000),
        util: StripeUtil::sparse(params.stripe_unit),
        first_stripe_index: 0,
        pattern_offset: 0,
        handles: vec![handle],
    }
}

fn device_addr(stripes: u32, nodes: u32) -> FileDeviceAddr {
    let placement = HashPlacement::with_node_count(nodes);
    FileDeviceAddr {
        stripe_indices: (0..stripes as u64)
            .map(|s| placement.owner(0x1000, s).unwrap())
            .collect(),
        multipath_lists: (0..nodes)
            .map(|n| {
                vec![MultipathMember::tcp(SocketAddrV4::new(
                    Ipv4Addr::new(10, 0, (n >> 8) as u8, n as u8),
                    2049,
                ))]
            })
            .collect(),
    }
}

fn bench_file_layout(c: &mut Criterion) {
    let layout = sample_layout();
    c.bench_function("encode_file_layout", |b| {
        b.iter(|| {
            let mut enc = XdrEncoder::with_limit(0x100);
            encode_file_layout(&mut enc, black_box(&layout)).unwrap();
            enc
        })
    });
}

fn bench_device_addr(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_device_addr");

    for stripes in [64u32, 1024, 4096].iter() {
        let addr = device_addr(*stripes, 16);
        group.throughput(Throughput::Elements(*stripes as u64));
        group.bench_with_input(BenchmarkId::from_parameter(stripes), stripes, |b, _| {
            b.iter(|| {
                let mut enc = XdrEncoder::unbounded();
                encode_file_device_addr(&mut enc, black_box(&addr)).unwrap();
                enc
            })
        });
    }
    group.finish();
}

fn bench_placement(c: &mut Criterion) {
    let mut group = c.benchmark_group("stripe_owner");

    for nodes in [4u32, 64, 256].iter() {
        let placement = HashPlacement::with_node_count(*nodes);
        group.bench_with_input(BenchmarkId::from_parameter(nodes), nodes, |b, _| {
            let mut stripe = 0u64;
            b.iter(|| {
                stripe += 1;
                placement.owner(black_box(0x1000), black_box(stripe))
            })
        });
    }
    group.finish();
}

fn bench_locate(c: &mut Criterion) {
    c.bench_function("stripe_locate", |b| {
        let mut offset = 0u64;
        b.iter(|| {
            offset = offset.wrapping_add(70_001);
            StripeLocation::locate(black_box(offset), black_box(65536))
                .unwrap()
                .clamp_length(u32::MAX)
        })
    });
}

criterion_group!(
    benches,
    bench_file_layout,
    bench_device_addr,
    bench_placement,
    bench_locate
);
criterion_main!(benches);
