//! Benchmarks for the packet codec.
//!
//! Run with: cargo bench --bench codec

use anchor_mesh::{Packet, PacketType, PeerId};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn make_packet(payload_len: usize, addressed: bool) -> Packet {
    let mut packet = Packet::new(
        PacketType::NoiseEncrypted,
        PeerId::from_bytes([1, 2, 3, 4, 5, 6, 7, 8]),
        addressed.then(|| PeerId::from_bytes([8, 7, 6, 5, 4, 3, 2, 1])),
        1_700_000_000_000,
        vec![0xAB; payload_len],
        7,
    );
    packet.signature = Some([0x5A; 64]);
    packet
}

// ===== Encode Benchmarks =====

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_encode");

    for size in [16usize, 200, 1000] {
        let packet = make_packet(size, true);
        group.bench_with_input(BenchmarkId::new("unpadded", size), &packet, |b, p| {
            b.iter(|| black_box(p).encode(false))
        });
        group.bench_with_input(BenchmarkId::new("padded", size), &packet, |b, p| {
            b.iter(|| black_box(p).encode(true))
        });
    }

    group.finish();
}

// ===== Decode Benchmarks =====

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_decode");

    for size in [16usize, 200, 1000] {
        let frame = make_packet(size, true).encode(true).unwrap();
        group.bench_with_input(BenchmarkId::new("padded", size), &frame, |b, f| {
            b.iter(|| Packet::decode(black_box(f)))
        });
    }

    group.finish();
}

// ===== Signing Bytes =====

fn bench_signing_bytes(c: &mut Criterion) {
    let packet = make_packet(200, false);
    c.bench_function("packet_signing_bytes", |b| {
        b.iter(|| black_box(&packet).signing_bytes())
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_signing_bytes);
criterion_main!(benches);
