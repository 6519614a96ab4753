#[macro_use]
extern crate criterion;

use chrono::Utc;
use criterion::{black_box, Criterion};
use etherparse::PacketBuilder;

use netsight_capture::{Classifier, Frame, SessionCounters};

const SRC_MAC: [u8; 6] = [0x02, 0, 0, 0, 0, 0x01];
const DST_MAC: [u8; 6] = [0x02, 0, 0, 0, 0, 0x02];

// 1500-byte Ethernet/IPv4/TCP frame from a public host to a private one.
fn tcp_frame() -> Frame {
    let builder = PacketBuilder::ethernet2(SRC_MAC, DST_MAC)
        .ipv4([93, 184, 216, 34], [192, 168, 1, 10], 64)
        .tcp(443, 51000, 1, 65535);
    let payload = vec![0u8; 1500 - builder.size(0)];
    let mut out = Vec::with_capacity(1500);
    builder.write(&mut out, &payload).unwrap();
    Frame::ethernet(out)
}

fn udp_v6_frame() -> Frame {
    let builder = PacketBuilder::ethernet2(SRC_MAC, DST_MAC)
        .ipv6(
            [0xfd, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
            [0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2],
            64,
        )
        .udp(5353, 53);
    let mut out = Vec::new();
    builder.write(&mut out, &[0u8; 64]).unwrap();
    Frame::ethernet(out)
}

fn benchmark_classify_tcp(c: &mut Criterion) {
    let classifier = Classifier::default();
    let frame = tcp_frame();

    c.bench_function("classify_tcp_v4", |b| {
        b.iter(|| {
            black_box(classifier.classify(&frame)).unwrap();
        })
    });
}

fn benchmark_classify_udp_v6(c: &mut Criterion) {
    let classifier = Classifier::default();
    let frame = udp_v6_frame();

    c.bench_function("classify_udp_v6", |b| {
        b.iter(|| {
            black_box(classifier.classify(&frame)).unwrap();
        })
    });
}

fn benchmark_record(c: &mut Criterion) {
    let classifier = Classifier::default();
    let packet = classifier.classify(&tcp_frame()).unwrap();
    let mut counters = SessionCounters::new("bench0");
    let now = Utc::now();

    c.bench_function("session_record", |b| {
        b.iter(|| counters.record(black_box(&packet), now))
    });
}

criterion_group!(
    benches,
    benchmark_classify_tcp,
    benchmark_classify_udp_v6,
    benchmark_record
);
criterion_main!(benches);
