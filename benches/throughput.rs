//! Throughput benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use gpslink_core::core::protocol::{checksum, LineFramer, Sentence};
use gpslink_core::FixDecoder;

const BURST: &[u8] = b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n\
$GPGSV,2,1,08,01,40,083,46,02,17,308,41,12,07,344,39,14,22,228,45*75\r\n\
$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\r\n";

fn stream(bursts: usize) -> Vec<u8> {
    BURST.iter().copied().cycle().take(BURST.len() * bursts).collect()
}

fn framing_benchmark(c: &mut Criterion) {
    let data = stream(64);

    let mut group = c.benchmark_group("framing");
    group.throughput(Throughput::Bytes(data.len() as u64));

    for chunk_size in [16, 256, 4096] {
        group.bench_function(format!("ingest_{chunk_size}"), |b| {
            b.iter(|| {
                let mut framer = LineFramer::new();
                let mut lines = 0;
                for chunk in black_box(&data).chunks(chunk_size) {
                    lines += framer.ingest(chunk).len();
                }
                black_box(lines)
            })
        });
    }

    group.finish();
}

fn decode_benchmark(c: &mut Criterion) {
    let data = stream(64);
    let decoder = FixDecoder::new();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("checksum", |b| {
        let body = "GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,";
        b.iter(|| black_box(checksum(black_box(body))))
    });

    group.bench_function("frame_parse_decode", |b| {
        b.iter(|| {
            let mut framer = LineFramer::new();
            let mut fixes = 0;
            for line in framer.ingest(black_box(&data)) {
                for raw in line.sentences() {
                    if let Ok(sentence) = Sentence::parse(&raw) {
                        fixes += usize::from(decoder.decode(&sentence).is_some());
                    }
                }
            }
            black_box(fixes)
        })
    });

    group.finish();
}

criterion_group!(benches, framing_benchmark, decode_benchmark);
criterion_main!(benches);
