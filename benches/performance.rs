//! Performance benchmarks for the diagnostic engines

use cityguard::discovery::{parse_neighbor_table, TableFormat};
use cityguard::inference::{argmax, FeatureBatch, FEATURE_COUNT};
use cityguard::network::Connector;
use cityguard::top_ports::parse_port_list;
use cityguard::{PortProber, ProbeError, ProbeTarget};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

fn windows_table(entries: usize) -> String {
    let mut table = String::from("Interface: 10.0.0.5 --- 0xb\n  Internet Address      Physical Address      Type\n");
    for i in 0..entries {
        let ip = Ipv4Addr::from(0x0a00_0000u32 + i as u32);
        table.push_str(&format!("  {:<20}  00-1a-2b-3c-4d-{:02x}     dynamic\n", ip, i % 256));
    }
    table
}

fn bsd_table(entries: usize) -> String {
    (0..entries)
        .map(|i| {
            let ip = Ipv4Addr::from(0xc0a8_0000u32 + i as u32);
            format!("? ({}) at 0:1a:2b:3c:4d:{:x} on en0 ifscope [ethernet]\n", ip, i % 256)
        })
        .collect()
}

/// Benchmark neighbor table parsing
fn bench_table_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("neighbor_table");

    for entries in [16, 256, 4096] {
        let windows = windows_table(entries);
        group.bench_with_input(BenchmarkId::new("windows", entries), &windows, |b, text| {
            b.iter(|| black_box(parse_neighbor_table(black_box(text), TableFormat::Windows)))
        });

        let bsd = bsd_table(entries);
        group.bench_with_input(BenchmarkId::new("bsd", entries), &bsd, |b, text| {
            b.iter(|| black_box(parse_neighbor_table(black_box(text), TableFormat::Bsd)))
        });
    }

    group.finish();
}

/// Benchmark feature validation and label selection
fn bench_inference_prep(c: &mut Criterion) {
    let mut group = c.benchmark_group("inference_prep");

    for rows in [1, 100, 10_000] {
        let raw: Vec<Vec<f32>> = (0..rows)
            .map(|r| (0..FEATURE_COUNT).map(|f| (r * f) as f32 * 0.01).collect())
            .collect();

        group.bench_with_input(BenchmarkId::new("validate_and_tensor", rows), &raw, |b, raw| {
            b.iter(|| {
                let batch = FeatureBatch::new(raw.clone()).unwrap();
                black_box(batch.to_tensor())
            })
        });
    }

    let scores: Vec<[f32; 5]> = (0..10_000)
        .map(|i| {
            let mut row = [0.1f32; 5];
            row[i % 5] = 0.6;
            row
        })
        .collect();
    group.bench_function("argmax_10000", |b| {
        b.iter(|| {
            for row in &scores {
                black_box(argmax(black_box(row)));
            }
        })
    });

    group.bench_function("parse_range_1-65535", |b| {
        b.iter(|| black_box(parse_port_list(black_box("1-65535")).unwrap()))
    });

    group.finish();
}

struct Immediate;

#[async_trait::async_trait]
impl Connector for Immediate {
    async fn connect(&self, addr: SocketAddr) -> Result<(), ProbeError> {
        if addr.port() % 10 == 0 {
            Ok(())
        } else {
            Err(ProbeError::Refused)
        }
    }

    fn name(&self) -> &str {
        "instant"
    }
}

/// Benchmark task fan-out overhead with a connector that answers immediately
fn bench_probe_fanout(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let prober = PortProber::new(Arc::new(Immediate));
    let mut group = c.benchmark_group("probe_fanout");

    for count in [10u16, 1000] {
        let ports: Vec<u16> = (1..=count).collect();
        let target = ProbeTarget::new(Ipv4Addr::LOCALHOST, &ports, Duration::from_millis(50)).unwrap();

        group.bench_with_input(BenchmarkId::new("ports", count), &target, |b, target| {
            b.iter(|| black_box(rt.block_on(prober.scan(target))))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_table_parsing, bench_inference_prep, bench_probe_fanout);
criterion_main!(benches);
