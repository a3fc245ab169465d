use std::fs::{self, DirEntry};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use om_falcon::parser::{Diagnostics, MetricType, Samples};

// const FILTER :&[&'static str] = &[];
const FILTER: &[&'static str] = &["label_escaping", "simple_counter", "untyped"];

const STEP: u64 = 60;

/// Keeps skipped lines out of the measurements
struct Quiet;

impl Diagnostics for Quiet {
    fn unsupported_type(&mut self, _metric_type: Option<&MetricType>, _line: &str) {}
}

fn enumerate_test_cases() -> Vec<DirEntry> {
    let test_dir: &'static str = concat!(env!("CARGO_MANIFEST_DIR"), "/../parse-tests");
    let test_dir = std::fs::canonicalize(test_dir).unwrap();

    let mut dirs: Vec<DirEntry> = fs::read_dir(test_dir)
        .unwrap()
        .map(|x| x.unwrap())
        .filter(|x| x.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .collect();
    dirs.sort_by(|a, b| a.path().cmp(&b.path()));
    dirs.into_iter()
        .filter(|x| FILTER.is_empty() || FILTER.contains(&x.file_name().to_str().unwrap()))
        .collect()
}

/// A node exporter sized document: a few hundred families with a handful of labels each
fn synthetic_exposition(families: usize, series: usize) -> String {
    let mut out = String::new();
    for family in 0..families {
        let metric_type = match family % 3 {
            0 => "counter",
            1 => "gauge",
            _ => "histogram",
        };
        out.push_str(&format!("# HELP family_{} Synthetic family.\n", family));
        out.push_str(&format!("# TYPE family_{} {}\n", family, metric_type));
        for series in 0..series {
            out.push_str(&format!(
                "family_{}{{instance=\"10.0.0.{}:9100\",job=\"node\",path=\"C:\\\\tmp\\\\{}\",quote=\"\\\"{}\\\"\"}} {}.5\n",
                family, series, series, family, series
            ));
        }
    }
    out
}

fn count_samples(data: &str) -> usize {
    Samples::new(data.lines(), STEP, "bench")
        .with_diagnostics(Quiet)
        .take_while(Result::is_ok)
        .count()
}

fn fixtures(cr: &mut Criterion) {
    let mut group = cr.benchmark_group("fixtures");

    for path in enumerate_test_cases() {
        let test_name: String = path
            .file_name()
            .into_string()
            .expect("filename is not utf-8");
        let test_data =
            std::fs::read_to_string(path.path().join("metrics")).expect("couldn't read input");

        group.bench_function(BenchmarkId::new(&test_name, "om-falcon"), |b| {
            b.iter(|| count_samples(black_box(&test_data)))
        });
    }
}

fn synthetic(cr: &mut Criterion) {
    let mut group = cr.benchmark_group("synthetic");

    for families in [10, 100, 500] {
        let data = synthetic_exposition(families, 20);
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(families), &data, |b, data| {
            b.iter(|| count_samples(black_box(data)))
        });
    }
}

criterion_group!(exposition_benches, fixtures, synthetic);
criterion_main!(exposition_benches);
