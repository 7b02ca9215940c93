use criterion::{criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use spheroid_api::{config::DetectionSettings, Channel, Circle, FitMode, Identity, Shape};
use spheroid_inspect::analysis::{resolve, MomentFitter, ShapeFitter};

fn grid(count: u32, offset: f64) -> Vec<Shape> {
    (0..count)
        .map(|i| {
            Circle {
                x: (i % 20) as f64 * 200.0 + offset,
                y: (i / 20) as f64 * 200.0 + offset,
                r: 30.0,
                identity: Identity::sensor(i / 26 + 1, (b'a' + (i % 26) as u8) as char),
            }
            .into()
        })
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    group.sample_size(40);

    let base = grid(400, 0.0);
    let current = grid(400, 17.0);
    group.bench_function("resolve(400x400)", |b| {
        b.iter(|| resolve(Channel::Sensor, &base, &current, 150.0))
    });

    let base = grid(40, 0.0);
    let current = grid(40, 17.0);
    group.bench_function("resolve(40x40)", |b| {
        b.iter(|| resolve(Channel::Sensor, &base, &current, 150.0))
    });
    group.finish();

    let mut group = c.benchmark_group("detection");
    group.sample_size(20);

    let mut data = Array2::<u16>::zeros((1024, 1024));
    for ((row, col), value) in data.indexed_iter_mut() {
        let dx = (col % 128) as f64 - 64.0;
        let dy = (row % 128) as f64 - 64.0;
        if dx * dx + dy * dy < 30.0 * 30.0 {
            *value = 4000;
        }
    }
    let settings = DetectionSettings::for_channel(Channel::Sensor);
    group.bench_function("MomentFitter::fit(1024)", |b| {
        b.iter(|| MomentFitter.fit(&data.view(), &settings, FitMode::Ellipse))
    });
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
