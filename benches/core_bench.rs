use std::hint::black_box;
use std::sync::Arc;

use aurora_mapper::render::{CpuRasterizer, RenderBackend, StencilCompositor};
use aurora_mapper::source::StillSource;
use aurora_mapper::{
    CompositorSettings, ControlGrid, Homography, LayerKind, Scene, SceneCommand, SurfaceGeometry,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::Vec2;
use image::{Rgba, RgbaImage};

fn bench_homography(c: &mut Criterion) {
    let src = [
        Vec2::new(0.0, 0.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(0.0, 1.0),
        Vec2::new(1.0, 1.0),
    ];
    let dst = [
        Vec2::new(-0.8, 0.7),
        Vec2::new(0.6, 0.9),
        Vec2::new(-0.4, -0.6),
        Vec2::new(0.9, -0.3),
    ];

    c.bench_function("homography_compute", |b| {
        b.iter(|| Homography::compute(black_box(&src), black_box(&dst)))
    });
}

fn bench_tessellation(c: &mut Criterion) {
    let mut group = c.benchmark_group("surface_tessellation");

    for &n in &[2usize, 16, 64] {
        let mut grid = ControlGrid::create_quad();
        if n > 2 {
            grid.resample(n, n).expect("quad resamples");
        }
        group.bench_with_input(BenchmarkId::new("from_grid", n), &grid, |b, grid| {
            b.iter(|| black_box(SurfaceGeometry::from_grid(grid).vertices.len()))
        });
    }

    group.finish();
}

fn bench_cpu_frame(c: &mut Criterion) {
    let settings = CompositorSettings {
        width: 256,
        height: 256,
        ..Default::default()
    };

    let mut scene = Scene::new();
    let surface = scene
        .apply(SceneCommand::AddLayer { kind: LayerKind::Surface })
        .expect("add surface");
    scene
        .apply(SceneCommand::Resample { id: surface, rows: 8, cols: 8 })
        .expect("resample");
    scene
        .apply(SceneCommand::SetEdgeSoftness { id: surface, softness: 0.1 })
        .expect("softness");
    scene
        .apply(SceneCommand::AddLayer { kind: LayerKind::Mask })
        .expect("add mask");

    let texture = Arc::new(RgbaImage::from_pixel(64, 64, Rgba([200, 120, 40, 255])));
    let source = StillSource(texture);
    let mut backend =
        CpuRasterizer::new(settings.width, settings.height, settings.texture_filter).expect("backend");
    let mut compositor = StencilCompositor::new(&settings);

    c.bench_function("cpu_frame_256", |b| {
        b.iter(|| {
            compositor
                .render(black_box(&scene), &source, &mut backend)
                .expect("render");
            black_box(backend.size())
        })
    });
}

criterion_group!(benches, bench_homography, bench_tessellation, bench_cpu_frame);
criterion_main!(benches);
