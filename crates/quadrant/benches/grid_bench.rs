use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::Vec3;
use quadrant::{CellAssignment, GridConfig, SpatialGrid};

fn positions(count: usize) -> Vec<Vec3> {
    // Deterministic spiral through the default arena
    (0..count)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let t = i as f32 * 0.37;
            Vec3::new(45.0 * t.sin(), 45.0 * t.cos(), (t * 3.0) % 130.0 - 30.0)
        })
        .collect()
}

fn bench_cell_index(c: &mut Criterion) {
    let grid = SpatialGrid::new(GridConfig::default()).unwrap();
    let points = positions(10_000);

    c.bench_function("cell_index_10k", |b| {
        b.iter(|| {
            for p in &points {
                black_box(grid.cell_index(*p));
            }
        })
    });
}

fn bench_continuous_refresh(c: &mut Criterion) {
    let grid = SpatialGrid::new(GridConfig::default()).unwrap();
    let points = positions(10_000);
    let mut assignments = vec![CellAssignment::continuous(); points.len()];

    c.bench_function("continuous_refresh_10k", |b| {
        b.iter(|| {
            for (a, p) in assignments.iter_mut().zip(&points) {
                a.refresh(&grid, *p);
            }
        })
    });
}

fn bench_cells_in_radius(c: &mut Criterion) {
    let grid = SpatialGrid::new(GridConfig::default()).unwrap();

    c.bench_function("cells_in_radius_r12", |b| {
        b.iter(|| black_box(grid.cells_in_radius(black_box(Vec3::new(3.0, -4.0, 20.0)), 12.0)))
    });
}

criterion_group!(benches, bench_cell_index, bench_continuous_refresh, bench_cells_in_radius);
criterion_main!(benches);
