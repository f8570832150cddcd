use criterion::{Criterion, black_box, criterion_group, criterion_main};

use tessera_core::mesh::MeshRecorder;
use tessera_core::mesh::flags::{
    GENERATE_FLAT_NORMALS, GENERATE_SMOOTH_NORMALS, PRIMITIVE_QUADS, PRIMITIVE_TRIANGLES,
    VERTEX_COLOR, VERTEX_NORMAL, VERTEX_TEXCOORD,
};

// ---------------------------------------------------------------------------
// Recording
// ---------------------------------------------------------------------------

fn record_grid(recorder: &mut MeshRecorder, flags: u32, size: u32) {
    recorder.start(flags);
    for y in 0..size {
        for x in 0..size {
            let (x0, y0, x1, y1) = (x as f32, y as f32, x as f32 + 1.0, y as f32 + 1.0);
            for (px, py) in [(x0, y0), (x1, y0), (x1, y1), (x0, y1)] {
                recorder.color(0xffffffff);
                recorder.normal(0.0, 0.0, 1.0);
                recorder.texcoord(px / size as f32, py / size as f32);
                recorder.vertex(px, py, 0.0);
            }
        }
    }
}

fn bench_record_positions_only(c: &mut Criterion) {
    let mut recorder = MeshRecorder::new();
    c.bench_function("record_quads_64x64_positions", |b| {
        b.iter(|| {
            record_grid(&mut recorder, PRIMITIVE_QUADS, 64);
            black_box(recorder.vertex_count());
        });
    });
}

fn bench_record_all_attribs(c: &mut Criterion) {
    let mut recorder = MeshRecorder::new();
    let flags = PRIMITIVE_QUADS | VERTEX_COLOR | VERTEX_NORMAL | VERTEX_TEXCOORD;
    c.bench_function("record_quads_64x64_all_attribs", |b| {
        b.iter(|| {
            record_grid(&mut recorder, flags, 64);
            black_box(recorder.vertex_count());
        });
    });
}

// ---------------------------------------------------------------------------
// Normal generation
// ---------------------------------------------------------------------------

fn record_unlit_grid(recorder: &mut MeshRecorder, flags: u32, size: u32) {
    recorder.start(flags);
    for y in 0..size {
        for x in 0..size {
            let (x0, y0, x1, y1) = (x as f32, y as f32, x as f32 + 1.0, y as f32 + 1.0);
            for (px, py) in [(x0, y0), (x1, y0), (x1, y1), (x0, y1)] {
                recorder.vertex(px, py, (px * 0.5).sin() * (py * 0.5).cos());
            }
        }
    }
}

fn bench_generate_normals(c: &mut Criterion) {
    let mut recorder = MeshRecorder::new();
    let flags = PRIMITIVE_QUADS | VERTEX_NORMAL;

    c.bench_function("flat_normals_quads_64x64", |b| {
        b.iter(|| {
            record_unlit_grid(&mut recorder, flags | GENERATE_FLAT_NORMALS, 64);
            black_box(recorder.end().vertex_count);
        });
    });

    c.bench_function("smooth_normals_quads_64x64", |b| {
        b.iter(|| {
            record_unlit_grid(&mut recorder, flags | GENERATE_SMOOTH_NORMALS, 64);
            black_box(recorder.end().vertex_count);
        });
    });
}

fn bench_record_triangles(c: &mut Criterion) {
    let mut recorder = MeshRecorder::new();
    c.bench_function("record_triangles_100k_color", |b| {
        b.iter(|| {
            recorder.start(PRIMITIVE_TRIANGLES | VERTEX_COLOR);
            for i in 0..100_000u32 {
                recorder.color(i);
                recorder.vertex(i as f32, 0.0, 0.0);
            }
            black_box(recorder.vertex_count());
        });
    });
}

criterion_group!(
    benches,
    bench_record_positions_only,
    bench_record_all_attribs,
    bench_record_triangles,
    bench_generate_normals,
);
criterion_main!(benches);
