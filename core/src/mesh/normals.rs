//! Normal generation for recorded triangle lists.
//!
//! Both generators read `[f32; 3]` positions and overwrite the packed normal
//! of every vertex in an interleaved attribute stream in place.

use std::collections::HashMap;

use super::attribs::pack_normal;
use super::flags::{NORMAL_SIZE, POSITION_SIZE};
use crate::math::Vec3;

/// Positions closer than this are treated as the same point when smoothing.
pub const WELD_EPSILON: f32 = 1.0e-4;

fn read_position(positions: &[u8], index: usize) -> Vec3 {
    let start = index * POSITION_SIZE;
    let p: [f32; 3] = bytemuck::pod_read_unaligned(&positions[start..start + POSITION_SIZE]);
    Vec3::new(p[0], p[1], p[2])
}

fn write_normal(attribs: &mut [u8], stride: usize, normal_offset: usize, index: usize, n: &Vec3) {
    let start = index * stride + normal_offset;
    attribs[start..start + NORMAL_SIZE].copy_from_slice(&pack_normal(n.x, n.y, n.z));
}

fn face_normal(p0: &Vec3, p1: &Vec3, p2: &Vec3) -> Vec3 {
    (p1 - p0)
        .cross(&(p2 - p0))
        .try_normalize(f32::EPSILON)
        .unwrap_or_else(Vec3::zeros)
}

/// Assign every triangle's face normal to its three vertices.
pub fn generate_flat_normals(
    positions: &[u8],
    attribs: &mut [u8],
    stride: usize,
    normal_offset: usize,
) {
    let vertex_count = positions.len() / POSITION_SIZE;
    debug_assert_eq!(attribs.len(), vertex_count * stride);

    for tri in 0..vertex_count / 3 {
        let base = tri * 3;
        let p0 = read_position(positions, base);
        let p1 = read_position(positions, base + 1);
        let p2 = read_position(positions, base + 2);
        let n = face_normal(&p0, &p1, &p2);
        for corner in 0..3 {
            write_normal(attribs, stride, normal_offset, base + corner, &n);
        }
    }
}

fn corner_angle(at: &Vec3, a: &Vec3, b: &Vec3) -> f32 {
    match ((a - at).try_normalize(f32::EPSILON), (b - at).try_normalize(f32::EPSILON)) {
        (Some(u), Some(v)) => u.dot(&v).clamp(-1.0, 1.0).acos(),
        _ => 0.0,
    }
}

fn weld_key(p: &Vec3) -> [i64; 3] {
    let q = |v: f32| (v / WELD_EPSILON).round() as i64;
    [q(p.x), q(p.y), q(p.z)]
}

/// Angle-weighted vertex normals, shared by all vertices at the same position.
pub fn generate_smooth_normals(
    positions: &[u8],
    attribs: &mut [u8],
    stride: usize,
    normal_offset: usize,
) {
    let vertex_count = positions.len() / POSITION_SIZE;
    debug_assert_eq!(attribs.len(), vertex_count * stride);

    let points: Vec<Vec3> = (0..vertex_count)
        .map(|i| read_position(positions, i))
        .collect();

    let mut welded: HashMap<[i64; 3], usize> = HashMap::new();
    let mut slot_of = Vec::with_capacity(vertex_count);
    for p in &points {
        let next = welded.len();
        slot_of.push(*welded.entry(weld_key(p)).or_insert(next));
    }

    let mut sums = vec![Vec3::zeros(); welded.len()];
    for tri in 0..vertex_count / 3 {
        let base = tri * 3;
        let (p0, p1, p2) = (&points[base], &points[base + 1], &points[base + 2]);
        let n = face_normal(p0, p1, p2);
        sums[slot_of[base]] += n * corner_angle(p0, p1, p2);
        sums[slot_of[base + 1]] += n * corner_angle(p1, p2, p0);
        sums[slot_of[base + 2]] += n * corner_angle(p2, p0, p1);
    }

    for (index, slot) in slot_of.iter().enumerate().take(vertex_count / 3 * 3) {
        let n = sums[*slot]
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vec3::zeros);
        write_normal(attribs, stride, normal_offset, index, &n);
    }
}
