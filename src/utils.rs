// --- File: utils.rs ---
use glam::{Vec2, Vec3, Vec4};
use rand::Rng;

use crate::constants::EPSILON;

// --- Helper Functions ---

// Jitters the RGB channels of a base colour, keeping alpha.
pub fn mutate_color<R: Rng + ?Sized>(base_color: Vec4, rng: &mut R, max_delta: f32) -> Vec4 {
    if max_delta <= 0.0 {
        return base_color;
    }
    let r_delta = rng.gen_range(-max_delta..max_delta);
    let g_delta = rng.gen_range(-max_delta..max_delta);
    let b_delta = rng.gen_range(-max_delta..max_delta);
    let new_r = (base_color.x + r_delta).clamp(0.0, 1.0);
    let new_g = (base_color.y + g_delta).clamp(0.0, 1.0);
    let new_b = (base_color.z + b_delta).clamp(0.0, 1.0);
    Vec4::new(new_r, new_g, new_b, base_color.w)
}

/// Unit vector from `a` towards `b` and the distance between them. Coincident points get
/// `±X`, signed by index order, so the pair still separates deterministically.
#[inline]
pub fn separation_axis(a: Vec3, b: Vec3, index_a: usize, index_b: usize) -> (Vec3, f32) {
    let delta = b - a;
    let distance = delta.length();
    if distance > EPSILON {
        (delta / distance, distance)
    } else if index_a < index_b {
        (Vec3::X, 0.0)
    } else {
        (-Vec3::X, 0.0)
    }
}

#[inline]
pub fn planar(v: Vec3) -> Vec2 {
    Vec2::new(v.x, v.z)
}

#[inline]
pub fn lift(v: Vec2) -> Vec3 {
    Vec3::new(v.x, 0.0, v.y)
}

/// Cheap integer hash used to derive per-organism phases from a seed.
#[inline]
pub fn hash_u32(mut x: u32) -> u32 {
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb_352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846c_a68b);
    x ^= x >> 16;
    x
}

/// Maps a hash onto `[0, 1)`.
#[inline]
pub fn unit_from_hash(hash: u32) -> f32 {
    (hash >> 8) as f32 / (1u32 << 24) as f32
}
