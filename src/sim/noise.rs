//! Seeded 2D gradient noise for the ambient surface motion
//!
//! The permutation table is shuffled with a seeded PCG so the same seed gives
//! the same surface on every platform. The renderer uploads the same table, so
//! the shader samples an identical lattice.

use std::f32::consts::TAU;

use glam::Vec2;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_pcg::Pcg32;

/// Lattice period of the permutation table
pub const PERMUTATION_SIZE: usize = 256;

/// Octave rotation (~30°) to break up lattice alignment
const OCTAVE_COS: f32 = 0.866_025;
const OCTAVE_SIN: f32 = 0.5;

#[inline]
fn smootherstep(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Gradient noise with a fixed, seeded lattice
#[derive(Debug, Clone)]
pub struct NoiseField {
    seed: u64,
    perm: [u8; PERMUTATION_SIZE * 2],
}

impl NoiseField {
    pub fn new(seed: u64) -> Self {
        let mut table: Vec<u8> = (0..=255).collect();
        table.shuffle(&mut Pcg32::seed_from_u64(seed));

        let mut perm = [0u8; PERMUTATION_SIZE * 2];
        for (i, p) in perm.iter_mut().enumerate() {
            *p = table[i % PERMUTATION_SIZE];
        }
        Self { seed, perm }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The 256-entry shuffled table (uploaded to the shader as-is)
    pub fn permutation(&self) -> &[u8] {
        &self.perm[..PERMUTATION_SIZE]
    }

    #[inline]
    fn hash(&self, ix: i32, iy: i32) -> u8 {
        let x = (ix & 255) as usize;
        let y = (iy & 255) as usize;
        self.perm[self.perm[x] as usize + y]
    }

    /// One of 16 evenly spaced unit gradients dotted with the offset
    #[inline]
    fn grad(hash: u8, offset: Vec2) -> f32 {
        let angle = (hash & 15) as f32 * (TAU / 16.0);
        Vec2::from_angle(angle).dot(offset)
    }

    /// Single-octave noise in `[-1, 1]`; zero on every lattice point
    pub fn sample(&self, p: Vec2) -> f32 {
        let cell = p.floor();
        let (ix, iy) = (cell.x as i32, cell.y as i32);
        let f = p - cell;
        let sx = smootherstep(f.x);
        let sy = smootherstep(f.y);

        let v00 = Self::grad(self.hash(ix, iy), f);
        let v10 = Self::grad(self.hash(ix + 1, iy), f - Vec2::X);
        let v01 = Self::grad(self.hash(ix, iy + 1), f - Vec2::Y);
        let v11 = Self::grad(self.hash(ix + 1, iy + 1), f - Vec2::ONE);

        let a = lerp(v00, v10, sx);
        let b = lerp(v01, v11, sx);
        // Raw range is about ±0.7
        (lerp(a, b, sy) * std::f32::consts::SQRT_2).clamp(-1.0, 1.0)
    }

    /// Octave sum at doubling frequency, normalized by total weight.
    pub fn fbm(&self, p: Vec2, weights: &[f32]) -> f32 {
        let mut sum = 0.0;
        let mut norm = 0.0;
        let mut freq = 1.0;
        let mut q = p;
        for &w in weights {
            sum += self.sample(q * freq) * w;
            norm += w.abs();
            freq *= 2.0;
            q = Vec2::new(q.x * OCTAVE_COS - q.y * OCTAVE_SIN, q.x * OCTAVE_SIN + q.y * OCTAVE_COS);
        }
        if norm > 0.0 { sum / norm } else { 0.0 }
    }
}
