//! Surface displacement field
//!
//! A pure function of (world position, time, ripple snapshot). Ambient motion
//! comes from drifting multi-octave noise; each live ripple adds a radial
//! cosine wave that fades with age and attenuates with distance.
//!
//! Everything is evaluated in world space, so two tiles sampling the same
//! world point always agree and tile borders never show a seam.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::noise::NoiseField;
use super::ripple::RippleSnapshot;
use crate::consts::{MAX_RIPPLES, RIPPLE_LIFETIME};

/// Ceiling on ambient displacement (texture-coordinate units)
pub const MAX_AMBIENT_AMPLITUDE: f32 = 0.02;

/// Perceptual tuning for the field and per-tile drift
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldTuning {
    /// Peak ambient displacement, clamped to `MAX_AMBIENT_AMPLITUDE`
    pub ambient_amplitude: f32,
    /// World units -> noise lattice units
    pub frequency_scale: f32,
    /// Noise-space drift per second
    pub drift_velocity: Vec2,
    /// Octave weights, base octave first, each octave doubling frequency
    pub octave_weights: Vec<f32>,
    /// World distance per radian of ripple phase (before frequency)
    pub distance_scale: f32,
    /// Phase advance per second of ripple age
    pub ripple_speed: f32,
    /// Distance at which a ripple is attenuated to half strength
    pub falloff_radius: f32,
    /// Exponent of the age fade (2 = quadratic)
    pub fade_exponent: f32,
    /// Ripples at or below this amplitude are skipped
    pub epsilon: f32,
    /// Per-tile texture drift (UV units)
    pub tile_drift_amplitude: f32,
    /// Per-tile drift angular speed (radians/s)
    pub tile_drift_speed: f32,
    /// Seed for the ambient noise lattice
    pub noise_seed: u64,
}

impl Default for FieldTuning {
    fn default() -> Self {
        Self {
            ambient_amplitude: 0.012,
            frequency_scale: 0.004,
            drift_velocity: Vec2::new(0.03, 0.05),
            octave_weights: vec![0.65, 0.35],
            distance_scale: 100.0,
            ripple_speed: 6.0,
            falloff_radius: 150.0,
            fade_exponent: 2.0,
            epsilon: 1e-4,
            tile_drift_amplitude: 0.01,
            tile_drift_speed: 0.8,
            noise_seed: 0x5EA5_1DE,
        }
    }
}

impl FieldTuning {
    /// Octave weights with at least a base and a double-frequency octave
    pub fn effective_octave_weights(&self) -> Vec<f32> {
        let mut weights: Vec<f32> = self
            .octave_weights
            .iter()
            .map(|w| if w.is_finite() { w.abs() } else { 0.0 })
            .collect();
        match weights.len() {
            0 => weights.extend([1.0, 0.5]),
            1 => weights.push(weights[0] * 0.5),
            _ => {}
        }
        weights
    }

    #[inline]
    pub fn clamped_ambient_amplitude(&self) -> f32 {
        self.ambient_amplitude.clamp(0.0, MAX_AMBIENT_AMPLITUDE)
    }
}

/// Displacement field evaluator
#[derive(Debug, Clone)]
pub struct SurfaceField {
    tuning: FieldTuning,
    weights: Vec<f32>,
    noise: NoiseField,
}

impl SurfaceField {
    pub fn new(tuning: FieldTuning) -> Self {
        let weights = tuning.effective_octave_weights();
        let noise = NoiseField::new(tuning.noise_seed);
        Self {
            tuning,
            weights,
            noise,
        }
    }

    pub fn tuning(&self) -> &FieldTuning {
        &self.tuning
    }

    pub fn noise(&self) -> &NoiseField {
        &self.noise
    }

    pub fn octave_weights(&self) -> &[f32] {
        &self.weights
    }

    /// Replace the tuning; the noise table is rebuilt only if the seed changed
    pub fn set_tuning(&mut self, tuning: FieldTuning) {
        if tuning.noise_seed != self.noise.seed() {
            self.noise = NoiseField::new(tuning.noise_seed);
        }
        self.weights = tuning.effective_octave_weights();
        self.tuning = tuning;
    }

    /// Total displacement: ambient noise plus every snapshot ripple
    pub fn displacement_at(&self, world_pos: Vec2, time: f32, ripples: &RippleSnapshot) -> f32 {
        self.ambient_at(world_pos, time) + self.ripples_at(world_pos, ripples)
    }

    pub fn ambient_at(&self, world_pos: Vec2, time: f32) -> f32 {
        let amplitude = self.tuning.clamped_ambient_amplitude();
        if amplitude == 0.0 {
            return 0.0;
        }
        let p = world_pos * self.tuning.frequency_scale + self.tuning.drift_velocity * time;
        amplitude * self.noise.fbm(p, &self.weights)
    }

    pub fn ripples_at(&self, world_pos: Vec2, ripples: &RippleSnapshot) -> f32 {
        (0..MAX_RIPPLES)
            .map(|i| {
                self.ripple_contribution(
                    world_pos,
                    ripples.position(i),
                    ripples.amplitude[i],
                    ripples.frequency[i],
                    ripples.age[i],
                )
            })
            .sum()
    }

    /// One ripple's wave at `world_pos`
    pub fn ripple_contribution(
        &self,
        world_pos: Vec2,
        origin: Vec2,
        amplitude: f32,
        frequency: f32,
        age: f32,
    ) -> f32 {
        if amplitude <= self.tuning.epsilon || !(0.0..=RIPPLE_LIFETIME).contains(&age) {
            return 0.0;
        }
        let distance = world_pos.distance(origin);
        let phase = distance / self.distance_scale() * frequency - age * self.tuning.ripple_speed;
        phase.cos() * self.ripple_envelope(distance, amplitude, age)
    }

    /// Peak magnitude a ripple can reach at this distance and age.
    ///
    /// Bounds `|ripple_contribution|` and strictly decreases with distance.
    pub fn ripple_envelope(&self, distance: f32, amplitude: f32, age: f32) -> f32 {
        amplitude * self.fade(age) * self.falloff(distance)
    }

    /// `(1 - age/lifetime)^k`, exactly zero from `RIPPLE_LIFETIME` on
    pub fn fade(&self, age: f32) -> f32 {
        if !(age >= 0.0) || age >= RIPPLE_LIFETIME {
            return 0.0;
        }
        let exponent = self.tuning.fade_exponent.max(f32::EPSILON);
        (1.0 - age / RIPPLE_LIFETIME).powf(exponent)
    }

    /// `1 / (1 + d/r)`
    pub fn falloff(&self, distance: f32) -> f32 {
        let radius = self.tuning.falloff_radius.max(f32::EPSILON);
        1.0 / (1.0 + distance.max(0.0) / radius)
    }

    #[inline]
    fn distance_scale(&self) -> f32 {
        self.tuning.distance_scale.max(f32::EPSILON)
    }
}
