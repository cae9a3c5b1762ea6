// Blob dynamics: a stylized convection cell inside a bulging vessel.
// Not a fluid solver; every constant here was tuned for how the lamp looks.

use rand::{rngs::StdRng, Rng};
use std::f32::consts::TAU;

/// Warm wax palette, carried through to the field sampler for coloring.
pub const PALETTE: [[f32; 3]; 5] = [
    [1.0, 0.302, 0.102],  // #ff4d1a
    [1.0, 0.416, 0.0],    // #ff6a00
    [1.0, 0.549, 0.102],  // #ff8c1a
    [1.0, 0.231, 0.184],  // #ff3b2f
    [1.0, 0.118, 0.118],  // #ff1e1e
];

#[derive(Clone, Copy, Debug)]
pub struct Blob {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,
    /// Fixed at creation; drives field influence via strength = (radius*1.6)^2.
    pub radius: f32,
    pub phase: f32,
    pub speed: f32,
    pub color: [f32; 3],
    /// Stable phase diversifier for the stirring terms. Assigned at creation
    /// so the motion does not depend on storage order.
    pub index: usize,
}

pub struct Ensemble {
    blobs: Vec<Blob>,
    /// Stirring gain in 0..1. Scales the swirl drift and the lateral
    /// perturbation; 0 leaves only buoyancy, damping and the walls.
    pub stir: f32,
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Allowed horizontal radius at height y: a parabola peaked at mid-height,
/// narrow near the top and bottom. Approximates the vessel's belly without
/// referencing actual glass geometry.
pub fn radius_profile(y: f32) -> f32 {
    let center = 0.36;
    let ends = 0.21;
    let t = (y + 1.0) * 0.5;
    let bell = 1.0 - ((t - 0.5) / 0.5).powi(2);
    lerp(ends, center, bell)
}

impl Ensemble {
    /// `count` must be positive; not checked at runtime.
    pub fn new(count: usize, rng: &mut StdRng) -> Self {
        let mut blobs = Vec::with_capacity(count);
        for index in 0..count {
            blobs.push(Blob {
                x: rng.gen_range(-0.25..0.25),
                y: rng.gen_range(-0.7..0.8),
                z: rng.gen_range(-0.25..0.25),
                vx: rng.gen_range(-0.06..0.06),
                vy: rng.gen_range(-0.10..0.26),
                vz: rng.gen_range(-0.06..0.06),
                radius: lerp(0.04, 0.08, rng.gen::<f32>()),
                phase: rng.gen_range(0.0..TAU),
                speed: lerp(0.12, 0.32, rng.gen::<f32>()),
                color: PALETTE[rng.gen_range(0..PALETTE.len())],
                index,
            });
        }
        Self { blobs, stir: 1.0 }
    }

    #[cfg(test)]
    pub(crate) fn from_blobs(blobs: Vec<Blob>) -> Self {
        Self { blobs, stir: 1.0 }
    }

    pub fn blobs(&self) -> &[Blob] {
        &self.blobs
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Advance every blob by one frame. `dt` is elapsed seconds, pre-clamped
    /// by the caller (<= ~0.033); `t` is absolute time. No inter-blob
    /// coupling, so iteration order is irrelevant.
    pub fn step(&mut self, dt: f32, t: f32) {
        for b in &mut self.blobs {
            let i = b.index as f32;

            // periodic stirring
            let swirl = self.stir * 0.2 * (t * b.speed + b.phase).sin();
            b.vx += self.stir * 0.10 * dt * (t * 0.7 + i).sin();
            b.vz += self.stir * 0.10 * dt * (t * 0.9 + i * 0.3).cos();

            // buoyancy up when low, gravity down when high
            let cy = b.y.clamp(-1.0, 1.0);
            b.vy += 0.25 * dt * (1.0 - cy) - 0.18 * dt * (cy + 0.4);

            // damping
            b.vx *= 0.995;
            b.vy *= 0.996;
            b.vz *= 0.995;

            // integrate
            b.x += (b.vx + 0.05 * swirl) * dt;
            b.y += b.vy * dt;
            b.z += (b.vz - 0.05 * swirl) * dt;

            // confinement inside the height-dependent radius, with a margin
            // from the glass. The 1.8 reflection coefficient overcorrects;
            // tuned against boundary jitter, do not "fix" to a true bounce.
            let rad = (radius_profile(b.y) - 0.02).max(0.05);
            let d = b.x.hypot(b.z);
            if d > rad {
                let nx = b.x / d;
                let nz = b.z / d;
                b.x = nx * rad;
                b.z = nz * rad;
                let dot = b.vx * nx + b.vz * nz;
                b.vx -= 1.8 * dot * nx;
                b.vz -= 1.8 * dot * nz;
            }

            // lid bounce is livelier than the settling base
            if b.y > 0.95 {
                b.y = 0.95;
                b.vy *= -0.85;
            }
            if b.y < -0.95 {
                b.y = -0.95;
                b.vy *= -0.6;
            }
        }
    }
}
