// Metaball field accumulation: turns the blob ensemble into additive point
// contributions for an isosurface extractor.

use crate::sim::Ensemble;

/// Cutoff falloff for every contribution. Fixed for the whole lamp.
pub const FALLOFF: f32 = 12.0;

/// Additive-contribution interface of the volumetric field sampler. The
/// extractor behind it (resolution, iso threshold, triangulation) is its
/// own business.
pub trait FieldSampler {
    fn reset(&mut self);
    fn add_contribution(
        &mut self,
        x: f32,
        y: f32,
        z: f32,
        strength: f32,
        falloff: f32,
        color: [f32; 3],
    );
}

/// Push one contribution per blob into the sampler, in ensemble order.
/// Strength scales with radius squared so visual volume tracks the
/// configured radius. Call after `step` so geometry reflects this frame's
/// final positions.
pub fn emit(ensemble: &Ensemble, sampler: &mut impl FieldSampler) {
    sampler.reset();
    for b in ensemble.blobs() {
        let strength = (b.radius * 1.6).powi(2);
        sampler.add_contribution(b.x, b.y, b.z, strength, FALLOFF, b.color);
    }
}

#[derive(Clone, Copy)]
struct Contribution {
    x: f32,
    y: f32,
    z: f32,
    strength: f32,
    falloff: f32,
    color: [f32; 3],
}

/// Point-contribution field the renderer samples directly instead of
/// extracting a mesh. Each contribution adds
/// `max(0, strength / (1e-6 + d^2) - falloff)`, so a blob's support ends at
/// d = sqrt(strength / falloff) and nearby blobs merge smoothly.
#[derive(Default)]
pub struct PointField {
    points: Vec<Contribution>,
}

impl PointField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample(&self, x: f32, y: f32, z: f32) -> f32 {
        let mut v = 0.0;
        for c in &self.points {
            let dx = x - c.x;
            let dy = y - c.y;
            let dz = z - c.z;
            let d2 = dx * dx + dy * dy + dz * dz + 1e-6;
            let w = c.strength / d2 - c.falloff;
            if w > 0.0 {
                v += w;
            }
        }
        v
    }

    /// Field value plus the contribution-weighted blob color at a point.
    pub fn sample_colored(&self, x: f32, y: f32, z: f32) -> (f32, [f32; 3]) {
        let mut v = 0.0;
        let mut color = [0.0f32; 3];
        for c in &self.points {
            let dx = x - c.x;
            let dy = y - c.y;
            let dz = z - c.z;
            let d2 = dx * dx + dy * dy + dz * dz + 1e-6;
            let w = c.strength / d2 - c.falloff;
            if w > 0.0 {
                v += w;
                color[0] += c.color[0] * w;
                color[1] += c.color[1] * w;
                color[2] += c.color[2] * w;
            }
        }
        if v > 0.0 {
            color[0] /= v;
            color[1] /= v;
            color[2] /= v;
        }
        (v, color)
    }
}

impl FieldSampler for PointField {
    fn reset(&mut self) {
        self.points.clear();
    }

    fn add_contribution(
        &mut self,
        x: f32,
        y: f32,
        z: f32,
        strength: f32,
        falloff: f32,
        color: [f32; 3],
    ) {
        self.points.push(Contribution {
            x,
            y,
            z,
            strength,
            falloff,
            color,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Blob, Ensemble, PALETTE};
    use rand::{rngs::StdRng, SeedableRng};

    #[derive(Default)]
    struct RecordingSampler {
        resets: usize,
        calls: Vec<(f32, f32, f32, f32, f32, [f32; 3])>,
    }

    impl FieldSampler for RecordingSampler {
        fn reset(&mut self) {
            self.resets += 1;
            self.calls.clear();
        }

        fn add_contribution(
            &mut self,
            x: f32,
            y: f32,
            z: f32,
            strength: f32,
            falloff: f32,
            color: [f32; 3],
        ) {
            self.calls.push((x, y, z, strength, falloff, color));
        }
    }

    #[test]
    fn emit_produces_one_contribution_per_blob_in_order() {
        let mut rng = StdRng::seed_from_u64(5);
        let ens = Ensemble::new(16, &mut rng);
        let mut sampler = RecordingSampler::default();
        emit(&ens, &mut sampler);

        assert_eq!(sampler.resets, 1);
        assert_eq!(sampler.calls.len(), 16);
        for (call, b) in sampler.calls.iter().zip(ens.blobs()) {
            let (x, y, z, strength, falloff, color) = *call;
            assert_eq!((x, y, z), (b.x, b.y, b.z));
            assert!((strength - (b.radius * 1.6).powi(2)).abs() < 1e-9);
            assert_eq!(falloff, FALLOFF);
            assert_eq!(color, b.color);
        }
    }

    #[test]
    fn emit_clears_the_previous_frame() {
        let mut rng = StdRng::seed_from_u64(9);
        let ens = Ensemble::new(4, &mut rng);
        let mut sampler = RecordingSampler::default();
        emit(&ens, &mut sampler);
        emit(&ens, &mut sampler);
        assert_eq!(sampler.resets, 2);
        assert_eq!(sampler.calls.len(), 4);
    }

    #[test]
    fn known_radius_yields_the_documented_strength() {
        let ens = Ensemble::from_blobs(vec![Blob {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
            radius: 0.05,
            phase: 0.0,
            speed: 0.2,
            color: PALETTE[0],
            index: 0,
        }]);
        let mut sampler = RecordingSampler::default();
        emit(&ens, &mut sampler);
        let (_, _, _, strength, falloff, _) = sampler.calls[0];
        assert!((strength - 0.0064).abs() < 1e-7);
        assert_eq!(falloff, 12.0);
    }

    #[test]
    fn point_field_support_ends_at_the_falloff_radius() {
        let mut field = PointField::new();
        field.add_contribution(0.0, 0.0, 0.0, 0.0064, FALLOFF, PALETTE[0]);

        // inside the support the field is positive
        assert!(field.sample(0.01, 0.0, 0.0) > 0.0);
        // at the support boundary d = sqrt(strength / falloff) it reaches 0
        let edge = (0.0064f32 / FALLOFF).sqrt();
        assert!(field.sample(edge + 1e-3, 0.0, 0.0) == 0.0);
        assert!(field.sample(0.5, 0.5, 0.5) == 0.0);
    }

    #[test]
    fn overlapping_contributions_add() {
        let mut field = PointField::new();
        field.add_contribution(-0.01, 0.0, 0.0, 0.0064, FALLOFF, PALETTE[0]);
        let single = field.sample(0.0, 0.0, 0.0);
        field.add_contribution(0.01, 0.0, 0.0, 0.0064, FALLOFF, PALETTE[1]);
        assert!(field.sample(0.0, 0.0, 0.0) > single);
    }

    #[test]
    fn sampled_color_follows_the_dominant_contribution() {
        let mut field = PointField::new();
        field.add_contribution(0.0, 0.0, 0.0, 0.0064, FALLOFF, PALETTE[0]);
        field.add_contribution(0.04, 0.0, 0.0, 0.0064, FALLOFF, PALETTE[4]);

        let (v, color) = field.sample_colored(0.002, 0.0, 0.0);
        assert!(v > 0.0);
        // much closer to the first blob, so its color dominates the blend
        assert!((color[1] - PALETTE[0][1]).abs() < (color[1] - PALETTE[4][1]).abs());

        let (v_out, color_out) = field.sample_colored(2.0, 2.0, 2.0);
        assert_eq!(v_out, 0.0);
        assert_eq!(color_out, [0.0; 3]);
    }
}
