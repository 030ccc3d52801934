//! Deterministic per-item randomness
//!
//! Kernels never share RNG state between tasks: every `(seed, item)` pair
//! derives its own stream, so results do not depend on execution order.
//! The same hash is implemented in `rng.wgsl`.

use glam::Vec3;

/// PCG-style 32-bit integer hash.
#[inline]
pub fn pcg_hash(input: u32) -> u32 {
    let state = input.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28).wrapping_add(4))) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

/// Random stream for one spawn item.
pub struct ItemRng {
    state: u32,
}

impl ItemRng {
    pub fn new(seed: u32, item: u32) -> Self {
        Self {
            state: pcg_hash(seed ^ pcg_hash(item)),
        }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = pcg_hash(self.state);
        self.state
    }

    /// Uniform in [0, 1). Uses the top 24 bits so the value is exact in f32.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 * (1.0 / 16_777_216.0)
    }

    /// Uniform in [min, max)
    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_f32() * (max - min)
    }

    /// Uniform direction on the unit sphere.
    pub fn unit_vector(&mut self) -> Vec3 {
        let z = self.range(-1.0, 1.0);
        let phi = self.range(0.0, std::f32::consts::TAU);
        let r = (1.0 - z * z).max(0.0).sqrt();
        Vec3::new(r * phi.cos(), r * phi.sin(), z)
    }

    /// Uniform point inside a ball of `radius`.
    pub fn in_ball(&mut self, radius: f32) -> Vec3 {
        let dir = self.unit_vector();
        dir * radius * self.next_f32().cbrt()
    }

    /// Direction within `half_angle` radians of `axis` (assumed unit length),
    /// uniform over the spherical cap.
    pub fn in_cone(&mut self, axis: Vec3, half_angle: f32) -> Vec3 {
        let cos_theta = self.range(half_angle.cos(), 1.0);
        let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
        let phi = self.range(0.0, std::f32::consts::TAU);
        let (tangent, bitangent) = orthonormal_basis(axis);
        tangent * (sin_theta * phi.cos()) + bitangent * (sin_theta * phi.sin()) + axis * cos_theta
    }
}

/// Two unit vectors orthogonal to `n` and to each other (Duff et al. 2017).
pub fn orthonormal_basis(n: Vec3) -> (Vec3, Vec3) {
    let sign = if n.z >= 0.0 { 1.0 } else { -1.0 };
    let a = -1.0 / (sign + n.z);
    let b = n.x * n.y * a;
    (
        Vec3::new(1.0 + sign * n.x * n.x * a, sign * b, -sign * n.x),
        Vec3::new(b, sign + n.y * n.y * a, -n.y),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streams_are_reproducible() {
        let mut a = ItemRng::new(42, 7);
        let mut b = ItemRng::new(42, 7);
        for _ in 0..16 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn test_items_get_distinct_streams() {
        let first: Vec<u32> = (0..64).map(|i| ItemRng::new(42, i).next_u32()).collect();
        let mut dedup = first.clone();
        dedup.sort_unstable();
        dedup.dedup();
        assert_eq!(dedup.len(), first.len());
    }

    #[test]
    fn test_unit_range() {
        let mut rng = ItemRng::new(1, 0);
        for _ in 0..1000 {
            let v = rng.next_f32();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn test_cone_stays_within_angle() {
        let axis = Vec3::new(0.3, 1.0, -0.2).normalize();
        let half = 15f32.to_radians();
        for item in 0..500 {
            let dir = ItemRng::new(9, item).in_cone(axis, half);
            assert!((dir.length() - 1.0).abs() < 1e-3);
            assert!(dir.dot(axis) >= half.cos() - 1e-4);
        }
    }

    #[test]
    fn test_basis_is_orthonormal() {
        for n in [Vec3::X, Vec3::Y, -Vec3::Z, Vec3::new(1.0, 2.0, 3.0).normalize()] {
            let (t, b) = orthonormal_basis(n);
            assert!(t.dot(n).abs() < 1e-5);
            assert!(b.dot(n).abs() < 1e-5);
            assert!(t.dot(b).abs() < 1e-5);
            assert!((t.length() - 1.0).abs() < 1e-5);
        }
    }
}
