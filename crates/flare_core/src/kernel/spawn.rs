use super::{CRACKLE_DELAY, CRACKLE_FLASH, LIFETIME_JITTER, SIZE_JITTER, SPEED_JITTER};
use crate::kind::ParticleKind;
use crate::particle::{aux, Particle};
use crate::request::{tag, SpawnRecord, FLAG_FINALE};
use crate::rng::ItemRng;
use glam::Vec3;
use std::f32::consts::TAU;

/// Initial record for item `item` of `rec`.
///
/// Depends only on its arguments. Draw order from the RNG is fixed per tag
/// and must stay in step with `spawn.wgsl`: positional jitter first, then the
/// tag-specific draws below.
pub fn derive_particle(rec: &SpawnRecord, item: u32, directions: &[[f32; 4]]) -> Particle {
    let mut rng = ItemRng::new(rec.seed, item);
    let origin = Vec3::from(rec.origin);
    let position = origin + rng.in_ball(rec.spread);

    let mut p = Particle {
        position: position.to_array(),
        color: rec.color,
        lifetime: rec.lifetime,
        drag: rec.drag,
        size: rec.size,
        seed: rng.next_u32(),
        ..Particle::DEAD
    };

    match rec.tag {
        tag::DIRECTIONAL_BURST => {
            let dir = directions
                .get((rec.dir_start + item) as usize)
                .map(|d| Vec3::new(d[0], d[1], d[2]))
                .unwrap_or(Vec3::Y);
            spark(&mut p, rec, dir, &mut rng);
            p.set_kind(ParticleKind::Spark);
        }
        tag::CONE_BURST => {
            let dir = rng.in_cone(Vec3::from(rec.vector), rec.cone_angle);
            spark(&mut p, rec, dir, &mut rng);
            if rec.flags & FLAG_FINALE != 0 {
                p.aux[aux::SPARK_SPARKLE] = rec.sparkle;
                p.aux[aux::SPARK_PHASE] = rng.range(0.0, TAU);
                p.set_kind(ParticleKind::FinaleSpark);
            } else {
                p.set_kind(ParticleKind::Spark);
            }
        }
        tag::SMOKE_PUFF => {
            let wander = rng.unit_vector() * 0.3;
            p.velocity = (Vec3::from(rec.vector) + wander).to_array();
            p.lifetime = rec.lifetime * rng.range(LIFETIME_JITTER.0, LIFETIME_JITTER.1);
            p.size = rec.size * rng.range(SIZE_JITTER.0, SIZE_JITTER.1);
            p.aux[aux::SMOKE_GROWTH] = rec.speed;
            p.aux[aux::SMOKE_ALPHA] = rec.color[3];
            p.set_kind(ParticleKind::Smoke);
        }
        tag::SHELL_LAUNCH => {
            p.velocity = rec.vector;
            p.aux[aux::SHELL_FUSE] = rec.fuse;
            p.set_kind(ParticleKind::Shell);
        }
        tag::POP_FLASH => {
            p.aux[aux::POP_SIZE] = rec.size;
            p.set_kind(ParticleKind::PopFlash);
        }
        // Unknown tags leave the slot dead.
        _ => return Particle::DEAD,
    }
    p
}

fn spark(p: &mut Particle, rec: &SpawnRecord, dir: Vec3, rng: &mut ItemRng) {
    let speed = rec.speed * rng.range(SPEED_JITTER.0, SPEED_JITTER.1);
    p.velocity = (dir * speed).to_array();
    p.lifetime = rec.lifetime * rng.range(LIFETIME_JITTER.0, LIFETIME_JITTER.1);

    let roll = rng.next_f32();
    let delay = rng.range(CRACKLE_DELAY.0, CRACKLE_DELAY.1);
    if roll < rec.crackle {
        p.aux[aux::SPARK_CRACKLE_AT] = p.lifetime * delay;
        p.aux[aux::SPARK_FLASH] = CRACKLE_FLASH;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{ConeBurst, DirectionalBurst, PopFlash, ShellLaunch, SmokePuff, SpawnRequest};
    use bytemuck::bytes_of;

    fn encode(req: impl Into<SpawnRequest>) -> SpawnRecord {
        req.into().encode()
    }

    #[test]
    fn test_derivation_is_bit_identical() {
        let rec = encode(ConeBurst {
            count: 64,
            crackle: 0.5,
            sparkle: 8.0,
            finale: true,
            seed: 42,
            ..Default::default()
        });
        for item in 0..64 {
            let a = derive_particle(&rec, item, &[]);
            let b = derive_particle(&rec, item, &[]);
            assert_eq!(bytes_of(&a), bytes_of(&b));
        }
        assert_ne!(
            bytes_of(&derive_particle(&rec, 0, &[])),
            bytes_of(&derive_particle(&rec, 1, &[]))
        );
    }

    #[test]
    fn test_each_tag_spawns_its_kind() {
        let dirs = [[0.0, 1.0, 0.0, 0.0]];
        let cases = [
            (
                encode(DirectionalBurst { directions: vec![Vec3::Y], ..Default::default() }),
                ParticleKind::Spark,
            ),
            (encode(SmokePuff::default()), ParticleKind::Smoke),
            (encode(ShellLaunch::default()), ParticleKind::Shell),
            (encode(ConeBurst::default()), ParticleKind::Spark),
            (encode(ConeBurst { finale: true, ..Default::default() }), ParticleKind::FinaleSpark),
            (encode(PopFlash::default()), ParticleKind::PopFlash),
        ];
        for (rec, kind) in cases {
            let p = derive_particle(&rec, 0, &dirs);
            assert_eq!(p.kind(), kind);
            assert!(p.is_finite());
            assert!(p.lifetime > 0.0);
        }
    }

    #[test]
    fn test_directional_spark_follows_its_direction() {
        let rec = encode(DirectionalBurst {
            directions: vec![Vec3::X, -Vec3::Z],
            speed: 10.0,
            ..Default::default()
        });
        let dirs = [[1.0, 0.0, 0.0, 0.0], [0.0, 0.0, -1.0, 0.0]];
        let p = derive_particle(&rec, 1, &dirs);
        let v = Vec3::from(p.velocity);
        assert!(v.normalize().dot(-Vec3::Z) > 0.999);
        assert!((9.0..=11.0).contains(&v.length()));
    }

    #[test]
    fn test_crackle_probability_extremes() {
        let always = encode(ConeBurst { crackle: 1.0, ..Default::default() });
        let never = encode(ConeBurst { crackle: 0.0, ..Default::default() });
        for item in 0..32 {
            let p = derive_particle(&always, item, &[]);
            assert!(p.aux[aux::SPARK_CRACKLE_AT] > 0.0);
            assert!(p.aux[aux::SPARK_CRACKLE_AT] < p.lifetime);
            assert_eq!(derive_particle(&never, item, &[]).aux[aux::SPARK_CRACKLE_AT], 0.0);
        }
    }

    #[test]
    fn test_shell_carries_fuse() {
        let rec = encode(ShellLaunch { fuse: 1.75, ..Default::default() });
        let p = derive_particle(&rec, 0, &[]);
        assert_eq!(p.aux[aux::SHELL_FUSE], 1.75);
        assert_eq!(p.velocity, [0.0, 32.0, 0.0]);
    }
}
