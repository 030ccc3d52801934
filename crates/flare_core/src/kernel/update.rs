use super::SHELL_SMOKE_LIFETIME;
use crate::kind::ParticleKind;
use crate::particle::{aux, Particle, SimParams};
use glam::Vec3;
use std::f32::consts::TAU;

/// What one update invocation did to its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Slot was dead on entry.
    Skipped,
    /// Slot was live on entry and is dead now.
    Expired,
    /// Slot is live; `kind` is the kind whose list it appends to.
    Survived { kind: ParticleKind, detonated: bool },
}

/// Fraction of gravity each kind feels. Smoke is buoyant.
pub fn gravity_scale(kind: ParticleKind) -> f32 {
    match kind {
        ParticleKind::Smoke => -0.15,
        ParticleKind::Crackle | ParticleKind::PopFlash | ParticleKind::Dead => 0.0,
        ParticleKind::Shell | ParticleKind::Spark | ParticleKind::FinaleSpark => 1.0,
    }
}

/// Advance one slot by `params.dt`.
///
/// Termination is checked before any kind transition, so a particle whose
/// lifetime ran out this frame never detonates or crackles.
pub fn step_particle(p: &mut Particle, params: &SimParams) -> StepOutcome {
    let kind = match ParticleKind::from_u32(p.kind) {
        Some(ParticleKind::Dead) => return StepOutcome::Skipped,
        Some(kind) => kind,
        None => {
            p.set_kind(ParticleKind::Dead);
            return StepOutcome::Skipped;
        }
    };

    let dt = params.dt;
    let mut velocity = Vec3::from(p.velocity);
    velocity += Vec3::from(params.gravity) * gravity_scale(kind) * dt;
    velocity *= (-p.drag * dt).exp();
    let position = Vec3::from(p.position) + velocity * dt;
    p.velocity = velocity.to_array();
    p.position = position.to_array();
    p.age += dt;

    if !p.is_finite() || p.age >= p.lifetime || position.y < params.ground_y {
        p.set_kind(ParticleKind::Dead);
        return StepOutcome::Expired;
    }

    let t = p.age / p.lifetime;
    let mut next = kind;
    let mut detonated = false;

    match kind {
        ParticleKind::Shell => {
            p.color[3] = 1.0;
            if p.age >= p.aux[aux::SHELL_FUSE] || velocity.y <= 0.0 {
                detonate(p);
                next = ParticleKind::Smoke;
                detonated = true;
            }
        }
        ParticleKind::Spark | ParticleKind::FinaleSpark => {
            let crackle_at = p.aux[aux::SPARK_CRACKLE_AT];
            if crackle_at > 0.0 && p.age >= crackle_at {
                crackle(p);
                next = ParticleKind::Crackle;
            } else if kind == ParticleKind::FinaleSpark {
                let phase = TAU * p.aux[aux::SPARK_SPARKLE] * params.time + p.aux[aux::SPARK_PHASE];
                p.color[3] = (1.0 - t) * (0.55 + 0.45 * phase.sin());
            } else {
                p.color[3] = 1.0 - t * t;
            }
        }
        ParticleKind::Smoke => {
            p.size += p.aux[aux::SMOKE_GROWTH] * dt;
            p.color[3] = p.aux[aux::SMOKE_ALPHA] * (1.0 - t);
        }
        ParticleKind::Crackle => {
            let flash = p.aux[aux::CRACKLE_FLASH].max(1e-4);
            let since = p.age - p.aux[aux::CRACKLE_START];
            p.color[3] = (1.0 - since / flash).clamp(0.0, 1.0);
        }
        ParticleKind::PopFlash => {
            p.size = p.aux[aux::POP_SIZE] * (1.0 + t);
            p.color[3] = 1.0 - t;
        }
        ParticleKind::Dead => {}
    }

    if next != kind {
        p.set_kind(next);
    }
    StepOutcome::Survived {
        kind: next,
        detonated,
    }
}

/// Shell bursts: what is left behind is a slow, growing smoke puff.
fn detonate(p: &mut Particle) {
    let v = Vec3::from(p.velocity) * 0.1;
    p.velocity = v.to_array();
    p.lifetime = p.lifetime.min(p.age + SHELL_SMOKE_LIFETIME);
    p.size *= 4.0;
    p.drag = p.drag.max(0.8);
    p.color = [0.3, 0.3, 0.3, 0.3];
    p.aux = [0.0; 4];
    p.aux[aux::SMOKE_GROWTH] = 0.8;
    p.aux[aux::SMOKE_ALPHA] = 0.3;
}

fn crackle(p: &mut Particle) {
    let flash = p.aux[aux::SPARK_FLASH];
    p.lifetime = p.lifetime.min(p.age + flash);
    p.velocity = (Vec3::from(p.velocity) * 0.2).to_array();
    p.size *= 2.5;
    p.color = [1.0, 1.0, 0.95, 1.0];
    p.aux = [0.0; 4];
    p.aux[aux::CRACKLE_START] = p.age;
    p.aux[aux::CRACKLE_FLASH] = flash;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(dt: f32) -> SimParams {
        SimParams {
            gravity: [0.0, -9.81, 0.0],
            dt,
            ground_y: -100.0,
            ..Default::default()
        }
    }

    fn live(kind: ParticleKind) -> Particle {
        let mut p = Particle {
            position: [0.0, 10.0, 0.0],
            velocity: [0.0, 1.0, 0.0],
            color: [1.0; 4],
            lifetime: 2.0,
            size: 0.1,
            ..Particle::DEAD
        };
        p.set_kind(kind);
        p
    }

    #[test]
    fn test_dead_slots_are_untouched() {
        let mut p = Particle::DEAD;
        assert_eq!(step_particle(&mut p, &params(0.016)), StepOutcome::Skipped);
        assert_eq!(p, Particle::DEAD);
    }

    #[test]
    fn test_invalid_kind_is_freed() {
        let mut p = Particle { kind: 42, ..live(ParticleKind::Spark) };
        assert_eq!(step_particle(&mut p, &params(0.016)), StepOutcome::Skipped);
        assert_eq!(p.kind, 0);
    }

    #[test]
    fn test_expiry_by_age() {
        let mut p = live(ParticleKind::Spark);
        p.age = 1.99;
        assert_eq!(step_particle(&mut p, &params(0.02)), StepOutcome::Expired);
        assert_eq!(p.kind(), ParticleKind::Dead);
    }

    #[test]
    fn test_ground_contact_kills() {
        let mut p = live(ParticleKind::Spark);
        p.position = [0.0, 0.001, 0.0];
        p.velocity = [0.0, -5.0, 0.0];
        let mut sim = params(0.016);
        sim.ground_y = 0.0;
        assert_eq!(step_particle(&mut p, &sim), StepOutcome::Expired);
    }

    #[test]
    fn test_non_finite_state_kills() {
        let mut p = live(ParticleKind::Smoke);
        p.velocity = [f32::NAN, 0.0, 0.0];
        assert_eq!(step_particle(&mut p, &params(0.016)), StepOutcome::Expired);
        assert_eq!(p.kind(), ParticleKind::Dead);
    }

    #[test]
    fn test_shell_detonates_at_fuse() {
        let mut p = live(ParticleKind::Shell);
        p.velocity = [0.0, 30.0, 0.0];
        p.lifetime = 6.0;
        p.aux[aux::SHELL_FUSE] = 0.05;
        let out = step_particle(&mut p, &params(0.016));
        assert_eq!(
            out,
            StepOutcome::Survived { kind: ParticleKind::Shell, detonated: false }
        );

        let mut fired = false;
        for _ in 0..4 {
            if let StepOutcome::Survived { kind, detonated: true } = step_particle(&mut p, &params(0.016)) {
                assert_eq!(kind, ParticleKind::Smoke);
                fired = true;
                break;
            }
        }
        assert!(fired);
        assert_eq!(p.kind(), ParticleKind::Smoke);
        assert!(p.lifetime <= 6.0);
    }

    #[test]
    fn test_shell_detonates_at_apex() {
        let mut p = live(ParticleKind::Shell);
        p.velocity = [0.0, 0.05, 0.0];
        p.lifetime = 6.0;
        p.aux[aux::SHELL_FUSE] = 5.0;
        let out = step_particle(&mut p, &params(0.016));
        assert!(matches!(out, StepOutcome::Survived { detonated: true, .. }));
    }

    #[test]
    fn test_crackle_shortens_lifetime() {
        let mut p = live(ParticleKind::FinaleSpark);
        p.lifetime = 3.0;
        p.aux[aux::SPARK_CRACKLE_AT] = 0.01;
        p.aux[aux::SPARK_FLASH] = 0.12;
        let out = step_particle(&mut p, &params(0.016));
        assert_eq!(
            out,
            StepOutcome::Survived { kind: ParticleKind::Crackle, detonated: false }
        );
        assert!(p.lifetime <= p.age + 0.12 + f32::EPSILON);
    }
}
