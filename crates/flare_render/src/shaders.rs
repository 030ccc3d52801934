//! WGSL sources, assembled from a shared prelude plus one file per stage

/// Record definitions and helpers every source starts with.
pub const COMMON: &str = include_str!("shaders/common.wgsl");

pub const SPAWN: &str = concat!(
    include_str!("shaders/common.wgsl"),
    include_str!("shaders/rng.wgsl"),
    include_str!("shaders/spawn.wgsl"),
);

pub const UPDATE: &str = concat!(
    include_str!("shaders/common.wgsl"),
    include_str!("shaders/update.wgsl"),
);

/// Reset and draw-args entry points.
pub const FRAME: &str = concat!(
    include_str!("shaders/common.wgsl"),
    include_str!("shaders/frame.wgsl"),
);

pub const PARTICLES: &str = concat!(
    include_str!("shaders/common.wgsl"),
    include_str!("shaders/particles.wgsl"),
);

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(name: &str, source: &str) -> naga::Module {
        naga::front::wgsl::parse_str(source)
            .unwrap_or_else(|e| panic!("{name} failed to parse: {}", e.emit_to_string(source)))
    }

    fn f32_constant(module: &naga::Module, name: &str) -> f32 {
        let (_, constant) = module
            .constants
            .iter()
            .find(|(_, c)| c.name.as_deref() == Some(name))
            .unwrap_or_else(|| panic!("no const {name}"));
        match module.global_expressions[constant.init] {
            naga::Expression::Literal(naga::Literal::F32(value)) => value,
            ref other => panic!("{name} is not an f32 literal: {other:?}"),
        }
    }

    fn entry_points(module: &naga::Module) -> Vec<&str> {
        module.entry_points.iter().map(|ep| ep.name.as_str()).collect()
    }

    #[test]
    fn test_spawn_shader_parses() {
        let module = parse("spawn", SPAWN);
        assert_eq!(entry_points(&module), vec!["spawn_main"]);
    }

    #[test]
    fn test_update_shader_parses() {
        let module = parse("update", UPDATE);
        assert_eq!(entry_points(&module), vec!["update_main"]);
    }

    #[test]
    fn test_frame_shader_parses() {
        let module = parse("frame", FRAME);
        let names = entry_points(&module);
        assert!(names.contains(&"reset_main"));
        assert!(names.contains(&"build_args_main"));
    }

    #[test]
    fn test_particle_shader_parses() {
        let module = parse("particles", PARTICLES);
        let names = entry_points(&module);
        assert!(names.contains(&"vs_main"));
        assert!(names.contains(&"fs_main"));
    }

    #[test]
    fn test_kernel_constants_match_cpu_derivations() {
        use flare_core::kernel;

        let spawn = parse("spawn", SPAWN);
        assert_eq!(f32_constant(&spawn, "TAU"), std::f32::consts::TAU);
        assert_eq!(f32_constant(&spawn, "CRACKLE_FLASH"), kernel::CRACKLE_FLASH);
        for (name, (min, max)) in [
            ("SPEED_JITTER", kernel::SPEED_JITTER),
            ("LIFETIME_JITTER", kernel::LIFETIME_JITTER),
            ("SIZE_JITTER", kernel::SIZE_JITTER),
            ("CRACKLE_DELAY", kernel::CRACKLE_DELAY),
        ] {
            assert_eq!(f32_constant(&spawn, &format!("{name}_MIN")), min, "{name}");
            assert_eq!(f32_constant(&spawn, &format!("{name}_MAX")), max, "{name}");
        }

        let update = parse("update", UPDATE);
        assert_eq!(
            f32_constant(&update, "SHELL_SMOKE_LIFETIME"),
            kernel::SHELL_SMOKE_LIFETIME
        );
    }

    #[test]
    fn test_particle_struct_is_80_bytes() {
        let module = parse("common", COMMON);
        let particle = module
            .types
            .iter()
            .find(|(_, ty)| ty.name.as_deref() == Some("Particle"))
            .map(|(_, ty)| ty.inner.clone())
            .expect("Particle struct");
        match particle {
            naga::TypeInner::Struct { span, .. } => {
                assert_eq!(span as usize, std::mem::size_of::<flare_core::Particle>())
            }
            other => panic!("unexpected type {other:?}"),
        }
    }
}
