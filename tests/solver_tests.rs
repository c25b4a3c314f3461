mod common;

use common::{assert_all_near, fill, full, registry, test_gpu};
use glam::Vec3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use stable_fluid::config::FluidConfig;
use stable_fluid::core::{FluidError, RenderError};
use stable_fluid::platform::{InputEvent, KeyCode};
use stable_fluid::render::double_field::DoubleField;
use stable_fluid::render::field::{Field, FieldChannels, FieldFormat, Precision};
use stable_fluid::render::kernels::{KernelId, KernelPass, TexelUniforms};
use stable_fluid::simulation::{FieldLayout, FluidSimulation, SimulationState, Solver, Splat};

fn layout() -> FieldLayout {
    FieldLayout {
        sim: (32, 32),
        dye: (64, 64),
        precision: Precision::Full,
    }
}

fn small_config() -> FluidConfig {
    let mut config = FluidConfig::default();
    config.simulation.sim_resolution = 32;
    config.simulation.dye_resolution = 64;
    config.simulation.half_float = false;
    config.bloom.resolution = 64;
    config.sunrays.resolution = 64;
    config
}

#[test]
fn test_divergence_of_still_fluid_is_zero() {
    let Some(gpu) = test_gpu() else { return };
    let mut kernels = registry(&gpu);
    let mut solver = Solver::new(SimulationState::new(&gpu, layout()));

    let mut encoder = gpu.create_encoder("test");
    solver
        .compute_divergence(&gpu, &mut kernels, &mut encoder)
        .unwrap();
    gpu.submit_and_wait(encoder);

    let divergence = solver.state().divergence.read_f32(&gpu).unwrap();
    assert_eq!(divergence.len(), 32 * 32);
    assert_all_near(&divergence, 0.0, 1e-6);
}

#[test]
fn test_uniform_flow_has_no_divergence_at_edges() {
    let Some(gpu) = test_gpu() else { return };
    let mut kernels = registry(&gpu);
    let mut solver = Solver::new(SimulationState::new(&gpu, layout()));
    fill(&gpu, solver.state().velocity.read(), &[1.0, 0.5]);

    let mut encoder = gpu.create_encoder("test");
    solver
        .compute_divergence(&gpu, &mut kernels, &mut encoder)
        .unwrap();
    gpu.submit_and_wait(encoder);

    // 边界列和边界行也必须为零
    let divergence = solver.state().divergence.read_f32(&gpu).unwrap();
    assert_all_near(&divergence, 0.0, 1e-5);
}

#[test]
fn test_uniform_pressure_is_a_jacobi_fixed_point() {
    let Some(gpu) = test_gpu() else { return };
    let mut kernels = registry(&gpu);
    let mut solver = Solver::new(SimulationState::new(&gpu, layout()));
    fill(&gpu, solver.state().pressure.read(), &[0.5]);

    let mut encoder = gpu.create_encoder("test");
    solver
        .solve_pressure(&gpu, &mut kernels, &mut encoder, 1.0, 10)
        .unwrap();
    gpu.submit_and_wait(encoder);

    let pressure = solver.state().pressure.read().read_f32(&gpu).unwrap();
    assert_all_near(&pressure, 0.5, 1e-4);
}

#[test]
fn test_splat_falls_off_from_center() {
    let Some(gpu) = test_gpu() else { return };
    let mut kernels = registry(&gpu);
    let mut solver = Solver::new(SimulationState::new(&gpu, layout()));

    let splat = Splat::new(0.5, 0.5, 0.0, 0.0, Vec3::new(1.0, 0.0, 0.0));
    let mut encoder = gpu.create_encoder("test");
    solver
        .splat(&gpu, &mut kernels, &mut encoder, &splat, 0.25, 1.0)
        .unwrap();
    gpu.submit_and_wait(encoder);

    let dye = solver.state().dye.read().read_f32(&gpu).unwrap();
    let red = |x: usize, y: usize| dye[(y * 64 + x) * 4];

    assert!(red(32, 32) > 0.9, "center {}", red(32, 32));
    assert!(red(0, 0) < 1e-3, "corner {}", red(0, 0));
    for x in 32..63 {
        assert!(red(x, 32) + 1e-4 >= red(x + 1, 32));
    }
}

#[test]
fn test_splat_velocity_falls_off_from_center() {
    let Some(gpu) = test_gpu() else { return };
    let mut kernels = registry(&gpu);
    let mut solver = Solver::new(SimulationState::new(&gpu, layout()));

    let splat = Splat::new(0.5, 0.5, 100.0, 0.0, Vec3::new(1.0, 1.0, 1.0));
    let mut encoder = gpu.create_encoder("test");
    solver
        .splat(&gpu, &mut kernels, &mut encoder, &splat, 0.25, 1.0)
        .unwrap();
    gpu.submit_and_wait(encoder);

    let velocity = solver.state().velocity.read().read_f32(&gpu).unwrap();
    let speed = |x: usize, y: usize| {
        let i = (y * 32 + x) * 2;
        velocity[i].hypot(velocity[i + 1])
    };

    assert!(speed(16, 16) > 50.0, "center {}", speed(16, 16));
    assert!(speed(0, 0) < 1e-2, "corner {}", speed(0, 0));
    for x in 16..31 {
        assert!(
            speed(x, 16) + 1e-3 >= speed(x + 1, 16),
            "speed rises at {}: {} -> {}",
            x,
            speed(x, 16),
            speed(x + 1, 16)
        );
    }
}

#[test]
fn test_resize_preserves_contents() {
    let Some(gpu) = test_gpu() else { return };
    let mut kernels = registry(&gpu);
    let mut velocity = DoubleField::new(&gpu, "velocity", 16, 16, full(FieldChannels::Vector2));
    fill(&gpu, velocity.read(), &[0.3, -0.2]);
    assert_eq!(velocity.texel_size_x(), 1.0 / 16.0);
    assert_eq!(velocity.texel_size_y(), 1.0 / 16.0);

    velocity.resize(&gpu, &mut kernels, 40, 24).unwrap();
    assert_eq!((velocity.width(), velocity.height()), (40, 24));
    assert_eq!(velocity.write().width(), 40);
    assert_eq!(velocity.texel_size_x(), 1.0 / 40.0);
    assert_eq!(velocity.texel_size_y(), 1.0 / 24.0);

    let data = velocity.read().read_f32(&gpu).unwrap();
    let corners = [0, 39, 40 * 23, 40 * 24 - 1];
    for texel in corners {
        assert!((data[texel * 2] - 0.3).abs() < 1e-4);
        assert!((data[texel * 2 + 1] + 0.2).abs() < 1e-4);
    }
}

#[test]
fn test_double_field_halves_must_match() {
    let Some(gpu) = test_gpu() else { return };
    let format = full(FieldChannels::Vector2);

    let pair = DoubleField::from_fields(
        Field::new(&gpu, "a", 16, 8, format),
        Field::new(&gpu, "b", 16, 8, format),
    )
    .unwrap();
    assert_eq!((pair.width(), pair.height()), (16, 8));

    let result = DoubleField::from_fields(
        Field::new(&gpu, "a", 16, 8, format),
        Field::new(&gpu, "b", 8, 8, format),
    );
    assert!(matches!(result, Err(RenderError::InvalidState(_))));

    let result = DoubleField::from_fields(
        Field::new(&gpu, "a", 16, 8, format),
        Field::new(&gpu, "b", 16, 8, full(FieldChannels::Scalar)),
    );
    assert!(matches!(result, Err(RenderError::InvalidState(_))));
}

#[test]
fn test_unbound_slot_is_rejected() {
    let Some(gpu) = test_gpu() else { return };
    let mut kernels = registry(&gpu);
    let target = Field::new(&gpu, "curl", 8, 8, full(FieldChannels::Scalar));

    let pass = KernelPass::new(KernelId::Curl)
        .uniforms(&TexelUniforms::new(target.texel_size()))
        .unwrap();
    let mut encoder = gpu.create_encoder("test");
    let result = kernels.draw(&gpu, &mut encoder, pass, target.target());
    assert!(matches!(result, Err(FluidError::UnboundSlot { .. })));
}

#[test]
fn test_reading_and_writing_same_field_is_rejected() {
    let Some(gpu) = test_gpu() else { return };
    let mut kernels = registry(&gpu);
    let field = Field::new(&gpu, "source", 8, 8, full(FieldChannels::Vector4));

    let pass = KernelPass::new(KernelId::Copy).bind("u_source", &field).unwrap();
    let mut encoder = gpu.create_encoder("test");
    let result = kernels.draw(&gpu, &mut encoder, pass, field.target());
    assert!(matches!(result, Err(FluidError::Render(_))));
}

#[test]
fn test_manual_splat_drives_velocity() {
    let Some(gpu) = test_gpu() else { return };
    let mut simulation =
        FluidSimulation::with_rng(&gpu, small_config(), (64, 64), StdRng::seed_from_u64(7))
            .unwrap();
    simulation.clear_pending_splats();
    simulation.push_input(InputEvent::KeyPressed { key: KeyCode::T });

    let screen = Field::new(&gpu, "screen", 64, 64, FieldFormat::BLOOM);
    simulation.tick(&gpu, screen.target(), 1.0 / 60.0).unwrap();
    gpu.device.poll(wgpu::Maintain::Wait);

    let velocity = simulation.state().velocity.read().read_f32(&gpu).unwrap();
    let peak = velocity.iter().fold(0.0f32, |m, v| m.max(v.abs()));
    assert!(peak > 1.0, "peak velocity {}", peak);

    // 染料集中在画面中央，边缘几乎为零
    let dye = simulation.state().dye.read().read_f32(&gpu).unwrap();
    let red = |x: usize, y: usize| dye[(y * 64 + x) * 4];
    let mut center = 0.0f32;
    let mut border = 0.0f32;
    for y in 0..64 {
        for x in 0..64 {
            if (16..48).contains(&x) && (16..48).contains(&y) {
                center = center.max(red(x, y));
            } else if x == 0 || y == 0 || x == 63 || y == 63 {
                border = border.max(red(x, y));
            }
        }
    }
    assert!(center > 0.1, "center {}", center);
    assert!(border < 1e-2, "border {}", border);
}

#[test]
fn test_stepping_pauses_after_one_tick() {
    let Some(gpu) = test_gpu() else { return };
    let mut config = small_config();
    config.simulation.stepping = true;
    let mut simulation =
        FluidSimulation::with_rng(&gpu, config, (64, 64), StdRng::seed_from_u64(1)).unwrap();
    assert!(!simulation.control().paused);

    let screen = Field::new(&gpu, "screen", 64, 64, FieldFormat::BLOOM);
    simulation.tick(&gpu, screen.target(), 1.0 / 60.0).unwrap();
    assert!(simulation.control().paused);

    simulation.push_input(InputEvent::KeyPressed { key: KeyCode::N });
    simulation.tick(&gpu, screen.target(), 1.0 / 60.0).unwrap();
    assert!(simulation.control().paused);
    assert!(simulation.control().stepping);

    simulation.push_input(InputEvent::KeyPressed { key: KeyCode::P });
    simulation.tick(&gpu, screen.target(), 1.0 / 60.0).unwrap();
    assert!(!simulation.control().paused);
    assert!(!simulation.control().stepping);
}

#[test]
fn test_config_update_keeps_pause_state() {
    let Some(gpu) = test_gpu() else { return };
    let mut simulation =
        FluidSimulation::with_rng(&gpu, small_config(), (64, 64), StdRng::seed_from_u64(9))
            .unwrap();
    let screen = Field::new(&gpu, "screen", 64, 64, FieldFormat::BLOOM);

    simulation.push_input(InputEvent::KeyPressed { key: KeyCode::P });
    simulation.tick(&gpu, screen.target(), 1.0 / 60.0).unwrap();
    assert!(simulation.control().paused);

    let mut config = small_config();
    config.simulation.sim_resolution = 64;
    config.simulation.paused = false;
    simulation.update_config(config).unwrap();
    simulation.tick(&gpu, screen.target(), 1.0 / 60.0).unwrap();

    assert!(simulation.control().paused);
    assert_eq!(simulation.state().layout().sim, (64, 64));
}

#[test]
fn test_resize_viewport_applies_on_next_tick() {
    let Some(gpu) = test_gpu() else { return };
    let mut simulation =
        FluidSimulation::with_rng(&gpu, small_config(), (64, 64), StdRng::seed_from_u64(3))
            .unwrap();
    simulation.clear_pending_splats();
    simulation.resize_viewport(128, 64);
    assert!(simulation.is_dirty());
    assert_eq!(simulation.state().layout().sim, (32, 32));

    let screen = Field::new(&gpu, "screen", 128, 64, FieldFormat::BLOOM);
    simulation.tick(&gpu, screen.target(), 1.0 / 60.0).unwrap();
    assert!(!simulation.is_dirty());
    assert_eq!(simulation.state().layout().sim, (64, 32));
    assert_eq!(simulation.state().layout().dye, (128, 64));
}

#[test]
fn test_capture_matches_dye_size() {
    let Some(gpu) = test_gpu() else { return };
    let simulation =
        FluidSimulation::with_rng(&gpu, small_config(), (64, 64), StdRng::seed_from_u64(5))
            .unwrap();
    let image = simulation.capture(&gpu).unwrap();
    assert_eq!(image.dimensions(), (64, 64));
}
