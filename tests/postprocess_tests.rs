mod common;

use common::{assert_all_near, fill, full, registry, test_gpu};
use stable_fluid::config::{BloomConfig, SunraysConfig};
use stable_fluid::render::double_field::DoubleField;
use stable_fluid::render::field::{Field, FieldChannels, Precision};
use stable_fluid::render::gpu::GpuContext;
use stable_fluid::render::kernels::KernelRegistry;
use stable_fluid::render::postprocess::{Bloom, Sunrays};

fn run_bloom(gpu: &GpuContext, kernels: &mut KernelRegistry, brightness: f32) -> Vec<f32> {
    let dye = Field::new(gpu, "dye", 64, 64, full(FieldChannels::Vector4));
    fill(gpu, &dye, &[brightness, brightness, brightness, 1.0]);
    let bloom = Bloom::new(gpu, 64, 64, 8);
    assert!(bloom.chain_len() >= 2);

    let mut encoder = gpu.create_encoder("test");
    bloom
        .apply(gpu, kernels, &mut encoder, &dye, &BloomConfig::default())
        .unwrap();
    gpu.submit_and_wait(encoder);
    bloom.field().read_f32(gpu).unwrap()
}

fn run_sunrays(gpu: &GpuContext, kernels: &mut KernelRegistry, brightness: f32) -> f32 {
    let dye = DoubleField::new(gpu, "dye", 32, 32, full(FieldChannels::Vector4));
    fill(gpu, dye.read(), &[brightness, brightness, brightness, 1.0]);
    let sunrays = Sunrays::new(gpu, 32, 32, Precision::Full);

    let mut encoder = gpu.create_encoder("test");
    sunrays
        .apply(gpu, kernels, &mut encoder, &dye, &SunraysConfig::default())
        .unwrap();
    gpu.submit_and_wait(encoder);

    let rays = sunrays.field().read_f32(gpu).unwrap();
    assert!(rays.iter().all(|v| v.is_finite()));
    rays.iter().sum::<f32>() / rays.len() as f32
}

#[test]
fn test_dim_dye_produces_no_bloom() {
    let Some(gpu) = test_gpu() else { return };
    let mut kernels = registry(&gpu);
    let bloom = run_bloom(&gpu, &mut kernels, 0.1);
    assert_all_near(&bloom, 0.0, 1e-3);
}

#[test]
fn test_bright_dye_blooms() {
    let Some(gpu) = test_gpu() else { return };
    let mut kernels = registry(&gpu);
    let bloom = run_bloom(&gpu, &mut kernels, 2.0);
    assert!(bloom.chunks_exact(4).any(|texel| texel[0] > 0.01));
}

#[test]
fn test_dye_occludes_sunrays() {
    let Some(gpu) = test_gpu() else { return };
    let mut kernels = registry(&gpu);
    let empty = run_sunrays(&gpu, &mut kernels, 0.0);
    let covered = run_sunrays(&gpu, &mut kernels, 1.0);
    assert!(empty > covered, "empty {} covered {}", empty, covered);
}

#[test]
fn test_sunrays_leave_dye_roles_unchanged() {
    let Some(gpu) = test_gpu() else { return };
    let mut kernels = registry(&gpu);
    let dye = DoubleField::new(&gpu, "dye", 16, 16, full(FieldChannels::Vector4));
    fill(&gpu, dye.read(), &[0.25, 0.5, 0.75, 1.0]);
    let read_id = dye.read().id();
    let sunrays = Sunrays::new(&gpu, 16, 16, Precision::Full);

    let mut encoder = gpu.create_encoder("test");
    sunrays
        .apply(&gpu, &mut kernels, &mut encoder, &dye, &SunraysConfig::default())
        .unwrap();
    gpu.submit_and_wait(encoder);

    assert_eq!(dye.read().id(), read_id);
    let data = dye.read().read_f32(&gpu).unwrap();
    for texel in data.chunks_exact(4) {
        assert!((texel[1] - 0.5).abs() < 1e-4);
    }
}
