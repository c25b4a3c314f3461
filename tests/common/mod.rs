//! GPU 集成测试公共工具

#![allow(dead_code)]

use stable_fluid::render::field::{Field, FieldChannels, FieldFormat, Precision};
use stable_fluid::render::gpu::GpuContext;
use stable_fluid::render::kernels::KernelRegistry;

/// 创建无窗口 GPU 上下文；没有适配器时打印提示并返回 `None`
pub fn test_gpu() -> Option<GpuContext> {
    match GpuContext::headless() {
        Ok(gpu) => Some(gpu),
        Err(e) => {
            eprintln!("skipping GPU test: {}", e);
            None
        }
    }
}

pub fn registry(gpu: &GpuContext) -> KernelRegistry {
    KernelRegistry::new(gpu, gpu.capabilities.float32_filterable).expect("kernels should compile")
}

pub fn full(channels: FieldChannels) -> FieldFormat {
    FieldFormat::new(channels, Precision::Full)
}

/// 用常量填满一张场
pub fn fill(gpu: &GpuContext, field: &Field, texel: &[f32]) {
    let data: Vec<f32> = (0..field.shape().texel_count())
        .flat_map(|_| texel.iter().copied())
        .collect();
    field.write_all(gpu, &data).expect("upload should succeed");
}

pub fn assert_all_near(values: &[f32], expected: f32, tolerance: f32) {
    for (i, v) in values.iter().enumerate() {
        assert!(
            (v - expected).abs() <= tolerance,
            "value {} at {} differs from {}",
            v,
            i,
            expected
        );
    }
}
