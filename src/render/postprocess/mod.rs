//! 后处理管线模块
//!
//! 在染料场之上生成两张辅助图，供最终合成采样：
//! - Bloom（辉光）：mip 链降采样 + 加法升采样
//! - Sunrays（体积光）：亮度遮罩 + 径向累积 + 可分离模糊
//!
//! 两组缓冲区总是分配，即使效果被关闭，以便显示内核的绑定保持完整。
//! 基准分辨率变化时整体销毁重建，从不原地缩放。

pub mod bloom;
pub mod sunrays;

pub use bloom::{bloom_chain_sizes, Bloom, BloomCurve};
pub use sunrays::Sunrays;

use crate::config::{get_resolution, FluidConfig};
use crate::core::error::FluidResult;
use crate::render::double_field::DoubleField;
use crate::render::field::Precision;
use crate::render::gpu::GpuContext;
use crate::render::kernels::KernelRegistry;

/// 后处理缓冲区的尺寸参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PostProcessLayout {
    bloom: (u32, u32),
    bloom_iterations: u32,
    sunrays: (u32, u32),
    precision: Precision,
}

impl PostProcessLayout {
    fn new(config: &FluidConfig, viewport: (u32, u32), precision: Precision) -> Self {
        Self {
            bloom: get_resolution(config.bloom.resolution, viewport.0, viewport.1),
            bloom_iterations: config.bloom.iterations,
            sunrays: get_resolution(config.sunrays.resolution, viewport.0, viewport.1),
            precision,
        }
    }
}

/// 后处理管线
pub struct PostProcess {
    pub bloom: Bloom,
    pub sunrays: Sunrays,
    layout: PostProcessLayout,
}

impl PostProcess {
    pub fn new(
        gpu: &GpuContext,
        config: &FluidConfig,
        viewport: (u32, u32),
        precision: Precision,
    ) -> Self {
        let layout = PostProcessLayout::new(config, viewport, precision);
        Self::with_layout(gpu, layout)
    }

    fn with_layout(gpu: &GpuContext, layout: PostProcessLayout) -> Self {
        Self {
            bloom: Bloom::new(gpu, layout.bloom.0, layout.bloom.1, layout.bloom_iterations),
            sunrays: Sunrays::new(gpu, layout.sunrays.0, layout.sunrays.1, layout.precision),
            layout,
        }
    }

    /// 视口或配置变化后按需重建
    pub fn rebuild(
        &mut self,
        gpu: &GpuContext,
        config: &FluidConfig,
        viewport: (u32, u32),
        precision: Precision,
    ) {
        let layout = PostProcessLayout::new(config, viewport, precision);
        if layout != self.layout {
            *self = Self::with_layout(gpu, layout);
        }
    }

    /// 对当前染料执行已启用的效果
    pub fn apply(
        &self,
        gpu: &GpuContext,
        kernels: &mut KernelRegistry,
        encoder: &mut wgpu::CommandEncoder,
        dye: &DoubleField,
        config: &FluidConfig,
    ) -> FluidResult<()> {
        if config.bloom.enabled {
            self.bloom
                .apply(gpu, kernels, encoder, dye.read(), &config.bloom)?;
        }
        if config.sunrays.enabled {
            self.sunrays.apply(gpu, kernels, encoder, dye, &config.sunrays)?;
        }
        Ok(())
    }
}
