//! Bloom（辉光）后处理效果
//!
//! ## 算法流程
//! 1. 亮度提取：软膝曲线从染料中提取高亮部分，写入基准缓冲区
//! 2. 降采样：沿 mip 链逐级 4-tap 平均，扩大模糊范围
//! 3. 升采样：从最小一级开始逐级加法混合回上一级
//! 4. 合成：按强度写回基准缓冲区，供显示内核采样

use crate::config::BloomConfig;
use crate::core::error::FluidResult;
use crate::render::field::{Field, FieldFormat};
use crate::render::gpu::GpuContext;
use crate::render::kernels::{
    BlendMode, BloomFinalUniforms, BloomPrefilterUniforms, KernelId, KernelPass, KernelRegistry,
    TexelUniforms,
};

/// 软膝阈值曲线
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BloomCurve {
    pub threshold: f32,
    /// (threshold - knee, 2 * knee, 0.25 / knee)
    pub curve: [f32; 3],
}

impl BloomCurve {
    pub fn new(threshold: f32, soft_knee: f32) -> Self {
        let knee = threshold * soft_knee + 0.0001;
        Self {
            threshold,
            curve: [threshold - knee, knee * 2.0, 0.25 / knee],
        }
    }

    fn uniforms(&self) -> BloomPrefilterUniforms {
        BloomPrefilterUniforms {
            curve: self.curve,
            threshold: self.threshold,
        }
    }
}

/// mip 链各级尺寸：每级减半，任一边小于 2 时停止
pub fn bloom_chain_sizes(width: u32, height: u32, iterations: u32) -> Vec<(u32, u32)> {
    (0..iterations.min(31))
        .map(|i| (width >> (i + 1), height >> (i + 1)))
        .take_while(|(w, h)| *w >= 2 && *h >= 2)
        .collect()
}

/// Bloom 缓冲区
pub struct Bloom {
    base: Field,
    chain: Vec<Field>,
}

impl Bloom {
    pub fn new(gpu: &GpuContext, width: u32, height: u32, iterations: u32) -> Self {
        let base = Field::new(gpu, "bloom", width, height, FieldFormat::BLOOM);
        let chain = bloom_chain_sizes(width, height, iterations)
            .into_iter()
            .enumerate()
            .map(|(i, (w, h))| Field::new(gpu, &format!("bloom mip {}", i), w, h, FieldFormat::BLOOM))
            .collect::<Vec<_>>();

        tracing::debug!(
            target: "fluid",
            "Bloom buffers {}x{} with {} mip levels",
            width,
            height,
            chain.len()
        );

        Self { base, chain }
    }

    /// 合成用的 Bloom 结果
    pub fn field(&self) -> &Field {
        &self.base
    }

    pub fn chain_len(&self) -> usize {
        self.chain.len()
    }

    /// 链长度不足 2 级时跳过，基准缓冲区保持原内容
    pub fn apply(
        &self,
        gpu: &GpuContext,
        kernels: &mut KernelRegistry,
        encoder: &mut wgpu::CommandEncoder,
        source: &Field,
        config: &BloomConfig,
    ) -> FluidResult<()> {
        if self.chain.len() < 2 {
            return Ok(());
        }

        let curve = BloomCurve::new(config.threshold, config.soft_knee);
        let pass = KernelPass::new(KernelId::BloomPrefilter)
            .bind("u_source", source)?
            .uniforms(&curve.uniforms())?;
        kernels.draw(gpu, encoder, pass, self.base.target())?;

        let mut last = &self.base;
        for dest in &self.chain {
            let pass = KernelPass::new(KernelId::BloomBlur)
                .bind("u_source", last)?
                .uniforms(&TexelUniforms::new(last.texel_size()))?;
            kernels.draw(gpu, encoder, pass, dest.target())?;
            last = dest;
        }

        for dest in self.chain.iter().rev().skip(1) {
            let pass = KernelPass::new(KernelId::BloomBlur)
                .bind("u_source", last)?
                .uniforms(&TexelUniforms::new(last.texel_size()))?
                .blend(BlendMode::Additive);
            kernels.draw(gpu, encoder, pass, dest.target())?;
            last = dest;
        }

        let pass = KernelPass::new(KernelId::BloomFinal)
            .bind("u_source", last)?
            .uniforms(&BloomFinalUniforms {
                texel_size: last.texel_size().to_array(),
                intensity: config.intensity,
                _pad: 0.0,
            })?;
        kernels.draw(gpu, encoder, pass, self.base.target())
    }
}
