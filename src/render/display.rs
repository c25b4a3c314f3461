//! 最终合成
//!
//! 原始模式（包括染料）直接把所选场的 Read 半 blit 到目标；合成模式走完整合成：
//! 先用背景色清屏，再以 `ONE + ONE_MINUS_SRC_ALPHA` 混合染料、Bloom 与 Sunrays。

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::FluidConfig;
use crate::core::error::FluidResult;
use crate::render::field::{Field, FieldChannels, FieldFormat, Precision, RenderTarget};
use crate::render::gpu::GpuContext;
use crate::render::kernels::{
    BlendMode, DisplayUniforms, KernelFeatures, KernelId, KernelPass, KernelRegistry,
};
use crate::render::postprocess::PostProcess;
use crate::simulation::state::SimulationState;

/// 抖动纹理边长
const DITHER_SIZE: u32 = 64;
const DITHER_SEED: u64 = 0x5EED_F1D0;

/// 可视化模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Composite,
    Dye,
    Velocity,
    Pressure,
    Divergence,
    Curl,
}

impl DisplayMode {
    pub const ALL: [DisplayMode; 6] = [
        DisplayMode::Composite,
        DisplayMode::Dye,
        DisplayMode::Velocity,
        DisplayMode::Pressure,
        DisplayMode::Divergence,
        DisplayMode::Curl,
    ];

    /// 数字键 1..6 对应的模式
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// 是否需要后处理结果
    pub fn uses_post_process(self) -> bool {
        self == DisplayMode::Composite
    }
}

/// 显示合成器
pub struct Display {
    dither: Field,
}

impl Display {
    pub fn new(gpu: &GpuContext) -> FluidResult<Self> {
        let dither = Field::new(
            gpu,
            "dither",
            DITHER_SIZE,
            DITHER_SIZE,
            FieldFormat::new(FieldChannels::Scalar, Precision::Half),
        );
        let mut rng = StdRng::seed_from_u64(DITHER_SEED);
        let noise: Vec<f32> = (0..DITHER_SIZE * DITHER_SIZE).map(|_| rng.gen()).collect();
        dither.write_all(gpu, &noise)?;
        Ok(Self { dither })
    }

    /// 把当前模式的画面绘制到目标
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &self,
        gpu: &GpuContext,
        kernels: &mut KernelRegistry,
        encoder: &mut wgpu::CommandEncoder,
        state: &SimulationState,
        post: &PostProcess,
        config: &FluidConfig,
        target: RenderTarget<'_>,
    ) -> FluidResult<()> {
        let source = match config.display.mode {
            DisplayMode::Composite => {
                return self.composite(gpu, kernels, encoder, state, post, config, target)
            }
            DisplayMode::Dye => state.dye.read(),
            DisplayMode::Velocity => state.velocity.read(),
            DisplayMode::Pressure => state.pressure.read(),
            DisplayMode::Divergence => &state.divergence,
            DisplayMode::Curl => &state.curl,
        };
        let pass = KernelPass::new(KernelId::Copy)
            .bind("u_source", source)?
            .clear(wgpu::Color::BLACK);
        kernels.draw(gpu, encoder, pass, target)
    }

    #[allow(clippy::too_many_arguments)]
    fn composite(
        &self,
        gpu: &GpuContext,
        kernels: &mut KernelRegistry,
        encoder: &mut wgpu::CommandEncoder,
        state: &SimulationState,
        post: &PostProcess,
        config: &FluidConfig,
        target: RenderTarget<'_>,
    ) -> FluidResult<()> {
        let [r, g, b] = config.display.back_color;
        let features = KernelFeatures {
            manual_filtering: false,
            shading: config.display.shading,
            bloom: config.bloom.enabled,
            sunrays: config.sunrays.enabled,
        };
        let dither_scale = [
            target.width as f32 / self.dither.width() as f32,
            target.height as f32 / self.dither.height() as f32,
        ];

        let pass = KernelPass::new(KernelId::Display)
            .bind("u_source", state.dye.read())?
            .bind("u_bloom", post.bloom.field())?
            .bind("u_sunrays", post.sunrays.field())?
            .bind("u_dither", &self.dither)?
            .uniforms(&DisplayUniforms {
                texel_size: target.texel_size().to_array(),
                dither_scale,
            })?
            .features(features)
            .blend(BlendMode::Over)
            .clear(wgpu::Color {
                r: r as f64,
                g: g as f64,
                b: b as f64,
                a: 1.0,
            });
        kernels.draw(gpu, encoder, pass, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_index() {
        assert_eq!(DisplayMode::from_index(0), Some(DisplayMode::Composite));
        assert_eq!(DisplayMode::from_index(1), Some(DisplayMode::Dye));
        assert_eq!(DisplayMode::from_index(5), Some(DisplayMode::Curl));
        assert_eq!(DisplayMode::from_index(6), None);
    }

    #[test]
    fn test_only_composite_uses_post_process() {
        let users: Vec<DisplayMode> = DisplayMode::ALL
            .into_iter()
            .filter(|m| m.uses_post_process())
            .collect();
        assert_eq!(users, vec![DisplayMode::Composite]);
    }

    #[test]
    fn test_mode_serde_names() {
        let json = serde_json::to_string(&DisplayMode::Divergence).unwrap();
        assert_eq!(json, "\"divergence\"");
        let mode: DisplayMode = serde_json::from_str("\"pressure\"").unwrap();
        assert_eq!(mode, DisplayMode::Pressure);
    }
}
