//! Sunrays（体积光）后处理效果
//!
//! 先用染料亮度生成遮罩，再从屏幕中心做 16 次径向累积，最后做一次可分离模糊。

use crate::config::SunraysConfig;
use crate::core::error::FluidResult;
use crate::render::double_field::DoubleField;
use crate::render::field::{Field, FieldChannels, FieldFormat, Precision};
use crate::render::gpu::GpuContext;
use crate::render::kernels::{KernelId, KernelPass, KernelRegistry, SunraysUniforms, TexelUniforms};

/// 模糊迭代次数
const BLUR_ITERATIONS: u32 = 1;

/// Sunrays 缓冲区
pub struct Sunrays {
    field: Field,
    temp: Field,
}

impl Sunrays {
    pub fn new(gpu: &GpuContext, width: u32, height: u32, precision: Precision) -> Self {
        let format = FieldFormat::new(FieldChannels::Scalar, precision);
        Self {
            field: Field::new(gpu, "sunrays", width, height, format),
            temp: Field::new(gpu, "sunrays temp", width, height, format),
        }
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    /// 遮罩借用 `dye.write` 作为暂存，不交换染料的读写角色
    pub fn apply(
        &self,
        gpu: &GpuContext,
        kernels: &mut KernelRegistry,
        encoder: &mut wgpu::CommandEncoder,
        dye: &DoubleField,
        config: &SunraysConfig,
    ) -> FluidResult<()> {
        let mask = dye.write();
        let pass = KernelPass::new(KernelId::SunraysMask).bind("u_source", dye.read())?;
        kernels.draw(gpu, encoder, pass, mask.target())?;

        let pass = KernelPass::new(KernelId::Sunrays)
            .bind("u_source", mask)?
            .uniforms(&SunraysUniforms {
                weight: config.weight,
                _pad: [0.0; 3],
            })?;
        kernels.draw(gpu, encoder, pass, self.field.target())?;

        self.blur(gpu, kernels, encoder)
    }

    fn blur(
        &self,
        gpu: &GpuContext,
        kernels: &mut KernelRegistry,
        encoder: &mut wgpu::CommandEncoder,
    ) -> FluidResult<()> {
        let texel = self.field.texel_size();
        for _ in 0..BLUR_ITERATIONS {
            let pass = KernelPass::new(KernelId::Blur)
                .bind("u_source", &self.field)?
                .uniforms(&TexelUniforms::new(glam::Vec2::new(texel.x, 0.0)))?;
            kernels.draw(gpu, encoder, pass, self.temp.target())?;

            let pass = KernelPass::new(KernelId::Blur)
                .bind("u_source", &self.temp)?
                .uniforms(&TexelUniforms::new(glam::Vec2::new(0.0, texel.y)))?;
            kernels.draw(gpu, encoder, pass, self.field.target())?;
        }
        Ok(())
    }
}
