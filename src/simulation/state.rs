//! 求解器状态
//!
//! 速度、染料、压力为双缓冲场；curl 与 divergence 每步完整重写，单缓冲即可。

use crate::core::error::FluidResult;
use crate::render::double_field::DoubleField;
use crate::render::field::{Field, FieldChannels, FieldFormat, Precision};
use crate::render::gpu::GpuContext;
use crate::render::kernels::KernelRegistry;

/// 场尺寸布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    /// 速度/压力网格 (width, height)
    pub sim: (u32, u32),
    /// 染料网格 (width, height)
    pub dye: (u32, u32),
    pub precision: Precision,
}

/// 全部求解器场
pub struct SimulationState {
    pub velocity: DoubleField,
    pub dye: DoubleField,
    pub curl: Field,
    pub divergence: Field,
    pub pressure: DoubleField,
    layout: FieldLayout,
}

impl SimulationState {
    pub fn new(gpu: &GpuContext, layout: FieldLayout) -> Self {
        let (sim_w, sim_h) = layout.sim;
        let (dye_w, dye_h) = layout.dye;
        let format = |channels| FieldFormat::new(channels, layout.precision);

        tracing::info!(
            target: "fluid",
            "Allocating fields: sim {}x{}, dye {}x{}, {:?} precision",
            sim_w,
            sim_h,
            dye_w,
            dye_h,
            layout.precision
        );

        Self {
            velocity: DoubleField::new(gpu, "velocity", sim_w, sim_h, format(FieldChannels::Vector2)),
            dye: DoubleField::new(gpu, "dye", dye_w, dye_h, format(FieldChannels::Vector4)),
            curl: Field::new(gpu, "curl", sim_w, sim_h, format(FieldChannels::Scalar)),
            divergence: Field::new(gpu, "divergence", sim_w, sim_h, format(FieldChannels::Scalar)),
            pressure: DoubleField::new(gpu, "pressure", sim_w, sim_h, format(FieldChannels::Scalar)),
            layout,
        }
    }

    pub fn layout(&self) -> FieldLayout {
        self.layout
    }

    /// 按新布局重建
    ///
    /// 速度与染料保留内容（缩放复制），curl / divergence / pressure 重新分配。
    /// 精度变化时全部重新分配。
    pub fn resize(
        &mut self,
        gpu: &GpuContext,
        kernels: &mut KernelRegistry,
        layout: FieldLayout,
    ) -> FluidResult<()> {
        if layout == self.layout {
            return Ok(());
        }
        if layout.precision != self.layout.precision {
            *self = Self::new(gpu, layout);
            return Ok(());
        }

        let (sim_w, sim_h) = layout.sim;
        let (dye_w, dye_h) = layout.dye;
        self.velocity.resize(gpu, kernels, sim_w, sim_h)?;
        self.dye.resize(gpu, kernels, dye_w, dye_h)?;

        let scalar = FieldFormat::new(FieldChannels::Scalar, layout.precision);
        self.curl = Field::new(gpu, "curl", sim_w, sim_h, scalar);
        self.divergence = Field::new(gpu, "divergence", sim_w, sim_h, scalar);
        self.pressure = DoubleField::new(gpu, "pressure", sim_w, sim_h, scalar);
        self.layout = layout;

        tracing::debug!(target: "fluid", "Resized fields to {:?}", layout);
        Ok(())
    }
}
