//! 稳定流体求解器
//!
//! 一个时间步依次执行：
//! 1. curl：速度场旋度
//! 2. vorticity：涡度约束力，回写速度
//! 3. divergence：速度散度
//! 4. pressure：压力衰减后做固定次数的 Jacobi 迭代
//! 5. gradient subtract：减去压力梯度，得到近似无散速度
//! 6. advection：速度自平流，再用速度平流染料
//!
//! 每个写入双缓冲场的阶段结束后立即 `swap()`，下一阶段总是读取最新结果。

use crate::config::SimulationConfig;
use crate::core::error::FluidResult;
use crate::render::gpu::GpuContext;
use crate::render::kernels::{
    AdvectionUniforms, ClearUniforms, KernelFeatures, KernelId, KernelPass, KernelRegistry,
    TexelUniforms, VorticityUniforms,
};
use crate::simulation::splat::Splat;
use crate::simulation::state::SimulationState;

/// 求解器
pub struct Solver {
    state: SimulationState,
}

impl Solver {
    pub fn new(state: SimulationState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SimulationState {
        &mut self.state
    }

    /// 推进一个时间步
    pub fn step(
        &mut self,
        gpu: &GpuContext,
        kernels: &mut KernelRegistry,
        encoder: &mut wgpu::CommandEncoder,
        config: &SimulationConfig,
        dt: f32,
    ) -> FluidResult<()> {
        self.compute_curl(gpu, kernels, encoder)?;
        self.apply_vorticity(gpu, kernels, encoder, config.curl, dt)?;
        self.compute_divergence(gpu, kernels, encoder)?;
        self.solve_pressure(
            gpu,
            kernels,
            encoder,
            config.pressure,
            config.pressure_iterations,
        )?;
        self.subtract_gradient(gpu, kernels, encoder)?;
        self.advect(
            gpu,
            kernels,
            encoder,
            dt,
            config.velocity_dissipation,
            config.density_dissipation,
        )?;
        Ok(())
    }

    pub fn compute_curl(
        &mut self,
        gpu: &GpuContext,
        kernels: &mut KernelRegistry,
        encoder: &mut wgpu::CommandEncoder,
    ) -> FluidResult<()> {
        let s = &self.state;
        let pass = KernelPass::new(KernelId::Curl)
            .bind("u_velocity", s.velocity.read())?
            .uniforms(&TexelUniforms::new(s.velocity.texel_size()))?;
        kernels.draw(gpu, encoder, pass, s.curl.target())
    }

    pub fn apply_vorticity(
        &mut self,
        gpu: &GpuContext,
        kernels: &mut KernelRegistry,
        encoder: &mut wgpu::CommandEncoder,
        curl: f32,
        dt: f32,
    ) -> FluidResult<()> {
        let s = &mut self.state;
        let pass = KernelPass::new(KernelId::Vorticity)
            .bind("u_velocity", s.velocity.read())?
            .bind("u_curl", &s.curl)?
            .uniforms(&VorticityUniforms {
                texel_size: s.velocity.texel_size().to_array(),
                curl,
                dt,
            })?;
        kernels.draw(gpu, encoder, pass, s.velocity.write().target())?;
        s.velocity.swap();
        Ok(())
    }

    pub fn compute_divergence(
        &mut self,
        gpu: &GpuContext,
        kernels: &mut KernelRegistry,
        encoder: &mut wgpu::CommandEncoder,
    ) -> FluidResult<()> {
        let s = &self.state;
        let pass = KernelPass::new(KernelId::Divergence)
            .bind("u_velocity", s.velocity.read())?
            .uniforms(&TexelUniforms::new(s.velocity.texel_size()))?;
        kernels.draw(gpu, encoder, pass, s.divergence.target())
    }

    /// 压力衰减 + Jacobi 迭代
    pub fn solve_pressure(
        &mut self,
        gpu: &GpuContext,
        kernels: &mut KernelRegistry,
        encoder: &mut wgpu::CommandEncoder,
        dissipation: f32,
        iterations: u32,
    ) -> FluidResult<()> {
        let s = &mut self.state;

        let pass = KernelPass::new(KernelId::Clear)
            .bind("u_source", s.pressure.read())?
            .uniforms(&ClearUniforms::new(dissipation))?;
        kernels.draw(gpu, encoder, pass, s.pressure.write().target())?;
        s.pressure.swap();

        let texel = TexelUniforms::new(s.velocity.texel_size());
        for _ in 0..iterations {
            let pass = KernelPass::new(KernelId::Pressure)
                .bind("u_pressure", s.pressure.read())?
                .bind("u_divergence", &s.divergence)?
                .uniforms(&texel)?;
            kernels.draw(gpu, encoder, pass, s.pressure.write().target())?;
            s.pressure.swap();
        }
        Ok(())
    }

    pub fn subtract_gradient(
        &mut self,
        gpu: &GpuContext,
        kernels: &mut KernelRegistry,
        encoder: &mut wgpu::CommandEncoder,
    ) -> FluidResult<()> {
        let s = &mut self.state;
        let pass = KernelPass::new(KernelId::GradientSubtract)
            .bind("u_pressure", s.pressure.read())?
            .bind("u_velocity", s.velocity.read())?
            .uniforms(&TexelUniforms::new(s.velocity.texel_size()))?;
        kernels.draw(gpu, encoder, pass, s.velocity.write().target())?;
        s.velocity.swap();
        Ok(())
    }

    /// 半拉格朗日平流：先速度自平流，再平流染料
    pub fn advect(
        &mut self,
        gpu: &GpuContext,
        kernels: &mut KernelRegistry,
        encoder: &mut wgpu::CommandEncoder,
        dt: f32,
        velocity_dissipation: f32,
        density_dissipation: f32,
    ) -> FluidResult<()> {
        let s = &mut self.state;
        let features = KernelFeatures {
            manual_filtering: !kernels.filterable(),
            ..Default::default()
        };
        let texel = s.velocity.texel_size().to_array();

        let pass = KernelPass::new(KernelId::Advection)
            .bind("u_velocity", s.velocity.read())?
            .bind("u_source", s.velocity.read())?
            .uniforms(&AdvectionUniforms {
                texel_size: texel,
                dye_texel_size: texel,
                dt,
                dissipation: velocity_dissipation,
                _pad: [0.0; 2],
            })?
            .features(features);
        kernels.draw(gpu, encoder, pass, s.velocity.write().target())?;
        s.velocity.swap();

        let pass = KernelPass::new(KernelId::Advection)
            .bind("u_velocity", s.velocity.read())?
            .bind("u_source", s.dye.read())?
            .uniforms(&AdvectionUniforms {
                texel_size: texel,
                dye_texel_size: s.dye.texel_size().to_array(),
                dt,
                dissipation: density_dissipation,
                _pad: [0.0; 2],
            })?
            .features(features);
        kernels.draw(gpu, encoder, pass, s.dye.write().target())?;
        s.dye.swap();
        Ok(())
    }

    /// 向速度和染料各注入一次溅射
    pub fn splat(
        &mut self,
        gpu: &GpuContext,
        kernels: &mut KernelRegistry,
        encoder: &mut wgpu::CommandEncoder,
        splat: &Splat,
        radius: f32,
        aspect_ratio: f32,
    ) -> FluidResult<()> {
        let s = &mut self.state;

        let pass = KernelPass::new(KernelId::Splat)
            .bind("u_target", s.velocity.read())?
            .uniforms(&splat.velocity_uniforms(radius, aspect_ratio))?;
        kernels.draw(gpu, encoder, pass, s.velocity.write().target())?;
        s.velocity.swap();

        let pass = KernelPass::new(KernelId::Splat)
            .bind("u_target", s.dye.read())?
            .uniforms(&splat.dye_uniforms(radius, aspect_ratio))?;
        kernels.draw(gpu, encoder, pass, s.dye.write().target())?;
        s.dye.swap();
        Ok(())
    }
}
