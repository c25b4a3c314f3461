//! 内核 Uniform 块
//!
//! 每个结构体与对应 WGSL 结构体逐字段对齐，大小均为 16 字节的整数倍。

use glam::Vec2;

/// 只携带纹素尺寸的 Uniform（curl / divergence / pressure / gradient / blur）
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TexelUniforms {
    pub texel_size: [f32; 2],
    pub _pad: [f32; 2],
}

impl TexelUniforms {
    pub fn new(texel_size: Vec2) -> Self {
        Self {
            texel_size: texel_size.to_array(),
            _pad: [0.0; 2],
        }
    }
}

/// 衰减系数
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ClearUniforms {
    pub value: f32,
    pub _pad: [f32; 3],
}

impl ClearUniforms {
    pub fn new(value: f32) -> Self {
        Self {
            value,
            _pad: [0.0; 3],
        }
    }
}

/// 溅射参数
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SplatUniforms {
    /// 纹理空间中的中心点（y 向下）
    pub point: [f32; 2],
    pub aspect_ratio: f32,
    pub radius: f32,
    pub color: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct VorticityUniforms {
    pub texel_size: [f32; 2],
    pub curl: f32,
    pub dt: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct AdvectionUniforms {
    /// 速度场纹素尺寸
    pub texel_size: [f32; 2],
    /// 被平流场的纹素尺寸（手动插值时使用）
    pub dye_texel_size: [f32; 2],
    pub dt: f32,
    pub dissipation: f32,
    pub _pad: [f32; 2],
}

/// Bloom 亮度提取参数
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BloomPrefilterUniforms {
    /// 软膝曲线 (threshold - knee, 2 * knee, 0.25 / knee)
    pub curve: [f32; 3],
    pub threshold: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BloomFinalUniforms {
    pub texel_size: [f32; 2],
    pub intensity: f32,
    pub _pad: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SunraysUniforms {
    pub weight: f32,
    pub _pad: [f32; 3],
}

/// 最终合成参数
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DisplayUniforms {
    /// 输出目标的纹素尺寸
    pub texel_size: [f32; 2],
    /// 抖动纹理的平铺倍数
    pub dither_scale: [f32; 2],
}
