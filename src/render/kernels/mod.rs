//! 内核注册表
//!
//! 一个"内核"是一条全屏片段着色器通道：读取若干输入场，写入一个目标。
//! 每个内核在启动时声明固定的绑定契约（纹理槽位名、Uniform 块大小、
//! 可覆盖的特性常量），调用方只能按契约绑定，违反契约立即返回错误。
//!
//! 着色器模块在注册表创建时一次性编译；渲染管线按
//! (内核, 目标格式, 混合模式, 特性组合) 懒创建并缓存。

pub mod shaders;
pub mod uniforms;

use std::collections::HashMap;
use std::mem::size_of;
use std::sync::Arc;

use wgpu::util::DeviceExt;

use crate::core::error::{FluidError, FluidResult, RenderError};
use crate::render::field::{Field, RenderTarget};
use crate::render::gpu::GpuContext;

pub use uniforms::*;

/// 内核标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelId {
    Copy,
    Clear,
    Splat,
    Curl,
    Vorticity,
    Divergence,
    Pressure,
    GradientSubtract,
    Advection,
    BloomPrefilter,
    BloomBlur,
    BloomFinal,
    SunraysMask,
    Sunrays,
    Blur,
    Display,
}

impl KernelId {
    pub const ALL: [KernelId; 16] = [
        KernelId::Copy,
        KernelId::Clear,
        KernelId::Splat,
        KernelId::Curl,
        KernelId::Vorticity,
        KernelId::Divergence,
        KernelId::Pressure,
        KernelId::GradientSubtract,
        KernelId::Advection,
        KernelId::BloomPrefilter,
        KernelId::BloomBlur,
        KernelId::BloomFinal,
        KernelId::SunraysMask,
        KernelId::Sunrays,
        KernelId::Blur,
        KernelId::Display,
    ];

    /// 绑定契约
    pub fn contract(self) -> &'static KernelContract {
        match self {
            KernelId::Copy => &COPY,
            KernelId::Clear => &CLEAR,
            KernelId::Splat => &SPLAT,
            KernelId::Curl => &CURL,
            KernelId::Vorticity => &VORTICITY,
            KernelId::Divergence => &DIVERGENCE,
            KernelId::Pressure => &PRESSURE,
            KernelId::GradientSubtract => &GRADIENT_SUBTRACT,
            KernelId::Advection => &ADVECTION,
            KernelId::BloomPrefilter => &BLOOM_PREFILTER,
            KernelId::BloomBlur => &BLOOM_BLUR,
            KernelId::BloomFinal => &BLOOM_FINAL,
            KernelId::SunraysMask => &SUNRAYS_MASK,
            KernelId::Sunrays => &SUNRAYS,
            KernelId::Blur => &BLUR,
            KernelId::Display => &DISPLAY,
        }
    }

    pub fn name(self) -> &'static str {
        self.contract().name
    }

    fn body(self) -> &'static str {
        match self {
            KernelId::Copy => shaders::COPY,
            KernelId::Clear => shaders::CLEAR,
            KernelId::Splat => shaders::SPLAT,
            KernelId::Curl => shaders::CURL,
            KernelId::Vorticity => shaders::VORTICITY,
            KernelId::Divergence => shaders::DIVERGENCE,
            KernelId::Pressure => shaders::PRESSURE,
            KernelId::GradientSubtract => shaders::GRADIENT_SUBTRACT,
            KernelId::Advection => shaders::ADVECTION,
            KernelId::BloomPrefilter => shaders::BLOOM_PREFILTER,
            KernelId::BloomBlur => shaders::BLOOM_BLUR,
            KernelId::BloomFinal => shaders::BLOOM_FINAL,
            KernelId::SunraysMask => shaders::SUNRAYS_MASK,
            KernelId::Sunrays => shaders::SUNRAYS,
            KernelId::Blur => shaders::BLUR,
            KernelId::Display => shaders::DISPLAY,
        }
    }
}

/// 完整的 WGSL 模块源码
pub fn source(kernel: KernelId) -> String {
    format!("{}{}", shaders::PRELUDE, kernel.body())
}

/// 内核绑定契约
#[derive(Debug)]
pub struct KernelContract {
    pub name: &'static str,
    /// 片段入口
    pub entry: &'static str,
    /// 纹理槽位，依次绑定到 `@binding(2..)`
    pub textures: &'static [&'static str],
    /// Uniform 块大小；0 表示内核不读取 Uniform
    pub uniform_size: usize,
    /// 可覆盖的特性常量
    pub overrides: &'static [&'static str],
}

impl KernelContract {
    /// 槽位名对应的绑定号
    pub fn slot(&self, name: &str) -> Option<u32> {
        self.textures
            .iter()
            .position(|slot| *slot == name)
            .map(|index| index as u32 + FIRST_TEXTURE_BINDING)
    }
}

const UNIFORM_BINDING: u32 = 0;
const SAMPLER_BINDING: u32 = 1;
const FIRST_TEXTURE_BINDING: u32 = 2;
/// 不读 Uniform 的内核仍绑定一块最小缓冲区
const EMPTY_UNIFORM_SIZE: usize = 16;

const fn contract(
    name: &'static str,
    entry: &'static str,
    textures: &'static [&'static str],
    uniform_size: usize,
    overrides: &'static [&'static str],
) -> KernelContract {
    KernelContract {
        name,
        entry,
        textures,
        uniform_size,
        overrides,
    }
}

static COPY: KernelContract = contract("copy", "fs_copy", &["u_source"], 0, &[]);
static CLEAR: KernelContract = contract(
    "clear",
    "fs_clear",
    &["u_source"],
    size_of::<ClearUniforms>(),
    &[],
);
static SPLAT: KernelContract = contract(
    "splat",
    "fs_splat",
    &["u_target"],
    size_of::<SplatUniforms>(),
    &[],
);
static CURL: KernelContract = contract(
    "curl",
    "fs_curl",
    &["u_velocity"],
    size_of::<TexelUniforms>(),
    &[],
);
static VORTICITY: KernelContract = contract(
    "vorticity",
    "fs_vorticity",
    &["u_velocity", "u_curl"],
    size_of::<VorticityUniforms>(),
    &[],
);
static DIVERGENCE: KernelContract = contract(
    "divergence",
    "fs_divergence",
    &["u_velocity"],
    size_of::<TexelUniforms>(),
    &[],
);
static PRESSURE: KernelContract = contract(
    "pressure",
    "fs_pressure",
    &["u_pressure", "u_divergence"],
    size_of::<TexelUniforms>(),
    &[],
);
static GRADIENT_SUBTRACT: KernelContract = contract(
    "gradient_subtract",
    "fs_gradient_subtract",
    &["u_pressure", "u_velocity"],
    size_of::<TexelUniforms>(),
    &[],
);
static ADVECTION: KernelContract = contract(
    "advection",
    "fs_advection",
    &["u_velocity", "u_source"],
    size_of::<AdvectionUniforms>(),
    &["MANUAL_FILTERING"],
);
static BLOOM_PREFILTER: KernelContract = contract(
    "bloom_prefilter",
    "fs_bloom_prefilter",
    &["u_source"],
    size_of::<BloomPrefilterUniforms>(),
    &[],
);
static BLOOM_BLUR: KernelContract = contract(
    "bloom_blur",
    "fs_bloom_blur",
    &["u_source"],
    size_of::<TexelUniforms>(),
    &[],
);
static BLOOM_FINAL: KernelContract = contract(
    "bloom_final",
    "fs_bloom_final",
    &["u_source"],
    size_of::<BloomFinalUniforms>(),
    &[],
);
static SUNRAYS_MASK: KernelContract =
    contract("sunrays_mask", "fs_sunrays_mask", &["u_source"], 0, &[]);
static SUNRAYS: KernelContract = contract(
    "sunrays",
    "fs_sunrays",
    &["u_source"],
    size_of::<SunraysUniforms>(),
    &[],
);
static BLUR: KernelContract = contract(
    "blur",
    "fs_blur",
    &["u_source"],
    size_of::<TexelUniforms>(),
    &[],
);
static DISPLAY: KernelContract = contract(
    "display",
    "fs_display",
    &["u_source", "u_bloom", "u_sunrays", "u_dither"],
    size_of::<DisplayUniforms>(),
    &["SHADING", "BLOOM", "SUNRAYS"],
);

/// 混合模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// 直接覆盖
    #[default]
    Replace,
    /// ONE + ONE，用于 Bloom 升采样累加
    Additive,
    /// ONE + ONE_MINUS_SRC_ALPHA，用于最终合成到背景之上
    Over,
}

impl BlendMode {
    fn state(self) -> Option<wgpu::BlendState> {
        match self {
            BlendMode::Replace => None,
            BlendMode::Additive => Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
            }),
            BlendMode::Over => Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
        }
    }
}

/// 编译期特性开关（对应 WGSL `override` 常量）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KernelFeatures {
    pub manual_filtering: bool,
    pub shading: bool,
    pub bloom: bool,
    pub sunrays: bool,
}

impl KernelFeatures {
    /// 只保留内核声明过的开关，避免同一管线因无关开关重复创建
    fn masked(self, contract: &KernelContract) -> Self {
        let has = |name: &str| contract.overrides.contains(&name);
        Self {
            manual_filtering: self.manual_filtering && has("MANUAL_FILTERING"),
            shading: self.shading && has("SHADING"),
            bloom: self.bloom && has("BLOOM"),
            sunrays: self.sunrays && has("SUNRAYS"),
        }
    }

    fn constants(self, contract: &KernelContract) -> HashMap<String, f64> {
        let flag = |on: bool| if on { 1.0 } else { 0.0 };
        contract
            .overrides
            .iter()
            .map(|name| {
                let value = match *name {
                    "MANUAL_FILTERING" => flag(self.manual_filtering),
                    "SHADING" => flag(self.shading),
                    "BLOOM" => flag(self.bloom),
                    "SUNRAYS" => flag(self.sunrays),
                    _ => 0.0,
                };
                (name.to_string(), value)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    kernel: KernelId,
    format: wgpu::TextureFormat,
    blend: BlendMode,
    features: KernelFeatures,
}

struct CompiledKernel {
    module: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
}

/// 一次内核调用的输入描述
pub struct KernelPass<'a> {
    kernel: KernelId,
    textures: Vec<Option<(&'a wgpu::TextureView, u64)>>,
    uniforms: Option<Vec<u8>>,
    blend: BlendMode,
    features: KernelFeatures,
    clear: Option<wgpu::Color>,
}

impl<'a> KernelPass<'a> {
    pub fn new(kernel: KernelId) -> Self {
        Self {
            kernel,
            textures: vec![None; kernel.contract().textures.len()],
            uniforms: None,
            blend: BlendMode::Replace,
            features: KernelFeatures::default(),
            clear: None,
        }
    }

    pub fn kernel(&self) -> KernelId {
        self.kernel
    }

    /// 把场绑定到命名槽位，返回绑定号
    pub fn attach(&mut self, slot: &str, field: &'a Field) -> FluidResult<u32> {
        let contract = self.kernel.contract();
        let binding = contract.slot(slot).ok_or_else(|| FluidError::UniformNotFound {
            kernel: contract.name,
            name: slot.to_string(),
        })?;
        let index = (binding - FIRST_TEXTURE_BINDING) as usize;
        self.textures[index] = Some((field.view(), field.id()));
        Ok(binding)
    }

    /// 链式版本的 [`attach`](Self::attach)
    pub fn bind(mut self, slot: &str, field: &'a Field) -> FluidResult<Self> {
        self.attach(slot, field)?;
        Ok(self)
    }

    /// 设置 Uniform 块，大小必须与契约一致
    pub fn uniforms<U: bytemuck::Pod>(mut self, value: &U) -> FluidResult<Self> {
        let contract = self.kernel.contract();
        let bytes = bytemuck::bytes_of(value);
        if bytes.len() != contract.uniform_size {
            return Err(FluidError::UniformMismatch {
                kernel: contract.name,
                expected: contract.uniform_size,
                actual: bytes.len(),
            });
        }
        self.uniforms = Some(bytes.to_vec());
        Ok(self)
    }

    pub fn blend(mut self, blend: BlendMode) -> Self {
        self.blend = blend;
        self
    }

    pub fn features(mut self, features: KernelFeatures) -> Self {
        self.features = features;
        self
    }

    /// 绘制前先用给定颜色清空目标
    pub fn clear(mut self, color: wgpu::Color) -> Self {
        self.clear = Some(color);
        self
    }
}

/// 内核注册表
pub struct KernelRegistry {
    kernels: HashMap<KernelId, CompiledKernel>,
    pipelines: HashMap<PipelineKey, Arc<wgpu::RenderPipeline>>,
    sampler: wgpu::Sampler,
    filterable: bool,
}

impl KernelRegistry {
    /// 编译全部内核
    ///
    /// `filterable` 为 false 时使用最近邻采样器与不可过滤的纹理布局，
    /// 平流内核应同时开启 `manual_filtering`。
    pub fn new(gpu: &GpuContext, filterable: bool) -> FluidResult<Self> {
        let device = &gpu.device;
        let filter = if filterable {
            wgpu::FilterMode::Linear
        } else {
            wgpu::FilterMode::Nearest
        };
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Field Sampler"),
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: wgpu::FilterMode::Nearest,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });

        let mut kernels = HashMap::new();
        for kernel in KernelId::ALL {
            gpu.begin_error_scope();
            let compiled = Self::compile(device, kernel, filterable);
            gpu.end_error_scope().map_err(|e| FluidError::KernelBuild {
                kernel: kernel.name(),
                reason: e.to_string(),
            })?;
            kernels.insert(kernel, compiled);
        }

        tracing::debug!(
            target: "kernels",
            "Compiled {} kernels (filterable: {})",
            kernels.len(),
            filterable
        );

        Ok(Self {
            kernels,
            pipelines: HashMap::new(),
            sampler,
            filterable,
        })
    }

    pub fn filterable(&self) -> bool {
        self.filterable
    }

    fn compile(device: &wgpu::Device, kernel: KernelId, filterable: bool) -> CompiledKernel {
        let contract = kernel.contract();
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(contract.name),
            source: wgpu::ShaderSource::Wgsl(source(kernel).into()),
        });

        let mut entries = vec![
            wgpu::BindGroupLayoutEntry {
                binding: UNIFORM_BINDING,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: SAMPLER_BINDING,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(if filterable {
                    wgpu::SamplerBindingType::Filtering
                } else {
                    wgpu::SamplerBindingType::NonFiltering
                }),
                count: None,
            },
        ];
        for index in 0..contract.textures.len() {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: FIRST_TEXTURE_BINDING + index as u32,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
        }

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(contract.name),
            entries: &entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(contract.name),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        CompiledKernel {
            module,
            bind_group_layout,
            pipeline_layout,
        }
    }

    fn pipeline(
        &mut self,
        gpu: &GpuContext,
        key: PipelineKey,
    ) -> FluidResult<Arc<wgpu::RenderPipeline>> {
        if let Some(pipeline) = self.pipelines.get(&key) {
            return Ok(pipeline.clone());
        }

        let contract = key.kernel.contract();
        let compiled = self
            .kernels
            .get(&key.kernel)
            .ok_or_else(|| FluidError::KernelBuild {
                kernel: contract.name,
                reason: "kernel was not compiled".to_string(),
            })?;
        let constants = key.features.constants(contract);

        gpu.begin_error_scope();
        let pipeline = gpu
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(contract.name),
                layout: Some(&compiled.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &compiled.module,
                    entry_point: "vs_fullscreen",
                    compilation_options: Default::default(),
                    buffers: &[],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &compiled.module,
                    entry_point: contract.entry,
                    compilation_options: wgpu::PipelineCompilationOptions {
                        constants: &constants,
                        ..Default::default()
                    },
                    targets: &[Some(wgpu::ColorTargetState {
                        format: key.format,
                        blend: key.blend.state(),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            });
        gpu.end_error_scope().map_err(|e| FluidError::KernelBuild {
            kernel: contract.name,
            reason: e.to_string(),
        })?;

        tracing::trace!(target: "kernels", "Created pipeline {:?}", key);
        let pipeline = Arc::new(pipeline);
        self.pipelines.insert(key, pipeline.clone());
        Ok(pipeline)
    }

    /// 执行一次内核：绑定输入、写入 Uniform、向目标绘制全屏三角形
    pub fn draw(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        pass: KernelPass<'_>,
        target: RenderTarget<'_>,
    ) -> FluidResult<()> {
        let contract = pass.kernel.contract();

        let mut views = Vec::with_capacity(pass.textures.len());
        for (slot, bound) in contract.textures.iter().zip(&pass.textures) {
            let (view, id) = bound.ok_or(FluidError::UnboundSlot {
                kernel: contract.name,
                name: *slot,
            })?;
            if Some(id) == target.field_id {
                return Err(RenderError::InvalidState(format!(
                    "kernel '{}' reads slot '{}' from its own render target",
                    contract.name, slot
                ))
                .into());
            }
            views.push(view);
        }

        let uniform_bytes = match (pass.uniforms, contract.uniform_size) {
            (Some(bytes), _) => bytes,
            (None, 0) => vec![0u8; EMPTY_UNIFORM_SIZE],
            (None, expected) => {
                return Err(FluidError::UniformMismatch {
                    kernel: contract.name,
                    expected,
                    actual: 0,
                })
            }
        };

        let key = PipelineKey {
            kernel: pass.kernel,
            format: target.format,
            blend: pass.blend,
            features: pass.features.masked(contract),
        };
        let pipeline = self.pipeline(gpu, key)?;
        let compiled = self
            .kernels
            .get(&pass.kernel)
            .ok_or_else(|| FluidError::KernelBuild {
                kernel: contract.name,
                reason: "kernel was not compiled".to_string(),
            })?;

        let uniform_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(contract.name),
                contents: &uniform_bytes,
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: UNIFORM_BINDING,
                resource: uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: SAMPLER_BINDING,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            },
        ];
        for (index, view) in views.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: FIRST_TEXTURE_BINDING + index as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(contract.name),
            layout: &compiled.bind_group_layout,
            entries: &entries,
        });

        let load = match pass.clear {
            Some(color) => wgpu::LoadOp::Clear(color),
            None => wgpu::LoadOp::Load,
        };

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(contract.name),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        render_pass.set_pipeline(&pipeline);
        render_pass.set_bind_group(0, &bind_group, &[]);
        render_pass.draw(0..3, 0..1);

        Ok(())
    }

    /// 用 copy 内核把 `source` 缩放复制到 `target`
    pub fn blit(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        source: &Field,
        target: &Field,
    ) -> FluidResult<()> {
        let pass = KernelPass::new(KernelId::Copy).bind("u_source", source)?;
        self.draw(gpu, encoder, pass, target.target())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_slots() {
        let contract = KernelId::Vorticity.contract();
        assert_eq!(contract.slot("u_velocity"), Some(2));
        assert_eq!(contract.slot("u_curl"), Some(3));
        assert_eq!(contract.slot("u_pressure"), None);
    }

    #[test]
    fn test_uniform_size_mismatch() {
        let result = KernelPass::new(KernelId::Curl).uniforms(&TexelUniforms::new(glam::Vec2::ONE));
        assert!(result.is_ok());

        let result = KernelPass::new(KernelId::Curl).uniforms(&AdvectionUniforms {
            texel_size: [0.0; 2],
            dye_texel_size: [0.0; 2],
            dt: 0.0,
            dissipation: 0.0,
            _pad: [0.0; 2],
        });
        assert!(matches!(
            result,
            Err(FluidError::UniformMismatch {
                kernel: "curl",
                expected: 16,
                actual: 32
            })
        ));
    }

    #[test]
    fn test_features_masked_per_kernel() {
        let all = KernelFeatures {
            manual_filtering: true,
            shading: true,
            bloom: true,
            sunrays: true,
        };
        let advection = all.masked(KernelId::Advection.contract());
        assert!(advection.manual_filtering);
        assert!(!advection.shading);

        let curl = all.masked(KernelId::Curl.contract());
        assert_eq!(curl, KernelFeatures::default());

        let constants = all.constants(KernelId::Display.contract());
        assert_eq!(constants.len(), 3);
        assert_eq!(constants.get("BLOOM"), Some(&1.0));
    }

    #[test]
    fn test_every_kernel_has_source() {
        for kernel in KernelId::ALL {
            let src = source(kernel);
            assert!(src.contains("vs_fullscreen"));
            assert!(src.contains(kernel.contract().entry), "{}", kernel.name());
        }
    }
}
