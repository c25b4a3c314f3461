//! 场缓冲区
//!
//! 一个 `Field` 是一张 GPU 2D 纹理，同时作为采样输入和离屏渲染目标。
//! 纹素尺寸总是从当前宽高实时计算，不做缓存。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;

use glam::Vec2;
use half::f16;

use crate::core::error::{FluidResult, RenderError, RenderResult};
use crate::render::gpu::GpuContext;
use crate::render::kernels::{KernelPass, KernelRegistry};

static NEXT_FIELD_ID: AtomicU64 = AtomicU64::new(1);

/// 通道布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldChannels {
    Scalar,
    Vector2,
    Vector4,
}

impl FieldChannels {
    pub fn count(self) -> u32 {
        match self {
            FieldChannels::Scalar => 1,
            FieldChannels::Vector2 => 2,
            FieldChannels::Vector4 => 4,
        }
    }
}

/// 数值精度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Precision {
    Half,
    Full,
}

/// 场的纹理格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldFormat {
    pub channels: FieldChannels,
    pub precision: Precision,
}

impl FieldFormat {
    pub const fn new(channels: FieldChannels, precision: Precision) -> Self {
        Self {
            channels,
            precision,
        }
    }

    /// Bloom / Sunrays 缓冲区固定使用半精度 RGBA
    pub const BLOOM: FieldFormat = FieldFormat::new(FieldChannels::Vector4, Precision::Half);

    pub fn texture_format(self) -> wgpu::TextureFormat {
        use wgpu::TextureFormat as F;
        match (self.channels, self.precision) {
            (FieldChannels::Scalar, Precision::Half) => F::R16Float,
            (FieldChannels::Vector2, Precision::Half) => F::Rg16Float,
            (FieldChannels::Vector4, Precision::Half) => F::Rgba16Float,
            (FieldChannels::Scalar, Precision::Full) => F::R32Float,
            (FieldChannels::Vector2, Precision::Full) => F::Rg32Float,
            (FieldChannels::Vector4, Precision::Full) => F::Rgba32Float,
        }
    }

    pub fn bytes_per_channel(self) -> u32 {
        match self.precision {
            Precision::Half => 2,
            Precision::Full => 4,
        }
    }

    pub fn bytes_per_texel(self) -> u32 {
        self.channels.count() * self.bytes_per_channel()
    }
}

/// 场尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldShape {
    pub width: u32,
    pub height: u32,
}

impl FieldShape {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// (1/width, 1/height)
    pub fn texel_size(&self) -> Vec2 {
        Vec2::new(1.0 / self.width as f32, 1.0 / self.height as f32)
    }

    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// 渲染目标
///
/// 可以是某个场，也可以是交换链上的帧。
#[derive(Clone, Copy)]
pub struct RenderTarget<'a> {
    pub view: &'a wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
    /// 目标为场时记录其标识，用于检测读写冲突
    pub field_id: Option<u64>,
}

impl<'a> RenderTarget<'a> {
    /// 非场目标（交换链帧或外部纹理）
    pub fn external(
        view: &'a wgpu::TextureView,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            view,
            format,
            width,
            height,
            field_id: None,
        }
    }

    pub fn texel_size(&self) -> Vec2 {
        FieldShape::new(self.width, self.height).texel_size()
    }
}

/// 场缓冲区
pub struct Field {
    id: u64,
    label: String,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    shape: FieldShape,
    format: FieldFormat,
}

impl Field {
    /// 分配新的场；内容初始为零
    pub fn new(gpu: &GpuContext, label: &str, width: u32, height: u32, format: FieldFormat) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: format.texture_format(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        tracing::debug!(
            target: "field",
            "Allocated field '{}' {}x{} {:?}",
            label,
            width,
            height,
            format.texture_format()
        );

        Self {
            id: NEXT_FIELD_ID.fetch_add(1, Ordering::Relaxed),
            label: label.to_string(),
            texture,
            view,
            shape: FieldShape::new(width, height),
            format,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn width(&self) -> u32 {
        self.shape.width
    }

    pub fn height(&self) -> u32 {
        self.shape.height
    }

    pub fn shape(&self) -> FieldShape {
        self.shape
    }

    pub fn format(&self) -> FieldFormat {
        self.format
    }

    pub fn texel_size(&self) -> Vec2 {
        self.shape.texel_size()
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// 以本场为渲染目标
    pub fn target(&self) -> RenderTarget<'_> {
        RenderTarget {
            view: &self.view,
            format: self.format.texture_format(),
            width: self.shape.width,
            height: self.shape.height,
            field_id: Some(self.id),
        }
    }

    /// 把本场绑定到内核的命名槽位，返回绑定号
    pub fn attach<'a>(&'a self, pass: &mut KernelPass<'a>, slot: &str) -> FluidResult<u32> {
        pass.attach(slot, self)
    }

    /// 按新尺寸重建；`preserve` 为真时把旧内容双线性缩放复制过去
    pub fn resize(
        &self,
        gpu: &GpuContext,
        kernels: &mut KernelRegistry,
        width: u32,
        height: u32,
        preserve: bool,
    ) -> FluidResult<Field> {
        let resized = Field::new(gpu, &self.label, width, height, self.format);
        if preserve {
            let mut encoder = gpu.create_encoder("Field Resize");
            kernels.blit(gpu, &mut encoder, self, &resized)?;
            gpu.queue.submit(std::iter::once(encoder.finish()));
        }
        Ok(resized)
    }

    /// 上传整张场的数据，按行优先、每纹素 `channels` 个分量排列
    pub fn write_all(&self, gpu: &GpuContext, data: &[f32]) -> RenderResult<()> {
        let expected = self.shape.texel_count() * self.format.channels.count() as usize;
        if data.len() != expected {
            return Err(RenderError::InvalidState(format!(
                "field '{}' expects {} values, got {}",
                self.label,
                expected,
                data.len()
            )));
        }

        let bytes: Vec<u8> = match self.format.precision {
            Precision::Half => {
                let halves: Vec<f16> = data.iter().map(|v| f16::from_f32(*v)).collect();
                bytemuck::cast_slice(&halves).to_vec()
            }
            Precision::Full => bytemuck::cast_slice(data).to_vec(),
        };

        gpu.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &bytes,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(self.shape.width * self.format.bytes_per_texel()),
                rows_per_image: Some(self.shape.height),
            },
            wgpu::Extent3d {
                width: self.shape.width,
                height: self.shape.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    /// 同步读回整张场的原始字节（行首为纹理顶行，已去除行对齐填充）
    pub fn read_bytes(&self, gpu: &GpuContext) -> RenderResult<Vec<u8>> {
        let row_bytes = self.shape.width * self.format.bytes_per_texel();
        let padded_row_bytes = padded_bytes_per_row(row_bytes);
        let buffer_size = padded_row_bytes as u64 * self.shape.height as u64;

        let staging = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Field Readback Staging"),
            size: buffer_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = gpu.create_encoder("Field Readback");
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row_bytes),
                    rows_per_image: Some(self.shape.height),
                },
            },
            wgpu::Extent3d {
                width: self.shape.width,
                height: self.shape.height,
                depth_or_array_layers: 1,
            },
        );
        gpu.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        gpu.device.poll(wgpu::Maintain::Wait);

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(RenderError::Readback(e.to_string())),
            Err(e) => return Err(RenderError::Readback(e.to_string())),
        }

        let mut bytes = Vec::with_capacity((row_bytes * self.shape.height) as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks_exact(padded_row_bytes as usize) {
                bytes.extend_from_slice(&row[..row_bytes as usize]);
            }
        }
        staging.unmap();

        Ok(bytes)
    }

    /// 按纹素原始类型读回（`f16` 或 `f32`，每纹素 `channels` 个）
    pub fn read_all<T: bytemuck::Pod>(&self, gpu: &GpuContext) -> RenderResult<Vec<T>> {
        let expected = self.format.bytes_per_channel() as usize;
        if std::mem::size_of::<T>() != expected {
            return Err(RenderError::InvalidState(format!(
                "field '{}' stores {}-byte channels, requested {}-byte values",
                self.label,
                expected,
                std::mem::size_of::<T>()
            )));
        }
        let bytes = self.read_bytes(gpu)?;
        Ok(bytes
            .chunks_exact(expected)
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }

    /// 读回并统一转换为 `f32`
    pub fn read_f32(&self, gpu: &GpuContext) -> RenderResult<Vec<f32>> {
        match self.format.precision {
            Precision::Half => Ok(self
                .read_all::<f16>(gpu)?
                .into_iter()
                .map(f16::to_f32)
                .collect()),
            Precision::Full => self.read_all::<f32>(gpu),
        }
    }
}

impl std::fmt::Debug for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("shape", &self.shape)
            .field("format", &self.format)
            .finish()
    }
}

/// 拷贝到缓冲区时每行必须按 256 字节对齐
pub fn padded_bytes_per_row(row_bytes: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    row_bytes.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_texture_formats() {
        let half = FieldFormat::new(FieldChannels::Vector2, Precision::Half);
        assert_eq!(half.texture_format(), wgpu::TextureFormat::Rg16Float);
        assert_eq!(half.bytes_per_texel(), 4);

        let full = FieldFormat::new(FieldChannels::Vector4, Precision::Full);
        assert_eq!(full.texture_format(), wgpu::TextureFormat::Rgba32Float);
        assert_eq!(full.bytes_per_texel(), 16);

        assert_eq!(
            FieldFormat::BLOOM.texture_format(),
            wgpu::TextureFormat::Rgba16Float
        );
    }

    #[test]
    fn test_row_padding() {
        assert_eq!(padded_bytes_per_row(4), 256);
        assert_eq!(padded_bytes_per_row(256), 256);
        assert_eq!(padded_bytes_per_row(257), 512);
    }

    proptest! {
        #[test]
        fn texel_size_matches_shape(width in 1u32..4096, height in 1u32..4096) {
            let texel = FieldShape::new(width, height).texel_size();
            prop_assert_eq!(texel.x, 1.0 / width as f32);
            prop_assert_eq!(texel.y, 1.0 / height as f32);
        }
    }
}
