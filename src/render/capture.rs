//! 截图导出
//!
//! 读回染料场的 Read 半区，截断到 [0, 1] 后编码为 PNG。
//! 场的读回数据已经是顶行在前，与图像行序一致，不需要再翻转。

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use image::{ImageFormat, RgbImage};

use crate::config::CaptureConfig;
use crate::core::error::{FluidResult, RenderError};
use crate::render::field::Field;
use crate::render::gpu::GpuContext;

/// 把一张 RGBA 场转换为 8 位 RGB 图像（截断到 [0, 1]）
pub fn field_to_image(gpu: &GpuContext, field: &Field) -> FluidResult<RgbImage> {
    let channels = field.format().channels.count() as usize;
    let data = field.read_f32(gpu)?;
    let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;

    let mut pixels = Vec::with_capacity(field.shape().texel_count() * 3);
    for texel in data.chunks_exact(channels) {
        for c in 0..3 {
            pixels.push(texel.get(c).copied().map(to_u8).unwrap_or(0));
        }
    }

    RgbImage::from_raw(field.width(), field.height(), pixels).ok_or_else(|| {
        RenderError::Readback(format!(
            "readback of '{}' does not match {}x{}",
            field.label(),
            field.width(),
            field.height()
        ))
        .into()
    })
}

/// 生成带时间戳的文件名
pub fn capture_path(config: &CaptureConfig) -> PathBuf {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    config
        .directory
        .join(format!("{}_{}.png", config.file_prefix, millis))
}

/// 写出 PNG，返回文件路径
pub fn save_png(image: &RgbImage, config: &CaptureConfig) -> FluidResult<PathBuf> {
    std::fs::create_dir_all(&config.directory)?;
    let path = capture_path(config);
    image.save_with_format(&path, ImageFormat::Png)?;
    tracing::info!(target: "fluid", "Saved capture to {:?}", path);
    Ok(path)
}
