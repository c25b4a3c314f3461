//! 分辨率预设
//!
//! 以 `{label, resolution}` 对的单一枚举表描述各类质量档位，
//! 避免标签数组与数值数组之间的索引同步问题。

/// 分辨率预设（标签 + 基准分辨率）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionPreset {
    /// 显示名称
    pub label: &'static str,
    /// 基准分辨率（短边像素数）
    pub resolution: u32,
}

impl ResolutionPreset {
    const fn new(label: &'static str, resolution: u32) -> Self {
        Self { label, resolution }
    }
}

/// 染料场质量档位
pub const DYE_PRESETS: &[ResolutionPreset] = &[
    ResolutionPreset::new("high", 1024),
    ResolutionPreset::new("medium", 512),
    ResolutionPreset::new("low", 256),
    ResolutionPreset::new("very low", 128),
];

/// 速度场（模拟网格）档位
pub const SIM_PRESETS: &[ResolutionPreset] = &[
    ResolutionPreset::new("32", 32),
    ResolutionPreset::new("64", 64),
    ResolutionPreset::new("128", 128),
    ResolutionPreset::new("256", 256),
];

/// Bloom 档位
pub const BLOOM_PRESETS: &[ResolutionPreset] = &[
    ResolutionPreset::new("high", 512),
    ResolutionPreset::new("medium", 256),
    ResolutionPreset::new("low", 128),
];

/// Sunrays 档位
pub const SUNRAYS_PRESETS: &[ResolutionPreset] = &[
    ResolutionPreset::new("high", 256),
    ResolutionPreset::new("medium", 196),
    ResolutionPreset::new("low", 128),
];

/// 在预设表中查找与分辨率匹配的标签
pub fn preset_label(presets: &[ResolutionPreset], resolution: u32) -> Option<&'static str> {
    presets
        .iter()
        .find(|p| p.resolution == resolution)
        .map(|p| p.label)
}

/// 档位名称；不在预设表中的分辨率标为 `custom`
pub fn describe_resolution(presets: &[ResolutionPreset], resolution: u32) -> &'static str {
    preset_label(presets, resolution).unwrap_or("custom")
}

/// 根据视口宽高比计算场的实际尺寸
///
/// 短边等于 `base`，长边按宽高比放大，方向跟随视口。
pub fn get_resolution(base: u32, viewport_width: u32, viewport_height: u32) -> (u32, u32) {
    let width = viewport_width.max(1) as f32;
    let height = viewport_height.max(1) as f32;
    let mut aspect = width / height;
    if aspect < 1.0 {
        aspect = 1.0 / aspect;
    }

    let min = (base as f32).round().max(1.0) as u32;
    let max = (base as f32 * aspect).round().max(1.0) as u32;

    if width > height {
        (max, min)
    } else {
        (min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landscape_resolution() {
        assert_eq!(get_resolution(128, 1920, 1080), (228, 128));
    }

    #[test]
    fn test_portrait_resolution() {
        assert_eq!(get_resolution(128, 1080, 1920), (128, 228));
    }

    #[test]
    fn test_square_resolution() {
        assert_eq!(get_resolution(256, 800, 800), (256, 256));
    }

    #[test]
    fn test_degenerate_viewport() {
        let (w, h) = get_resolution(64, 0, 0);
        assert_eq!((w, h), (64, 64));
    }

    #[test]
    fn test_preset_lookup() {
        assert_eq!(preset_label(DYE_PRESETS, 512), Some("medium"));
        assert_eq!(preset_label(SIM_PRESETS, 128), Some("128"));
        assert_eq!(preset_label(DYE_PRESETS, 300), None);
        assert_eq!(describe_resolution(BLOOM_PRESETS, 256), "medium");
        assert_eq!(describe_resolution(SUNRAYS_PRESETS, 100), "custom");
    }

    #[test]
    fn test_presets_are_ordered() {
        for presets in [DYE_PRESETS, BLOOM_PRESETS, SUNRAYS_PRESETS] {
            assert!(presets.windows(2).all(|w| w[0].resolution > w[1].resolution));
        }
        assert!(SIM_PRESETS.windows(2).all(|w| w[0].resolution < w[1].resolution));
    }
}
