//! 溅射：向速度场注入冲量、向染料场注入颜色
//!
//! 调用方坐标为归一化视口坐标，原点在左下角、y 向上；
//! 写入场之前统一转换到纹理空间（原点左上、y 向下）。

use glam::Vec3;
use rand::Rng;

use crate::render::kernels::SplatUniforms;

/// 随机溅射的冲量范围（每轴 ±半幅）
const RANDOM_IMPULSE: f32 = 1000.0;
/// 随机溅射颜色增益
const RANDOM_COLOR_GAIN: f32 = 10.0;

/// 一次溅射
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Splat {
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
    pub color: Vec3,
}

impl Splat {
    pub fn new(x: f32, y: f32, dx: f32, dy: f32, color: Vec3) -> Self {
        Self { x, y, dx, dy, color }
    }

    /// 随机位置、随机冲量、随机高亮颜色
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let color = generate_color(rng) * RANDOM_COLOR_GAIN;
        Self {
            x: rng.gen(),
            y: rng.gen(),
            dx: RANDOM_IMPULSE * (rng.gen::<f32>() - 0.5),
            dy: RANDOM_IMPULSE * (rng.gen::<f32>() - 0.5),
            color,
        }
    }

    fn point(&self) -> [f32; 2] {
        [self.x, 1.0 - self.y]
    }

    /// 速度场的 Uniform：颜色通道携带冲量
    pub fn velocity_uniforms(&self, radius: f32, aspect_ratio: f32) -> SplatUniforms {
        SplatUniforms {
            point: self.point(),
            aspect_ratio,
            radius: correct_radius(radius, aspect_ratio),
            color: [self.dx, -self.dy, 0.0, 1.0],
        }
    }

    /// 染料场的 Uniform
    pub fn dye_uniforms(&self, radius: f32, aspect_ratio: f32) -> SplatUniforms {
        SplatUniforms {
            point: self.point(),
            aspect_ratio,
            radius: correct_radius(radius, aspect_ratio),
            color: [self.color.x, self.color.y, self.color.z, 1.0],
        }
    }
}

/// 配置半径以百分比给出；横屏时按宽高比放大，使溅射在屏幕上保持圆形
pub fn correct_radius(radius: f32, aspect_ratio: f32) -> f32 {
    let radius = radius / 100.0;
    if aspect_ratio > 1.0 {
        radius * aspect_ratio
    } else {
        radius
    }
}

/// 随机一批溅射数量（5..25）
pub fn random_splat_count<R: Rng + ?Sized>(rng: &mut R) -> usize {
    rng.gen_range(5..25)
}

/// HSV 转 RGB，h/s/v 均在 [0, 1]
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Vec3 {
    let i = (h * 6.0).floor();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);

    match (i as i32).rem_euclid(6) {
        0 => Vec3::new(v, t, p),
        1 => Vec3::new(q, v, p),
        2 => Vec3::new(p, v, t),
        3 => Vec3::new(p, q, v),
        4 => Vec3::new(t, p, v),
        _ => Vec3::new(v, p, q),
    }
}

/// 随机色相的暗色，作为指针染料颜色
pub fn generate_color<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    hsv_to_rgb(rng.gen(), 1.0, 1.0) * 0.15
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_radius_correction() {
        assert!((correct_radius(0.25, 1.0) - 0.0025).abs() < 1e-7);
        assert!((correct_radius(0.25, 2.0) - 0.005).abs() < 1e-7);
        assert!((correct_radius(0.25, 0.5) - 0.0025).abs() < 1e-7);
    }

    #[test]
    fn test_uniforms_flip_to_texture_space() {
        let splat = Splat::new(0.25, 0.75, 10.0, 150.0, Vec3::new(1.0, 0.5, 0.0));
        let velocity = splat.velocity_uniforms(0.25, 1.0);
        assert_eq!(velocity.point, [0.25, 0.25]);
        assert_eq!(velocity.color, [10.0, -150.0, 0.0, 1.0]);

        let dye = splat.dye_uniforms(0.25, 1.0);
        assert_eq!(dye.color, [1.0, 0.5, 0.0, 1.0]);
    }

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(hsv_to_rgb(1.0 / 3.0, 1.0, 1.0).round(), Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(hsv_to_rgb(0.5, 0.0, 0.8), Vec3::splat(0.8));
    }

    #[test]
    fn test_random_splats_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let splat = Splat::random(&mut rng);
            assert!((0.0..1.0).contains(&splat.x));
            assert!((0.0..1.0).contains(&splat.y));
            assert!(splat.dx.abs() <= RANDOM_IMPULSE * 0.5);
            assert!(splat.dy.abs() <= RANDOM_IMPULSE * 0.5);
            assert!(splat.color.max_element() <= 0.15 * RANDOM_COLOR_GAIN + 1e-5);

            let count = random_splat_count(&mut rng);
            assert!((5..25).contains(&count));
        }
    }
}
