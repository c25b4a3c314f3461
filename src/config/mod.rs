/// 统一配置系统
///
/// 提供 TOML/JSON 配置文件、环境变量覆盖和运行时更新。
/// 加载失败时就地回退到内置默认值，从不视为致命错误。
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod resolution;

pub use resolution::{
    describe_resolution, get_resolution, ResolutionPreset, BLOOM_PRESETS, DYE_PRESETS, SIM_PRESETS,
    SUNRAYS_PRESETS,
};

use crate::impl_default;
use crate::render::display::DisplayMode;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件读取错误
    #[error("Config file error: {0}")]
    FileError(#[from] std::io::Error),
    /// 解析错误
    #[error("Config parse error: {0}")]
    ParseError(String),
    /// 验证错误
    #[error("Config validation error: {0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 主配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FluidConfig {
    /// 窗口配置
    #[serde(default)]
    pub window: WindowConfig,

    /// 求解器配置
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Bloom 配置
    #[serde(default)]
    pub bloom: BloomConfig,

    /// Sunrays 配置
    #[serde(default)]
    pub sunrays: SunraysConfig,

    /// 显示配置
    #[serde(default)]
    pub display: DisplayConfig,

    /// 截图配置
    #[serde(default)]
    pub capture: CaptureConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl FluidConfig {
    /// 从TOML文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_toml_str(&content)
    }

    /// 从TOML字符串解析配置
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_json_str(&content)
    }

    /// 从JSON字符串解析配置
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 按扩展名加载（`.json` 走 JSON，其余走 TOML）
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_file(path),
            _ => Self::from_toml_file(path),
        }
    }

    /// 保存为TOML文件
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 保存为JSON文件
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 从环境变量覆盖配置
    pub fn apply_env_overrides(&mut self) {
        if let Some(res) = env_parse("FLUID_SIM_RESOLUTION") {
            self.simulation.sim_resolution = res;
        }
        if let Some(res) = env_parse("FLUID_DYE_RESOLUTION") {
            self.simulation.dye_resolution = res;
        }
        if let Some(iterations) = env_parse("FLUID_PRESSURE_ITERATIONS") {
            self.simulation.pressure_iterations = iterations;
        }
        if let Some(paused) = env_parse("FLUID_PAUSED") {
            self.simulation.paused = paused;
        }
        if let Some(half_float) = env_parse("FLUID_HALF_FLOAT") {
            self.simulation.half_float = half_float;
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        self.window.validate()?;
        self.simulation.validate()?;
        self.bloom.validate()?;
        self.sunrays.validate()?;
        Ok(())
    }

    /// 查找并加载配置文件
    ///
    /// 按以下顺序查找：
    /// 1. 显式传入的路径
    /// 2. ./fluid.toml
    /// 3. ./fluid.json
    /// 4. <config_dir>/stable_fluid/config.toml
    /// 5. 使用默认配置
    ///
    /// 文件存在但无法解析或校验失败时记录警告并继续查找。
    pub fn load_or_default(explicit: Option<&Path>) -> Self {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(path) = explicit {
            candidates.push(path.to_path_buf());
        }
        candidates.push(PathBuf::from("fluid.toml"));
        candidates.push(PathBuf::from("fluid.json"));
        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join("stable_fluid").join("config.toml"));
        }

        for path in candidates {
            if !path.exists() {
                continue;
            }
            match Self::from_file(&path).and_then(|c| c.validate().map(|_| c)) {
                Ok(mut config) => {
                    tracing::info!(target: "config", "Loaded config from {:?}", path);
                    config.apply_env_overrides();
                    return config;
                }
                Err(e) => {
                    tracing::warn!(target: "config", "Ignoring config {:?}: {}", path, e);
                }
            }
        }

        tracing::info!(target: "config", "Using default configuration");
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

/// 窗口配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl_default!(WindowConfig {
    width: 1280,
    height: 720,
    title: "Stable Fluid".to_string(),
});

impl WindowConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::ValidationError(
                "Invalid window size".to_string(),
            ));
        }
        Ok(())
    }
}

/// 求解器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// 速度/压力网格的基准分辨率
    pub sim_resolution: u32,
    /// 染料场的基准分辨率
    pub dye_resolution: u32,
    /// 使用 16 位浮点纹理
    pub half_float: bool,
    /// 使用硬件线性过滤（否则平流走手动双线性插值）
    pub linear_filtering: bool,
    /// 固定时间步长（秒）
    pub dt: f32,
    /// 涡度约束强度
    pub curl: f32,
    /// 压力每帧衰减因子（<1）
    pub pressure: f32,
    /// Jacobi 迭代次数
    pub pressure_iterations: u32,
    /// 速度平流衰减因子（<1）
    pub velocity_dissipation: f32,
    /// 染料平流衰减因子（<1）
    pub density_dissipation: f32,
    /// 溅射半径
    pub splat_radius: f32,
    /// 指针速度到冲量的缩放
    pub splat_force: f32,
    /// 周期性刷新指针颜色
    pub colorful: bool,
    /// 颜色刷新速度（每秒次数）
    pub color_update_speed: f32,
    /// 启动时暂停
    pub paused: bool,
    /// 启动时进入单步模式
    pub stepping: bool,
}

impl_default!(SimulationConfig {
    sim_resolution: 128,
    dye_resolution: 1024,
    half_float: true,
    linear_filtering: true,
    dt: 0.016,
    curl: 30.0,
    pressure: 0.8,
    pressure_iterations: 20,
    velocity_dissipation: 0.99,
    density_dissipation: 0.98,
    splat_radius: 0.25,
    splat_force: 6000.0,
    colorful: true,
    color_update_speed: 10.0,
    paused: false,
    stepping: false,
});

impl SimulationConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.sim_resolution < 2 || self.dye_resolution < 2 {
            return Err(ConfigError::ValidationError(
                "Field resolutions must be at least 2".to_string(),
            ));
        }
        if !(self.dt > 0.0) {
            return Err(ConfigError::ValidationError(
                "Timestep must be positive".to_string(),
            ));
        }
        for (name, value) in [
            ("pressure", self.pressure),
            ("velocity_dissipation", self.velocity_dissipation),
            ("density_dissipation", self.density_dissipation),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.splat_radius <= 0.0 {
            return Err(ConfigError::ValidationError(
                "Splat radius must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Bloom 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomConfig {
    pub enabled: bool,
    /// 最多降采样级数（实际级数可能更少）
    pub iterations: u32,
    pub resolution: u32,
    pub intensity: f32,
    pub threshold: f32,
    pub soft_knee: f32,
}

impl_default!(BloomConfig {
    enabled: true,
    iterations: 8,
    resolution: 256,
    intensity: 0.8,
    threshold: 0.6,
    soft_knee: 0.7,
});

impl BloomConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.resolution < 2 {
            return Err(ConfigError::ValidationError(
                "Bloom resolution must be at least 2".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.soft_knee) {
            return Err(ConfigError::ValidationError(
                "Bloom soft knee must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Sunrays 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SunraysConfig {
    pub enabled: bool,
    pub resolution: u32,
    pub weight: f32,
}

impl_default!(SunraysConfig {
    enabled: true,
    resolution: 196,
    weight: 1.0,
});

impl SunraysConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.resolution < 2 {
            return Err(ConfigError::ValidationError(
                "Sunrays resolution must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}

/// 显示配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub mode: DisplayMode,
    pub shading: bool,
    pub back_color: [f32; 3],
}

impl_default!(DisplayConfig {
    mode: DisplayMode::Composite,
    shading: true,
    back_color: [0.0, 0.0, 0.0],
});

/// 截图配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub directory: PathBuf,
    pub file_prefix: String,
}

impl_default!(CaptureConfig {
    directory: dirs::picture_dir().unwrap_or_else(|| PathBuf::from(".")),
    file_prefix: "fluid".to_string(),
});

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 未设置 `RUST_LOG` 时使用的日志级别
    pub level: LogLevel,
}

impl_default!(LoggingConfig {
    level: LogLevel::Info,
});

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// `EnvFilter` 可接受的指令字符串
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FluidConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.simulation.sim_resolution, 128);
        assert_eq!(config.simulation.pressure_iterations, 20);
        assert_eq!(config.bloom.iterations, 8);
    }

    #[test]
    fn test_toml_serialization() {
        let config = FluidConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: FluidConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_json_serialization() {
        let config = FluidConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed = FluidConfig::from_json_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = FluidConfig::from_toml_str(
            r#"
            [simulation]
            curl = 12.5
            pressure_iterations = 40

            [display]
            mode = "velocity"
            "#,
        )
        .unwrap();
        assert_eq!(config.simulation.curl, 12.5);
        assert_eq!(config.simulation.pressure_iterations, 40);
        assert_eq!(config.simulation.dye_resolution, 1024);
        assert_eq!(config.display.mode, DisplayMode::Velocity);
        assert!(config.bloom.enabled);
    }

    #[test]
    fn test_invalid_config() {
        let mut config = FluidConfig::default();
        config.simulation.pressure = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        let mut config = FluidConfig::default();
        config.window.width = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_error() {
        let result = FluidConfig::from_toml_str("simulation = [");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_falls_back_on_broken_file() {
        let dir = std::env::temp_dir().join(format!("stable_fluid_cfg_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("broken.toml");
        fs::write(&path, "[simulation\ncurl = ").unwrap();

        let config = FluidConfig::load_or_default(Some(&path));
        assert_eq!(config.simulation.curl, SimulationConfig::default().curl);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_save_and_reload() -> anyhow::Result<()> {
        let dir = std::env::temp_dir().join(format!("stable_fluid_save_{}", std::process::id()));
        fs::create_dir_all(&dir)?;

        let mut config = FluidConfig::default();
        config.sunrays.weight = 0.5;
        let toml_path = dir.join("fluid.toml");
        config.save_toml(&toml_path)?;
        assert_eq!(FluidConfig::from_file(&toml_path)?, config);

        let json_path = dir.join("fluid.json");
        config.save_json(&json_path)?;
        assert_eq!(FluidConfig::from_file(&json_path)?, config);

        fs::remove_dir_all(&dir)?;
        Ok(())
    }
}
