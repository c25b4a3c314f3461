//! 统一错误处理模块
//!
//! 求解器范围内的错误类型定义
//!
//! ## 错误分类
//!
//! - **内核构建失败** (`KernelBuild`): 着色器模块或管线创建失败，启动阶段即为致命错误
//! - **契约错误** (`UniformNotFound` / `UniformMismatch` / `UnboundSlot`): 调用方绑定了内核未声明的槽位，
//!   或遗漏了声明的槽位 (`UnboundSlot`)，属于编程错误，从不静默忽略
//! - **GPU 错误** (`Gpu`): 每帧结束时从错误作用域取出，附带数字错误码
//! - **配置错误**: 见 `config::ConfigError`，在加载处就地恢复为默认值
//!
//! 所有错误都不重试：它们表示逻辑或环境缺陷，而非瞬时状态。
//! 运行期间除截图写盘失败外，任何一帧出错都会结束主循环（见 [`FluidError::is_fatal`]）。

use thiserror::Error;

use crate::config::ConfigError;

/// 求解器顶层错误类型
#[derive(Error, Debug)]
pub enum FluidError {
    #[error("Kernel '{kernel}' failed to build: {reason}")]
    KernelBuild { kernel: &'static str, reason: String },

    #[error("Kernel '{kernel}' has no binding named '{name}'")]
    UniformNotFound { kernel: &'static str, name: String },

    #[error("Kernel '{kernel}' slot '{name}' was not bound")]
    UnboundSlot { kernel: &'static str, name: &'static str },

    #[error("Kernel '{kernel}' expects a {expected}-byte uniform block, got {actual} bytes")]
    UniformMismatch {
        kernel: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("GPU error {code}: {message}")]
    Gpu { code: u32, message: String },

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Window creation failed: {0}")]
    Window(String),

    #[error("Event loop error: {0}")]
    EventLoop(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FluidError {
    /// 将 wgpu 错误转换为带数字错误码的 GPU 错误
    pub fn from_wgpu(error: &wgpu::Error) -> Self {
        let code = match error {
            wgpu::Error::OutOfMemory { .. } => GPU_ERROR_OUT_OF_MEMORY,
            wgpu::Error::Validation { .. } => GPU_ERROR_VALIDATION,
            #[allow(unreachable_patterns)]
            _ => GPU_ERROR_OTHER,
        };
        FluidError::Gpu {
            code,
            message: error.to_string(),
        }
    }

    /// 运行期间出现时是否应当终止主循环
    ///
    /// 只有截图的编码与写盘失败可以跳过，其余错误都意味着后续帧会基于错误数据继续求解。
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FluidError::Image(_) | FluidError::Io(_))
    }
}

/// GPU 内存不足
pub const GPU_ERROR_OUT_OF_MEMORY: u32 = 1;
/// GPU 校验错误
pub const GPU_ERROR_VALIDATION: u32 = 2;
/// 其他 GPU 错误
pub const GPU_ERROR_OTHER: u32 = 3;

/// 渲染设备层错误
#[derive(Error, Debug, Clone)]
pub enum RenderError {
    #[error("Failed to create surface: {0}")]
    SurfaceCreation(String),

    #[error("Failed to request adapter: no compatible GPU found")]
    NoAdapter,

    #[error("Failed to request device: {0}")]
    DeviceRequest(String),

    #[error("Surface error: {0}")]
    Surface(String),

    #[error("Readback failed: {0}")]
    Readback(String),

    #[error("Invalid render state: {0}")]
    InvalidState(String),
}

pub type FluidResult<T> = Result<T, FluidError>;
pub type RenderResult<T> = Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let render_err = RenderError::NoAdapter;
        let fluid_err: FluidError = render_err.into();
        assert!(matches!(fluid_err, FluidError::Render(RenderError::NoAdapter)));
    }

    #[test]
    fn test_error_display() {
        let err = FluidError::UniformNotFound {
            kernel: "curl",
            name: "u_pressure".to_string(),
        };
        assert_eq!(err.to_string(), "Kernel 'curl' has no binding named 'u_pressure'");

        let err = FluidError::Gpu {
            code: GPU_ERROR_VALIDATION,
            message: "bad binding".to_string(),
        };
        assert_eq!(err.to_string(), "GPU error 2: bad binding");
    }

    #[test]
    fn test_runtime_errors_are_fatal() {
        let contract = [
            FluidError::UniformNotFound {
                kernel: "curl",
                name: "u_pressure".to_string(),
            },
            FluidError::UnboundSlot {
                kernel: "curl",
                name: "u_velocity",
            },
            FluidError::UniformMismatch {
                kernel: "curl",
                expected: 16,
                actual: 32,
            },
            FluidError::Gpu {
                code: GPU_ERROR_VALIDATION,
                message: "bad binding".to_string(),
            },
            FluidError::Render(RenderError::InvalidState("same field".to_string())),
        ];
        assert!(contract.iter().all(FluidError::is_fatal));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        assert!(!FluidError::Io(io).is_fatal());
    }
}
