//! 渲染系统
//!
//! 所有计算都以全屏三角形渲染管线的形式在 GPU 上完成：
//! - `gpu` - 设备上下文与错误作用域
//! - `field` / `double_field` - 场缓冲区
//! - `kernels` - 内核注册表与着色器
//! - `postprocess` - Bloom 与 Sunrays
//! - `display` - 最终合成
//! - `capture` - 截图导出

pub mod capture;
pub mod display;
pub mod double_field;
pub mod field;
pub mod gpu;
pub mod kernels;
pub mod postprocess;

pub use double_field::{DoubleBuffer, DoubleField};
pub use field::{Field, FieldChannels, FieldFormat, FieldShape, Precision, RenderTarget};
pub use gpu::{GpuCapabilities, GpuContext};
pub use kernels::{BlendMode, KernelFeatures, KernelId, KernelPass, KernelRegistry};
