//! GPU 设备上下文
//!
//! 持有 wgpu 的 adapter / device / queue，以及启动时探测到的能力。
//! 窗口模式与无窗口（测试、基准）模式共用同一套初始化流程。

use crate::core::error::{FluidError, FluidResult, RenderError, RenderResult};

/// 设备能力
#[derive(Debug, Clone)]
pub struct GpuCapabilities {
    /// 32 位浮点纹理是否支持线性过滤
    pub float32_filterable: bool,
}

/// GPU 上下文
pub struct GpuContext {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub capabilities: GpuCapabilities,
}

impl GpuContext {
    /// 创建无窗口上下文
    pub fn headless() -> RenderResult<Self> {
        let instance = wgpu::Instance::default();
        pollster::block_on(Self::request(&instance, None))
    }

    /// 创建与给定表面兼容的上下文
    pub fn for_surface(instance: &wgpu::Instance, surface: &wgpu::Surface<'_>) -> RenderResult<Self> {
        pollster::block_on(Self::request(instance, Some(surface)))
    }

    async fn request(
        instance: &wgpu::Instance,
        compatible_surface: Option<&wgpu::Surface<'_>>,
    ) -> RenderResult<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::NoAdapter)?;

        // 可选特性：有则请求，没有则由调用方走降级路径
        let float32_filterable = adapter
            .features()
            .contains(wgpu::Features::FLOAT32_FILTERABLE);
        let mut required_features = wgpu::Features::empty();
        if float32_filterable {
            required_features |= wgpu::Features::FLOAT32_FILTERABLE;
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Fluid Device"),
                    required_features,
                    required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                },
                None,
            )
            .await
            .map_err(|e| RenderError::DeviceRequest(e.to_string()))?;

        device.on_uncaptured_error(Box::new(|error| {
            tracing::error!(target: "fluid", "Uncaptured GPU error: {}", error);
        }));

        let info = adapter.get_info();
        tracing::info!(
            target: "fluid",
            "GPU adapter: {} ({:?}), float32 filtering: {}",
            info.name,
            info.backend,
            float32_filterable
        );

        Ok(Self {
            adapter,
            device,
            queue,
            capabilities: GpuCapabilities { float32_filterable },
        })
    }

    /// 开始捕获 GPU 错误
    pub fn begin_error_scope(&self) {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
    }

    /// 结束捕获，返回作用域内出现的第一个错误
    pub fn end_error_scope(&self) -> FluidResult<()> {
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        match out_of_memory.or(validation) {
            Some(error) => Err(FluidError::from_wgpu(&error)),
            None => Ok(()),
        }
    }

    /// 提交命令并阻塞等待队列完成
    pub fn submit_and_wait(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
        self.device.poll(wgpu::Maintain::Wait);
    }

    pub fn create_encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }
}
