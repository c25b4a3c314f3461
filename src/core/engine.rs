//! 引擎主入口
//!
//! 创建窗口和表面，把平台事件送进模拟的输入队列，并在每次重绘时推进一帧。

use std::sync::OnceLock;
use std::time::Instant;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{reload, EnvFilter, Registry};

use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};

use crate::config::{FluidConfig, LoggingConfig};
use crate::platform::winit::{translate_event, WinitWindow};
use crate::platform::{InputEvent, KeyCode, Window};
use crate::render::capture::save_png;
use crate::render::field::RenderTarget;
use crate::render::gpu::GpuContext;
use crate::simulation::FluidSimulation;

use super::error::{FluidError, FluidResult, RenderError};

static LOG_FILTER: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// 帧间隔上限，避免窗口拖动等长停顿后颜色计时跳变
const MAX_FRAME_DT: f32 = 1.0 / 60.0;

/// 流体应用主结构
///
/// # 示例
///
/// ```no_run
/// use stable_fluid::config::FluidConfig;
/// use stable_fluid::core::Engine;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     Engine::run(FluidConfig::load_or_default(None))?;
///     Ok(())
/// }
/// ```
pub struct Engine;

/// 事件循环持有的运行时状态
struct Runtime {
    window: WinitWindow,
    gpu: GpuContext,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    simulation: FluidSimulation,
    cursor: (f32, f32),
    last_frame: Instant,
    /// 结束主循环的致命错误
    failure: Option<FluidError>,
}

impl Engine {
    /// 运行主循环，直到窗口关闭、按下 Escape 或某一帧出现致命错误
    ///
    /// 致命错误会结束主循环并在这里返回。
    pub fn run(config: FluidConfig) -> FluidResult<()> {
        Self::initialize_logging(&config.logging);
        tracing::info!(target: "engine", "Stable fluid starting");

        let event_loop = EventLoop::new()
            .map_err(|e| FluidError::EventLoop(format!("Failed to create event loop: {}", e)))?;
        let runtime = Self::initialize(&event_loop, config)?;
        Self::run_event_loop(event_loop, runtime)?;

        tracing::info!(target: "engine", "Shutting down");
        Ok(())
    }

    /// 初始化日志系统
    ///
    /// `RUST_LOG` 优先，未设置时使用配置中的级别。
    /// 可以重复调用：订阅者只安装一次，之后的调用只更新级别。
    pub fn initialize_logging(config: &LoggingConfig) {
        let level = config.level.as_directive();
        if let Some(handle) = LOG_FILTER.get() {
            if std::env::var_os("RUST_LOG").is_none() {
                let _ = handle.reload(EnvFilter::new(level));
            }
            return;
        }

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        let (filter, handle) = reload::Layer::new(filter);
        let installed = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .is_ok();
        if installed {
            let _ = LOG_FILTER.set(handle);
        }
    }

    fn initialize(event_loop: &EventLoop<()>, config: FluidConfig) -> FluidResult<Runtime> {
        let window = WinitWindow::new(event_loop, &config.window)?;

        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window.shared())
            .map_err(|e| RenderError::SurfaceCreation(e.to_string()))?;
        let gpu = GpuContext::for_surface(&instance, &surface)?;

        let (width, height) = window.size();
        let surface_config = Self::surface_config(&gpu, &surface, width, height);
        surface.configure(&gpu.device, &surface_config);

        let simulation =
            FluidSimulation::new(&gpu, config, (surface_config.width, surface_config.height))?;

        Ok(Runtime {
            window,
            gpu,
            surface,
            surface_config,
            simulation,
            cursor: (0.0, 0.0),
            last_frame: Instant::now(),
            failure: None,
        })
    }

    /// 表面配置：优先非 sRGB 格式，伽马由显示内核自行处理
    fn surface_config(
        gpu: &GpuContext,
        surface: &wgpu::Surface<'_>,
        width: u32,
        height: u32,
    ) -> wgpu::SurfaceConfiguration {
        let caps = surface.get_capabilities(&gpu.adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .unwrap_or(wgpu::TextureFormat::Bgra8Unorm);
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        tracing::info!(target: "engine", "Surface format {:?}", format);

        wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        }
    }

    fn run_event_loop(event_loop: EventLoop<()>, mut runtime: Runtime) -> FluidResult<()> {
        event_loop.set_control_flow(ControlFlow::Poll);
        event_loop
            .run(|event, elwt| match event {
                Event::WindowEvent { event, .. } => {
                    Self::handle_window_event(&event, &mut runtime, elwt);
                }
                Event::AboutToWait if runtime.failure.is_none() => runtime.window.request_redraw(),
                _ => {}
            })
            .map_err(|e| FluidError::EventLoop(format!("Event loop error: {}", e)))?;

        match runtime.failure.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// 处理窗口事件
    fn handle_window_event(
        event: &WindowEvent,
        runtime: &mut Runtime,
        elwt: &EventLoopWindowTarget<()>,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                elwt.exit();
                return;
            }
            WindowEvent::CursorMoved { position, .. } => {
                runtime.cursor = (position.x as f32, position.y as f32);
            }
            WindowEvent::Resized(size) if size.width > 0 && size.height > 0 => {
                runtime.surface_config.width = size.width;
                runtime.surface_config.height = size.height;
                runtime
                    .surface
                    .configure(&runtime.gpu.device, &runtime.surface_config);
            }
            WindowEvent::RedrawRequested => {
                if runtime.failure.is_some() {
                    return;
                }
                match Self::render_frame(runtime) {
                    Ok(()) => {}
                    Err(e) if e.is_fatal() => {
                        tracing::error!(target: "engine", "Frame failed, stopping: {}", e);
                        runtime.failure = Some(e);
                        elwt.exit();
                    }
                    Err(e) => tracing::warn!(target: "engine", "Frame error: {}", e),
                }
                return;
            }
            _ => {}
        }

        match translate_event(event, runtime.cursor) {
            Some(InputEvent::KeyPressed {
                key: KeyCode::Escape,
            }) => elwt.exit(),
            Some(input) => runtime.simulation.push_input(input),
            None => {}
        }
    }

    /// 推进一帧并呈现；有截图请求时随后导出
    fn render_frame(runtime: &mut Runtime) -> FluidResult<()> {
        let _span = tracing::info_span!(target: "engine", "frame").entered();

        let now = Instant::now();
        let frame_dt = now
            .duration_since(runtime.last_frame)
            .as_secs_f32()
            .min(MAX_FRAME_DT);
        runtime.last_frame = now;

        let frame = match runtime.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                runtime
                    .surface
                    .configure(&runtime.gpu.device, &runtime.surface_config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                tracing::warn!(target: "engine", "Surface timed out, skipping frame");
                return Ok(());
            }
            Err(e) => return Err(RenderError::Surface(e.to_string()).into()),
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let target = RenderTarget::external(
            &view,
            runtime.surface_config.format,
            runtime.surface_config.width,
            runtime.surface_config.height,
        );

        let result = runtime.simulation.tick(&runtime.gpu, target, frame_dt);
        frame.present();
        result?;

        if runtime.simulation.take_capture_request() {
            let image = runtime.simulation.capture(&runtime.gpu)?;
            save_png(&image, &runtime.simulation.config().capture)?;
        }
        Ok(())
    }
}
