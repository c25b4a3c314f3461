//! 每帧调度
//!
//! 一帧的固定顺序：
//! 1. 取空输入队列，更新指针与控制状态
//! 2. 若尺寸标记为脏，重建各个场（在任何溅射或求解之前）
//! 3. 刷新指针颜色
//! 4. 处理待执行的随机溅射与指针溅射
//! 5. 未暂停时推进一个固定时间步；单步模式下随后自动暂停
//! 6. 合成模式下执行后处理，最后绘制到目标

use crossbeam_channel::Sender;
use glam::{Vec2, Vec3};
use image::RgbImage;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{
    describe_resolution, get_resolution, ConfigResult, FluidConfig, BLOOM_PRESETS, DYE_PRESETS,
    SIM_PRESETS, SUNRAYS_PRESETS,
};
use crate::core::error::FluidResult;
use crate::input::{aspect_ratio, InputQueue, PointerId, PointerSet};
use crate::platform::{InputEvent, KeyCode, MouseButton};
use crate::render::capture::field_to_image;
use crate::render::display::{Display, DisplayMode};
use crate::render::field::{Precision, RenderTarget};
use crate::render::gpu::GpuContext;
use crate::render::kernels::KernelRegistry;
use crate::render::postprocess::PostProcess;
use crate::simulation::solver::Solver;
use crate::simulation::splat::{generate_color, random_splat_count, Splat};
use crate::simulation::state::{FieldLayout, SimulationState};

/// 手动测试溅射的竖直冲量
const TEST_SPLAT_IMPULSE: f32 = 150.0;

/// 运行控制状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlState {
    pub paused: bool,
    /// 单步模式：每个未暂停的帧结束后自动暂停
    pub stepping: bool,
    pub gui_visible: bool,
    pub capture_requested: bool,
}

/// 流体模拟
pub struct FluidSimulation {
    config: FluidConfig,
    kernels: KernelRegistry,
    solver: Solver,
    post: PostProcess,
    display: Display,
    input: InputQueue,
    pointers: PointerSet,
    control: ControlState,
    viewport: (u32, u32),
    dirty: bool,
    splat_stack: Vec<usize>,
    pending_splats: Vec<Splat>,
    color_timer: f32,
    rng: StdRng,
}

impl FluidSimulation {
    pub fn new(gpu: &GpuContext, config: FluidConfig, viewport: (u32, u32)) -> FluidResult<Self> {
        Self::with_rng(gpu, config, viewport, StdRng::from_entropy())
    }

    /// 使用给定随机源创建（测试中用固定种子）
    pub fn with_rng(
        gpu: &GpuContext,
        config: FluidConfig,
        viewport: (u32, u32),
        mut rng: StdRng,
    ) -> FluidResult<Self> {
        let viewport = (viewport.0.max(1), viewport.1.max(1));
        let precision = precision_of(&config);
        let kernels = KernelRegistry::new(gpu, filterable(gpu, &config))?;
        let state = SimulationState::new(gpu, field_layout(&config, viewport, precision));
        let post = PostProcess::new(gpu, &config, viewport, precision);
        let display = Display::new(gpu)?;

        let control = ControlState {
            paused: config.simulation.paused,
            stepping: config.simulation.stepping,
            gui_visible: true,
            capture_requested: false,
        };

        // 启动时来一阵随机溅射
        let splat_stack = vec![random_splat_count(&mut rng)];

        tracing::info!(
            target: "fluid",
            "Fluid simulation ready: viewport {}x{}, {} pressure iterations",
            viewport.0,
            viewport.1,
            config.simulation.pressure_iterations
        );

        Ok(Self {
            config,
            kernels,
            solver: Solver::new(state),
            post,
            display,
            input: InputQueue::new(),
            pointers: PointerSet::new(),
            control,
            viewport,
            dirty: false,
            splat_stack,
            pending_splats: Vec::new(),
            color_timer: 0.0,
            rng,
        })
    }

    pub fn config(&self) -> &FluidConfig {
        &self.config
    }

    pub fn control(&self) -> ControlState {
        self.control
    }

    pub fn state(&self) -> &SimulationState {
        self.solver.state()
    }

    pub fn pointers(&self) -> &PointerSet {
        &self.pointers
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// 输入事件发送端
    pub fn input_sender(&self) -> Sender<InputEvent> {
        self.input.sender()
    }

    pub fn push_input(&self, event: InputEvent) {
        self.input.push(event);
    }

    /// 清空启动时排队的随机溅射
    pub fn clear_pending_splats(&mut self) {
        self.splat_stack.clear();
        self.pending_splats.clear();
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.control.paused = paused;
        tracing::info!(target: "fluid", "Simulation {}", if paused { "paused" } else { "resumed" });
    }

    /// 进入单步模式并放行一帧
    pub fn step_once(&mut self) {
        self.control.stepping = true;
        self.control.paused = false;
    }

    /// 视口尺寸变化，下一帧开始时生效
    pub fn resize_viewport(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 || (width, height) == self.viewport {
            return;
        }
        self.viewport = (width, height);
        self.dirty = true;
    }

    /// 运行时替换配置，下一帧开始时生效
    ///
    /// 配置里的 `paused` / `stepping` 只是初始值，这里不会覆盖当前的运行控制状态。
    pub fn update_config(&mut self, config: FluidConfig) -> ConfigResult<()> {
        config.validate()?;
        self.config = config;
        self.dirty = true;
        Ok(())
    }

    /// 取走截图请求
    pub fn take_capture_request(&mut self) -> bool {
        std::mem::take(&mut self.control.capture_requested)
    }

    /// 一帧：更新 + 渲染，包在一个 GPU 错误作用域里
    pub fn tick(
        &mut self,
        gpu: &GpuContext,
        target: RenderTarget<'_>,
        frame_dt: f32,
    ) -> FluidResult<()> {
        gpu.begin_error_scope();
        let mut encoder = gpu.create_encoder("Fluid Tick");
        let result = self
            .update(gpu, &mut encoder, frame_dt)
            .and_then(|_| self.render(gpu, &mut encoder, target));
        gpu.queue.submit(std::iter::once(encoder.finish()));
        let scope = gpu.end_error_scope();
        result.and(scope)
    }

    /// 推进模拟（不渲染）
    pub fn update(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        frame_dt: f32,
    ) -> FluidResult<()> {
        self.process_input();
        if self.dirty {
            self.apply_layout(gpu)?;
        }
        self.update_colors(frame_dt);
        self.apply_inputs(gpu, encoder)?;

        if !self.control.paused {
            let dt = self.config.simulation.dt;
            self.solver
                .step(gpu, &mut self.kernels, encoder, &self.config.simulation, dt)?;
            if self.control.stepping {
                self.control.paused = true;
            }
        }
        Ok(())
    }

    /// 后处理 + 合成
    pub fn render(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        target: RenderTarget<'_>,
    ) -> FluidResult<()> {
        let state = self.solver.state();
        if self.config.display.mode.uses_post_process()
            && (self.config.bloom.enabled || self.config.sunrays.enabled)
        {
            self.post
                .apply(gpu, &mut self.kernels, encoder, &state.dye, &self.config)?;
        }
        self.display.render(
            gpu,
            &mut self.kernels,
            encoder,
            state,
            &self.post,
            &self.config,
            target,
        )
    }

    /// 立即执行一次溅射
    pub fn splat(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        splat: &Splat,
    ) -> FluidResult<()> {
        let aspect = aspect_ratio(self.viewport);
        self.solver.splat(
            gpu,
            &mut self.kernels,
            encoder,
            splat,
            self.config.simulation.splat_radius,
            aspect,
        )
    }

    /// 立即执行 `amount` 次随机溅射
    pub fn multiple_splats(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        amount: usize,
    ) -> FluidResult<()> {
        for _ in 0..amount {
            let splat = Splat::random(&mut self.rng);
            self.splat(gpu, encoder, &splat)?;
        }
        Ok(())
    }

    /// 读回当前染料为 8 位 RGB 图像
    pub fn capture(&self, gpu: &GpuContext) -> FluidResult<RgbImage> {
        field_to_image(gpu, self.solver.state().dye.read())
    }

    fn process_input(&mut self) {
        for event in self.input.drain() {
            match event {
                InputEvent::MouseButtonPressed {
                    button: MouseButton::Left,
                    x,
                    y,
                } => {
                    let viewport = self.viewport;
                    self.pointers.get_or_insert(PointerId::Mouse).press(
                        Vec2::new(x, y),
                        viewport,
                        &mut self.rng,
                    );
                }
                InputEvent::MouseMoved { x, y } => {
                    self.pointers
                        .get_or_insert(PointerId::Mouse)
                        .move_to(Vec2::new(x, y), self.viewport);
                }
                InputEvent::MouseButtonReleased {
                    button: MouseButton::Left,
                    ..
                } => self.pointers.get_or_insert(PointerId::Mouse).release(),
                InputEvent::TouchStart { id, x, y } => {
                    let viewport = self.viewport;
                    self.pointers.get_or_insert(PointerId::Touch(id)).press(
                        Vec2::new(x, y),
                        viewport,
                        &mut self.rng,
                    );
                }
                InputEvent::TouchMove { id, x, y } => {
                    self.pointers
                        .get_or_insert(PointerId::Touch(id))
                        .move_to(Vec2::new(x, y), self.viewport);
                }
                InputEvent::TouchEnd { id, .. } => {
                    self.pointers.get_or_insert(PointerId::Touch(id)).release()
                }
                InputEvent::WindowResized { width, height } => self.resize_viewport(width, height),
                InputEvent::KeyPressed { key } => self.handle_key(key),
                _ => {}
            }
        }
    }

    fn handle_key(&mut self, key: KeyCode) {
        tracing::debug!(target: "input", "Key {:?}", key);
        match key {
            KeyCode::P => {
                self.control.stepping = false;
                self.set_paused(!self.control.paused);
            }
            KeyCode::N => self.step_once(),
            KeyCode::G => self.control.gui_visible = !self.control.gui_visible,
            KeyCode::Space => {
                let amount = random_splat_count(&mut self.rng);
                self.splat_stack.push(amount);
            }
            KeyCode::T => self.pending_splats.push(Splat::new(
                0.5,
                0.5,
                0.0,
                TEST_SPLAT_IMPULSE,
                Vec3::new(0.8, 0.8, 0.8),
            )),
            KeyCode::C => self.control.capture_requested = true,
            KeyCode::S => self.config.display.shading = !self.config.display.shading,
            KeyCode::B => self.config.bloom.enabled = !self.config.bloom.enabled,
            KeyCode::R => self.config.sunrays.enabled = !self.config.sunrays.enabled,
            KeyCode::Num1
            | KeyCode::Num2
            | KeyCode::Num3
            | KeyCode::Num4
            | KeyCode::Num5
            | KeyCode::Num6 => {
                let index = match key {
                    KeyCode::Num1 => 0,
                    KeyCode::Num2 => 1,
                    KeyCode::Num3 => 2,
                    KeyCode::Num4 => 3,
                    KeyCode::Num5 => 4,
                    _ => 5,
                };
                if let Some(mode) = DisplayMode::from_index(index) {
                    self.config.display.mode = mode;
                }
            }
            _ => {}
        }
    }

    fn apply_layout(&mut self, gpu: &GpuContext) -> FluidResult<()> {
        let filterable = filterable(gpu, &self.config);
        if filterable != self.kernels.filterable() {
            self.kernels = KernelRegistry::new(gpu, filterable)?;
        }

        let precision = precision_of(&self.config);
        let layout = field_layout(&self.config, self.viewport, precision);
        self.solver
            .state_mut()
            .resize(gpu, &mut self.kernels, layout)?;
        self.post.rebuild(gpu, &self.config, self.viewport, precision);
        self.dirty = false;

        tracing::info!(
            target: "fluid",
            "Applied layout for viewport {}x{}: sim {:?} ({}), dye {:?} ({}), bloom {}, sunrays {}",
            self.viewport.0,
            self.viewport.1,
            layout.sim,
            describe_resolution(SIM_PRESETS, self.config.simulation.sim_resolution),
            layout.dye,
            describe_resolution(DYE_PRESETS, self.config.simulation.dye_resolution),
            describe_resolution(BLOOM_PRESETS, self.config.bloom.resolution),
            describe_resolution(SUNRAYS_PRESETS, self.config.sunrays.resolution)
        );
        Ok(())
    }

    fn update_colors(&mut self, frame_dt: f32) {
        if !self.config.simulation.colorful {
            return;
        }
        self.color_timer += frame_dt * self.config.simulation.color_update_speed;
        if self.color_timer >= 1.0 {
            self.color_timer = self.color_timer.fract();
            for pointer in self.pointers.iter_mut() {
                pointer.color = generate_color(&mut self.rng);
            }
        }
    }

    fn apply_inputs(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
    ) -> FluidResult<()> {
        if let Some(amount) = self.splat_stack.pop() {
            self.multiple_splats(gpu, encoder, amount)?;
        }

        for splat in std::mem::take(&mut self.pending_splats) {
            self.splat(gpu, encoder, &splat)?;
        }

        let force = self.config.simulation.splat_force;
        let moved: Vec<Splat> = self
            .pointers
            .iter_mut()
            .filter(|p| p.moved)
            .map(|p| {
                p.moved = false;
                Splat::new(
                    p.texcoord.x,
                    p.texcoord.y,
                    p.delta.x * force,
                    p.delta.y * force,
                    p.color,
                )
            })
            .collect();
        for splat in &moved {
            self.splat(gpu, encoder, splat)?;
        }
        Ok(())
    }
}

fn precision_of(config: &FluidConfig) -> Precision {
    if config.simulation.half_float {
        Precision::Half
    } else {
        Precision::Full
    }
}

/// 是否使用硬件线性过滤
fn filterable(gpu: &GpuContext, config: &FluidConfig) -> bool {
    if !config.simulation.linear_filtering {
        return false;
    }
    match precision_of(config) {
        Precision::Half => true,
        Precision::Full => {
            if !gpu.capabilities.float32_filterable {
                tracing::warn!(
                    target: "fluid",
                    "32-bit float filtering unavailable, falling back to manual filtering"
                );
            }
            gpu.capabilities.float32_filterable
        }
    }
}

fn field_layout(config: &FluidConfig, viewport: (u32, u32), precision: Precision) -> FieldLayout {
    FieldLayout {
        sim: get_resolution(config.simulation.sim_resolution, viewport.0, viewport.1),
        dye: get_resolution(config.simulation.dye_resolution, viewport.0, viewport.1),
        precision,
    }
}
