use std::sync::Arc;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseButton as WinitMouseButton, TouchPhase, WindowEvent};
use winit::event_loop::EventLoop;
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window as WinitWindowRaw, WindowBuilder};

use crate::config::WindowConfig;
use crate::core::error::{FluidError, FluidResult};
use crate::platform::{InputEvent, KeyCode, MouseButton};

#[derive(Clone)]
pub struct WinitWindow {
    window: Arc<WinitWindowRaw>,
}

impl WinitWindow {
    pub fn new(event_loop: &EventLoop<()>, config: &WindowConfig) -> FluidResult<Self> {
        let window = WindowBuilder::new()
            .with_title(config.title.as_str())
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .build(event_loop)
            .map_err(|e| FluidError::Window(e.to_string()))?;
        Ok(Self {
            window: Arc::new(window),
        })
    }

    /// 共享句柄，用于创建 `'static` 表面
    pub fn shared(&self) -> Arc<WinitWindowRaw> {
        self.window.clone()
    }
}

impl crate::platform::Window for WinitWindow {
    fn size(&self) -> (u32, u32) {
        let s = self.window.inner_size();
        (s.width, s.height)
    }
    fn request_redraw(&self) {
        self.window.request_redraw();
    }
}

/// 把 winit 窗口事件翻译为平台无关的输入事件
///
/// 鼠标按键事件不携带坐标，由调用方传入最近一次光标位置。
pub fn translate_event(event: &WindowEvent, cursor: (f32, f32)) -> Option<InputEvent> {
    match event {
        WindowEvent::Resized(size) => Some(InputEvent::WindowResized {
            width: size.width,
            height: size.height,
        }),
        WindowEvent::CursorMoved { position, .. } => Some(InputEvent::MouseMoved {
            x: position.x as f32,
            y: position.y as f32,
        }),
        WindowEvent::MouseInput { state, button, .. } => {
            let button = translate_button(*button);
            let (x, y) = cursor;
            Some(match state {
                ElementState::Pressed => InputEvent::MouseButtonPressed { button, x, y },
                ElementState::Released => InputEvent::MouseButtonReleased { button, x, y },
            })
        }
        WindowEvent::Touch(touch) => {
            let id = touch.id;
            let x = touch.location.x as f32;
            let y = touch.location.y as f32;
            Some(match touch.phase {
                TouchPhase::Started => InputEvent::TouchStart { id, x, y },
                TouchPhase::Moved => InputEvent::TouchMove { id, x, y },
                TouchPhase::Ended | TouchPhase::Cancelled => InputEvent::TouchEnd { id, x, y },
            })
        }
        WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
            Some(InputEvent::KeyPressed {
                key: translate_key(&event.logical_key),
            })
        }
        _ => None,
    }
}

fn translate_key(key: &Key) -> KeyCode {
    match key {
        Key::Character(s) => s.chars().next().map(KeyCode::from_char).unwrap_or(KeyCode::Unknown(0)),
        Key::Named(NamedKey::Space) => KeyCode::Space,
        Key::Named(NamedKey::Escape) => KeyCode::Escape,
        _ => KeyCode::Unknown(0),
    }
}

fn translate_button(button: WinitMouseButton) -> MouseButton {
    match button {
        WinitMouseButton::Left => MouseButton::Left,
        WinitMouseButton::Right => MouseButton::Right,
        WinitMouseButton::Middle => MouseButton::Middle,
        WinitMouseButton::Other(id) => MouseButton::Other(id),
        _ => MouseButton::Other(0),
    }
}
