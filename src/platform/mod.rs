pub mod winit;

// ============================================================================
// Platform Window Abstraction
// ============================================================================

/// 平台窗口抽象
pub trait Window {
    fn size(&self) -> (u32, u32);
    fn request_redraw(&self);
}

// ============================================================================
// Input Abstraction
// ============================================================================

/// 平台无关的输入事件，坐标为窗口像素（原点左上）
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    // Keyboard
    KeyPressed { key: KeyCode },

    // Mouse
    MouseMoved { x: f32, y: f32 },
    MouseButtonPressed { button: MouseButton, x: f32, y: f32 },
    MouseButtonReleased { button: MouseButton, x: f32, y: f32 },

    // Touch
    TouchStart { id: u64, x: f32, y: f32 },
    TouchMove { id: u64, x: f32, y: f32 },
    TouchEnd { id: u64, x: f32, y: f32 },

    // Window
    WindowResized { width: u32, height: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    B, C, G, N, P, R, S, T,
    Num1, Num2, Num3, Num4, Num5, Num6,
    Space, Escape,
    Unknown(u32),
}

impl KeyCode {
    /// 字符键映射（大小写不敏感）
    pub fn from_char(c: char) -> Self {
        match c.to_ascii_lowercase() {
            'b' => KeyCode::B,
            'c' => KeyCode::C,
            'g' => KeyCode::G,
            'n' => KeyCode::N,
            'p' => KeyCode::P,
            'r' => KeyCode::R,
            's' => KeyCode::S,
            't' => KeyCode::T,
            '1' => KeyCode::Num1,
            '2' => KeyCode::Num2,
            '3' => KeyCode::Num3,
            '4' => KeyCode::Num4,
            '5' => KeyCode::Num5,
            '6' => KeyCode::Num6,
            ' ' => KeyCode::Space,
            other => KeyCode::Unknown(other as u32),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left, Right, Middle, Other(u16),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_from_char() {
        assert_eq!(KeyCode::from_char('P'), KeyCode::P);
        assert_eq!(KeyCode::from_char('3'), KeyCode::Num3);
        assert_eq!(KeyCode::from_char(' '), KeyCode::Space);
        assert_eq!(KeyCode::from_char('z'), KeyCode::Unknown('z' as u32));
    }
}
