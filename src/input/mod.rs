//! 输入队列与指针状态
//!
//! 平台层把事件推入 [`InputQueue`]，模拟在每帧固定位置（溅射之前）一次性取空。
//! 指针坐标以归一化纹理坐标保存：原点在左下、y 向上。

use crossbeam_channel::{unbounded, Receiver, Sender};
use glam::{Vec2, Vec3};
use rand::Rng;

use crate::platform::InputEvent;
use crate::simulation::splat::generate_color;

/// 帧间输入事件队列
pub struct InputQueue {
    sender: Sender<InputEvent>,
    receiver: Receiver<InputEvent>,
}

impl Default for InputQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InputQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// 可克隆的发送端，交给平台层
    pub fn sender(&self) -> Sender<InputEvent> {
        self.sender.clone()
    }

    pub fn push(&self, event: InputEvent) {
        // 接收端与队列同生命周期，发送不会失败
        let _ = self.sender.send(event);
    }

    /// 取出当前所有待处理事件
    pub fn drain(&self) -> Vec<InputEvent> {
        self.receiver.try_iter().collect()
    }
}

/// 指针标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerId {
    Mouse,
    Touch(u64),
}

/// 单个指针的状态
#[derive(Debug, Clone, PartialEq)]
pub struct Pointer {
    pub id: PointerId,
    pub texcoord: Vec2,
    pub prev_texcoord: Vec2,
    pub delta: Vec2,
    pub down: bool,
    pub moved: bool,
    pub color: Vec3,
}

impl Pointer {
    pub fn new(id: PointerId) -> Self {
        Self {
            id,
            texcoord: Vec2::ZERO,
            prev_texcoord: Vec2::ZERO,
            delta: Vec2::ZERO,
            down: false,
            moved: false,
            color: Vec3::new(30.0, 0.0, 300.0),
        }
    }

    /// 按下：记录位置并换一种颜色
    pub fn press<R: Rng + ?Sized>(&mut self, pos: Vec2, viewport: (u32, u32), rng: &mut R) {
        self.down = true;
        self.moved = false;
        self.texcoord = to_texcoord(pos, viewport);
        self.prev_texcoord = self.texcoord;
        self.delta = Vec2::ZERO;
        self.color = generate_color(rng);
    }

    /// 移动：只在按下时生效
    pub fn move_to(&mut self, pos: Vec2, viewport: (u32, u32)) {
        if !self.down {
            return;
        }
        self.prev_texcoord = self.texcoord;
        self.texcoord = to_texcoord(pos, viewport);
        self.delta = correct_delta(self.texcoord - self.prev_texcoord, aspect_ratio(viewport));
        self.moved = self.delta != Vec2::ZERO;
    }

    pub fn release(&mut self) {
        self.down = false;
    }
}

/// 视口宽高比
pub fn aspect_ratio(viewport: (u32, u32)) -> f32 {
    viewport.0.max(1) as f32 / viewport.1.max(1) as f32
}

fn to_texcoord(pos: Vec2, viewport: (u32, u32)) -> Vec2 {
    let size = Vec2::new(viewport.0.max(1) as f32, viewport.1.max(1) as f32);
    Vec2::new(pos.x / size.x, 1.0 - pos.y / size.y)
}

/// 把归一化位移校正为各向同性：长边方向的位移按宽高比缩放
pub fn correct_delta(delta: Vec2, aspect_ratio: f32) -> Vec2 {
    let mut delta = delta;
    if aspect_ratio < 1.0 {
        delta.x *= aspect_ratio;
    }
    if aspect_ratio > 1.0 {
        delta.y /= aspect_ratio;
    }
    delta
}

/// 指针集合：0 号总是鼠标，触点按需追加且从不移除
#[derive(Debug, Clone)]
pub struct PointerSet {
    pointers: Vec<Pointer>,
}

impl Default for PointerSet {
    fn default() -> Self {
        Self::new()
    }
}

impl PointerSet {
    pub fn new() -> Self {
        Self {
            pointers: vec![Pointer::new(PointerId::Mouse)],
        }
    }

    pub fn get_or_insert(&mut self, id: PointerId) -> &mut Pointer {
        let index = match self.pointers.iter().position(|p| p.id == id) {
            Some(index) => index,
            None => {
                tracing::trace!(target: "input", "New pointer {:?}", id);
                self.pointers.push(Pointer::new(id));
                self.pointers.len() - 1
            }
        };
        &mut self.pointers[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pointer> {
        self.pointers.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Pointer> {
        self.pointers.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.pointers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pointers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::KeyCode;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_queue_drains_in_order() {
        let queue = InputQueue::new();
        let sender = queue.sender();
        sender
            .send(InputEvent::KeyPressed { key: KeyCode::P })
            .unwrap();
        queue.push(InputEvent::WindowResized {
            width: 10,
            height: 20,
        });

        let events = queue.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], InputEvent::KeyPressed { key: KeyCode::P });
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_press_flips_y() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut pointer = Pointer::new(PointerId::Mouse);
        pointer.press(Vec2::new(200.0, 100.0), (800, 400), &mut rng);
        assert!(pointer.down);
        assert!(!pointer.moved);
        assert_eq!(pointer.texcoord, Vec2::new(0.25, 0.75));
    }

    #[test]
    fn test_move_requires_down() {
        let mut pointer = Pointer::new(PointerId::Mouse);
        pointer.move_to(Vec2::new(10.0, 10.0), (100, 100));
        assert!(!pointer.moved);
        assert_eq!(pointer.texcoord, Vec2::ZERO);
    }

    #[test]
    fn test_move_computes_corrected_delta() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut pointer = Pointer::new(PointerId::Mouse);
        pointer.press(Vec2::new(0.0, 100.0), (200, 100), &mut rng);
        pointer.move_to(Vec2::new(20.0, 90.0), (200, 100));
        assert!(pointer.moved);
        // 横屏：y 方向位移按宽高比缩小
        assert!((pointer.delta.x - 0.1).abs() < 1e-6);
        assert!((pointer.delta.y - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_correct_delta_portrait() {
        let delta = correct_delta(Vec2::new(0.2, 0.2), 0.5);
        assert_eq!(delta, Vec2::new(0.1, 0.2));
    }

    #[test]
    fn test_touch_pointers_are_created_lazily() {
        let mut pointers = PointerSet::new();
        assert_eq!(pointers.len(), 1);
        pointers.get_or_insert(PointerId::Touch(3)).down = true;
        pointers.get_or_insert(PointerId::Touch(3));
        pointers.get_or_insert(PointerId::Touch(4));
        assert_eq!(pointers.len(), 3);
        assert!(pointers.iter().any(|p| p.id == PointerId::Touch(3) && p.down));
    }
}
