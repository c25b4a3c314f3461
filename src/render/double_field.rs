//! 双缓冲场
//!
//! 内核不能在同一张纹理上同时读写，因此每个迭代更新的场都由 Read/Write
//! 两半组成：内核读 Read、写 Write，随后 `swap()` 交换角色。

use std::mem;

use glam::Vec2;

use crate::core::error::{FluidResult, RenderError, RenderResult};
use crate::render::field::{Field, FieldFormat};
use crate::render::gpu::GpuContext;
use crate::render::kernels::KernelRegistry;

/// 通用 ping-pong 对
#[derive(Debug)]
pub struct DoubleBuffer<T> {
    read: T,
    write: T,
}

impl<T> DoubleBuffer<T> {
    pub fn from_pair(read: T, write: T) -> Self {
        Self { read, write }
    }

    pub fn read(&self) -> &T {
        &self.read
    }

    pub fn write(&self) -> &T {
        &self.write
    }

    /// 交换读写角色，不复制数据
    pub fn swap(&mut self) {
        mem::swap(&mut self.read, &mut self.write);
    }
}

/// 双缓冲场
pub type DoubleField = DoubleBuffer<Field>;

impl DoubleBuffer<Field> {
    pub fn new(gpu: &GpuContext, label: &str, width: u32, height: u32, format: FieldFormat) -> Self {
        Self::from_pair(
            Field::new(gpu, &format!("{} (a)", label), width, height, format),
            Field::new(gpu, &format!("{} (b)", label), width, height, format),
        )
    }

    /// 由两张已有的场组成一对，两者尺寸和格式必须一致
    pub fn from_fields(read: Field, write: Field) -> RenderResult<Self> {
        if read.shape() != write.shape() || read.format() != write.format() {
            return Err(RenderError::InvalidState(format!(
                "double field halves differ: '{}' is {}x{} {:?}, '{}' is {}x{} {:?}",
                read.label(),
                read.width(),
                read.height(),
                read.format(),
                write.label(),
                write.width(),
                write.height(),
                write.format()
            )));
        }
        Ok(Self::from_pair(read, write))
    }

    pub fn width(&self) -> u32 {
        self.read.width()
    }

    pub fn height(&self) -> u32 {
        self.read.height()
    }

    pub fn texel_size_x(&self) -> f32 {
        self.read.texel_size().x
    }

    pub fn texel_size_y(&self) -> f32 {
        self.read.texel_size().y
    }

    pub fn texel_size(&self) -> Vec2 {
        self.read.texel_size()
    }

    /// 重建两半：Read 的内容缩放复制到新的 Read，Write 重新分配为空
    pub fn resize(
        &mut self,
        gpu: &GpuContext,
        kernels: &mut KernelRegistry,
        width: u32,
        height: u32,
    ) -> FluidResult<()> {
        if self.read.width() == width && self.read.height() == height {
            return Ok(());
        }
        let read = self.read.resize(gpu, kernels, width, height, true)?;
        let write = Field::new(gpu, self.write.label(), width, height, self.write.format());
        self.read = read;
        self.write = write;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_swap_exchanges_roles() {
        let mut pair = DoubleBuffer::from_pair("a", "b");
        pair.swap();
        assert_eq!(*pair.read(), "b");
        assert_eq!(*pair.write(), "a");
    }

    proptest! {
        #[test]
        fn even_swaps_restore_order(swaps in 0usize..64) {
            let mut pair = DoubleBuffer::from_pair(1u8, 2u8);
            for _ in 0..swaps {
                pair.swap();
            }
            let expected = if swaps % 2 == 0 { (1, 2) } else { (2, 1) };
            prop_assert_eq!((*pair.read(), *pair.write()), expected);
        }
    }
}
