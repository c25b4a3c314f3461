//! 流体模拟
//!
//! - `state` - 模拟所需的全部场
//! - `solver` - 单个时间步的各个阶段
//! - `splat` - 溅射参数与随机颜色
//! - `fluid` - 每帧调度：输入、溅射、求解、渲染

pub mod fluid;
pub mod solver;
pub mod splat;
pub mod state;

pub use fluid::{ControlState, FluidSimulation};
pub use solver::Solver;
pub use splat::Splat;
pub use state::{FieldLayout, SimulationState};
