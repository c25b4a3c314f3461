//! # Stable Fluid
//!
//! A real-time 2D incompressible fluid solver running entirely on the GPU, built on wgpu.
//!
//! ## Features
//!
//! - **Stable fluids**: semi-Lagrangian advection, vorticity confinement and a Jacobi pressure
//!   projection over ping-pong field buffers
//! - **Kernel registry**: every pass is a full-screen fragment kernel with a declared slot contract
//!   and lazily compiled feature variants
//! - **Post-processing**: bloom and sunrays over the dye field, composited with shading and dithering
//! - **Interaction**: mouse and multi-touch splats, keyboard controls and PNG capture
//!
//! ## Modules
//!
//! - [`core`]: Engine loop and error types
//! - [`config`]: TOML/JSON configuration with environment overrides
//! - [`platform`]: Window abstraction and winit event translation
//! - [`input`]: Input queue and pointer state
//! - [`render`]: GPU context, fields, kernels, post-processing, display and capture
//! - [`simulation`]: Solver state, solver step, splats and the per-tick orchestrator

/// Engine loop, error types and macros
pub mod core;
/// Configuration system
pub mod config;
/// Platform abstraction layer
pub mod platform;
/// Input queue and pointers
pub mod input;
/// GPU rendering and field storage
pub mod render;
/// Fluid simulation
pub mod simulation;

pub use crate::config::FluidConfig;
pub use crate::core::{Engine, FluidError, FluidResult};
pub use crate::simulation::FluidSimulation;
