//! Backend-facing API
//!
//! The pool talks to the graphics device exclusively through [`GpuBackend`].
//! [`HeadlessBackend`] implements it without a device.

pub mod render_backend;
pub mod headless;

pub use render_backend::{
    BackendError, BackendResourceId, BackendResult, Filter, GpuBackend, SamplerState, WrapMode,
};
pub use headless::{BackendCallStats, HeadlessBackend};
