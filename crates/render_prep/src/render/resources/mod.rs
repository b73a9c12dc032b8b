//! GPU and scene resources
//!
//! - `pool`: recycling pool of backend objects
//! - `materials`: material definitions and reference resolution

pub mod pool;
pub mod materials;
