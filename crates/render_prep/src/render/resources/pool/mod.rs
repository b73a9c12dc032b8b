//! GPU resource pooling
//!
//! Descriptor types and the recycling object pool.

pub mod descriptor;
pub mod object_pool;

pub use descriptor::{Mutability, PixelFormat, ResourceCategory, ResourceDescriptor};
pub use object_pool::{GpuObjectPool, PoolError, PoolStats, PooledResource};
