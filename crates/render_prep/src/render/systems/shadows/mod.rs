//! Shadow map resource management

pub mod shadow_map;

pub use shadow_map::{
    ShadowError, ShadowMapEntry, ShadowMapRequest, ShadowMapResources, ShadowMapTracker,
    ShadowMapUpdate, ShadowMode, DEPTH_RENDER_FORMAT,
};
