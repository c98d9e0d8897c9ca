pub mod adjustments;
pub mod filters;
pub mod presets;
pub mod render;
pub mod sharpen;
pub mod transform;
