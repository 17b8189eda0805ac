pub mod config;
pub mod perlin_height;

pub use config::GenerationConfig;
pub use perlin_height::PerlinHeightDensity;
