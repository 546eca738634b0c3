pub mod light;

pub use light::{LightColor, LightDevice, LightEvent};
