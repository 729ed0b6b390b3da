pub mod vgg16;
pub mod weights;
#[cfg(feature = "pretrained")]
mod presets;

pub use vgg16::*;
pub use weights::*;
