#[cfg(feature = "pretrained")]
mod download;
#[cfg(feature = "pretrained")]
pub(crate) use download::download;

pub mod pool;
pub mod transfer;
pub mod upsample;
pub mod vgg;

mod fcn32s;
pub use fcn32s::*;
