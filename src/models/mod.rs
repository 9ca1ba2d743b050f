pub mod image;
pub mod prompt;

pub use image::*;
pub use prompt::*;
