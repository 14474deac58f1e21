pub mod tiff;
pub mod riff;
