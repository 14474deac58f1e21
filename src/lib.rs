//! Detection and structural metadata extraction for JPEG, PNG, GIF, WebP and BMP images.
//!
//! Only container structures are parsed; pixel data is never decoded. The usual entry points
//! are [`load_from_file`] and [`load_from_buf`], which detect the format from the leading
//! bytes and return a uniform [`ImageMetadata`] record:
//!
//! ```no_run
//! let md = imx::load_from_file("photo.jpg").unwrap();
//! println!("{} {}x{}, {} bit, {}", md.format, md.width, md.height, md.color_depth, md.color_space);
//! for (tag, value) in &md.exif {
//!     println!("{}: {}", tag, value);
//! }
//! ```
//!
//! The typed, format-specific metadata is available through [`decode`] or by loading the
//! `Metadata` type of one of the [`formats`] modules directly via [`LoadableMetadata`].

pub use types::{Error, Result, Dimensions, ImageFormat, ColorSpace, Value, ExifMap, AttributeMap, ImageMetadata};
pub use traits::LoadableMetadata;
pub use detector::{detect, MAGIC_LEN};
pub use generic::*;

#[macro_use] mod macros;
mod traits;
mod types;
mod utils;
mod detector;
mod generic;

pub mod common;
pub mod formats;
