use std::io;
use std::result;
use std::fmt;
use std::error;
use std::borrow::Cow;
use std::collections::BTreeMap;

use num::ToPrimitive;

#[derive(Debug)]
pub enum Error {
    /// The leading bytes match none of the supported signatures.
    UnsupportedFormat,
    /// A fixed signature or magic number inside a recognized format does not match.
    InvalidContainer(Cow<'static, str>),
    /// The structure is valid but describes a sub-variant which is not handled.
    UnsupportedVariant(Cow<'static, str>),
    UnexpectedEndOfFile(Option<Cow<'static, str>>),
    Io(io::Error)
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::UnsupportedFormat => write!(f, "unsupported image format"),
            Error::InvalidContainer(ref s) => write!(f, "invalid image container: {}", s),
            Error::UnsupportedVariant(ref s) => write!(f, "unsupported format variant: {}", s),
            Error::UnexpectedEndOfFile(None) => write!(f, "unexpected end of file"),
            Error::UnexpectedEndOfFile(Some(ref s)) => write!(f, "unexpected end of file {}", s),
            Error::Io(ref e) => write!(f, "I/O error: {}", e)
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Io(ref e) => Some(e),
            _ => None
        }
    }
}

impl From<io::Error> for Error {
    #[inline]
    fn from(e: io::Error) -> Error {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => Error::UnexpectedEndOfFile(None),
            _ => Error::Io(e)
        }
    }
}

pub type Result<T> = result::Result<T, Error>;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Dimensions {
    pub width: u32,
    pub height: u32
}

impl<T: Into<u32>, U: Into<u32>> From<(T, U)> for Dimensions {
    fn from((w, h): (T, U)) -> Dimensions {
        Dimensions {
            width: w.into(),
            height: h.into()
        }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One of the supported image encodings.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ImageFormat {
    #[cfg_attr(feature = "serde", serde(rename = "JPEG"))]
    Jpeg,
    #[cfg_attr(feature = "serde", serde(rename = "PNG"))]
    Png,
    #[cfg_attr(feature = "serde", serde(rename = "GIF"))]
    Gif,
    #[cfg_attr(feature = "serde", serde(rename = "WebP"))]
    Webp,
    #[cfg_attr(feature = "serde", serde(rename = "BMP"))]
    Bmp
}

impl ImageFormat {
    pub fn name(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Png  => "PNG",
            ImageFormat::Gif  => "GIF",
            ImageFormat::Webp => "WebP",
            ImageFormat::Bmp  => "BMP"
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png  => "image/png",
            ImageFormat::Gif  => "image/gif",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Bmp  => "image/bmp"
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Semantic color model of an image, independent of how a format encodes it.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ColorSpace {
    #[cfg_attr(feature = "serde", serde(rename = "RGB"))]
    Rgb,
    #[cfg_attr(feature = "serde", serde(rename = "RGBA"))]
    Rgba,
    #[cfg_attr(feature = "serde", serde(rename = "CMYK"))]
    Cmyk,
    Grayscale,
    GrayscaleAlpha,
    Indexed,
    #[default]
    Unknown
}

impl ColorSpace {
    pub fn name(self) -> &'static str {
        match self {
            ColorSpace::Rgb            => "RGB",
            ColorSpace::Rgba           => "RGBA",
            ColorSpace::Cmyk           => "CMYK",
            ColorSpace::Grayscale      => "Grayscale",
            ColorSpace::GrayscaleAlpha => "GrayscaleAlpha",
            ColorSpace::Indexed        => "Indexed",
            ColorSpace::Unknown        => "Unknown"
        }
    }
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single EXIF tag value or format-specific attribute.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    Byte(u8),
    Short(u16),
    Long(u32),
    SignedLong(i32),
    Float(f64),
    Bool(bool),
    Text(String),
    Bytes(Vec<u8>),
    Shorts(Vec<u16>),
    Longs(Vec<u32>),
    SignedLongs(Vec<i32>),
    Floats(Vec<f64>)
}

impl Value {
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match *self {
            Value::Text(ref s) => Some(s),
            _ => None
        }
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(b) => Some(b),
            _ => None
        }
    }
}

impl ToPrimitive for Value {
    fn to_i64(&self) -> Option<i64> {
        match *self {
            Value::Byte(n) => Some(n as i64),
            Value::Short(n) => Some(n as i64),
            Value::Long(n) => Some(n as i64),
            Value::SignedLong(n) => Some(n as i64),
            Value::Float(n) => n.to_i64(),
            _ => None
        }
    }

    fn to_u64(&self) -> Option<u64> {
        match *self {
            Value::Byte(n) => Some(n as u64),
            Value::Short(n) => Some(n as u64),
            Value::Long(n) => Some(n as u64),
            Value::SignedLong(n) => n.to_u64(),
            Value::Float(n) => n.to_u64(),
            _ => None
        }
    }

    fn to_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(n) => Some(n),
            _ => self.to_i64().map(|n| n as f64)
        }
    }
}

macro_rules! impl_value_from {
    ($($t:ty => $variant:ident),+) => {
        $(
            impl From<$t> for Value {
                #[inline]
                fn from(v: $t) -> Value { Value::$variant(v) }
            }
        )+
    }
}

impl_value_from! {
    u8 => Byte,
    u16 => Short,
    u32 => Long,
    i32 => SignedLong,
    f64 => Float,
    bool => Bool,
    String => Text
}

impl<'a> From<&'a str> for Value {
    #[inline]
    fn from(s: &'a str) -> Value { Value::Text(s.to_owned()) }
}

fn write_seq<T: fmt::Display>(f: &mut fmt::Formatter, items: &[T]) -> fmt::Result {
    f.write_str("[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 { f.write_str(", ")?; }
        write!(f, "{}", item)?;
    }
    f.write_str("]")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Value::Byte(n) => write!(f, "{}", n),
            Value::Short(n) => write!(f, "{}", n),
            Value::Long(n) => write!(f, "{}", n),
            Value::SignedLong(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Text(ref s) => f.write_str(s),
            Value::Bytes(ref v) => write_seq(f, v),
            Value::Shorts(ref v) => write_seq(f, v),
            Value::Longs(ref v) => write_seq(f, v),
            Value::SignedLongs(ref v) => write_seq(f, v),
            Value::Floats(ref v) => write_seq(f, v)
        }
    }
}

/// Named EXIF tag values; tags which were not found are simply absent.
pub type ExifMap = BTreeMap<&'static str, Value>;

/// Format-specific attributes of an image.
pub type AttributeMap = BTreeMap<&'static str, Value>;

/// Uniform metadata record produced for every supported format.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ImageMetadata {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub file_size: u64,
    /// Bits per pixel or per channel; the exact meaning depends on the format.
    pub color_depth: u32,
    pub color_space: ColorSpace,
    #[cfg_attr(feature = "serde", serde(rename = "hasICCProfile"))]
    pub has_icc_profile: bool,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "BTreeMap::is_empty"))]
    pub exif: ExifMap,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "BTreeMap::is_empty"))]
    pub additional: AttributeMap,
    /// Set when the source ended or turned malformed after the mandatory header,
    /// so the record may be missing information found later in the file.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub warning: Option<Cow<'static, str>>
}

impl ImageMetadata {
    #[inline]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions { width: self.width, height: self.height }
    }

    #[inline]
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.warning.is_none()
    }
}
