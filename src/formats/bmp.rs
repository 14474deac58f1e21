//! Metadata of BMP images.

use std::io::{Read, Seek};

use byteorder::{ReadBytesExt, LittleEndian};

use crate::types::{Result, Dimensions, ColorSpace};
use crate::traits::LoadableMetadata;

/// Pixel storage compression declared in a `BITMAPINFOHEADER`.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Compression {
    Rgb,
    Rle8,
    Rle4,
    Bitfields,
    Jpeg,
    Png,
    Unknown(u32)
}

impl Compression {
    fn from_u32(n: u32) -> Compression {
        match n {
            0 => Compression::Rgb,
            1 => Compression::Rle8,
            2 => Compression::Rle4,
            3 => Compression::Bitfields,
            4 => Compression::Jpeg,
            5 => Compression::Png,
            n => Compression::Unknown(n)
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Compression::Rgb => 0,
            Compression::Rle8 => 1,
            Compression::Rle4 => 2,
            Compression::Bitfields => 3,
            Compression::Jpeg => 4,
            Compression::Png => 5,
            Compression::Unknown(n) => n
        }
    }

    /// Returns the Windows SDK name of the compression, if it is a known one.
    pub fn name(self) -> Option<&'static str> {
        match self {
            Compression::Rgb => Some("BI_RGB"),
            Compression::Rle8 => Some("BI_RLE8"),
            Compression::Rle4 => Some("BI_RLE4"),
            Compression::Bitfields => Some("BI_BITFIELDS"),
            Compression::Jpeg => Some("BI_JPEG"),
            Compression::Png => Some("BI_PNG"),
            Compression::Unknown(_) => None
        }
    }
}

/// Fields of a `BITMAPINFOHEADER` (or a newer header, of which only this prefix is read).
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct InfoHeader {
    /// Whether pixel rows are stored top to bottom, which is signalled by a negative height.
    pub top_down: bool,
    pub compression: Compression,
    pub image_size: u32,
    pub x_pixels_per_meter: u32,
    pub y_pixels_per_meter: u32,
    pub colors_used: u32,
    pub colors_important: u32
}

/// Variant of the DIB header following the file header.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum DibHeader {
    /// `BITMAPCOREHEADER`, 12 bytes long.
    Core,
    /// `BITMAPINFOHEADER` or any of its 40+ byte successors.
    Info(InfoHeader)
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Metadata {
    /// File size as stored in the file header.
    pub file_size: u32,
    /// Offset of the pixel array from the beginning of the file.
    pub data_offset: u32,
    pub dib_header_size: u32,
    pub dimensions: Dimensions,
    pub planes: u16,
    pub bits_per_pixel: u16,
    pub header: DibHeader
}

impl Metadata {
    pub fn color_space(&self) -> ColorSpace {
        match self.header {
            DibHeader::Core => ColorSpace::Rgb,
            DibHeader::Info(_) => match self.bits_per_pixel {
                1 | 4 | 8 => ColorSpace::Indexed,
                16 | 24 => ColorSpace::Rgb,
                32 => ColorSpace::Rgba,
                _ => ColorSpace::Unknown
            }
        }
    }

    #[inline]
    pub fn top_down(&self) -> bool {
        match self.header {
            DibHeader::Info(ref info) => info.top_down,
            DibHeader::Core => false
        }
    }
}

fn dimension(n: i32, what: &str) -> Result<u32> {
    if n < 0 {
        return Err(invalid_container!("negative BMP {}: {}", what, n));
    }
    Ok(n as u32)
}

impl LoadableMetadata for Metadata {
    fn load<R: ?Sized + Read + Seek>(r: &mut R) -> Result<Metadata> {
        let mut signature = [0u8; 2];
        try_if_eof!(r.read_exact(&mut signature), "when reading BMP signature");
        if &signature != b"BM" {
            return Err(invalid_container!("invalid BMP signature: {:?}", signature));
        }

        let file_size = try_if_eof!(r.read_u32::<LittleEndian>(), "when reading BMP file size");
        let _ = try_if_eof!(r.read_u32::<LittleEndian>(), "when reading reserved BMP header fields");
        let data_offset = try_if_eof!(r.read_u32::<LittleEndian>(), "when reading pixel data offset");

        let dib_header_size = try_if_eof!(r.read_u32::<LittleEndian>(), "when reading DIB header size");

        let (width, height, planes, bits_per_pixel, header) = if dib_header_size >= 40 {
            let width = try_if_eof!(r.read_i32::<LittleEndian>(), "when reading width");
            let height = try_if_eof!(r.read_i32::<LittleEndian>(), "when reading height");
            let planes = try_if_eof!(r.read_u16::<LittleEndian>(), "when reading color planes");
            let bits_per_pixel = try_if_eof!(r.read_u16::<LittleEndian>(), "when reading bits per pixel");
            let compression = try_if_eof!(r.read_u32::<LittleEndian>(), "when reading compression");
            let image_size = try_if_eof!(r.read_u32::<LittleEndian>(), "when reading image size");
            let x_pixels_per_meter = try_if_eof!(r.read_u32::<LittleEndian>(), "when reading horizontal resolution");
            let y_pixels_per_meter = try_if_eof!(r.read_u32::<LittleEndian>(), "when reading vertical resolution");
            let colors_used = try_if_eof!(r.read_u32::<LittleEndian>(), "when reading number of colors");
            let colors_important = try_if_eof!(r.read_u32::<LittleEndian>(), "when reading number of important colors");

            let header = DibHeader::Info(InfoHeader {
                top_down: height < 0,
                compression: Compression::from_u32(compression),
                image_size: image_size,
                x_pixels_per_meter: x_pixels_per_meter,
                y_pixels_per_meter: y_pixels_per_meter,
                colors_used: colors_used,
                colors_important: colors_important
            });

            (dimension(width, "width")?, height.unsigned_abs(), planes, bits_per_pixel, header)
        } else if dib_header_size == 12 {
            let width = try_if_eof!(r.read_i16::<LittleEndian>(), "when reading width");
            let height = try_if_eof!(r.read_i16::<LittleEndian>(), "when reading height");
            let planes = try_if_eof!(r.read_u16::<LittleEndian>(), "when reading color planes");
            let bits_per_pixel = try_if_eof!(r.read_u16::<LittleEndian>(), "when reading bits per pixel");

            (dimension(width as i32, "width")?, dimension(height as i32, "height")?,
             planes, bits_per_pixel, DibHeader::Core)
        } else {
            return Err(unsupported_variant!("unsupported DIB header size: {}", dib_header_size));
        };

        Ok(Metadata {
            file_size: file_size,
            data_offset: data_offset,
            dib_header_size: dib_header_size,
            dimensions: (width, height).into(),
            planes: planes,
            bits_per_pixel: bits_per_pixel,
            header: header
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use byteorder::{WriteBytesExt, LittleEndian};

    use crate::types::{Error, ColorSpace, Dimensions};
    use crate::traits::LoadableMetadata;

    use super::{Metadata, DibHeader, Compression};

    fn info_bmp(width: i32, height: i32, bpp: u16, compression: u32) -> Vec<u8> {
        let mut data = Vec::new();
        data.write_all(b"BM").unwrap();
        data.write_u32::<LittleEndian>(54).unwrap();
        data.write_u32::<LittleEndian>(0).unwrap();
        data.write_u32::<LittleEndian>(54).unwrap();
        data.write_u32::<LittleEndian>(40).unwrap();
        data.write_i32::<LittleEndian>(width).unwrap();
        data.write_i32::<LittleEndian>(height).unwrap();
        data.write_u16::<LittleEndian>(1).unwrap();
        data.write_u16::<LittleEndian>(bpp).unwrap();
        data.write_u32::<LittleEndian>(compression).unwrap();
        for _ in 0..5 {
            data.write_u32::<LittleEndian>(0).unwrap();
        }
        data
    }

    #[test]
    fn test_info_header() {
        let md = Metadata::load_from_buf(&info_bmp(100, 100, 24, 0)).unwrap();
        assert_eq!(md.dimensions, Dimensions::from((100u32, 100u32)));
        assert_eq!(md.color_space(), ColorSpace::Rgb);
        assert_eq!(md.data_offset, 54);
        assert!(!md.top_down());
        match md.header {
            DibHeader::Info(ref info) => assert_eq!(info.compression.name(), Some("BI_RGB")),
            DibHeader::Core => panic!("expected an info header")
        }
    }

    #[test]
    fn test_top_down() {
        let md = Metadata::load_from_buf(&info_bmp(100, -100, 32, 3)).unwrap();
        assert_eq!(md.dimensions.height, 100);
        assert!(md.top_down());
        assert_eq!(md.color_space(), ColorSpace::Rgba);
    }

    #[test]
    fn test_indexed_and_unknown_compression() {
        let md = Metadata::load_from_buf(&info_bmp(8, 8, 4, 9)).unwrap();
        assert_eq!(md.color_space(), ColorSpace::Indexed);
        match md.header {
            DibHeader::Info(ref info) => {
                assert_eq!(info.compression, Compression::Unknown(9));
                assert_eq!(info.compression.name(), None);
            }
            DibHeader::Core => panic!("expected an info header")
        }
    }

    fn core_bmp(width: i16, height: i16) -> Vec<u8> {
        let mut data = Vec::new();
        data.write_all(b"BM").unwrap();
        data.write_all(&[0; 8]).unwrap();
        data.write_u32::<LittleEndian>(26).unwrap();
        data.write_u32::<LittleEndian>(12).unwrap();
        data.write_i16::<LittleEndian>(width).unwrap();
        data.write_i16::<LittleEndian>(height).unwrap();
        data.write_u16::<LittleEndian>(1).unwrap();
        data.write_u16::<LittleEndian>(8).unwrap();
        data
    }

    #[test]
    fn test_negative_width_is_rejected() {
        match Metadata::load_from_buf(&info_bmp(-100, 100, 24, 0)) {
            Err(Error::InvalidContainer(ref msg)) => assert!(msg.contains("width")),
            other => panic!("unexpected result: {:?}", other)
        }
    }

    #[test]
    fn test_negative_core_dimensions_are_rejected() {
        match Metadata::load_from_buf(&core_bmp(64, -32)) {
            Err(Error::InvalidContainer(ref msg)) => assert!(msg.contains("height")),
            other => panic!("unexpected result: {:?}", other)
        }
        match Metadata::load_from_buf(&core_bmp(-64, 32)) {
            Err(Error::InvalidContainer(ref msg)) => assert!(msg.contains("width")),
            other => panic!("unexpected result: {:?}", other)
        }
    }

    #[test]
    fn test_core_header() {
        let data = core_bmp(64, 32);

        let md = Metadata::load_from_buf(&data).unwrap();
        assert_eq!(md.dimensions, Dimensions::from((64u32, 32u32)));
        assert_eq!(md.header, DibHeader::Core);
        assert_eq!(md.color_space(), ColorSpace::Rgb);
    }

    #[test]
    fn test_unsupported_dib_header() {
        let mut data = info_bmp(1, 1, 24, 0);
        data[14] = 20;
        match Metadata::load_from_buf(&data) {
            Err(Error::UnsupportedVariant(_)) => {}
            other => panic!("unexpected result: {:?}", other)
        }
    }

    #[test]
    fn test_truncated_header() {
        let data = info_bmp(1, 1, 24, 0);
        match Metadata::load_from_buf(&data[..30]) {
            Err(Error::UnexpectedEndOfFile(Some(_))) => {}
            other => panic!("unexpected result: {:?}", other)
        }
    }
}
