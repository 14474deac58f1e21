//! Metadata of GIF images.

use std::borrow::Cow;
use std::io::{Read, Seek};

use byteorder::{ReadBytesExt, LittleEndian};
use tracing::{debug, trace};

use crate::types::{Result, Dimensions};
use crate::traits::LoadableMetadata;
use crate::utils::skip;

/// GIF file version number.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Version {
    V87a,
    V89a
}

impl Version {
    fn from_bytes(b: &[u8]) -> Option<Version> {
        match b {
            b"87a" => Some(Version::V87a),
            b"89a" => Some(Version::V89a),
            _      => None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Version::V87a => "87a",
            Version::V89a => "89a"
        }
    }
}

/// Contains information about the global color table.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ColorTable {
    /// Color table size, between 2 and 256.
    pub size: u16,
    /// Whether the color table is sorted in order of decreasing importance.
    pub sorted: bool,
}

impl ColorTable {
    /// Number of bits needed to index the table, i.e. the stored size field plus one.
    #[inline]
    pub fn bits(&self) -> u8 {
        self.size.trailing_zeros() as u8
    }
}

/// Contains metadata about the whole GIF image.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Metadata {
    /// GIF format version from the file header.
    pub version: Version,

    /// Logical screen dimensions of the image.
    pub dimensions: Dimensions,

    /// Information about global color table, if it is present.
    pub global_color_table: Option<ColorTable>,
    /// Table size and sort flag as declared by the screen descriptor, which carries them
    /// even when the table itself is absent.
    pub declared_color_table: ColorTable,

    /// Number of bits per primary color available to the original image.
    ///
    /// This describes the palette the colors were selected from, not the number of colors
    /// actually used in the graphic.
    pub color_resolution: u8,
    /// Index of the default background color in the global color table.
    pub background_color_index: u8,
    /// A factor which defines the aspect ratio of a pixel in the original image.
    ///
    /// If zero, no information about pixel aspect ratio is available.
    /// See also `pixel_aspect_ratio_approx()` method.
    pub pixel_aspect_ratio: u8,

    /// Number of image descriptor blocks.
    pub frames: u32,
    /// Whether any graphic control extension enables a transparent color.
    pub has_transparency: bool,
    /// Whether a `NETSCAPE2.0` application extension (the looping extension) is present.
    pub has_animation: bool,

    /// Why the block walk stopped before the trailer, if it did.
    pub warning: Option<Cow<'static, str>>
}

impl Metadata {
    /// Computes pixel aspect ratio approximation, if it is available.
    #[inline]
    pub fn pixel_aspect_ratio_approx(&self) -> Option<f64> {
        if self.pixel_aspect_ratio == 0 {
            None
        } else {
            Some((self.pixel_aspect_ratio as f64 + 15.0)/64.0)
        }
    }
}

const NETSCAPE_APPLICATION: &[u8; 11] = b"NETSCAPE2.0";

#[derive(Default)]
struct Blocks {
    frames: u32,
    has_transparency: bool,
    has_animation: bool
}

fn skip_sub_blocks<R: ?Sized + Read + Seek>(r: &mut R, index: usize) -> Result<()> {
    loop {
        let n = try_if_eof!(r.read_u8(), "when reading sub-block size of block {}", index);
        if n == 0 { return Ok(()); }
        skip(r, n as u64)?;
    }
}

fn color_table_len(packed_size: u8) -> u64 {
    3 * (1u64 << ((packed_size & 0b111) + 1))
}

// Unknown separators are skipped one byte at a time.
fn read_blocks<R: ?Sized + Read + Seek>(r: &mut R, blocks: &mut Blocks) -> Result<()> {
    let mut index = 0usize;
    loop {
        let separator = try_if_eof!(r.read_u8(), "when reading separator of block {}", index);
        match separator {
            0x21 => {
                let label = try_if_eof!(r.read_u8(), "when reading label of block {}", index);
                trace!(index, label, "GIF extension block");
                match label {
                    0xf9 => {
                        let block_size = try_if_eof!(r.read_u8(), "when reading size of block {}", index);
                        if block_size == 4 {
                            let mut gce = [0u8; 4];
                            try_if_eof!(r.read_exact(&mut gce), "when reading graphic control block {}", index);
                            if gce[0] & 0b00000001 != 0 {
                                blocks.has_transparency = true;
                            }
                            let _ = try_if_eof!(r.read_u8(), "when reading terminator of block {}", index);
                        } else {
                            skip(r, block_size as u64)?;
                            skip_sub_blocks(r, index)?;
                        }
                    }
                    0xff => {
                        let block_size = try_if_eof!(r.read_u8(), "when reading size of block {}", index);
                        if block_size == 11 {
                            let mut application = [0u8; 11];
                            try_if_eof!(r.read_exact(&mut application), "when reading application identifier of block {}", index);
                            if &application == NETSCAPE_APPLICATION {
                                blocks.has_animation = true;
                            }
                        } else {
                            skip(r, block_size as u64)?;
                        }
                        skip_sub_blocks(r, index)?;
                    }
                    _ => skip_sub_blocks(r, index)?
                }
            }
            0x2c => {
                blocks.frames += 1;
                let mut descriptor = [0u8; 9];
                try_if_eof!(r.read_exact(&mut descriptor), "when reading image descriptor of block {}", index);
                let packed_flags = descriptor[8];
                if packed_flags & 0b10000000 != 0 {
                    skip(r, color_table_len(packed_flags))?;
                }
                let _ = try_if_eof!(r.read_u8(), "when reading LZW minimum code size of block {}", index);
                skip_sub_blocks(r, index)?;
            }
            0x3b => return Ok(()),
            _ => trace!(index, separator, "skipping unknown GIF block")
        }
        index += 1;
    }
}

impl LoadableMetadata for Metadata {
    fn load<R: ?Sized + Read + Seek>(r: &mut R) -> Result<Metadata> {
        let mut signature = [0u8; 6];
        try_if_eof!(r.read_exact(&mut signature), "when reading GIF signature");

        if &signature[..3] != b"GIF" {
            return Err(invalid_container!("invalid GIF signature: {:?}", signature));
        }
        let version = match Version::from_bytes(&signature[3..]) {
            Some(v) => v,
            None => return Err(invalid_container!("invalid GIF version: {:?}", &signature[3..]))
        };

        let width = try_if_eof!(r.read_u16::<LittleEndian>(), "when reading logical width");
        let height = try_if_eof!(r.read_u16::<LittleEndian>(), "when reading logical height");

        let packed_flags = try_if_eof!(r.read_u8(), "when reading global flags");

        let global_color_table =        (packed_flags & 0b10000000) > 0;
        let color_resolution =          (packed_flags & 0b01110000) >> 4;
        let global_color_table_sorted = (packed_flags & 0b00001000) > 0;

        let background_color_index = try_if_eof!(r.read_u8(), "when reading background color index");
        let pixel_aspect_ratio = try_if_eof!(r.read_u8(), "when reading pixel aspect ratio");

        if global_color_table {
            skip(r, color_table_len(packed_flags))?;
        }

        let mut blocks = Blocks::default();
        let warning = match read_blocks(r, &mut blocks) {
            Ok(()) => None,
            Err(e) => {
                debug!(error = %e, "GIF block stream ended early");
                Some(e.to_string().into())
            }
        };

        let declared_color_table = ColorTable {
            size: 1u16 << ((packed_flags & 0b111) + 1),
            sorted: global_color_table_sorted
        };

        Ok(Metadata {
            version: version,

            dimensions: (width, height).into(),

            global_color_table: if global_color_table { Some(declared_color_table.clone()) } else { None },
            declared_color_table: declared_color_table,

            color_resolution: color_resolution + 1,

            background_color_index: background_color_index,
            pixel_aspect_ratio: pixel_aspect_ratio,

            frames: blocks.frames,
            has_transparency: blocks.has_transparency,
            has_animation: blocks.has_animation,

            warning: warning
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use crate::types::{Error, Dimensions};
    use crate::traits::LoadableMetadata;

    use super::{Metadata, Version, ColorTable};

    macro_rules! build {
        ($($arg:expr),+) => {{
            let mut data = Vec::new();
            $(data.write_all($arg).unwrap();)+
            data
        }}
    }

    const IMAGE: &[u8] = b"\x2c\x00\x00\x00\x00\x64\x00\x64\x00\x00\x02\x02\x44\x01\x00";

    #[test]
    fn test_single_frame() {
        let data = build! {
            b"GIF89a", b"\x64\x00\x64\x00", &[0x80, 0x00, 0x00],
            &[0, 0, 0, 255, 255, 255],
            IMAGE,
            b"\x3b"
        };

        let md = Metadata::load_from_buf(&data).unwrap();
        assert_eq!(md.version, Version::V89a);
        assert_eq!(md.dimensions, Dimensions::from((100u16, 100u16)));
        assert_eq!(md.global_color_table, Some(ColorTable { size: 2, sorted: false }));
        assert_eq!(md.color_resolution, 1);
        assert_eq!(md.frames, 1);
        assert!(!md.has_animation);
        assert!(!md.has_transparency);
        assert!(md.warning.is_none());
    }

    #[test]
    fn test_animation_and_transparency() {
        let data = build! {
            b"GIF89a", b"\x0a\x00\x14\x00", &[0b0111_0000, 0x03, 0x31],
            b"\x21\xff\x0bNETSCAPE2.0\x03\x01\x00\x00\x00",
            b"\x21\xf9\x04\x01\x0a\x00\x05\x00",
            b"\x21\xfe\x05hello\x00",
            b"\x2c\x00\x00\x00\x00\x0a\x00\x14\x00\x81", &[0; 12], b"\x02\x01\x00\x00",
            IMAGE,
            b"\x3b"
        };

        let md = Metadata::load_from_buf(&data).unwrap();
        assert_eq!(md.version, Version::V89a);
        assert_eq!(md.global_color_table, None);
        assert_eq!(md.color_resolution, 8);
        assert_eq!(md.background_color_index, 3);
        assert_eq!(md.pixel_aspect_ratio_approx(), Some(1.0));
        assert_eq!(md.frames, 2);
        assert!(md.has_animation);
        assert!(md.has_transparency);
        assert!(md.warning.is_none());
    }

    #[test]
    fn test_declared_table_without_global_table() {
        let data = build! {
            b"GIF89a", b"\x01\x00\x01\x00", &[0b0000_1011, 0, 0],
            IMAGE,
            b"\x3b"
        };

        let md = Metadata::load_from_buf(&data).unwrap();
        assert_eq!(md.global_color_table, None);
        assert_eq!(md.declared_color_table, ColorTable { size: 16, sorted: true });
        assert_eq!(md.declared_color_table.bits(), 4);
    }

    #[test]
    fn test_unknown_block_bytes_are_skipped() {
        let data = build! {
            b"GIF87a", b"\x01\x00\x01\x00", &[0, 0, 0],
            b"\x00\x00\x99",
            IMAGE,
            b"\x3b"
        };

        let md = Metadata::load_from_buf(&data).unwrap();
        assert_eq!(md.version, Version::V87a);
        assert_eq!(md.frames, 1);
    }

    #[test]
    fn test_missing_trailer() {
        let data = build! { b"GIF89a", b"\x05\x00\x06\x00", &[0, 0, 0], IMAGE };

        let md = Metadata::load_from_buf(&data).unwrap();
        assert_eq!(md.dimensions, Dimensions::from((5u16, 6u16)));
        assert_eq!(md.frames, 1);
        assert!(md.warning.is_some());
    }

    #[test]
    fn test_invalid_signature() {
        match Metadata::load_from_buf(b"GIF90a\x01\x00\x01\x00\x00\x00\x00") {
            Err(Error::InvalidContainer(_)) => {}
            other => panic!("unexpected result: {:?}", other)
        }
    }

    #[test]
    fn test_truncated_screen_descriptor() {
        assert!(Metadata::load_from_buf(b"GIF89a\x01\x00").is_err());
    }
}
