//! Metadata of PNG images.

use std::borrow::Cow;
use std::io::{Read, Seek};

use byteorder::{ReadBytesExt, BigEndian};
use tracing::{debug, trace};

use crate::common::tiff;
use crate::detector::PNG_SIGNATURE;
use crate::types::{Result, Dimensions, ColorSpace, ExifMap};
use crate::traits::LoadableMetadata;
use crate::utils::{read_payload, skip};

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ColorType {
    Grayscale,
    Rgb,
    Indexed,
    GrayscaleAlpha,
    RgbAlpha,
    Unknown(u8)
}

const CT_GRAYSCALE: u8 = 0;
const CT_RGB: u8 = 2;
const CT_INDEXED: u8 = 3;
const CT_GRAYSCALE_ALPHA: u8 = 4;
const CT_RGB_ALPHA: u8 = 6;

impl ColorType {
    fn from_u8(n: u8) -> ColorType {
        match n {
            CT_GRAYSCALE       => ColorType::Grayscale,
            CT_RGB             => ColorType::Rgb,
            CT_INDEXED         => ColorType::Indexed,
            CT_GRAYSCALE_ALPHA => ColorType::GrayscaleAlpha,
            CT_RGB_ALPHA       => ColorType::RgbAlpha,
            n                  => ColorType::Unknown(n)
        }
    }

    pub fn code(self) -> u8 {
        match self {
            ColorType::Grayscale      => CT_GRAYSCALE,
            ColorType::Rgb            => CT_RGB,
            ColorType::Indexed        => CT_INDEXED,
            ColorType::GrayscaleAlpha => CT_GRAYSCALE_ALPHA,
            ColorType::RgbAlpha       => CT_RGB_ALPHA,
            ColorType::Unknown(n)     => n
        }
    }

    pub fn color_space(self) -> ColorSpace {
        match self {
            ColorType::Grayscale      => ColorSpace::Grayscale,
            ColorType::Rgb            => ColorSpace::Rgb,
            ColorType::Indexed        => ColorSpace::Indexed,
            ColorType::GrayscaleAlpha => ColorSpace::GrayscaleAlpha,
            ColorType::RgbAlpha       => ColorSpace::Rgba,
            ColorType::Unknown(_)     => ColorSpace::Unknown
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum InterlaceMethod {
    Disabled,
    Adam7,
    Unknown(u8)
}

impl InterlaceMethod {
    fn from_u8(n: u8) -> InterlaceMethod {
        match n {
            0 => InterlaceMethod::Disabled,
            1 => InterlaceMethod::Adam7,
            n => InterlaceMethod::Unknown(n)
        }
    }

    pub fn code(self) -> u8 {
        match self {
            InterlaceMethod::Disabled => 0,
            InterlaceMethod::Adam7 => 1,
            InterlaceMethod::Unknown(n) => n
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct Metadata {
    pub dimensions: Dimensions,
    /// Bits per sample (or per palette index), as stored in IHDR.
    pub bit_depth: u8,
    pub color_type: ColorType,
    pub compression_method: u8,
    pub filter_method: u8,
    pub interlace_method: InterlaceMethod,
    /// Whether an `iCCP` chunk is present.
    pub has_icc_profile: bool,
    /// Tags from an `eXIf` chunk.
    pub exif: ExifMap,
    /// Why the chunk walk stopped before `IEND`, if it did.
    pub warning: Option<Cow<'static, str>>
}

struct Ihdr {
    width: u32,
    height: u32,
    bit_depth: u8,
    color_type: u8,
    compression_method: u8,
    filter_method: u8,
    interlace_method: u8
}

#[derive(Default)]
struct Chunks {
    ihdr: Option<Ihdr>,
    has_icc_profile: bool,
    exif: ExifMap
}

const IHDR_LEN: u32 = 13;
const CRC_LEN: u64 = 4;

// CRCs are skipped without verification.
fn read_chunks<R: ?Sized + Read + Seek>(r: &mut R, chunks: &mut Chunks) -> Result<()> {
    loop {
        let len = try_if_eof!(r.read_u32::<BigEndian>(), "when reading chunk length");
        let mut chunk_type = [0u8; 4];
        try_if_eof!(r.read_exact(&mut chunk_type), "when reading chunk type");
        trace!(chunk = %String::from_utf8_lossy(&chunk_type), len, "PNG chunk");

        match &chunk_type {
            b"IHDR" if len >= IHDR_LEN => {
                chunks.ihdr = Some(Ihdr {
                    width: try_if_eof!(r.read_u32::<BigEndian>(), "when reading width"),
                    height: try_if_eof!(r.read_u32::<BigEndian>(), "when reading height"),
                    bit_depth: try_if_eof!(r.read_u8(), "when reading bit depth"),
                    color_type: try_if_eof!(r.read_u8(), "when reading color type"),
                    compression_method: try_if_eof!(r.read_u8(), "when reading compression method"),
                    filter_method: try_if_eof!(r.read_u8(), "when reading filter method"),
                    interlace_method: try_if_eof!(r.read_u8(), "when reading interlace method")
                });
                skip(r, (len - IHDR_LEN) as u64)?;
            }
            b"iCCP" => {
                chunks.has_icc_profile = true;
                skip(r, len as u64)?;
            }
            b"eXIf" => {
                let data = try_if_eof!(read_payload(r, len as u64), "when reading eXIf chunk");
                tiff::merge_exif(&data, &mut chunks.exif);
            }
            _ => skip(r, len as u64)?
        }

        skip(r, CRC_LEN)?;

        if &chunk_type == b"IEND" {
            return Ok(());
        }
    }
}

impl LoadableMetadata for Metadata {
    fn load<R: ?Sized + Read + Seek>(r: &mut R) -> Result<Metadata> {
        let mut signature = [0u8; 8];
        try_if_eof!(r.read_exact(&mut signature), "when reading PNG signature");

        if &signature != PNG_SIGNATURE {
            return Err(invalid_container!("invalid PNG header: {:?}", signature));
        }

        let mut chunks = Chunks::default();
        let warning = match read_chunks(r, &mut chunks) {
            Ok(()) => None,
            Err(e) => {
                if chunks.ihdr.is_none() {
                    return Err(e);
                }
                debug!(error = %e, "PNG chunk stream ended early");
                Some(e.to_string().into())
            }
        };

        let ihdr = match chunks.ihdr {
            Some(ihdr) => ihdr,
            None => return Err(unexpected_eof!("before IHDR chunk"))
        };

        Ok(Metadata {
            dimensions: (ihdr.width, ihdr.height).into(),
            bit_depth: ihdr.bit_depth,
            color_type: ColorType::from_u8(ihdr.color_type),
            compression_method: ihdr.compression_method,
            filter_method: ihdr.filter_method,
            interlace_method: InterlaceMethod::from_u8(ihdr.interlace_method),
            has_icc_profile: chunks.has_icc_profile,
            exif: chunks.exif,
            warning: warning
        })
    }
}
