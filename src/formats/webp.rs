//! Metadata of WebP images.

use std::borrow::Cow;
use std::io::{Read, Seek};

use tracing::{debug, trace};

use crate::common::riff::{self, ChunkId, ChunkHeader};
use crate::common::tiff;
use crate::types::{Result, Dimensions, ExifMap};
use crate::traits::LoadableMetadata;
use crate::utils::{read_payload, skip};

/// Metadata of a WebP image; the variant depends on the first chunk of the file.
#[derive(Clone, PartialEq, Debug)]
pub enum Metadata {
    /// Simple lossy image.
    VP8(VP8Metadata),
    /// Simple lossless image.
    VP8L(VP8LMetadata),
    /// Extended image which may carry alpha, animation, ICC, EXIF and XMP data.
    VP8X(VP8XMetadata)
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct VP8Metadata {
    pub version_number: u8,
    pub show_frame: bool,
    pub first_partition_len: u32,
    pub dimensions: Dimensions,
    pub x_scale: u8,
    pub y_scale: u8
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct VP8LMetadata {
    pub dimensions: Dimensions,
    /// The encoder's hint that the alpha channel is not trivially opaque.
    pub alpha_is_used: bool,
    pub version_number: u8
}

#[derive(Clone, PartialEq, Debug)]
pub struct VP8XMetadata {
    pub dimensions: Dimensions,
    pub icc: bool,
    pub alpha: bool,
    pub exif: bool,
    pub xmp: bool,
    pub animation: bool,
    /// Tags from the `EXIF` chunk, looked up only when the `exif` flag is set.
    pub exif_tags: ExifMap,
    /// Why the search for the `EXIF` chunk failed, if it did.
    pub warning: Option<Cow<'static, str>>
}

const WEBP_FORM_TYPE: ChunkId = ChunkId(*b"WEBP");
const VP8_CHUNK_ID: ChunkId   = ChunkId(*b"VP8 ");
const VP8L_CHUNK_ID: ChunkId  = ChunkId(*b"VP8L");
const VP8X_CHUNK_ID: ChunkId  = ChunkId(*b"VP8X");
const EXIF_CHUNK_ID: ChunkId  = ChunkId(*b"EXIF");

const VP8_START_CODE: [u8; 3] = [0x9d, 0x01, 0x2a];
const VP8L_SIGNATURE: u8 = 0x2f;

const VP8X_ICC: u8       = 0b00100000;
const VP8X_ALPHA: u8     = 0b00010000;
const VP8X_EXIF: u8      = 0b00001000;
const VP8X_XMP: u8       = 0b00000100;
const VP8X_ANIMATION: u8 = 0b00000010;

impl Metadata {
    pub fn dimensions(&self) -> Dimensions {
        match *self {
            Metadata::VP8(ref md) => md.dimensions,
            Metadata::VP8L(ref md) => md.dimensions,
            Metadata::VP8X(ref md) => md.dimensions
        }
    }

    /// Lossless images always count as having alpha.
    pub fn has_alpha(&self) -> bool {
        match *self {
            Metadata::VP8(_) => false,
            Metadata::VP8L(_) => true,
            Metadata::VP8X(ref md) => md.alpha
        }
    }

    pub fn has_animation(&self) -> bool {
        match *self {
            Metadata::VP8X(ref md) => md.animation,
            _ => false
        }
    }

    pub fn color_depth(&self) -> u32 {
        match *self {
            Metadata::VP8(_) => 24,
            Metadata::VP8L(_) => 32,
            Metadata::VP8X(ref md) => if md.alpha { 32 } else { 24 }
        }
    }
}

impl LoadableMetadata for Metadata {
    fn load<R: ?Sized + Read + Seek>(r: &mut R) -> Result<Metadata> {
        let form_type = riff::read_file_header(r)?;
        if form_type != WEBP_FORM_TYPE {
            return Err(invalid_container!("invalid WEBP signature: {}", form_type));
        }

        let chunk = match riff::read_chunk_header(r)? {
            Some(c) => c,
            None => return Err(unexpected_eof!("when reading first WEBP chunk"))
        };
        trace!(chunk = %chunk.id, len = chunk.len, "first WebP chunk");

        match chunk.id {
            VP8_CHUNK_ID => read_vp8_chunk(r).map(Metadata::VP8),
            VP8L_CHUNK_ID => read_vp8l_chunk(r).map(Metadata::VP8L),
            VP8X_CHUNK_ID => read_vp8x_chunk(r, &chunk).map(Metadata::VP8X),
            cid => Err(unsupported_variant!("unsupported WEBP chunk: {}", cid))
        }
    }
}

// Dimension fields in all three headers are stored minus one.
fn read_vp8_chunk<R: ?Sized + Read>(r: &mut R) -> Result<VP8Metadata> {
    let mut hdr = [0u8; 10];
    try_if_eof!(r.read_exact(&mut hdr), "when reading VP8 key frame header");

    // check magic value
    if hdr[3..6] != VP8_START_CODE {
        return Err(invalid_container!("VP8 key frame magic code is invalid: {:?}", &hdr[3..6]));
    }

    // bits of first three bytes:
    //    xxxsvvvf xxxxxxxx xxxxxxxx
    // where
    //    f  --  frame type, 0 is key frame, 1 is interframe
    //    v  --  version number
    //    s  --  show frame flag, 1 is display, 0 is don't display
    //    x  --  size of first data partition in bytes
    //
    // bits of the last four bytes:
    //    wwwwwwww xxwwwwww hhhhhhhh yyhhhhhh
    // where
    //    x  --  horizontal scale
    //    w  --  width
    //    y  --  vertical scale
    //    h  --  height

    let width  = ((hdr[7] & 0x3f) as u32) << 8 | hdr[6] as u32;
    let height = ((hdr[9] & 0x3f) as u32) << 8 | hdr[8] as u32;

    Ok(VP8Metadata {
        version_number: (hdr[0] >> 1) & 7,
        show_frame: (hdr[0] >> 4) & 1 == 1,
        first_partition_len: ((hdr[0] >> 5) as u32) |
                             ((hdr[1] as u32) << 3) |
                             ((hdr[2] as u32) << 11),
        dimensions: (width + 1, height + 1).into(),
        x_scale: hdr[7] >> 6,
        y_scale: hdr[9] >> 6
    })
}

fn read_vp8l_chunk<R: ?Sized + Read>(r: &mut R) -> Result<VP8LMetadata> {
    let mut hdr = [0u8; 5];
    try_if_eof!(r.read_exact(&mut hdr), "when reading VP8L header");

    if hdr[0] != VP8L_SIGNATURE {
        return Err(invalid_container!("invalid VP8L signature: 0x{:02X}", hdr[0]));
    }

    // 14 bits of width, 14 bits of height, alpha hint bit and 3 bits of version,
    // packed starting from the least significant bit of byte 1
    let width  = hdr[1] as u32 | ((hdr[2] & 0x3f) as u32) << 8;
    let height = (hdr[2] >> 6) as u32 | (hdr[3] as u32) << 2 | ((hdr[4] & 0x0f) as u32) << 10;

    Ok(VP8LMetadata {
        dimensions: (width + 1, height + 1).into(),
        alpha_is_used: (hdr[4] >> 4) & 1 == 1,
        version_number: hdr[4] >> 5
    })
}

const VP8X_HEADER_LEN: u32 = 10;

fn read_vp8x_chunk<R: ?Sized + Read + Seek>(r: &mut R, chunk: &ChunkHeader) -> Result<VP8XMetadata> {
    let mut hdr = [0u8; VP8X_HEADER_LEN as usize];
    try_if_eof!(r.read_exact(&mut hdr), "when reading VP8X header");

    // flags byte, three reserved bytes, then 24-bit width and height
    let flags = hdr[0];
    let width  = hdr[4] as u32 | (hdr[5] as u32) << 8 | (hdr[6] as u32) << 16;
    let height = hdr[7] as u32 | (hdr[8] as u32) << 8 | (hdr[9] as u32) << 16;

    let mut md = VP8XMetadata {
        dimensions: (width + 1, height + 1).into(),
        icc: flags & VP8X_ICC != 0,
        alpha: flags & VP8X_ALPHA != 0,
        exif: flags & VP8X_EXIF != 0,
        xmp: flags & VP8X_XMP != 0,
        animation: flags & VP8X_ANIMATION != 0,
        exif_tags: ExifMap::new(),
        warning: None
    };

    if md.exif {
        let rest = chunk.padded_len().saturating_sub(VP8X_HEADER_LEN as u64);
        if let Err(e) = find_exif_chunk(r, rest, &mut md.exif_tags) {
            debug!(error = %e, "cannot read WebP EXIF chunk");
            md.warning = Some(e.to_string().into());
        }
    }

    Ok(md)
}

const EXIF_PREFIX: &[u8] = b"Exif\0\0";

fn find_exif_chunk<R: ?Sized + Read + Seek>(r: &mut R, to_skip: u64, exif: &mut ExifMap) -> Result<()> {
    skip(r, to_skip)?;
    loop {
        let chunk = match riff::read_chunk_header(r)? {
            Some(c) => c,
            None => return Err(unexpected_eof!("when searching for EXIF chunk"))
        };
        trace!(chunk = %chunk.id, len = chunk.len, "WebP chunk");

        if chunk.id == EXIF_CHUNK_ID {
            let data = try_if_eof!(read_payload(r, chunk.len as u64), "when reading EXIF chunk");
            // some writers keep the JPEG APP1 prefix
            let tiff_data = data.strip_prefix(EXIF_PREFIX).unwrap_or(&data[..]);
            tiff::merge_exif(tiff_data, exif);
            return Ok(());
        }
        skip(r, chunk.padded_len())?;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use byteorder::{WriteBytesExt, LittleEndian};

    use crate::types::{Error, Dimensions, Value};
    use crate::traits::LoadableMetadata;

    use super::Metadata;

    fn webp(chunks: &[(&[u8; 4], &[u8])]) -> Vec<u8> {
        let mut body = b"WEBP".to_vec();
        for &(id, payload) in chunks {
            body.write_all(id).unwrap();
            body.write_u32::<LittleEndian>(payload.len() as u32).unwrap();
            body.write_all(payload).unwrap();
            if payload.len() % 2 == 1 {
                body.push(0);
            }
        }
        let mut data = b"RIFF".to_vec();
        data.write_u32::<LittleEndian>(body.len() as u32).unwrap();
        data.extend_from_slice(&body);
        data
    }

    #[test]
    fn test_vp8() {
        // key frame, version 0, shown; 99 in both 14-bit fields
        let payload = [0x10, 0x02, 0x00, 0x9d, 0x01, 0x2a, 0x63, 0x00, 0x63, 0x00, 0xaa, 0xbb];
        let md = Metadata::load_from_buf(&webp(&[(b"VP8 ", &payload)])).unwrap();

        assert_eq!(md.dimensions(), Dimensions::from((100u32, 100u32)));
        assert_eq!(md.color_depth(), 24);
        assert!(!md.has_alpha());
        assert!(!md.has_animation());
        match md {
            Metadata::VP8(ref vp8) => {
                assert!(vp8.show_frame);
                assert_eq!(vp8.first_partition_len, 16);
            }
            _ => panic!("expected a VP8 image")
        }
    }

    #[test]
    fn test_vp8_bad_start_code() {
        let payload = [0x10, 0x02, 0x00, 0x9d, 0x01, 0x2b, 0x63, 0x00, 0x63, 0x00];
        match Metadata::load_from_buf(&webp(&[(b"VP8 ", &payload)])) {
            Err(Error::InvalidContainer(_)) => {}
            other => panic!("unexpected result: {:?}", other)
        }
    }

    #[test]
    fn test_vp8l() {
        // width - 1 = 399, height - 1 = 299
        let w = 399u32;
        let h = 299u32;
        let bits = w | h << 14 | 1 << 28;
        let mut payload = vec![0x2f];
        payload.write_u32::<LittleEndian>(bits).unwrap();

        let md = Metadata::load_from_buf(&webp(&[(b"VP8L", &payload)])).unwrap();
        assert_eq!(md.dimensions(), Dimensions::from((400u32, 300u32)));
        assert_eq!(md.color_depth(), 32);
        assert!(md.has_alpha());
        match md {
            Metadata::VP8L(ref vp8l) => assert!(vp8l.alpha_is_used),
            _ => panic!("expected a VP8L image")
        }
    }

    #[test]
    fn test_vp8x_with_exif() {
        let mut vp8x = vec![0b0011_1010, 0, 0, 0];
        vp8x.write_u24::<LittleEndian>(1919).unwrap();
        vp8x.write_u24::<LittleEndian>(1079).unwrap();
        let exif = b"II\x2a\x00\x08\x00\x00\x00\x01\x00\x10\x01\x02\x00\x03\x00\x00\x00X1\x00\x00";

        let data = webp(&[(b"VP8X", &vp8x), (b"ICCP", b"abc"), (b"EXIF", exif)]);
        let md = Metadata::load_from_buf(&data).unwrap();

        assert_eq!(md.dimensions(), Dimensions::from((1920u32, 1080u32)));
        assert_eq!(md.color_depth(), 32);
        assert!(md.has_alpha());
        assert!(md.has_animation());
        match md {
            Metadata::VP8X(ref x) => {
                assert!(x.icc && x.exif && !x.xmp);
                assert_eq!(x.exif_tags.get("Model"), Some(&Value::Text("X1".into())));
                assert!(x.warning.is_none());
            }
            _ => panic!("expected a VP8X image")
        }
    }

    #[test]
    fn test_vp8x_without_alpha() {
        let mut vp8x = vec![0b0000_0100, 0, 0, 0];
        vp8x.write_u24::<LittleEndian>(0).unwrap();
        vp8x.write_u24::<LittleEndian>(15).unwrap();

        let md = Metadata::load_from_buf(&webp(&[(b"VP8X", &vp8x)])).unwrap();
        assert_eq!(md.dimensions(), Dimensions::from((1u32, 16u32)));
        assert_eq!(md.color_depth(), 24);
        assert!(!md.has_alpha());
    }

    #[test]
    fn test_unsupported_chunk() {
        match Metadata::load_from_buf(&webp(&[(b"ALPH", b"\0\0")])) {
            Err(Error::UnsupportedVariant(_)) => {}
            other => panic!("unexpected result: {:?}", other)
        }
    }
}
