//! Metadata of JPEG images.

use std::borrow::Cow;
use std::cmp;
use std::io::{Read, Seek};

use byteorder::{ReadBytesExt, BigEndian};
use tracing::{debug, trace};

use crate::common::tiff;
use crate::types::{Result, Dimensions, ColorSpace, ExifMap};
use crate::traits::LoadableMetadata;
use crate::utils::{read_payload, skip};

/// Coding process announced by the start-of-frame marker.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum CodingProcess {
    BaselineSequential,
    ExtendedSequential,
    Progressive,
    Lossless
}

impl CodingProcess {
    fn from_marker(marker: u8) -> CodingProcess {
        match marker & 0x03 {
            0 if marker == 0xc0 => CodingProcess::BaselineSequential,
            0 | 1 => CodingProcess::ExtendedSequential,
            2 => CodingProcess::Progressive,
            _ => CodingProcess::Lossless
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CodingProcess::BaselineSequential => "Baseline sequential",
            CodingProcess::ExtendedSequential => "Extended sequential",
            CodingProcess::Progressive => "Progressive",
            CodingProcess::Lossless => "Lossless"
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum EntropyCoding {
    Huffman,
    Arithmetic
}

impl EntropyCoding {
    fn from_marker(marker: u8) -> EntropyCoding {
        if marker & 0x08 == 0 { EntropyCoding::Huffman } else { EntropyCoding::Arithmetic }
    }

    pub fn name(self) -> &'static str {
        match self {
            EntropyCoding::Huffman => "Huffman",
            EntropyCoding::Arithmetic => "Arithmetic"
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct Metadata {
    pub dimensions: Dimensions,
    /// Bits per sample of each component.
    pub sample_precision: u8,
    /// Number of image components, if the frame header was long enough to carry it.
    pub components: Option<u8>,
    pub coding_process: CodingProcess,
    pub entropy_coding: EntropyCoding,
    /// Whether the frame is a differential (hierarchical) one.
    pub differential: bool,
    /// Whether an APP2 `ICC_PROFILE` segment is present.
    pub has_icc_profile: bool,
    /// Tags from APP1 `Exif` segments.
    pub exif: ExifMap,
    /// Why the segment walk stopped before the image data, if it did.
    pub warning: Option<Cow<'static, str>>
}

impl Metadata {
    pub fn color_space(&self) -> ColorSpace {
        match self.components {
            Some(1) => ColorSpace::Grayscale,
            Some(3) | None => ColorSpace::Rgb,
            Some(4) => ColorSpace::Cmyk,
            Some(_) => ColorSpace::Unknown
        }
    }
}

struct Frame {
    marker: u8,
    precision: u8,
    height: u16,
    width: u16,
    components: Option<u8>
}

#[derive(Default)]
struct Segments {
    frame: Option<Frame>,
    has_icc_profile: bool,
    exif: ExifMap
}

const SOF_HEADER_LEN: u64 = 9;
const EXIF_PREFIX: &[u8] = b"Exif\0\0";
const ICC_PREFIX: &[u8] = b"ICC_PROFILE";

fn is_start_of_frame(marker: u8) -> bool {
    match marker {
        0xc0..=0xc3 | 0xc5..=0xc7 | 0xc9..=0xcb | 0xcd..=0xcf => true,
        _ => false
    }
}

fn read_segments<R: ?Sized + Read + Seek>(r: &mut R, segments: &mut Segments) -> Result<()> {
    loop {
        let prefix = try_if_eof!(r.read_u8(), "when searching for a marker");
        if prefix != 0xff {
            return Err(invalid_container!("expected a marker, found 0x{:02X}", prefix));
        }

        // any number of 0xFF fill bytes may precede the marker type
        let mut marker = try_if_eof!(r.read_u8(), "when reading marker type");
        while marker == 0xff {
            marker = try_if_eof!(r.read_u8(), "when reading marker type");
        }

        match marker {
            0xd9 => return Ok(()),
            0xd0..=0xd7 => continue,
            _ => {}
        }

        let len = try_if_eof!(r.read_u16::<BigEndian>(), "when reading length of marker 0x{:02X}", marker);
        if len < 2 {
            return Err(invalid_container!("invalid length of marker 0x{:02X}: {}", marker, len));
        }
        let size = (len - 2) as u64;
        trace!(marker, size, "JPEG segment");

        match marker {
            0xe1 => {
                let data = try_if_eof!(read_payload(r, size), "when reading APP1 segment");
                if data.starts_with(EXIF_PREFIX) {
                    tiff::merge_exif(&data[EXIF_PREFIX.len()..], &mut segments.exif);
                }
            }
            0xe2 => {
                let data = try_if_eof!(read_payload(r, size), "when reading APP2 segment");
                if data.starts_with(ICC_PREFIX) {
                    segments.has_icc_profile = true;
                }
            }
            m if is_start_of_frame(m) => {
                let n = cmp::min(size, SOF_HEADER_LEN);
                let mut header = [0u8; SOF_HEADER_LEN as usize];
                try_if_eof!(r.read_exact(&mut header[..n as usize]), "when reading frame header");
                if n >= 5 {
                    segments.frame = Some(Frame {
                        marker: m,
                        precision: header[0],
                        height: u16::from_be_bytes([header[1], header[2]]),
                        width: u16::from_be_bytes([header[3], header[4]]),
                        components: if n >= 6 { Some(header[5]) } else { None }
                    });
                }
                skip(r, size - n)?;
            }
            // entropy-coded data follows the scan header, no more metadata after this point
            0xda => return Ok(()),
            _ => skip(r, size)?
        }
    }
}

impl LoadableMetadata for Metadata {
    fn load<R: ?Sized + Read + Seek>(r: &mut R) -> Result<Metadata> {
        let mut soi = [0u8; 2];
        try_if_eof!(r.read_exact(&mut soi), "when reading SOI marker");
        if soi != [0xff, 0xd8] {
            return Err(invalid_container!("invalid JPEG SOI marker: {:?}", soi));
        }

        let mut segments = Segments::default();
        let warning = match read_segments(r, &mut segments) {
            Ok(()) => None,
            Err(e) => {
                if segments.frame.is_none() {
                    return Err(e);
                }
                debug!(error = %e, "JPEG segment stream ended early");
                Some(e.to_string().into())
            }
        };

        let frame = match segments.frame {
            Some(frame) => frame,
            None => return Err(unexpected_eof!("before start-of-frame segment"))
        };

        Ok(Metadata {
            dimensions: (frame.width, frame.height).into(),
            sample_precision: frame.precision,
            components: frame.components,
            coding_process: CodingProcess::from_marker(frame.marker),
            entropy_coding: EntropyCoding::from_marker(frame.marker),
            differential: frame.marker & 0x04 != 0,
            has_icc_profile: segments.has_icc_profile,
            exif: segments.exif,
            warning: warning
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use byteorder::{WriteBytesExt, BigEndian};

    use crate::types::{Error, ColorSpace, Value};
    use crate::traits::LoadableMetadata;

    use super::{Metadata, CodingProcess, EntropyCoding};

    fn segment(data: &mut Vec<u8>, marker: u8, payload: &[u8]) {
        data.write_all(&[0xff, marker]).unwrap();
        data.write_u16::<BigEndian>(payload.len() as u16 + 2).unwrap();
        data.write_all(payload).unwrap();
    }

    fn sof(marker: u8, precision: u8, height: u16, width: u16, components: u8) -> (u8, Vec<u8>) {
        let mut p = vec![precision];
        p.write_u16::<BigEndian>(height).unwrap();
        p.write_u16::<BigEndian>(width).unwrap();
        p.push(components);
        for c in 0..components {
            p.write_all(&[c + 1, 0x11, 0]).unwrap();
        }
        (marker, p)
    }

    fn jpeg(segments: &[(u8, Vec<u8>)]) -> Vec<u8> {
        let mut data = vec![0xff, 0xd8];
        for &(m, ref p) in segments {
            segment(&mut data, m, p);
        }
        data.write_all(&[0xff, 0xd9]).unwrap();
        data
    }

    #[test]
    fn test_baseline_rgb() {
        let data = jpeg(&[
            (0xe0, b"JFIF\0\x01\x01\x01\x00\x48\x00\x48\x00\x00".to_vec()),
            sof(0xc0, 8, 100, 100, 3)
        ]);
        let md = Metadata::load_from_buf(&data).unwrap();

        assert_eq!((md.dimensions.width, md.dimensions.height), (100, 100));
        assert_eq!(md.sample_precision, 8);
        assert_eq!(md.color_space(), ColorSpace::Rgb);
        assert_eq!(md.coding_process, CodingProcess::BaselineSequential);
        assert_eq!(md.entropy_coding, EntropyCoding::Huffman);
        assert!(!md.differential);
        assert!(md.warning.is_none());
    }

    #[test]
    fn test_height_precedes_width() {
        let data = jpeg(&[sof(0xc2, 8, 480, 640, 1)]);
        let md = Metadata::load_from_buf(&data).unwrap();
        assert_eq!((md.dimensions.width, md.dimensions.height), (640, 480));
        assert_eq!(md.color_space(), ColorSpace::Grayscale);
        assert_eq!(md.coding_process, CodingProcess::Progressive);
    }

    #[test]
    fn test_cmyk_arithmetic_lossless() {
        let data = jpeg(&[sof(0xcf, 12, 10, 20, 4)]);
        let md = Metadata::load_from_buf(&data).unwrap();
        assert_eq!(md.color_space(), ColorSpace::Cmyk);
        assert_eq!(md.coding_process, CodingProcess::Lossless);
        assert_eq!(md.entropy_coding, EntropyCoding::Arithmetic);
        assert!(md.differential);
    }

    #[test]
    fn test_fill_bytes_and_restart_markers() {
        let mut data = vec![0xff, 0xd8, 0xff, 0xff, 0xff, 0xd0];
        let (m, p) = sof(0xc1, 8, 7, 9, 3);
        data.write_all(&[0xff, 0xff]).unwrap();
        segment(&mut data, m, &p);
        data.write_all(&[0xff, 0xd9]).unwrap();

        let md = Metadata::load_from_buf(&data).unwrap();
        assert_eq!((md.dimensions.width, md.dimensions.height), (9, 7));
        assert_eq!(md.coding_process, CodingProcess::ExtendedSequential);
    }

    #[test]
    fn test_exif_and_icc_segments() {
        let mut app1 = b"Exif\0\0".to_vec();
        app1.write_all(b"II\x2a\x00\x08\x00\x00\x00\x01\x00\x0f\x01\x02\x00\x04\x00\x00\x00ACME").unwrap();
        let mut app2 = b"ICC_PROFILE\0\x01\x01".to_vec();
        app2.write_all(&[0; 16]).unwrap();

        let data = jpeg(&[(0xe1, app1), (0xe2, app2), sof(0xc0, 8, 1, 1, 3)]);
        let md = Metadata::load_from_buf(&data).unwrap();
        assert!(md.has_icc_profile);
        assert_eq!(md.exif.get("Make"), Some(&Value::Text("ACME".into())));
    }

    #[test]
    fn test_stops_at_start_of_scan() {
        let mut data = jpeg(&[sof(0xc0, 8, 2, 2, 3), (0xda, vec![1, 1, 0, 0, 63, 0])]);
        data.truncate(data.len() - 2);
        data.write_all(&[0x12, 0x34, 0x56]).unwrap();

        let md = Metadata::load_from_buf(&data).unwrap();
        assert!(md.warning.is_none());
    }

    #[test]
    fn test_truncated_after_frame() {
        let mut data = jpeg(&[sof(0xc0, 8, 3, 4, 3)]);
        data.truncate(data.len() - 2);
        data.write_all(&[0xff, 0xe1, 0x10]).unwrap();

        let md = Metadata::load_from_buf(&data).unwrap();
        assert_eq!((md.dimensions.width, md.dimensions.height), (4, 3));
        assert!(md.warning.is_some());
    }

    #[test]
    fn test_default_color_space_for_short_frame() {
        let data = jpeg(&[(0xc0, vec![8, 0, 5, 0, 6])]);
        let md = Metadata::load_from_buf(&data).unwrap();
        assert_eq!(md.components, None);
        assert_eq!(md.color_space(), ColorSpace::Rgb);
    }

    #[test]
    fn test_missing_frame() {
        let data = jpeg(&[(0xe0, vec![0; 14])]);
        match Metadata::load_from_buf(&data) {
            Err(Error::UnexpectedEndOfFile(_)) => {}
            other => panic!("unexpected result: {:?}", other)
        }
    }

    #[test]
    fn test_invalid_soi() {
        assert!(Metadata::load_from_buf(b"\xff\xd9\xff\xd8").is_err());
    }
}
