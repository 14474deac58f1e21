//! Decoder for the TIFF directory structure carried by EXIF payloads.
//!
//! JPEG stores it in an APP1 segment after an `Exif\0\0` prefix, PNG in an `eXIf` chunk and
//! WebP in an `EXIF` chunk. The blob starts with the TIFF header; every offset inside it is
//! relative to the first byte of the blob.

use arrayvec::ArrayVec;
use tracing::{debug, trace};

use crate::types::{Result, Value, ExifMap};
use crate::utils::Endian;

/// Maximum nesting of directories reached through `ExifIFD` pointers.
pub const MAX_IFD_DEPTH: usize = 10;

/// Maximum number of distinct directories read from one blob.
pub const MAX_IFD_COUNT: usize = MAX_IFD_DEPTH + 1;

const TIFF_HEADER_LEN: usize = 8;
const IFD_ENTRY_LEN: usize = 12;

const TAG_EXIF_IFD: u16 = 0x8769;

const TYPE_BYTE: u16 = 1;
const TYPE_ASCII: u16 = 2;
const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;
const TYPE_RATIONAL: u16 = 5;
const TYPE_UNDEFINED: u16 = 7;
const TYPE_SLONG: u16 = 9;
const TYPE_SRATIONAL: u16 = 10;

/// Returns the name under which a tag is reported, or `None` for tags which are dropped.
pub fn tag_name(tag: u16) -> Option<&'static str> {
    Some(match tag {
        0x0132 => "DateTime",
        0x010f => "Make",
        0x0110 => "Model",
        0x0112 => "Orientation",
        0x011a => "XResolution",
        0x011b => "YResolution",
        0x0128 => "ResolutionUnit",
        0x0131 => "Software",
        0x013b => "Artist",
        0x8298 => "Copyright",
        0x8827 => "ISO",
        0x829a => "ExposureTime",
        0x829d => "FNumber",
        0x9003 => "DateTimeOriginal",
        0x9004 => "DateTimeDigitized",
        _ => return None
    })
}

// unknown types count as one byte per element to keep offset bookkeeping going
fn type_size(data_type: u16) -> u64 {
    match data_type {
        TYPE_SHORT => 2,
        TYPE_LONG | TYPE_SLONG => 4,
        TYPE_RATIONAL | TYPE_SRATIONAL => 8,
        _ => 1
    }
}

/// Parses a TIFF blob and returns the recognized tags of its first directory and of any
/// EXIF sub-directories it points to, flattened into one map.
pub fn parse_exif(data: &[u8]) -> Result<ExifMap> {
    if data.len() < TIFF_HEADER_LEN {
        return Err(unexpected_eof!("when reading TIFF header"));
    }

    let endian = match &data[..2] {
        b"II" => Endian::Little,
        b"MM" => Endian::Big,
        bom => return Err(invalid_container!("invalid TIFF byte order: {:?}", bom))
    };

    let magic = endian.u16(&data[2..4]);
    if magic != 42 {
        return Err(invalid_container!("invalid TIFF magic number: {}", magic));
    }

    let first_ifd = endian.u32(&data[4..8]) as usize;
    if first_ifd >= data.len() {
        return Err(invalid_container!("TIFF directory offset out of bounds: {}", first_ifd));
    }

    let mut exif = ExifMap::new();
    read_directories(data, endian, first_ifd, &mut exif);
    Ok(exif)
}

/// Parses a TIFF blob and merges its tags into `exif`, overwriting tags of the same name.
///
/// Returns `false` if the blob is malformed; `exif` is left untouched in that case.
pub fn merge_exif(data: &[u8], exif: &mut ExifMap) -> bool {
    match parse_exif(data) {
        Ok(tags) => {
            exif.extend(tags);
            true
        }
        Err(e) => {
            debug!(error = %e, "ignoring malformed EXIF data");
            false
        }
    }
}

struct Directory {
    next_entry: usize,
    remaining: u16,
    depth: usize,
}

fn open_directory(data: &[u8], endian: Endian, offset: usize, depth: usize) -> Option<Directory> {
    if depth > MAX_IFD_DEPTH {
        debug!(offset, "TIFF directory nesting limit reached");
        return None;
    }
    let entries = data.get(offset..offset.checked_add(2)?)?;
    Some(Directory {
        next_entry: offset + 2,
        remaining: endian.u16(entries),
        depth: depth,
    })
}

// Every directory offset is opened at most once, and at most MAX_IFD_COUNT of them per blob.
fn open_once(data: &[u8], endian: Endian, offset: usize, depth: usize,
             opened: &mut ArrayVec<usize, MAX_IFD_COUNT>) -> Option<Directory> {
    if opened.contains(&offset) {
        trace!(offset, "TIFF directory already read");
        return None;
    }
    if opened.is_full() {
        debug!(offset, "TIFF directory count limit reached");
        return None;
    }
    let dir = open_directory(data, endian, offset, depth)?;
    opened.push(offset);
    Some(dir)
}

// Sub-directories are walked depth-first at the point where their pointer appears, so tags
// of a sub-directory may be overwritten by later entries of its parent.
fn read_directories(data: &[u8], endian: Endian, first: usize, exif: &mut ExifMap) {
    let mut opened: ArrayVec<usize, MAX_IFD_COUNT> = ArrayVec::new();
    let mut stack: ArrayVec<Directory, { MAX_IFD_DEPTH + 1 }> = ArrayVec::new();
    if let Some(dir) = open_once(data, endian, first, 0, &mut opened) {
        stack.push(dir);
    }

    while let Some(dir) = stack.last_mut() {
        let pos = dir.next_entry;
        if dir.remaining == 0 || pos + IFD_ENTRY_LEN > data.len() {
            stack.pop();
            continue;
        }
        dir.next_entry += IFD_ENTRY_LEN;
        dir.remaining -= 1;
        let depth = dir.depth;

        let entry = &data[pos..pos + IFD_ENTRY_LEN];
        let tag = endian.u16(&entry[0..2]);
        let data_type = endian.u16(&entry[2..4]);
        let count = endian.u32(&entry[4..8]);
        let field = &entry[8..12];

        let size = type_size(data_type) * count as u64;
        let value = if size <= 4 {
            decode_value(&field[..size as usize], data_type, count, endian)
        } else {
            let offset = endian.u32(field) as u64;
            if offset + size <= data.len() as u64 {
                decode_value(&data[offset as usize..(offset + size) as usize], data_type, count, endian)
            } else {
                trace!(tag, offset, size, "TIFF value lies outside of the blob");
                None
            }
        };

        if let (Some(name), Some(value)) = (tag_name(tag), value) {
            exif.insert(name, value);
        }

        if tag == TAG_EXIF_IFD && size <= 4 {
            let offset = endian.u32(field) as usize;
            if offset < data.len() {
                if let Some(sub) = open_once(data, endian, offset, depth + 1, &mut opened) {
                    // cannot overflow: open_directory refuses anything deeper than the capacity
                    let _ = stack.try_push(sub);
                }
            }
        }
    }
}

fn decode_value(buf: &[u8], data_type: u16, count: u32, endian: Endian) -> Option<Value> {
    let single = count == 1;
    match data_type {
        TYPE_BYTE | TYPE_UNDEFINED => Some(if single {
            Value::Byte(buf[0])
        } else {
            Value::Bytes(buf.to_vec())
        }),
        TYPE_ASCII => {
            let text = match buf.split_last() {
                Some((&0, rest)) => rest,
                _ => buf
            };
            Some(Value::Text(String::from_utf8_lossy(text).into_owned()))
        }
        TYPE_SHORT => Some(if single {
            Value::Short(endian.u16(buf))
        } else {
            Value::Shorts(buf.chunks_exact(2).map(|c| endian.u16(c)).collect())
        }),
        TYPE_LONG => Some(if single {
            Value::Long(endian.u32(buf))
        } else {
            Value::Longs(buf.chunks_exact(4).map(|c| endian.u32(c)).collect())
        }),
        TYPE_SLONG => Some(if single {
            Value::SignedLong(endian.i32(buf))
        } else {
            Value::SignedLongs(buf.chunks_exact(4).map(|c| endian.i32(c)).collect())
        }),
        TYPE_RATIONAL | TYPE_SRATIONAL => {
            let signed = data_type == TYPE_SRATIONAL;
            let ratio = |c: &[u8]| rational(&c[..4], &c[4..8], signed, endian);
            Some(if single {
                Value::Float(ratio(buf))
            } else {
                Value::Floats(buf.chunks_exact(8).map(ratio).collect())
            })
        }
        _ => None
    }
}

fn rational(num: &[u8], den: &[u8], signed: bool, endian: Endian) -> f64 {
    if signed {
        let (num, den) = (endian.i32(num), endian.i32(den));
        if den == 0 { 0.0 } else { num as f64 / den as f64 }
    } else {
        let (num, den) = (endian.u32(num), endian.u32(den));
        if den == 0 { 0.0 } else { num as f64 / den as f64 }
    }
}
