use std::fmt;
use std::io::Read;
use std::str;

use byteorder::{ReadBytesExt, LittleEndian};

use crate::types::Result;
use crate::utils::read_up_to;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct ChunkId(pub [u8; 4]);

impl ChunkId {
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        str::from_utf8(&self.0).ok()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.as_str() {
            Some(s) => f.write_str(s),
            None => write!(f, "{:?}", self.0)
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct ChunkHeader {
    pub id: ChunkId,
    pub len: u32
}

impl ChunkHeader {
    /// Length of the chunk payload including the pad byte which keeps chunks word-aligned.
    #[inline]
    pub fn padded_len(&self) -> u64 {
        self.len as u64 + (self.len & 1) as u64
    }
}

/// Reads the `RIFF` file header and returns the form type which follows it.
pub fn read_file_header<R: ?Sized + Read>(source: &mut R) -> Result<ChunkId> {
    let header = match read_chunk_header(source)? {
        Some(h) => h,
        None => return Err(unexpected_eof!("when reading RIFF header"))
    };

    if header.id.as_bytes() != b"RIFF" {
        return Err(invalid_container!("RIFF file header is invalid: {}", header.id));
    }

    let mut form_type = [0u8; 4];
    try_if_eof!(source.read_exact(&mut form_type), "when reading RIFF form type");
    Ok(ChunkId(form_type))
}

/// Reads a chunk identifier and its length; returns `None` if the source is exhausted
/// before the first byte.
pub fn read_chunk_header<R: ?Sized + Read>(source: &mut R) -> Result<Option<ChunkHeader>> {
    let mut id = [0u8; 4];

    match read_up_to(source, &mut id)? {
        0 => return Ok(None),
        4 => {}
        _ => return Err(unexpected_eof!("when reading chunk id"))
    }

    let len = try_if_eof!(source.read_u32::<LittleEndian>(), "when reading length of chunk {}", ChunkId(id));

    Ok(Some(ChunkHeader { id: ChunkId(id), len: len }))
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use byteorder::{WriteBytesExt, LittleEndian};

    use crate::utils::skip;

    use super::{read_file_header, read_chunk_header, ChunkId};

    macro_rules! build {
        ($($arg:expr),+) => {{
            let mut data = Vec::new();
            $(data.write_all($arg).unwrap();)+
            data
        }}
    }

    fn n(n: u32) -> [u8; 4] {
        let mut r = [0u8; 4];
        (&mut r as &mut [u8]).write_u32::<LittleEndian>(n).unwrap();
        r
    }

    #[test]
    fn test_invalid_header() {
        let mut data = Cursor::new(b"XXXX\x04\x00\x00\x00abcd".to_vec());
        assert!(read_file_header(&mut data).is_err());
    }

    #[test]
    fn test_flat_chunks() {
        let data = build! {
            b"RIFF", &n(26), b"WEBP",
            b"A   ", &n(4), b"1234",
            b"B   ", &n(5), b"56789", b"\0"
        };
        let mut r = Cursor::new(data);

        assert_eq!(read_file_header(&mut r).unwrap(), ChunkId(*b"WEBP"));

        let a = read_chunk_header(&mut r).unwrap().unwrap();
        assert_eq!(a.id, ChunkId(*b"A   "));
        assert_eq!(a.len, 4);
        skip(&mut r, a.padded_len()).unwrap();

        let b = read_chunk_header(&mut r).unwrap().unwrap();
        assert_eq!(b.id, ChunkId(*b"B   "));
        assert_eq!(b.padded_len(), 6);
        skip(&mut r, b.padded_len()).unwrap();

        assert!(read_chunk_header(&mut r).unwrap().is_none());
    }

    #[test]
    fn test_truncated_chunk_header() {
        let mut r = Cursor::new(b"VP8X\x0a\x00".to_vec());
        assert!(read_chunk_header(&mut r).is_err());
        let mut r = Cursor::new(b"VP".to_vec());
        assert!(read_chunk_header(&mut r).is_err());
    }
}
