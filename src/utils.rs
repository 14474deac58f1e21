use std::io::{self, Read, Seek, SeekFrom, ErrorKind};
use std::convert::TryFrom;

use byteorder::{ByteOrder, BigEndian, LittleEndian};

/// Moves the stream `n` bytes forward without reading them.
///
/// Seeking past the end of the source is not an error here; the next read will report it.
pub fn skip<R: ?Sized + Seek>(r: &mut R, n: u64) -> io::Result<()> {
    let n = i64::try_from(n).map_err(|_| io::Error::new(ErrorKind::InvalidInput, "skip distance is too large"))?;
    r.seek(SeekFrom::Current(n)).map(|_| ())
}

/// Reads exactly `len` bytes into a fresh buffer.
///
/// The buffer grows with the data actually read, so a bogus length field of a truncated
/// stream does not cause a large up-front allocation.
pub fn read_payload<R: ?Sized + Read>(r: &mut R, len: u64) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    (&mut *r).take(len).read_to_end(&mut buf)?;
    if (buf.len() as u64) < len {
        return Err(io::Error::new(ErrorKind::UnexpectedEof, "payload is shorter than its length field"));
    }
    Ok(buf)
}

/// Fills as much of `buf` as the source allows, returning the number of bytes read.
pub fn read_up_to<R: ?Sized + Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e)
        }
    }
    Ok(filled)
}

/// Byte order which is only known once a TIFF header has been seen.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Endian {
    Little,
    Big
}

impl Endian {
    #[inline]
    pub fn u16(self, buf: &[u8]) -> u16 {
        match self {
            Endian::Little => LittleEndian::read_u16(buf),
            Endian::Big => BigEndian::read_u16(buf)
        }
    }

    #[inline]
    pub fn u32(self, buf: &[u8]) -> u32 {
        match self {
            Endian::Little => LittleEndian::read_u32(buf),
            Endian::Big => BigEndian::read_u32(buf)
        }
    }

    #[inline]
    pub fn i32(self, buf: &[u8]) -> i32 {
        match self {
            Endian::Little => LittleEndian::read_i32(buf),
            Endian::Big => BigEndian::read_i32(buf)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Seek, SeekFrom};

    use super::{skip, read_payload, read_up_to, Endian};

    #[test]
    fn test_skip_and_read_payload() {
        let mut r = Cursor::new(b"0123456789".to_vec());
        skip(&mut r, 3).unwrap();
        assert_eq!(read_payload(&mut r, 4).unwrap(), b"3456".to_vec());
        assert_eq!(r.seek(SeekFrom::Current(0)).unwrap(), 7);
    }

    #[test]
    fn test_short_payload() {
        let mut r = Cursor::new(b"abc".to_vec());
        let e = read_payload(&mut r, 1 << 30).unwrap_err();
        assert_eq!(e.kind(), ::std::io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_read_up_to() {
        let mut buf = [0u8; 16];
        let mut r = Cursor::new(b"GIF89a".to_vec());
        assert_eq!(read_up_to(&mut r, &mut buf).unwrap(), 6);
        assert_eq!(&buf[..6], b"GIF89a");
    }

    #[test]
    fn test_endian() {
        let data = [0x2a, 0x00, 0x00, 0x00];
        assert_eq!(Endian::Little.u16(&data), 42);
        assert_eq!(Endian::Big.u16(&data), 0x2a00);
        assert_eq!(Endian::Little.u32(&data), 42);
        assert_eq!(Endian::Big.i32(&[0xff, 0xff, 0xff, 0xfe]), -2);
    }
}
