use std::io::{BufReader, Cursor, Read, Seek};
use std::fs::File;
use std::path::Path;

use crate::types::Result;

/// Implemented by the typed metadata of each supported format.
///
/// `load` starts reading at the current position of the source, which must be the first
/// byte of the image.
pub trait LoadableMetadata: Sized {
    fn load<R: ?Sized + Read + Seek>(r: &mut R) -> Result<Self>;

    #[inline]
    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut f = BufReader::new(File::open(path)?);
        LoadableMetadata::load(&mut f)
    }

    #[inline]
    fn load_from_buf(buf: &[u8]) -> Result<Self> {
        LoadableMetadata::load(&mut Cursor::new(buf))
    }
}
