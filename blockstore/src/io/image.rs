//! Reading and writing flat device images. An image is the raw concatenation of
//! every block in index order with no header, footer, or checksum.
use std::fs::{File, OpenOptions};
use std::io::prelude::*;
use std::io::{BufWriter, ErrorKind};
use std::path::Path;

use log::debug;

use crate::store::BlockStoreError;

/// Images are readable and writable by their owner only.
#[cfg(unix)]
const IMAGE_MODE: u32 = 0o600;

/// Writes `bytes` to `dest`, creating the file or truncating an existing one.
/// Returns the number of bytes written, always `bytes.len()` on success.
pub fn write_image<P: AsRef<Path>>(dest: P, bytes: &[u8]) -> std::io::Result<usize> {
    let file = open_for_write(dest.as_ref())?;
    let mut out = BufWriter::new(file);
    out.write_all(bytes)?;
    out.flush()?;
    debug!("wrote {} byte image to {}", bytes.len(), dest.as_ref().display());
    Ok(bytes.len())
}

/// Fills `buf` from the start of the image at `src`. Bytes past `buf.len()` in a
/// longer file are left unread.
///
/// # Errors
///
/// A file shorter than `buf` returns `BlockStoreError::ShortImage`; any other
/// failure opening or reading the file is returned as `BlockStoreError::Io`.
pub fn read_image<P: AsRef<Path>>(src: P, buf: &mut [u8]) -> Result<(), BlockStoreError> {
    let mut file = File::open(src.as_ref())?;
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(BlockStoreError::ShortImage {
                    expected: buf.len(),
                    actual: filled,
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    debug!("read {} byte image from {}", filled, src.as_ref().display());
    Ok(())
}

#[cfg(unix)]
fn open_for_write(dest: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(IMAGE_MODE)
        .open(dest)
}

#[cfg(not(unix))]
fn open_for_write(dest: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(dest)
}
