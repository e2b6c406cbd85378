//! Archive Reader: opens the blob named by a [`LayoutHeader`] and
//! materializes the archive bytes, always through the real, pre-interception
//! filesystem (`spec.md` §4.A).

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::header::LayoutHeader;

/// Reads exactly `header.resource_size` bytes starting at
/// `header.resource_start` from `header.blob_path`.
///
/// This must be called before any interception is installed: it is the one
/// place in the crate that is allowed, indeed required, to touch the real
/// `std::fs` directly rather than going through [`crate::overlay::RealFs`].
pub fn read_archive_blob(header: &LayoutHeader) -> Result<Arc<[u8]>> {
    let mut file = File::open(&header.blob_path)?;
    let file_size = file.metadata()?.len();
    header.validate(file_size)?;

    file.seek(SeekFrom::Start(header.resource_start))?;

    let mut buf = vec![0u8; header.resource_size as usize];
    file.read_exact(&mut buf).map_err(|e| {
        Error::HeaderInvalid(format!(
            "short read of {} bytes at offset {} in {}: {e}",
            header.resource_size,
            header.resource_start,
            header.blob_path.display()
        ))
    })?;

    Ok(Arc::from(buf.into_boxed_slice()))
}

/// Reads the bundled entrypoint text delimited by `content_start`/`content_size`,
/// using the same real, pre-interception access as [`read_archive_blob`].
pub fn read_content_text(header: &LayoutHeader) -> Result<String> {
    let mut file = File::open(&header.blob_path)?;
    file.seek(SeekFrom::Start(header.content_start))?;

    let mut buf = vec![0u8; header.content_size as usize];
    file.read_exact(&mut buf).map_err(|e| {
        Error::HeaderInvalid(format!(
            "short read of content text in {}: {e}",
            header.blob_path.display()
        ))
    })?;

    String::from_utf8(buf).map_err(|e| Error::HeaderInvalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_exact_resource_range() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"prefix-bytesARCHIVEBYTES-suffix").unwrap();
        tmp.flush().unwrap();

        let header = LayoutHeader::new(
            tmp.path().to_path_buf(),
            "prefix-bytes".len() as u64,
            "ARCHIVEBYTES".len() as u64,
            0,
            0,
            tmp.as_file().metadata().unwrap().len(),
        )
        .unwrap();

        let bytes = read_archive_blob(&header).unwrap();
        assert_eq!(&*bytes, b"ARCHIVEBYTES");
    }

    #[test]
    fn reads_exact_content_range() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"ARCHIVEBYTES-console.log(\"hi\")-trailer").unwrap();
        tmp.flush().unwrap();

        let header = LayoutHeader::new(
            tmp.path().to_path_buf(),
            0,
            "ARCHIVEBYTES".len() as u64,
            "ARCHIVEBYTES-".len() as u64,
            "console.log(\"hi\")".len() as u64,
            tmp.as_file().metadata().unwrap().len(),
        )
        .unwrap();

        let text = read_content_text(&header).unwrap();
        assert_eq!(text, "console.log(\"hi\")");
    }

    #[test]
    fn short_read_is_header_invalid() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"short").unwrap();
        tmp.flush().unwrap();

        // Build a header whose range was valid when the file was longer but
        // isn't anymore (simulating a file truncated out from under us),
        // bypassing the constructor's own validation.
        let header = LayoutHeader {
            blob_path: tmp.path().to_path_buf(),
            resource_start: 0,
            resource_size: 5,
            content_start: 0,
            content_size: 0,
        };

        assert!(read_archive_blob(&header).is_ok());

        let header_too_long = LayoutHeader {
            resource_size: 100,
            ..header
        };
        assert!(matches!(
            read_archive_blob(&header_too_long),
            Err(Error::HeaderInvalid(_))
        ));
    }
}
