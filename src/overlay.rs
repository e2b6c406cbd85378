//! Overlay FS (Snapshot): unions the [`ArchiveFs`] over the real host
//! filesystem without ever merging their namespaces (`spec.md` §4.C).

use std::sync::Arc;

use crate::archive::ArchiveFs;
use crate::error::{Error, Result};
use crate::path::is_under_virtual_root;
use crate::types::Stat;

/// The real-filesystem surface the host runtime needs, abstracted so tests
/// can substitute a fake. Grounded on the `AccessModel`/`PathAccessModel`
/// trait split in `tinymist-vfs`: a minimal trait the wrapper generalizes
/// over, implemented once for the real OS and however many times tests need.
pub trait RealFs: Send + Sync {
    /// `stat` of a real path.
    fn stat(&self, path: &str) -> Result<Stat>;
    /// `fstat` of an already-open real file descriptor.
    fn fstat(&self, fd: i32) -> Result<Stat>;
    /// Full contents of a real file.
    fn read(&self, path: &str) -> Result<Vec<u8>>;
    /// Child names of a real directory.
    fn readdir(&self, path: &str) -> Result<Vec<String>>;
}

/// Dispatches every path-shaped operation to exactly one of [`ArchiveFs`] or
/// a [`RealFs`], by the `/snapshot` prefix rule. There is no merging across
/// the boundary: an archive entry never shadows a real-disk file outside
/// `/snapshot/`, and vice versa.
pub struct SnapshotFs<R: RealFs> {
    archive: Arc<ArchiveFs>,
    real: R,
}

impl<R: RealFs> SnapshotFs<R> {
    pub fn new(archive: Arc<ArchiveFs>, real: R) -> Self {
        Self { archive, real }
    }

    /// `stat(p)` per the dispatch rule in `spec.md` §4.C.
    pub fn stat(&self, path: &str) -> Result<Stat> {
        if is_under_virtual_root(path) {
            self.archive.stat(path)
        } else {
            self.real.stat(path)
        }
    }

    /// `fstat` always goes to the real filesystem: archive entries are never
    /// reached by descriptor, only by path.
    pub fn fstat(&self, fd: i32) -> Result<Stat> {
        self.real.fstat(fd)
    }

    /// `read(p)` per the dispatch rule. Any write-shaped operation on a
    /// `/snapshot` path is rejected by [`ArchiveFs`] semantics (it has none),
    /// satisfying the read-only invariant in `spec.md` §3.
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        if is_under_virtual_root(path) {
            self.archive.read_all(path)
        } else {
            self.real.read(path)
        }
    }

    /// `readdir(p)` per the dispatch rule.
    pub fn readdir(&self, path: &str) -> Result<Vec<String>> {
        if is_under_virtual_root(path) {
            self.archive.readdir(path)
        } else {
            self.real.readdir(path)
        }
    }

    /// Any write-shaped operation under `/snapshot` fails with
    /// [`Error::ReadOnly`]; outside it, write access is the host's own
    /// business and out of this crate's scope (`spec.md` Non-goals).
    pub fn reject_write(&self, path: &str) -> Result<()> {
        if is_under_virtual_root(path) {
            Err(Error::ReadOnly(path.to_string()))
        } else {
            Ok(())
        }
    }

    pub fn archive(&self) -> &ArchiveFs {
        &self.archive
    }

    pub fn real(&self) -> &R {
        &self.real
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntryKind;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeRealFs {
        files: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl RealFs for FakeRealFs {
        fn stat(&self, path: &str) -> Result<Stat> {
            self.files
                .lock()
                .unwrap()
                .get(path)
                .map(|bytes| Stat { kind: EntryKind::File, size: bytes.len() as u64 })
                .ok_or_else(|| Error::NotFound(path.to_string()))
        }

        fn fstat(&self, _fd: i32) -> Result<Stat> {
            Ok(Stat { kind: EntryKind::File, size: 0 })
        }

        fn read(&self, path: &str) -> Result<Vec<u8>> {
            self.files
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| Error::NotFound(path.to_string()))
        }

        fn readdir(&self, _path: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    fn build_snapshot() -> SnapshotFs<FakeRealFs> {
        let mut buf = Vec::new();
        {
            use std::io::Write;
            let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            let options = zip::write::FileOptions::default()
                .compression_method(zip::CompressionMethod::Stored);
            writer.start_file("app/main.js", options).unwrap();
            writer.write_all(b"console.log(\"hi\")").unwrap();
            writer.finish().unwrap();
        }
        let archive = Arc::new(ArchiveFs::new(Arc::from(buf.into_boxed_slice())).unwrap());

        let real = FakeRealFs::default();
        real.files
            .lock()
            .unwrap()
            .insert("/etc/hosts".to_string(), b"127.0.0.1 localhost".to_vec());

        SnapshotFs::new(archive, real)
    }

    #[test]
    fn snapshot_paths_delegate_to_archive_only() {
        let snap = build_snapshot();
        assert_eq!(snap.read("/snapshot/app/main.js").unwrap(), b"console.log(\"hi\")");
        // a real-fs path with the same name does not exist in the archive's
        // namespace and vice versa: no merging across the boundary.
        assert!(snap.read("/snapshot/etc/hosts").is_err());
    }

    #[test]
    fn real_paths_delegate_to_real_fs_only() {
        let snap = build_snapshot();
        assert_eq!(snap.read("/etc/hosts").unwrap(), b"127.0.0.1 localhost");
        assert!(snap.read("/app/main.js").is_err());
    }

    #[test]
    fn writes_under_snapshot_are_rejected() {
        let snap = build_snapshot();
        assert!(matches!(
            snap.reject_write("/snapshot/app/main.js"),
            Err(Error::ReadOnly(_))
        ));
        assert!(snap.reject_write("/etc/hosts").is_ok());
    }
}
