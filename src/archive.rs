//! Archive FS: presents the entries of an embedded archive as a filesystem
//! rooted at the virtual root (`spec.md` §4.B).

use std::collections::{BTreeSet, HashMap};
use std::io::{Cursor, Read, Seek};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::types::{EntryKind, Stat};

#[derive(Debug, Clone)]
enum Entry {
    File { zip_index: usize, size: u64 },
    Directory { children: BTreeSet<String> },
}

/// Read-only, random-access view over an embedded archive's entries.
///
/// Entries are created once, at archive-open time, and live for the process
/// lifetime (`spec.md` §3): the index built in [`ArchiveFs::new`] is never
/// mutated afterwards. Reads go through a `Mutex` only because the `zip`
/// crate's reader needs `&mut self`; the underlying bytes are an immutable,
/// reference-counted buffer shared without copying.
pub struct ArchiveFs {
    entries: HashMap<String, Entry>,
    reader: Mutex<zip::ZipArchive<Cursor<Arc<[u8]>>>>,
}

impl std::fmt::Debug for ArchiveFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveFs")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl ArchiveFs {
    /// Parses `buffer` as a ZIP-family archive and builds the entry index.
    pub fn new(buffer: Arc<[u8]>) -> Result<Self> {
        let cursor = Cursor::new(buffer);
        let mut zip = zip::ZipArchive::new(cursor).map_err(|e| Error::Archive(e.to_string()))?;

        let mut entries: HashMap<String, Entry> = HashMap::new();
        entries.insert(String::new(), Entry::Directory { children: BTreeSet::new() });

        for index in 0..zip.len() {
            let (raw_name, is_dir, size) = {
                let file = zip.by_index(index).map_err(|e| Error::Archive(e.to_string()))?;
                (file.name().to_string(), file.is_dir(), file.size())
            };

            let Some(path) = canonicalize_archive_path(&raw_name) else {
                // Entries that would escape the archive root (or are
                // otherwise unrepresentable) are dropped rather than
                // failing the whole archive.
                continue;
            };
            if path.is_empty() {
                continue;
            }

            ensure_parents(&mut entries, &path);

            if is_dir {
                entries
                    .entry(path)
                    .or_insert_with(|| Entry::Directory { children: BTreeSet::new() });
            } else {
                entries.insert(path, Entry::File { zip_index: index, size });
            }
        }

        Ok(Self {
            entries,
            reader: Mutex::new(zip),
        })
    }

    /// `stat(p)` per `spec.md` §4.B.
    pub fn stat(&self, path: &str) -> Result<Stat> {
        let key = lookup_key(path)?;
        match self.entries.get(&key) {
            Some(Entry::File { size, .. }) => Ok(Stat { kind: EntryKind::File, size: *size }),
            Some(Entry::Directory { .. }) => {
                Ok(Stat { kind: EntryKind::Directory, size: SYNTHETIC_DIR_SIZE })
            }
            None => Err(Error::NotFound(path.to_string())),
        }
    }

    /// `open(p)` per `spec.md` §4.B: returns a handle usable with [`Self::read`].
    pub fn open(&self, path: &str) -> Result<ArchiveFile> {
        let key = lookup_key(path)?;
        match self.entries.get(&key) {
            Some(Entry::File { zip_index, size }) => {
                Ok(ArchiveFile { zip_index: *zip_index, size: *size })
            }
            Some(Entry::Directory { .. }) => Err(Error::IsADirectory(path.to_string())),
            None => Err(Error::NotFound(path.to_string())),
        }
    }

    /// `read(handle, offset, length)` per `spec.md` §4.B. Short reads are
    /// only permitted at end-of-file.
    pub fn read(&self, handle: &ArchiveFile, offset: u64, length: u64) -> Result<Vec<u8>> {
        if offset >= handle.size {
            return Ok(Vec::new());
        }

        let mut reader = self.reader.lock();
        let mut file = reader
            .by_index(handle.zip_index)
            .map_err(|e| Error::Archive(e.to_string()))?;

        // `zip`'s reader is forward-only, so re-extract the whole entry and
        // slice it. Archive entries are small relative to the packaged
        // application; this keeps the implementation simple and correct.
        let mut whole = Vec::with_capacity(handle.size as usize);
        file.read_to_end(&mut whole)?;

        let start = offset.min(whole.len() as u64) as usize;
        let want = length.min(whole.len() as u64 - start as u64) as usize;
        Ok(whole[start..start + want].to_vec())
    }

    /// Reads an entire file's contents in one call.
    pub fn read_all(&self, path: &str) -> Result<Vec<u8>> {
        let handle = self.open(path)?;
        self.read(&handle, 0, handle.size)
    }

    /// `readdir(p)` per `spec.md` §4.B.
    pub fn readdir(&self, path: &str) -> Result<Vec<String>> {
        let key = lookup_key(path)?;
        match self.entries.get(&key) {
            Some(Entry::Directory { children }) => Ok(children.iter().cloned().collect()),
            Some(Entry::File { .. }) => Err(Error::NotADirectory(path.to_string())),
            None => Err(Error::NotFound(path.to_string())),
        }
    }

    pub fn is_file(&self, path: &str) -> bool {
        matches!(self.stat(path), Ok(Stat { kind: EntryKind::File, .. }))
    }

    pub fn is_directory(&self, path: &str) -> bool {
        matches!(self.stat(path), Ok(Stat { kind: EntryKind::Directory, .. }))
    }
}

/// Synthetic size reported for directory entries, which have no archive
/// payload of their own.
const SYNTHETIC_DIR_SIZE: u64 = 0;

/// A handle returned by [`ArchiveFs::open`].
#[derive(Debug, Clone, Copy)]
pub struct ArchiveFile {
    zip_index: usize,
    size: u64,
}

impl ArchiveFile {
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Canonicalizes a path for index lookups: collapses `.`/`..`, strips a
/// leading `/snapshot` or `/`, and rejects traversal above the root by
/// returning `None`.
fn canonicalize_archive_path(raw: &str) -> Option<String> {
    let raw = raw.replace('\\', "/");
    let raw = raw
        .strip_prefix(crate::path::VIRTUAL_ROOT)
        .unwrap_or(raw.as_str());

    let mut parts: Vec<&str> = Vec::new();
    for component in raw.split('/') {
        match component {
            "" | "." => continue,
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }

    Some(parts.join("/"))
}

fn lookup_key(path: &str) -> Result<String> {
    canonicalize_archive_path(path).ok_or_else(|| Error::NotFound(path.to_string()))
}

/// Makes sure every ancestor directory of `path` exists in `entries` and
/// lists `path`'s final component as a child of its parent.
fn ensure_parents(entries: &mut HashMap<String, Entry>, path: &str) {
    let mut ancestor = String::new();
    for component in path.split('/') {
        let child = if ancestor.is_empty() {
            component.to_string()
        } else {
            format!("{ancestor}/{component}")
        };

        entries
            .entry(ancestor.clone())
            .or_insert_with(|| Entry::Directory { children: BTreeSet::new() });
        if let Some(Entry::Directory { children }) = entries.get_mut(&ancestor) {
            children.insert(component.to_string());
        }

        ancestor = child;
    }
}
