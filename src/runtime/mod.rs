//! Runtime Integration: wires the overlay filesystem into a host runtime's
//! module resolver and low-level file hooks (`spec.md` §4.E).
//!
//! A host runtime is anything implementing [`HostRuntime`]: a vtable over
//! the same three hook points a real single-file packager would patch
//! (file read, stat, module resolution), plus the project root it was
//! bundled from. [`install`] reads the runtime's current hooks, saves them,
//! and swaps in overlay-backed replacements; [`uninstall`] puts the
//! originals back. Both are idempotent and safe to call from any order,
//! mirroring the "for tests" install/uninstall pair in `spec.md` §9.

mod hooks;
mod resolver;

use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::archive::ArchiveFs;
use crate::error::{Error, Result};
use crate::header::LayoutHeader;
use crate::overlay::{RealFs, SnapshotFs};
use crate::path::PathNormalizer;
use crate::reader::read_archive_blob;
use crate::types::{EntryKind, Stat};

pub use hooks::{is_bare_specifier, RawArg, StatArg};

pub type ReadFileFn = Arc<dyn Fn(&str) -> String + Send + Sync>;
pub type ReadJsonFn = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;
pub type StatFn = Arc<dyn Fn(StatArg) -> i32 + Send + Sync>;
pub type FindPathFn = Arc<dyn Fn(&str, &[String]) -> Option<String> + Send + Sync>;

/// The three hook points this crate reads, saves, and replaces, bundled
/// together so a single `set_hooks` call installs or restores them
/// atomically.
#[derive(Clone)]
pub struct HookTable {
    pub read_file: ReadFileFn,
    pub read_json: ReadJsonFn,
    pub stat: StatFn,
    pub find_path: FindPathFn,
}

/// The embedding surface a host runtime exposes so this crate can intercept
/// its module resolution and low-level file access.
///
/// Grounded on the `AccessModel` trait family in `tinymist-vfs`: rather than
/// a single monolithic "runtime" object, the host exposes exactly the
/// handful of operations the overlay needs, so any embedder can implement
/// it over whatever internal hook mechanism it actually has.
pub trait HostRuntime: Send + Sync {
    /// The runtime's current hook table, before any interception.
    fn current_hooks(&self) -> HookTable;
    /// Replaces the runtime's hook table wholesale.
    fn set_hooks(&self, table: HookTable);
    /// Absolute directory the application was bundled from, used by the
    /// [`PathNormalizer`]'s project-root rewrite rule.
    fn project_root(&self) -> String;
    /// The executable's drive letter, consulted only on Windows hosts.
    fn exe_drive(&self) -> Option<char> {
        None
    }
}

/// Real-filesystem primitives backed directly by `std::fs`, used for every
/// path outside `/snapshot`. Unlike the hook table, nothing in this crate's
/// own process patches `std::fs` itself, so there is no "original" to save
/// here.
pub struct StdRealFs;

impl RealFs for StdRealFs {
    fn stat(&self, path: &str) -> Result<Stat> {
        let meta = std::fs::metadata(path).map_err(|e| map_io_err(e, path))?;
        Ok(Stat {
            kind: if meta.is_dir() { EntryKind::Directory } else { EntryKind::File },
            size: meta.len(),
        })
    }

    #[cfg(unix)]
    fn fstat(&self, fd: i32) -> Result<Stat> {
        use std::os::unix::io::FromRawFd;
        // `fd` is owned by the caller; wrap it without taking ownership so
        // dropping `file` does not close it.
        let file = unsafe { std::fs::File::from_raw_fd(fd) };
        let result = file.metadata();
        std::mem::forget(file);
        let meta = result.map_err(Error::Io)?;
        Ok(Stat {
            kind: if meta.is_dir() { EntryKind::Directory } else { EntryKind::File },
            size: meta.len(),
        })
    }

    #[cfg(not(unix))]
    fn fstat(&self, _fd: i32) -> Result<Stat> {
        Err(Error::NotFound("descriptor-based stat is unsupported on this platform".into()))
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        std::fs::read(path).map_err(|e| map_io_err(e, path))
    }

    fn readdir(&self, path: &str) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(path).map_err(|e| map_io_err(e, path))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(Error::Io)?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }
}

fn map_io_err(e: std::io::Error, path: &str) -> Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        Error::NotFound(path.to_string())
    } else {
        Error::Io(e)
    }
}

type InstalledState = (Arc<dyn HostRuntime>, HookTable);

fn state() -> &'static Mutex<Option<InstalledState>> {
    static STATE: OnceLock<Mutex<Option<InstalledState>>> = OnceLock::new();
    STATE.get_or_init(|| Mutex::new(None))
}

/// Reads the archive blob named by `header`, builds the overlay filesystem
/// over it, and replaces `host`'s hooks with overlay-backed versions.
///
/// A second call while already installed is a no-op: it returns an inert
/// guard and leaves the first installation (and its originals) untouched.
pub fn install(header: LayoutHeader, host: Arc<dyn HostRuntime>) -> Result<InstallGuard> {
    let mut guard = state().lock();
    if guard.is_some() {
        return Ok(InstallGuard { active: false });
    }

    let buffer = read_archive_blob(&header)?;
    let archive = Arc::new(ArchiveFs::new(buffer)?);
    let snapshot = Arc::new(SnapshotFs::new(archive, StdRealFs));
    let normalizer = PathNormalizer::new(host.project_root(), host.exe_drive(), cfg!(windows));

    let original = host.current_hooks();
    let patched = hooks::build_patched_hooks(original.clone(), snapshot, normalizer);
    host.set_hooks(patched);

    *guard = Some((host, original));
    Ok(InstallGuard { active: true })
}

/// Restores the saved original hook table, if installed. Safe to call when
/// not installed.
pub fn uninstall() {
    let mut guard = state().lock();
    if let Some((host, original)) = guard.take() {
        host.set_hooks(original);
    }
}

/// RAII handle returned by [`install`]. Dropping it calls [`uninstall`]
/// unless [`InstallGuard::leak`] was called first, matching the always-on
/// production behavior while still letting tests clean up after themselves.
pub struct InstallGuard {
    active: bool,
}

impl InstallGuard {
    /// Disarms the guard: hooks stay installed for the rest of the process,
    /// mirroring production usage where `uninstall` is never called.
    pub fn leak(mut self) {
        self.active = false;
    }
}

impl Drop for InstallGuard {
    fn drop(&mut self) {
        if self.active {
            uninstall();
        }
    }
}
