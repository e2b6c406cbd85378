//! The three low-level hooks patched by [`super::install`]: the file-read
//! hook, the stat hook, and the module-resolver hook (`spec.md` §4.E).

use std::sync::Arc;

use crate::diag;
use crate::overlay::{RealFs, SnapshotFs};
use crate::path::PathNormalizer;
use crate::types::EntryKind;

use super::{FindPathFn, HookTable, ReadFileFn, ReadJsonFn, StatFn};

/// `errno` value for "no such file or directory", used by the stat hook's
/// native return convention.
const ENOENT: i32 = 2;

/// A loosely-typed positional argument, standing in for the dynamic values a
/// host runtime's private stat API would pass across its version history.
#[derive(Debug, Clone)]
pub enum RawArg {
    Int(i32),
    Str(String),
}

/// The stat hook's argument, after resolving the heterogeneous calling
/// convention described in `spec.md` §4.E/§9.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatArg {
    /// An already-open real file descriptor.
    Fd(i32),
    /// A path, real or virtual.
    Path(String),
}

impl StatArg {
    /// Tolerates both `(path)` and `(context, path)` calling shapes by
    /// picking the string argument wherever it falls, per `spec.md` §9's
    /// "model this as a tagged variant ... constructed by inspecting the
    /// first two arguments" guidance.
    pub fn classify(first: RawArg, second: Option<RawArg>) -> StatArg {
        match (first, second) {
            (RawArg::Str(s), _) => StatArg::Path(s),
            (_, Some(RawArg::Str(s))) => StatArg::Path(s),
            (RawArg::Int(fd), _) => StatArg::Fd(fd),
        }
    }
}

/// `true` for a bare module specifier: not starting with `.`, `..`, `/`, or
/// a drive letter.
pub fn is_bare_specifier(request: &str) -> bool {
    if request.starts_with('.') || request.starts_with('/') {
        return false;
    }
    let bytes = request.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return false;
    }
    true
}

/// Builds the replacement [`HookTable`] installed over `original`.
pub(super) fn build_patched_hooks<R: RealFs + 'static>(
    original: HookTable,
    snapshot: Arc<SnapshotFs<R>>,
    normalizer: PathNormalizer,
) -> HookTable {
    HookTable {
        read_file: patched_read_file(snapshot.clone(), normalizer.clone()),
        read_json: patched_read_json(snapshot.clone(), normalizer.clone()),
        stat: patched_stat(snapshot.clone(), normalizer.clone()),
        find_path: patched_find_path(original.find_path.clone(), snapshot, normalizer),
    }
}

fn patched_read_file<R: RealFs + 'static>(
    snapshot: Arc<SnapshotFs<R>>,
    normalizer: PathNormalizer,
) -> ReadFileFn {
    Arc::new(move |path: &str| {
        let virt = normalizer.to_virtual(path);
        diag::trace_hook("read_file", path, Some(&virt));
        match snapshot.read(&virt) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            // empty sentinel: distinct from the JSON hook's `None`.
            Err(_) => String::new(),
        }
    })
}

fn patched_read_json<R: RealFs + 'static>(
    snapshot: Arc<SnapshotFs<R>>,
    normalizer: PathNormalizer,
) -> ReadJsonFn {
    Arc::new(move |path: &str| {
        let virt = normalizer.to_virtual(path);
        diag::trace_hook("read_json", path, Some(&virt));
        match snapshot.read(&virt) {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            // absent marker, distinct from `Some(String::new())`.
            Err(_) => None,
        }
    })
}

fn patched_stat<R: RealFs + 'static>(
    snapshot: Arc<SnapshotFs<R>>,
    normalizer: PathNormalizer,
) -> StatFn {
    Arc::new(move |arg: StatArg| match arg {
        // Descriptors never resolve to an archive path: a descriptor was
        // already opened against the real filesystem, so `fstat` it there
        // directly rather than going through the path-keyed archive lookup.
        StatArg::Fd(fd) => {
            diag::trace_hook("stat", &fd.to_string(), None);
            match snapshot.fstat(fd) {
                Ok(_) => 0,
                Err(_) => -ENOENT,
            }
        }
        StatArg::Path(path) => {
            let virt = normalizer.to_virtual(&path);
            diag::trace_hook("stat", &path, Some(&virt));
            match snapshot.stat(&virt) {
                Ok(stat) if stat.kind == EntryKind::Directory => 1,
                Ok(_) => 0,
                Err(_) => -ENOENT,
            }
        }
    })
}

fn patched_find_path<R: RealFs + 'static>(
    original_find_path: FindPathFn,
    snapshot: Arc<SnapshotFs<R>>,
    normalizer: PathNormalizer,
) -> FindPathFn {
    Arc::new(move |request: &str, search_paths: &[String]| {
        if let Some(found) = original_find_path(request, search_paths) {
            return Some(found);
        }

        if !is_bare_specifier(request) {
            return None;
        }

        diag::trace_hook("find_path", request, None);
        super::resolver::resolve_bare_specifier(&snapshot, request)
    })
}
