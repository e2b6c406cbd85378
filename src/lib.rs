//! Embedded-archive virtual filesystem and runtime module-resolver
//! integration for single-file application packagers.
//!
//! A packager embeds an archive (the bundled application's files) into an
//! executable and records a [`LayoutHeader`] locating it. At process start,
//! [`install`] reads that archive, mounts it at [`VIRTUAL_ROOT`] as a
//! read-only overlay over the real filesystem, and patches the host
//! runtime's file-read, stat, and module-resolution hooks to route requests
//! for bundled paths through the archive instead of the real disk.
//!
//! See [`archive`], [`overlay`], [`path`], and [`runtime`] for the
//! individual components; [`reader`] and [`header`] implement the Archive
//! Reader and its layout description.

pub mod archive;
pub mod diag;
pub mod error;
pub mod header;
pub mod overlay;
pub mod path;
pub mod reader;
pub mod runtime;
pub mod types;

pub use archive::ArchiveFs;
pub use error::{Error, Result};
pub use header::LayoutHeader;
pub use overlay::{RealFs, SnapshotFs};
pub use path::{PathNormalizer, VIRTUAL_ROOT};
pub use reader::{read_archive_blob, read_content_text};
pub use runtime::{install, uninstall, HostRuntime, HookTable, InstallGuard, StatArg, StdRealFs};
