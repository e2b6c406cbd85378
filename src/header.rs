//! The Layout Header captured at bundle time and embedded into the
//! executable's code section (`spec.md` §3).

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Delimits the archive blob and the bundled entrypoint text inside
/// `blob_path`, typically the running executable itself.
///
/// `Deserialize` lets a bundler hand this crate the header as a small JSON
/// sidecar rather than forcing every embedder to construct one field by
/// field; this mirrors how `tinymist-package`'s registry manifests are read
/// as plain `#[derive(Deserialize)]` structs rather than hand-parsed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LayoutHeader {
    /// File containing the archive bytes.
    pub blob_path: PathBuf,
    /// Absolute byte offset of the archive within `blob_path`.
    pub resource_start: u64,
    /// Size in bytes of the archive.
    pub resource_size: u64,
    /// Absolute byte offset of the bundled entrypoint text.
    pub content_start: u64,
    /// Size in bytes of the bundled entrypoint text.
    pub content_size: u64,
}

impl LayoutHeader {
    /// Parses a header from a JSON sidecar and validates it against
    /// `file_size`, in one step.
    pub fn from_json(bytes: &[u8], file_size: u64) -> Result<Self> {
        let header: Self =
            serde_json::from_slice(bytes).map_err(|e| Error::HeaderInvalid(e.to_string()))?;
        header.validate(file_size)?;
        Ok(header)
    }

    /// Builds a header, checking the invariants from `spec.md` §3: all
    /// offsets and sizes are non-negative (guaranteed by `u64`) and
    /// `resource_start + resource_size <= file_size`.
    pub fn new(
        blob_path: PathBuf,
        resource_start: u64,
        resource_size: u64,
        content_start: u64,
        content_size: u64,
        file_size: u64,
    ) -> Result<Self> {
        let header = Self {
            blob_path,
            resource_start,
            resource_size,
            content_start,
            content_size,
        };
        header.validate(file_size)?;
        Ok(header)
    }

    /// Re-checks the header against a (possibly re-read) file size.
    pub fn validate(&self, file_size: u64) -> Result<()> {
        let resource_end = self
            .resource_start
            .checked_add(self.resource_size)
            .ok_or_else(|| Error::HeaderInvalid("resource range overflows u64".into()))?;

        if resource_end > file_size {
            return Err(Error::HeaderInvalid(format!(
                "resource range {}..{} exceeds file size {file_size}",
                self.resource_start, resource_end
            )));
        }

        let content_end = self
            .content_start
            .checked_add(self.content_size)
            .ok_or_else(|| Error::HeaderInvalid("content range overflows u64".into()))?;

        if self.content_size != 0 && content_end > file_size {
            return Err(Error::HeaderInvalid(format!(
                "content range {}..{} exceeds file size {file_size}",
                self.content_start, content_end
            )));
        }

        Ok(())
    }
}
